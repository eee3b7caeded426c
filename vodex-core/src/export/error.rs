use std::path::PathBuf;

use thiserror::Error;

use crate::library::LibraryError;
use crate::store::StoreError;
use crate::transcoder::TranscoderError;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("library error: {0}")]
    Library(#[from] LibraryError),
    #[error("transcoder error: {0}")]
    Transcoder(#[from] TranscoderError),
    #[error("listed key {key} does not belong to legacy id {expected_id}")]
    MigrationInvariant { key: String, expected_id: String },
    #[error("could not acquire run lock {path} within {waited_ms} ms")]
    LockTimeout { path: PathBuf, waited_ms: u64 },
    #[error("lock io error on {path}: {source}")]
    LockIo {
        path: PathBuf,
        source: std::io::Error,
    },
}

pub type ExportResult<T> = std::result::Result<T, ExportError>;
