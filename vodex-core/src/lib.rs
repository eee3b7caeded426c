pub mod config;
pub mod error;
pub mod export;
pub mod library;
pub mod store;
pub mod transcoder;

pub use config::{
    load_vodex_config, FormatsSection, LibrarySection, RunSection, StoresSection,
    TranscoderSection, VodexConfig,
};
pub use error::{ConfigError, Result};
pub use export::{
    get_or_create_source, is_duplicate, migrate_legacy, missing_formats, parse_key, Catalog,
    ExportError, ExportResult, Exporter, ParsedKey, RunLock, RunReport, DUPLICATE_MARKER,
    LEGACY_TARGET_FORMAT, PARTIAL_UPLOAD_SUFFIX,
};
pub use library::{
    DownloadExecutor, HttpMediaLibrary, LibraryError, LibraryResult, MediaLibrary,
    SystemDownloadExecutor,
};
pub use store::{DirStore, MemoryStore, ObjectInfo, ObjectStore, StoreError, StoreResult};
pub use transcoder::{
    ConversionJob, HttpTranscodeService, TranscodeService, TranscoderError, TranscoderResult,
};
