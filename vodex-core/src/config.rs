use std::collections::BTreeSet;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct VodexConfig {
    pub stores: StoresSection,
    pub formats: FormatsSection,
    pub library: LibrarySection,
    pub transcoder: TranscoderSection,
    pub run: RunSection,
}

impl VodexConfig {
    /// The fixed, process-wide set of output formats the exporter is
    /// responsible for keeping present per content id.
    pub fn downloadable_formats(&self) -> BTreeSet<String> {
        self.formats.downloadable.iter().cloned().collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoresSection {
    pub converted_root: String,
    pub unconverted_root: String,
    #[serde(default = "default_url_scheme")]
    pub url_scheme: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FormatsSection {
    pub downloadable: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LibrarySection {
    pub api_base: String,
    pub downloader: String,
    pub download_dir: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TranscoderSection {
    pub api_base: String,
    pub api_token_path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunSection {
    pub lock_path: String,
    #[serde(default = "default_lock_timeout_secs")]
    pub lock_timeout_secs: u64,
    pub logs_dir: String,
}

fn default_url_scheme() -> String {
    "store".to_string()
}

fn default_lock_timeout_secs() -> u64 {
    2
}

pub fn load_vodex_config<P: AsRef<Path>>(path: P) -> Result<VodexConfig> {
    load_toml(path)
}

fn load_toml<T, P>(path: P) -> Result<T>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        source,
        path: path.to_path_buf(),
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        source,
        path: path.to_path_buf(),
    })
}
