use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tokio::process::Command;
use tracing::info;
use url::Url;

#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid library url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("downloader failed ({command}): {stderr}")]
    DownloaderFailure {
        command: String,
        status: Option<i32>,
        stderr: String,
    },
}

pub type LibraryResult<T> = std::result::Result<T, LibraryError>;

/// The media-library service: the authoritative list of content ids, plus
/// retrieval of one video's raw media to local scratch space.
#[async_trait]
pub trait MediaLibrary: Send + Sync {
    async fn list_video_ids(&self) -> LibraryResult<Vec<String>>;

    /// Fetch one video's media to a local file. `None` means the library has
    /// no retrievable media for the id.
    async fn fetch(&self, content_id: &str) -> LibraryResult<Option<PathBuf>>;
}

#[async_trait]
pub trait DownloadExecutor: Send + Sync {
    async fn run(&self, command: &mut Command) -> std::io::Result<std::process::Output>;
}

#[derive(Debug, Default, Clone)]
pub struct SystemDownloadExecutor;

#[async_trait]
impl DownloadExecutor for SystemDownloadExecutor {
    async fn run(&self, command: &mut Command) -> std::io::Result<std::process::Output> {
        command.output().await
    }
}

pub struct HttpMediaLibrary {
    client: Client,
    api_base: Url,
    downloader: PathBuf,
    download_dir: PathBuf,
    executor: Arc<dyn DownloadExecutor>,
}

#[derive(Debug, Deserialize)]
struct VideoIdsResponse {
    video_ids: Vec<String>,
}

impl HttpMediaLibrary {
    pub fn new(
        api_base: &str,
        downloader: impl Into<PathBuf>,
        download_dir: impl Into<PathBuf>,
    ) -> LibraryResult<Self> {
        let client = Client::builder().user_agent("vodex/0.1").build()?;
        Ok(Self {
            client,
            api_base: parse_api_base(api_base)?,
            downloader: downloader.into(),
            download_dir: download_dir.into(),
            executor: Arc::new(SystemDownloadExecutor),
        })
    }

    pub fn with_executor(mut self, executor: Arc<dyn DownloadExecutor>) -> Self {
        self.executor = executor;
        self
    }
}

#[async_trait]
impl MediaLibrary for HttpMediaLibrary {
    async fn list_video_ids(&self) -> LibraryResult<Vec<String>> {
        let url = self.api_base.join("videos/ids")?;
        let response: VideoIdsResponse = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(response.video_ids)
    }

    async fn fetch(&self, content_id: &str) -> LibraryResult<Option<PathBuf>> {
        tokio::fs::create_dir_all(&self.download_dir).await?;
        let mut command = Command::new(&self.downloader);
        command
            .arg(content_id)
            .arg("--dest")
            .arg(&self.download_dir);
        let cmd_string = format!(
            "{} {} --dest {}",
            self.downloader.display(),
            content_id,
            self.download_dir.display()
        );
        let output = self.executor.run(&mut command).await?;
        if !output.status.success() {
            return Err(LibraryError::DownloaderFailure {
                command: cmd_string,
                status: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        // The downloader names its output <id>.<container>; if it produced
        // several candidates, take the smallest key so retries are stable.
        let wanted = format!("{content_id}.");
        let mut candidates = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.download_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with(&wanted) {
                candidates.push(entry.path());
            }
        }
        candidates.sort();
        if let Some(path) = candidates.first() {
            info!(content_id, path = %path.display(), "downloader produced media");
        }
        Ok(candidates.into_iter().next())
    }
}

fn parse_api_base(api_base: &str) -> Result<Url, url::ParseError> {
    if api_base.ends_with('/') {
        Url::parse(api_base)
    } else {
        Url::parse(&format!("{api_base}/"))
    }
}
