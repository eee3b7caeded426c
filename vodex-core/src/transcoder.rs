use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use thiserror::Error;
use tracing::info;
use url::Url;

#[derive(Debug, Error)]
pub enum TranscoderError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid transcoder url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("missing api token at {0}")]
    MissingToken(PathBuf),
}

pub type TranscoderResult<T> = std::result::Result<T, TranscoderError>;

/// One transcode request: produce `formats` for `content_id` from the raw
/// object at `input`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ConversionJob {
    pub content_id: String,
    pub input: String,
    pub formats: BTreeSet<String>,
}

#[async_trait]
pub trait TranscodeService: Send + Sync {
    async fn submit(&self, job: &ConversionJob) -> TranscoderResult<()>;
}

pub struct HttpTranscodeService {
    client: Client,
    api_base: Url,
    api_token_path: PathBuf,
}

impl HttpTranscodeService {
    pub fn new(api_base: &str, api_token_path: impl Into<PathBuf>) -> TranscoderResult<Self> {
        let client = Client::builder().user_agent("vodex/0.1").build()?;
        let api_base = if api_base.ends_with('/') {
            Url::parse(api_base)?
        } else {
            Url::parse(&format!("{api_base}/"))?
        };
        Ok(Self {
            client,
            api_base,
            api_token_path: api_token_path.into(),
        })
    }

    fn load_token(&self) -> TranscoderResult<String> {
        let token = fs::read_to_string(&self.api_token_path)
            .map_err(|_| TranscoderError::MissingToken(self.api_token_path.clone()))?;
        Ok(token.trim().to_string())
    }
}

#[async_trait]
impl TranscodeService for HttpTranscodeService {
    async fn submit(&self, job: &ConversionJob) -> TranscoderResult<()> {
        let token = self.load_token()?;
        let url = self.api_base.join("jobs")?;
        self.client
            .post(url)
            .bearer_auth(token)
            .json(job)
            .send()
            .await?
            .error_for_status()?;
        info!(content_id = %job.content_id, formats = job.formats.len(), "transcode job accepted");
        Ok(())
    }
}
