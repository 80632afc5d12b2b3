//! Media backend trait and error types.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::model::{
    Answer, MediaSource, PromptPart, RemoteId, RemoteStatus, UploadBody, UploadedFile,
};

/// Errors that can occur while talking to a media backend.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Provider error: {0}")]
    ProviderError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Request timed out after {0:?}")]
    TimedOut(Duration),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Remote inference service able to host and analyse uploaded media.
///
/// Implementations only translate calls to the wire; lifecycle rules live in
/// [`RemoteJobTracker`](crate::tracker::RemoteJobTracker).
#[async_trait]
pub trait MediaBackend: Send + Sync {
    /// Upload `body` under the media type and name declared by `source`.
    async fn upload(
        &self,
        source: &MediaSource,
        body: UploadBody,
    ) -> Result<UploadedFile, ClientError>;

    /// Fetch the current processing status of an uploaded file.
    async fn get_status(&self, remote_id: &RemoteId) -> Result<RemoteStatus, ClientError>;

    /// Run a generation request over the given parts, bounded by `timeout`.
    async fn generate(
        &self,
        parts: Vec<PromptPart>,
        timeout: Duration,
    ) -> Result<Answer, ClientError>;

    /// Delete an uploaded file.
    async fn delete(&self, remote_id: &RemoteId) -> Result<(), ClientError>;
}
