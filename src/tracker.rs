//! Lifecycle tracking for one uploaded media asset.
//!
//! The tracker drives an asset through
//!
//! ```text
//! Submitted -> Processing -> Ready
//! Submitted -> Processing -> Failed
//! Processing -> Processing
//! any -> Deleted
//! ```
//!
//! and refuses to query anything that is not `Ready`.

use std::cmp;
use std::pin::pin;
use std::time::Duration;

use futures::{Stream, StreamExt};
use thiserror::Error;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use crate::client::{ClientError, MediaBackend};
use crate::model::{
    Answer, AssetState, InvalidTransition, MediaSource, PromptPart, RemoteAsset, RemoteId,
    UploadBody,
};
use crate::options::{PollOptions, TrackerOptions};
use crate::staging::StagedFile;

/// Errors surfaced by [`RemoteJobTracker`] operations.
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("upload failed: {0}")]
    Upload(#[source] ClientError),

    #[error(
        "remote processing of {remote_id} failed: {}",
        .message.as_deref().unwrap_or("no details reported")
    )]
    RemoteProcessing {
        remote_id: RemoteId,
        message: Option<String>,
    },

    #[error("{remote_id} was not ready after {waited:?}")]
    Timeout { remote_id: RemoteId, waited: Duration },

    #[error("{remote_id} is {state}, not ready for queries")]
    NotReady { remote_id: RemoteId, state: AssetState },

    #[error("generation failed: {0}")]
    Generation(#[source] ClientError),

    #[error("status check failed: {0}")]
    Poll(#[source] ClientError),

    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),

    #[error("{0} has been deleted")]
    Deleted(RemoteId),

    #[error("no asset loaded")]
    NoAsset,
}

/// A remote deletion that was rejected. The asset is considered deleted anyway.
#[derive(Debug, Error)]
#[error("could not delete {remote_id}: {error}")]
pub struct DeletionWarning {
    pub remote_id: RemoteId,
    #[source]
    pub error: ClientError,
}

/// Submits media to a [`MediaBackend`], waits for it to be processed,
/// queries it and releases it.
pub struct RemoteJobTracker<B: MediaBackend> {
    backend: B,
    options: TrackerOptions,
}

impl<B: MediaBackend> RemoteJobTracker<B> {
    pub fn new(backend: B) -> Self {
        Self::with_options(backend, TrackerOptions::default())
    }

    pub fn with_options(backend: B, options: TrackerOptions) -> Self {
        Self { backend, options }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn options(&self) -> &TrackerOptions {
        &self.options
    }

    /// Upload `source` and return the new asset in the `Submitted` state.
    ///
    /// With staging enabled the payload is written to a temporary file first
    /// and the upload streams from that file. The file lives until
    /// [`await_ready`](Self::await_ready) finishes, the asset is released, or
    /// the asset is dropped; a failed upload removes it immediately.
    pub async fn submit(&self, source: MediaSource) -> Result<RemoteAsset, TrackerError> {
        if source.data.is_empty() {
            return Err(TrackerError::Upload(ClientError::Config(
                "media payload is empty".to_string(),
            )));
        }
        if source.mime_type.trim().is_empty() {
            return Err(TrackerError::Upload(ClientError::Config(
                "media type must be declared".to_string(),
            )));
        }

        let staged = match &self.options.staging_dir {
            Some(dir) => Some(
                StagedFile::create(dir, &source)
                    .await
                    .map_err(|e| TrackerError::Upload(ClientError::Io(e)))?,
            ),
            None => None,
        };

        let body = staged
            .as_ref()
            .map_or_else(|| UploadBody::from(&source), StagedFile::body);
        let name = source.display_name.clone();
        info!(
            "Uploading {} ({} bytes, {})",
            name.as_deref().unwrap_or("media"),
            source.data.len(),
            source.mime_type
        );

        let uploaded = self
            .backend
            .upload(&source, body)
            .await
            .map_err(TrackerError::Upload)?;

        info!("Uploaded as {}", uploaded.remote_id);
        Ok(RemoteAsset::submitted(uploaded, name, staged))
    }

    /// Check the remote state once, without waiting.
    ///
    /// Assets already in `Ready` or `Failed` are returned as-is without a
    /// network call.
    pub async fn poll_once(&self, asset: &mut RemoteAsset) -> Result<AssetState, TrackerError> {
        if asset.state() == AssetState::Deleted {
            return Err(TrackerError::Deleted(asset.remote_id().clone()));
        }
        if asset.state().is_terminal() {
            return Ok(asset.state());
        }

        let status = self
            .backend
            .get_status(asset.remote_id())
            .await
            .map_err(TrackerError::Poll)?;
        asset.mark_polled();

        let state = asset.observe(status)?;
        debug!("{} is {}", asset.remote_id(), state);
        Ok(state)
    }

    /// Stream every state observed while waiting for `asset` to become ready.
    ///
    /// The stream ends after yielding `Ready`. A reported failure is yielded as
    /// `Failed` and followed by a [`TrackerError::RemoteProcessing`] error;
    /// `Deleted`, a transport failure or an exhausted wait budget end the
    /// stream with a single error. Polls are spaced at least
    /// [`MIN_POLL_INTERVAL`](crate::options::MIN_POLL_INTERVAL) apart.
    /// Dropping the stream abandons the wait; the remote job keeps running and
    /// the asset keeps its last observed state. Any staged local copy is
    /// released once the stream completes or is dropped.
    pub fn watch<'a>(
        &'a self,
        asset: &'a mut RemoteAsset,
        options: PollOptions,
    ) -> impl Stream<Item = Result<AssetState, TrackerError>> + Send + 'a {
        async_stream::try_stream! {
            let _staged = asset.take_staged();
            let deadline = Instant::now() + options.max_wait;

            if let Some(status) = asset.take_pending() {
                let state = asset.observe(status)?;
                debug!("{} reported {} on upload", asset.remote_id(), state);
                yield state;
            }

            loop {
                let wake_at = match next_poll(asset, deadline, options)? {
                    Some(at) => at,
                    None => break,
                };
                sleep_until(wake_at).await;

                let state = self.poll_once(asset).await?;
                info!(
                    "{} state: {} (checking again in {:?})",
                    asset.remote_id(),
                    state,
                    options.effective_interval()
                );
                yield state;
            }
        }
    }

    /// Poll until `asset` is `Ready`.
    ///
    /// Fails with [`TrackerError::RemoteProcessing`] as soon as the service
    /// reports a failure and with [`TrackerError::Timeout`] once
    /// `options.max_wait` has been spent. A timed out job is not cancelled.
    pub async fn await_ready(
        &self,
        asset: &mut RemoteAsset,
        options: PollOptions,
    ) -> Result<(), TrackerError> {
        let mut updates = pin!(self.watch(asset, options));
        while let Some(update) = updates.next().await {
            update?;
        }
        Ok(())
    }

    /// Ask a question about a ready asset.
    ///
    /// Returns [`Answer::NoOutput`] when the model produced nothing, e.g. when
    /// the request was filtered. Nothing is sent unless the asset is `Ready`.
    pub async fn query(
        &self,
        asset: &RemoteAsset,
        prompt: &str,
        timeout: Duration,
    ) -> Result<Answer, TrackerError> {
        if asset.state() != AssetState::Ready {
            return Err(TrackerError::NotReady {
                remote_id: asset.remote_id().clone(),
                state: asset.state(),
            });
        }

        let parts = vec![asset.as_prompt_part(), PromptPart::Text(prompt.to_string())];
        let answer = tokio::time::timeout(timeout, self.backend.generate(parts, timeout))
            .await
            .map_err(|_| TrackerError::Generation(ClientError::TimedOut(timeout)))?
            .map_err(TrackerError::Generation)?;

        if let Answer::NoOutput(reason) = &answer {
            warn!("Model returned no output for {}: {}", asset.remote_id(), reason);
        }
        Ok(answer)
    }

    /// Delete the remote file and mark the asset `Deleted`.
    ///
    /// Releasing a deleted asset does nothing. A rejected deletion is logged
    /// and returned as a warning; the asset still ends up `Deleted`.
    pub async fn release(&self, asset: &mut RemoteAsset) -> Option<DeletionWarning> {
        if asset.state() == AssetState::Deleted {
            debug!("{} already deleted", asset.remote_id());
            return None;
        }

        let warning = match self.backend.delete(asset.remote_id()).await {
            Ok(()) => {
                info!("Deleted {}", asset.remote_id());
                None
            }
            Err(error) => {
                let warning = DeletionWarning {
                    remote_id: asset.remote_id().clone(),
                    error,
                };
                warn!("{}", warning);
                Some(warning)
            }
        };

        asset.mark_deleted();
        warning
    }
}

/// When to poll next, or `None` once the asset is ready.
fn next_poll(
    asset: &RemoteAsset,
    deadline: Instant,
    options: PollOptions,
) -> Result<Option<Instant>, TrackerError> {
    match asset.state() {
        AssetState::Ready => return Ok(None),
        AssetState::Failed => {
            return Err(TrackerError::RemoteProcessing {
                remote_id: asset.remote_id().clone(),
                message: asset.failure().map(str::to_string),
            })
        }
        AssetState::Deleted => return Err(TrackerError::Deleted(asset.remote_id().clone())),
        AssetState::Submitted | AssetState::Processing => {}
    }

    let now = Instant::now();
    if now >= deadline {
        return Err(TrackerError::Timeout {
            remote_id: asset.remote_id().clone(),
            waited: options.max_wait,
        });
    }
    Ok(Some(cmp::min(now + options.effective_interval(), deadline)))
}
