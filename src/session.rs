//! Conversation session over a single uploaded asset.

use tracing::info;

use crate::client::MediaBackend;
use crate::model::{Answer, AssetState, MediaSource, RemoteAsset, Turn};
use crate::options::SessionOptions;
use crate::tracker::{DeletionWarning, RemoteJobTracker, TrackerError};

/// Holds at most one remote asset and the questions asked about it.
///
/// Loading a new asset releases the previous one and starts a fresh
/// transcript, so a session never leaks more than the asset it currently holds.
///
/// # Example
/// ```no_run
/// use vidlens::{GeminiClient, MediaSource, RemoteJobTracker, Session};
///
/// # async fn run(video: Vec<u8>) -> Result<(), Box<dyn std::error::Error>> {
/// let tracker = RemoteJobTracker::new(GeminiClient::from_env()?);
/// let mut session = Session::new(tracker);
///
/// session
///     .load(MediaSource::new(video, "video/mp4").with_display_name("squat.mp4"))
///     .await?;
/// let answer = session.ask("Is the squat depth sufficient?").await?;
/// println!("{}", answer.text().unwrap_or("(no answer produced)"));
///
/// session.clear().await;
/// # Ok(())
/// # }
/// ```
pub struct Session<B: MediaBackend> {
    tracker: RemoteJobTracker<B>,
    options: SessionOptions,
    asset: Option<RemoteAsset>,
    transcript: Vec<Turn>,
}

impl<B: MediaBackend> Session<B> {
    pub fn new(tracker: RemoteJobTracker<B>) -> Self {
        Self {
            tracker,
            options: SessionOptions::default(),
            asset: None,
            transcript: Vec::new(),
        }
    }

    /// Set the polling and query options.
    pub fn with_options(mut self, options: SessionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn tracker(&self) -> &RemoteJobTracker<B> {
        &self.tracker
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub fn asset(&self) -> Option<&RemoteAsset> {
        self.asset.as_ref()
    }

    pub fn transcript(&self) -> &[Turn] {
        &self.transcript
    }

    /// Whether questions can be asked right now.
    pub fn is_ready(&self) -> bool {
        self.asset
            .as_ref()
            .is_some_and(|asset| asset.state() == AssetState::Ready)
    }

    /// Replace the current asset with a newly uploaded one and wait until it is ready.
    ///
    /// The new asset stays in the session even when waiting fails, so that
    /// [`clear`](Self::clear) or [`release`](Self::release) can still remove it.
    pub async fn load(&mut self, source: MediaSource) -> Result<&RemoteAsset, TrackerError> {
        self.discard_asset().await;
        self.transcript.clear();

        let asset = self.tracker.submit(source).await?;
        let asset = self.asset.insert(asset);
        self.tracker.await_ready(asset, self.options.poll).await?;

        info!(
            "{} is ready for questions",
            asset.display_name().unwrap_or(asset.remote_id().as_str())
        );
        Ok(&*asset)
    }

    /// Ask a question about the current asset and record the exchange.
    ///
    /// Failed queries leave the transcript untouched.
    pub async fn ask(&mut self, prompt: impl Into<String>) -> Result<Answer, TrackerError> {
        let prompt = prompt.into();
        let asset = self.asset.as_ref().ok_or(TrackerError::NoAsset)?;

        let answer = self
            .tracker
            .query(asset, &prompt, self.options.query_timeout)
            .await?;

        self.transcript.push(Turn::User(prompt));
        self.transcript.push(Turn::Assistant(answer.clone()));
        Ok(answer)
    }

    /// Delete the current asset remotely. The transcript is kept.
    pub async fn release(&mut self) -> Option<DeletionWarning> {
        match self.asset.as_mut() {
            Some(asset) => self.tracker.release(asset).await,
            None => None,
        }
    }

    /// Drop the transcript and delete and forget the current asset.
    pub async fn clear(&mut self) -> Option<DeletionWarning> {
        self.transcript.clear();
        self.discard_asset().await
    }

    async fn discard_asset(&mut self) -> Option<DeletionWarning> {
        let mut asset = self.asset.take()?;
        self.tracker.release(&mut asset).await
    }
}
