//! Core data types: media payloads, remote assets and their states, prompts and answers.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use tokio::time::Instant;

use crate::staging::StagedFile;

/// Media payload handed to the tracker for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaSource {
    /// Raw bytes of the file.
    pub data: Bytes,
    /// Declared media type (e.g. `video/mp4`).
    pub mime_type: String,
    /// Optional human-readable name, used for logging and staging suffixes.
    pub display_name: Option<String>,
}

impl MediaSource {
    pub fn new(data: impl Into<Bytes>, mime_type: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            mime_type: mime_type.into(),
            display_name: None,
        }
    }

    /// Attach a display name.
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// File extension of the display name, including the leading dot.
    pub fn extension(&self) -> Option<&str> {
        let name = self.display_name.as_deref()?;
        let idx = name.rfind('.')?;
        if idx == 0 || idx + 1 == name.len() {
            return None;
        }
        Some(&name[idx..])
    }
}

/// Where the bytes of an upload are read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadBody {
    /// The in-memory payload.
    Memory(Bytes),
    /// A staged copy of the payload on local disk.
    File { path: PathBuf, len: u64 },
}

impl UploadBody {
    /// Size of the body in bytes.
    pub fn len(&self) -> u64 {
        match self {
            UploadBody::Memory(data) => data.len() as u64,
            UploadBody::File { len, .. } => *len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<&MediaSource> for UploadBody {
    fn from(source: &MediaSource) -> Self {
        UploadBody::Memory(source.data.clone())
    }
}

/// Opaque identifier assigned by the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteId(String);

impl RemoteId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RemoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Processing status as reported by the remote service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteStatus {
    Processing,
    Ready,
    Failed { message: Option<String> },
}

/// Local lifecycle state of a [`RemoteAsset`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetState {
    Submitted,
    Processing,
    Ready,
    Failed,
    Deleted,
}

impl AssetState {
    /// `Ready`, `Failed` and `Deleted` see no further automatic transition.
    pub fn is_terminal(self) -> bool {
        matches!(self, AssetState::Ready | AssetState::Failed | AssetState::Deleted)
    }

    /// Whether moving from `self` to `next` follows the lifecycle graph.
    pub fn can_transition_to(self, next: AssetState) -> bool {
        use AssetState::*;
        match (self, next) {
            (Deleted, _) => false,
            (_, Deleted) => true,
            (Submitted, Processing | Ready | Failed) => true,
            (Processing, Processing | Ready | Failed) => true,
            (Ready, Ready) | (Failed, Failed) => true,
            _ => false,
        }
    }
}

impl From<&RemoteStatus> for AssetState {
    fn from(status: &RemoteStatus) -> Self {
        match status {
            RemoteStatus::Processing => AssetState::Processing,
            RemoteStatus::Ready => AssetState::Ready,
            RemoteStatus::Failed { .. } => AssetState::Failed,
        }
    }
}

impl fmt::Display for AssetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AssetState::Submitted => "submitted",
            AssetState::Processing => "processing",
            AssetState::Ready => "ready",
            AssetState::Failed => "failed",
            AssetState::Deleted => "deleted",
        };
        f.write_str(name)
    }
}

/// A reported state that does not follow the lifecycle graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid state transition {from} -> {to}")]
pub struct InvalidTransition {
    pub from: AssetState,
    pub to: AssetState,
}

/// Result of a successful upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub remote_id: RemoteId,
    /// URI used to reference the file in generation requests.
    pub uri: Option<String>,
    pub mime_type: String,
    /// Status reported in the upload response.
    pub status: RemoteStatus,
}

/// A media file uploaded to, and tracked on, a remote inference service.
#[derive(Debug)]
pub struct RemoteAsset {
    remote_id: RemoteId,
    uri: Option<String>,
    mime_type: String,
    display_name: Option<String>,
    state: AssetState,
    history: Vec<AssetState>,
    failure: Option<String>,
    submitted_at: Instant,
    last_polled_at: Option<Instant>,
    pending: Option<RemoteStatus>,
    staged: Option<StagedFile>,
}

impl RemoteAsset {
    pub(crate) fn submitted(
        upload: UploadedFile,
        display_name: Option<String>,
        staged: Option<StagedFile>,
    ) -> Self {
        Self {
            remote_id: upload.remote_id,
            uri: upload.uri,
            mime_type: upload.mime_type,
            display_name,
            state: AssetState::Submitted,
            history: vec![AssetState::Submitted],
            failure: None,
            submitted_at: Instant::now(),
            last_polled_at: None,
            pending: Some(upload.status),
            staged,
        }
    }

    pub fn remote_id(&self) -> &RemoteId {
        &self.remote_id
    }

    pub fn uri(&self) -> Option<&str> {
        self.uri.as_deref()
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    pub fn state(&self) -> AssetState {
        self.state
    }

    /// Every state the asset has been in, oldest first.
    pub fn history(&self) -> &[AssetState] {
        &self.history
    }

    /// Failure message reported by the service, if processing failed.
    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    pub fn submitted_at(&self) -> Instant {
        self.submitted_at
    }

    pub fn last_polled_at(&self) -> Option<Instant> {
        self.last_polled_at
    }

    /// Whether a staged local copy is still held.
    pub fn is_staged(&self) -> bool {
        self.staged.is_some()
    }

    /// Reference to this asset for use inside a prompt.
    pub fn as_prompt_part(&self) -> PromptPart {
        PromptPart::File {
            uri: self
                .uri
                .clone()
                .unwrap_or_else(|| self.remote_id.as_str().to_string()),
            mime_type: self.mime_type.clone(),
        }
    }

    pub(crate) fn take_pending(&mut self) -> Option<RemoteStatus> {
        self.pending.take()
    }

    pub(crate) fn take_staged(&mut self) -> Option<StagedFile> {
        self.staged.take()
    }

    /// Record a fresh status check; it supersedes the status reported on upload.
    pub(crate) fn mark_polled(&mut self) {
        self.pending = None;
        self.last_polled_at = Some(Instant::now());
    }

    /// Apply a reported status, replacing the local state.
    pub(crate) fn observe(&mut self, status: RemoteStatus) -> Result<AssetState, InvalidTransition> {
        let next = AssetState::from(&status);
        if !self.state.can_transition_to(next) {
            return Err(InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        if let RemoteStatus::Failed { message } = status {
            self.failure = message;
        }
        self.enter(next);
        Ok(next)
    }

    pub(crate) fn mark_deleted(&mut self) {
        self.pending = None;
        self.staged = None;
        if self.state != AssetState::Deleted {
            self.enter(AssetState::Deleted);
        }
    }

    fn enter(&mut self, next: AssetState) {
        self.state = next;
        self.history.push(next);
    }
}

/// One piece of a generation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptPart {
    Text(String),
    File { uri: String, mime_type: String },
}

/// Why the service produced no answer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NoOutputReason {
    /// Block or finish reason reported by the provider, if any.
    pub reason: Option<String>,
}

impl fmt::Display for NoOutputReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            Some(reason) => write!(f, "no answer produced ({reason})"),
            None => f.write_str("no answer produced"),
        }
    }
}

/// Outcome of a query that reached the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    Text(String),
    /// The service answered but produced no output, e.g. because of safety filtering.
    NoOutput(NoOutputReason),
}

impl Answer {
    pub fn text(&self) -> Option<&str> {
        match self {
            Answer::Text(text) => Some(text),
            Answer::NoOutput(_) => None,
        }
    }

    pub fn is_no_output(&self) -> bool {
        matches!(self, Answer::NoOutput(_))
    }
}

/// One entry of a session transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Turn {
    User(String),
    Assistant(Answer),
}
