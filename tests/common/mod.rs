#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use vidlens::client::{ClientError, MediaBackend};
use vidlens::model::{
    Answer, MediaSource, PromptPart, RemoteId, RemoteStatus, UploadBody, UploadedFile,
};

/// Scripted backend. The first status is returned by `upload`, the rest by
/// successive `get_status` calls; once the script runs out every poll reports
/// `Processing`.
#[derive(Clone, Default)]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
}

#[derive(Default)]
struct MockState {
    statuses: VecDeque<RemoteStatus>,
    answers: VecDeque<Answer>,
    generate_delay: Option<Duration>,
    reject_upload: bool,
    reject_delete: bool,
    uploads: Vec<MediaSource>,
    upload_bodies: Vec<UploadBody>,
    uploaded_bytes: Vec<Vec<u8>>,
    status_calls: usize,
    generate_calls: Vec<Vec<PromptPart>>,
    delete_calls: Vec<RemoteId>,
}

impl MockBackend {
    pub fn new(statuses: Vec<RemoteStatus>) -> Self {
        let backend = Self::default();
        backend.state.lock().unwrap().statuses = statuses.into();
        backend
    }

    pub fn with_answers(self, answers: Vec<Answer>) -> Self {
        self.state.lock().unwrap().answers = answers.into();
        self
    }

    pub fn with_generate_delay(self, delay: Duration) -> Self {
        self.state.lock().unwrap().generate_delay = Some(delay);
        self
    }

    pub fn rejecting_uploads(self) -> Self {
        self.state.lock().unwrap().reject_upload = true;
        self
    }

    pub fn rejecting_deletes(self) -> Self {
        self.state.lock().unwrap().reject_delete = true;
        self
    }

    pub fn push_statuses(&self, statuses: Vec<RemoteStatus>) {
        self.state.lock().unwrap().statuses.extend(statuses);
    }

    pub fn upload_count(&self) -> usize {
        self.state.lock().unwrap().uploads.len()
    }

    pub fn upload_bodies(&self) -> Vec<UploadBody> {
        self.state.lock().unwrap().upload_bodies.clone()
    }

    /// Bytes read from each upload body at the time it was sent.
    pub fn uploaded_bytes(&self) -> Vec<Vec<u8>> {
        self.state.lock().unwrap().uploaded_bytes.clone()
    }

    pub fn status_calls(&self) -> usize {
        self.state.lock().unwrap().status_calls
    }

    pub fn generate_calls(&self) -> Vec<Vec<PromptPart>> {
        self.state.lock().unwrap().generate_calls.clone()
    }

    pub fn delete_calls(&self) -> Vec<RemoteId> {
        self.state.lock().unwrap().delete_calls.clone()
    }
}

#[async_trait]
impl MediaBackend for MockBackend {
    async fn upload(
        &self,
        source: &MediaSource,
        body: UploadBody,
    ) -> Result<UploadedFile, ClientError> {
        let bytes = match &body {
            UploadBody::Memory(data) => data.to_vec(),
            UploadBody::File { path, .. } => tokio::fs::read(path).await?,
        };
        let mut state = self.state.lock().unwrap();
        if state.reject_upload {
            return Err(ClientError::ProviderError(
                "Gemini error (400): file too large".to_string(),
            ));
        }
        state.uploads.push(source.clone());
        state.upload_bodies.push(body);
        state.uploaded_bytes.push(bytes);
        let n = state.uploads.len();
        let status = state.statuses.pop_front().unwrap_or(RemoteStatus::Processing);

        Ok(UploadedFile {
            remote_id: RemoteId::new(format!("files/mock-{n}")),
            uri: Some(format!("https://files.example.test/mock-{n}")),
            mime_type: source.mime_type.clone(),
            status,
        })
    }

    async fn get_status(&self, _remote_id: &RemoteId) -> Result<RemoteStatus, ClientError> {
        let mut state = self.state.lock().unwrap();
        state.status_calls += 1;
        Ok(state.statuses.pop_front().unwrap_or(RemoteStatus::Processing))
    }

    async fn generate(
        &self,
        parts: Vec<PromptPart>,
        _timeout: Duration,
    ) -> Result<Answer, ClientError> {
        let (delay, answer) = {
            let mut state = self.state.lock().unwrap();
            state.generate_calls.push(parts);
            (state.generate_delay, state.answers.pop_front())
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        answer.ok_or_else(|| ClientError::ProviderError("No more mock answers".to_string()))
    }

    async fn delete(&self, remote_id: &RemoteId) -> Result<(), ClientError> {
        let mut state = self.state.lock().unwrap();
        state.delete_calls.push(remote_id.clone());
        if state.reject_delete {
            return Err(ClientError::ProviderError(
                "Gemini error (404): file not found".to_string(),
            ));
        }
        Ok(())
    }
}

pub fn video() -> MediaSource {
    MediaSource::new(&b"\x00\x00\x00\x18ftypmp42"[..], "video/mp4").with_display_name("squat.mp4")
}

pub fn failed(message: &str) -> RemoteStatus {
    RemoteStatus::Failed {
        message: Some(message.to_string()),
    }
}
