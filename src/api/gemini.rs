//! Google Gemini Files API backend.
//!
//! Media is uploaded through the resumable upload protocol, polled through
//! `files.get`, referenced in `generateContent` via `fileData`, and removed
//! with `files.delete`.
//! See: <https://ai.google.dev/api/files>

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use std::time::Duration;

use crate::client::{ClientError, MediaBackend};
use crate::http::{add_extra_headers, build_http_client, RequestBuilderExt, ResponseExt};
use crate::model::{
    Answer, MediaSource, NoOutputReason, PromptPart, RemoteId, RemoteStatus, UploadBody,
    UploadedFile,
};
use crate::options::{ModelOptions, TransportOptions};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Environment variables checked by [`GeminiClient::from_env`], in order.
pub const API_KEY_VARS: [&str; 2] = ["GEMINI_API_KEY", "GOOGLE_API_KEY"];

const API_KEY_HEADER: &str = "x-goog-api-key";
const UPLOAD_URL_HEADER: &str = "x-goog-upload-url";

/// Gemini-specific model options.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GeminiModel {
    pub top_k: Option<u32>,
}

/// Gemini client using HTTP transport.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    api_key: String,
    base_url: String,
    model_options: ModelOptions<GeminiModel>,
    transport_options: TransportOptions,
}

impl GeminiClient {
    /// Create a new Gemini client.
    pub fn new(
        api_key: String,
        base_url: String,
        model_options: ModelOptions<GeminiModel>,
        transport_options: TransportOptions,
    ) -> Self {
        Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model_options,
            transport_options,
        }
    }

    /// Create a client for [`DEFAULT_MODEL`] using the first API key found in [`API_KEY_VARS`].
    pub fn from_env() -> Result<Self, ClientError> {
        let api_key = API_KEY_VARS
            .iter()
            .find_map(|var| std::env::var(var).ok().filter(|v| !v.trim().is_empty()))
            .ok_or_else(|| {
                ClientError::Config(format!("none of {} is set", API_KEY_VARS.join(", ")))
            })?;

        Ok(Self::new(
            api_key,
            DEFAULT_BASE_URL.to_string(),
            ModelOptions::new(DEFAULT_MODEL),
            TransportOptions::default(),
        ))
    }

    pub fn model_options(&self) -> &ModelOptions<GeminiModel> {
        &self.model_options
    }

    pub fn transport_options(&self) -> &TransportOptions {
        &self.transport_options
    }

    /// Start an authenticated request carrying the configured extra headers.
    fn request(&self, method: Method, url: &str) -> Result<RequestBuilder, ClientError> {
        let http_client = build_http_client(&self.transport_options)?;
        let req = http_client
            .request(method, url)
            .header(API_KEY_HEADER, &self.api_key);
        Ok(add_extra_headers(req, &self.transport_options))
    }

    fn file_url(&self, remote_id: &RemoteId) -> String {
        format!("{}/v1beta/{}", self.base_url, remote_id)
    }

    /// Send a request and turn non-success statuses into provider errors.
    async fn send(req: RequestBuilder) -> Result<reqwest::Response, ClientError> {
        let response = req.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text_logged().await.unwrap_or_default();
            return Err(Self::handle_error_response(status, &body));
        }
        Ok(response)
    }

    /// Handle Gemini error responses.
    fn handle_error_response(status: reqwest::StatusCode, body: &str) -> ClientError {
        if let Ok(error_resp) = serde_json::from_str::<GeminiErrorResponse>(body) {
            ClientError::ProviderError(format!(
                "Gemini error ({}): {}",
                error_resp.error.code, error_resp.error.message
            ))
        } else {
            ClientError::ProviderError(format!("HTTP {}: {}", status, body))
        }
    }
}

impl GeminiRequest {
    fn new(parts: Vec<PromptPart>, model_options: &ModelOptions<GeminiModel>) -> Self {
        GeminiRequest {
            system_instruction: model_options.system.as_ref().map(|system| GeminiContent {
                role: None,
                parts: vec![GeminiPart::Text {
                    text: system.clone(),
                }],
            }),
            contents: vec![GeminiContent {
                role: Some(GeminiRole::User),
                parts: parts.into_iter().map(GeminiPart::from).collect(),
            }],
            generation_config: Some(GeminiGenerationConfig {
                temperature: model_options.temperature,
                top_p: model_options.top_p,
                top_k: model_options.provider.top_k,
                max_output_tokens: model_options.max_tokens,
            }),
        }
    }
}

impl From<PromptPart> for GeminiPart {
    fn from(part: PromptPart) -> Self {
        match part {
            PromptPart::Text(text) => GeminiPart::Text { text },
            PromptPart::File { uri, mime_type } => GeminiPart::FileData {
                file_data: GeminiFileData {
                    mime_type,
                    file_uri: uri,
                },
            },
        }
    }
}

impl From<GeminiFile> for RemoteStatus {
    fn from(file: GeminiFile) -> Self {
        match file.state {
            GeminiFileState::Active => RemoteStatus::Ready,
            GeminiFileState::Failed => RemoteStatus::Failed {
                message: file.error.and_then(|e| e.message),
            },
            GeminiFileState::Processing | GeminiFileState::StateUnspecified => {
                RemoteStatus::Processing
            }
            GeminiFileState::Other => {
                tracing::debug!("Unknown file state for {}, treating as processing", file.name);
                RemoteStatus::Processing
            }
        }
    }
}

impl From<GeminiResponse> for Answer {
    fn from(resp: GeminiResponse) -> Self {
        if let Some(usage) = &resp.usage_metadata {
            tracing::debug!(
                "Gemini usage: {} prompt tokens, {} candidate tokens",
                usage.prompt_token_count.unwrap_or_default(),
                usage.candidates_token_count.unwrap_or_default()
            );
        }

        let candidate = resp.candidates.into_iter().next();
        let text = candidate
            .as_ref()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter(|p| !p.thought.unwrap_or_default())
                    .filter_map(|p| p.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default();

        if !text.is_empty() {
            return Answer::Text(text);
        }

        let reason = resp
            .prompt_feedback
            .and_then(|f| f.block_reason)
            .or_else(|| candidate.and_then(|c| c.finish_reason));
        Answer::NoOutput(NoOutputReason { reason })
    }
}

#[async_trait]
impl MediaBackend for GeminiClient {
    async fn upload(
        &self,
        source: &MediaSource,
        body: UploadBody,
    ) -> Result<UploadedFile, ClientError> {
        let start_url = format!("{}/upload/v1beta/files", self.base_url);
        let metadata = GeminiUploadMetadata {
            file: GeminiUploadFile {
                display_name: source.display_name.clone(),
            },
        };

        let start = self
            .request(Method::POST, &start_url)?
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", body.len())
            .header("X-Goog-Upload-Header-Content-Type", &source.mime_type)
            .header(CONTENT_TYPE, "application/json")
            .json_logged(&metadata);
        let start_response = Self::send(start).await?;

        let upload_url = start_response
            .headers()
            .get(UPLOAD_URL_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                ClientError::ProviderError("upload session returned no upload URL".to_string())
            })?;

        let finish = self
            .request(Method::POST, &upload_url)?
            .header("X-Goog-Upload-Offset", 0)
            .header("X-Goog-Upload-Command", "upload, finalize");
        let finish = match body {
            UploadBody::Memory(data) => finish.bytes_logged(data),
            UploadBody::File { path, len } => {
                finish.file_logged(tokio::fs::File::open(&path).await?, len)
            }
        };
        let uploaded: GeminiUploadResponse = Self::send(finish).await?.json_logged().await?;

        let file = uploaded.file;
        Ok(UploadedFile {
            remote_id: RemoteId::new(file.name.clone()),
            uri: file.uri.clone(),
            mime_type: file
                .mime_type
                .clone()
                .unwrap_or_else(|| source.mime_type.clone()),
            status: file.into(),
        })
    }

    async fn get_status(&self, remote_id: &RemoteId) -> Result<RemoteStatus, ClientError> {
        let req = self.request(Method::GET, &self.file_url(remote_id))?;
        let file: GeminiFile = Self::send(req).await?.json_logged().await?;
        Ok(file.into())
    }

    async fn generate(
        &self,
        parts: Vec<PromptPart>,
        timeout: Duration,
    ) -> Result<Answer, ClientError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model_options.model
        );
        let request_body = GeminiRequest::new(parts, &self.model_options);

        let req = self
            .request(Method::POST, &url)?
            .timeout(timeout)
            .header(CONTENT_TYPE, "application/json")
            .json_logged(&request_body);

        let response = Self::send(req).await.map_err(|e| match e {
            ClientError::Http(err) if err.is_timeout() => ClientError::TimedOut(timeout),
            other => other,
        })?;
        let gemini_response: GeminiResponse = response.json_logged().await?;
        Ok(gemini_response.into())
    }

    async fn delete(&self, remote_id: &RemoteId) -> Result<(), ClientError> {
        let req = self.request(Method::DELETE, &self.file_url(remote_id))?;
        Self::send(req).await?;
        Ok(())
    }
}

// --- Gemini API Request/Response Types ---

#[derive(Debug, Clone, Serialize)]
struct GeminiUploadMetadata {
    file: GeminiUploadFile,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize)]
struct GeminiUploadFile {
    display_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct GeminiUploadResponse {
    file: GeminiFile,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiFile {
    name: String,
    uri: Option<String>,
    mime_type: Option<String>,
    #[serde(default)]
    state: GeminiFileState,
    error: Option<GeminiStatus>,
}

#[derive(Debug, Copy, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
enum GeminiFileState {
    #[default]
    StateUnspecified,
    Processing,
    Active,
    Failed,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
struct GeminiStatus {
    message: Option<String>,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    system_instruction: Option<GeminiContent>,
    contents: Vec<GeminiContent>,
    generation_config: Option<GeminiGenerationConfig>,
}

#[derive(Debug, Copy, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum GeminiRole {
    User,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize)]
struct GeminiContent {
    role: Option<GeminiRole>,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiFileData {
    mime_type: String,
    file_uri: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged, rename_all_fields = "camelCase")]
enum GeminiPart {
    Text { text: String },
    FileData { file_data: GeminiFileData },
}

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    temperature: Option<f32>,
    top_p: Option<f32>,
    top_k: Option<u32>,
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    prompt_feedback: Option<GeminiPromptFeedback>,
    usage_metadata: Option<GeminiUsageMetadata>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiResponseContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Clone, Deserialize)]
struct GeminiResponsePart {
    text: Option<String>,
    thought: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Copy, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsageMetadata {
    prompt_token_count: Option<u32>,
    candidates_token_count: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
struct GeminiErrorResponse {
    error: GeminiError,
}

#[derive(Debug, Clone, Deserialize)]
struct GeminiError {
    code: u32,
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn answer(body: serde_json::Value) -> Answer {
        serde_json::from_value::<GeminiResponse>(body).unwrap().into()
    }

    #[test]
    fn joins_text_parts_and_skips_thoughts() {
        let a = answer(json!({
            "candidates": [{
                "content": {"role": "model", "parts": [
                    {"text": "thinking...", "thought": true},
                    {"text": "The athlete "},
                    {"text": "is squatting."}
                ]},
                "finishReason": "STOP"
            }]
        }));
        assert_eq!(a, Answer::Text("The athlete is squatting.".to_string()));
    }

    #[test]
    fn blocked_prompt_is_no_output() {
        let a = answer(json!({"promptFeedback": {"blockReason": "SAFETY"}}));
        assert_eq!(
            a,
            Answer::NoOutput(NoOutputReason {
                reason: Some("SAFETY".to_string())
            })
        );
    }

    #[test]
    fn candidate_without_content_reports_finish_reason() {
        let a = answer(json!({"candidates": [{"finishReason": "RECITATION"}]}));
        assert_eq!(
            a,
            Answer::NoOutput(NoOutputReason {
                reason: Some("RECITATION".to_string())
            })
        );
    }

    #[test]
    fn file_states_map_to_remote_status() {
        let file = |state: &str| -> GeminiFile {
            serde_json::from_value(json!({"name": "files/abc", "state": state})).unwrap()
        };
        assert_eq!(RemoteStatus::from(file("PROCESSING")), RemoteStatus::Processing);
        assert_eq!(RemoteStatus::from(file("STATE_UNSPECIFIED")), RemoteStatus::Processing);
        assert_eq!(RemoteStatus::from(file("ACTIVE")), RemoteStatus::Ready);
        assert_eq!(RemoteStatus::from(file("SOMETHING_NEW")), RemoteStatus::Processing);

        let failed: GeminiFile = serde_json::from_value(json!({
            "name": "files/abc",
            "state": "FAILED",
            "error": {"code": 3, "message": "unsupported codec"}
        }))
        .unwrap();
        assert_eq!(
            RemoteStatus::from(failed),
            RemoteStatus::Failed {
                message: Some("unsupported codec".to_string())
            }
        );
    }

    #[test]
    fn request_places_file_before_prompt_and_system_separately() {
        let options = ModelOptions::<GeminiModel>::new(DEFAULT_MODEL).with_system("Be precise.");
        let request = GeminiRequest::new(
            vec![
                PromptPart::File {
                    uri: "https://example.test/files/abc".to_string(),
                    mime_type: "video/mp4".to_string(),
                },
                PromptPart::Text("What exercise is this?".to_string()),
            ],
            &options,
        );

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value["systemInstruction"],
            json!({"parts": [{"text": "Be precise."}]})
        );
        assert_eq!(
            value["contents"],
            json!([{
                "role": "user",
                "parts": [
                    {"fileData": {"mimeType": "video/mp4", "fileUri": "https://example.test/files/abc"}},
                    {"text": "What exercise is this?"}
                ]
            }])
        );
        assert_eq!(value["generationConfig"], json!({}));
    }
}
