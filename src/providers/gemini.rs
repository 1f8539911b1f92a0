use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

use crate::config::Config;
use crate::credentials::Credential;
use crate::gateway::{
    ApiFuture, Content, FileUpload, GenerateRequest, GenerativeApi, ModelInfo, Part, RemoteFile,
    RemoteFileState,
};
use crate::providers::http_errors::api_request_error;

const API_VERSION: &str = "v1beta";
const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<WireContent>,
    generation_config: WireGenerationConfig,
}

#[derive(Debug, Serialize)]
struct WireContent {
    role: &'static str,
    parts: Vec<WirePart>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
enum WirePart {
    Text(String),
    FileData(WireFileData),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireFileData {
    mime_type: String,
    file_uri: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireGenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireModel {
    name: String,
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UploadFileResponse {
    file: WireFile,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireFile {
    name: String,
    #[serde(default)]
    uri: String,
    #[serde(default)]
    mime_type: String,
    #[serde(default)]
    state: Option<String>,
    expiration_time: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: Option<String>,
    status: Option<String>,
}

/// Gemini REST client. The API key is supplied once through `configure`.
#[derive(Debug)]
pub struct GeminiApi {
    client: Client,
    base_url: String,
    timeout_secs: u64,
    api_key: OnceLock<Credential>,
}

impl GeminiApi {
    pub fn new(cfg: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.request_timeout_secs))
            .build()
            .context("Failed to initialize HTTP client")?;
        Ok(Self {
            client,
            base_url: cfg.api_base_url.trim_end_matches('/').to_string(),
            timeout_secs: cfg.request_timeout_secs,
            api_key: OnceLock::new(),
        })
    }

    fn api_url(&self, path: &str) -> String {
        api_url(&self.base_url, path)
    }

    fn upload_url(&self) -> String {
        format!("{}/upload/{API_VERSION}/files", self.base_url)
    }

    fn authorized(&self, builder: RequestBuilder) -> Result<RequestBuilder> {
        let key = self
            .api_key
            .get()
            .ok_or_else(|| anyhow!("generative API used before a credential was configured"))?;
        Ok(builder.header(API_KEY_HEADER, key.expose()))
    }

    async fn send(&self, api_url: &str, builder: RequestBuilder) -> Result<Response> {
        let response = self
            .authorized(builder)?
            .send()
            .await
            .map_err(|err| {
                warn!(api_url = %api_url, error = %err, "gemini request failed");
                api_request_error(err, api_url, self.timeout_secs)
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let response_body = response
                .text()
                .await
                .unwrap_or_else(|_| "<failed to read response body>".to_string());
            warn!(
                api_url = %api_url,
                status = %status,
                response_body_len = response_body.len(),
                "gemini returned non-success status"
            );
            return Err(anyhow!(
                "Gemini request failed with status {}: {}",
                status,
                provider_error_message(&response_body)
            ));
        }

        Ok(response)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        api_url: &str,
        builder: RequestBuilder,
    ) -> Result<T> {
        self.send(api_url, builder)
            .await?
            .json()
            .await
            .with_context(|| format!("Failed to parse response from '{api_url}'"))
    }
}

impl GenerativeApi for GeminiApi {
    fn configure(&self, credential: &Credential) -> Result<()> {
        self.api_key
            .set(credential.clone())
            .map_err(|_| anyhow!("generative API client is already configured"))
    }

    fn describe_model<'a>(&'a self, model_id: &'a str) -> ApiFuture<'a, ModelInfo> {
        Box::pin(async move {
            let api_url = self.api_url(&model_path(model_id));
            debug!(api_url = %api_url, "looking up model");
            let model: WireModel = self
                .send_json(&api_url, self.client.get(&api_url))
                .await?;
            Ok(ModelInfo {
                name: model.name,
                display_name: model.display_name,
            })
        })
    }

    fn generate<'a>(&'a self, request: GenerateRequest) -> ApiFuture<'a, String> {
        Box::pin(async move {
            let api_url = self.api_url(&format!("{}:generateContent", model_path(&request.model_id)));
            let body = to_wire_request(&request);
            debug!(
                model = %request.model_id,
                content_count = body.contents.len(),
                "sending gemini generateContent request"
            );

            let parsed: GenerateContentResponse = self
                .send_json(&api_url, self.client.post(&api_url).json(&body))
                .await?;
            let text = response_text(parsed)?;
            debug!(model = %request.model_id, response_len = text.len(), "received gemini response");
            Ok(text)
        })
    }

    fn upload_file<'a>(&'a self, upload: FileUpload) -> ApiFuture<'a, RemoteFile> {
        Box::pin(async move {
            let api_url = self.upload_url();
            let boundary = multipart_boundary();
            let body = multipart_related_body(&boundary, &upload)?;
            debug!(
                api_url = %api_url,
                display_name = %upload.display_name,
                body_len = body.len(),
                "uploading file to gemini"
            );

            let builder = self
                .client
                .post(&api_url)
                .header("X-Goog-Upload-Protocol", "multipart")
                .header(
                    reqwest::header::CONTENT_TYPE,
                    format!("multipart/related; boundary={boundary}"),
                )
                .body(body);
            let parsed: UploadFileResponse = self.send_json(&api_url, builder).await?;
            Ok(to_remote_file(parsed.file))
        })
    }

    fn get_file<'a>(&'a self, name: &'a str) -> ApiFuture<'a, RemoteFile> {
        Box::pin(async move {
            let api_url = self.api_url(name);
            let file: WireFile = self.send_json(&api_url, self.client.get(&api_url)).await?;
            Ok(to_remote_file(file))
        })
    }

    fn delete_file<'a>(&'a self, name: &'a str) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            let api_url = self.api_url(name);
            self.send(&api_url, self.client.delete(&api_url)).await?;
            Ok(())
        })
    }
}

fn api_url(base_url: &str, path: &str) -> String {
    format!(
        "{}/{API_VERSION}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

fn model_path(model_id: &str) -> String {
    if model_id.starts_with("models/") {
        model_id.to_string()
    } else {
        format!("models/{model_id}")
    }
}

fn to_wire_request(request: &GenerateRequest) -> GenerateContentRequest {
    GenerateContentRequest {
        contents: request.contents.iter().map(to_wire_content).collect(),
        generation_config: WireGenerationConfig {
            temperature: request.params.temperature,
            max_output_tokens: request.params.max_output_tokens,
        },
    }
}

fn to_wire_content(content: &Content) -> WireContent {
    WireContent {
        role: content.role.as_str(),
        parts: content
            .parts
            .iter()
            .map(|part| match part {
                Part::Text(text) => WirePart::Text(text.clone()),
                Part::File { uri, media_type } => WirePart::FileData(WireFileData {
                    mime_type: media_type.clone(),
                    file_uri: uri.clone(),
                }),
            })
            .collect(),
    }
}

fn response_text(response: GenerateContentResponse) -> Result<String> {
    let Some(candidate) = response.candidates.into_iter().next() else {
        let reason = response
            .prompt_feedback
            .and_then(|feedback| feedback.block_reason)
            .unwrap_or_else(|| "no candidates returned".to_string());
        return Err(anyhow!("Gemini returned no answer: {reason}"));
    };

    let text: String = candidate
        .content
        .map(|content| content.parts)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|part| part.text)
        .collect();
    if text.is_empty() {
        let reason = candidate
            .finish_reason
            .unwrap_or_else(|| "empty response".to_string());
        return Err(anyhow!("Gemini returned no text: {reason}"));
    }
    Ok(text)
}

fn to_remote_file(file: WireFile) -> RemoteFile {
    let state = match file.state.as_deref() {
        Some("ACTIVE") => RemoteFileState::Active,
        Some("PROCESSING") => RemoteFileState::Processing,
        Some("FAILED") => RemoteFileState::Failed,
        _ => RemoteFileState::Unknown,
    };
    let expires_at = file
        .expiration_time
        .as_deref()
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|time| time.with_timezone(&Utc));

    RemoteFile {
        name: file.name,
        uri: file.uri,
        media_type: file.mime_type,
        state,
        expires_at,
    }
}

fn provider_error_message(body: &str) -> String {
    match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(parsed) => match (parsed.error.status, parsed.error.message) {
            (Some(status), Some(message)) => format!("{status}: {message}"),
            (None, Some(message)) => message,
            _ => body.to_string(),
        },
        Err(_) => body.to_string(),
    }
}

fn multipart_boundary() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    format!("gemini-chat-{nanos:x}")
}

/// Metadata part followed by the raw file bytes.
fn multipart_related_body(boundary: &str, upload: &FileUpload) -> Result<Vec<u8>> {
    let metadata = serde_json::json!({
        "file": { "displayName": upload.display_name }
    });
    let metadata =
        serde_json::to_vec(&metadata).context("Failed to encode file upload metadata")?;

    let mut body = Vec::with_capacity(upload.bytes.len() + metadata.len() + 256);
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
    body.extend_from_slice(&metadata);
    body.extend_from_slice(b"\r\n");
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", upload.media_type).as_bytes());
    body.extend_from_slice(&upload.bytes);
    body.extend_from_slice(b"\r\n");
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::{
        GenerateContentResponse, WireFile, api_url, model_path, multipart_related_body,
        provider_error_message, response_text, to_remote_file, to_wire_request,
    };
    use crate::gateway::{Content, FileUpload, GenerateRequest, Part, RemoteFileState, Role};
    use crate::model::GenerationParams;

    #[test]
    fn api_url_trims_slashes() {
        assert_eq!(
            api_url("https://example.test/", "/models/gemini-x"),
            "https://example.test/v1beta/models/gemini-x"
        );
    }

    #[test]
    fn model_path_adds_prefix_once() {
        assert_eq!(model_path("gemini-x"), "models/gemini-x");
        assert_eq!(model_path("models/gemini-x"), "models/gemini-x");
    }

    #[test]
    fn wire_request_uses_gemini_field_names() {
        let request = GenerateRequest {
            model_id: "gemini-x".to_string(),
            params: GenerationParams {
                temperature: 0.5,
                max_output_tokens: 100,
            },
            contents: vec![
                Content {
                    role: Role::User,
                    parts: vec![
                        Part::File {
                            uri: "https://files.test/files/1".to_string(),
                            media_type: "image/png".to_string(),
                        },
                        Part::text("what is this?"),
                    ],
                },
                Content {
                    role: Role::Model,
                    parts: vec![Part::text("a cat")],
                },
            ],
        };

        let json = serde_json::to_value(to_wire_request(&request)).expect("serialize");

        assert_eq!(json["generationConfig"]["temperature"], 0.5);
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 100);
        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(
            json["contents"][0]["parts"][0]["fileData"]["mimeType"],
            "image/png"
        );
        assert_eq!(
            json["contents"][0]["parts"][0]["fileData"]["fileUri"],
            "https://files.test/files/1"
        );
        assert_eq!(json["contents"][0]["parts"][1]["text"], "what is this?");
        assert_eq!(json["contents"][1]["role"], "model");
    }

    #[test]
    fn response_text_joins_candidate_parts() {
        let parsed: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"Hello, "},{"text":"world"}]},"finishReason":"STOP"}]}"#,
        )
        .expect("parse");
        assert_eq!(response_text(parsed).expect("text"), "Hello, world");
    }

    #[test]
    fn response_text_reports_block_reason() {
        let parsed: GenerateContentResponse =
            serde_json::from_str(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#)
                .expect("parse");
        let err = response_text(parsed).expect_err("blocked prompt should fail");
        assert!(err.to_string().contains("SAFETY"));
    }

    #[test]
    fn remote_file_maps_state_and_expiry() {
        let file: WireFile = serde_json::from_str(
            r#"{"name":"files/abc","uri":"https://x/files/abc","mimeType":"text/csv","state":"PROCESSING","expirationTime":"2026-10-20T10:30:00.123456Z"}"#,
        )
        .expect("parse");
        let remote = to_remote_file(file);
        assert_eq!(remote.state, RemoteFileState::Processing);
        assert_eq!(remote.name, "files/abc");
        assert!(remote.expires_at.is_some());
    }

    #[test]
    fn provider_error_message_prefers_structured_error() {
        assert_eq!(
            provider_error_message(
                r#"{"error":{"code":404,"message":"model not found","status":"NOT_FOUND"}}"#
            ),
            "NOT_FOUND: model not found"
        );
        assert_eq!(provider_error_message("gateway down"), "gateway down");
    }

    #[test]
    fn multipart_body_contains_metadata_and_bytes() {
        let body = multipart_related_body(
            "b1",
            &FileUpload {
                display_name: "notes.txt".to_string(),
                media_type: "text/plain".to_string(),
                bytes: b"hello".to_vec(),
            },
        )
        .expect("body");
        let text = String::from_utf8(body).expect("utf8");
        assert!(text.starts_with("--b1\r\n"));
        assert!(text.contains(r#""displayName":"notes.txt""#));
        assert!(text.contains("Content-Type: text/plain\r\n\r\nhello\r\n"));
        assert!(text.ends_with("--b1--\r\n"));
    }
}
