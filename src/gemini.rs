//! Generative model provider: Google Gemini `generateContent`

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::error::{ClassificationErrorKind, Result, TriageError};

/// Default Generative Language API base URL
pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Text generation from a single prompt
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    /// Generate text for `prompt`. An empty string is a valid answer.
    async fn generate(&self, api_key: &str, model: &str, prompt: &str) -> Result<String>;
}

#[derive(Debug, Deserialize)]
struct GoogleError {
    code: Option<u16>,
    message: String,
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: GoogleError,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

impl GenerateResponse {
    /// Concatenated text parts of the first candidate
    fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|candidate| candidate.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|part| part.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }
}

/// Gemini REST client
pub struct GeminiModel {
    client: reqwest::Client,
    endpoint: String,
}

impl GeminiModel {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), endpoint)
    }

    /// Use a preconfigured HTTP client
    pub fn with_client(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.endpoint, model)
    }
}

impl Default for GeminiModel {
    fn default() -> Self {
        Self::new(GEMINI_API_BASE)
    }
}

#[async_trait]
impl GenerativeModel for GeminiModel {
    async fn generate(&self, api_key: &str, model: &str, prompt: &str) -> Result<String> {
        let body = json!({
            "contents": [{
                "role": "user",
                "parts": [{ "text": prompt }]
            }]
        });

        debug!("Requesting {} ({} prompt bytes)", model, prompt.len());

        let response = self
            .client
            .post(self.url(model))
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let text = response.text().await.map_err(transport_error)?;

        if !status.is_success() {
            return Err(api_error(status.as_u16(), &text));
        }

        let parsed: GenerateResponse = serde_json::from_str(&text).map_err(|e| {
            TriageError::ClassificationError {
                kind: ClassificationErrorKind::Unknown,
                message: format!("Unexpected model response: {}", e),
            }
        })?;

        if let Some(reason) = parsed
            .prompt_feedback
            .as_ref()
            .and_then(|feedback| feedback.block_reason.as_deref())
        {
            return Err(TriageError::ClassificationError {
                kind: ClassificationErrorKind::Unknown,
                message: format!("Prompt was blocked by the model: {}", reason),
            });
        }

        Ok(parsed.text())
    }
}

/// Map a non-success HTTP response, preferring Google's structured error body
fn api_error(status: u16, body: &str) -> TriageError {
    let (code, rpc_status, message) = match serde_json::from_str::<ErrorResponse>(body) {
        Ok(parsed) => (
            parsed.error.code.unwrap_or(status),
            parsed.error.status,
            parsed.error.message,
        ),
        Err(_) => (status, None, body.to_string()),
    };

    let kind = ClassificationErrorKind::from_status(code)
        .or_else(|| rpc_status.as_deref().and_then(ClassificationErrorKind::from_rpc_status))
        .unwrap_or_else(|| ClassificationErrorKind::from_message(&message));

    TriageError::ClassificationError {
        kind,
        message: format!("HTTP {}: {}", code, message),
    }
}

fn transport_error(error: reqwest::Error) -> TriageError {
    let message = error.to_string();
    let kind = if error.is_timeout() || error.is_connect() {
        ClassificationErrorKind::Network
    } else {
        ClassificationErrorKind::from_message(&message)
    };

    TriageError::ClassificationError { kind, message }
}
