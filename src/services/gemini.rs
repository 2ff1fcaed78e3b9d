use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::env_string;
use crate::services::ai_error::AiError;
use crate::services::credentials::Credential;

const DEFAULT_MODEL: &str = "gemini-2.0-flash";
const DEFAULT_API_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_TIMEOUT_MS: u64 = 60_000;

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub model: String,
    pub api_endpoint: String,
    pub timeout: Duration,
    pub max_attempts: Option<usize>,
}

impl GeminiConfig {
    pub fn from_env() -> Self {
        Self {
            model: env_string("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            api_endpoint: env_string("GEMINI_API_ENDPOINT")
                .unwrap_or_else(|| DEFAULT_API_ENDPOINT.to_string())
                .trim_end_matches('/')
                .to_string(),
            timeout: Duration::from_millis(
                env_string("GEMINI_TIMEOUT_MS")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(DEFAULT_TIMEOUT_MS),
            ),
            max_attempts: attempt_cap(env_string("GEMINI_MAX_ATTEMPTS")),
        }
    }
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            api_endpoint: DEFAULT_API_ENDPOINT.to_string(),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            max_attempts: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseFormat {
    #[default]
    Text,
    Json,
}

/// A single-turn generation request.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GenerationRequest {
    pub prompt: String,
    pub system_instruction: Option<String>,
    pub format: ResponseFormat,
    /// Lets the model ground its answer with Google Search.
    pub search_grounding: bool,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Self::default()
        }
    }

    pub fn with_system(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }

    pub fn json(mut self) -> Self {
        self.format = ResponseFormat::Json;
        self
    }

    pub fn with_search_grounding(mut self) -> Self {
        self.search_grounding = true;
        self
    }
}

/// Text generation with an explicitly supplied credential.
pub trait GenerativeBackend: Send + Sync {
    fn generate(
        &self,
        credential: &Credential,
        request: &GenerationRequest,
    ) -> impl Future<Output = Result<String, AiError>> + Send;
}

#[derive(Clone)]
pub struct GeminiClient {
    config: GeminiConfig,
    client: reqwest::Client,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { config, client }
    }

    pub fn from_env() -> Self {
        Self::new(GeminiConfig::from_env())
    }

    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    fn url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.api_endpoint, self.config.model
        )
    }
}

impl GenerativeBackend for GeminiClient {
    async fn generate(
        &self,
        credential: &Credential,
        request: &GenerationRequest,
    ) -> Result<String, AiError> {
        let payload = GenerateContentRequest::from(request);
        let resp = self
            .client
            .post(self.url())
            .header("x-goog-api-key", credential.secret())
            .json(&payload)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(AiError::from_response_body(status, &body));
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&body).map_err(|e| {
            tracing::error!(error = %e, "failed to parse Gemini response");
            AiError::Json(e)
        })?;
        parsed.into_text()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<PartOut<'a>>,
}

#[derive(Debug, Serialize)]
struct PartOut<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
}

impl<'a> From<&'a GenerationRequest> for GenerateContentRequest<'a> {
    fn from(request: &'a GenerationRequest) -> Self {
        Self {
            contents: vec![Content {
                role: Some("user"),
                parts: vec![PartOut {
                    text: &request.prompt,
                }],
            }],
            system_instruction: request.system_instruction.as_deref().map(|text| Content {
                role: None,
                parts: vec![PartOut { text }],
            }),
            generation_config: (request.format == ResponseFormat::Json).then_some(
                GenerationConfig {
                    response_mime_type: "application/json",
                },
            ),
            tools: if request.search_grounding {
                vec![serde_json::json!({ "google_search": {} })]
            } else {
                Vec::new()
            },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<PartIn>,
}

#[derive(Debug, Deserialize)]
struct PartIn {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

impl GenerateContentResponse {
    fn into_text(self) -> Result<String, AiError> {
        if let Some(reason) = self.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(AiError::Blocked(reason));
        }

        let candidate = self.candidates.into_iter().next().ok_or(AiError::EmptyResponse)?;
        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.is_empty() {
            return Err(match candidate.finish_reason {
                Some(reason) if reason != "STOP" => AiError::Blocked(reason),
                _ => AiError::EmptyResponse,
            });
        }
        Ok(text)
    }
}

// A zero cap would disable every call while keys are loaded.
fn attempt_cap(value: Option<String>) -> Option<usize> {
    value
        .and_then(|v| v.trim().parse::<usize>().ok())
        .filter(|n| *n > 0)
}
