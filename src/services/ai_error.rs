use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How a failed generative call should be treated by the invoker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AiErrorKind {
    RateLimited,
    CredentialInvalid,
    Unavailable,
}

impl AiErrorKind {
    /// Whether another credential may succeed where this one failed.
    pub fn is_retryable(self) -> bool {
        matches!(self, AiErrorKind::RateLimited | AiErrorKind::CredentialInvalid)
    }
}

#[derive(Debug, Error)]
pub enum AiError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("HTTP {status}: {message}")]
    HttpStatus {
        status: StatusCode,
        /// Canonical status name from the error body, e.g. `RESOURCE_EXHAUSTED`.
        api_status: Option<String>,
        message: String,
    },
    #[error("credential rejected: {0}")]
    CredentialRejected(String),
    #[error("JSON decode failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("empty response")]
    EmptyResponse,
    #[error("response blocked: {0}")]
    Blocked(String),
    #[error("invalid output: {0}")]
    InvalidOutput(String),
}

impl AiError {
    pub fn http(status: StatusCode, message: impl Into<String>) -> Self {
        AiError::HttpStatus {
            status,
            api_status: None,
            message: message.into(),
        }
    }

    /// Builds the error for a non-success response, reading Google's error
    /// envelope when the body carries one.
    pub fn from_response_body(status: StatusCode, body: &str) -> Self {
        match serde_json::from_str::<ApiErrorEnvelope>(body) {
            Ok(envelope) => {
                let expired = envelope
                    .error
                    .details
                    .iter()
                    .any(|d| d.reason.as_deref() == Some("API_KEY_INVALID"));
                if expired {
                    return AiError::CredentialRejected(envelope.error.message);
                }
                AiError::HttpStatus {
                    status,
                    api_status: envelope.error.status,
                    message: envelope.error.message,
                }
            }
            Err(_) => AiError::http(status, body.trim()),
        }
    }

    pub fn kind(&self) -> AiErrorKind {
        match self {
            AiError::HttpStatus {
                status, api_status, ..
            } => classify_status(*status, api_status.as_deref()),
            AiError::CredentialRejected(_) => AiErrorKind::CredentialInvalid,
            AiError::Request(_)
            | AiError::Json(_)
            | AiError::EmptyResponse
            | AiError::Blocked(_)
            | AiError::InvalidOutput(_) => AiErrorKind::Unavailable,
        }
    }
}

fn classify_status(status: StatusCode, api_status: Option<&str>) -> AiErrorKind {
    if status == StatusCode::TOO_MANY_REQUESTS || api_status == Some("RESOURCE_EXHAUSTED") {
        return AiErrorKind::RateLimited;
    }
    match status {
        StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            AiErrorKind::CredentialInvalid
        }
        _ => AiErrorKind::Unavailable,
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    details: Vec<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    reason: Option<String>,
}
