#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;

use reqwest::StatusCode;
use tempfile::TempDir;

use student_analyzer::db::{Database, DbConfig, Statement};
use student_analyzer::params;
use student_analyzer::services::{AiError, Credential, GenerationRequest, GenerativeBackend};

pub async fn create_test_database() -> (TempDir, Database) {
    let dir = TempDir::new().expect("failed to create temp dir");
    let config = DbConfig::embedded(dir.path().join("data").join("test.db"));
    let db = Database::connect_and_migrate(&config)
        .await
        .expect("failed to open test database");
    (dir, db)
}

pub async fn create_user(db: &Database) -> i64 {
    let username = format!("user-{}", uuid::Uuid::new_v4());
    db.execute(
        &Statement::insert("users", &["username", "password"]),
        &params![username, "pw"],
    )
    .await
    .expect("insert user")
    .last_insert_id
    .expect("generated user id")
}

/// What the scripted backend answers for one credential.
#[derive(Debug, Clone)]
pub enum Reply {
    Text(String),
    RateLimited,
    Expired,
    ServerError,
}

impl Reply {
    pub fn text(s: &str) -> Self {
        Reply::Text(s.to_string())
    }

    fn into_result(self) -> Result<String, AiError> {
        match self {
            Reply::Text(text) => Ok(text),
            Reply::RateLimited => Err(AiError::http(StatusCode::TOO_MANY_REQUESTS, "quota exceeded")),
            Reply::Expired => Err(AiError::CredentialRejected("API key expired".into())),
            Reply::ServerError => Err(AiError::http(StatusCode::INTERNAL_SERVER_ERROR, "boom")),
        }
    }
}

/// Backend whose reply depends only on the credential secret; records every
/// call in order.
#[derive(Default)]
pub struct ScriptedBackend {
    replies: HashMap<String, Reply>,
    default_reply: Option<Reply>,
    calls: Mutex<Vec<(String, GenerationRequest)>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(mut self, secret: &str, reply: Reply) -> Self {
        self.replies.insert(secret.to_string(), reply);
        self
    }

    pub fn otherwise(mut self, reply: Reply) -> Self {
        self.default_reply = Some(reply);
        self
    }

    pub fn secrets_called(&self) -> Vec<String> {
        self.calls
            .lock()
            .expect("calls lock")
            .iter()
            .map(|(secret, _)| secret.clone())
            .collect()
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.calls
            .lock()
            .expect("calls lock")
            .iter()
            .map(|(_, request)| request.clone())
            .collect()
    }
}

impl GenerativeBackend for ScriptedBackend {
    async fn generate(
        &self,
        credential: &Credential,
        request: &GenerationRequest,
    ) -> Result<String, AiError> {
        self.calls
            .lock()
            .expect("calls lock")
            .push((credential.secret().to_string(), request.clone()));

        self.replies
            .get(credential.secret())
            .or(self.default_reply.as_ref())
            .cloned()
            .unwrap_or(Reply::ServerError)
            .into_result()
    }
}

pub const VALID_QUIZ: &str = r#"{
    "questions": ["What is 2+2?"],
    "options": [["3", "4", "5", "6"]],
    "answers": ["4"],
    "explanations": ["Basic addition."]
}"#;
