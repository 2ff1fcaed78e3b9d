pub mod config;
pub mod db;
pub mod logging;
pub mod routes;
pub mod services;
pub mod state;

use std::sync::Arc;

use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::Config;
use crate::services::{
    CredentialPool, GeminiClient, GroundedQuizAgent, RotatingInvoker, StudyAssistant,
};
use crate::state::AppState;

pub fn create_app(state: AppState) -> axum::Router {
    routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Builds the assistant from the environment: credential pool, Gemini
/// client and, when enabled, the grounded quiz agent.
pub fn build_assistant(config: &Config) -> StudyAssistant<GeminiClient> {
    let pool = CredentialPool::from_env();
    let client = Arc::new(GeminiClient::from_env());

    let mut invoker = RotatingInvoker::new(pool.clone());
    if let Some(max) = client.config().max_attempts {
        invoker = invoker.with_max_attempts(max);
    }
    tracing::info!(
        credentials = pool.len(),
        budget = invoker.attempt_budget(),
        model = %client.config().model,
        "AI credential pool loaded"
    );

    let assistant = StudyAssistant::new(Arc::clone(&client), invoker);
    match (config.quiz_agent_enabled, pool.primary()) {
        (true, Some(primary)) => {
            assistant.with_quiz_agent(Arc::new(GroundedQuizAgent::new(client, primary)))
        }
        (true, None) => {
            tracing::warn!("quiz agent enabled but no credential is configured");
            assistant
        }
        (false, _) => assistant,
    }
}
