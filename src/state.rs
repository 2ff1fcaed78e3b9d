use std::sync::Arc;
use std::time::Instant;

use crate::db::Database;
use crate::services::{GeminiClient, StudyAssistant};

#[derive(Clone)]
pub struct AppState {
    db: Database,
    assistant: Arc<StudyAssistant<GeminiClient>>,
    started_at: Instant,
}

impl AppState {
    pub fn new(db: Database, assistant: Arc<StudyAssistant<GeminiClient>>) -> Self {
        Self {
            db,
            assistant,
            started_at: Instant::now(),
        }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn assistant(&self) -> &StudyAssistant<GeminiClient> {
        &self.assistant
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
