use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub project_id: String,
    pub provider: String,
    pub model: String,
    /// The thread new turns are appended to.
    pub current_thread_id: String,
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new(
        id: impl Into<String>,
        project_id: impl Into<String>,
        provider: impl Into<String>,
        model: impl Into<String>,
        current_thread_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            project_id: project_id.into(),
            provider: provider.into(),
            model: model.into(),
            current_thread_id: current_thread_id.into(),
            created_at: Utc::now(),
        }
    }
}
