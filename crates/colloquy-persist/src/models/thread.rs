use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thread {
    pub id: String,
    pub conversation_id: String,

    /// Set when this thread was derived from another one by a non-append
    /// operation (fork, edit); `None` for root threads.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_thread_id: Option<String>,

    /// Monotonic per-thread turn counter; only ever increases, and is
    /// advanced atomically at the persistence layer.
    pub last_turn_number: i64,

    pub created_at: DateTime<Utc>,
}

impl Thread {
    pub fn new(id: impl Into<String>, conversation_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            conversation_id: conversation_id.into(),
            original_thread_id: None,
            last_turn_number: 0,
            created_at: Utc::now(),
        }
    }

    pub fn derived_from(mut self, original_thread_id: impl Into<String>) -> Self {
        self.original_thread_id = Some(original_thread_id.into());
        self
    }
}
