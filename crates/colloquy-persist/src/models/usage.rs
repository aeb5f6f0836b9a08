use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Token accounting for one turn, keyed by `(thread_id, turn_number)`.
///
/// Exactly one record exists per turn that consumed any tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsageRecord {
    pub thread_id: String,
    pub turn_number: i64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub thinking_tokens: u64,
    pub cache_creation_tokens: u64,
    pub cache_read_tokens: u64,
    pub model: String,
    pub created_at: DateTime<Utc>,
}

impl TokenUsageRecord {
    pub fn total_tokens(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }
}
