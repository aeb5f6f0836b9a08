use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Conversation, Message, Thread, TokenUsageRecord};

/// Trait for durable conversation storage.
///
/// The engine treats implementations as the single source of truth: it
/// reloads history from here at iteration boundaries instead of trusting
/// in-memory state.
#[async_trait]
pub trait PersistenceClient: Send + Sync {
    async fn find_conversation(&self, conversation_id: &str) -> Result<Option<Conversation>>;

    async fn find_thread(&self, thread_id: &str) -> Result<Option<Thread>>;

    /// All messages of a conversation, in append order.
    async fn load_messages(&self, conversation_id: &str) -> Result<Vec<Message>>;

    /// Append one message. Ordering follows call order; messages are never
    /// rewritten.
    async fn add_message(&self, conversation_id: &str, message: Message) -> Result<()>;

    /// Atomically advance the thread's turn counter and return the new
    /// value. Concurrent callers observe strictly increasing numbers.
    async fn increment_turn_number(&self, thread_id: &str) -> Result<i64>;

    async fn save_usage(&self, record: TokenUsageRecord) -> Result<()>;
}
