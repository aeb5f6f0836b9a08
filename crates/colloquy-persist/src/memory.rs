use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{PersistError, Result};
use crate::models::{Conversation, Message, Thread, TokenUsageRecord};
use crate::trait_client::PersistenceClient;

/// In-process storage backend.
///
/// Backs tests and lightweight embeddings; the same ordering and atomicity
/// guarantees as the database backends, provided by a single lock.
#[derive(Default)]
pub struct MemoryPersistence {
    inner: Mutex<Store>,
}

#[derive(Default)]
struct Store {
    conversations: HashMap<String, Conversation>,
    threads: HashMap<String, Thread>,
    /// conversation id -> messages in append order
    messages: HashMap<String, Vec<Message>>,
    usage: Vec<TokenUsageRecord>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_conversation(&self, conversation: Conversation) {
        let mut store = self.inner.lock().expect("store lock");
        store
            .conversations
            .insert(conversation.id.clone(), conversation);
    }

    pub fn insert_thread(&self, thread: Thread) {
        let mut store = self.inner.lock().expect("store lock");
        store.threads.insert(thread.id.clone(), thread);
    }

    /// Snapshot of a conversation's messages, for inspection.
    pub fn messages_snapshot(&self, conversation_id: &str) -> Vec<Message> {
        let store = self.inner.lock().expect("store lock");
        store
            .messages
            .get(conversation_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Snapshot of all persisted usage records, for inspection.
    pub fn usage_snapshot(&self) -> Vec<TokenUsageRecord> {
        let store = self.inner.lock().expect("store lock");
        store.usage.clone()
    }
}

#[async_trait]
impl PersistenceClient for MemoryPersistence {
    async fn find_conversation(&self, conversation_id: &str) -> Result<Option<Conversation>> {
        let store = self.inner.lock().expect("store lock");
        Ok(store.conversations.get(conversation_id).cloned())
    }

    async fn find_thread(&self, thread_id: &str) -> Result<Option<Thread>> {
        let store = self.inner.lock().expect("store lock");
        Ok(store.threads.get(thread_id).cloned())
    }

    async fn load_messages(&self, conversation_id: &str) -> Result<Vec<Message>> {
        let store = self.inner.lock().expect("store lock");
        Ok(store
            .messages
            .get(conversation_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn add_message(&self, conversation_id: &str, message: Message) -> Result<()> {
        let mut store = self.inner.lock().expect("store lock");
        store
            .messages
            .entry(conversation_id.to_string())
            .or_default()
            .push(message);
        Ok(())
    }

    async fn increment_turn_number(&self, thread_id: &str) -> Result<i64> {
        let mut store = self.inner.lock().expect("store lock");
        let thread = store
            .threads
            .get_mut(thread_id)
            .ok_or_else(|| PersistError::ThreadNotFound(thread_id.to_string()))?;
        thread.last_turn_number += 1;
        Ok(thread.last_turn_number)
    }

    async fn save_usage(&self, record: TokenUsageRecord) -> Result<()> {
        let mut store = self.inner.lock().expect("store lock");
        store.usage.push(record);
        Ok(())
    }
}
