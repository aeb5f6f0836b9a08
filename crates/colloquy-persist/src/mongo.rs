use async_trait::async_trait;
use mongodb::options::{FindOneAndUpdateOptions, ReturnDocument};
use mongodb::{bson::doc, Client, Collection};
use futures::TryStreamExt;

use crate::error::{PersistError, Result};
use crate::models::{Conversation, Message, Thread, TokenUsageRecord};
use crate::trait_client::PersistenceClient;

/// MongoDB storage backend.
///
/// Collections: `conversations`, `threads`, `messages`, `token_usage`.
/// Turn numbers are advanced with a single `findOneAndUpdate` `$inc` so the
/// increment is atomic server-side.
pub struct MongoPersistence {
    conversations: Collection<Conversation>,
    threads: Collection<Thread>,
    messages: Collection<MessageDocument>,
    usage: Collection<TokenUsageRecord>,
}

/// Storage envelope adding a per-conversation sequence field used for
/// ordered reads.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct MessageDocument {
    seq: i64,
    #[serde(flatten)]
    message: Message,
}

impl MongoPersistence {
    pub async fn new(uri: &str, db_name: &str) -> Result<Self> {
        let client = Client::with_uri_str(uri)
            .await
            .map_err(|e| PersistError::Connection(e.to_string()))?;
        tracing::debug!(database = db_name, "connected to MongoDB");
        Ok(Self::with_client(&client, db_name))
    }

    pub fn with_client(client: &Client, db_name: &str) -> Self {
        let db = client.database(db_name);
        Self {
            conversations: db.collection("conversations"),
            threads: db.collection("threads"),
            messages: db.collection("messages"),
            usage: db.collection("token_usage"),
        }
    }

    pub async fn create_conversation(&self, conversation: Conversation) -> Result<()> {
        self.conversations.insert_one(&conversation).await?;
        Ok(())
    }

    pub async fn create_thread(&self, thread: Thread) -> Result<()> {
        self.threads.insert_one(&thread).await?;
        Ok(())
    }

    async fn next_message_seq(&self, conversation_id: &str) -> Result<i64> {
        let last = self
            .messages
            .find_one(doc! { "conversation_id": conversation_id })
            .sort(doc! { "seq": -1 })
            .await?;
        Ok(last.map(|d| d.seq + 1).unwrap_or(0))
    }
}

#[async_trait]
impl PersistenceClient for MongoPersistence {
    async fn find_conversation(&self, conversation_id: &str) -> Result<Option<Conversation>> {
        Ok(self
            .conversations
            .find_one(doc! { "id": conversation_id })
            .await?)
    }

    async fn find_thread(&self, thread_id: &str) -> Result<Option<Thread>> {
        Ok(self.threads.find_one(doc! { "id": thread_id }).await?)
    }

    async fn load_messages(&self, conversation_id: &str) -> Result<Vec<Message>> {
        let documents: Vec<MessageDocument> = self
            .messages
            .find(doc! { "conversation_id": conversation_id })
            .sort(doc! { "seq": 1 })
            .await?
            .try_collect()
            .await?;
        Ok(documents.into_iter().map(|d| d.message).collect())
    }

    async fn add_message(&self, conversation_id: &str, message: Message) -> Result<()> {
        let seq = self.next_message_seq(conversation_id).await?;
        self.messages
            .insert_one(&MessageDocument { seq, message })
            .await?;
        Ok(())
    }

    async fn increment_turn_number(&self, thread_id: &str) -> Result<i64> {
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();

        let updated = self
            .threads
            .find_one_and_update(
                doc! { "id": thread_id },
                doc! { "$inc": { "last_turn_number": 1 } },
            )
            .with_options(options)
            .await?
            .ok_or_else(|| PersistError::ThreadNotFound(thread_id.to_string()))?;

        Ok(updated.last_turn_number)
    }

    async fn save_usage(&self, record: TokenUsageRecord) -> Result<()> {
        self.usage.insert_one(&record).await?;
        Ok(())
    }
}
