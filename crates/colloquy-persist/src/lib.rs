pub mod error;
pub mod memory;
pub mod models;
pub mod trait_client;

#[cfg(feature = "mongodb")]
pub mod mongo;

pub use error::{PersistError, Result};
pub use memory::MemoryPersistence;
pub use models::{
    ContentItem, Conversation, Instruction, Message, MessageRole, MessageSource, SystemLevel,
    Thread, TokenUsageRecord,
};
pub use trait_client::PersistenceClient;

#[cfg(feature = "mongodb")]
pub use mongo::MongoPersistence;
