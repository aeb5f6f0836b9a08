pub mod conversation;
pub mod message;
pub mod thread;
pub mod usage;

pub use conversation::Conversation;
pub use message::{ContentItem, Instruction, Message, MessageRole, MessageSource, SystemLevel};
pub use thread::Thread;
pub use usage::TokenUsageRecord;
