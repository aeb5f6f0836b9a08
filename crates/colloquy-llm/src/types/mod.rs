pub mod message;
pub mod tool;

pub use message::{PromptMessage, ToolResultBlock, UserContent};
pub use tool::{ToolCallRequest, ToolDef};
