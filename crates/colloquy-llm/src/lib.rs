pub mod anthropic;
pub mod chunk;
pub mod sse;
pub mod traits;
pub mod types;

pub use anthropic::{AnthropicClient, AnthropicConfig};
pub use chunk::{ChunkStream, ModelChunk, ToolCallFragment, UsageEnvelope};
pub use traits::{ChatOptions, ChatRequest, ModelClient};
pub use types::{
    PromptMessage, ToolCallRequest, ToolDef, ToolResultBlock, UserContent,
};
