//! # Colloquy - Tool-Augmented Conversation Engine for Rust
//!
//! Colloquy runs the loop between a human, a streaming language model, and
//! the external tools the model may call mid-conversation:
//! - **Real-time streaming** (chunk-by-chunk model responses via SSE)
//! - **Tool execution** (registry-based, with pluggable approval)
//! - **Durable history** (every intermediate artifact persisted before it
//!   is emitted; MongoDB backend behind the `mongodb` feature)
//! - **Token accounting** (one usage row per turn, written off the hot path)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use colloquy::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let engine = EngineBuilder::new()
//!         .anthropic_key(std::env::var("ANTHROPIC_API_KEY")?)
//!         .build()
//!         .await?;
//!
//!     let mut handle = engine.spawn_turn(TurnRequest::new("conv-1", "Hello!"));
//!     while let Some(event) = handle.events.recv().await {
//!         match event {
//!             TurnEvent::Chunk(message) => println!("{}", message.text()),
//!             TurnEvent::Error(err) => eprintln!("turn failed: {}", err),
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! Colloquy consists of several composable crates:
//!
//! - **colloquy-llm**: model gateway (chunk stream, Anthropic client)
//! - **colloquy-tools**: tool registry and batch execution gateway
//! - **colloquy-persist**: conversations, threads, messages, usage rows
//! - **colloquy-engine**: the loop controller composing the above
//!
//! ## Registering Tools
//!
//! ```rust,no_run
//! use colloquy::prelude::*;
//! use std::sync::Arc;
//! # struct ListFiles;
//! # #[async_trait::async_trait]
//! # impl colloquy::tools::Tool for ListFiles {
//! #     fn name(&self) -> &str { "list_files" }
//! #     fn description(&self) -> &str { "List files" }
//! #     fn input_schema(&self) -> serde_json::Value { serde_json::json!({}) }
//! #     async fn execute(&self, input: serde_json::Value)
//! #         -> Result<serde_json::Value, colloquy::tools::ToolError> { Ok(input) }
//! # }
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let engine = EngineBuilder::new()
//!     .anthropic_key("sk-ant-...")
//!     .tool(Arc::new(ListFiles))
//!     .system_prompt("You are a filesystem assistant.")
//!     .build()
//!     .await?;
//! # Ok(())
//! # }
//! ```

// Re-export all public APIs
pub use colloquy_engine as engine;
pub use colloquy_llm as llm;
pub use colloquy_persist as persist;
pub use colloquy_tools as tools;

// Re-export commonly used types
pub use colloquy_engine::{
    ConversationEngine, EngineConfig, EngineError, TurnEvent, TurnHandle, TurnRequest,
};
pub use colloquy_llm::{AnthropicClient, AnthropicConfig, ModelClient};
pub use colloquy_persist::{Conversation, Message, PersistenceClient, Thread};
pub use colloquy_tools::{Tool, ToolRegistry};

/// High-level builder for wiring an engine together
pub mod builder;

/// Convenient prelude with commonly used types
pub mod prelude {
    pub use crate::builder::EngineBuilder;
    pub use crate::{ConversationEngine, EngineConfig, TurnEvent, TurnRequest};
    pub use anyhow::Result;
}
