pub mod aggregator;
pub mod approval;
pub mod config;
pub mod coordinator;
pub mod engine;
pub mod error;
pub mod events;
pub mod prompt;
pub mod usage;

pub use aggregator::{AggregatedResponse, ResponseAggregator, ThinkingUnit};
pub use approval::{ApprovalDecision, ApprovalPolicy, AutoApprove};
pub use config::EngineConfig;
pub use coordinator::{BatchOutcome, ToolCoordinator};
pub use engine::{ConversationEngine, TurnHandle, TurnRequest};
pub use error::EngineError;
pub use events::TurnEvent;
pub use prompt::{StaticSystemPrompt, SystemPromptBuilder};
pub use usage::TurnUsage;
