use thiserror::Error;

use colloquy_persist::PersistError;

/// Fatal turn failures surfaced on the event stream.
///
/// Tool execution failures are deliberately absent: the coordinator
/// recovers from them locally and the loop continues.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("conversation not found: {0}")]
    ConversationNotFound(String),

    #[error("model produced no usable response")]
    EmptyResponse,

    #[error("tool batch rejected: {reason}")]
    ApprovalRejected { reason: String },

    #[error("no terminal response after {limit} iterations")]
    IterationBudgetExceeded { limit: usize },

    #[error(transparent)]
    Persist(#[from] PersistError),

    #[error("model stream failed: {0}")]
    Model(#[source] anyhow::Error),

    #[error("event channel closed by consumer")]
    ChannelClosed,
}

impl From<anyhow::Error> for EngineError {
    fn from(err: anyhow::Error) -> Self {
        Self::Model(err)
    }
}
