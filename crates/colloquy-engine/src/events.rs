use colloquy_persist::Message;

use crate::error::EngineError;

/// Caller-facing turn event.
///
/// Every `Chunk` corresponds to a durable write that has already succeeded;
/// consumers never observe content that is not yet persisted.
#[derive(Debug)]
pub enum TurnEvent {
    Chunk(Message),
    Error(EngineError),
}

impl TurnEvent {
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    pub fn message(&self) -> Option<&Message> {
        match self {
            Self::Chunk(message) => Some(message),
            Self::Error(_) => None,
        }
    }
}
