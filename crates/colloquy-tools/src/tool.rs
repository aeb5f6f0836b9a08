use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("execution failed: {0}")]
    Execution(#[from] anyhow::Error),
}

/// An external capability the model may invoke.
///
/// Input arrives schema-shaped (see [`Tool::input_schema`]); execution
/// returns structured output or fails with a [`ToolError`].
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON Schema for the tool's input object.
    fn input_schema(&self) -> Value;

    /// When true, the tool's result terminates the turn instead of being
    /// fed back to the model.
    fn return_direct(&self) -> bool {
        false
    }

    async fn execute(&self, input: Value) -> Result<Value, ToolError>;
}
