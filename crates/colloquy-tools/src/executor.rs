use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};

use colloquy_llm::{PromptMessage, ToolCallRequest, ToolResultBlock};

use crate::registry::ToolRegistry;

/// Result of executing one batch of tool calls.
///
/// `history` is the prompt extended with exactly one synthetic tool-result
/// message aggregating all per-call results.
#[derive(Debug)]
pub struct ToolExecutionOutcome {
    pub history: Vec<PromptMessage>,
    pub return_direct: bool,
}

/// Gateway that executes a whole batch of requested tool calls.
///
/// An `Err` here means the batch failed irrecoverably as a unit; per-call
/// failures are expected to degrade into error-flagged result blocks
/// instead.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute(
        &self,
        prompt: Vec<PromptMessage>,
        pending_calls: &[ToolCallRequest],
    ) -> Result<ToolExecutionOutcome>;
}

/// Default executor running the batch sequentially against a [`ToolRegistry`].
///
/// Unknown tools and per-call failures become error blocks; `return_direct`
/// is set only when every executed call asked for it.
pub struct RegistryExecutor {
    registry: ToolRegistry,
}

impl RegistryExecutor {
    pub fn new(registry: ToolRegistry) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl ToolExecutor for RegistryExecutor {
    async fn execute(
        &self,
        mut prompt: Vec<PromptMessage>,
        pending_calls: &[ToolCallRequest],
    ) -> Result<ToolExecutionOutcome> {
        let mut blocks = Vec::with_capacity(pending_calls.len());
        let mut return_direct = !pending_calls.is_empty();

        for call in pending_calls {
            let Some(tool) = self.registry.get(&call.name) else {
                tracing::warn!(tool = %call.name, "model requested unregistered tool");
                return_direct = false;
                blocks.push(ToolResultBlock {
                    tool_use_id: call.id.clone(),
                    tool_name: call.name.clone(),
                    content: json!(format!("unknown tool: {}", call.name)),
                    is_error: true,
                });
                continue;
            };

            match tool.execute(call.input.clone()).await {
                Ok(output) => {
                    return_direct &= tool.return_direct();
                    blocks.push(ToolResultBlock {
                        tool_use_id: call.id.clone(),
                        tool_name: call.name.clone(),
                        content: output,
                        is_error: false,
                    });
                }
                Err(e) => {
                    tracing::warn!(tool = %call.name, error = %e, "tool call failed");
                    return_direct = false;
                    blocks.push(ToolResultBlock {
                        tool_use_id: call.id.clone(),
                        tool_name: call.name.clone(),
                        content: json!(e.to_string()),
                        is_error: true,
                    });
                }
            }
        }

        prompt.push(PromptMessage::tool_results(blocks));

        Ok(ToolExecutionOutcome {
            history: prompt,
            return_direct,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::{Tool, ToolError};
    use std::sync::Arc;

    struct Echo {
        direct: bool,
    }

    #[async_trait]
    impl Tool for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echo the input back"
        }

        fn input_schema(&self) -> Value {
            json!({ "type": "object" })
        }

        fn return_direct(&self) -> bool {
            self.direct
        }

        async fn execute(&self, input: Value) -> Result<Value, ToolError> {
            Ok(input)
        }
    }

    struct AlwaysFails;

    #[async_trait]
    impl Tool for AlwaysFails {
        fn name(&self) -> &str {
            "broken"
        }

        fn description(&self) -> &str {
            "Always fails"
        }

        fn input_schema(&self) -> Value {
            json!({ "type": "object" })
        }

        async fn execute(&self, _input: Value) -> Result<Value, ToolError> {
            Err(ToolError::InvalidInput("bad arguments".to_string()))
        }
    }

    fn registry() -> ToolRegistry {
        ToolRegistry::new()
            .with_tool(Arc::new(Echo { direct: false }))
            .with_tool(Arc::new(AlwaysFails))
    }

    #[tokio::test]
    async fn batch_appends_exactly_one_result_message() {
        let executor = RegistryExecutor::new(registry());
        let calls = vec![
            ToolCallRequest::new("tu_1", "echo", json!({"a": 1})),
            ToolCallRequest::new("tu_2", "echo", json!({"b": 2})),
        ];

        let outcome = executor
            .execute(vec![PromptMessage::user("hi")], &calls)
            .await
            .unwrap();

        assert_eq!(outcome.history.len(), 2);
        let blocks = outcome.history.last().unwrap().tool_result_blocks().unwrap();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].tool_use_id, "tu_1");
        assert_eq!(blocks[1].content, json!({"b": 2}));
        assert!(!outcome.return_direct);
    }

    #[tokio::test]
    async fn failures_and_unknown_tools_become_error_blocks() {
        let executor = RegistryExecutor::new(registry());
        let calls = vec![
            ToolCallRequest::new("tu_1", "broken", json!({})),
            ToolCallRequest::new("tu_2", "missing", json!({})),
        ];

        let outcome = executor.execute(Vec::new(), &calls).await.unwrap();
        let blocks = outcome.history.last().unwrap().tool_result_blocks().unwrap();

        assert!(blocks.iter().all(|b| b.is_error));
        assert_eq!(blocks[1].content, json!("unknown tool: missing"));
    }

    #[tokio::test]
    async fn return_direct_requires_every_call_to_ask() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(Echo { direct: true }));
        let executor = RegistryExecutor::new(registry);

        let outcome = executor
            .execute(Vec::new(), &[ToolCallRequest::new("tu_1", "echo", json!({}))])
            .await
            .unwrap();
        assert!(outcome.return_direct);
    }
}
