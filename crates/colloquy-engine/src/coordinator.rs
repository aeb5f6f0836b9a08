use std::sync::Arc;

use serde_json::{json, Value};

use colloquy_llm::{PromptMessage, ToolCallRequest};
use colloquy_persist::{ContentItem, Message};
use colloquy_tools::ToolExecutor;

use crate::approval::{ApprovalDecision, ApprovalPolicy};

const MAX_ERROR_CHARS: usize = 500;

/// Outcome of coordinating one batch of tool calls.
#[derive(Debug)]
pub enum BatchOutcome {
    /// The approval policy refused the batch; nothing was executed.
    Rejected { reason: String },

    /// A tool-result message is ready to persist. `stop` is set when a tool
    /// asked for its result to terminate the turn.
    Executed { message: Message, stop: bool },
}

/// Approves and executes one tool batch, recovering from gateway failure.
///
/// A failing gateway never propagates: each requested call gets a
/// synthesized error result so the model can see what happened and the
/// loop continues.
pub struct ToolCoordinator {
    executor: Arc<dyn ToolExecutor>,
    approval: Arc<dyn ApprovalPolicy>,
}

impl ToolCoordinator {
    pub fn new(executor: Arc<dyn ToolExecutor>, approval: Arc<dyn ApprovalPolicy>) -> Self {
        Self { executor, approval }
    }

    pub async fn run(
        &self,
        conversation_id: &str,
        prompt_with_calls: Vec<PromptMessage>,
        calls: &[ToolCallRequest],
    ) -> BatchOutcome {
        if let ApprovalDecision::Rejected { reason } = self.approval.review(calls).await {
            tracing::info!(%reason, "tool batch rejected by approval policy");
            return BatchOutcome::Rejected { reason };
        }

        match self.executor.execute(prompt_with_calls, calls).await {
            Ok(outcome) => {
                let blocks = outcome
                    .history
                    .last()
                    .and_then(PromptMessage::tool_result_blocks);

                let Some(blocks) = blocks else {
                    tracing::warn!("tool gateway returned no tool-result message");
                    return self.synthesize_failure(conversation_id, calls, "gateway returned no result");
                };

                let items = blocks
                    .iter()
                    .map(|block| ContentItem::ToolResult {
                        tool_use_id: block.tool_use_id.clone(),
                        tool_name: block.tool_name.clone(),
                        data: vec![readable_content(&block.content)],
                        is_error: block.is_error,
                    })
                    .collect();

                BatchOutcome::Executed {
                    message: Message::tool_results(conversation_id, items),
                    stop: outcome.return_direct,
                }
            }
            Err(e) => {
                let reason = sanitize_error(&e);
                tracing::warn!(error = %reason, "tool gateway failed, synthesizing error results");
                self.synthesize_failure(conversation_id, calls, &reason)
            }
        }
    }

    /// One error entry per originally requested call, wrapped into a single
    /// tool-result message, so a failing batch degrades instead of
    /// terminating the conversation.
    fn synthesize_failure(
        &self,
        conversation_id: &str,
        calls: &[ToolCallRequest],
        reason: &str,
    ) -> BatchOutcome {
        let items = calls
            .iter()
            .map(|call| ContentItem::ToolResult {
                tool_use_id: call.id.clone(),
                tool_name: call.name.clone(),
                data: vec![json!(format!("tool execution failed: {}", reason))],
                is_error: true,
            })
            .collect();

        BatchOutcome::Executed {
            message: Message::tool_results(conversation_id, items),
            stop: false,
        }
    }
}

/// Reduce a tool result to text-like content before it hits storage.
///
/// Precedence: plain string, first `"text"`-tagged item of an array, the
/// `"text"` field of an object, compact raw fallback. Embedded binary
/// payloads (images and the like) never reach the database this way.
pub(crate) fn readable_content(value: &Value) -> Value {
    match value {
        Value::String(_) => value.clone(),
        Value::Array(items) => items
            .iter()
            .find_map(|item| {
                let obj = item.as_object()?;
                if obj.get("type").and_then(Value::as_str) == Some("text") {
                    obj.get("text").cloned()
                } else {
                    None
                }
            })
            .unwrap_or_else(|| Value::String(value.to_string())),
        Value::Object(obj) => obj
            .get("text")
            .filter(|text| text.is_string())
            .cloned()
            .unwrap_or_else(|| Value::String(value.to_string())),
        _ => Value::String(value.to_string()),
    }
}

fn sanitize_error(err: &anyhow::Error) -> String {
    let mut text: String = err
        .to_string()
        .lines()
        .next()
        .unwrap_or("unknown error")
        .to_string();
    if text.len() > MAX_ERROR_CHARS {
        let cut = text
            .char_indices()
            .map(|(i, _)| i)
            .take_while(|&i| i <= MAX_ERROR_CHARS)
            .last()
            .unwrap_or(0);
        text.truncate(cut);
        text.push('…');
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_strings_pass_through() {
        assert_eq!(readable_content(&json!("hello")), json!("hello"));
    }

    #[test]
    fn arrays_yield_first_text_tagged_item() {
        let value = json!([
            {"type": "image", "data": "AAAA"},
            {"type": "text", "text": "caption"},
            {"type": "text", "text": "second"},
        ]);
        assert_eq!(readable_content(&value), json!("caption"));
    }

    #[test]
    fn objects_yield_their_text_field() {
        let value = json!({"text": "inner", "blob": "AAAA"});
        assert_eq!(readable_content(&value), json!("inner"));
    }

    #[test]
    fn everything_else_falls_back_to_raw_string() {
        let value = json!([{"type": "image", "data": "AAAA"}]);
        let fallback = readable_content(&value);
        assert!(fallback.as_str().unwrap().contains("image"));

        assert_eq!(readable_content(&json!(42)), json!("42"));
    }

    #[test]
    fn long_errors_are_truncated_to_one_line() {
        let long = "x".repeat(2000);
        let err = anyhow::anyhow!("first {}\nsecond line", long);
        let sanitized = sanitize_error(&err);
        assert!(!sanitized.contains('\n'));
        assert!(sanitized.len() <= MAX_ERROR_CHARS + '…'.len_utf8());
    }
}
