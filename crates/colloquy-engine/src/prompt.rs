use colloquy_llm::{PromptMessage, ToolCallRequest, ToolResultBlock};
use colloquy_persist::{ContentItem, Conversation, Message, MessageRole};

/// Delegated construction of the system prompt for a conversation.
pub trait SystemPromptBuilder: Send + Sync {
    fn build(&self, conversation: &Conversation) -> String;
}

/// Fixed system prompt, the engine default.
#[derive(Debug, Clone, Default)]
pub struct StaticSystemPrompt(pub String);

impl StaticSystemPrompt {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }
}

impl SystemPromptBuilder for StaticSystemPrompt {
    fn build(&self, _conversation: &Conversation) -> String {
        self.0.clone()
    }
}

/// Derive the model prompt from persisted history.
///
/// Deterministic over the same input: re-deriving after a reload yields the
/// same instruction sequence as the last persisted state. Thinking and
/// system notices are not replayed to the model; images and unknown
/// payloads are dropped with a debug log.
pub fn assemble_prompt(system: &str, history: &[Message]) -> Vec<PromptMessage> {
    let mut prompt = Vec::with_capacity(history.len() + 1);

    if !system.is_empty() {
        prompt.push(PromptMessage::system(system));
    }

    for message in history {
        if let Some(converted) = convert_message(message) {
            prompt.push(converted);
        }
    }

    prompt
}

fn convert_message(message: &Message) -> Option<PromptMessage> {
    let mut text = String::new();
    let mut tool_calls: Vec<ToolCallRequest> = Vec::new();
    let mut tool_results: Vec<ToolResultBlock> = Vec::new();

    for item in &message.content {
        match item {
            ContentItem::UserText { text: t } | ContentItem::AssistantText { text: t } => {
                text.push_str(t);
            }
            ContentItem::ToolCall { id, name, input } => {
                tool_calls.push(ToolCallRequest::new(id.clone(), name.clone(), input.clone()));
            }
            ContentItem::ToolResult {
                tool_use_id,
                tool_name,
                data,
                is_error,
            } => {
                let content = match data.len() {
                    0 => serde_json::Value::String(String::new()),
                    1 => data[0].clone(),
                    _ => serde_json::Value::Array(data.clone()),
                };
                tool_results.push(ToolResultBlock {
                    tool_use_id: tool_use_id.clone(),
                    tool_name: tool_name.clone(),
                    content,
                    is_error: *is_error,
                });
            }
            // Signed reasoning and synthetic notices stay in storage only.
            ContentItem::Thinking { .. } | ContentItem::System { .. } => {}
            ContentItem::Image { media_type, .. } => {
                tracing::debug!(media_type, "dropping image payload from prompt");
            }
            ContentItem::Unknown(raw) => {
                tracing::debug!(?raw, "dropping unknown payload from prompt");
            }
        }
    }

    if !tool_results.is_empty() {
        return Some(PromptMessage::tool_results(tool_results));
    }

    match message.role {
        MessageRole::User => (!text.is_empty()).then(|| PromptMessage::user(text)),
        MessageRole::Assistant => {
            if tool_calls.is_empty() && text.is_empty() {
                None
            } else {
                Some(PromptMessage::assistant_with_tools(
                    (!text.is_empty()).then_some(text),
                    tool_calls,
                ))
            }
        }
        MessageRole::System => (!text.is_empty()).then(|| PromptMessage::system(text)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use colloquy_persist::Message;
    use serde_json::json;

    fn history() -> Vec<Message> {
        vec![
            Message::user("conv-1", "list /tmp", vec![]),
            Message::thinking("conv-1", "sig", "let me think"),
            Message::assistant_tool_calls(
                "conv-1",
                None,
                vec![ContentItem::ToolCall {
                    id: "tu_1".into(),
                    name: "list_files".into(),
                    input: json!({"path": "/tmp"}),
                }],
            ),
            Message::tool_results(
                "conv-1",
                vec![ContentItem::ToolResult {
                    tool_use_id: "tu_1".into(),
                    tool_name: "list_files".into(),
                    data: vec![json!("a.txt")],
                    is_error: false,
                }],
            ),
        ]
    }

    #[test]
    fn thinking_is_not_replayed_to_the_model() {
        let prompt = assemble_prompt("sys", &history());

        // system + user + assistant tool call + tool results
        assert_eq!(prompt.len(), 4);
        assert_eq!(prompt[0].role(), "system");
        assert_eq!(prompt[1].role(), "user");
        assert_eq!(prompt[2].role(), "assistant");
        assert!(prompt[3].tool_result_blocks().is_some());
    }

    #[test]
    fn re_derivation_is_deterministic() {
        let history = history();
        let first = assemble_prompt("sys", &history);
        let second = assemble_prompt("sys", &history);
        assert_eq!(
            serde_json::to_value(&first).unwrap(),
            serde_json::to_value(&second).unwrap()
        );
    }

    #[test]
    fn empty_system_prompt_is_omitted() {
        let prompt = assemble_prompt("", &[Message::user("conv-1", "hi", vec![])]);
        assert_eq!(prompt.len(), 1);
        assert_eq!(prompt[0].role(), "user");
    }

    #[test]
    fn images_are_stripped_but_text_survives() {
        let message = Message {
            content: vec![
                ContentItem::UserText { text: "see: ".into() },
                ContentItem::Image {
                    media_type: "image/png".into(),
                    data: "aGk=".into(),
                },
            ],
            ..Message::user("conv-1", "", vec![])
        };

        let prompt = assemble_prompt("", &[message]);
        assert_eq!(prompt.len(), 1);
        match &prompt[0] {
            PromptMessage::User { content } => match content {
                colloquy_llm::UserContent::Text(text) => assert_eq!(text, "see: "),
                other => panic!("unexpected content: {:?}", other),
            },
            other => panic!("unexpected message: {:?}", other),
        }
    }
}
