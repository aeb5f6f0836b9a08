use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One persisted conversation message.
///
/// Messages are append-only from the engine's perspective: the engine only
/// ever adds them, never edits or removes (editing is a separate subsystem).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub role: MessageRole,
    pub content: Vec<ContentItem>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub instructions: Vec<Instruction>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

/// Content payload variants.
///
/// Consumers match exhaustively; `Unknown` preserves payloads this version
/// does not understand so they survive a round-trip through storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentItem {
    UserText {
        text: String,
    },

    ToolCall {
        id: String,
        name: String,
        input: Value,
    },

    ToolResult {
        tool_use_id: String,
        tool_name: String,
        data: Vec<Value>,
        #[serde(default)]
        is_error: bool,
    },

    /// A complete, cryptographically signed reasoning unit.
    Thinking {
        signature: String,
        text: String,
    },

    AssistantText {
        text: String,
    },

    System {
        level: SystemLevel,
        text: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        tool_use_id: Option<String>,
    },

    Image {
        media_type: String,
        data: String,
    },

    #[serde(untagged)]
    Unknown(Value),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SystemLevel {
    Info,
    Warning,
    Error,
}

/// Routing/annotation directives attached to a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Instruction {
    /// User-defined tag.
    Tag { label: String },

    /// A reply to this message should be routed to the given session.
    ReplyTo { session_id: String },

    /// Who authored the message.
    Source { origin: MessageSource },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageSource {
    Human,
    Agent,
}

impl Message {
    fn base(conversation_id: impl Into<String>, role: MessageRole, content: Vec<ContentItem>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            conversation_id: conversation_id.into(),
            role,
            content,
            instructions: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn user(
        conversation_id: impl Into<String>,
        text: impl Into<String>,
        instructions: Vec<Instruction>,
    ) -> Self {
        let mut message = Self::base(
            conversation_id,
            MessageRole::User,
            vec![ContentItem::UserText { text: text.into() }],
        );
        message.instructions = instructions;
        message
    }

    pub fn assistant_text(conversation_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::base(
            conversation_id,
            MessageRole::Assistant,
            vec![ContentItem::AssistantText { text: text.into() }],
        )
    }

    /// Assistant message carrying a batch of tool calls, optionally preceded
    /// by the text the model produced alongside them.
    pub fn assistant_tool_calls(
        conversation_id: impl Into<String>,
        text: Option<String>,
        calls: Vec<ContentItem>,
    ) -> Self {
        let mut content = Vec::with_capacity(calls.len() + 1);
        if let Some(text) = text {
            if !text.is_empty() {
                content.push(ContentItem::AssistantText { text });
            }
        }
        content.extend(calls);
        Self::base(conversation_id, MessageRole::Assistant, content)
    }

    pub fn thinking(
        conversation_id: impl Into<String>,
        signature: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self::base(
            conversation_id,
            MessageRole::Assistant,
            vec![ContentItem::Thinking {
                signature: signature.into(),
                text: text.into(),
            }],
        )
    }

    /// One message aggregating the results of a whole tool batch.
    pub fn tool_results(conversation_id: impl Into<String>, results: Vec<ContentItem>) -> Self {
        Self::base(conversation_id, MessageRole::User, results)
    }

    pub fn with_instructions(mut self, instructions: Vec<Instruction>) -> Self {
        self.instructions = instructions;
        self
    }

    pub fn tool_calls(&self) -> impl Iterator<Item = &ContentItem> {
        self.content
            .iter()
            .filter(|item| matches!(item, ContentItem::ToolCall { .. }))
    }

    pub fn tool_result_items(&self) -> impl Iterator<Item = &ContentItem> {
        self.content
            .iter()
            .filter(|item| matches!(item, ContentItem::ToolResult { .. }))
    }

    pub fn has_tool_calls(&self) -> bool {
        self.tool_calls().next().is_some()
    }

    /// All user/assistant text joined in content order.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for item in &self.content {
            match item {
                ContentItem::UserText { text } | ContentItem::AssistantText { text } => {
                    out.push_str(text);
                }
                _ => {}
            }
        }
        out
    }
}
