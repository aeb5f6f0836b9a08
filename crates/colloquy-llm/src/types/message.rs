use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::tool::ToolCallRequest;

/// Wire-level message sent to the model (high-level, provider-agnostic).
///
/// Tool results ride in a `User` message, matching providers that route
/// tool output back as user-side content blocks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum PromptMessage {
    /// System instructions (hoisted out of the message list by clients
    /// whose wire format carries a separate system field)
    System { text: String },

    User { content: UserContent },

    Assistant {
        #[serde(skip_serializing_if = "Option::is_none")]
        text: Option<String>,

        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCallRequest>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserContent {
    Text(String),

    /// One synthetic message aggregating the results of a whole tool batch.
    ToolResults(Vec<ToolResultBlock>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResultBlock {
    pub tool_use_id: String,
    pub tool_name: String,
    pub content: Value,
    #[serde(default)]
    pub is_error: bool,
}

impl PromptMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self::System { text: text.into() }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::User {
            content: UserContent::Text(text.into()),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::Assistant {
            text: Some(text.into()),
            tool_calls: Vec::new(),
        }
    }

    pub fn assistant_with_tools(text: Option<String>, tool_calls: Vec<ToolCallRequest>) -> Self {
        Self::Assistant { text, tool_calls }
    }

    pub fn tool_results(blocks: Vec<ToolResultBlock>) -> Self {
        Self::User {
            content: UserContent::ToolResults(blocks),
        }
    }

    pub fn role(&self) -> &str {
        match self {
            Self::System { .. } => "system",
            Self::User { .. } => "user",
            Self::Assistant { .. } => "assistant",
        }
    }

    /// The tool-result blocks carried by this message, if it is one.
    pub fn tool_result_blocks(&self) -> Option<&[ToolResultBlock]> {
        match self {
            Self::User {
                content: UserContent::ToolResults(blocks),
            } => Some(blocks),
            _ => None,
        }
    }
}
