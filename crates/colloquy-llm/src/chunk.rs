use std::collections::HashMap;
use std::pin::Pin;

use anyhow::Result;
use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<ModelChunk>> + Send>>;

/// One incremental unit of the model's response stream.
///
/// A chunk may carry a text fragment, tool-call fragments, or neither (a
/// bare envelope at stream end carrying model id, finish reason and usage).
/// A chunk whose metadata flags it as `thinking` is a complete, signed
/// reasoning unit rather than a fragment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelChunk {
    #[serde(default = "assistant_role")]
    pub role: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallFragment>,

    /// Provider metadata, merged key-wise by the aggregator (later values
    /// overwrite earlier ones). May carry `thinking: true` and `signature`.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<UsageEnvelope>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

fn assistant_role() -> String {
    "assistant".to_string()
}

impl Default for ModelChunk {
    fn default() -> Self {
        Self {
            role: assistant_role(),
            text: None,
            tool_calls: Vec::new(),
            metadata: HashMap::new(),
            usage: None,
            model: None,
            finish_reason: None,
        }
    }
}

impl ModelChunk {
    pub fn text_fragment(text: impl Into<String>) -> Self {
        Self {
            role: assistant_role(),
            text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn thinking(text: impl Into<String>, signature: impl Into<String>) -> Self {
        let mut metadata = HashMap::new();
        metadata.insert("thinking".to_string(), Value::Bool(true));
        metadata.insert("signature".to_string(), Value::String(signature.into()));
        Self {
            role: assistant_role(),
            text: Some(text.into()),
            metadata,
            ..Default::default()
        }
    }

    pub fn is_thinking(&self) -> bool {
        self.metadata
            .get("thinking")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn thinking_signature(&self) -> Option<&str> {
        self.metadata.get("signature").and_then(Value::as_str)
    }
}

/// Partial tool invocation as streamed by the provider.
///
/// The id and name arrive on the first fragment for an index; input JSON
/// arrives as string deltas to be concatenated and parsed once complete.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallFragment {
    pub index: u32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_json: Option<String>,
}

impl ToolCallFragment {
    pub fn start(index: u32, id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            index,
            id: Some(id.into()),
            name: Some(name.into()),
            input_json: None,
        }
    }

    pub fn input_delta(index: u32, partial_json: impl Into<String>) -> Self {
        Self {
            index,
            id: None,
            name: None,
            input_json: Some(partial_json.into()),
        }
    }
}

/// Token counts attached to a chunk.
///
/// Prompt and completion counts are always present (defaulting to zero);
/// thinking and cache counts are provider-specific extension points whose
/// absence never fails accumulation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageEnvelope {
    #[serde(default)]
    pub prompt_tokens: u64,

    #[serde(default)]
    pub completion_tokens: u64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking_tokens: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_creation_tokens: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_read_tokens: Option<u64>,
}

impl UsageEnvelope {
    pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            ..Default::default()
        }
    }

    pub fn total_tokens(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }

    /// Overlay `other` onto `self`: concrete counts are replaced when the
    /// newer envelope reports a non-zero value, optional counts when present.
    pub fn overlay(&mut self, other: &UsageEnvelope) {
        if other.prompt_tokens > 0 {
            self.prompt_tokens = other.prompt_tokens;
        }
        if other.completion_tokens > 0 {
            self.completion_tokens = other.completion_tokens;
        }
        if other.thinking_tokens.is_some() {
            self.thinking_tokens = other.thinking_tokens;
        }
        if other.cache_creation_tokens.is_some() {
            self.cache_creation_tokens = other.cache_creation_tokens;
        }
        if other.cache_read_tokens.is_some() {
            self.cache_read_tokens = other.cache_read_tokens;
        }
    }
}
