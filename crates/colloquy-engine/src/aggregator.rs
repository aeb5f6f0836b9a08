use std::collections::HashMap;

use serde_json::Value;

use colloquy_llm::{ModelChunk, ToolCallFragment, ToolCallRequest, UsageEnvelope};

/// One coherent model response assembled from a chunk stream.
#[derive(Debug, Clone)]
pub struct AggregatedResponse {
    pub text: Option<String>,
    pub tool_calls: Vec<ToolCallRequest>,
    pub metadata: HashMap<String, Value>,
    pub usage: Option<UsageEnvelope>,
    pub model: Option<String>,
    pub finish_reason: Option<String>,
}

impl AggregatedResponse {
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// A complete signed reasoning unit surfaced mid-stream.
#[derive(Debug, Clone)]
pub struct ThinkingUnit {
    pub signature: String,
    pub text: String,
}

/// Per-iteration accumulator for the model's chunk stream.
///
/// An explicit value threaded through the loop, not ambient state: text
/// fragments concatenate in arrival order, tool-call fragments merge by
/// stream index, metadata merges key-wise with later values winning, and
/// the last raw chunk is retained as the envelope carrier (model id,
/// finish reason, usage).
#[derive(Debug, Default)]
pub struct ResponseAggregator {
    text: String,
    tool_calls: Vec<ToolCallBuilder>,
    metadata: HashMap<String, Value>,
    usage: Option<UsageEnvelope>,
    last_chunk: Option<ModelChunk>,
}

#[derive(Debug)]
struct ToolCallBuilder {
    index: u32,
    id: Option<String>,
    name: Option<String>,
    input_json: String,
}

impl ResponseAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Absorb one chunk.
    ///
    /// Thinking chunks are complete, self-contained units: they are handed
    /// straight back for immediate persistence and emission instead of
    /// being folded into the aggregate.
    pub fn push(&mut self, chunk: ModelChunk) -> Option<ThinkingUnit> {
        if chunk.is_thinking() {
            return Some(ThinkingUnit {
                signature: chunk.thinking_signature().unwrap_or_default().to_string(),
                text: chunk.text.unwrap_or_default(),
            });
        }

        if let Some(text) = &chunk.text {
            self.text.push_str(text);
        }

        for fragment in &chunk.tool_calls {
            self.merge_fragment(fragment);
        }

        for (key, value) in &chunk.metadata {
            self.metadata.insert(key.clone(), value.clone());
        }

        if let Some(incoming) = &chunk.usage {
            match &mut self.usage {
                Some(usage) => usage.overlay(incoming),
                None => self.usage = Some(incoming.clone()),
            }
        }

        self.last_chunk = Some(chunk);
        None
    }

    fn merge_fragment(&mut self, fragment: &ToolCallFragment) {
        let builder = match self
            .tool_calls
            .iter_mut()
            .find(|b| b.index == fragment.index)
        {
            Some(existing) => existing,
            None => {
                self.tool_calls.push(ToolCallBuilder {
                    index: fragment.index,
                    id: None,
                    name: None,
                    input_json: String::new(),
                });
                self.tool_calls.last_mut().unwrap()
            }
        };

        if let Some(id) = &fragment.id {
            builder.id = Some(id.clone());
        }
        if let Some(name) = &fragment.name {
            builder.name = Some(name.clone());
        }
        if let Some(delta) = &fragment.input_json {
            builder.input_json.push_str(delta);
        }
    }

    /// Build the aggregated response.
    ///
    /// Returns `None` only when no chunk arrived at all; the caller treats
    /// that as a fatal empty-response condition. When chunks arrived but
    /// nothing accumulated, the last raw chunk serves as the response.
    pub fn finish(self) -> Option<AggregatedResponse> {
        let last = self.last_chunk?;

        let tool_calls: Vec<ToolCallRequest> = self
            .tool_calls
            .into_iter()
            .filter_map(|builder| {
                let (Some(id), Some(name)) = (builder.id, builder.name) else {
                    tracing::warn!("dropping incomplete tool-call fragment");
                    return None;
                };
                let input = if builder.input_json.is_empty() {
                    Value::Object(Default::default())
                } else {
                    serde_json::from_str(&builder.input_json).unwrap_or_else(|e| {
                        tracing::warn!(error = %e, "tool input was not valid JSON, passing raw");
                        Value::String(builder.input_json)
                    })
                };
                Some(ToolCallRequest { id, name, input })
            })
            .collect();

        if self.text.is_empty() && tool_calls.is_empty() {
            // Nothing accumulated: fall back to the last raw chunk.
            return Some(AggregatedResponse {
                text: last.text.clone(),
                tool_calls: Vec::new(),
                metadata: last.metadata.clone(),
                usage: self.usage.or_else(|| last.usage.clone()),
                model: last.model,
                finish_reason: last.finish_reason,
            });
        }

        Some(AggregatedResponse {
            text: (!self.text.is_empty()).then_some(self.text),
            tool_calls,
            metadata: self.metadata,
            usage: self.usage,
            model: last.model,
            finish_reason: last.finish_reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn text_fragments_concatenate_in_arrival_order() {
        let mut aggregator = ResponseAggregator::new();
        for part in ["The ", "answer ", "is 42"] {
            assert!(aggregator.push(ModelChunk::text_fragment(part)).is_none());
        }

        let response = aggregator.finish().unwrap();
        assert_eq!(response.text.as_deref(), Some("The answer is 42"));
        assert!(!response.has_tool_calls());
    }

    #[test]
    fn tool_call_fragments_merge_by_index() {
        let mut aggregator = ResponseAggregator::new();
        aggregator.push(ModelChunk {
            tool_calls: vec![colloquy_llm::ToolCallFragment::start(0, "tu_1", "list_files")],
            ..Default::default()
        });
        aggregator.push(ModelChunk {
            tool_calls: vec![colloquy_llm::ToolCallFragment::input_delta(0, r#"{"path":"#)],
            ..Default::default()
        });
        aggregator.push(ModelChunk {
            tool_calls: vec![colloquy_llm::ToolCallFragment::input_delta(0, r#""/tmp"}"#)],
            ..Default::default()
        });

        let response = aggregator.finish().unwrap();
        assert_eq!(response.tool_calls.len(), 1);
        assert_eq!(response.tool_calls[0].id, "tu_1");
        assert_eq!(response.tool_calls[0].input, json!({"path": "/tmp"}));
    }

    #[test]
    fn metadata_merges_with_later_values_winning() {
        let mut aggregator = ResponseAggregator::new();

        let mut first = ModelChunk::text_fragment("x");
        first.metadata.insert("stage".into(), json!("draft"));
        let mut second = ModelChunk::text_fragment("y");
        second.metadata.insert("stage".into(), json!("final"));

        aggregator.push(first);
        aggregator.push(second);

        let response = aggregator.finish().unwrap();
        assert_eq!(response.metadata.get("stage"), Some(&json!("final")));
    }

    #[test]
    fn thinking_chunks_are_returned_not_aggregated() {
        let mut aggregator = ResponseAggregator::new();
        let unit = aggregator
            .push(ModelChunk::thinking("pondering", "sig-9"))
            .unwrap();
        assert_eq!(unit.text, "pondering");
        assert_eq!(unit.signature, "sig-9");

        aggregator.push(ModelChunk::text_fragment("done"));
        let response = aggregator.finish().unwrap();
        assert_eq!(response.text.as_deref(), Some("done"));
    }

    #[test]
    fn empty_stream_yields_none() {
        assert!(ResponseAggregator::new().finish().is_none());
    }

    #[test]
    fn bare_envelope_falls_back_to_last_chunk() {
        let mut aggregator = ResponseAggregator::new();
        aggregator.push(ModelChunk {
            usage: Some(colloquy_llm::UsageEnvelope::new(7, 0)),
            model: Some("claude-sonnet-4".into()),
            finish_reason: Some("end_turn".into()),
            ..Default::default()
        });

        let response = aggregator.finish().unwrap();
        assert!(response.text.is_none());
        assert_eq!(response.finish_reason.as_deref(), Some("end_turn"));
        assert_eq!(response.usage.unwrap().prompt_tokens, 7);
    }

    #[test]
    fn usage_envelopes_overlay_across_chunks() {
        let mut aggregator = ResponseAggregator::new();

        let mut start = ModelChunk::text_fragment("a");
        start.usage = Some(colloquy_llm::UsageEnvelope::new(100, 0));
        let mut end = ModelChunk::text_fragment("b");
        end.usage = Some(colloquy_llm::UsageEnvelope::new(0, 25));

        aggregator.push(start);
        aggregator.push(end);

        let usage = aggregator.finish().unwrap().usage.unwrap();
        assert_eq!(usage.prompt_tokens, 100);
        assert_eq!(usage.completion_tokens, 25);
    }

    #[test]
    fn incomplete_tool_fragments_are_dropped() {
        let mut aggregator = ResponseAggregator::new();
        aggregator.push(ModelChunk {
            tool_calls: vec![colloquy_llm::ToolCallFragment::input_delta(3, "{}")],
            text: Some("t".into()),
            ..Default::default()
        });

        let response = aggregator.finish().unwrap();
        assert!(response.tool_calls.is_empty());
        assert_eq!(response.text.as_deref(), Some("t"));
    }
}
