use std::collections::VecDeque;

use anyhow::Result;
use futures::{Stream, StreamExt};
use reqwest::Response;
use serde::Deserialize;

use crate::chunk::{ChunkStream, ModelChunk, ToolCallFragment, UsageEnvelope};

/// Raw server-sent event payloads of the Messages streaming API.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WireEvent {
    MessageStart { message: WireMessageStart },
    ContentBlockStart { index: u32, content_block: WireBlock },
    ContentBlockDelta { index: u32, delta: WireDelta },
    ContentBlockStop { index: u32 },
    MessageDelta {
        delta: WireStopInfo,
        #[serde(default)]
        usage: Option<WireUsage>,
    },
    MessageStop,
    Ping,
    Error { error: WireError },
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireMessageStart {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub usage: Option<WireUsage>,
}

/// Content block header; `kind` is kept as a plain string so unknown block
/// types degrade to ignored state instead of a parse failure.
#[derive(Debug, Clone, Deserialize)]
pub struct WireBlock {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub thinking: Option<String>,
    #[serde(default)]
    pub signature: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WireDelta {
    TextDelta { text: String },
    ThinkingDelta { thinking: String },
    SignatureDelta { signature: String },
    InputJsonDelta { partial_json: String },
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireStopInfo {
    #[serde(default)]
    pub stop_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireUsage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default)]
    pub cache_creation_input_tokens: Option<u64>,
    #[serde(default)]
    pub cache_read_input_tokens: Option<u64>,
}

impl From<&WireUsage> for UsageEnvelope {
    fn from(usage: &WireUsage) -> Self {
        Self {
            prompt_tokens: usage.input_tokens,
            completion_tokens: usage.output_tokens,
            thinking_tokens: None,
            cache_creation_tokens: usage.cache_creation_input_tokens,
            cache_read_tokens: usage.cache_read_input_tokens,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireError {
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Per-index state for an open content block.
enum BlockState {
    Text,
    Thinking { text: String, signature: Option<String> },
    ToolUse,
    Ignored,
}

pub fn parse_sse_response(response: Response) -> ChunkStream {
    let bytes = response
        .bytes_stream()
        .map(|chunk| chunk.map(|b| b.to_vec()).map_err(anyhow::Error::from));
    parse_sse_bytes(bytes)
}

/// Turn a raw byte stream of SSE frames into [`ModelChunk`]s.
///
/// Text deltas flow through as fragments; thinking blocks are buffered until
/// their `content_block_stop` and emitted as one signed unit; tool-use input
/// arrives as JSON string deltas to be merged downstream. One final envelope
/// chunk with finish reason and merged usage is emitted at `message_stop`.
pub fn parse_sse_bytes<S>(bytes: S) -> ChunkStream
where
    S: Stream<Item = Result<Vec<u8>>> + Send + 'static,
{
    Box::pin(async_stream::stream! {
        let mut byte_chunks = Box::pin(bytes);
        let mut buffer = VecDeque::with_capacity(8192);

        let mut blocks: Vec<(u32, BlockState)> = Vec::new();
        let mut model: Option<String> = None;
        let mut usage: Option<UsageEnvelope> = None;
        let mut finish_reason: Option<String> = None;

        while let Some(chunk_result) = byte_chunks.next().await {
            match chunk_result {
                Ok(raw) => {
                    buffer.extend(raw);

                    while let Some(newline_pos) = buffer.iter().position(|&b| b == b'\n') {
                        let line_bytes: Vec<u8> = buffer.drain(..=newline_pos).collect();

                        let Ok(line_str) = std::str::from_utf8(&line_bytes) else {
                            continue;
                        };
                        let line = line_str.trim();

                        // `event:` lines are redundant with the tagged payload
                        let Some(data) = line.strip_prefix("data: ") else {
                            continue;
                        };

                        let event = match serde_json::from_str::<WireEvent>(data) {
                            Ok(event) => event,
                            Err(e) => {
                                yield Err(anyhow::anyhow!("failed to parse stream event: {}", e));
                                continue;
                            }
                        };

                        match event {
                            WireEvent::MessageStart { message } => {
                                model = message.model;
                                if let Some(wire) = message.usage.as_ref() {
                                    merge_usage(&mut usage, wire);
                                }
                            }
                            WireEvent::ContentBlockStart { index, content_block } => {
                                blocks.retain(|(i, _)| *i != index);
                                match content_block.kind.as_str() {
                                    "text" => {
                                        blocks.push((index, BlockState::Text));
                                        if let Some(text) = content_block.text {
                                            if !text.is_empty() {
                                                yield Ok(ModelChunk::text_fragment(text));
                                            }
                                        }
                                    }
                                    "thinking" => {
                                        blocks.push((index, BlockState::Thinking {
                                            text: content_block.thinking.unwrap_or_default(),
                                            signature: content_block.signature,
                                        }));
                                    }
                                    "tool_use" => {
                                        blocks.push((index, BlockState::ToolUse));
                                        yield Ok(ModelChunk {
                                            tool_calls: vec![ToolCallFragment::start(
                                                index,
                                                content_block.id.unwrap_or_default(),
                                                content_block.name.unwrap_or_default(),
                                            )],
                                            ..Default::default()
                                        });
                                    }
                                    other => {
                                        tracing::debug!(kind = other, "ignoring unknown content block");
                                        blocks.push((index, BlockState::Ignored));
                                    }
                                }
                            }
                            WireEvent::ContentBlockDelta { index, delta } => {
                                let state = blocks.iter_mut().find(|(i, _)| *i == index).map(|(_, s)| s);
                                match (state, delta) {
                                    (Some(BlockState::Text), WireDelta::TextDelta { text }) => {
                                        if !text.is_empty() {
                                            yield Ok(ModelChunk::text_fragment(text));
                                        }
                                    }
                                    (Some(BlockState::Thinking { text, .. }), WireDelta::ThinkingDelta { thinking }) => {
                                        text.push_str(&thinking);
                                    }
                                    (Some(BlockState::Thinking { signature, .. }), WireDelta::SignatureDelta { signature: sig }) => {
                                        *signature = Some(sig);
                                    }
                                    (Some(BlockState::ToolUse), WireDelta::InputJsonDelta { partial_json }) => {
                                        yield Ok(ModelChunk {
                                            tool_calls: vec![ToolCallFragment::input_delta(index, partial_json)],
                                            ..Default::default()
                                        });
                                    }
                                    _ => {}
                                }
                            }
                            WireEvent::ContentBlockStop { index } => {
                                if let Some(pos) = blocks.iter().position(|(i, _)| *i == index) {
                                    let (_, state) = blocks.remove(pos);
                                    if let BlockState::Thinking { text, signature } = state {
                                        yield Ok(ModelChunk::thinking(
                                            text,
                                            signature.unwrap_or_default(),
                                        ));
                                    }
                                }
                            }
                            WireEvent::MessageDelta { delta, usage: wire } => {
                                if delta.stop_reason.is_some() {
                                    finish_reason = delta.stop_reason;
                                }
                                if let Some(wire) = wire.as_ref() {
                                    merge_usage(&mut usage, wire);
                                }
                            }
                            WireEvent::MessageStop => {
                                yield Ok(ModelChunk {
                                    usage: usage.take(),
                                    model: model.clone(),
                                    finish_reason: finish_reason.take(),
                                    ..Default::default()
                                });
                            }
                            WireEvent::Ping => {}
                            WireEvent::Error { error } => {
                                yield Err(anyhow::anyhow!(
                                    "stream error ({}): {}",
                                    error.kind.unwrap_or_else(|| "unknown".to_string()),
                                    error.message.unwrap_or_default(),
                                ));
                            }
                        }
                    }
                }
                Err(e) => yield Err(anyhow::anyhow!("stream transport error: {}", e)),
            }
        }
    })
}

fn merge_usage(accumulated: &mut Option<UsageEnvelope>, wire: &WireUsage) {
    let incoming = UsageEnvelope::from(wire);
    match accumulated {
        Some(existing) => existing.overlay(&incoming),
        None => *accumulated = Some(incoming),
    }
}
