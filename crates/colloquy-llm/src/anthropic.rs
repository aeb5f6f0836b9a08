// Anthropic Messages API client (HTTP direct, no SDK)

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde_json::{json, Value};

use crate::chunk::ChunkStream;
use crate::sse::parse_sse_response;
use crate::traits::{ChatRequest, ModelClient};
use crate::types::{PromptMessage, ToolResultBlock, UserContent};

const ANTHROPIC_API_BASE: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";

// The Messages API requires max_tokens on every request.
const DEFAULT_MAX_TOKENS: u32 = 4096;

#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    pub api_key: String,
    pub base_url: String,
}

impl AnthropicConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: ANTHROPIC_API_BASE.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

pub struct AnthropicClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl AnthropicClient {
    pub fn new(config: AnthropicConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(&config.api_key).context("invalid API key format")?,
        );
        headers.insert(
            "anthropic-version",
            HeaderValue::from_static(ANTHROPIC_VERSION),
        );

        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .context("failed to create HTTP client")?;

        Ok(Self {
            http_client,
            base_url: config.base_url,
        })
    }

    /// Build the request payload. System messages are hoisted into the
    /// top-level `system` field; everything else becomes content blocks.
    fn build_payload(&self, request: &ChatRequest, stream: bool) -> Result<Value> {
        let mut system_parts: Vec<&str> = Vec::new();
        let mut messages: Vec<Value> = Vec::new();

        for message in &request.messages {
            match message {
                PromptMessage::System { text } => system_parts.push(text),
                other => messages.push(convert_message(other)?),
            }
        }

        let mut payload = json!({
            "model": request.model,
            "messages": messages,
            "max_tokens": request.options.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            "stream": stream,
        });

        let obj = payload.as_object_mut().unwrap();

        if !system_parts.is_empty() {
            obj.insert("system".to_string(), json!(system_parts.join("\n\n")));
        }
        if let Some(temp) = request.options.temperature {
            obj.insert("temperature".to_string(), json!(temp));
        }
        if let Some(budget) = request.options.thinking_budget_tokens {
            obj.insert(
                "thinking".to_string(),
                json!({ "type": "enabled", "budget_tokens": budget }),
            );
        }
        if !request.tools.is_empty() {
            obj.insert("tools".to_string(), serde_json::to_value(&request.tools)?);
        }

        Ok(payload)
    }
}

fn convert_message(message: &PromptMessage) -> Result<Value> {
    match message {
        PromptMessage::System { .. } => unreachable!("system messages are hoisted"),
        PromptMessage::User { content } => match content {
            UserContent::Text(text) => Ok(json!({
                "role": "user",
                "content": text,
            })),
            UserContent::ToolResults(blocks) => Ok(json!({
                "role": "user",
                "content": blocks.iter().map(convert_tool_result).collect::<Vec<_>>(),
            })),
        },
        PromptMessage::Assistant { text, tool_calls } => {
            let mut content: Vec<Value> = Vec::new();
            if let Some(text) = text {
                if !text.is_empty() {
                    content.push(json!({ "type": "text", "text": text }));
                }
            }
            for call in tool_calls {
                content.push(json!({
                    "type": "tool_use",
                    "id": call.id,
                    "name": call.name,
                    "input": call.input,
                }));
            }
            Ok(json!({
                "role": "assistant",
                "content": content,
            }))
        }
    }
}

fn convert_tool_result(block: &ToolResultBlock) -> Value {
    json!({
        "type": "tool_result",
        "tool_use_id": block.tool_use_id,
        "content": block.content,
        "is_error": block.is_error,
    })
}

#[async_trait]
impl ModelClient for AnthropicClient {
    async fn stream(&self, request: ChatRequest) -> Result<ChunkStream> {
        let payload = self.build_payload(&request, true)?;

        let response = self
            .http_client
            .post(format!("{}/v1/messages", self.base_url))
            .json(&payload)
            .send()
            .await
            .context("failed to send request")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Anthropic API error ({}): {}", status, error_text);
        }

        Ok(parse_sse_response(response))
    }
}
