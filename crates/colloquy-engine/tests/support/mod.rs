use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};

use colloquy_engine::{ConversationEngine, TurnEvent, TurnHandle};
use colloquy_llm::{
    ChatRequest, ChunkStream, ModelChunk, ModelClient, PromptMessage, ToolCallFragment,
    ToolCallRequest, UsageEnvelope,
};
use colloquy_persist::{Conversation, MemoryPersistence, Thread, TokenUsageRecord};
use colloquy_tools::{
    RegistryExecutor, Tool, ToolError, ToolExecutionOutcome, ToolExecutor, ToolRegistry,
};

pub const CONVERSATION: &str = "conv-1";
pub const THREAD: &str = "thread-1";

/// Model double replaying canned chunk scripts, one per `stream` call.
pub struct ScriptedModel {
    scripts: Mutex<VecDeque<Vec<ModelChunk>>>,
    repeat_last: bool,
}

impl ScriptedModel {
    pub fn new(scripts: Vec<Vec<ModelChunk>>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            repeat_last: false,
        }
    }

    /// Replays the final script forever; models a model that never stops
    /// requesting tools.
    pub fn cycling(script: Vec<ModelChunk>) -> Self {
        Self {
            scripts: Mutex::new(VecDeque::from(vec![script])),
            repeat_last: true,
        }
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    async fn stream(&self, _request: ChatRequest) -> Result<ChunkStream> {
        let chunks = {
            let mut scripts = self.scripts.lock().unwrap();
            match scripts.pop_front() {
                Some(chunks) => {
                    if self.repeat_last && scripts.is_empty() {
                        scripts.push_back(chunks.clone());
                    }
                    chunks
                }
                None => Vec::new(),
            }
        };
        Ok(Box::pin(futures::stream::iter(
            chunks.into_iter().map(Ok::<_, anyhow::Error>),
        )))
    }
}

pub fn envelope(finish_reason: &str, prompt_tokens: u64, completion_tokens: u64) -> ModelChunk {
    ModelChunk {
        usage: Some(UsageEnvelope::new(prompt_tokens, completion_tokens)),
        model: Some("claude-sonnet-4".to_string()),
        finish_reason: Some(finish_reason.to_string()),
        ..Default::default()
    }
}

/// Script: one tool call streamed as fragments, then the closing envelope.
pub fn tool_call_script(id: &str, name: &str, input: Value) -> Vec<ModelChunk> {
    vec![
        ModelChunk {
            tool_calls: vec![ToolCallFragment::start(0, id, name)],
            ..Default::default()
        },
        ModelChunk {
            tool_calls: vec![ToolCallFragment::input_delta(0, input.to_string())],
            ..Default::default()
        },
        envelope("tool_use", 10, 5),
    ]
}

/// Script: plain text then the closing envelope.
pub fn text_script(text: &str) -> Vec<ModelChunk> {
    vec![ModelChunk::text_fragment(text), envelope("end_turn", 8, 3)]
}

pub struct ListFiles;

#[async_trait]
impl Tool for ListFiles {
    fn name(&self) -> &str {
        "list_files"
    }

    fn description(&self) -> &str {
        "List files in a directory"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": { "path": { "type": "string" } },
            "required": ["path"],
        })
    }

    async fn execute(&self, _input: Value) -> Result<Value, ToolError> {
        Ok(json!(["a.txt", "b.txt"]))
    }
}

pub struct DirectAnswer;

#[async_trait]
impl Tool for DirectAnswer {
    fn name(&self) -> &str {
        "direct_answer"
    }

    fn description(&self) -> &str {
        "Terminates the turn with its result"
    }

    fn input_schema(&self) -> Value {
        json!({ "type": "object" })
    }

    fn return_direct(&self) -> bool {
        true
    }

    async fn execute(&self, input: Value) -> Result<Value, ToolError> {
        Ok(input)
    }
}

/// Gateway that fails as a whole on its first batch, then delegates.
pub struct FailingOnceExecutor {
    failed: AtomicBool,
    inner: RegistryExecutor,
}

impl FailingOnceExecutor {
    pub fn new(registry: ToolRegistry) -> Self {
        Self {
            failed: AtomicBool::new(false),
            inner: RegistryExecutor::new(registry),
        }
    }
}

#[async_trait]
impl ToolExecutor for FailingOnceExecutor {
    async fn execute(
        &self,
        prompt: Vec<PromptMessage>,
        pending_calls: &[ToolCallRequest],
    ) -> Result<ToolExecutionOutcome> {
        if !self.failed.swap(true, Ordering::SeqCst) {
            anyhow::bail!("connection reset by tool host\nwith a second line of detail");
        }
        self.inner.execute(prompt, pending_calls).await
    }
}

pub fn seeded_store() -> Arc<MemoryPersistence> {
    let store = Arc::new(MemoryPersistence::new());
    store.insert_conversation(Conversation::new(
        CONVERSATION,
        "proj-1",
        "anthropic",
        "claude-sonnet-4",
        THREAD,
    ));
    store.insert_thread(Thread::new(THREAD, CONVERSATION));
    store
}

pub fn default_registry() -> ToolRegistry {
    ToolRegistry::new()
        .with_tool(Arc::new(ListFiles))
        .with_tool(Arc::new(DirectAnswer))
}

pub fn engine(model: ScriptedModel, store: Arc<MemoryPersistence>) -> ConversationEngine {
    ConversationEngine::new(Arc::new(model), store, default_registry())
}

pub async fn drain(mut handle: TurnHandle) -> Vec<TurnEvent> {
    let mut events = Vec::new();
    while let Some(event) = handle.events.recv().await {
        events.push(event);
    }
    events
}

/// Usage rows are written by a detached task; poll briefly for them.
pub async fn wait_for_usage(store: &MemoryPersistence, expected: usize) -> Vec<TokenUsageRecord> {
    for _ in 0..100 {
        let records = store.usage_snapshot();
        if records.len() >= expected {
            return records;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    store.usage_snapshot()
}
