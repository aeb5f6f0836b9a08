use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use colloquy_llm::{ChatOptions, ChatRequest, ModelClient, PromptMessage, ToolDef};
use colloquy_persist::{ContentItem, Conversation, Instruction, Message, PersistenceClient};
use colloquy_tools::{RegistryExecutor, ToolExecutor, ToolRegistry};

use crate::aggregator::ResponseAggregator;
use crate::approval::{ApprovalPolicy, AutoApprove};
use crate::config::EngineConfig;
use crate::coordinator::{BatchOutcome, ToolCoordinator};
use crate::error::EngineError;
use crate::events::TurnEvent;
use crate::prompt::{assemble_prompt, StaticSystemPrompt, SystemPromptBuilder};
use crate::usage::TurnUsage;

/// One incoming user message plus optional routing instructions.
#[derive(Debug, Clone)]
pub struct TurnRequest {
    pub conversation_id: String,
    pub text: String,
    pub instructions: Vec<Instruction>,
}

impl TurnRequest {
    pub fn new(conversation_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            text: text.into(),
            instructions: Vec::new(),
        }
    }

    pub fn with_instructions(mut self, instructions: Vec<Instruction>) -> Self {
        self.instructions = instructions;
        self
    }
}

/// Live turn: the ordered event stream plus its cancellation token.
///
/// Cancellation takes effect at the next suspension point; whatever was
/// persisted up to that point remains the permanent record of the turn.
pub struct TurnHandle {
    pub events: mpsc::Receiver<TurnEvent>,
    pub cancel: CancellationToken,
}

/// Top-level conversation loop controller.
///
/// Spawns one asynchronous producer per turn. The engine does not
/// serialize concurrent turns on the same conversation; callers must keep
/// at most one loop active per conversation.
pub struct ConversationEngine {
    model: Arc<dyn ModelClient>,
    persistence: Arc<dyn PersistenceClient>,
    registry: Arc<ToolRegistry>,
    executor: Arc<dyn ToolExecutor>,
    approval: Arc<dyn ApprovalPolicy>,
    prompts: Arc<dyn SystemPromptBuilder>,
    options: ChatOptions,
    config: EngineConfig,
}

struct TurnContext {
    model: Arc<dyn ModelClient>,
    persistence: Arc<dyn PersistenceClient>,
    coordinator: ToolCoordinator,
    prompts: Arc<dyn SystemPromptBuilder>,
    tools: Vec<ToolDef>,
    options: ChatOptions,
    config: EngineConfig,
    cancel: CancellationToken,
}

impl ConversationEngine {
    pub fn new(
        model: Arc<dyn ModelClient>,
        persistence: Arc<dyn PersistenceClient>,
        registry: ToolRegistry,
    ) -> Self {
        let executor: Arc<dyn ToolExecutor> = Arc::new(RegistryExecutor::new(registry.clone()));
        Self {
            model,
            persistence,
            registry: Arc::new(registry),
            executor,
            approval: Arc::new(AutoApprove),
            prompts: Arc::new(StaticSystemPrompt::default()),
            options: ChatOptions::default(),
            config: EngineConfig::default(),
        }
    }

    /// Replace the batch execution gateway.
    pub fn with_executor(mut self, executor: Arc<dyn ToolExecutor>) -> Self {
        self.executor = executor;
        self
    }

    pub fn with_approval(mut self, approval: Arc<dyn ApprovalPolicy>) -> Self {
        self.approval = approval;
        self
    }

    pub fn with_system_prompt(mut self, prompts: Arc<dyn SystemPromptBuilder>) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn with_chat_options(mut self, options: ChatOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Run one turn in the background, returning its event stream.
    pub fn spawn_turn(&self, request: TurnRequest) -> TurnHandle {
        let (tx, rx) = mpsc::channel(self.config.channel_capacity);
        let cancel = CancellationToken::new();

        let ctx = TurnContext {
            model: Arc::clone(&self.model),
            persistence: Arc::clone(&self.persistence),
            coordinator: ToolCoordinator::new(
                Arc::clone(&self.executor),
                Arc::clone(&self.approval),
            ),
            prompts: Arc::clone(&self.prompts),
            tools: self.registry.definitions(),
            options: self.options.clone(),
            config: self.config.clone(),
            cancel: cancel.clone(),
        };

        tokio::spawn(async move {
            match execute_turn(&ctx, request, &tx).await {
                Ok(()) => {}
                // The consumer went away; there is nobody left to tell.
                Err(EngineError::ChannelClosed) => {}
                Err(err) => {
                    tracing::debug!(error = %err, "turn ended with fatal error");
                    let _ = tx.send(TurnEvent::Error(err)).await;
                }
            }
        });

        TurnHandle { events: rx, cancel }
    }
}

async fn execute_turn(
    ctx: &TurnContext,
    request: TurnRequest,
    tx: &mpsc::Sender<TurnEvent>,
) -> Result<(), EngineError> {
    let conversation = ctx
        .persistence
        .find_conversation(&request.conversation_id)
        .await?
        .ok_or_else(|| EngineError::ConversationNotFound(request.conversation_id.clone()))?;

    // Persisted before any model call: the user's input survives even if
    // everything after this line fails.
    let user_message = Message::user(&conversation.id, request.text, request.instructions);
    ctx.persistence
        .add_message(&conversation.id, user_message)
        .await?;

    let system_prompt = ctx.prompts.build(&conversation);

    let turn_number = ctx
        .persistence
        .increment_turn_number(&conversation.current_thread_id)
        .await?;
    let mut usage = TurnUsage::new(&conversation.model);

    let result = run_loop(ctx, &conversation, &system_prompt, &mut usage, tx).await;

    // One usage row per turn that consumed tokens, written off the hot
    // path; a failure here never reaches the event stream.
    if let Some(record) = usage.into_record(&conversation.current_thread_id, turn_number) {
        let persistence = Arc::clone(&ctx.persistence);
        tokio::spawn(async move {
            if let Err(err) = persistence.save_usage(record).await {
                tracing::error!(error = %err, "failed to persist turn usage");
            }
        });
    }

    result
}

async fn run_loop(
    ctx: &TurnContext,
    conversation: &Conversation,
    system_prompt: &str,
    usage: &mut TurnUsage,
    tx: &mpsc::Sender<TurnEvent>,
) -> Result<(), EngineError> {
    for iteration in 1..=ctx.config.max_iterations {
        // Durable storage is the single source of truth: the prompt is
        // re-derived from a fresh reload every iteration, so a tool result
        // appended mid-loop is never lost or duplicated.
        let history = ctx.persistence.load_messages(&conversation.id).await?;
        let prompt = assemble_prompt(system_prompt, &history);

        let request = ChatRequest::new(&conversation.model, prompt.clone())
            .with_tools(ctx.tools.clone())
            .with_options(ctx.options.clone());

        tracing::debug!(iteration, history = history.len(), "requesting model response");
        let mut stream = ctx.model.stream(request).await?;

        let mut aggregator = ResponseAggregator::new();
        loop {
            let chunk = tokio::select! {
                _ = ctx.cancel.cancelled() => return Ok(()),
                next = stream.next() => match next {
                    Some(chunk) => chunk?,
                    None => break,
                },
            };

            // A thinking chunk is a complete signed unit: durable and
            // visible before the aggregated message it precedes.
            if let Some(thinking) = aggregator.push(chunk) {
                let message =
                    Message::thinking(&conversation.id, thinking.signature, thinking.text);
                persist_and_emit(ctx, tx, &conversation.id, message).await?;
            }
        }

        let Some(response) = aggregator.finish() else {
            return Err(EngineError::EmptyResponse);
        };
        usage.absorb(response.usage.as_ref());

        if response.has_tool_calls() {
            let call_items: Vec<ContentItem> = response
                .tool_calls
                .iter()
                .map(|call| ContentItem::ToolCall {
                    id: call.id.clone(),
                    name: call.name.clone(),
                    input: call.input.clone(),
                })
                .collect();
            let assistant =
                Message::assistant_tool_calls(&conversation.id, response.text.clone(), call_items);
            persist_and_emit(ctx, tx, &conversation.id, assistant).await?;

            let mut prompt_with_calls = prompt;
            prompt_with_calls.push(PromptMessage::assistant_with_tools(
                response.text.clone(),
                response.tool_calls.clone(),
            ));

            if ctx.cancel.is_cancelled() {
                return Ok(());
            }

            match ctx
                .coordinator
                .run(&conversation.id, prompt_with_calls, &response.tool_calls)
                .await
            {
                BatchOutcome::Rejected { reason } => {
                    return Err(EngineError::ApprovalRejected { reason });
                }
                BatchOutcome::Executed { message, stop } => {
                    persist_and_emit(ctx, tx, &conversation.id, message).await?;
                    if stop {
                        tracing::debug!("tool requested direct return, ending turn");
                        return Ok(());
                    }
                }
            }
        } else {
            let text = response.text.unwrap_or_default();
            if text.trim().is_empty() {
                // Nothing durable to show; no vacuous record, no event.
                tracing::debug!("model returned blank text, ending turn");
            } else {
                let message = Message::assistant_text(&conversation.id, text);
                persist_and_emit(ctx, tx, &conversation.id, message).await?;
            }
            return Ok(());
        }
    }

    Err(EngineError::IterationBudgetExceeded {
        limit: ctx.config.max_iterations,
    })
}

/// Append to storage first, then emit: consumers never observe content
/// that is not yet durable.
async fn persist_and_emit(
    ctx: &TurnContext,
    tx: &mpsc::Sender<TurnEvent>,
    conversation_id: &str,
    message: Message,
) -> Result<(), EngineError> {
    ctx.persistence
        .add_message(conversation_id, message.clone())
        .await?;
    tx.send(TurnEvent::Chunk(message))
        .await
        .map_err(|_| EngineError::ChannelClosed)
}
