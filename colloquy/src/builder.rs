//! High-level builder API for wiring a conversation engine

use std::sync::Arc;

use anyhow::{Context, Result};

use colloquy_engine::{ConversationEngine, EngineConfig, StaticSystemPrompt};
use colloquy_llm::{AnthropicClient, AnthropicConfig, ChatOptions};
use colloquy_persist::{MemoryPersistence, PersistenceClient};
use colloquy_tools::{Tool, ToolRegistry};

/// High-level builder for creating a [`ConversationEngine`]
///
/// # Example
///
/// ```rust,no_run
/// use colloquy::prelude::*;
///
/// # #[tokio::main]
/// # async fn main() -> Result<()> {
/// let engine = EngineBuilder::new()
///     .anthropic_key("sk-ant-...")
///     .system_prompt("You are concise.")
///     .max_iterations(10)
///     .build()
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct EngineBuilder {
    // Model
    anthropic_key: Option<String>,
    base_url: Option<String>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    thinking_budget_tokens: Option<u32>,

    // Storage
    #[cfg(feature = "mongodb")]
    mongodb: Option<(String, String)>,

    // Tools & prompt
    tools: ToolRegistry,
    system_prompt: Option<String>,

    // Loop config
    config: EngineConfig,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self {
            anthropic_key: None,
            base_url: None,
            temperature: None,
            max_tokens: None,
            thinking_budget_tokens: None,
            #[cfg(feature = "mongodb")]
            mongodb: None,
            tools: ToolRegistry::new(),
            system_prompt: None,
            config: EngineConfig::default(),
        }
    }

    /// Set the Anthropic API key (required)
    pub fn anthropic_key(mut self, key: impl Into<String>) -> Self {
        self.anthropic_key = Some(key.into());
        self
    }

    /// Override the API base URL (proxies, test servers)
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Enable extended thinking with the given token budget
    pub fn thinking_budget_tokens(mut self, budget: u32) -> Self {
        self.thinking_budget_tokens = Some(budget);
        self
    }

    /// Store conversations in MongoDB instead of process memory
    #[cfg(feature = "mongodb")]
    pub fn mongodb(mut self, uri: impl Into<String>, database: impl Into<String>) -> Self {
        self.mongodb = Some((uri.into(), database.into()));
        self
    }

    /// Register a tool the model may call
    pub fn tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.register(tool);
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Cap on model/tool iterations per turn (default: 10)
    pub fn max_iterations(mut self, max: usize) -> Self {
        self.config = self.config.with_max_iterations(max);
        self
    }

    /// Build the engine
    pub async fn build(self) -> Result<ConversationEngine> {
        let persistence = self.persistence().await?;

        let api_key = self
            .anthropic_key
            .context("Anthropic API key is required")?;

        let mut model_config = AnthropicConfig::new(api_key);
        if let Some(base_url) = self.base_url {
            model_config = model_config.with_base_url(base_url);
        }
        let model = Arc::new(AnthropicClient::new(model_config)?);

        let mut options = ChatOptions::new();
        if let Some(temperature) = self.temperature {
            options = options.temperature(temperature);
        }
        if let Some(max_tokens) = self.max_tokens {
            options = options.max_tokens(max_tokens);
        }
        if let Some(budget) = self.thinking_budget_tokens {
            options = options.thinking_budget_tokens(budget);
        }

        let mut engine = ConversationEngine::new(model, persistence, self.tools)
            .with_chat_options(options)
            .with_config(self.config);

        if let Some(prompt) = self.system_prompt {
            engine = engine.with_system_prompt(Arc::new(StaticSystemPrompt::new(prompt)));
        }

        Ok(engine)
    }

    #[cfg(feature = "mongodb")]
    async fn persistence(&self) -> Result<Arc<dyn PersistenceClient>> {
        if let Some((uri, database)) = &self.mongodb {
            let client = colloquy_persist::MongoPersistence::new(uri, database)
                .await
                .context("failed to connect to MongoDB")?;
            return Ok(Arc::new(client));
        }
        Ok(Arc::new(MemoryPersistence::new()))
    }

    #[cfg(not(feature = "mongodb"))]
    async fn persistence(&self) -> Result<Arc<dyn PersistenceClient>> {
        Ok(Arc::new(MemoryPersistence::new()))
    }
}
