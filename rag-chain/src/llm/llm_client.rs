use anyhow::{anyhow, Result};
use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client as OpenAiClient,
};
use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use rag_core::RagError;
use std::fmt;
use std::num::NonZeroU32;
use std::time::Duration;
use tokio::time::sleep;

use super::prompt_formatter::{ChatMessage, ChatRole};

/// Environment variable holding the Groq API key
pub const GROQ_API_KEY_VAR: &str = "GROQ_API_KEY";

/// Configuration for the LLM client
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub model: String,
    /// Overrides the provider's default endpoint
    pub api_base: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub requests_per_minute: u32,
    pub timeout_seconds: u64,
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::Groq,
            model: "llama3-70b-8192".to_string(),
            api_base: None,
            max_tokens: 1024,
            temperature: 0.7,
            requests_per_minute: 30,
            timeout_seconds: 60,
            max_retries: 3,
        }
    }
}

impl LlmConfig {
    pub fn api_base(&self) -> &str {
        self.api_base
            .as_deref()
            .unwrap_or_else(|| self.provider.default_api_base())
    }
}

/// Supported LLM providers (both speak the OpenAI chat-completions protocol)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    Groq,
    OpenAI,
}

impl LlmProvider {
    pub fn default_api_base(&self) -> &'static str {
        match self {
            LlmProvider::Groq => "https://api.groq.com/openai/v1",
            LlmProvider::OpenAI => "https://api.openai.com/v1",
        }
    }
}

/// API key together with the variable it was read from
#[derive(Clone)]
pub struct ApiCredential {
    env_var: String,
    value: String,
}

impl ApiCredential {
    /// Read a key from the environment. Unset or blank values are a
    /// [`RagError::MissingCredential`].
    pub fn from_env(env_var: &str) -> Result<Self, RagError> {
        match std::env::var(env_var) {
            Ok(value) if !value.trim().is_empty() => Ok(Self {
                env_var: env_var.to_string(),
                value: value.trim().to_string(),
            }),
            _ => Err(RagError::MissingCredential(env_var.to_string())),
        }
    }

    pub fn env_var(&self) -> &str {
        &self.env_var
    }

    fn secret(&self) -> &str {
        &self.value
    }
}

impl fmt::Debug for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredential")
            .field("env_var", &self.env_var)
            .field("value", &"<redacted>")
            .finish()
    }
}

/// Response from the LLM with metadata
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub text: String,
    pub model: String,
    pub tokens_used: Option<u32>,
}

/// Anything that can turn chat messages into a completion
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<LlmResponse>;

    fn model(&self) -> &str;
}

/// LLM client with rate limiting and retry logic
pub struct LlmClient {
    client: OpenAiClient<OpenAIConfig>,
    rate_limiter: DefaultDirectRateLimiter,
    config: LlmConfig,
}

impl LlmClient {
    /// Create a new LLM client from configuration
    ///
    /// # Arguments
    /// * `config` - LLM configuration
    /// * `credential` - API key for the LLM provider
    ///
    /// # Returns
    /// A new LLM client ready to make requests. No network call is made here.
    pub fn new(config: LlmConfig, credential: &ApiCredential) -> Result<Self> {
        tracing::info!(
            "Initializing LLM client: provider={:?}, model={}, api_base={}, rate_limit={}/min",
            config.provider,
            config.model,
            config.api_base(),
            config.requests_per_minute
        );

        if !(0.0..=2.0).contains(&config.temperature) {
            return Err(RagError::InvalidConfig(format!(
                "temperature must be within 0.0..=2.0, got {}",
                config.temperature
            ))
            .into());
        }

        let client = OpenAiClient::with_config(
            OpenAIConfig::new()
                .with_api_base(config.api_base())
                .with_api_key(credential.secret()),
        );

        // Initialize rate limiter
        let requests_per_minute = NonZeroU32::new(config.requests_per_minute).ok_or_else(|| {
            RagError::InvalidConfig("requests_per_minute must be > 0".to_string())
        })?;

        let rate_limiter = RateLimiter::direct(Quota::per_minute(requests_per_minute));

        tracing::info!("LLM client initialized successfully");

        Ok(Self {
            client,
            rate_limiter,
            config,
        })
    }

    /// Call the chat-completions endpoint once, with a timeout
    async fn call_chat_completion(&self, messages: &[ChatMessage]) -> Result<LlmResponse> {
        let request_messages = messages
            .iter()
            .map(to_request_message)
            .collect::<Result<Vec<_>>>()?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(self.config.model.clone())
            .messages(request_messages)
            .max_tokens(self.config.max_tokens)
            .temperature(self.config.temperature)
            .build()?;

        // Call API with timeout
        let response = tokio::time::timeout(
            Duration::from_secs(self.config.timeout_seconds),
            self.client.chat().create(request),
        )
        .await
        .map_err(|_| {
            RagError::Llm(format!(
                "request timed out after {}s",
                self.config.timeout_seconds
            ))
        })?
        .map_err(|e| RagError::Llm(format!("{:?} API error: {}", self.config.provider, e)))?;

        // Extract response text
        let text = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| RagError::Llm("empty response from model".to_string()))?;

        Ok(LlmResponse {
            text,
            model: response.model.clone(),
            tokens_used: response.usage.map(|u| u.total_tokens),
        })
    }
}

#[async_trait]
impl LanguageModel for LlmClient {
    /// Rate limit, then call the API with exponential backoff between attempts
    async fn complete(&self, messages: &[ChatMessage]) -> Result<LlmResponse> {
        // Wait for rate limiter
        self.rate_limiter.until_ready().await;

        tracing::debug!(
            "Sending {} messages to LLM ({} chars)",
            messages.len(),
            messages.iter().map(|m| m.content.len()).sum::<usize>()
        );

        let attempts = self.config.max_retries.max(1);
        let mut last_error = None;

        for attempt in 0..attempts {
            match self.call_chat_completion(messages).await {
                Ok(response) => {
                    tracing::info!(
                        "LLM response received: model={}, tokens={:?}, length={} chars",
                        response.model,
                        response.tokens_used,
                        response.text.len()
                    );
                    return Ok(response);
                }
                Err(e) => {
                    if attempt + 1 < attempts {
                        let backoff_ms = 2_u64.pow(attempt) * 1000; // Exponential backoff
                        tracing::warn!(
                            "LLM call failed (attempt {}/{}), retrying in {}ms: {:#}",
                            attempt + 1,
                            attempts,
                            backoff_ms,
                            e
                        );
                        sleep(Duration::from_millis(backoff_ms)).await;
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow!("All retry attempts failed")))
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}

fn to_request_message(message: &ChatMessage) -> Result<ChatCompletionRequestMessage> {
    let request_message = match message.role {
        ChatRole::System => ChatCompletionRequestSystemMessageArgs::default()
            .content(message.content.clone())
            .build()?
            .into(),
        ChatRole::User => ChatCompletionRequestUserMessageArgs::default()
            .content(message.content.clone())
            .build()?
            .into(),
    };

    Ok(request_message)
}
