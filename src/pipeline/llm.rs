//! Structured-data request: send the OCR text to the model and return its reply.
//!
//! Prompt wording lives in [`crate::prompts`] and response interpretation in
//! [`crate::pipeline::parse`]. This module owns the call, its timeout and the
//! mapping of its failures onto [`StageFailure`].
//!
//! The model is reached through the [`ChatBackend`] trait. [`LlmClient`] is
//! the production implementation over an `edgequake-llm` provider; it is
//! built once at startup and shared by handle, never stored globally.

use crate::config::ExtractionConfig;
use crate::error::{StageFailure, TariffError};
use crate::prompts::{extraction_prompt, SYSTEM_PROMPT};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::sync::Arc;
use tokio::time::{timeout, Duration};
use tracing::{debug, info, warn};

/// One completion returned by the model.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Completion {
    pub content: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
}

/// A chat-style completion endpoint: one system message, one user message,
/// one text reply.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Send the request. An `Err` carries the service's error message.
    async fn complete(&self, system: &str, prompt: &str) -> Result<Completion, String>;
}

/// Production backend over an `edgequake-llm` provider.
#[derive(Clone)]
pub struct LlmClient {
    provider: Arc<dyn LLMProvider>,
    temperature: f32,
    max_tokens: usize,
}

impl std::fmt::Debug for LlmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmClient")
            .field("provider", &"<dyn LLMProvider>")
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl LlmClient {
    /// Wrap an already constructed provider.
    pub fn new(provider: Arc<dyn LLMProvider>, config: &ExtractionConfig) -> Self {
        Self {
            provider,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    /// Create the configured provider. Fails when its API key is not set.
    ///
    /// The key itself is never logged.
    pub fn connect(config: &ExtractionConfig) -> Result<Self, TariffError> {
        let name = config.provider_name.as_str();
        if let Some(var) = credential_var(name) {
            let present = std::env::var(var).map(|v| !v.trim().is_empty()).unwrap_or(false);
            if !present {
                return Err(TariffError::ProviderNotConfigured {
                    provider: name.to_string(),
                    hint: format!("API key not found! Set {var} as an environment variable."),
                });
            }
        }

        let provider = ProviderFactory::create_llm_provider(name, &config.model).map_err(|e| {
            TariffError::ProviderNotConfigured {
                provider: name.to_string(),
                hint: format!("{e}"),
            }
        })?;

        info!("LLM provider ready: {} / {}", name, config.model);
        Ok(Self::new(provider, config))
    }

    fn options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        }
    }
}

#[async_trait]
impl ChatBackend for LlmClient {
    async fn complete(&self, system: &str, prompt: &str) -> Result<Completion, String> {
        let messages = vec![ChatMessage::system(system), ChatMessage::user(prompt)];
        let response = self
            .provider
            .chat(&messages, Some(&self.options()))
            .await
            .map_err(|e| format!("{}", e))?;

        Ok(Completion {
            content: response.content,
            input_tokens: response.prompt_tokens,
            output_tokens: response.completion_tokens,
        })
    }
}

/// Environment variable holding the credential for a provider, if it needs one.
pub fn credential_var(provider_name: &str) -> Option<&'static str> {
    match provider_name.to_ascii_lowercase().as_str() {
        "openai" => Some("OPENAI_API_KEY"),
        "anthropic" => Some("ANTHROPIC_API_KEY"),
        "gemini" => Some("GEMINI_API_KEY"),
        "mistral" => Some("MISTRAL_API_KEY"),
        "openrouter" => Some("OPENROUTER_API_KEY"),
        // Local servers (ollama, lmstudio, …) run without a key.
        _ => None,
    }
}

/// Ask the model to turn the OCR text into tariff JSON.
///
/// Empty or whitespace-only text returns [`StageFailure::EmptyText`] without
/// touching the backend. Service errors, timeouts and empty replies are
/// returned as failures carrying the underlying message.
pub async fn request_structured_data(
    backend: &dyn ChatBackend,
    extracted_text: &str,
    config: &ExtractionConfig,
) -> Result<Completion, StageFailure> {
    if extracted_text.trim().is_empty() {
        warn!("Extracted text is empty. Skipping model call.");
        return Err(StageFailure::EmptyText);
    }

    let system = config.system_prompt.as_deref().unwrap_or(SYSTEM_PROMPT);
    let prompt = extraction_prompt(extracted_text);
    let secs = config.api_timeout_secs;

    let completion = match timeout(Duration::from_secs(secs), backend.complete(system, &prompt)).await
    {
        Err(_) => {
            warn!("Model call timed out after {}s", secs);
            return Err(StageFailure::Timeout { secs });
        }
        Ok(Err(detail)) => {
            warn!("Model call failed: {}", detail);
            return Err(StageFailure::ServiceFailed { detail });
        }
        Ok(Ok(c)) => c,
    };

    let content = completion.content.trim();
    if content.is_empty() {
        warn!("Model returned an empty response.");
        return Err(StageFailure::EmptyResponse);
    }

    debug!(
        "Raw model response ({} in / {} out tokens):\n{}",
        completion.input_tokens, completion.output_tokens, content
    );

    Ok(Completion {
        content: content.to_string(),
        ..completion
    })
}
