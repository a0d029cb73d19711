//! Ordered fallback across providers
//!
//! The chain is what the analyzers talk to: it tries each configured backend
//! in priority order and returns the first successful reply.

use crate::{CompletionRequest, LLMError, LLMProvider, Message, Result, RetryPolicy};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

struct ChainEntry {
    provider: Arc<dyn LLMProvider>,
    model: String,
}

/// Reply from the first provider that answered
#[derive(Debug, Clone)]
pub struct ChainReply {
    /// Name of the provider that produced the reply
    pub provider: String,
    /// Model used
    pub model: String,
    /// Reply text
    pub text: String,
}

/// Providers tried in priority order
pub struct ProviderChain {
    entries: Vec<ChainEntry>,
    retry: RetryPolicy,
    max_tokens: usize,
    temperature: f32,
}

impl Default for ProviderChain {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderChain {
    /// Create an empty chain
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            retry: RetryPolicy::default(),
            max_tokens: 1024,
            temperature: 0.2,
        }
    }

    /// Append a provider with the model it should be asked for
    pub fn with_provider(mut self, provider: Arc<dyn LLMProvider>, model: impl Into<String>) -> Self {
        self.push(provider, model);
        self
    }

    /// Append a provider in place
    pub fn push(&mut self, provider: Arc<dyn LLMProvider>, model: impl Into<String>) {
        self.entries.push(ChainEntry {
            provider,
            model: model.into(),
        });
    }

    /// Set the retry policy used per provider
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set the token budget for replies
    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set the sampling temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Whether no provider is configured
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Provider names in priority order
    pub fn provider_names(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.provider.name().to_string()).collect()
    }

    /// Send a single-turn prompt, falling through providers on failure
    #[instrument(skip(self, system, prompt), fields(providers = self.entries.len()))]
    pub async fn complete_text(&self, system: &str, prompt: &str) -> Result<ChainReply> {
        if self.entries.is_empty() {
            return Err(LLMError::ConfigurationError("no LLM provider configured".to_string()));
        }

        let mut failures = Vec::new();

        for entry in &self.entries {
            let name = entry.provider.name().to_string();
            let outcome = self
                .retry
                .execute(&name, || {
                    let request = CompletionRequest::builder(entry.model.clone())
                        .system(system)
                        .add_message(Message::user(prompt))
                        .max_tokens(self.max_tokens)
                        .temperature(self.temperature)
                        .build();
                    entry.provider.complete(request)
                })
                .await;

            match outcome {
                Ok(response) if !response.text.trim().is_empty() => {
                    debug!(provider = %name, tokens = response.usage.total(), "provider answered");
                    return Ok(ChainReply {
                        provider: name,
                        model: entry.model.clone(),
                        text: response.text,
                    });
                }
                Ok(_) => {
                    warn!(provider = %name, "provider returned an empty reply");
                    failures.push(format!("{name}: empty reply"));
                }
                Err(e) => {
                    warn!(provider = %name, error = %e, "provider failed, trying next");
                    failures.push(format!("{name}: {e}"));
                }
            }
        }

        Err(LLMError::ProviderError(format!(
            "all providers failed ({})",
            failures.join("; ")
        )))
    }
}
