//! Provider chain assembly from configuration

use crate::config::{ProviderKind, SwingConfig};
use std::sync::Arc;
use std::time::Duration;
use swing_llm::providers::{
    AnthropicProvider, CliConfig, CliProvider, GeminiProvider, OpenAIConfig, OpenAIProvider,
};
use swing_llm::{LLMProvider, ProviderChain, RetryPolicy};
use tracing::{debug, warn};

fn build_provider(kind: ProviderKind, config: &SwingConfig) -> swing_llm::Result<Option<(Arc<dyn LLMProvider>, String)>> {
    let ai = &config.ai;
    let timeout = ai.timeout_secs;

    let built: Option<(Arc<dyn LLMProvider>, String)> = match kind {
        ProviderKind::Anthropic => match &ai.anthropic_api_key {
            Some(key) => Some((
                Arc::new(AnthropicProvider::new(key.clone(), timeout)?),
                ai.anthropic_model.clone(),
            )),
            None => None,
        },
        ProviderKind::OpenAI => {
            // local OpenAI-compatible servers need a base URL but no key
            if ai.openai_api_key.is_none() && ai.openai_api_base.is_none() {
                None
            } else {
                let mut openai = OpenAIConfig::new(ai.openai_api_key.clone().unwrap_or_default())
                    .with_timeout(timeout);
                if let Some(base) = &ai.openai_api_base {
                    openai = openai.with_api_base(base.clone());
                }
                Some((Arc::new(OpenAIProvider::with_config(openai)?), ai.openai_model.clone()))
            }
        }
        ProviderKind::Gemini => match &ai.gemini_api_key {
            Some(key) => Some((
                Arc::new(GeminiProvider::new(key.clone(), timeout)?),
                ai.gemini_model.clone(),
            )),
            None => None,
        },
        ProviderKind::Cli => match &ai.cli_command {
            Some(command) => {
                let cli = CliConfig::parse(command)?.with_timeout(timeout);
                Some((Arc::new(CliProvider::new(cli)), "cli".to_string()))
            }
            None => None,
        },
    };
    Ok(built)
}

/// Chain of every configured provider, in the configured order
///
/// Returns `None` when AI is disabled or no provider has credentials.
pub fn provider_chain(config: &SwingConfig) -> Option<ProviderChain> {
    if !config.ai.enabled {
        return None;
    }

    let mut chain = ProviderChain::new()
        .with_max_tokens(config.ai.max_tokens)
        .with_temperature(config.ai.temperature)
        .with_retry(RetryPolicy::new(
            config.network.max_retries,
            config.retry_backoff(0),
            Duration::from_secs(30),
            2.0,
        ));

    for kind in &config.ai.providers {
        match build_provider(*kind, config) {
            Ok(Some((provider, model))) => {
                debug!(provider = provider.name(), model = %model, "Provider enabled");
                chain.push(provider, model);
            }
            Ok(None) => debug!(provider = ?kind, "Provider not configured"),
            Err(e) => warn!(provider = ?kind, error = %e, "Provider setup failed, skipping"),
        }
    }

    if chain.is_empty() { None } else { Some(chain) }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SwingConfig {
        SwingConfig::builder().build().unwrap()
    }

    #[test]
    fn test_no_credentials_no_chain() {
        assert!(provider_chain(&config()).is_none());
    }

    #[test]
    fn test_disabled_ai() {
        let mut cfg = config();
        cfg.ai.anthropic_api_key = Some("sk-test".into());
        cfg.ai.enabled = false;
        assert!(provider_chain(&cfg).is_none());
    }

    #[test]
    fn test_chain_follows_configured_order() {
        let mut cfg = config();
        cfg.ai.providers = vec![ProviderKind::Cli, ProviderKind::Gemini, ProviderKind::Anthropic];
        cfg.ai.anthropic_api_key = Some("sk-test".into());
        cfg.ai.cli_command = Some("claude -p".into());

        let chain = provider_chain(&cfg).unwrap();
        assert_eq!(chain.provider_names(), vec!["cli", "anthropic"]);
    }

    #[test]
    fn test_local_openai_without_key() {
        let mut cfg = config();
        cfg.ai.providers = vec![ProviderKind::OpenAI];
        cfg.ai.openai_api_base = Some("http://localhost:1234/v1".into());
        let chain = provider_chain(&cfg).unwrap();
        assert_eq!(chain.provider_names(), vec!["openai"]);
    }
}
