//! Concrete LLM provider implementations
//!
//! This module contains implementations of the LLMProvider trait for
//! the hosted APIs and for local command-line tools.

#[cfg(feature = "anthropic")]
pub mod anthropic;
#[cfg(feature = "cli")]
pub mod cli;
#[cfg(feature = "gemini")]
pub mod gemini;
#[cfg(feature = "openai")]
pub mod openai;

#[cfg(feature = "anthropic")]
pub use anthropic::AnthropicProvider;
#[cfg(feature = "cli")]
pub use cli::{CliConfig, CliProvider};
#[cfg(feature = "gemini")]
pub use gemini::GeminiProvider;
#[cfg(feature = "openai")]
pub use openai::{OpenAIConfig, OpenAIProvider};
