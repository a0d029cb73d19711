//! LLM provider layer for niftyswing
//!
//! This crate routes a prompt to whichever language model backend is
//! configured. It includes:
//!
//! - Message and completion request/response types
//! - The [`LLMProvider`] trait and concrete providers (behind feature flags)
//! - A [`ProviderChain`] that falls through providers in priority order
//! - Retry with exponential backoff for transient failures
//! - JSON extraction from free-form model replies

pub mod chain;
pub mod completion;
pub mod error;
pub mod json;
pub mod messages;
pub mod provider;
pub mod retry;

// Re-export main types
pub use chain::{ChainReply, ProviderChain};
pub use completion::{CompletionRequest, CompletionResponse, StopReason, TokenUsage};
pub use error::{LLMError, Result};
pub use json::extract_json;
pub use messages::{Message, Role};
pub use provider::LLMProvider;
pub use retry::RetryPolicy;

// Provider implementations (feature-gated)
pub mod providers;
