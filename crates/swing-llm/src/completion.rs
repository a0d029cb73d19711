//! Completion request and response types

use crate::Message;
use serde::{Deserialize, Serialize};

/// One prompt sent to a backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub model: String,

    /// User/assistant turns, oldest first
    pub messages: Vec<Message>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    pub max_tokens: usize,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,
}

/// Text reply from a backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub text: String,
    pub stop_reason: StopReason,
    pub usage: TokenUsage,
}

/// Why generation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EndTurn,
    /// Reply was cut at `max_tokens`
    MaxTokens,
    StopSequence,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: usize,
    pub output_tokens: usize,
}

impl TokenUsage {
    pub fn total(&self) -> usize {
        self.input_tokens + self.output_tokens
    }

    /// Rough count for backends that report no usage (about 4 chars per token)
    pub fn estimate(prompt: &str, reply: &str) -> Self {
        Self {
            input_tokens: prompt.chars().count().div_ceil(4),
            output_tokens: reply.chars().count().div_ceil(4),
        }
    }
}

impl CompletionRequest {
    /// Create a builder for completion requests
    pub fn builder(model: impl Into<String>) -> CompletionRequestBuilder {
        CompletionRequestBuilder::new(model)
    }

    /// Flatten system prompt and messages into one transcript
    ///
    /// Used by backends that only accept a single text blob (shell CLIs).
    pub fn transcript(&self) -> String {
        let mut out = String::new();
        if let Some(system) = &self.system {
            out.push_str(system);
            out.push_str("\n\n");
        }
        for (i, msg) in self.messages.iter().enumerate() {
            if i > 0 {
                out.push_str("\n\n");
            }
            if self.messages.len() > 1 {
                out.push_str(&format!("[{}]\n", msg.role.as_str()));
            }
            out.push_str(&msg.content);
        }
        out
    }
}

/// Builder for CompletionRequest
pub struct CompletionRequestBuilder {
    model: String,
    messages: Vec<Message>,
    system: Option<String>,
    max_tokens: usize,
    temperature: Option<f32>,
    stop_sequences: Option<Vec<String>>,
}

impl CompletionRequestBuilder {
    /// Create a new builder
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            messages: Vec::new(),
            system: None,
            max_tokens: 1024,
            temperature: None,
            stop_sequences: None,
        }
    }

    /// Add a single message
    pub fn add_message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    /// Set the system prompt
    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Set the maximum tokens
    pub fn max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set the temperature
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set stop sequences
    pub fn stop_sequences(mut self, sequences: Vec<String>) -> Self {
        self.stop_sequences = Some(sequences);
        self
    }

    /// Build the completion request
    pub fn build(self) -> CompletionRequest {
        CompletionRequest {
            model: self.model,
            messages: self.messages,
            system: self.system,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            stop_sequences: self.stop_sequences,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Message;

    #[test]
    fn test_builder() {
        let request = CompletionRequest::builder("claude-sonnet-4-5")
            .add_message(Message::user("Score these headlines"))
            .system("You are an equity analyst")
            .max_tokens(800)
            .temperature(0.2)
            .build();

        assert_eq!(request.model, "claude-sonnet-4-5");
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.max_tokens, 800);
        assert_eq!(request.temperature, Some(0.2));
    }

    #[test]
    fn test_transcript_single_message() {
        let request = CompletionRequest::builder("m")
            .system("SYS")
            .add_message(Message::user("BODY"))
            .build();
        assert_eq!(request.transcript(), "SYS\n\nBODY");
    }

    #[test]
    fn test_transcript_labels_multi_turn() {
        let request = CompletionRequest::builder("m")
            .add_message(Message::user("q"))
            .add_message(Message::assistant("a"))
            .build();
        assert_eq!(request.transcript(), "[user]\nq\n\n[assistant]\na");
    }

    #[test]
    fn test_token_usage() {
        let usage = TokenUsage {
            input_tokens: 100,
            output_tokens: 50,
        };
        assert_eq!(usage.total(), 150);
    }

    #[test]
    fn test_usage_estimate() {
        let usage = TokenUsage::estimate("abcdefgh", "₹100 cr");
        assert_eq!(usage.input_tokens, 2);
        assert_eq!(usage.output_tokens, 2);
        assert_eq!(usage.total(), 4);
        assert_eq!(TokenUsage::estimate("", "").total(), 0);
    }
}
