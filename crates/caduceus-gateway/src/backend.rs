//! Model backend capability and request/response types.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Trait for LLM backends.
///
/// Implementations must be thread-safe (Send + Sync) for use in async
/// contexts. The router wraps every call with its own timeout and retry
/// policy, so implementations only need to perform a single attempt.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Complete a prompt with a single response.
    ///
    /// # Errors
    /// Returns error if the backend fails, network issues occur, or the
    /// response cannot be parsed.
    async fn complete(&self, request: CompletionRequest) -> Result<ModelCompletion>;

    /// Get the unique identifier for this backend.
    fn backend_id(&self) -> &str;
}

/// Request for a model completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// The (already redacted) user prompt
    pub prompt: String,

    /// Model to invoke
    pub model: String,

    /// Maximum tokens to generate (optional)
    pub max_tokens: Option<u32>,

    /// Temperature for sampling (optional)
    pub temperature: Option<f32>,

    /// System prompt (optional)
    pub system_prompt: Option<String>,
}

impl CompletionRequest {
    /// Create a new completion request for a prompt and model.
    #[must_use]
    pub fn new(prompt: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model: model.into(),
            max_tokens: None,
            temperature: None,
            system_prompt: None,
        }
    }

    /// Set the maximum tokens to generate.
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set the temperature.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the system prompt.
    #[must_use]
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }
}

/// Response from a model completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelCompletion {
    /// The generated text
    pub text: String,

    /// Model that generated the response
    pub model: String,

    /// Input tokens consumed
    pub input_tokens: u32,

    /// Output tokens generated
    pub output_tokens: u32,
}

impl ModelCompletion {
    /// Total tokens used.
    #[must_use]
    pub fn total_tokens(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completion_request_builder() {
        let req = CompletionRequest::new("Hello", "gpt-4o-mini")
            .with_max_tokens(100)
            .with_temperature(0.7)
            .with_system_prompt("You are a careful assistant");

        assert_eq!(req.prompt, "Hello");
        assert_eq!(req.model, "gpt-4o-mini");
        assert_eq!(req.max_tokens, Some(100));
        assert_eq!(req.temperature, Some(0.7));
        assert!(req.system_prompt.is_some());
    }

    #[test]
    fn test_total_tokens() {
        let completion = ModelCompletion {
            text: "hi".to_string(),
            model: "gpt-4o-mini".to_string(),
            input_tokens: 10,
            output_tokens: 20,
        };
        assert_eq!(completion.total_tokens(), 30);
    }
}
