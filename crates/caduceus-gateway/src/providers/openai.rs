//! `OpenAI`-compatible chat-completions backend.

use crate::backend::{CompletionRequest, ModelBackend, ModelCompletion};
use crate::error::{GatewayError, Result};
use async_trait::async_trait;
use caduceus_core::config::UpstreamConfig;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// HTTP backend speaking the `OpenAI` chat-completions API.
pub struct OpenAiBackend {
    api_key: String,
    client: Client,
    base_url: String,
}

impl OpenAiBackend {
    /// Create a new backend with the given API key and upstream settings.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created.
    pub fn new(api_key: impl Into<String>, upstream: &UpstreamConfig) -> Result<Self> {
        Self::with_base_url(api_key, upstream, "https://api.openai.com/v1")
    }

    /// Create a backend against a compatible gateway at `base_url`.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created.
    pub fn with_base_url(
        api_key: impl Into<String>,
        upstream: &UpstreamConfig,
        base_url: impl Into<String>,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(upstream.timeout_secs))
            .build()?;

        Ok(Self {
            api_key: api_key.into(),
            client,
            base_url: base_url.into(),
        })
    }

    fn to_api_request(request: &CompletionRequest) -> ApiRequest {
        let mut messages = Vec::new();

        if let Some(system) = &request.system_prompt {
            messages.push(ApiMessage {
                role: "system".to_string(),
                content: system.clone(),
            });
        }

        messages.push(ApiMessage {
            role: "user".to_string(),
            content: request.prompt.clone(),
        });

        ApiRequest {
            model: request.model.clone(),
            messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        }
    }

    fn convert_api_response(response: ApiResponse) -> Result<ModelCompletion> {
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| GatewayError::Parse {
                backend: "openai".to_string(),
                message: "no choices in response".to_string(),
            })?;

        let usage = response.usage.unwrap_or_default();

        Ok(ModelCompletion {
            text: choice.message.content,
            model: response.model,
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
        })
    }
}

#[async_trait]
impl ModelBackend for OpenAiBackend {
    async fn complete(&self, request: CompletionRequest) -> Result<ModelCompletion> {
        let api_request = Self::to_api_request(&request);

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&api_request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(GatewayError::Api {
                backend: "openai".to_string(),
                status: status.as_u16(),
                message: error_text,
            });
        }

        let api_response: ApiResponse =
            response.json().await.map_err(|e| GatewayError::Parse {
                backend: "openai".to_string(),
                message: format!("Failed to parse response: {e}"),
            })?;

        Self::convert_api_response(api_response)
    }

    fn backend_id(&self) -> &str {
        "openai"
    }
}

// OpenAI API types

#[derive(Debug, Serialize)]
struct ApiRequest {
    model: String,
    messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    model: String,
    choices: Vec<ApiChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Debug, Default, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_creation() {
        let backend =
            OpenAiBackend::new("test-key", &UpstreamConfig::default()).expect("create backend");
        assert_eq!(backend.backend_id(), "openai");
    }

    #[test]
    fn test_api_request_conversion() {
        let request = CompletionRequest::new("Hello", "gpt-4o-mini")
            .with_max_tokens(500)
            .with_system_prompt("You are careful");

        let api_request = OpenAiBackend::to_api_request(&request);

        assert_eq!(api_request.model, "gpt-4o-mini");
        assert_eq!(api_request.max_tokens, Some(500));
        assert_eq!(api_request.messages.len(), 2);
        assert_eq!(api_request.messages[0].role, "system");
        assert_eq!(api_request.messages[1].role, "user");
        assert_eq!(api_request.messages[1].content, "Hello");
    }

    #[test]
    fn test_response_conversion() {
        let api_response = ApiResponse {
            model: "gpt-4o-mini".to_string(),
            choices: vec![ApiChoice {
                message: ApiMessage {
                    role: "assistant".to_string(),
                    content: "Hi there".to_string(),
                },
            }],
            usage: Some(ApiUsage {
                prompt_tokens: 12,
                completion_tokens: 3,
            }),
        };

        let completion =
            OpenAiBackend::convert_api_response(api_response).expect("convert response");
        assert_eq!(completion.text, "Hi there");
        assert_eq!(completion.input_tokens, 12);
        assert_eq!(completion.output_tokens, 3);
    }

    #[test]
    fn test_empty_choices_is_parse_error() {
        let api_response = ApiResponse {
            model: "gpt-4o-mini".to_string(),
            choices: Vec::new(),
            usage: None,
        };

        let result = OpenAiBackend::convert_api_response(api_response);
        assert!(matches!(result, Err(GatewayError::Parse { .. })));
    }
}
