//! Claude API backend
//!
//! Anthropic Messages API implementation of [`CompletionService`]. Transport
//! and API failures come back as in-band soft errors on the response so the
//! reasoning core can carry them through its own result structures.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::MetisError;
use crate::provider::{
    CompletionRequest, CompletionResponse, CompletionService, ProviderCapabilities, Usage,
};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: usize = 4096;

/// Anthropic Claude backend
#[derive(Clone)]
pub struct ClaudeBackend {
    client: Client,
    api_key: String,
    default_model: String,
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct MessageRequest {
    model: String,
    max_tokens: usize,
    #[serde(skip_serializing_if = "String::is_empty")]
    system: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    content: Vec<ContentBlock>,
    usage: ApiUsage,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    r#type: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    input_tokens: usize,
    output_tokens: usize,
}

impl ClaudeBackend {
    /// Create a backend. A missing API key is fatal at construction.
    pub fn new(api_key: Option<&str>, default_model: &str) -> Result<Self, MetisError> {
        let api_key = api_key
            .filter(|k| !k.is_empty())
            .ok_or_else(|| MetisError::Provider("ANTHROPIC_API_KEY not set".to_string()))?;

        Ok(Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            default_model: default_model.to_string(),
        })
    }

    /// Get model ID from hint
    fn model_id(model: &str) -> &'static str {
        match model.to_lowercase().as_str() {
            "haiku" => "claude-3-5-haiku-20241022",
            "opus" => "claude-3-opus-20240229",
            _ => "claude-sonnet-4-20250514",
        }
    }

    async fn call_api(&self, request: &CompletionRequest) -> anyhow::Result<CompletionResponse> {
        let model_hint = request
            .options
            .model
            .as_deref()
            .unwrap_or(&self.default_model);
        let model_id = Self::model_id(model_hint);

        let body = MessageRequest {
            model: model_id.to_string(),
            max_tokens: request.options.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            system: request.system_prompt.clone(),
            messages: vec![Message {
                role: "user".to_string(),
                content: request.prompt.clone(),
            }],
            temperature: request.options.temperature,
        };

        debug!(
            "calling Claude API: model={}, prompt_len={}",
            model_id,
            request.prompt.len()
        );

        let response = self
            .client
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("Claude API error {}: {}", status, text);
        }

        let result: MessageResponse = response.json().await?;

        let text = result
            .content
            .into_iter()
            .filter_map(|b| if b.r#type == "text" { b.text } else { None })
            .collect::<Vec<_>>()
            .join("\n");

        Ok(CompletionResponse {
            text,
            usage: Some(Usage {
                input_tokens: result.usage.input_tokens,
                output_tokens: result.usage.output_tokens,
            }),
            error: None,
        })
    }
}

#[async_trait]
impl CompletionService for ClaudeBackend {
    async fn complete(&self, request: CompletionRequest) -> CompletionResponse {
        match self.call_api(&request).await {
            Ok(response) => response,
            Err(e) => CompletionResponse::failed(e.to_string()),
        }
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            streaming: false,
            system_prompt: true,
            json_mode: true,
        }
    }

    fn name(&self) -> &str {
        "claude"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_key_is_fatal() {
        assert!(matches!(
            ClaudeBackend::new(None, "sonnet"),
            Err(MetisError::Provider(_))
        ));
        assert!(matches!(
            ClaudeBackend::new(Some(""), "sonnet"),
            Err(MetisError::Provider(_))
        ));
    }

    #[test]
    fn test_model_id_mapping() {
        assert!(ClaudeBackend::model_id("haiku").contains("haiku"));
        assert!(ClaudeBackend::model_id("opus").contains("opus"));
        assert!(ClaudeBackend::model_id("anything-else").contains("sonnet"));
    }
}
