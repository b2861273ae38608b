//! Ollama backend
//!
//! Local-model implementation of [`CompletionService`] over the Ollama
//! `/api/generate` endpoint, non-streaming.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use crate::error::MetisError;
use crate::provider::{
    CompletionRequest, CompletionResponse, CompletionService, ProviderCapabilities,
};

/// Ollama backend configuration
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    pub url: String,
    pub model: String,
    pub timeout: Duration,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            url: std::env::var("OLLAMA_URL")
                .unwrap_or_else(|_| "http://localhost:11434".to_string()),
            model: std::env::var("OLLAMA_MODEL").unwrap_or_else(|_| "llama3.2:3b".to_string()),
            timeout: Duration::from_secs(120),
        }
    }
}

/// Local Ollama backend
pub struct OllamaBackend {
    config: OllamaConfig,
    client: reqwest::Client,
}

impl OllamaBackend {
    pub fn new(config: OllamaConfig) -> Result<Self, MetisError> {
        if config.url.is_empty() {
            return Err(MetisError::Provider("Ollama URL not set".to_string()));
        }
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| MetisError::Provider(e.to_string()))?;
        Ok(Self { config, client })
    }

    async fn generate(&self, request: &CompletionRequest) -> anyhow::Result<String> {
        // Ollama has no separate system channel in /api/generate; prepend it.
        let prompt = if request.system_prompt.is_empty() {
            request.prompt.clone()
        } else {
            format!("{}\n\n{}", request.system_prompt, request.prompt)
        };

        let model = request
            .options
            .model
            .clone()
            .unwrap_or_else(|| self.config.model.clone());

        debug!("calling Ollama: model={}, prompt_len={}", model, prompt.len());

        let mut options = serde_json::Map::new();
        if let Some(temperature) = request.options.temperature {
            options.insert("temperature".to_string(), json!(temperature));
        }
        if let Some(max_tokens) = request.options.max_tokens {
            options.insert("num_predict".to_string(), json!(max_tokens));
        }

        let response = self
            .client
            .post(format!("{}/api/generate", self.config.url))
            .json(&json!({
                "model": model,
                "prompt": prompt,
                "stream": false,
                "options": options,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            anyhow::bail!("Ollama error {}", response.status());
        }

        let body: serde_json::Value = response.json().await?;
        Ok(body["response"].as_str().unwrap_or_default().to_string())
    }
}

#[async_trait]
impl CompletionService for OllamaBackend {
    async fn complete(&self, request: CompletionRequest) -> CompletionResponse {
        match self.generate(&request).await {
            Ok(text) => CompletionResponse::ok(text),
            Err(e) => CompletionResponse::failed(e.to_string()),
        }
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            streaming: false,
            system_prompt: true,
            json_mode: false,
        }
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_url_rejected() {
        let config = OllamaConfig {
            url: String::new(),
            ..Default::default()
        };
        assert!(matches!(
            OllamaBackend::new(config),
            Err(MetisError::Provider(_))
        ));
    }
}
