//! Completion collaborator seam
//!
//! The reasoning core talks to text-completion backends through
//! [`CompletionService`]. A populated `error` on the response is a soft
//! failure the core carries in its own result structures; backends only
//! return `Err`-like signals at construction time.
//!
//! Capabilities are an explicit descriptor attached by each backend
//! constructor and inspected with a pure predicate, never discovered by
//! runtime introspection.

use async_trait::async_trait;
use serde::Serialize;

/// Per-call generation options
#[derive(Debug, Clone, Default)]
pub struct CompletionOptions {
    /// Model hint understood by the backend (e.g. "haiku", "sonnet")
    pub model: Option<String>,
    /// Max response tokens
    pub max_tokens: Option<usize>,
    /// Sampling temperature
    pub temperature: Option<f64>,
}

/// A single completion request
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub prompt: String,
    pub system_prompt: String,
    pub options: CompletionOptions,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>, system_prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system_prompt: system_prompt.into(),
            options: CompletionOptions::default(),
        }
    }

    pub fn with_options(mut self, options: CompletionOptions) -> Self {
        self.options = options;
        self
    }
}

/// Token usage reported by a backend
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct Usage {
    pub input_tokens: usize,
    pub output_tokens: usize,
}

/// Completion outcome. A populated `error` means the text is unusable.
#[derive(Debug, Clone, Default)]
pub struct CompletionResponse {
    pub text: String,
    pub usage: Option<Usage>,
    pub error: Option<String>,
}

impl CompletionResponse {
    pub fn ok(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            usage: None,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            text: String::new(),
            usage: None,
            error: Some(error.into()),
        }
    }

    pub fn is_err(&self) -> bool {
        self.error.is_some()
    }
}

/// What a backend can do, declared at construction.
#[derive(Debug, Clone, Copy)]
pub struct ProviderCapabilities {
    pub streaming: bool,
    pub system_prompt: bool,
    pub json_mode: bool,
}

impl ProviderCapabilities {
    /// Whether the backend can drive the full reasoning pipeline.
    /// Pure predicate over the descriptor; no runtime probing.
    pub fn supports_reasoning_pipeline(&self) -> bool {
        self.system_prompt
    }
}

/// Text-completion backend used by the reasoning core.
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Issue one completion call. Transport and API failures come back as
    /// an in-band `error`, never as a panic.
    async fn complete(&self, request: CompletionRequest) -> CompletionResponse;

    /// Capability descriptor attached at construction.
    fn capabilities(&self) -> ProviderCapabilities;

    /// Short backend name for logging.
    fn name(&self) -> &str;
}
