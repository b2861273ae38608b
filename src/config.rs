//! Configuration management

use crate::error::MetisError;

/// Knobs consumed by the reasoning core.
///
/// Passed explicitly into each component's constructor; there is no ambient
/// global configuration.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Concurrency ceiling for fan-out solving (>= 1).
    pub fanout_limit: usize,

    /// Maximum reasoning attempts in the adaptive escalation loop (>= 1).
    pub max_attempts: u32,

    /// Refinement calls after the final reasoning attempt (MEDIUM/HIGH only).
    pub refinement_cycles: u32,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            fanout_limit: 2,
            max_attempts: 2,
            refinement_cycles: 1,
        }
    }
}

impl CoreConfig {
    /// Validate the configuration. Invalid knobs are fatal at construction.
    pub fn validate(&self) -> Result<(), MetisError> {
        if self.fanout_limit == 0 {
            return Err(MetisError::Config(
                "fanout_limit must be at least 1".to_string(),
            ));
        }
        if self.max_attempts == 0 {
            return Err(MetisError::Config(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Process configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Anthropic API key (optional - the claude backend requires it)
    pub anthropic_api_key: Option<String>,

    /// Ollama URL for the local backend (optional)
    pub ollama_url: Option<String>,

    /// SerpApi key for image retrieval (optional)
    pub serpapi_api_key: Option<String>,

    /// Default model hint for the claude backend
    pub default_model: String,

    /// Reasoning core knobs
    pub core: CoreConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, MetisError> {
        let anthropic_api_key = std::env::var("ANTHROPIC_API_KEY").ok();
        let ollama_url = std::env::var("OLLAMA_URL").ok();
        let serpapi_api_key = std::env::var("SERPAPI_API_KEY").ok();

        let default_model =
            std::env::var("METIS_DEFAULT_MODEL").unwrap_or_else(|_| "sonnet".to_string());

        let fanout_limit = std::env::var("METIS_FANOUT_LIMIT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(2);

        let max_attempts = std::env::var("METIS_MAX_ATTEMPTS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(2);

        let refinement_cycles = std::env::var("METIS_REFINEMENT_CYCLES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(1);

        let core = CoreConfig {
            fanout_limit,
            max_attempts,
            refinement_cycles,
        };
        core.validate()?;

        Ok(Self {
            anthropic_api_key,
            ollama_url,
            serpapi_api_key,
            default_model,
            core,
        })
    }
}
