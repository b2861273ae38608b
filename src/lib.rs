//! Metis - adaptive complexity-routed reasoning
//!
//! Estimates how hard a free-text request is and routes it through one of
//! three escalating reasoning strategies against an LLM backend.
//!
//! # Features
//!
//! - **Complexity Analysis**: lexical heuristic with an optional deep
//!   linguistic pass, bucketing requests into LOW/MEDIUM/HIGH regimes
//! - **Overthinking Prevention**: LOW answers skip refinement and escalation
//! - **Collapse Prevention**: HIGH requests are decomposed and solved as
//!   concurrent sub-problems, then integrated
//! - **Self-Evaluation**: an LLM judge decides whether to escalate the regime
//! - **Parallel Pipeline**: best-of-three across all regimes with judge
//!   selection
//! - **Side Augmentation**: optional Wikipedia background and image lookup
//!
//! # Architecture
//!
//! ```text
//! Request ──► Orchestrator ──► ComplexityAnalyzer (score + regime)
//!                 │
//!                 ├── ReasoningEngine ──► low: direct
//!                 │        │              medium: structured stages
//!                 │        │              high: decompose ─► BoundedExecutor
//!                 │        │                                 ─► integrate
//!                 │        └── CompletionService (Claude / Ollama)
//!                 │
//!                 ├── judge calls (sufficiency, selection)
//!                 └── collaborators (knowledge, images)
//! ```

pub mod analyzer;
pub mod augment;
pub mod claude;
pub mod config;
pub mod engine;
pub mod error;
pub mod executor;
pub mod extract;
pub mod image;
pub mod ollama;
pub mod orchestrator;
pub mod provider;

pub use analyzer::{ComplexityAnalyzer, LinguisticModel, Regime};
pub use augment::{KnowledgeAugmenter, WikipediaAugmenter};
pub use claude::ClaudeBackend;
pub use config::{Config, CoreConfig};
pub use engine::{ReasoningEngine, ReasoningResult, SubSolution};
pub use error::MetisError;
pub use executor::BoundedExecutor;
pub use image::{ImageResult, ImageRetriever, SerpApiImageSearch};
pub use ollama::{OllamaBackend, OllamaConfig};
pub use orchestrator::{
    ExecutionMode, Orchestrator, ReasoningMetrics, SolveOptions, SolveResult,
};
pub use provider::{
    CompletionOptions, CompletionRequest, CompletionResponse, CompletionService,
    ProviderCapabilities, Usage,
};
