//! Regime-conditioned reasoning engine
//!
//! Executes the strategy matching a complexity regime:
//! - LOW: one direct call, no refinement afterwards (overthinking prevention)
//! - MEDIUM: one structured call with five explicit reasoning stages
//! - HIGH: decompose into sub-problems, solve them concurrently through the
//!   bounded executor, integrate the usable solutions (collapse prevention)
//!
//! Provider-level errors ride in-band on [`ReasoningResult::error`]; the
//! engine itself only errors on misconfiguration at construction.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::analyzer::{ComplexityAnalyzer, Regime};
use crate::config::CoreConfig;
use crate::error::MetisError;
use crate::executor::BoundedExecutor;
use crate::extract;
use crate::provider::{CompletionOptions, CompletionRequest, CompletionService};

const LOW_TEMPLATE: &str = "Answer the following problem concisely and efficiently.\n\
Avoid extended analysis or second-guessing; take the direct approach.\n\n\
Problem: {prompt}\n\n\
Important: the first reasonable answer that comes to mind is usually correct.";

const MEDIUM_TEMPLATE: &str = "Solve the following problem step by step, in a systematic way.\n\n\
Problem: {prompt}\n\n\
Reasoning stages:\n\
1. Identify the core elements of the problem\n\
2. Gather the information needed to solve it\n\
3. Build a step-by-step strategy\n\
4. Execute each step and verify the intermediate result\n\
5. Integrate the verified steps into a final answer\n\n\
Show the intermediate result of each stage and how it connects to the next.";

const DECOMPOSE_TEMPLATE: &str = "Break the following complex problem into independent sub-problems.\n\n\
Problem: {prompt}\n\n\
Respond with a strict JSON object of the form:\n\
{\"sub_problems\": [\"first sub-problem\", \"second sub-problem\", ...]}\n\n\
Each sub-problem must be solvable on its own. JSON only:";

const SUB_SOLVE_TEMPLATE: &str = "You are solving one part of a larger problem.\n\n\
Original problem (context): {original}\n\n\
Your sub-problem: {sub}\n\n\
Solve only the sub-problem above. Be precise and complete.";

const INTEGRATE_TEMPLATE: &str = "Combine the following partial solutions into one coherent synthesis.\n\n\
Original problem: {original}\n\n\
Partial solutions:\n{pairs}\n\
Produce a single, self-contained answer to the original problem. Resolve any\n\
conflicts between the partial solutions and fill obvious gaps.";

/// Strategy tags carried on results
pub mod approach {
    pub const EFFICIENT_DIRECT: &str = "efficient_direct";
    pub const STRUCTURED_PROGRESSIVE: &str = "structured_progressive";
    pub const DECOMPOSITION_STAGED: &str = "decomposition_staged";
}

/// One decomposed sub-problem's outcome
#[derive(Debug, Clone)]
pub struct SubSolution {
    pub sub_problem: String,
    pub text: String,
    pub error: Option<String>,
}

impl SubSolution {
    /// Usable for integration: no error and non-empty text.
    pub fn is_usable(&self) -> bool {
        self.error.is_none() && !self.text.trim().is_empty()
    }
}

/// Outcome of one reasoning execution
#[derive(Debug, Clone)]
pub struct ReasoningResult {
    pub solution: String,
    /// Provider-level failure, carried in-band
    pub error: Option<String>,
    pub regime: Regime,
    pub approach: &'static str,
    pub overthinking_prevented: bool,
    pub collapse_prevented: bool,
    /// Sub-problems produced by decomposition (HIGH only)
    pub decomposition: Option<Vec<String>>,
    /// Per-sub-problem outcomes (HIGH only)
    pub sub_solutions: Option<Vec<SubSolution>>,
}

impl ReasoningResult {
    fn success(solution: String, regime: Regime, approach: &'static str) -> Self {
        Self {
            solution,
            error: None,
            regime,
            approach,
            overthinking_prevented: false,
            collapse_prevented: false,
            decomposition: None,
            sub_solutions: None,
        }
    }

    fn failure(error: String, regime: Regime, approach: &'static str) -> Self {
        Self {
            solution: String::new(),
            error: Some(error),
            regime,
            approach,
            overthinking_prevented: false,
            collapse_prevented: false,
            decomposition: None,
            sub_solutions: None,
        }
    }

    pub fn is_err(&self) -> bool {
        self.error.is_some()
    }
}

/// Regime-conditioned reasoning over a completion backend.
pub struct ReasoningEngine {
    provider: Arc<dyn CompletionService>,
    analyzer: ComplexityAnalyzer,
    executor: BoundedExecutor,
    options: CompletionOptions,
}

impl ReasoningEngine {
    /// Create an engine. Invalid core config is fatal here.
    pub fn new(
        provider: Arc<dyn CompletionService>,
        config: &CoreConfig,
    ) -> Result<Self, MetisError> {
        config.validate()?;
        Ok(Self {
            provider,
            analyzer: ComplexityAnalyzer::new(),
            executor: BoundedExecutor::new(config.fanout_limit)?,
            options: CompletionOptions::default(),
        })
    }

    /// Use a custom analyzer (e.g. with a linguistic model attached).
    pub fn with_analyzer(mut self, analyzer: ComplexityAnalyzer) -> Self {
        self.analyzer = analyzer;
        self
    }

    /// Default generation options for every call this engine issues.
    pub fn with_options(mut self, options: CompletionOptions) -> Self {
        self.options = options;
        self
    }

    /// Execute the strategy for the given regime. When score/regime are not
    /// supplied, the analyzer derives them from the prompt.
    pub async fn execute(
        &self,
        prompt: &str,
        system_prompt: &str,
        score: Option<f64>,
        regime: Option<Regime>,
    ) -> ReasoningResult {
        let (score, regime) = match (score, regime) {
            (Some(s), Some(r)) => (s, r),
            (_, Some(r)) => (0.0, r),
            _ => self.analyzer.analyze(prompt),
        };

        info!(
            "executing {} reasoning (complexity {:.2})",
            regime.as_str(),
            score
        );

        match regime {
            Regime::Low => self.execute_low(prompt, system_prompt).await,
            Regime::Medium => self.execute_medium(prompt, system_prompt).await,
            Regime::High => self.execute_high(prompt, system_prompt).await,
        }
    }

    async fn call(&self, prompt: String, system_prompt: &str) -> crate::provider::CompletionResponse {
        let request = CompletionRequest::new(prompt, system_prompt)
            .with_options(self.options.clone());
        self.provider.complete(request).await
    }

    async fn execute_low(&self, prompt: &str, system_prompt: &str) -> ReasoningResult {
        let response = self
            .call(LOW_TEMPLATE.replace("{prompt}", prompt), system_prompt)
            .await;

        if let Some(error) = response.error {
            return ReasoningResult::failure(error, Regime::Low, approach::EFFICIENT_DIRECT);
        }

        let mut result =
            ReasoningResult::success(response.text, Regime::Low, approach::EFFICIENT_DIRECT);
        result.overthinking_prevented = true;
        result
    }

    async fn execute_medium(&self, prompt: &str, system_prompt: &str) -> ReasoningResult {
        let response = self
            .call(MEDIUM_TEMPLATE.replace("{prompt}", prompt), system_prompt)
            .await;

        if let Some(error) = response.error {
            return ReasoningResult::failure(
                error,
                Regime::Medium,
                approach::STRUCTURED_PROGRESSIVE,
            );
        }

        ReasoningResult::success(
            response.text,
            Regime::Medium,
            approach::STRUCTURED_PROGRESSIVE,
        )
    }

    async fn execute_high(&self, prompt: &str, system_prompt: &str) -> ReasoningResult {
        // Phase 1: decompose
        let response = self
            .call(DECOMPOSE_TEMPLATE.replace("{prompt}", prompt), system_prompt)
            .await;

        if let Some(error) = response.error {
            return ReasoningResult::failure(
                error,
                Regime::High,
                approach::DECOMPOSITION_STAGED,
            );
        }

        let sub_problems = extract::sub_problems(&response.text);
        if sub_problems.is_empty() {
            // Designed fallback, not an error: an undecomposable problem is
            // handled by the structured strategy on the original prompt.
            info!("decomposition produced no sub-problems, degrading to medium strategy");
            return self.execute_medium(prompt, system_prompt).await;
        }

        debug!("decomposed into {} sub-problems", sub_problems.len());

        // Phase 2: fan-out solve through the bounded executor
        let sub_solutions = self
            .solve_sub_problems(&sub_problems, prompt, system_prompt)
            .await;

        // Phase 3: integrate usable solutions only
        let usable: Vec<&SubSolution> =
            sub_solutions.iter().filter(|s| s.is_usable()).collect();

        if usable.is_empty() {
            warn!("every sub-problem failed; integration aborted");
            let error = MetisError::AggregateFailure {
                total: sub_solutions.len(),
            };
            let mut result = ReasoningResult::failure(
                error.to_string(),
                Regime::High,
                approach::DECOMPOSITION_STAGED,
            );
            result.decomposition = Some(sub_problems);
            result.sub_solutions = Some(sub_solutions);
            return result;
        }

        let response = self.integrate(prompt, system_prompt, &usable).await;
        let mut result = match response.error {
            Some(error) => ReasoningResult::failure(
                error,
                Regime::High,
                approach::DECOMPOSITION_STAGED,
            ),
            None => ReasoningResult::success(
                response.text,
                Regime::High,
                approach::DECOMPOSITION_STAGED,
            ),
        };
        result.collapse_prevented = result.error.is_none();
        result.decomposition = Some(sub_problems);
        result.sub_solutions = Some(sub_solutions);
        result
    }

    async fn solve_sub_problems(
        &self,
        sub_problems: &[String],
        original: &str,
        system_prompt: &str,
    ) -> Vec<SubSolution> {
        let units: Vec<_> = sub_problems
            .iter()
            .map(|sub| {
                let prompt = SUB_SOLVE_TEMPLATE
                    .replace("{original}", original)
                    .replace("{sub}", sub);
                let sub = sub.clone();
                async move {
                    let response = self.call(prompt, system_prompt).await;
                    SubSolution {
                        sub_problem: sub,
                        text: response.text,
                        error: response.error,
                    }
                }
            })
            .collect();

        self.executor.run_all(units).await
    }

    async fn integrate(
        &self,
        original: &str,
        system_prompt: &str,
        usable: &[&SubSolution],
    ) -> crate::provider::CompletionResponse {
        let pairs = usable
            .iter()
            .enumerate()
            .map(|(i, s)| {
                format!(
                    "Sub-problem {}: {}\nSolution {}: {}\n",
                    i + 1,
                    s.sub_problem,
                    i + 1,
                    s.text.trim()
                )
            })
            .collect::<Vec<_>>()
            .join("\n");

        let prompt = INTEGRATE_TEMPLATE
            .replace("{original}", original)
            .replace("{pairs}", &pairs);
        self.call(prompt, system_prompt).await
    }
}
