//! Top-level solve orchestration
//!
//! Sequences analysis, reasoning, self-evaluation and refinement into one
//! `solve` call. Two execution modes:
//!
//! - **Adaptive**: analyze once, reason at the chosen regime, ask a judge
//!   whether the answer suffices, and escalate (monotonically, bounded by the
//!   attempt cap) when it does not. MEDIUM/HIGH answers get one limited
//!   refinement pass; LOW answers skip both judging and refinement
//!   (overthinking prevention).
//! - **Parallel**: run all three regimes concurrently against the same
//!   prompt, discard failures, and let a judge pick among the survivors.
//!
//! Optional collaborators: a knowledge augmenter that rewrites the prompt
//! before analysis and an image retriever triggered by literal terms in the
//! original request. Failures in either never affect the main result.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::analyzer::{ComplexityAnalyzer, Regime};
use crate::augment::KnowledgeAugmenter;
use crate::config::CoreConfig;
use crate::engine::{ReasoningEngine, ReasoningResult};
use crate::error::MetisError;
use crate::executor::BoundedExecutor;
use crate::extract;
use crate::image::{self, ImageRetriever};
use crate::provider::{CompletionRequest, CompletionService};

const EVALUATE_TEMPLATE: &str = "Judge whether the answer below sufficiently resolves the original request.\n\n\
Original request: {prompt}\n\n\
Answer: {solution}\n\n\
Respond with a strict JSON object:\n\
{\"is_sufficient\": true or false, \"reason\": \"...\", \"next_recommended_complexity\": \"low\" or \"medium\" or \"high\"}\n\n\
JSON only:";

const SELECT_TEMPLATE: &str = "Several candidate answers to the same request are listed below, each labeled\n\
with its index and the reasoning regime that produced it.\n\n\
Request: {prompt}\n\n\
{candidates}\n\
Choose the single best candidate. Respond with a strict JSON object:\n\
{\"best_choice_index\": <index>, \"reason\": \"...\"}\n\n\
JSON only:";

const REFINE_TEMPLATE: &str = "Review the answer below and apply only the minimal, necessary corrections.\n\
Do not restructure or expand it.\n\n\
Original problem: {prompt}\n\n\
Current answer: {solution}\n\n\
Check for logical consistency, obvious errors, and missing essentials.\n\
Return the corrected answer, changing as little as possible.";

const IMAGE_QUERY_TEMPLATE: &str = "Generate a concise image search query (a few words, no punctuation)\n\
for the request below.\n\n\
Request: {prompt}\n\n\
Search query:";

/// Fan-out width of the parallel pipeline: one execution per regime.
const PARALLEL_FANOUT: usize = 3;

/// How a solve is executed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Analyze, reason, self-evaluate, escalate
    Adaptive,
    /// Best-of-three across all regimes
    Parallel,
}

/// Per-solve options
#[derive(Debug, Clone)]
pub struct SolveOptions {
    pub mode: ExecutionMode,
    /// Skip analysis and pin the regime (disables escalation)
    pub force_regime: Option<Regime>,
    /// Allow the self-evaluation/escalation loop
    pub escalation: bool,
    /// Rewrite the prompt with retrieved background before analysis
    pub augment_knowledge: bool,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::Adaptive,
            force_regime: None,
            escalation: true,
            augment_knowledge: false,
        }
    }
}

/// Per-solve metrics.
///
/// `consistency_unverified` mirrors a fixed placeholder in earlier iterations
/// of this pipeline; it is informational only and never computed here.
#[derive(Debug, Clone, Serialize)]
pub struct ReasoningMetrics {
    pub complexity_score: Option<f64>,
    pub regime: Regime,
    pub solution_words: usize,
    pub overthinking_prevented: bool,
    pub collapse_prevented: bool,
    pub consistency_unverified: Option<f64>,
}

/// Top-level solve outcome
#[derive(Debug, Clone, Serialize)]
pub struct SolveResult {
    pub success: bool,
    pub final_solution: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub regime: Regime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub complexity_score: Option<f64>,
    pub approach: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<ReasoningMetrics>,
}

impl SolveResult {
    fn failure(error: String, regime: Regime, approach: &str, score: Option<f64>) -> Self {
        Self {
            success: false,
            final_solution: String::new(),
            error: Some(error),
            regime,
            complexity_score: score,
            approach: approach.to_string(),
            image_url: None,
            metrics: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SufficiencyJson {
    is_sufficient: Option<bool>,
    reason: Option<String>,
    next_recommended_complexity: Option<String>,
}

#[derive(Debug)]
struct EvaluationVerdict {
    is_sufficient: bool,
    reason: String,
    recommended: Option<Regime>,
}

impl EvaluationVerdict {
    fn sufficient(reason: &str) -> Self {
        Self {
            is_sufficient: true,
            reason: reason.to_string(),
            recommended: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SelectionJson {
    best_choice_index: Option<i64>,
    #[allow(dead_code)]
    reason: Option<String>,
}

/// Orchestrates analysis, reasoning, evaluation and augmentation.
pub struct Orchestrator {
    provider: Arc<dyn CompletionService>,
    engine: ReasoningEngine,
    analyzer: ComplexityAnalyzer,
    config: CoreConfig,
    pipeline: BoundedExecutor,
    augmenter: Option<Arc<dyn KnowledgeAugmenter>>,
    images: Option<Arc<dyn ImageRetriever>>,
}

impl Orchestrator {
    /// Create an orchestrator. Invalid core config is fatal here and only
    /// here; everything later degrades or is carried in-band.
    pub fn new(
        provider: Arc<dyn CompletionService>,
        config: CoreConfig,
    ) -> Result<Self, MetisError> {
        config.validate()?;
        let engine = ReasoningEngine::new(Arc::clone(&provider), &config)?;
        Ok(Self {
            provider,
            engine,
            analyzer: ComplexityAnalyzer::new(),
            config,
            pipeline: BoundedExecutor::new(PARALLEL_FANOUT)?,
            augmenter: None,
            images: None,
        })
    }

    /// Use a custom analyzer (e.g. with a linguistic model attached).
    pub fn with_analyzer(mut self, analyzer: ComplexityAnalyzer) -> Self {
        self.analyzer = analyzer;
        self
    }

    pub fn with_augmenter(mut self, augmenter: Arc<dyn KnowledgeAugmenter>) -> Self {
        self.augmenter = Some(augmenter);
        self
    }

    pub fn with_image_retriever(mut self, retriever: Arc<dyn ImageRetriever>) -> Self {
        self.images = Some(retriever);
        self
    }

    /// Solve a request. Always returns a structured result; the only
    /// `Err`-like outcomes are carried on [`SolveResult::error`].
    pub async fn solve(
        &self,
        prompt: &str,
        system_prompt: &str,
        options: &SolveOptions,
    ) -> SolveResult {
        info!(
            "solve start: mode={:?}, prompt={:.60}",
            options.mode, prompt
        );

        let working = self.maybe_augment(prompt, options).await;

        let mut result = match options.mode {
            ExecutionMode::Adaptive => {
                self.solve_adaptive(prompt, &working, system_prompt, options).await
            }
            ExecutionMode::Parallel => {
                self.solve_parallel(prompt, &working, system_prompt).await
            }
        };

        if result.success {
            // Image augmentation scans the original prompt, never the
            // augmented one; failures here degrade to "no image".
            result.image_url = self.maybe_attach_image(prompt, system_prompt).await;
        }

        result
    }

    async fn solve_adaptive(
        &self,
        original: &str,
        working: &str,
        system_prompt: &str,
        options: &SolveOptions,
    ) -> SolveResult {
        let (score, mut regime) = match options.force_regime {
            Some(forced) => {
                info!("regime forced to {}", forced.as_str());
                (None, forced)
            }
            None => {
                let (s, r) = self.analyzer.analyze(working);
                (Some(s), r)
            }
        };

        let mut working = working.to_string();
        let mut attempt = 1u32;

        let mut reasoning = loop {
            let result = self
                .engine
                .execute(&working, system_prompt, score, Some(regime))
                .await;

            if let Some(error) = &result.error {
                // A hard provider error aborts the whole solve.
                return SolveResult::failure(
                    error.clone(),
                    result.regime,
                    result.approach,
                    score,
                );
            }

            let last_attempt = attempt >= self.config.max_attempts;
            if !options.escalation
                || options.force_regime.is_some()
                || last_attempt
                || result.regime == Regime::Low
            {
                break result;
            }

            let verdict = self
                .judge_sufficiency(original, &result.solution, system_prompt)
                .await;
            if verdict.is_sufficient {
                debug!("answer judged sufficient: {}", verdict.reason);
                break result;
            }

            match verdict.recommended {
                // Escalation is monotonic: only ever move upward.
                Some(recommended) if recommended > regime => {
                    info!(
                        "escalating {} -> {} (attempt {}): {}",
                        regime.as_str(),
                        recommended.as_str(),
                        attempt,
                        verdict.reason
                    );
                    working = format!(
                        "{}\n\nA previous attempt was judged insufficient.\n\
                         Previous answer:\n{}\n\nShortcoming: {}\n\
                         Provide a better, more complete answer.",
                        original, result.solution, verdict.reason
                    );
                    regime = recommended;
                    attempt += 1;
                }
                _ => break result,
            }
        };

        if reasoning.regime >= Regime::Medium {
            for _ in 0..self.config.refinement_cycles {
                reasoning.solution = self
                    .refine(original, &reasoning.solution, system_prompt)
                    .await;
            }
        } else {
            debug!("low regime: skipping refinement (overthinking prevention)");
        }

        self.finish(reasoning, score)
    }

    async fn solve_parallel(
        &self,
        original: &str,
        working: &str,
        system_prompt: &str,
    ) -> SolveResult {
        info!("parallel pipeline: one execution per regime");

        let regimes = [Regime::Low, Regime::Medium, Regime::High];
        let units: Vec<_> = regimes
            .iter()
            .map(|regime| {
                self.engine
                    .execute(working, system_prompt, None, Some(*regime))
            })
            .collect();

        let results = self.pipeline.run_all(units).await;

        // Survivors keep their fan-out index for judge labeling.
        let mut survivors: Vec<(usize, ReasoningResult)> = results
            .into_iter()
            .enumerate()
            .filter(|(_, r)| !r.is_err())
            .collect();

        if survivors.is_empty() {
            warn!("all parallel executions failed");
            return SolveResult::failure(
                "all parallel reasoning attempts failed".to_string(),
                Regime::Low,
                "parallel_exhausted",
                None,
            );
        }

        let compared = survivors.len();
        let reasoning = if compared == 1 {
            survivors.remove(0).1
        } else {
            self.judge_select(original, survivors, system_prompt).await
        };

        let mut result = self.finish(reasoning, None);
        result.approach = format!("parallel_best_of_{}", compared);
        result
    }

    /// Ask the judge whether an answer suffices. Provider failures and
    /// unparseable verdicts both default to "sufficient" so the escalation
    /// loop stops safely.
    async fn judge_sufficiency(
        &self,
        original: &str,
        solution: &str,
        system_prompt: &str,
    ) -> EvaluationVerdict {
        let prompt = EVALUATE_TEMPLATE
            .replace("{prompt}", original)
            .replace("{solution}", solution);
        let response = self
            .provider
            .complete(CompletionRequest::new(prompt, system_prompt))
            .await;

        if let Some(error) = response.error {
            warn!("sufficiency judge failed ({}), accepting answer", error);
            return EvaluationVerdict::sufficient("judge unavailable");
        }

        match extract::extract::<SufficiencyJson>(&response.text) {
            Some(parsed) => EvaluationVerdict {
                is_sufficient: parsed.is_sufficient.unwrap_or(true),
                reason: parsed.reason.unwrap_or_default(),
                recommended: parsed
                    .next_recommended_complexity
                    .as_deref()
                    .and_then(Regime::parse),
            },
            None => {
                debug!("unparseable sufficiency verdict, accepting answer");
                EvaluationVerdict::sufficient("unparseable verdict")
            }
        }
    }

    /// Ask the judge to pick among surviving candidates. Malformed or
    /// out-of-range verdicts fall back to the first survivor in fan-out
    /// order (lowest regime).
    async fn judge_select(
        &self,
        original: &str,
        survivors: Vec<(usize, ReasoningResult)>,
        system_prompt: &str,
    ) -> ReasoningResult {
        let candidates = survivors
            .iter()
            .map(|(index, r)| {
                format!(
                    "Candidate {} (regime: {}):\n{}\n",
                    index,
                    r.regime.as_str(),
                    r.solution
                )
            })
            .collect::<Vec<_>>()
            .join("\n");

        let prompt = SELECT_TEMPLATE
            .replace("{prompt}", original)
            .replace("{candidates}", &candidates);
        let response = self
            .provider
            .complete(CompletionRequest::new(prompt, system_prompt))
            .await;

        let verdict = if response.is_err() {
            None
        } else {
            extract::extract::<SelectionJson>(&response.text)
        };

        let chosen_index = verdict.and_then(|v| v.best_choice_index);
        let mut survivors = survivors;

        if let Some(index) = chosen_index {
            if let Some(pos) = survivors.iter().position(|(i, _)| *i as i64 == index) {
                debug!("judge selected candidate {}", index);
                return survivors.swap_remove(pos).1;
            }
            warn!("judge chose out-of-range candidate {}, using first survivor", index);
        } else {
            warn!("unparseable selection verdict, using first survivor");
        }

        survivors.remove(0).1
    }

    /// One limited refinement call. Errors or empty output keep the
    /// original solution; the answer is never replaced by a failure.
    async fn refine(&self, original: &str, solution: &str, system_prompt: &str) -> String {
        let prompt = REFINE_TEMPLATE
            .replace("{prompt}", original)
            .replace("{solution}", solution);
        let response = self
            .provider
            .complete(CompletionRequest::new(prompt, system_prompt))
            .await;

        if response.is_err() || response.text.trim().is_empty() {
            warn!("refinement failed, keeping unrefined solution");
            return solution.to_string();
        }
        response.text
    }

    async fn maybe_augment(&self, prompt: &str, options: &SolveOptions) -> String {
        if !options.augment_knowledge {
            return prompt.to_string();
        }
        let Some(augmenter) = &self.augmenter else {
            return prompt.to_string();
        };
        match augmenter.augment(prompt).await {
            Ok(augmented) => {
                info!(
                    "prompt augmented ({} -> {} chars)",
                    prompt.len(),
                    augmented.len()
                );
                augmented
            }
            Err(e) => {
                warn!("knowledge augmentation failed ({}), keeping original prompt", e);
                prompt.to_string()
            }
        }
    }

    async fn maybe_attach_image(&self, original: &str, system_prompt: &str) -> Option<String> {
        let retriever = self.images.as_ref()?;
        if !image::wants_image(original) {
            return None;
        }

        let prompt = IMAGE_QUERY_TEMPLATE.replace("{prompt}", original);
        let response = self
            .provider
            .complete(CompletionRequest::new(prompt, system_prompt))
            .await;
        if response.is_err() {
            warn!("image query generation failed, skipping image");
            return None;
        }
        let query = response.text.trim().to_string();
        if query.is_empty() {
            return None;
        }

        match retriever.search(&query).await {
            Ok(Some(hit)) => {
                info!("attached image: {}", hit.content_url);
                Some(hit.content_url)
            }
            Ok(None) => None,
            Err(e) => {
                warn!("image search failed ({}), skipping image", e);
                None
            }
        }
    }

    fn finish(&self, reasoning: ReasoningResult, score: Option<f64>) -> SolveResult {
        let metrics = ReasoningMetrics {
            complexity_score: score,
            regime: reasoning.regime,
            solution_words: reasoning.solution.split_whitespace().count(),
            overthinking_prevented: reasoning.overthinking_prevented,
            collapse_prevented: reasoning.collapse_prevented,
            consistency_unverified: None,
        };

        SolveResult {
            success: true,
            final_solution: reasoning.solution,
            error: None,
            regime: reasoning.regime,
            complexity_score: score,
            approach: reasoning.approach.to_string(),
            image_url: None,
            metrics: Some(metrics),
        }
    }
}
