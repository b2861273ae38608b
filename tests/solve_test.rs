//! End-to-end solve scenarios
//!
//! Drives the orchestrator and engine against instrumented fake backends:
//! call counting, in-flight concurrency observation, and marker-routed
//! canned responses.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use metis::{
    BoundedExecutor, ComplexityAnalyzer, CompletionRequest, CompletionResponse,
    CompletionService, CoreConfig, ExecutionMode, ImageResult, ImageRetriever,
    KnowledgeAugmenter, Orchestrator, ProviderCapabilities, ReasoningEngine, Regime,
    SolveOptions,
};

/// Fake backend routing canned responses by markers in the prompt.
/// Records every prompt and tracks peak in-flight concurrency.
struct FakeBackend {
    routes: Vec<(&'static str, CompletionResponse)>,
    calls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    delay: Option<Duration>,
}

impl FakeBackend {
    fn new(routes: Vec<(&'static str, CompletionResponse)>) -> Arc<Self> {
        Arc::new(Self {
            routes,
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
            delay: None,
        })
    }

    fn with_delay(routes: Vec<(&'static str, CompletionResponse)>, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            routes,
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
            delay: Some(delay),
        })
    }

    fn prompts(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn peak(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionService for FakeBackend {
    async fn complete(&self, request: CompletionRequest) -> CompletionResponse {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.calls.lock().unwrap().push(request.prompt.clone());
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        for (marker, response) in &self.routes {
            if request.prompt.contains(marker) {
                return response.clone();
            }
        }
        CompletionResponse::ok("default answer")
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            streaming: false,
            system_prompt: true,
            json_mode: false,
        }
    }

    fn name(&self) -> &str {
        "fake"
    }
}

struct FixedAugmenter;

#[async_trait]
impl KnowledgeAugmenter for FixedAugmenter {
    async fn augment(&self, prompt: &str) -> anyhow::Result<String> {
        Ok(format!("Background: canned facts.\n\nRequest: {}", prompt))
    }
}

struct FailingAugmenter;

#[async_trait]
impl KnowledgeAugmenter for FailingAugmenter {
    async fn augment(&self, _prompt: &str) -> anyhow::Result<String> {
        anyhow::bail!("lookup service down")
    }
}

struct FixedImageRetriever;

#[async_trait]
impl ImageRetriever for FixedImageRetriever {
    async fn search(&self, _query: &str) -> anyhow::Result<Option<ImageResult>> {
        Ok(Some(ImageResult {
            title: "A red panda".to_string(),
            source: "example.org".to_string(),
            content_url: "https://example.org/panda.jpg".to_string(),
            thumbnail_url: "https://example.org/panda_t.jpg".to_string(),
        }))
    }
}

struct FailingImageRetriever;

#[async_trait]
impl ImageRetriever for FailingImageRetriever {
    async fn search(&self, _query: &str) -> anyhow::Result<Option<ImageResult>> {
        anyhow::bail!("search quota exhausted")
    }
}

#[tokio::test]
async fn trivial_prompt_issues_exactly_one_call() {
    // "2+2=?" scores LOW: one completion call, no judge, no refinement.
    let backend = FakeBackend::new(vec![(
        "first reasonable answer",
        CompletionResponse::ok("4"),
    )]);
    let orchestrator =
        Orchestrator::new(backend.clone() as Arc<dyn CompletionService>, CoreConfig::default())
            .unwrap();

    let result = orchestrator
        .solve("2+2=?", "", &SolveOptions::default())
        .await;

    assert!(result.success);
    assert_eq!(result.final_solution, "4");
    assert_eq!(result.regime, Regime::Low);
    assert!(result.complexity_score.unwrap() < 30.0);
    assert_eq!(backend.call_count(), 1);
    assert!(result.metrics.unwrap().overthinking_prevented);
}

#[tokio::test]
async fn fanout_respects_concurrency_limit() {
    // 6 sub-problems through a limit of 2: the fake backend must never see
    // more than 2 calls in flight.
    let subs: Vec<String> = (0..6).map(|i| format!("piece-{}", i)).collect();
    let decomposition = format!(
        r#"{{"sub_problems": [{}]}}"#,
        subs.iter()
            .map(|s| format!("\"{}\"", s))
            .collect::<Vec<_>>()
            .join(", ")
    );

    let mut routes: Vec<(&'static str, CompletionResponse)> = vec![
        ("sub_problems", CompletionResponse::ok(decomposition)),
        ("coherent synthesis", CompletionResponse::ok("combined")),
    ];
    for sub in ["piece-0", "piece-1", "piece-2", "piece-3", "piece-4", "piece-5"] {
        routes.push((sub, CompletionResponse::ok("solved")));
    }

    let backend = FakeBackend::with_delay(routes, Duration::from_millis(20));
    let config = CoreConfig {
        fanout_limit: 2,
        ..Default::default()
    };
    let engine =
        ReasoningEngine::new(backend.clone() as Arc<dyn CompletionService>, &config).unwrap();

    let result = engine
        .execute("big problem", "", Some(85.0), Some(Regime::High))
        .await;

    assert!(result.error.is_none());
    assert_eq!(result.solution, "combined");
    // decompose + 6 solves + integrate
    assert_eq!(backend.call_count(), 8);
    assert!(
        backend.peak() <= 2,
        "observed {} concurrent calls",
        backend.peak()
    );
}

#[tokio::test]
async fn all_failed_sub_solutions_abort_integration() {
    let backend = FakeBackend::new(vec![
        (
            "sub_problems",
            CompletionResponse::ok(r#"{"sub_problems": ["left", "right"]}"#),
        ),
        ("left", CompletionResponse::failed("down")),
        ("right", CompletionResponse::failed("down")),
    ]);
    let orchestrator =
        Orchestrator::new(backend.clone() as Arc<dyn CompletionService>, CoreConfig::default())
            .unwrap();

    let options = SolveOptions {
        force_regime: Some(Regime::High),
        ..Default::default()
    };
    let result = orchestrator.solve("hard one", "", &options).await;

    assert!(!result.success);
    assert!(result.error.unwrap().contains("sub-problems"));
    // decompose + 2 solves; the synthesis call never happens
    assert_eq!(backend.call_count(), 3);
    assert!(backend
        .prompts()
        .iter()
        .all(|p| !p.contains("coherent synthesis")));
}

#[tokio::test]
async fn escalation_stays_within_attempt_cap() {
    // The judge keeps demanding more, but attempts are capped at 2 and
    // regimes only move upward.
    let medium_prompt =
        "You must plan, analyze and calculate each step if conditions change. ".repeat(30);

    let backend = FakeBackend::new(vec![
        ("Reasoning stages", CompletionResponse::ok("attempt answer")),
        (
            "is_sufficient",
            CompletionResponse::ok(
                r#"{"is_sufficient": false, "reason": "more depth", "next_recommended_complexity": "high"}"#,
            ),
        ),
        (
            "sub_problems",
            CompletionResponse::ok(r#"{"sub_problems": ["only part"]}"#),
        ),
        // Synthesis route precedes the sub-problem route: the integration
        // prompt embeds the sub-problem text.
        ("coherent synthesis", CompletionResponse::ok("synthesis")),
        ("only part", CompletionResponse::ok("part solved")),
        ("necessary corrections", CompletionResponse::ok("polished")),
    ]);
    let orchestrator =
        Orchestrator::new(backend.clone() as Arc<dyn CompletionService>, CoreConfig::default())
            .unwrap();

    let result = orchestrator
        .solve(&medium_prompt, "", &SolveOptions::default())
        .await;

    assert!(result.success);
    assert_eq!(result.final_solution, "polished");
    assert_eq!(result.regime, Regime::High);

    // attempt 1 (medium) + judge + attempt 2 (decompose, solve, integrate)
    // + refinement; the cap prevents a second judge call.
    let prompts = backend.prompts();
    assert_eq!(prompts.len(), 6);
    let judge_calls = prompts
        .iter()
        .filter(|p| p.contains("is_sufficient"))
        .count();
    assert_eq!(judge_calls, 1);

    // Observed strategies are non-decreasing: medium first, then high.
    let medium_pos = prompts.iter().position(|p| p.contains("Reasoning stages"));
    let high_pos = prompts.iter().position(|p| p.contains("sub_problems"));
    assert!(medium_pos.unwrap() < high_pos.unwrap());
}

#[tokio::test]
async fn parallel_mode_picks_judged_winner() {
    let backend = FakeBackend::new(vec![
        ("first reasonable answer", CompletionResponse::ok("low answer")),
        ("Reasoning stages", CompletionResponse::ok("medium answer")),
        (
            "sub_problems",
            CompletionResponse::ok(r#"{"sub_problems": ["h1"]}"#),
        ),
        ("coherent synthesis", CompletionResponse::ok("high answer")),
        ("h1", CompletionResponse::ok("h1 solved")),
        (
            "best_choice_index",
            CompletionResponse::ok(r#"{"best_choice_index": 2, "reason": "most thorough"}"#),
        ),
    ]);
    let orchestrator =
        Orchestrator::new(backend.clone() as Arc<dyn CompletionService>, CoreConfig::default())
            .unwrap();

    let options = SolveOptions {
        mode: ExecutionMode::Parallel,
        ..Default::default()
    };
    let result = orchestrator.solve("pick the best", "", &options).await;

    assert!(result.success);
    assert_eq!(result.final_solution, "high answer");
    assert_eq!(result.regime, Regime::High);
    assert_eq!(result.approach, "parallel_best_of_3");
}

#[tokio::test]
async fn parallel_mode_defaults_to_first_survivor_on_bad_verdict() {
    // LOW fails; MEDIUM and HIGH survive. The selection judge sees exactly
    // two labeled candidates, and its malformed verdict falls back to the
    // MEDIUM candidate (first surviving in fan-out order).
    let backend = FakeBackend::new(vec![
        (
            "first reasonable answer",
            CompletionResponse::failed("low backend down"),
        ),
        ("Reasoning stages", CompletionResponse::ok("medium answer")),
        // HIGH decomposition is unstructured, so that branch degrades to the
        // medium strategy and still succeeds.
        ("sub_problems", CompletionResponse::ok("no structure")),
        ("best_choice_index", CompletionResponse::ok("not json")),
    ]);
    let orchestrator =
        Orchestrator::new(backend.clone() as Arc<dyn CompletionService>, CoreConfig::default())
            .unwrap();

    let options = SolveOptions {
        mode: ExecutionMode::Parallel,
        ..Default::default()
    };
    let result = orchestrator.solve("pick the best", "", &options).await;

    assert!(result.success);
    assert_eq!(result.final_solution, "medium answer");
    assert_eq!(result.regime, Regime::Medium);
    assert_eq!(result.approach, "parallel_best_of_2");

    let prompts = backend.prompts();
    let selection = prompts
        .iter()
        .find(|p| p.contains("best_choice_index"))
        .expect("selection judge call");
    assert_eq!(selection.matches("Candidate ").count(), 2);
}

#[tokio::test]
async fn parallel_mode_fails_when_every_regime_fails() {
    let backend = FakeBackend::new(vec![
        ("first reasonable answer", CompletionResponse::failed("down")),
        ("Reasoning stages", CompletionResponse::failed("down")),
        ("sub_problems", CompletionResponse::failed("down")),
    ]);
    let orchestrator =
        Orchestrator::new(backend.clone() as Arc<dyn CompletionService>, CoreConfig::default())
            .unwrap();

    let options = SolveOptions {
        mode: ExecutionMode::Parallel,
        ..Default::default()
    };
    let result = orchestrator.solve("anything", "", &options).await;

    assert!(!result.success);
    assert!(result.error.is_some());
}

#[tokio::test]
async fn knowledge_augmentation_rewrites_prompt() {
    let backend = FakeBackend::new(vec![(
        "first reasonable answer",
        CompletionResponse::ok("ok"),
    )]);
    let orchestrator =
        Orchestrator::new(backend.clone() as Arc<dyn CompletionService>, CoreConfig::default())
            .unwrap()
            .with_augmenter(Arc::new(FixedAugmenter));

    let options = SolveOptions {
        augment_knowledge: true,
        ..Default::default()
    };
    let result = orchestrator.solve("2+2=?", "", &options).await;

    assert!(result.success);
    let prompts = backend.prompts();
    assert!(prompts[0].contains("canned facts"));
}

#[tokio::test]
async fn failed_augmentation_keeps_original_prompt() {
    let backend = FakeBackend::new(vec![(
        "first reasonable answer",
        CompletionResponse::ok("ok"),
    )]);
    let orchestrator =
        Orchestrator::new(backend.clone() as Arc<dyn CompletionService>, CoreConfig::default())
            .unwrap()
            .with_augmenter(Arc::new(FailingAugmenter));

    let options = SolveOptions {
        augment_knowledge: true,
        ..Default::default()
    };
    let result = orchestrator.solve("2+2=?", "", &options).await;

    assert!(result.success);
    let prompts = backend.prompts();
    assert!(prompts[0].contains("2+2=?"));
    assert!(!prompts[0].contains("canned facts"));
}

#[tokio::test]
async fn image_trigger_attaches_url() {
    let backend = FakeBackend::new(vec![
        ("first reasonable answer", CompletionResponse::ok("a panda")),
        ("Search query", CompletionResponse::ok("red panda")),
    ]);
    let orchestrator =
        Orchestrator::new(backend.clone() as Arc<dyn CompletionService>, CoreConfig::default())
            .unwrap()
            .with_image_retriever(Arc::new(FixedImageRetriever));

    let result = orchestrator
        .solve("show me a picture of a red panda", "", &SolveOptions::default())
        .await;

    assert!(result.success);
    assert_eq!(
        result.image_url.as_deref(),
        Some("https://example.org/panda.jpg")
    );
}

#[tokio::test]
async fn image_failure_never_breaks_main_result() {
    let backend = FakeBackend::new(vec![
        ("first reasonable answer", CompletionResponse::ok("a panda")),
        ("Search query", CompletionResponse::ok("red panda")),
    ]);
    let orchestrator =
        Orchestrator::new(backend.clone() as Arc<dyn CompletionService>, CoreConfig::default())
            .unwrap()
            .with_image_retriever(Arc::new(FailingImageRetriever));

    let result = orchestrator
        .solve("show me a picture of a red panda", "", &SolveOptions::default())
        .await;

    assert!(result.success);
    assert_eq!(result.final_solution, "a panda");
    assert!(result.image_url.is_none());
}

#[tokio::test]
async fn no_image_scan_without_trigger_terms() {
    let backend = FakeBackend::new(vec![(
        "first reasonable answer",
        CompletionResponse::ok("4"),
    )]);
    let orchestrator =
        Orchestrator::new(backend.clone() as Arc<dyn CompletionService>, CoreConfig::default())
            .unwrap()
            .with_image_retriever(Arc::new(FixedImageRetriever));

    let result = orchestrator
        .solve("2+2=?", "", &SolveOptions::default())
        .await;

    assert!(result.success);
    assert!(result.image_url.is_none());
    // Only the reasoning call: no image-query call was issued.
    assert_eq!(backend.call_count(), 1);
}

#[test]
fn invalid_core_config_is_fatal_at_construction() {
    let backend = FakeBackend::new(vec![]);
    let bad = CoreConfig {
        fanout_limit: 0,
        ..Default::default()
    };
    assert!(Orchestrator::new(backend as Arc<dyn CompletionService>, bad).is_err());
    assert!(BoundedExecutor::new(0).is_err());
}

#[test]
fn analyzer_boundaries_match_regimes() {
    assert_eq!(Regime::from_score(29.99), Regime::Low);
    assert_eq!(Regime::from_score(30.0), Regime::Medium);
    assert_eq!(Regime::from_score(69.99), Regime::Medium);
    assert_eq!(Regime::from_score(70.0), Regime::High);

    let (score, regime) = ComplexityAnalyzer::new().analyze("2+2=?");
    assert!(score < 30.0);
    assert_eq!(regime, Regime::Low);
}
