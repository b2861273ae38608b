//! Metis CLI - Entry Point
//!
//! Solves a single request from the command line:
//! - Default: adaptive mode (analyze, reason, self-evaluate, escalate)
//! - --mode parallel: best-of-three across all regimes
//! - --mode efficient/balanced/decomposed: force a regime

use std::sync::Arc;

use metis::{
    ClaudeBackend, ComplexityAnalyzer, Config, ExecutionMode, LinguisticModel, OllamaBackend,
    OllamaConfig, Orchestrator, Regime, SerpApiImageSearch, SolveOptions, WikipediaAugmenter,
};
use tracing::{debug, Level};
use tracing_subscriber::FmtSubscriber;

fn print_help() {
    println!("Metis v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Usage: metis [OPTIONS] <prompt>");
    println!();
    println!("Options:");
    println!("  --mode <mode>           adaptive (default), parallel,");
    println!("                          efficient, balanced, decomposed");
    println!("  --backend <name>        claude (default) or ollama");
    println!("  --system-prompt <text>  System prompt for every call");
    println!("  -f, --file <path>       Read the prompt from a file");
    println!("  --wikipedia             Augment the prompt with background");
    println!("  --no-escalation         Disable the self-evaluation loop");
    println!("  --deep-analysis         Enable the linguistic analysis pass");
    println!("  --json                  Print the full result as JSON");
    println!("  -h, --help              Show this help");
    println!();
    println!("Environment variables:");
    println!("  ANTHROPIC_API_KEY       Claude API key");
    println!("  OLLAMA_URL              Ollama server URL");
    println!("  SERPAPI_API_KEY         Enables image retrieval");
    println!("  METIS_FANOUT_LIMIT      Sub-problem concurrency (default 2)");
    println!("  METIS_MAX_ATTEMPTS      Escalation attempt cap (default 2)");
}

struct CliArgs {
    prompt: Option<String>,
    file: Option<String>,
    mode: String,
    backend: String,
    system_prompt: String,
    wikipedia: bool,
    no_escalation: bool,
    deep_analysis: bool,
    json: bool,
    help: bool,
}

fn parse_args(args: &[String]) -> Result<CliArgs, String> {
    let mut parsed = CliArgs {
        prompt: None,
        file: None,
        mode: "adaptive".to_string(),
        backend: "claude".to_string(),
        system_prompt: String::new(),
        wikipedia: false,
        no_escalation: false,
        deep_analysis: false,
        json: false,
        help: false,
    };

    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--mode" => {
                parsed.mode = iter
                    .next()
                    .ok_or("--mode requires a value")?
                    .to_string();
            }
            "--backend" => {
                parsed.backend = iter
                    .next()
                    .ok_or("--backend requires a value")?
                    .to_string();
            }
            "--system-prompt" => {
                parsed.system_prompt = iter
                    .next()
                    .ok_or("--system-prompt requires a value")?
                    .to_string();
            }
            "-f" | "--file" => {
                parsed.file = Some(
                    iter.next().ok_or("--file requires a path")?.to_string(),
                );
            }
            "--wikipedia" => parsed.wikipedia = true,
            "--no-escalation" => parsed.no_escalation = true,
            "--deep-analysis" => parsed.deep_analysis = true,
            "--json" => parsed.json = true,
            "-h" | "--help" => parsed.help = true,
            other if other.starts_with('-') => {
                return Err(format!("unknown option: {}", other));
            }
            other => parsed.prompt = Some(other.to_string()),
        }
    }

    Ok(parsed)
}

/// Map a CLI mode onto execution mode and forced regime.
fn resolve_mode(mode: &str) -> Result<(ExecutionMode, Option<Regime>), String> {
    match mode {
        "adaptive" => Ok((ExecutionMode::Adaptive, None)),
        "parallel" => Ok((ExecutionMode::Parallel, None)),
        "efficient" => Ok((ExecutionMode::Adaptive, Some(Regime::Low))),
        "balanced" => Ok((ExecutionMode::Adaptive, Some(Regime::Medium))),
        "decomposed" => Ok((ExecutionMode::Adaptive, Some(Regime::High))),
        other => Err(format!("unknown mode: {}", other)),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let raw_args: Vec<String> = std::env::args().collect();
    let args = match parse_args(&raw_args) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("error: {}", e);
            print_help();
            std::process::exit(2);
        }
    };

    if args.help {
        print_help();
        return Ok(());
    }

    let log_level = std::env::var("RUST_LOG")
        .map(|s| match s.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        })
        .unwrap_or(Level::WARN);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Prompt from the positional argument or a file.
    let prompt = match (&args.prompt, &args.file) {
        (Some(p), _) => p.clone(),
        (None, Some(path)) => std::fs::read_to_string(path)?,
        (None, None) => {
            print_help();
            std::process::exit(2);
        }
    };

    let config = Config::from_env()?;

    let provider: Arc<dyn metis::CompletionService> = match args.backend.as_str() {
        "claude" => Arc::new(ClaudeBackend::new(
            config.anthropic_api_key.as_deref(),
            &config.default_model,
        )?),
        "ollama" => Arc::new(OllamaBackend::new(OllamaConfig::default())?),
        other => {
            eprintln!("error: unknown backend: {}", other);
            std::process::exit(2);
        }
    };
    debug!(
        "backend {} (pipeline capable: {})",
        provider.name(),
        provider.capabilities().supports_reasoning_pipeline()
    );

    let (mode, force_regime) = match resolve_mode(&args.mode) {
        Ok(resolved) => resolved,
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(2);
        }
    };

    let mut orchestrator = Orchestrator::new(provider, config.core.clone())?
        .with_augmenter(Arc::new(WikipediaAugmenter::new()));
    if args.deep_analysis {
        orchestrator = orchestrator
            .with_analyzer(ComplexityAnalyzer::with_linguistics(LinguisticModel::new()));
    }
    if let Some(key) = &config.serpapi_api_key {
        orchestrator = orchestrator.with_image_retriever(Arc::new(SerpApiImageSearch::new(key)));
    }

    let options = SolveOptions {
        mode,
        force_regime,
        escalation: !args.no_escalation,
        augment_knowledge: args.wikipedia,
    };

    let result = orchestrator
        .solve(&prompt, &args.system_prompt, &options)
        .await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    if result.success {
        println!("{}", result.final_solution);
        eprintln!();
        eprintln!(
            "regime: {} | approach: {}{}",
            result.regime.as_str(),
            result.approach,
            result
                .complexity_score
                .map(|s| format!(" | complexity: {:.1}", s))
                .unwrap_or_default()
        );
        if let Some(url) = &result.image_url {
            eprintln!("image: {}", url);
        }
    } else {
        eprintln!(
            "solve failed: {}",
            result.error.as_deref().unwrap_or("unknown error")
        );
        std::process::exit(1);
    }

    Ok(())
}
