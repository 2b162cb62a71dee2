//! Genie Agent - complexity-gated answers to data questions
//!
//! A CLI that sends natural-language questions to a Databricks Genie
//! space, scores the generated SQL and flags overly complex queries for
//! review instead of showing them directly.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (configuration, input file, unreachable service, etc.)
//!   2 - A query was flagged for review and --fail-on-flagged is set

mod agent;
mod cli;
mod config;
mod gating;
mod genie;
mod models;
mod registry;
mod report;
mod serving;

use anyhow::{Context, Result};
use chrono::Utc;
use cli::{Args, OutputFormat};
use config::{Config, CONFIG_FILE};
use futures::stream::{self, StreamExt};
use gating::{AnswerProvider, FormatOptions, GatingPipeline, PipelineMode};
use indicatif::{ProgressBar, ProgressStyle};
use models::{BatchReport, ChatRequest, GatingResult};
use registry::FunctionRegistry;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Initialize logging
    init_logging(&args);

    info!("Genie Agent v{}", env!("CARGO_PKG_VERSION"));
    debug!("Mode: {}, format: {:?}", args.mode, args.format);

    match run(args).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Run failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .genie-agent.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE);

    if path.exists() {
        eprintln!("⚠️  {} already exists. Remove it first or edit it manually.", CONFIG_FILE);
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE);
    println!("   Set genie.host and genie.space_id, or pass --host and --space-id.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
///
/// Logs go to stderr so answers on stdout stay clean. `RUST_LOG` wins
/// over the verbosity flags when set.
fn init_logging(args: &Args) {
    let level = args.log_level();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(LevelFilter::from_level(level).into()));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Run the requested action. Returns the exit code (0 or 2).
async fn run(args: Args) -> Result<i32> {
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    let registry = FunctionRegistry::with_gating_tools(&config.registry.catalog, &config.registry.schema);

    if args.list_tools {
        let manifest = serde_json::to_string_pretty(&registry.manifest())?;
        write_output(&args, &manifest)?;
        return Ok(0);
    }

    if let Some(ref sql) = args.score_sql {
        return handle_score_sql(&args, &registry, sql);
    }

    let pipeline = Arc::new(build_pipeline(&args, &config, registry)?);

    let results = if let Some(ref path) = args.messages {
        answer_chat_request(&args, pipeline, path).await?
    } else if let Some(ref path) = args.questions {
        answer_batch(&args, pipeline, path, config.general.concurrency).await?
    } else {
        let question = args.question.as_deref().unwrap_or_default();
        let result = pipeline.run(question).await;

        let output = match args.format {
            OutputFormat::Json => serde_json::to_string_pretty(&result)?,
            OutputFormat::Markdown => result.message.clone(),
        };
        write_output(&args, &output)?;
        vec![result]
    };

    let flagged = results.iter().filter(|r| r.is_flagged()).count();
    if flagged > 0 {
        if let Some(ref log) = config.general.review_log {
            info!("{} flagged queries logged to {}", flagged, log);
        }
        if args.fail_on_flagged {
            eprintln!(
                "\n⛔ {} quer{} flagged for review. Failing (exit code 2).",
                flagged,
                if flagged == 1 { "y was" } else { "ies were" }
            );
            return Ok(2);
        }
    }

    Ok(0)
}

/// Handle --score-sql: score through the registry and print the decision.
fn handle_score_sql(args: &Args, registry: &FunctionRegistry, sql: &str) -> Result<i32> {
    let score = registry.invoke(&registry.full_name("score_sql_query"), &json!(sql))?;
    let decision = registry.invoke(&registry.full_name("review_complexity_score"), &score)?;

    let output = match args.format {
        OutputFormat::Json => serde_json::to_string_pretty(&json!({
            "sql_query": sql,
            "score": score,
            "decision": decision,
        }))?,
        OutputFormat::Markdown => format!(
            "Score: {}\nDecision: {}",
            score,
            decision.as_str().unwrap_or_default()
        ),
    };
    write_output(args, &output)?;

    let flagged = decision.as_str() == Some(models::Decision::TooComplex.as_str());
    Ok(if flagged && args.fail_on_flagged { 2 } else { 0 })
}

/// Build the provider for the selected mode and wrap it in the pipeline.
fn build_pipeline(args: &Args, config: &Config, registry: FunctionRegistry) -> Result<GatingPipeline> {
    let token = args.token.clone().unwrap_or_default();

    let genie_config = genie::GenieClientConfig {
        host: config.genie.host.clone(),
        token: token.clone(),
        space_id: config.genie.space_id.clone(),
        timeout_seconds: config.genie.timeout_seconds,
        poll_interval_ms: config.genie.poll_interval_ms,
        max_poll_attempts: config.genie.max_poll_attempts,
        fetch_results: config.genie.fetch_results,
        max_result_rows: config.genie.max_result_rows,
    };
    let genie: Arc<dyn AnswerProvider> =
        Arc::new(genie::GenieClient::new(genie_config).context("Failed to set up Genie client")?);

    let provider: Arc<dyn AnswerProvider> = match args.mode {
        PipelineMode::Direct | PipelineMode::Gated => genie,
        PipelineMode::Agent => {
            let agent_config = agent::AgentConfig {
                endpoint_url: config.llm.endpoint_url(&config.genie.host),
                token,
                temperature: config.llm.temperature,
                max_tokens: config.llm.max_tokens,
                max_iterations: config.llm.max_iterations,
                timeout_seconds: config.llm.timeout_seconds,
                max_context_messages: config.llm.max_context_messages,
            };
            Arc::new(agent::ToolCallingAgent::new(agent_config, genie, registry)?)
        }
    };

    info!("Mode: {} (provider: {})", args.mode, provider.name());

    let mut pipeline = GatingPipeline::new(provider, args.mode)
        .with_format_options(FormatOptions::from(&config.response));
    if let Some(ref path) = config.general.review_log {
        pipeline = pipeline.with_review_log(report::ReviewLog::new(PathBuf::from(path)));
    }

    Ok(pipeline)
}

/// Handle --messages: answer a chat request file.
async fn answer_chat_request(
    args: &Args,
    pipeline: Arc<GatingPipeline>,
    path: &Path,
) -> Result<Vec<GatingResult>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read chat request: {}", path.display()))?;
    let request: ChatRequest = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse chat request: {}", path.display()))?;

    let chat_agent = serving::ChatAgent::new(pipeline);
    let (response, result) = chat_agent.predict(&request).await?;

    let output = match args.format {
        OutputFormat::Json => serde_json::to_string_pretty(&response)?,
        OutputFormat::Markdown => result.message.clone(),
    };
    write_output(args, &output)?;

    Ok(vec![result])
}

/// Handle --questions: answer every line concurrently, keeping input order.
async fn answer_batch(
    args: &Args,
    pipeline: Arc<GatingPipeline>,
    path: &Path,
    concurrency: usize,
) -> Result<Vec<GatingResult>> {
    let start_time = Instant::now();

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read questions: {}", path.display()))?;
    let questions = parse_questions(&content);

    if questions.is_empty() {
        warn!("No questions found in {}", path.display());
    }
    info!(
        "Answering {} questions with concurrency {}",
        questions.len(),
        concurrency
    );

    let progress = if args.quiet {
        ProgressBar::hidden()
    } else {
        let bar = ProgressBar::new(questions.len() as u64);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} questions ({elapsed})")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        bar
    };

    let results: Vec<GatingResult> = stream::iter(questions)
        .map(|question| {
            let pipeline = pipeline.clone();
            let progress = progress.clone();
            async move {
                let result = pipeline.run(&question).await;
                progress.inc(1);
                result
            }
        })
        .buffered(concurrency.max(1))
        .collect()
        .await;

    progress.finish_and_clear();

    let report = BatchReport {
        generated_at: Utc::now(),
        mode: args.mode.to_string(),
        flagged: results.iter().filter(|r| r.is_flagged()).count(),
        duration_seconds: start_time.elapsed().as_secs_f64(),
        results,
    };

    let output = match args.format {
        OutputFormat::Json => report::generate_json_report(&report)?,
        OutputFormat::Markdown => report::generate_markdown_report(&report),
    };
    write_output(args, &output)?;

    Ok(report.results)
}

/// One question per line; blank lines and `#` comments are skipped.
fn parse_questions(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(String::from)
        .collect()
}

/// Write output to --output or stdout.
fn write_output(args: &Args, output: &str) -> Result<()> {
    match args.output {
        Some(ref path) => {
            std::fs::write(path, output)
                .with_context(|| format!("Failed to write output to {}", path.display()))?;
            if !args.quiet {
                eprintln!("✅ Output saved to: {}", path.display());
            }
        }
        None => println!("{}", output),
    }
    Ok(())
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
