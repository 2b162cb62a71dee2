//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::gating::PipelineMode;
use clap::Parser;
use std::path::PathBuf;

/// Genie Agent - answer data questions with complexity-gated SQL
///
/// Sends questions to a Genie space, scores the generated SQL and flags
/// overly complex queries for review instead of showing them directly.
///
/// Examples:
///   genie-agent "What are the top 5 products by sales?"
///   genie-agent --mode agent "Revenue by region last quarter?"
///   genie-agent --messages request.json --format json
///   genie-agent --questions questions.txt --output answers.md
///   genie-agent --score-sql "SELECT * FROM a JOIN b"
///   genie-agent --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Question to answer
    #[arg(
        value_name = "QUESTION",
        required_unless_present_any = ["messages", "questions", "score_sql", "list_tools", "init_config"],
        conflicts_with_all = ["messages", "questions"]
    )]
    pub question: Option<String>,

    /// Chat request JSON file: {"messages": [{"role": "user", "content": "..."}]}
    ///
    /// The last user message is answered.
    #[arg(long, value_name = "FILE", conflicts_with = "questions")]
    pub messages: Option<PathBuf>,

    /// File with one question per line, answered concurrently
    #[arg(long, value_name = "FILE")]
    pub questions: Option<PathBuf>,

    /// How answers are produced
    #[arg(long, default_value = "gated", value_name = "MODE")]
    pub mode: PipelineMode,

    /// Genie space id
    #[arg(long, value_name = "ID", env = "GENIE_SPACE_ID")]
    pub space_id: Option<String>,

    /// Databricks workspace URL
    #[arg(long, value_name = "URL", env = "DATABRICKS_HOST")]
    pub host: Option<String>,

    /// Databricks personal access token
    #[arg(long, value_name = "TOKEN", env = "DATABRICKS_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Serving endpoint name (or full URL) of the chat model for --mode agent
    #[arg(long, value_name = "ENDPOINT", env = "GENIE_LLM_ENDPOINT")]
    pub llm_endpoint: Option<String>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Temperature for the chat model (0.0 - 1.0)
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Output format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Write the output to a file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .genie-agent.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Number of concurrent questions in batch mode
    #[arg(long, value_name = "NUM")]
    pub concurrency: Option<usize>,

    /// Append flagged queries to this JSON-lines file
    #[arg(long, value_name = "FILE")]
    pub review_log: Option<PathBuf>,

    /// Exit with code 2 if any query was flagged for review
    #[arg(long)]
    pub fail_on_flagged: bool,

    /// Score a SQL query and print the review decision (no service calls)
    #[arg(long, value_name = "SQL")]
    pub score_sql: Option<String>,

    /// Print the registered functions as JSON
    #[arg(long)]
    pub list_tools: bool,

    /// Generate a default .genie-agent.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(ref host) = self.host {
            if !host.starts_with("http://") && !host.starts_with("https://") {
                return Err("Host must start with 'http://' or 'https://'".to_string());
            }
        }

        if let Some(ref question) = self.question {
            if question.trim().is_empty() {
                return Err("Question must not be empty".to_string());
            }
        }

        // Validate temperature range
        if let Some(temperature) = self.temperature {
            if !(0.0..=1.0).contains(&temperature) {
                return Err("Temperature must be between 0.0 and 1.0".to_string());
            }
        }

        if self.concurrency == Some(0) {
            return Err("Concurrency must be at least 1".to_string());
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if self.timeout == Some(0) {
            return Err("Timeout must be at least 1 second".to_string());
        }

        for path in [&self.messages, &self.questions].into_iter().flatten() {
            if !path.is_file() {
                return Err(format!("Input file does not exist: {}", path.display()));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
