//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.genie-agent.toml` files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default configuration file name.
pub const CONFIG_FILE: &str = ".genie-agent.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Genie space settings.
    #[serde(default)]
    pub genie: GenieConfig,

    /// Chat model settings for agent mode.
    #[serde(default)]
    pub llm: LlmConfig,

    /// Function registry settings.
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Response settings.
    #[serde(default)]
    pub response: ResponseConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Number of questions answered concurrently in batch mode.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// JSON-lines file that flagged queries are appended to.
    #[serde(default)]
    pub review_log: Option<String>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            review_log: None,
        }
    }
}

fn default_concurrency() -> usize {
    4
}

/// Genie space settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenieConfig {
    /// Databricks workspace URL.
    #[serde(default)]
    pub host: String,

    /// Genie space id.
    #[serde(default)]
    pub space_id: String,

    /// Request timeout in seconds.
    #[serde(default = "default_genie_timeout")]
    pub timeout_seconds: u64,

    /// Delay between status polls.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Polls before giving up on a message.
    #[serde(default = "default_max_polls")]
    pub max_poll_attempts: usize,

    /// Fetch query results and include them in the answer.
    #[serde(default = "default_true")]
    pub fetch_results: bool,

    /// Rows of the result table to include.
    #[serde(default = "default_max_result_rows")]
    pub max_result_rows: usize,
}

impl Default for GenieConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            space_id: String::new(),
            timeout_seconds: default_genie_timeout(),
            poll_interval_ms: default_poll_interval(),
            max_poll_attempts: default_max_polls(),
            fetch_results: true,
            max_result_rows: default_max_result_rows(),
        }
    }
}

fn default_genie_timeout() -> u64 {
    120
}

fn default_poll_interval() -> u64 {
    1000
}

fn default_max_polls() -> usize {
    120 // ~2 min at the default interval
}

fn default_max_result_rows() -> usize {
    20
}

/// Chat model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Serving endpoint name, or a full URL.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Temperature for generation.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens in response.
    #[serde(default)]
    pub max_tokens: Option<usize>,

    /// Request timeout in seconds.
    #[serde(default = "default_llm_timeout")]
    pub timeout_seconds: u64,

    /// Maximum model turns per question.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Tool messages kept in context.
    #[serde(default = "default_max_context_messages")]
    pub max_context_messages: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            temperature: default_temperature(),
            max_tokens: None,
            timeout_seconds: default_llm_timeout(),
            max_iterations: default_max_iterations(),
            max_context_messages: default_max_context_messages(),
        }
    }
}

impl LlmConfig {
    /// Chat completions URL for this endpoint on the given workspace.
    pub fn endpoint_url(&self, host: &str) -> String {
        if self.endpoint.starts_with("http://") || self.endpoint.starts_with("https://") {
            self.endpoint.clone()
        } else {
            format!(
                "{}/serving-endpoints/{}/invocations",
                host.trim_end_matches('/'),
                self.endpoint
            )
        }
    }
}

fn default_endpoint() -> String {
    "databricks-dbrx-instruct".to_string()
}

fn default_temperature() -> f32 {
    0.1
}

fn default_llm_timeout() -> u64 {
    120
}

fn default_max_iterations() -> usize {
    10
}

fn default_max_context_messages() -> usize {
    10
}

/// Function registry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    #[serde(default = "default_catalog")]
    pub catalog: String,

    #[serde(default = "default_schema")]
    pub schema: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            catalog: default_catalog(),
            schema: default_schema(),
        }
    }
}

fn default_catalog() -> String {
    "main".to_string()
}

fn default_schema() -> String {
    "agent".to_string()
}

/// Response rendering settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseConfig {
    /// Show the flagged SQL in the too-complex notice.
    #[serde(default = "default_true")]
    pub show_flagged_sql: bool,
}

impl Default for ResponseConfig {
    fn default() -> Self {
        Self {
            show_flagged_sql: true,
        }
    }
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// This method only overrides config when CLI provides explicit values.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref host) = args.host {
            self.genie.host = host.clone();
        }
        if let Some(ref space_id) = args.space_id {
            self.genie.space_id = space_id.clone();
        }
        if let Some(ref endpoint) = args.llm_endpoint {
            self.llm.endpoint = endpoint.clone();
        }
        if let Some(temperature) = args.temperature {
            self.llm.temperature = temperature;
        }

        // Timeout applies to both Genie and the chat model
        if let Some(timeout) = args.timeout {
            self.genie.timeout_seconds = timeout;
            self.llm.timeout_seconds = timeout;
        }

        if let Some(ref review_log) = args.review_log {
            self.general.review_log = Some(review_log.display().to_string());
        }
        if let Some(concurrency) = args.concurrency {
            self.general.concurrency = concurrency;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.llm.endpoint, "databricks-dbrx-instruct");
        assert_eq!(config.registry.catalog, "main");
        assert_eq!(config.general.concurrency, 4);
        assert!(config.response.show_flagged_sql);
        assert!(config.genie.fetch_results);
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
verbose = true
review_log = "flagged.jsonl"

[genie]
host = "https://adb-1.2.azuredatabricks.net"
space_id = "01f0722c73c61f12b1ab8023936c9fda"
fetch_results = false

[registry]
catalog = "sabrina"
schema = "agent"

[response]
show_flagged_sql = false
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.general.review_log.as_deref(), Some("flagged.jsonl"));
        assert_eq!(config.genie.space_id, "01f0722c73c61f12b1ab8023936c9fda");
        assert!(!config.genie.fetch_results);
        assert_eq!(config.genie.max_poll_attempts, 120);
        assert_eq!(config.registry.catalog, "sabrina");
        assert!(!config.response.show_flagged_sql);
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "[llm]\nendpoint = \"my-endpoint\"\nmax_iterations = 3\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.llm.endpoint, "my-endpoint");
        assert_eq!(config.llm.max_iterations, 3);

        std::fs::write(&path, "[llm\n").unwrap();
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn test_endpoint_url() {
        let mut llm = LlmConfig::default();
        assert_eq!(
            llm.endpoint_url("https://host.example/"),
            "https://host.example/serving-endpoints/databricks-dbrx-instruct/invocations"
        );

        llm.endpoint = "http://localhost:8080/v1/chat/completions".to_string();
        assert_eq!(
            llm.endpoint_url("https://host.example"),
            "http://localhost:8080/v1/chat/completions"
        );
    }

    #[test]
    fn test_merge_with_args() {
        let args = crate::cli::Args::parse_from([
            "genie-agent",
            "--host",
            "https://cli.example",
            "--timeout",
            "30",
            "How many orders?",
        ]);

        let mut config = Config::default();
        config.genie.space_id = "from-file".to_string();
        config.merge_with_args(&args);

        assert_eq!(config.genie.host, "https://cli.example");
        assert_eq!(config.genie.space_id, "from-file");
        assert_eq!(config.genie.timeout_seconds, 30);
        assert_eq!(config.llm.timeout_seconds, 30);
        assert_eq!(config.general.concurrency, 4);
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(!toml_str.is_empty());
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[genie]"));
        assert!(toml_str.contains("[llm]"));
        assert!(toml_str.contains("[registry]"));
        assert!(!toml_str.contains("verbose"));
    }
}
