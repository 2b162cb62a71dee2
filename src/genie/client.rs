//! Genie Conversation API client.

use crate::gating::AnswerProvider;
use crate::genie::error::GenieError;
use crate::models::ProviderAnswer;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Configuration for the Genie client.
#[derive(Debug, Clone)]
pub struct GenieClientConfig {
    /// Workspace URL, e.g. `https://adb-123.4.azuredatabricks.net`.
    pub host: String,
    /// Bearer token.
    pub token: String,
    /// Genie space to ask.
    pub space_id: String,
    pub timeout_seconds: u64,
    pub poll_interval_ms: u64,
    pub max_poll_attempts: usize,
    /// Fetch the query result and render it into the answer.
    pub fetch_results: bool,
    /// Rows of the result table to include.
    pub max_result_rows: usize,
}

impl Default for GenieClientConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            token: String::new(),
            space_id: String::new(),
            timeout_seconds: 120,
            poll_interval_ms: 1000,
            max_poll_attempts: 120,
            fetch_results: true,
            max_result_rows: 20,
        }
    }
}

#[derive(Debug, Serialize)]
struct StartConversationRequest<'a> {
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct StartConversationResponse {
    #[serde(default)]
    conversation_id: Option<String>,
    #[serde(default)]
    message_id: Option<String>,
    #[serde(default)]
    message: Option<GenieMessage>,
}

/// A Genie message, as returned by the poll endpoint.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct GenieMessage {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    conversation_id: Option<String>,
    #[serde(default)]
    status: String,
    #[serde(default)]
    attachments: Vec<Attachment>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
struct Attachment {
    #[serde(default)]
    attachment_id: Option<String>,
    #[serde(default)]
    text: Option<TextAttachment>,
    #[serde(default)]
    query: Option<QueryAttachment>,
}

#[derive(Debug, Clone, Deserialize)]
struct TextAttachment {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Clone, Deserialize)]
struct QueryAttachment {
    #[serde(default)]
    query: String,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct QueryResultResponse {
    #[serde(default)]
    statement_response: Option<StatementResponse>,
}

#[derive(Debug, Deserialize)]
struct StatementResponse {
    #[serde(default)]
    manifest: Option<Manifest>,
    #[serde(default)]
    result: Option<ResultData>,
}

#[derive(Debug, Deserialize)]
struct Manifest {
    #[serde(default)]
    schema: Option<Schema>,
}

#[derive(Debug, Deserialize)]
struct Schema {
    #[serde(default)]
    columns: Vec<Column>,
}

#[derive(Debug, Deserialize)]
struct Column {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ResultData {
    #[serde(default)]
    data_array: Vec<Vec<Value>>,
}

/// What a completed message carried.
#[derive(Debug, Default, PartialEq)]
pub(crate) struct ExtractedAnswer {
    text: Option<String>,
    sql: Option<String>,
    query_attachment_id: Option<String>,
}

/// Client for one Genie space.
pub struct GenieClient {
    config: GenieClientConfig,
    http_client: reqwest::Client,
}

impl GenieClient {
    /// Create a client. Fails if host, token or space are missing.
    pub fn new(config: GenieClientConfig) -> Result<Self, GenieError> {
        if config.host.trim().is_empty() {
            return Err(GenieError::NotConfigured("no Databricks host".to_string()));
        }
        if config.token.trim().is_empty() {
            return Err(GenieError::NotConfigured("no Databricks token".to_string()));
        }
        if config.space_id.trim().is_empty() {
            return Err(GenieError::NotConfigured("no Genie space id".to_string()));
        }

        info!("Initializing Genie client for space {}", config.space_id);

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            config,
            http_client,
        })
    }

    fn space_url(&self) -> String {
        format!(
            "{}/api/2.0/genie/spaces/{}",
            self.config.host.trim_end_matches('/'),
            self.config.space_id
        )
    }

    /// Ask a question and wait for the completed answer.
    pub async fn ask(&self, question: &str) -> Result<ProviderAnswer, GenieError> {
        let (conversation_id, message_id) = self.start_conversation(question).await?;
        debug!(
            "Started conversation {} message {}",
            conversation_id, message_id
        );

        let message = self.wait_for_message(&conversation_id, &message_id).await?;
        let extracted = extract_answer(&message);

        let mut text = extracted.text;
        if self.config.fetch_results {
            if let Some(ref attachment_id) = extracted.query_attachment_id {
                match self
                    .fetch_result_table(&conversation_id, &message_id, attachment_id)
                    .await
                {
                    Ok(table) => text = join_parts(text, table),
                    Err(e) => warn!("Could not fetch query result: {}", e),
                }
            }
        }

        Ok(ProviderAnswer {
            text,
            sql: extracted.sql,
        })
    }

    async fn start_conversation(&self, question: &str) -> Result<(String, String), GenieError> {
        let url = format!("{}/start-conversation", self.space_url());
        let response: StartConversationResponse = self
            .send(
                self.http_client
                    .post(&url)
                    .json(&StartConversationRequest { content: question }),
            )
            .await?;

        let message = response.message.as_ref();
        let conversation_id = response
            .conversation_id
            .or_else(|| message.and_then(|m| m.conversation_id.clone()))
            .ok_or(GenieError::MissingId("conversation_id"))?;
        let message_id = response
            .message_id
            .or_else(|| message.and_then(|m| m.id.clone()))
            .ok_or(GenieError::MissingId("message_id"))?;

        Ok((conversation_id, message_id))
    }

    async fn wait_for_message(
        &self,
        conversation_id: &str,
        message_id: &str,
    ) -> Result<GenieMessage, GenieError> {
        let url = format!(
            "{}/conversations/{}/messages/{}",
            self.space_url(),
            conversation_id,
            message_id
        );

        for attempt in 0..self.config.max_poll_attempts {
            let message: GenieMessage = self.send(self.http_client.get(&url)).await?;

            match message.status.as_str() {
                "COMPLETED" => return Ok(message),
                "FAILED" | "CANCELLED" | "QUERY_RESULT_EXPIRED" => {
                    let detail = message
                        .error
                        .as_ref()
                        .map(|e| e.to_string())
                        .unwrap_or_else(|| "no detail".to_string());
                    return Err(GenieError::MessageFailed {
                        status: message.status,
                        detail,
                    });
                }
                status => {
                    debug!("Poll {}: message status {}", attempt + 1, status);
                    tokio::time::sleep(Duration::from_millis(self.config.poll_interval_ms)).await;
                }
            }
        }

        Err(GenieError::PollExhausted(self.config.max_poll_attempts))
    }

    async fn fetch_result_table(
        &self,
        conversation_id: &str,
        message_id: &str,
        attachment_id: &str,
    ) -> Result<Option<String>, GenieError> {
        let url = format!(
            "{}/conversations/{}/messages/{}/attachments/{}/query-result",
            self.space_url(),
            conversation_id,
            message_id,
            attachment_id
        );

        let response: QueryResultResponse = self.send(self.http_client.get(&url)).await?;
        Ok(render_result_table(&response, self.config.max_result_rows))
    }

    /// Send an authenticated request and decode the JSON body.
    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, GenieError> {
        let response = request
            .bearer_auth(&self.config.token)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GenieError::Timeout(self.config.timeout_seconds)
                } else if e.is_connect() {
                    GenieError::Connect(self.config.host.clone())
                } else {
                    GenieError::Http(e)
                }
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(GenieError::Api { status, body });
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| GenieError::Decode(e.to_string()))
    }
}

#[async_trait]
impl AnswerProvider for GenieClient {
    async fn answer(&self, question: &str) -> anyhow::Result<ProviderAnswer> {
        Ok(self.ask(question).await?)
    }

    fn name(&self) -> &str {
        "genie"
    }
}

/// Pull answer text, SQL and the query attachment id out of a message.
pub(crate) fn extract_answer(message: &GenieMessage) -> ExtractedAnswer {
    let mut extracted = ExtractedAnswer::default();

    for attachment in &message.attachments {
        if let Some(ref text) = attachment.text {
            if !text.content.trim().is_empty() {
                extracted.text = join_parts(extracted.text, Some(text.content.clone()));
            }
        }

        if let Some(ref query) = attachment.query {
            if extracted.sql.is_some() {
                continue;
            }
            if !query.query.trim().is_empty() {
                extracted.sql = Some(query.query.clone());
                extracted.query_attachment_id = attachment.attachment_id.clone();
            }
            if let Some(ref description) = query.description {
                extracted.text = join_parts(extracted.text, Some(description.clone()));
            }
        }
    }

    extracted
}

/// Render a statement response as a Markdown table.
pub(crate) fn render_result_table(response: &QueryResultResponse, max_rows: usize) -> Option<String> {
    let statement = response.statement_response.as_ref()?;
    let columns: Vec<&str> = statement
        .manifest
        .as_ref()?
        .schema
        .as_ref()?
        .columns
        .iter()
        .map(|c| c.name.as_str())
        .collect();

    if columns.is_empty() {
        return None;
    }

    let rows = statement
        .result
        .as_ref()
        .map(|r| r.data_array.as_slice())
        .unwrap_or_default();

    let header: Vec<String> = columns.iter().map(|c| escape_cell(c)).collect();

    let mut table = String::new();
    table.push_str(&format!("| {} |\n", header.join(" | ")));
    table.push_str(&format!("|{}\n", "---|".repeat(columns.len())));

    for row in rows.iter().take(max_rows) {
        let cells: Vec<String> = row
            .iter()
            .map(|cell| match cell {
                Value::Null => "NULL".to_string(),
                Value::String(s) => escape_cell(s),
                other => other.to_string(),
            })
            .collect();
        table.push_str(&format!("| {} |\n", cells.join(" | ")));
    }

    if rows.len() > max_rows {
        table.push_str(&format!("\n_Showing {} of {} rows._\n", max_rows, rows.len()));
    }

    Some(table)
}

/// Keep a value on one table row: pipes are escaped, line breaks become spaces.
fn escape_cell(value: &str) -> String {
    value
        .replace("\r\n", " ")
        .replace(['\n', '\r'], " ")
        .replace('|', "\\|")
}

fn join_parts(first: Option<String>, second: Option<String>) -> Option<String> {
    match (first, second) {
        (Some(a), Some(b)) => Some(format!("{}\n\n{}", a, b)),
        (a, b) => a.or(b),
    }
}
