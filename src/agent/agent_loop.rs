//! Agent loop for LLM-directed tool calls.
//!
//! The model gets the user's question and the tools; it is expected to ask
//! Genie, score the SQL, review the score and then answer. Whatever it
//! decides, the SQL it relied on is captured so the caller can gate it.

use crate::agent::tools::{get_tool_definitions, ToolCall, ToolExecutor};
use crate::gating::AnswerProvider;
use crate::models::ProviderAnswer;
use crate::registry::FunctionRegistry;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Configuration for the agent.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Full URL of the chat completions endpoint.
    pub endpoint_url: String,
    pub token: String,
    pub temperature: f32,
    pub max_tokens: Option<usize>,
    pub max_iterations: usize,
    pub timeout_seconds: u64,
    /// Max tool results to keep in context (sliding window)
    pub max_context_messages: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            endpoint_url: String::new(),
            token: String::new(),
            temperature: 0.1,
            max_tokens: None,
            max_iterations: 10,
            timeout_seconds: 120,
            max_context_messages: 10,
        }
    }
}

/// Message in the chat history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmMessage {
    pub role: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl LlmMessage {
    fn new(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    fn tool(tool_call_id: &str, content: String) -> Self {
        Self {
            role: "tool".to_string(),
            content: Some(content),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.to_string()),
        }
    }
}

/// Chat completions request.
#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    messages: Vec<LlmMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Value>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
}

/// Chat completions response.
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: LlmMessage,
}

/// LLM-directed agent over Genie and the registry tools.
pub struct ToolCallingAgent {
    config: AgentConfig,
    http_client: reqwest::Client,
    genie: Arc<dyn AnswerProvider>,
    registry: FunctionRegistry,
    tools: Vec<Value>,
}

impl ToolCallingAgent {
    /// Create a new agent.
    pub fn new(
        config: AgentConfig,
        genie: Arc<dyn AnswerProvider>,
        registry: FunctionRegistry,
    ) -> Result<Self> {
        info!("Initializing agent against {}", config.endpoint_url);

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        let tools = get_tool_definitions(&registry)
            .iter()
            .map(serde_json::to_value)
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("Failed to serialize tool definitions")?;

        Ok(Self {
            config,
            http_client,
            genie,
            registry,
            tools,
        })
    }

    /// Run the tool-calling loop for one question.
    async fn run(&self, question: &str) -> Result<ProviderAnswer> {
        let mut executor = ToolExecutor::new(self.genie.clone(), self.registry.clone());
        let mut messages = vec![
            LlmMessage::new("system", AGENT_SYSTEM_PROMPT),
            LlmMessage::new("user", question),
        ];
        let mut final_text = None;

        for iteration in 0..self.config.max_iterations {
            debug!("Agent iteration {}", iteration + 1);

            let response = self.chat(&messages).await?;
            messages.push(response.clone());

            let tool_calls = response.tool_calls.unwrap_or_default();
            if tool_calls.is_empty() {
                info!("Agent finished after {} iterations", iteration + 1);
                final_text = response.content;
                break;
            }

            for tool_call in &tool_calls {
                let result = executor.execute(tool_call).await;
                info!("Tool {} executed", tool_call.function.name);
                messages.push(LlmMessage::tool(&tool_call.id, result.into_content()));
            }

            prune_old_messages(&mut messages, self.config.max_context_messages);
        }

        let genie_answer = match executor.genie_answer() {
            Some(answer) => answer.clone(),
            None => {
                warn!("Agent never called Genie; asking directly");
                self.genie.answer(question).await?
            }
        };

        if final_text.is_none() {
            warn!(
                "Agent did not finish within {} iterations",
                self.config.max_iterations
            );
        }

        Ok(ProviderAnswer {
            text: final_text
                .filter(|t| !t.trim().is_empty())
                .or(genie_answer.text),
            sql: genie_answer.sql,
        })
    }

    /// Send a chat request with tools.
    async fn chat(&self, messages: &[LlmMessage]) -> Result<LlmMessage> {
        let request = ChatCompletionRequest {
            messages: messages.to_vec(),
            tools: self.tools.clone(),
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        debug!("Sending chat request with {} messages", messages.len());

        let response = self
            .http_client
            .post(&self.config.endpoint_url)
            .bearer_auth(&self.config.token)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    anyhow::anyhow!(
                        "Request timed out after {}s",
                        self.config.timeout_seconds
                    )
                } else if e.is_connect() {
                    anyhow::anyhow!(
                        "Cannot connect to serving endpoint at {}",
                        self.config.endpoint_url
                    )
                } else {
                    anyhow::anyhow!("Failed to send request: {}", e)
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("Serving endpoint error {}: {}", status, body));
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .context("Failed to parse chat completion response")?;

        completion
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .context("Chat completion returned no choices")
    }
}

#[async_trait]
impl AnswerProvider for ToolCallingAgent {
    async fn answer(&self, question: &str) -> Result<ProviderAnswer> {
        self.run(question).await
    }

    fn name(&self) -> &str {
        "agent"
    }
}

/// Prune old tool rounds to keep context small (sliding window).
///
/// Keeps the system prompt and the question. Tool results are never left
/// without the assistant message that requested them.
fn prune_old_messages(messages: &mut Vec<LlmMessage>, max_context_messages: usize) {
    let keep_start = 2;
    let max_keep = max_context_messages + keep_start;

    if messages.len() <= max_keep {
        return;
    }

    let mut remove_count = messages.len() - max_keep;
    while keep_start + remove_count < messages.len()
        && messages[keep_start + remove_count].role == "tool"
    {
        remove_count += 1;
    }

    if keep_start + remove_count < messages.len() {
        messages.drain(keep_start..keep_start + remove_count);
        debug!("Pruned {} old messages to save context", remove_count);
    }
}

/// System prompt for tool-calling mode
const AGENT_SYSTEM_PROMPT: &str = r#"You are a data assistant. You answer questions about data using tools.

## Your Process

1. Call `ask_genie` with the user's question to get an answer and the SQL query behind it.
2. Call the `score_sql_query` tool with that SQL query.
3. Call the `review_complexity_score` tool with the score.
4. If the decision is "approved", answer the user using the Genie result.
   If the decision is "too_complex", tell the user the query needs review.

Never invent data. Only use what the tools return.
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gating::pipeline::tests::StaticProvider;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_agent_config_default() {
        let config = AgentConfig::default();
        assert_eq!(config.max_iterations, 10);
        assert_eq!(config.max_context_messages, 10);
    }

    fn tool_round(id: &str) -> Vec<LlmMessage> {
        let call: ToolCall = serde_json::from_value(serde_json::json!({
            "id": id,
            "type": "function",
            "function": {"name": "ask_genie", "arguments": "{}"}
        }))
        .unwrap();
        vec![
            LlmMessage {
                role: "assistant".to_string(),
                content: None,
                tool_calls: Some(vec![call.clone(), call]),
                tool_call_id: None,
            },
            LlmMessage::tool(id, "a".to_string()),
            LlmMessage::tool(id, "b".to_string()),
        ]
    }

    #[test]
    fn test_prune_keeps_prompt_and_whole_rounds() {
        let mut messages = vec![
            LlmMessage::new("system", "s"),
            LlmMessage::new("user", "q"),
        ];
        for i in 0..4 {
            messages.extend(tool_round(&format!("call_{}", i)));
        }

        prune_old_messages(&mut messages, 4);

        assert_eq!(messages[0].role, "system");
        assert_eq!(messages[1].role, "user");
        assert_eq!(messages[2].role, "assistant");
        assert!(messages.len() <= 2 + 4);
        assert_eq!(messages.last().unwrap().role, "tool");
    }

    #[test]
    fn test_prune_noop_when_small() {
        let mut messages = vec![
            LlmMessage::new("system", "s"),
            LlmMessage::new("user", "q"),
        ];
        messages.extend(tool_round("call_0"));
        prune_old_messages(&mut messages, 10);
        assert_eq!(messages.len(), 5);
    }

    #[test]
    fn test_parse_completion_with_tool_calls() {
        let completion: ChatCompletionResponse = serde_json::from_str(
            r#"{"choices": [{"index": 0, "finish_reason": "tool_calls", "message": {
                "role": "assistant",
                "content": null,
                "tool_calls": [{"id": "call_9", "type": "function",
                    "function": {"name": "main__agent__score_sql_query",
                                 "arguments": "{\"sql_query\": \"SELECT 1\"}"}}]
            }}]}"#,
        )
        .unwrap();

        let message = &completion.choices[0].message;
        let calls = message.tool_calls.as_ref().unwrap();
        assert_eq!(calls[0].id, "call_9");
        assert_eq!(
            calls[0].function.parsed_arguments()["sql_query"],
            "SELECT 1"
        );
    }

    #[test]
    fn test_tool_message_serialization() {
        let json = serde_json::to_value(LlmMessage::tool("call_1", "5.0".to_string())).unwrap();
        assert_eq!(json["role"], "tool");
        assert_eq!(json["tool_call_id"], "call_1");
        assert!(json.get("tool_calls").is_none());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_an_error() {
        let agent = ToolCallingAgent::new(
            AgentConfig {
                endpoint_url: "http://127.0.0.1:9/serving-endpoints/x/invocations".to_string(),
                timeout_seconds: 2,
                ..Default::default()
            },
            Arc::new(StaticProvider::new("a", "SELECT 1")),
            FunctionRegistry::with_gating_tools("main", "agent"),
        )
        .unwrap();

        assert!(agent.answer("q").await.is_err());
    }

    const ENDPOINT: &str = "/serving-endpoints/chat/invocations";

    fn completion(message: Value) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"index": 0, "message": message}]
        }))
    }

    fn tool_call_message(name: &str, arguments: Value) -> Value {
        json!({
            "role": "assistant",
            "content": null,
            "tool_calls": [{
                "id": "call_1",
                "type": "function",
                "function": {"name": name, "arguments": arguments.to_string()}
            }]
        })
    }

    fn mock_agent(
        server: &MockServer,
        max_iterations: usize,
        genie: StaticProvider,
    ) -> ToolCallingAgent {
        ToolCallingAgent::new(
            AgentConfig {
                endpoint_url: format!("{}{}", server.uri(), ENDPOINT),
                token: "dapi-test".to_string(),
                max_iterations,
                timeout_seconds: 5,
                ..Default::default()
            },
            Arc::new(genie),
            FunctionRegistry::with_gating_tools("main", "agent"),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_tool_round_trip_captures_genie_sql() {
        let server = MockServer::start().await;
        // Once a tool result is in the history, the model answers.
        Mock::given(method("POST"))
            .and(path(ENDPOINT))
            .and(body_string_contains("\"tool_call_id\":\"call_1\""))
            .respond_with(completion(json!({"role": "assistant", "content": "final words"})))
            .with_priority(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(ENDPOINT))
            .respond_with(completion(tool_call_message(
                "ask_genie",
                json!({"question": "Orders per customer?"}),
            )))
            .expect(1)
            .mount(&server)
            .await;

        let agent = mock_agent(
            &server,
            5,
            StaticProvider::new("Genie says hi", "SELECT * FROM a JOIN b"),
        );
        let answer = agent.answer("Orders per customer?").await.unwrap();

        assert_eq!(answer.text.as_deref(), Some("final words"));
        assert_eq!(answer.sql.as_deref(), Some("SELECT * FROM a JOIN b"));
    }

    #[tokio::test]
    async fn test_answer_without_tools_asks_genie_directly() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(ENDPOINT))
            .respond_with(completion(json!({"role": "assistant", "content": "From memory."})))
            .expect(1)
            .mount(&server)
            .await;

        let agent = mock_agent(&server, 5, StaticProvider::new("Genie text", "SELECT 1"));
        let answer = agent.answer("How many orders?").await.unwrap();

        assert_eq!(answer.text.as_deref(), Some("From memory."));
        assert_eq!(answer.sql.as_deref(), Some("SELECT 1"));
    }

    #[tokio::test]
    async fn test_iteration_cap_falls_back_to_genie_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(ENDPOINT))
            .respond_with(completion(tool_call_message(
                "main__agent__score_sql_query",
                json!({"sql_query": "SELECT 1"}),
            )))
            .expect(2)
            .mount(&server)
            .await;

        let agent = mock_agent(&server, 2, StaticProvider::new("Genie text", "SELECT 1"));
        let answer = agent.answer("q").await.unwrap();

        assert_eq!(answer.text.as_deref(), Some("Genie text"));
        assert_eq!(answer.sql.as_deref(), Some("SELECT 1"));
    }

    #[tokio::test]
    async fn test_endpoint_error_status_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(ENDPOINT))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let agent = mock_agent(&server, 3, StaticProvider::new("a", "SELECT 1"));
        let err = agent.answer("q").await.unwrap_err();
        assert!(err.to_string().contains("rate limited"));
    }
}
