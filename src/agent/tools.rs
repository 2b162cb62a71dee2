//! Tool definitions for the data agent.
//!
//! This module defines the tools the LLM can call: `ask_genie` for
//! text-to-SQL, plus every function published in the registry.

use crate::gating::AnswerProvider;
use crate::models::ProviderAnswer;
use crate::registry::{to_tool_name, FunctionRegistry};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info_span, Instrument};

/// Name of the text-to-SQL tool.
pub const ASK_GENIE: &str = "ask_genie";

/// Tool definition for the chat completions API.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    #[serde(rename = "type")]
    pub tool_type: String,
    pub function: FunctionDefinition,
}

#[derive(Debug, Clone, Serialize)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// A tool call made by the LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type", default = "default_call_type")]
    pub call_type: String,
    pub function: FunctionCall,
}

fn default_call_type() -> String {
    "function".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// JSON-encoded string on most endpoints; some send an object.
    pub arguments: Value,
}

impl FunctionCall {
    /// Arguments as a JSON object.
    pub fn parsed_arguments(&self) -> Value {
        match &self.arguments {
            Value::String(s) => serde_json::from_str(s).unwrap_or(Value::Null),
            other => other.clone(),
        }
    }
}

/// Result of executing a tool.
#[derive(Debug, Clone, Serialize)]
pub struct ToolResult {
    pub success: bool,
    pub output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    pub fn success(output: String) -> Self {
        Self {
            success: true,
            output,
            error: None,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            output: String::new(),
            error: Some(message),
        }
    }

    /// Content to send back to the model.
    pub fn into_content(self) -> String {
        if self.success {
            self.output
        } else {
            format!("Error: {}", self.error.unwrap_or_default())
        }
    }
}

/// Executes tool calls for one question.
pub struct ToolExecutor {
    genie: Arc<dyn AnswerProvider>,
    registry: FunctionRegistry,
    /// Last answer returned by `ask_genie`.
    genie_answer: Option<ProviderAnswer>,
}

impl ToolExecutor {
    pub fn new(genie: Arc<dyn AnswerProvider>, registry: FunctionRegistry) -> Self {
        Self {
            genie,
            registry,
            genie_answer: None,
        }
    }

    /// The last answer `ask_genie` produced, if it was called.
    pub fn genie_answer(&self) -> Option<&ProviderAnswer> {
        self.genie_answer.as_ref()
    }

    /// Execute a tool call and return the result.
    pub async fn execute(&mut self, tool_call: &ToolCall) -> ToolResult {
        let name = &tool_call.function.name;
        let args = tool_call.function.parsed_arguments();

        debug!("Executing tool: {} with args: {:?}", name, args);

        if name == ASK_GENIE {
            return self.ask_genie(&args).await;
        }

        match self.registry.get(name) {
            Some(function) => {
                let Some(arg) = args.get(function.parameter) else {
                    return ToolResult::error(format!(
                        "Missing required parameter: {}",
                        function.parameter
                    ));
                };
                match self.registry.invoke(name, arg) {
                    Ok(value) => ToolResult::success(value.to_string()),
                    Err(e) => ToolResult::error(e.to_string()),
                }
            }
            None => ToolResult::error(format!("Unknown tool: {}", name)),
        }
    }

    async fn ask_genie(&mut self, args: &Value) -> ToolResult {
        let question = match args.get("question").and_then(|v| v.as_str()) {
            Some(q) => q,
            None => return ToolResult::error("Missing required parameter: question".to_string()),
        };

        let span = info_span!("call_genie", provider = self.genie.name());
        match self.genie.answer(question).instrument(span).await {
            Ok(answer) => {
                let output = json!({
                    "result": answer.text,
                    "sql_query": answer.sql,
                });
                self.genie_answer = Some(answer);
                ToolResult::success(output.to_string())
            }
            Err(e) => ToolResult::error(format!("Genie failed: {:#}", e)),
        }
    }
}

/// Get the tool definitions for the chat completions API.
pub fn get_tool_definitions(registry: &FunctionRegistry) -> Vec<ToolDefinition> {
    let mut tools = vec![ToolDefinition {
        tool_type: "function".to_string(),
        function: FunctionDefinition {
            name: ASK_GENIE.to_string(),
            description: "Answer a natural-language question about the data. Returns the answer and the SQL query used.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "question": {
                        "type": "string",
                        "description": "The user's question, in natural language"
                    }
                },
                "required": ["question"]
            }),
        },
    }];

    for (full_name, function) in registry.functions() {
        let json_type = function.parameter_type.as_str();

        tools.push(ToolDefinition {
            tool_type: "function".to_string(),
            function: FunctionDefinition {
                name: to_tool_name(full_name),
                description: function.description.to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        (function.parameter): { "type": json_type }
                    },
                    "required": [function.parameter]
                }),
            },
        });
    }

    tools
}
