//! Data models for the data agent.
//!
//! This module contains the core data structures shared across the
//! application: the chat message-list protocol, the answers produced by
//! providers, and the result of gating one question.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Outcome of reviewing a complexity score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// The answer can be shown directly.
    Approved,
    /// The query is flagged for human review.
    TooComplex,
}

impl Decision {
    /// Wire label of the decision.
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Approved => "approved",
            Decision::TooComplex => "too_complex",
        }
    }

    /// Returns an emoji representation of the decision.
    pub fn emoji(&self) -> &'static str {
        match self {
            Decision::Approved => "✅",
            Decision::TooComplex => "🚩",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Decision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "approved" => Ok(Decision::Approved),
            "too_complex" => Ok(Decision::TooComplex),
            other => Err(format!("Unknown decision: {}", other)),
        }
    }
}

/// Role of a message in the chat protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A role-tagged message in the conversational protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    #[allow(dead_code)] // Constructor for callers building requests in code
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Incoming chat request: an ordered list of messages.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
}

impl ChatRequest {
    /// The question is the content of the last user message.
    pub fn last_user_message(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
    }
}

/// Outgoing chat response: always exactly one assistant message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub messages: Vec<ChatMessage>,
}

impl ChatResponse {
    pub fn from_text(content: impl Into<String>) -> Self {
        Self {
            messages: vec![ChatMessage::assistant(content)],
        }
    }
}

/// What an answer provider returned for a question.
///
/// Either part may be missing; the pipeline substitutes fallbacks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderAnswer {
    /// Natural-language answer text.
    pub text: Option<String>,
    /// SQL generated to answer the question.
    pub sql: Option<String>,
}

/// Result of gating a single question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatingResult {
    /// The question that was asked.
    pub question: String,
    /// Answer text (or the fallback text).
    pub answer: String,
    /// Generated SQL (empty when none was produced).
    pub sql: String,
    /// Complexity score of the SQL. `None` in direct mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    /// Review decision. `None` in direct mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision: Option<Decision>,
    /// The user-facing message.
    pub message: String,
}

impl GatingResult {
    /// Whether this result was flagged for review.
    pub fn is_flagged(&self) -> bool {
        self.decision == Some(Decision::TooComplex)
    }
}

/// A batch of gated answers, used for JSON and Markdown output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    /// When the batch was run.
    pub generated_at: DateTime<Utc>,
    /// Pipeline mode used.
    pub mode: String,
    /// Number of questions flagged for review.
    pub flagged: usize,
    /// Duration of the batch in seconds.
    pub duration_seconds: f64,
    /// Individual results, in input order.
    pub results: Vec<GatingResult>,
}
