//! The gating pipeline.
//!
//! Question -> (answer, SQL) -> score -> decision -> message. The answer
//! comes from an injected [`AnswerProvider`] so the pipeline runs the same
//! against Genie, the tool-calling agent, or a fake in tests.

use crate::gating::formatter::{format_direct, format_response, FormatOptions};
use crate::gating::reviewer::review_complexity_score;
use crate::gating::scorer::score_sql_query;
use crate::models::{Decision, GatingResult, ProviderAnswer};
use crate::report::ReviewLog;
use anyhow::Result;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, info_span, warn, Instrument};

/// Answer text used when the provider produced nothing usable.
pub const FALLBACK_ANSWER: &str = "I could not find an answer.";

/// Something that can answer a natural-language question with text and SQL.
#[async_trait]
pub trait AnswerProvider: Send + Sync {
    /// Answer a question.
    async fn answer(&self, question: &str) -> Result<ProviderAnswer>;

    /// Short name used in logs.
    fn name(&self) -> &str;
}

/// How answers are produced and whether they are gated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum PipelineMode {
    /// Ask Genie and show its answer with the SQL, no review.
    Direct,
    /// Ask Genie, then score and review the SQL (default).
    #[default]
    Gated,
    /// Let an LLM drive the tools, then score and review the SQL.
    Agent,
}

impl fmt::Display for PipelineMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineMode::Direct => write!(f, "direct"),
            PipelineMode::Gated => write!(f, "gated"),
            PipelineMode::Agent => write!(f, "agent"),
        }
    }
}

/// Runs questions through a provider and the complexity gate.
pub struct GatingPipeline {
    provider: Arc<dyn AnswerProvider>,
    gated: bool,
    format_options: FormatOptions,
    review_log: Option<ReviewLog>,
}

impl GatingPipeline {
    /// Create a pipeline over a provider.
    pub fn new(provider: Arc<dyn AnswerProvider>, mode: PipelineMode) -> Self {
        Self {
            provider,
            gated: mode != PipelineMode::Direct,
            format_options: FormatOptions::default(),
            review_log: None,
        }
    }

    pub fn with_format_options(mut self, options: FormatOptions) -> Self {
        self.format_options = options;
        self
    }

    /// Append flagged results to this log.
    pub fn with_review_log(mut self, log: ReviewLog) -> Self {
        self.review_log = Some(log);
        self
    }

    /// Run one question through the pipeline. Never fails.
    pub async fn run(&self, question: &str) -> GatingResult {
        let span = info_span!("answer", provider = self.provider.name());
        let outcome = self.provider.answer(question).instrument(span).await;

        let (answer, sql) = resolve_answer(outcome);
        debug!("Provider answer: {} chars, SQL: {:?}", answer.len(), sql);

        if !self.gated {
            let message = format_direct(&answer, &sql);
            return GatingResult {
                question: question.to_string(),
                answer,
                sql,
                score: None,
                decision: None,
                message,
            };
        }

        let score = score_sql_query(&sql);
        let decision = review_complexity_score(score);
        info!("Complexity score {:.1} -> {}", score, decision);

        let message = format_response(&answer, &sql, score, decision, &self.format_options);

        let result = GatingResult {
            question: question.to_string(),
            answer,
            sql,
            score: Some(score),
            decision: Some(decision),
            message,
        };

        if decision == Decision::TooComplex {
            warn!("Query flagged for review (score {:.1}): {}", score, result.sql);
            if let Some(ref log) = self.review_log {
                if let Err(e) = log.append(&result) {
                    warn!("Failed to write review log: {:#}", e);
                }
            }
        }

        result
    }
}

/// Substitute fallbacks for a failed or partial provider answer.
fn resolve_answer(outcome: Result<ProviderAnswer>) -> (String, String) {
    let answer = match outcome {
        Ok(answer) => answer,
        Err(e) => {
            warn!("Answer provider failed: {:#}", e);
            ProviderAnswer::default()
        }
    };

    let text = answer
        .text
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| FALLBACK_ANSWER.to_string());
    let sql = answer.sql.unwrap_or_default();

    (text, sql)
}
