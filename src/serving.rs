//! Conversational message-list protocol.
//!
//! Takes the chat history, answers its last user message through the
//! gating pipeline and replies with a single assistant message.

use crate::gating::GatingPipeline;
use crate::models::{ChatRequest, ChatResponse, GatingResult};
use anyhow::{bail, Result};
use std::sync::Arc;
use tracing::debug;

/// Chat front end over a gating pipeline.
pub struct ChatAgent {
    pipeline: Arc<GatingPipeline>,
}

impl ChatAgent {
    pub fn new(pipeline: Arc<GatingPipeline>) -> Self {
        Self { pipeline }
    }

    /// Answer a chat request.
    ///
    /// Fails only when the history contains no user message.
    pub async fn predict(&self, request: &ChatRequest) -> Result<(ChatResponse, GatingResult)> {
        let Some(question) = request.last_user_message() else {
            bail!("Chat request contains no user message");
        };
        debug!("Answering question from {} messages", request.messages.len());

        let result = self.pipeline.run(question).await;
        Ok((ChatResponse::from_text(result.message.clone()), result))
    }
}
