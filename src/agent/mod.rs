//! LLM agent modules for answering data questions.
//!
//! This module provides the tool-calling agent that drives Genie and the
//! registry functions.

pub mod agent_loop;
pub mod tools;

pub use agent_loop::{AgentConfig, ToolCallingAgent};
