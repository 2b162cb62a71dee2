//! Client for a hosted Genie text-to-SQL space.
//!
//! Starts a conversation with the question, polls the message until it
//! completes, and turns its attachments into answer text and SQL.

pub mod client;
pub mod error;

pub use client::{GenieClient, GenieClientConfig};
