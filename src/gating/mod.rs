//! Complexity gating of generated SQL.
//!
//! The scorer and reviewer are plain functions; the pipeline wires them to
//! an answer provider and the response templates.

pub mod formatter;
pub mod pipeline;
pub mod reviewer;
pub mod scorer;

pub use formatter::FormatOptions;
pub use pipeline::{AnswerProvider, GatingPipeline, PipelineMode};
pub use reviewer::review_complexity_score;
pub use scorer::score_sql_query;
