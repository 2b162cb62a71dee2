//! Output rendering and the review log.

pub mod generator;
pub mod review_log;

pub use generator::{generate_json_report, generate_markdown_report};
pub use review_log::ReviewLog;
