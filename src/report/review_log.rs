//! Append-only log of queries flagged for review.
//!
//! Each flagged result is written as one JSON object per line.

use crate::models::{Decision, GatingResult};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// One line of the review log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewEntry {
    pub flagged_at: DateTime<Utc>,
    pub question: String,
    pub sql: String,
    pub score: f64,
    pub decision: Decision,
}

/// JSON-lines review log on disk.
#[derive(Debug, Clone)]
pub struct ReviewLog {
    path: PathBuf,
}

impl ReviewLog {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    #[allow(dead_code)] // Accessor
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a gated result. Results without a score are skipped.
    pub fn append(&self, result: &GatingResult) -> Result<()> {
        let (Some(score), Some(decision)) = (result.score, result.decision) else {
            return Ok(());
        };

        let entry = ReviewEntry {
            flagged_at: Utc::now(),
            question: result.question.clone(),
            sql: result.sql.clone(),
            score,
            decision,
        };

        let mut line = serde_json::to_string(&entry)?;
        line.push('\n');

        // Single write per entry so concurrent appends don't interleave.
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open review log: {}", self.path.display()))?;
        file.write_all(line.as_bytes())
            .with_context(|| format!("Failed to write review log: {}", self.path.display()))?;

        debug!("Appended review entry to {}", self.path.display());
        Ok(())
    }

    /// Read back every entry in the log.
    #[allow(dead_code)] // Used by review tooling and tests
    pub fn entries(&self) -> Result<Vec<ReviewEntry>> {
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read review log: {}", self.path.display()))?;

        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).context("Malformed review log entry"))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn flagged(question: &str) -> GatingResult {
        GatingResult {
            question: question.to_string(),
            answer: "a".to_string(),
            sql: "SELECT * FROM a JOIN b".to_string(),
            score: Some(15.0),
            decision: Some(Decision::TooComplex),
            message: String::new(),
        }
    }

    #[test]
    fn test_append_and_read() {
        let temp_dir = TempDir::new().unwrap();
        let log = ReviewLog::new(temp_dir.path().join("review.jsonl"));

        log.append(&flagged("one")).unwrap();
        log.append(&flagged("two")).unwrap();

        let entries = log.entries().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].question, "one");
        assert_eq!(entries[1].score, 15.0);
        assert_eq!(entries[1].decision, Decision::TooComplex);
    }

    #[test]
    fn test_ungated_result_is_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let log = ReviewLog::new(temp_dir.path().join("review.jsonl"));

        let mut result = flagged("direct");
        result.score = None;
        result.decision = None;
        log.append(&result).unwrap();

        assert!(!log.path().exists());
    }
}
