//! Markdown and JSON rendering of batch runs.

use crate::models::{BatchReport, Decision, GatingResult};
use anyhow::Result;

/// Generate a complete Markdown report for a batch of questions.
pub fn generate_markdown_report(report: &BatchReport) -> String {
    let mut output = String::new();

    output.push_str("# Genie Agent Answers\n\n");
    output.push_str(&generate_metadata_section(report));
    output.push_str(&generate_summary_section(&report.results));

    for (i, result) in report.results.iter().enumerate() {
        output.push_str(&generate_result_block(i + 1, result));
    }

    output
}

fn generate_metadata_section(report: &BatchReport) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!(
        "- **Generated:** {}\n",
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Mode:** `{}`\n", report.mode));
    section.push_str(&format!("- **Questions:** {}\n", report.results.len()));
    if report.flagged > 0 {
        section.push_str(&format!("- **Flagged for Review:** {}\n", report.flagged));
    }
    section.push_str(&format!("- **Duration:** {:.1}s\n", report.duration_seconds));
    section.push('\n');

    section
}

fn generate_summary_section(results: &[GatingResult]) -> String {
    let mut section = String::new();

    section.push_str("## Summary\n\n");
    section.push_str("| # | Question | Score | Decision |\n");
    section.push_str("|:---:|:---|:---:|:---:|\n");

    for (i, result) in results.iter().enumerate() {
        let score = result
            .score
            .map(|s| format!("{:.1}", s))
            .unwrap_or_else(|| "-".to_string());
        let decision = match result.decision {
            Some(d) => format!("{} {}", d.emoji(), d),
            None => "-".to_string(),
        };
        section.push_str(&format!(
            "| {} | {} | {} | {} |\n",
            i + 1,
            result.question.replace('|', "\\|"),
            score,
            decision
        ));
    }
    section.push('\n');

    section
}

fn generate_result_block(index: usize, result: &GatingResult) -> String {
    let mut block = String::new();

    block.push_str(&format!("## {}. {}\n\n", index, result.question));
    if result.decision == Some(Decision::TooComplex) {
        block.push_str("> 🚩 **Flagged for review**\n\n");
    }
    block.push_str(&result.message);
    block.push_str("\n---\n\n");

    block
}

/// Generate a JSON report.
pub fn generate_json_report(report: &BatchReport) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}
