//! User-facing response templates.
//!
//! Turns an answer, its SQL and the review decision into the single
//! Markdown message returned to the caller.

use crate::gating::reviewer::COMPLEXITY_THRESHOLD;
use crate::models::Decision;

/// Options for rendering responses.
#[derive(Debug, Clone)]
pub struct FormatOptions {
    /// Include the flagged SQL in the too-complex notice.
    pub show_flagged_sql: bool,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            show_flagged_sql: true,
        }
    }
}

impl From<&crate::config::ResponseConfig> for FormatOptions {
    fn from(config: &crate::config::ResponseConfig) -> Self {
        Self {
            show_flagged_sql: config.show_flagged_sql,
        }
    }
}

/// Render the gated response for a decision.
pub fn format_response(
    answer: &str,
    sql: &str,
    score: f64,
    decision: Decision,
    options: &FormatOptions,
) -> String {
    match decision {
        Decision::Approved => format_direct(answer, sql),
        Decision::TooComplex => format_flagged(sql, score, options),
    }
}

/// Render an answer followed by its SQL, without any review notice.
pub fn format_direct(answer: &str, sql: &str) -> String {
    let mut output = String::new();

    output.push_str(answer);
    output.push_str("\n\n**Generated SQL Query:**\n");
    output.push_str(&sql_block(sql));

    output
}

fn format_flagged(sql: &str, score: f64, options: &FormatOptions) -> String {
    let mut output = String::new();

    output.push_str(&format!(
        "{} The generated query was too complex to show automatically \
         (complexity score {:.1}, threshold {:.1}). It has been flagged and logged for review.\n",
        Decision::TooComplex.emoji(),
        score,
        COMPLEXITY_THRESHOLD
    ));

    if options.show_flagged_sql && !sql.trim().is_empty() {
        output.push_str("\n**Flagged SQL Query:**\n");
        output.push_str(&sql_block(sql));
    }

    output
}

fn sql_block(sql: &str) -> String {
    format!("```sql\n{}\n```\n", sql)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_approved_template() {
        let message = format_response(
            "Sales total is 42.",
            "SELECT * FROM sales",
            5.0,
            Decision::Approved,
            &FormatOptions::default(),
        );

        assert!(message.starts_with("Sales total is 42."));
        assert!(message.contains("**Generated SQL Query:**"));
        assert!(message.contains("```sql\nSELECT * FROM sales\n```"));
        assert!(!message.contains("flagged"));
    }

    #[test]
    fn test_flagged_template() {
        let sql = "SELECT * FROM a JOIN b ON a.id = b.id";
        let message = format_response(
            "secret answer",
            sql,
            15.0,
            Decision::TooComplex,
            &FormatOptions::default(),
        );

        assert!(message.contains("too complex"));
        assert!(message.contains("flagged and logged for review"));
        assert!(message.contains("15.0"));
        assert!(message.contains(sql));
        assert!(!message.contains("secret answer"));
        assert!(!message.contains("**Generated SQL Query:**"));
    }

    #[test]
    fn test_flagged_without_sql() {
        let options = FormatOptions {
            show_flagged_sql: false,
        };
        let message = format_response("a", "SELECT 1 JOIN", 15.0, Decision::TooComplex, &options);
        assert!(!message.contains("```sql"));

        let message = format_response("a", "  ", 15.0, Decision::TooComplex, &FormatOptions::default());
        assert!(!message.contains("```sql"));
    }

    #[test]
    fn test_direct_with_empty_sql() {
        let message = format_direct("I could not find an answer.", "");
        assert!(message.contains("I could not find an answer."));
        assert!(message.contains("```sql\n\n```"));
    }
}
