//! SQL complexity scoring.

/// Score every query starts from.
pub const BASE_SCORE: f64 = 5.0;

/// Clauses that make a query harder to review, with their fixed bonus.
const FEATURES: [(&str, f64); 3] = [("JOIN", 10.0), ("GROUP BY", 5.0), ("PARTITION BY", 10.0)];

/// Analyze a SQL query and return its complexity score.
///
/// Each clause in the feature table adds its bonus once, however often it
/// appears. Matching is case-insensitive and never fails, so empty or
/// malformed SQL simply scores [`BASE_SCORE`].
pub fn score_sql_query(sql_query: &str) -> f64 {
    let normalized = sql_query.to_uppercase();

    FEATURES
        .iter()
        .filter(|(keyword, _)| normalized.contains(keyword))
        .fold(BASE_SCORE, |score, (_, bonus)| score + bonus)
}
