//! Threshold review of complexity scores.

use crate::models::Decision;

/// Scores strictly above this are flagged.
pub const COMPLEXITY_THRESHOLD: f64 = 10.0;

/// Review a complexity score and return a decision.
///
/// A NaN score compares false and is approved.
pub fn review_complexity_score(score: f64) -> Decision {
    if score > COMPLEXITY_THRESHOLD {
        Decision::TooComplex
    } else {
        Decision::Approved
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_boundary() {
        assert_eq!(review_complexity_score(10.0), Decision::Approved);
        assert_eq!(review_complexity_score(10.0001), Decision::TooComplex);
        assert_eq!(review_complexity_score(0.0), Decision::Approved);
        assert_eq!(review_complexity_score(5.0), Decision::Approved);
        assert_eq!(review_complexity_score(30.0), Decision::TooComplex);
    }

    #[test]
    fn test_monotonic() {
        let mut flagged = false;
        for step in 0..=400 {
            let score = step as f64 * 0.1;
            let decision = review_complexity_score(score);
            if flagged {
                assert_eq!(decision, Decision::TooComplex, "reverted at {}", score);
            }
            flagged = decision == Decision::TooComplex;
        }
        assert!(flagged);
    }

    #[test]
    fn test_extreme_values() {
        assert_eq!(review_complexity_score(f64::INFINITY), Decision::TooComplex);
        assert_eq!(review_complexity_score(-1.0), Decision::Approved);
        assert_eq!(review_complexity_score(f64::NAN), Decision::Approved);
    }
}
