//! Match acceptance policy.
//!
//! Only the best-ranked candidate is ever considered. It is accepted when
//! its similarity strictly exceeds a single global threshold; lower-ranked
//! candidates are never surfaced, whatever their score.

use crate::types::ScoredRecord;
use serde::Serialize;

/// Cosine similarity a best candidate must strictly exceed to be accepted.
pub const MATCH_THRESHOLD: f64 = 0.95;

pub const NOT_FOUND_MESSAGE: &str = "User not found in our records";

/// The identity reported for an accepted match.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchedIdentity {
    #[serde(rename = "firstName")]
    pub first_name: String,
    #[serde(rename = "lastName")]
    pub last_name: String,
    pub age: String,
    /// Similarity rounded to 3 decimal places.
    pub similarity_score: f64,
    pub timestamp: i64,
}

/// Decision for one authentication request.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    /// Best candidate returned by the store, whether accepted or not.
    pub best: Option<ScoredRecord>,
    pub matched: bool,
}

impl MatchResult {
    /// Raw similarity of the best candidate, if there was one.
    pub fn similarity(&self) -> Option<f64> {
        self.best.as_ref().map(|b| b.score)
    }

    /// Wire representation: `{match: {...}}` or `{match: null, message}`.
    pub fn response(&self) -> MatchResponse {
        match (&self.best, self.matched) {
            (Some(best), true) => MatchResponse {
                matched: Some(MatchedIdentity {
                    first_name: best.metadata.first_name.clone(),
                    last_name: best.metadata.last_name.clone(),
                    age: best.metadata.age.clone(),
                    similarity_score: round_score(best.score),
                    timestamp: best.metadata.timestamp,
                }),
                message: None,
            },
            _ => MatchResponse {
                matched: None,
                message: Some(NOT_FOUND_MESSAGE.to_string()),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResponse {
    #[serde(rename = "match")]
    pub matched: Option<MatchedIdentity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Fixed global acceptance threshold, not per identity.
#[derive(Debug, Clone, Copy)]
pub struct AcceptancePolicy {
    threshold: f64,
}

impl Default for AcceptancePolicy {
    fn default() -> Self {
        Self {
            threshold: MATCH_THRESHOLD,
        }
    }
}

impl AcceptancePolicy {
    pub fn with_threshold(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Decide on `candidates`, which must already be ranked best first.
    pub fn decide(&self, candidates: &[ScoredRecord]) -> MatchResult {
        let best = candidates.first().cloned();
        let matched = best
            .as_ref()
            .map(|b| b.score > self.threshold)
            .unwrap_or(false);
        MatchResult { best, matched }
    }
}

/// Round a similarity to 3 decimal places for reporting.
pub fn round_score(score: f64) -> f64 {
    (score * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RecordMetadata;

    fn candidate(name: &str, score: f64) -> ScoredRecord {
        ScoredRecord {
            id: format!("{name}-x-1"),
            score,
            metadata: RecordMetadata {
                first_name: name.into(),
                last_name: "X".into(),
                age: "30".into(),
                timestamp: 1_700_000_000,
                embedding_number: 1,
            },
        }
    }

    #[test]
    fn test_boundary_score_is_not_a_match() {
        let result = AcceptancePolicy::default().decide(&[candidate("ada", 0.95)]);
        assert!(!result.matched);
        assert_eq!(result.similarity(), Some(0.95));
    }

    #[test]
    fn test_score_above_boundary_is_a_match() {
        let result = AcceptancePolicy::default().decide(&[candidate("ada", 0.951)]);
        assert!(result.matched);
    }

    #[test]
    fn test_score_just_above_boundary_keeps_precision() {
        // Narrowing to f32 would collapse this onto the threshold.
        let result = AcceptancePolicy::default().decide(&[candidate("ada", 0.950_000_01)]);
        assert!(result.matched);
    }

    #[test]
    fn test_only_best_candidate_counts() {
        // Store ranking is trusted as-is: a higher score further down is ignored.
        let result = AcceptancePolicy::default()
            .decide(&[candidate("first", 0.90), candidate("second", 0.99)]);
        assert!(!result.matched);
        assert_eq!(result.best.unwrap().metadata.first_name, "first");
    }

    #[test]
    fn test_no_candidates() {
        let result = AcceptancePolicy::default().decide(&[]);
        assert!(!result.matched);
        assert!(result.similarity().is_none());
    }

    #[test]
    fn test_response_for_match() {
        let result = AcceptancePolicy::default().decide(&[candidate("ada", 0.98765)]);
        let value = serde_json::to_value(result.response()).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "match": {
                    "firstName": "ada",
                    "lastName": "X",
                    "age": "30",
                    "similarity_score": 0.988,
                    "timestamp": 1_700_000_000,
                }
            })
        );
    }

    #[test]
    fn test_response_for_no_match() {
        let result = AcceptancePolicy::default().decide(&[candidate("ada", 0.5)]);
        let value = serde_json::to_value(result.response()).unwrap();
        assert_eq!(
            value,
            serde_json::json!({ "match": null, "message": NOT_FOUND_MESSAGE })
        );
    }

    #[test]
    fn test_round_score() {
        assert_eq!(round_score(0.9876), 0.988);
        assert_eq!(round_score(1.0), 1.0);
    }
}
