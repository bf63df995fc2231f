//! Verification results.

use serde::{Deserialize, Serialize};

/// Outcome of one fixture case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationResult {
    pub case_name: String,
    pub family: String,
    pub passed: bool,
    pub expected: String,
    pub actual: String,
    /// Human-readable mismatch description, present only on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<String>,
    pub latency_ns: u64,
}

/// Describe the first transcript token where `expected` and `actual` diverge.
#[must_use]
pub fn render_diff(expected: &str, actual: &str) -> String {
    let mut want = expected.split_whitespace();
    let mut got = actual.split_whitespace();
    let mut index = 0usize;
    loop {
        match (want.next(), got.next()) {
            (Some(w), Some(g)) if w == g => index += 1,
            (Some(w), Some(g)) => return format!("token {index}: expected `{w}`, got `{g}`"),
            (Some(w), None) => return format!("token {index}: expected `{w}`, transcript ended"),
            (None, Some(g)) => return format!("token {index}: unexpected extra `{g}`"),
            (None, None) => return "transcripts differ only in whitespace".to_string(),
        }
    }
}
