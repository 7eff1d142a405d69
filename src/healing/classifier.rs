use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Timeout,
    RateLimit,
    Connection,
    ServiceUnavailable,
    Validation,
    Unknown,
}

const TIMEOUT_PATTERNS: &[&str] = &["timeout", "timed out", "deadline exceeded"];
const RATE_LIMIT_PATTERNS: &[&str] = &["rate limit", "too many requests", "429", "quota"];
const CONNECTION_PATTERNS: &[&str] = &[
    "connection",
    "econnrefused",
    "econnreset",
    "network",
    "dns",
    "broken pipe",
];
const SERVICE_PATTERNS: &[&str] = &[
    "service unavailable",
    "503",
    "502",
    "bad gateway",
    "circuit breaker is open",
];
const VALIDATION_PATTERNS: &[&str] = &[
    "validation",
    "invalid",
    "schema",
    "missing field",
    "cycle detected",
    "unknown node",
];

/// Pattern-match an error message into a failure category. Anything that
/// matches nothing falls to `Unknown`.
pub fn classify(error: &str) -> FailureKind {
    let lower = error.to_lowercase();
    let matches = |patterns: &[&str]| patterns.iter().any(|pattern| lower.contains(pattern));

    if matches(TIMEOUT_PATTERNS) {
        FailureKind::Timeout
    } else if matches(RATE_LIMIT_PATTERNS) {
        FailureKind::RateLimit
    } else if matches(CONNECTION_PATTERNS) {
        FailureKind::Connection
    } else if matches(SERVICE_PATTERNS) {
        FailureKind::ServiceUnavailable
    } else if matches(VALIDATION_PATTERNS) {
        FailureKind::Validation
    } else {
        FailureKind::Unknown
    }
}

/// Normalize an error message into a grouping signature: lowercased, with
/// digits and punctuation stripped, so recurring faults collapse to one key
/// regardless of the ids, ports, and offsets embedded in the text.
pub fn error_signature(error: &str) -> String {
    error
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphabetic() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
