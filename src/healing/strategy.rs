use std::fmt;

use serde::{Deserialize, Serialize};

use super::classifier::FailureKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealingStrategy {
    IncreaseTimeout,
    RetryWithBackoff,
    CircuitBreaker,
    FallbackNode,
}

impl HealingStrategy {
    /// Deterministic failure-to-strategy table. `Unknown` takes the
    /// conservative default of retrying with backoff.
    pub fn for_failure(kind: FailureKind) -> Self {
        match kind {
            FailureKind::Timeout => HealingStrategy::IncreaseTimeout,
            FailureKind::RateLimit => HealingStrategy::RetryWithBackoff,
            FailureKind::Connection | FailureKind::ServiceUnavailable => {
                HealingStrategy::CircuitBreaker
            }
            FailureKind::Validation => HealingStrategy::FallbackNode,
            FailureKind::Unknown => HealingStrategy::RetryWithBackoff,
        }
    }

    /// Fixed per-strategy improvement estimate recorded with learned
    /// optimizations.
    pub fn estimated_improvement_pct(self) -> u32 {
        match self {
            HealingStrategy::IncreaseTimeout => 40,
            HealingStrategy::RetryWithBackoff => 35,
            HealingStrategy::CircuitBreaker => 55,
            HealingStrategy::FallbackNode => 60,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HealingStrategy::IncreaseTimeout => "increase_timeout",
            HealingStrategy::RetryWithBackoff => "retry_with_backoff",
            HealingStrategy::CircuitBreaker => "circuit_breaker",
            HealingStrategy::FallbackNode => "fallback_node",
        }
    }
}

impl fmt::Display for HealingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
