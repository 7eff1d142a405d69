//! Top-level engine configuration. Every field has a serde default, so a
//! partial config file (or none at all) yields a working engine.

use serde::{Deserialize, Serialize};

use crate::limits::{CircuitBreakerConfig, RateLimitConfig};
use crate::queue::QueueConfig;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}
