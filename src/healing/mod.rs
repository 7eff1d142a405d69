//! Automated failure remediation: classify an execution error, pick a
//! strategy, apply it as an idempotent mutation of the workflow or its
//! integrations' breaker profiles, and record the attempt.

mod classifier;
mod healer;
mod log;
mod strategy;

pub use classifier::{classify, error_signature, FailureKind};
pub use healer::{HealError, HealingReport, SelfHealer};
pub use log::{HealingLogEntry, HealingLogStore, LearnedOptimization};
pub use strategy::HealingStrategy;
