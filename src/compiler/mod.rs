//! Workflow compilation: validated, ordered, parallelized execution plans,
//! cached by content hash.

mod cache;
#[allow(clippy::module_inception)]
mod compiler;
mod plan;

pub use cache::{PlanCache, PlanCacheStats, PlanKey};
pub use compiler::{version_hash, PlanCompiler};
pub use plan::{CompileOutcome, CompiledPlan, OptimizationLevel};
