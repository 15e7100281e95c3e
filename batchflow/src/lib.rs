//! # Batchflow
//!
//! A staged task execution engine for rate-limited, unreliable,
//! expensive external resources.
//!
//! Batchflow runs named stages strictly in sequence, each stage a set
//! of typed tasks executed in concurrency-limited batches, with:
//!
//! - **Retry and timeout**: every task attempt races a timeout and
//!   failed attempts retry with exponential backoff
//! - **Rate limiting**: a sliding-window limiter gates every external
//!   call, shared across the whole run
//! - **Budget tracking**: cumulative cost units checked against a hard
//!   cap at stage boundaries
//! - **Quality gates**: weighted-criteria scoring that can abort a run
//!   when a critical stage underdelivers
//! - **Context flow**: completed payloads accumulate in a size-bounded
//!   store that later stages read
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use batchflow::prelude::*;
//! use std::sync::Arc;
//!
//! let registry = TaskRegistry::new();
//! registry.register(TaskSpec::new("research.fetch"), Arc::new(FetchHandler))?;
//! registry.register(TaskSpec::new("draft.write"), Arc::new(WriteHandler))?;
//!
//! let config = EngineConfig::default().with_budget_cap(20.0);
//! let engine = PipelineEngine::new(config, Arc::new(registry));
//!
//! let stages = vec![
//!     StageSpec::new("research").with_task_type("research.fetch"),
//!     StageSpec::new("draft").with_task_type("draft.write").non_critical(),
//! ];
//! let run = engine.orchestrate(&stages).await;
//! assert!(run.is_success());
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::cast_precision_loss
)]

pub mod budget;
pub mod context;
pub mod core;
pub mod engine;
pub mod errors;
pub mod events;
pub mod gate;
pub mod limiter;
pub mod runner;
pub mod stage;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::budget::BudgetTracker;
    pub use crate::context::{
        ContextLimits, ContextSnapshot, ContextStore, StoredPayload,
    };
    pub use crate::core::{
        parse_payload, Criticality, ParsedPayload, PipelineRun, RunStatus,
        StageResult, StageStatus, TaskMetrics, TaskResult, TaskStatus,
    };
    pub use crate::engine::{EngineConfig, PipelineEngine};
    pub use crate::errors::{
        ContextError, PipelineError, SpecError, TaskError,
    };
    pub use crate::events::{
        CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink,
    };
    pub use crate::gate::{
        base_criteria, GateConfig, QualityCriterion, QualityGate,
        QualityGateResult,
    };
    pub use crate::limiter::{LimiterConfig, RateLimiter};
    pub use crate::runner::{
        TaskHandler, TaskInput, TaskRegistry, TaskRunner, TaskSpec, WorkOutput,
    };
    pub use crate::stage::{StageRunner, StageSpec};
}

#[cfg(test)]
mod tests {
    use crate::engine::EngineConfig;

    #[test]
    fn test_default_config_is_usable() {
        assert!(EngineConfig::default().validate().is_ok());
    }
}
