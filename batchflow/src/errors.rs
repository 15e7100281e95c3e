//! Error types for the batchflow engine.
//!
//! The taxonomy separates per-attempt task failures ([`TaskError`]) from
//! run-level failures ([`PipelineError`]) and context store failures
//! ([`ContextError`]). Task errors are folded into [`crate::TaskResult`]
//! as rendered strings; the engine itself reports failures through result
//! objects rather than by returning `Err`.

use thiserror::Error;

/// An error produced by a single task attempt.
#[derive(Debug, Clone, Error)]
pub enum TaskError {
    /// Input validation rejected the task before any work started.
    ///
    /// Validation failures consume no rate limiter slot and are never
    /// retried.
    #[error("validation: {0}")]
    Validation(String),

    /// The attempt did not settle within the task's timeout.
    #[error("timeout: no result within {timeout_ms}ms")]
    Timeout {
        /// The per-attempt timeout that elapsed.
        timeout_ms: u64,
    },

    /// The work function returned an error.
    #[error("{0}")]
    Work(String),

    /// The work function panicked; treated as a failed attempt.
    #[error("panic: {0}")]
    Panicked(String),
}

impl TaskError {
    /// Creates a validation error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Creates a work error from any error chain.
    #[must_use]
    pub fn work(err: &anyhow::Error) -> Self {
        Self::Work(format!("{err:#}"))
    }

    /// Returns `true` if a further attempt may succeed.
    ///
    /// Everything except validation is considered transient: timeouts,
    /// work errors, and panics all burn one attempt and are retried
    /// while the retry allowance lasts.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        !matches!(self, Self::Validation(_))
    }

    /// Returns `true` if this is a timeout error.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// A run-level failure recorded on the pipeline result.
#[derive(Debug, Clone, Error)]
pub enum PipelineError {
    /// Accumulated cost exceeded the configured cap at a stage boundary.
    #[error("budget exceeded: spent {spent:.2} of cap {cap:.2} cost units")]
    BudgetExceeded {
        /// Total cost units spent so far.
        spent: f64,
        /// The configured cap.
        cap: f64,
    },

    /// A stage's quality gate failed.
    #[error("quality gate failed for stage '{stage}': score {score:.2} below threshold {threshold:.2}")]
    GateFailed {
        /// The stage whose gate failed.
        stage: String,
        /// The weighted score the stage achieved.
        score: f64,
        /// The score required to pass.
        threshold: f64,
    },

    /// A stage references a task type with no registered handler.
    #[error("stage '{stage}' references unknown task type '{type_id}'")]
    UnknownTaskType {
        /// The stage naming the task type.
        stage: String,
        /// The unresolved task type id.
        type_id: String,
    },

    /// A spec or config failed validation before the run started.
    #[error("{0}")]
    Validation(#[from] SpecError),
}

/// Error raised when a spec or config fails validation.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct SpecError {
    /// The error message.
    pub message: String,
}

impl SpecError {
    /// Creates a new spec error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Errors raised by the context store.
#[derive(Debug, Clone, Error)]
pub enum ContextError {
    /// A payload was already recorded for this `(stage, task type)` pair.
    ///
    /// The store is write-once; a later stage never overwrites an
    /// earlier entry.
    #[error("context conflict: entry for task '{task_type}' in stage '{stage}' already exists")]
    Conflict {
        /// The stage that owns the existing entry.
        stage: String,
        /// The task type id of the existing entry.
        task_type: String,
    },

    /// Exported state could not be parsed back into a store.
    #[error("context serialization error: {0}")]
    Serialization(String),
}
