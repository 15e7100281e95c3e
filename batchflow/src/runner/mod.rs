//! Task execution: validation, rate limiting, timeout racing, retries.
//!
//! [`TaskRunner::run`] drives one task from spec to settled
//! [`TaskResult`]:
//!
//! 1. Validate the input; a rejection settles the task immediately
//!    without touching the limiter.
//! 2. For each attempt: wait for a rate limiter slot, spawn the work
//!    function, and race it against the per-attempt timeout.
//! 3. After a failed attempt with retries left, sleep an exponential
//!    backoff (`base * 2^k` after the `k`-th failure, zero-indexed) and
//!    go again. Every retry waits for a fresh limiter slot.
//! 4. Settle: the first successful attempt wins; otherwise the task
//!    fails with the last attempt's error.
//!
//! The runner never returns `Err` and never panics outward; work
//! function panics are caught at the join boundary and treated as
//! failed attempts.

mod handler;
mod registry;

pub use handler::{TaskHandler, TaskInput, WorkOutput};
pub use registry::{PreparedTask, TaskRegistry};

use crate::core::{TaskMetrics, TaskResult};
use crate::errors::{SpecError, TaskError};
use crate::limiter::RateLimiter;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::time::{Duration, Instant};

/// Per-task-type execution settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSpec {
    /// Unique id for this task type.
    pub type_id: String,
    /// Retries allowed after the first attempt.
    pub max_retries: u32,
    /// Timeout for each individual attempt.
    pub timeout_ms: u64,
}

impl TaskSpec {
    /// Creates a spec with 2 retries and a 60 second attempt timeout.
    #[must_use]
    pub fn new(type_id: impl Into<String>) -> Self {
        Self {
            type_id: type_id.into(),
            max_retries: 2,
            timeout_ms: 60_000,
        }
    }

    /// Sets the retry allowance.
    #[must_use]
    pub const fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the per-attempt timeout.
    #[must_use]
    pub const fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Validates the spec.
    pub fn validate(&self) -> Result<(), SpecError> {
        if self.type_id.trim().is_empty() {
            return Err(SpecError::new("task type_id cannot be empty"));
        }
        if self.timeout_ms == 0 {
            return Err(SpecError::new(format!(
                "task '{}' timeout_ms must be positive",
                self.type_id
            )));
        }
        Ok(())
    }
}

/// Runs individual tasks to settlement.
#[derive(Debug, Clone)]
pub struct TaskRunner {
    limiter: Arc<RateLimiter>,
    backoff_base_ms: u64,
}

impl TaskRunner {
    /// Creates a runner with a 1 second backoff base.
    #[must_use]
    pub const fn new(limiter: Arc<RateLimiter>) -> Self {
        Self {
            limiter,
            backoff_base_ms: 1000,
        }
    }

    /// Sets the backoff base applied before the first retry.
    #[must_use]
    pub const fn with_backoff_base_ms(mut self, backoff_base_ms: u64) -> Self {
        self.backoff_base_ms = backoff_base_ms;
        self
    }

    /// Runs one task to settlement. Infallible by contract: every
    /// failure mode is folded into the returned [`TaskResult`].
    pub async fn run(
        &self,
        spec: &TaskSpec,
        handler: Arc<dyn TaskHandler>,
        input: TaskInput,
    ) -> TaskResult {
        let started = Instant::now();
        let input = Arc::new(input);

        if let Err(message) = handler.validate(&input) {
            let err = TaskError::validation(message);
            tracing::debug!(task = %spec.type_id, error = %err, "input validation rejected task");
            return TaskResult::failed(&spec.type_id, err.to_string(), elapsed_ms(started));
        }

        let attempts = spec.max_retries.saturating_add(1);
        let timeout = Duration::from_millis(spec.timeout_ms);
        let mut last_error: Option<TaskError> = None;

        for attempt in 0..attempts {
            self.limiter.acquire().await;

            let work = tokio::spawn({
                let handler = Arc::clone(&handler);
                let input = Arc::clone(&input);
                async move { handler.run(&input).await }
            });

            let outcome = match tokio::time::timeout(timeout, work).await {
                // Dropping the join handle detaches the attempt: it may
                // keep running in the background but can no longer win.
                Err(_) => Err(TaskError::Timeout {
                    timeout_ms: spec.timeout_ms,
                }),
                Ok(Err(join_err)) => Err(TaskError::Panicked(join_err.to_string())),
                Ok(Ok(Err(work_err))) => Err(TaskError::work(&work_err)),
                Ok(Ok(Ok(output))) => Ok(output),
            };

            match outcome {
                Ok(output) => {
                    if attempt > 0 {
                        tracing::debug!(
                            task = %spec.type_id,
                            attempt = attempt + 1,
                            "task completed after retries"
                        );
                    }
                    let metrics = TaskMetrics {
                        cost_units: output.cost_units.max(0.0),
                        duration_ms: elapsed_ms(started),
                        confidence: output.confidence.map(|c| c.clamp(0.0, 1.0)),
                        sources: output.sources,
                    };
                    return TaskResult::completed(&spec.type_id, output.payload, metrics);
                }
                Err(err) => {
                    tracing::warn!(
                        task = %spec.type_id,
                        attempt = attempt + 1,
                        attempts,
                        error = %err,
                        "task attempt failed"
                    );
                    last_error = Some(err);
                    if attempt + 1 < attempts {
                        let factor = 1_u64.checked_shl(attempt).unwrap_or(u64::MAX);
                        let delay_ms = self.backoff_base_ms.saturating_mul(factor);
                        tracing::debug!(task = %spec.type_id, delay_ms, "backing off before retry");
                        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    }
                }
            }
        }

        let err =
            last_error.unwrap_or_else(|| TaskError::Work("no attempts were made".to_string()));
        TaskResult::failed(&spec.type_id, err.to_string(), elapsed_ms(started))
    }
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}
