//! Batched stage execution with full-settlement barriers.
//!
//! Tasks in a stage are independent; the runner schedules them in
//! batches of at most the stage's concurrency limit, in the order the
//! spec lists them. A batch must settle completely before the next one
//! starts, and a stage settles only when every task has settled. Task
//! failures never interrupt siblings.

mod spec;

pub use spec::StageSpec;

use crate::context::ContextStore;
use crate::core::{StageResult, StageStatus, TaskResult};
use crate::runner::{PreparedTask, TaskInput, TaskRunner};
use chrono::Utc;
use futures::future::join_all;
use std::sync::Arc;
use tokio::time::Instant;

/// Runs a stage's tasks to settlement.
#[derive(Debug, Clone)]
pub struct StageRunner {
    runner: TaskRunner,
}

impl StageRunner {
    /// Creates a stage runner on top of a task runner.
    #[must_use]
    pub const fn new(runner: TaskRunner) -> Self {
        Self { runner }
    }

    /// Runs every task and aggregates their results in scheduling
    /// order.
    ///
    /// The context snapshot handed to tasks is taken once, at stage
    /// start; writes that happen later in the run are invisible to this
    /// stage.
    pub async fn run(
        &self,
        stage: &StageSpec,
        tasks: &[PreparedTask],
        store: &ContextStore,
    ) -> StageResult {
        let started_at = Utc::now();
        let started = Instant::now();
        let snapshot = Arc::new(store.snapshot());
        let batch_size = stage.concurrency_limit.max(1);

        tracing::info!(
            stage = %stage.name,
            tasks = tasks.len(),
            batch_size,
            "stage started"
        );

        let mut task_results: Vec<TaskResult> = Vec::with_capacity(tasks.len());
        for (batch_index, batch) in tasks.chunks(batch_size).enumerate() {
            tracing::debug!(
                stage = %stage.name,
                batch = batch_index,
                size = batch.len(),
                "running batch"
            );
            let attempts = batch.iter().map(|prepared| {
                let input = TaskInput {
                    task_type_id: prepared.spec.type_id.clone(),
                    stage_name: stage.name.clone(),
                    context: Arc::clone(&snapshot),
                };
                self.runner
                    .run(&prepared.spec, Arc::clone(&prepared.handler), input)
            });
            // Settlement barrier: the next batch starts only after every
            // task in this one has settled.
            task_results.extend(join_all(attempts).await);
        }

        let errors: Vec<String> = task_results
            .iter()
            .filter(|r| !r.is_completed())
            .map(|r| format!("{}: {}", r.task_type_id, r.errors.join("; ")))
            .collect();
        let status = if errors.is_empty() {
            StageStatus::Completed
        } else {
            StageStatus::Failed
        };

        let result = StageResult {
            stage_name: stage.name.clone(),
            status,
            task_results,
            started_at,
            completed_at: Utc::now(),
            duration_ms: started.elapsed().as_secs_f64() * 1000.0,
            errors,
        };
        tracing::info!(
            stage = %stage.name,
            status = %result.status,
            completed = result.completed_count(),
            failed = result.failed_count(),
            duration_ms = result.duration_ms,
            "stage settled"
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextLimits;
    use crate::limiter::{LimiterConfig, RateLimiter};
    use crate::runner::{TaskHandler, TaskSpec, WorkOutput};
    use crate::testing::{FailingHandler, FixedHandler};
    use async_trait::async_trait;
    use serde_json::json;
    use tokio::time::Duration;

    fn stage_runner() -> StageRunner {
        let limiter = Arc::new(RateLimiter::new(LimiterConfig::new(1000, 60_000)));
        StageRunner::new(TaskRunner::new(limiter))
    }

    fn prepared(type_id: &str, handler: Arc<dyn TaskHandler>) -> PreparedTask {
        PreparedTask {
            spec: TaskSpec::new(type_id).with_max_retries(0),
            handler,
        }
    }

    /// Records when each call starts, then sleeps a scripted delay.
    struct TimedHandler {
        delay_ms: u64,
        epoch: Instant,
        starts: Arc<parking_lot::Mutex<Vec<(String, Duration)>>>,
    }

    #[async_trait]
    impl TaskHandler for TimedHandler {
        async fn run(&self, input: &TaskInput) -> anyhow::Result<WorkOutput> {
            self.starts
                .lock()
                .push((input.task_type_id.clone(), self.epoch.elapsed()));
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
            Ok(WorkOutput::new(json!(input.task_type_id)))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_results_keep_scheduling_order() {
        let runner = stage_runner();
        let store = ContextStore::new(ContextLimits::default());
        // Uneven delays shuffle settlement order inside each batch.
        let delays = [50_u64, 10, 5, 70, 1];
        let epoch = Instant::now();
        let starts = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let tasks: Vec<PreparedTask> = delays
            .iter()
            .enumerate()
            .map(|(i, &delay_ms)| {
                prepared(
                    &format!("task_{i}"),
                    Arc::new(TimedHandler {
                        delay_ms,
                        epoch,
                        starts: Arc::clone(&starts),
                    }),
                )
            })
            .collect();
        let stage = StageSpec::new("ordered")
            .with_task_types((0..5).map(|i| format!("task_{i}")))
            .with_concurrency_limit(2);

        let result = runner.run(&stage, &tasks, &store).await;

        assert!(result.is_completed());
        let order: Vec<&str> = result
            .task_results
            .iter()
            .map(|r| r.task_type_id.as_str())
            .collect();
        assert_eq!(order, vec!["task_0", "task_1", "task_2", "task_3", "task_4"]);

        // Three batches: each starts when the previous fully settles
        // (0, then after the 50ms straggler, then after the 70ms one).
        let start_ms: Vec<u128> = starts.lock().iter().map(|(_, at)| at.as_millis()).collect();
        assert_eq!(start_ms, vec![0, 0, 50, 50, 120]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_waits_for_slowest_member() {
        let runner = stage_runner();
        let store = ContextStore::new(ContextLimits::default());
        let epoch = Instant::now();
        let starts = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let delays = [100_u64, 10, 1];
        let tasks: Vec<PreparedTask> = delays
            .iter()
            .enumerate()
            .map(|(i, &delay_ms)| {
                prepared(
                    &format!("task_{i}"),
                    Arc::new(TimedHandler {
                        delay_ms,
                        epoch,
                        starts: Arc::clone(&starts),
                    }),
                )
            })
            .collect();
        let stage = StageSpec::new("barrier")
            .with_task_types((0..3).map(|i| format!("task_{i}")))
            .with_concurrency_limit(2);

        let result = runner.run(&stage, &tasks, &store).await;
        assert!(result.is_completed());

        // Batch one is task_0 and task_1; task_2 may start only once
        // the 100ms straggler has settled.
        let starts = starts.lock();
        assert_eq!(starts[0], ("task_0".to_string(), Duration::ZERO));
        assert_eq!(starts[1], ("task_1".to_string(), Duration::ZERO));
        assert_eq!(starts[2], ("task_2".to_string(), Duration::from_millis(100)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_do_not_interrupt_siblings() {
        let runner = stage_runner();
        let store = ContextStore::new(ContextLimits::default());
        let survivor = Arc::new(FixedHandler::new(json!("ok")));
        let tasks = vec![
            prepared("good_one", Arc::clone(&survivor) as Arc<dyn TaskHandler>),
            prepared("bad", Arc::new(FailingHandler::new("provider down"))),
            prepared("good_two", Arc::new(FixedHandler::new(json!("also ok")))),
        ];
        let stage =
            StageSpec::new("mixed").with_task_types(["good_one", "bad", "good_two"]);

        let result = runner.run(&stage, &tasks, &store).await;

        assert!(!result.is_completed());
        assert_eq!(result.task_results.len(), 3);
        assert_eq!(result.completed_count(), 2);
        assert_eq!(result.errors, vec!["bad: provider down"]);
        assert!(result.task_results[0].is_completed());
        assert!(!result.task_results[1].is_completed());
        assert!(result.task_results[2].is_completed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_tasks_see_snapshot_from_stage_start() {
        struct ContextEcho;

        #[async_trait]
        impl TaskHandler for ContextEcho {
            async fn run(&self, input: &TaskInput) -> anyhow::Result<WorkOutput> {
                Ok(WorkOutput::new(json!({
                    "visible_entries": input.context.len(),
                    "outline": input.context.get("outline", "draft"),
                })))
            }
        }

        let runner = stage_runner();
        let store = ContextStore::new(ContextLimits::default());
        store.record("outline", "draft", json!("the outline")).unwrap();

        let tasks = vec![prepared("echo", Arc::new(ContextEcho))];
        let stage = StageSpec::new("reads_context").with_task_type("echo");
        let result = runner.run(&stage, &tasks, &store).await;

        assert_eq!(
            result.task_results[0].payload,
            json!({"visible_entries": 1, "outline": "\"the outline\""})
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_stage_settles_completed() {
        let runner = stage_runner();
        let store = ContextStore::new(ContextLimits::default());
        let stage = StageSpec::new("empty");

        let result = runner.run(&stage, &[], &store).await;
        assert!(result.is_completed());
        assert!(result.task_results.is_empty());
    }
}
