//! Result types produced by task, stage, and pipeline execution.

use super::status::{RunStatus, StageStatus, TaskStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Execution metrics attached to every task result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskMetrics {
    /// Abstract cost units consumed by the task.
    pub cost_units: f64,
    /// Wall-clock duration of the whole task, including validation,
    /// limiter waits, retries, and backoff.
    pub duration_ms: f64,
    /// Optional confidence reported by the work function, clamped to `0..=1`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    /// Optional provenance identifiers reported by the work function.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<String>,
}

impl TaskMetrics {
    /// Metrics for a failed task: everything zeroed except the duration.
    #[must_use]
    pub fn zeroed(duration_ms: f64) -> Self {
        Self {
            duration_ms,
            ..Self::default()
        }
    }
}

/// The settled outcome of a single task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    /// The task type that produced this result.
    pub task_type_id: String,
    /// Terminal status.
    pub status: TaskStatus,
    /// The work function's payload, or `null` for failed tasks.
    pub payload: serde_json::Value,
    /// Execution metrics.
    pub metrics: TaskMetrics,
    /// The final error message for failed tasks; empty for completed
    /// ones. Intermediate attempt errors go to the log, not the result.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl TaskResult {
    /// Creates a completed result.
    #[must_use]
    pub fn completed(
        task_type_id: impl Into<String>,
        payload: serde_json::Value,
        metrics: TaskMetrics,
    ) -> Self {
        Self {
            task_type_id: task_type_id.into(),
            status: TaskStatus::Completed,
            payload,
            metrics,
            errors: Vec::new(),
        }
    }

    /// Creates a failed result carrying the final error message.
    ///
    /// Failed results have a `null` payload and zeroed metrics apart
    /// from the measured duration.
    #[must_use]
    pub fn failed(
        task_type_id: impl Into<String>,
        error: impl Into<String>,
        duration_ms: f64,
    ) -> Self {
        Self {
            task_type_id: task_type_id.into(),
            status: TaskStatus::Failed,
            payload: serde_json::Value::Null,
            metrics: TaskMetrics::zeroed(duration_ms),
            errors: vec![error.into()],
        }
    }

    /// Returns `true` if the task produced output.
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        self.status.is_completed()
    }
}

/// The settled outcome of one stage: every task's result, in the order
/// the stage spec listed the task types.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageResult {
    /// The stage name.
    pub stage_name: String,
    /// Terminal status.
    pub status: StageStatus,
    /// Per-task results in scheduling order.
    pub task_results: Vec<TaskResult>,
    /// When the stage started.
    pub started_at: DateTime<Utc>,
    /// When the last task settled.
    pub completed_at: DateTime<Utc>,
    /// Wall-clock duration of the stage.
    pub duration_ms: f64,
    /// Summaries of the failed tasks, in scheduling order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl StageResult {
    /// Number of tasks that completed.
    #[must_use]
    pub fn completed_count(&self) -> usize {
        self.task_results.iter().filter(|r| r.is_completed()).count()
    }

    /// Number of tasks that failed.
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.task_results.len() - self.completed_count()
    }

    /// Fraction of tasks that completed, in `0..=1`.
    ///
    /// An empty stage has a ratio of `1.0`.
    #[must_use]
    pub fn completion_ratio(&self) -> f64 {
        if self.task_results.is_empty() {
            return 1.0;
        }
        #[allow(clippy::cast_precision_loss)]
        {
            self.completed_count() as f64 / self.task_results.len() as f64
        }
    }

    /// Sum of cost units across all task results.
    #[must_use]
    pub fn total_cost_units(&self) -> f64 {
        self.task_results.iter().map(|r| r.metrics.cost_units).sum()
    }

    /// Returns `true` if every task completed.
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        self.status.is_completed()
    }
}

/// The outcome of a whole pipeline run.
///
/// Orchestration never returns `Err`; every failure mode lands here as
/// a status plus accumulated error strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    /// Unique id for this run.
    pub run_id: Uuid,
    /// Overall status derived from stage outcomes and gate results.
    pub overall_status: RunStatus,
    /// Results for every stage that ran, in pipeline order.
    pub stage_results: Vec<StageResult>,
    /// Total cost units folded into the budget tracker.
    pub total_cost_units: f64,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run finished.
    pub completed_at: DateTime<Utc>,
    /// Wall-clock duration of the run.
    pub duration_ms: f64,
    /// Run-level error strings: budget stops, gate failures, rejected specs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl PipelineRun {
    /// Looks up a stage result by name.
    #[must_use]
    pub fn stage(&self, name: &str) -> Option<&StageResult> {
        self.stage_results.iter().find(|s| s.stage_name == name)
    }

    /// Returns `true` if the run succeeded without degradation.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.overall_status.is_success()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn stage_result(results: Vec<TaskResult>) -> StageResult {
        let status = if results.iter().all(TaskResult::is_completed) {
            StageStatus::Completed
        } else {
            StageStatus::Failed
        };
        StageResult {
            stage_name: "test".to_string(),
            status,
            task_results: results,
            started_at: Utc::now(),
            completed_at: Utc::now(),
            duration_ms: 0.0,
            errors: Vec::new(),
        }
    }

    #[test]
    fn test_completed_result_has_no_errors() {
        let result = TaskResult::completed(
            "summarize",
            json!({"text": "ok"}),
            TaskMetrics {
                cost_units: 1.5,
                duration_ms: 42.0,
                confidence: Some(0.9),
                sources: vec!["doc-1".to_string()],
            },
        );
        assert!(result.is_completed());
        assert!(result.errors.is_empty());
        assert_eq!(result.metrics.cost_units, 1.5);
    }

    #[test]
    fn test_failed_result_zeroes_metrics_except_duration() {
        let result = TaskResult::failed("summarize", "timeout: no result within 100ms", 315.0);
        assert!(!result.is_completed());
        assert_eq!(result.payload, serde_json::Value::Null);
        assert_eq!(result.metrics.cost_units, 0.0);
        assert_eq!(result.metrics.duration_ms, 315.0);
        assert_eq!(result.metrics.confidence, None);
        assert_eq!(result.errors.len(), 1);
    }

    #[test]
    fn test_completion_ratio() {
        let result = stage_result(vec![
            TaskResult::completed("a", json!(1), TaskMetrics::default()),
            TaskResult::completed("b", json!(2), TaskMetrics::default()),
            TaskResult::failed("c", "boom", 1.0),
            TaskResult::completed("d", json!(4), TaskMetrics::default()),
        ]);
        assert_eq!(result.completed_count(), 3);
        assert_eq!(result.failed_count(), 1);
        assert!((result.completion_ratio() - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn test_completion_ratio_empty_stage_is_one() {
        let result = stage_result(Vec::new());
        assert!((result.completion_ratio() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_total_cost_units_sums_tasks() {
        let fixed = TaskMetrics {
            cost_units: 2.0,
            ..TaskMetrics::default()
        };
        let result = stage_result(vec![
            TaskResult::completed("a", json!(1), fixed.clone()),
            TaskResult::completed("b", json!(2), fixed),
            TaskResult::failed("c", "boom", 1.0),
        ]);
        assert!((result.total_cost_units() - 4.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_task_result_serializes_without_empty_fields() {
        let result = TaskResult::completed("a", json!({"k": 1}), TaskMetrics::default());
        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("errors").is_none());
        assert!(json["metrics"].get("confidence").is_none());
        assert!(json["metrics"].get("sources").is_none());
    }

    #[test]
    fn test_pipeline_run_stage_lookup() {
        let run = PipelineRun {
            run_id: Uuid::new_v4(),
            overall_status: RunStatus::Success,
            stage_results: vec![stage_result(Vec::new())],
            total_cost_units: 0.0,
            started_at: Utc::now(),
            completed_at: Utc::now(),
            duration_ms: 0.0,
            errors: Vec::new(),
        };
        assert!(run.stage("test").is_some());
        assert!(run.stage("missing").is_none());
        assert!(run.is_success());
    }
}
