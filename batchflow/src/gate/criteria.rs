//! Quality criteria evaluated against a settled stage.

use super::GateConfig;
use crate::core::StageResult;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// A check applied to a settled stage result.
///
/// Checks never see in-flight state; the gate runs after the whole
/// stage has settled.
#[async_trait]
pub trait CriterionCheck: Send + Sync {
    /// Returns `true` if the stage satisfies this criterion.
    async fn check(&self, result: &StageResult) -> bool;
}

/// Wraps a synchronous predicate as a [`CriterionCheck`].
pub struct FnCriterion<F>
where
    F: Fn(&StageResult) -> bool + Send + Sync,
{
    predicate: F,
}

impl<F> FnCriterion<F>
where
    F: Fn(&StageResult) -> bool + Send + Sync,
{
    /// Creates a check from a predicate.
    pub const fn new(predicate: F) -> Self {
        Self { predicate }
    }
}

#[async_trait]
impl<F> CriterionCheck for FnCriterion<F>
where
    F: Fn(&StageResult) -> bool + Send + Sync,
{
    async fn check(&self, result: &StageResult) -> bool {
        (self.predicate)(result)
    }
}

/// A named, weighted quality criterion.
///
/// `required` criteria veto the gate on their own; the rest contribute
/// their weight to the score.
#[derive(Clone)]
pub struct QualityCriterion {
    /// Criterion name, used in outcomes and logs.
    pub name: String,
    /// Positive weight contributed to the score when the check passes.
    pub weight: f64,
    /// Whether a failure vetoes the gate regardless of score.
    pub required: bool,
    check: Arc<dyn CriterionCheck>,
}

impl QualityCriterion {
    /// Creates a criterion from any check.
    #[must_use]
    pub fn new(name: impl Into<String>, weight: f64, check: Arc<dyn CriterionCheck>) -> Self {
        Self {
            name: name.into(),
            weight,
            required: false,
            check,
        }
    }

    /// Creates a criterion from a synchronous predicate.
    #[must_use]
    pub fn sync<F>(name: impl Into<String>, weight: f64, predicate: F) -> Self
    where
        F: Fn(&StageResult) -> bool + Send + Sync + 'static,
    {
        Self::new(name, weight, Arc::new(FnCriterion::new(predicate)))
    }

    /// Marks the criterion as required.
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Runs the check against a settled stage.
    pub async fn passes(&self, result: &StageResult) -> bool {
        self.check.check(result).await
    }
}

impl fmt::Debug for QualityCriterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QualityCriterion")
            .field("name", &self.name)
            .field("weight", &self.weight)
            .field("required", &self.required)
            .finish_non_exhaustive()
    }
}

/// The base criteria applied to every stage.
///
/// Stage specs append their own criteria to this set.
#[must_use]
pub fn base_criteria(config: &GateConfig) -> Vec<QualityCriterion> {
    let min_ratio = config.min_completion_ratio;
    let max_ms = config.max_stage_duration_ms as f64;
    vec![
        QualityCriterion::sync("completion_ratio", 3.0, move |r| {
            r.completion_ratio() >= min_ratio
        })
        .required(),
        QualityCriterion::sync("zero_stage_errors", 2.0, |r| r.errors.is_empty()),
        QualityCriterion::sync("payloads_non_null", 3.0, |r| {
            r.task_results
                .iter()
                .filter(|t| t.is_completed())
                .all(|t| !t.payload.is_null())
        }),
        QualityCriterion::sync("duration_under_ceiling", 2.0, move |r| {
            r.duration_ms <= max_ms
        }),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{StageStatus, TaskMetrics, TaskResult};
    use chrono::Utc;
    use serde_json::json;

    fn settled_stage(task_results: Vec<TaskResult>, duration_ms: f64) -> StageResult {
        let status = if task_results.iter().all(TaskResult::is_completed) {
            StageStatus::Completed
        } else {
            StageStatus::Failed
        };
        let errors = task_results
            .iter()
            .filter(|r| !r.is_completed())
            .map(|r| format!("{}: {}", r.task_type_id, r.errors.join("; ")))
            .collect();
        StageResult {
            stage_name: "test".to_string(),
            status,
            task_results,
            started_at: Utc::now(),
            completed_at: Utc::now(),
            duration_ms,
            errors,
        }
    }

    #[tokio::test]
    async fn test_sync_criterion_runs_predicate() {
        let criterion = QualityCriterion::sync("has_tasks", 1.0, |r| !r.task_results.is_empty());
        let empty = settled_stage(Vec::new(), 0.0);
        assert!(!criterion.passes(&empty).await);

        let nonempty = settled_stage(
            vec![TaskResult::completed("a", json!(1), TaskMetrics::default())],
            0.0,
        );
        assert!(criterion.passes(&nonempty).await);
    }

    #[tokio::test]
    async fn test_base_completion_ratio_boundary() {
        let config = GateConfig::default();
        let criteria = base_criteria(&config);
        let completion = &criteria[0];
        assert_eq!(completion.name, "completion_ratio");
        assert!(completion.required);

        // 4 of 5 completed is exactly the 0.8 default and passes.
        let mut tasks = vec![TaskResult::failed("e", "boom", 1.0)];
        for name in ["a", "b", "c", "d"] {
            tasks.push(TaskResult::completed(name, json!(1), TaskMetrics::default()));
        }
        assert!(completion.passes(&settled_stage(tasks, 0.0)).await);

        // 3 of 5 does not.
        let mut tasks = vec![
            TaskResult::failed("d", "boom", 1.0),
            TaskResult::failed("e", "boom", 1.0),
        ];
        for name in ["a", "b", "c"] {
            tasks.push(TaskResult::completed(name, json!(1), TaskMetrics::default()));
        }
        assert!(!completion.passes(&settled_stage(tasks, 0.0)).await);
    }

    #[tokio::test]
    async fn test_base_zero_stage_errors() {
        let criteria = base_criteria(&GateConfig::default());
        let zero_errors = &criteria[1];
        assert_eq!(zero_errors.name, "zero_stage_errors");

        let clean = settled_stage(
            vec![TaskResult::completed("a", json!(1), TaskMetrics::default())],
            0.0,
        );
        assert!(zero_errors.passes(&clean).await);

        let failed = settled_stage(vec![TaskResult::failed("a", "boom", 1.0)], 0.0);
        assert!(!zero_errors.passes(&failed).await);
    }

    #[tokio::test]
    async fn test_base_payloads_non_null_catches_null_completed_payload() {
        let criteria = base_criteria(&GateConfig::default());
        let non_null = &criteria[2];
        assert_eq!(non_null.name, "payloads_non_null");

        // A completed task that reported a null payload trips the check.
        let sneaky = settled_stage(
            vec![TaskResult::completed(
                "a",
                serde_json::Value::Null,
                TaskMetrics::default(),
            )],
            0.0,
        );
        assert!(!non_null.passes(&sneaky).await);

        // Failed tasks have null payloads by construction and are not
        // double-counted here.
        let failed = settled_stage(vec![TaskResult::failed("a", "boom", 1.0)], 0.0);
        assert!(non_null.passes(&failed).await);
    }

    #[tokio::test]
    async fn test_base_duration_ceiling() {
        let config = GateConfig {
            max_stage_duration_ms: 1000,
            ..GateConfig::default()
        };
        let criteria = base_criteria(&config);
        let duration = &criteria[3];
        assert_eq!(duration.name, "duration_under_ceiling");

        assert!(duration.passes(&settled_stage(Vec::new(), 1000.0)).await);
        assert!(!duration.passes(&settled_stage(Vec::new(), 1000.1)).await);
    }

    #[tokio::test]
    async fn test_async_check_implementations_work() {
        struct SlowCheck;

        #[async_trait]
        impl CriterionCheck for SlowCheck {
            async fn check(&self, result: &StageResult) -> bool {
                tokio::task::yield_now().await;
                result.task_results.is_empty()
            }
        }

        let criterion = QualityCriterion::new("slow", 1.0, Arc::new(SlowCheck));
        assert!(criterion.passes(&settled_stage(Vec::new(), 0.0)).await);
    }
}
