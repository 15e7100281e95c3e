//! Pipeline orchestration.
//!
//! [`PipelineEngine`] runs stages strictly in sequence. At each stage
//! boundary it folds the stage's cost into the budget, checks the cap,
//! evaluates the quality gate, and records completed payloads into the
//! context store for later stages to read. Fatal conditions (a budget
//! breach or a critical stage failing its gate) stop the remaining
//! stages, but they are reported through the returned [`PipelineRun`];
//! [`orchestrate`](PipelineEngine::orchestrate) itself never fails.

mod config;

pub use config::EngineConfig;

use crate::budget::BudgetTracker;
use crate::context::ContextStore;
use crate::core::{PipelineRun, RunStatus, StageResult};
use crate::errors::{PipelineError, SpecError};
use crate::events::{EventSink, NoOpEventSink};
use crate::gate::{base_criteria, QualityGate};
use crate::limiter::RateLimiter;
use crate::runner::{PreparedTask, TaskRegistry, TaskRunner};
use crate::stage::{StageRunner, StageSpec};
use chrono::{DateTime, Utc};
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::time::Instant;
use uuid::Uuid;

/// Orchestrates registered task types through a sequence of stages.
pub struct PipelineEngine {
    config: EngineConfig,
    registry: Arc<TaskRegistry>,
    limiter: Arc<RateLimiter>,
    budget: Arc<BudgetTracker>,
    store: Arc<ContextStore>,
    gate: QualityGate,
    events: Arc<dyn EventSink>,
}

impl std::fmt::Debug for PipelineEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineEngine")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl PipelineEngine {
    /// Creates an engine over `registry` with components built from
    /// `config`.
    #[must_use]
    pub fn new(config: EngineConfig, registry: Arc<TaskRegistry>) -> Self {
        let limiter = Arc::new(RateLimiter::new(config.limiter));
        let budget = Arc::new(BudgetTracker::new(config.budget_cap));
        let store = Arc::new(ContextStore::new(config.context_limits));
        let gate = QualityGate::new(config.gate);
        Self {
            config,
            registry,
            limiter,
            budget,
            store,
            gate,
            events: Arc::new(NoOpEventSink),
        }
    }

    /// Replaces the event sink. The default sink discards everything.
    #[must_use]
    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Shares a rate limiter with other engines calling the same
    /// provider.
    #[must_use]
    pub fn with_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = limiter;
        self
    }

    /// Shares a budget tracker, e.g. one cap spanning several runs.
    #[must_use]
    pub fn with_budget(mut self, budget: Arc<BudgetTracker>) -> Self {
        self.budget = budget;
        self
    }

    /// Replaces the context store, e.g. one restored via
    /// [`ContextStore::import`].
    #[must_use]
    pub fn with_context_store(mut self, store: Arc<ContextStore>) -> Self {
        self.store = store;
        self
    }

    /// Returns the engine configuration.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Returns the budget tracker.
    #[must_use]
    pub fn budget(&self) -> Arc<BudgetTracker> {
        Arc::clone(&self.budget)
    }

    /// Returns the context store.
    #[must_use]
    pub fn context_store(&self) -> Arc<ContextStore> {
        Arc::clone(&self.store)
    }

    /// Runs `stages` in order and returns the full run record.
    ///
    /// Never returns an error: plan validation failures, budget
    /// breaches and gate aborts all land in the returned run's status
    /// and `errors`.
    pub async fn orchestrate(&self, stages: &[StageSpec]) -> PipelineRun {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let started = Instant::now();

        self.events.try_emit(
            "run.started",
            Some(json!({ "run_id": run_id, "stages": stages.len() })),
        );
        tracing::info!(%run_id, stages = stages.len(), "pipeline run started");

        let mut stage_results: Vec<StageResult> = Vec::new();
        let mut run_errors: Vec<String> = Vec::new();

        // Reject a bad plan before any task spends money.
        let resolved = match self.resolve(stages) {
            Ok(resolved) => resolved,
            Err(err) => {
                tracing::error!(%run_id, error = %err, "run rejected before execution");
                self.events.try_emit(
                    "run.aborted",
                    Some(json!({ "run_id": run_id, "reason": err.to_string() })),
                );
                run_errors.push(err.to_string());
                return self.finish(run_id, RunStatus::Failed, stage_results, run_errors, started_at, started);
            }
        };

        let runner = TaskRunner::new(Arc::clone(&self.limiter))
            .with_backoff_base_ms(self.config.backoff_base_ms);
        let stage_runner = StageRunner::new(runner);

        let mut critical_stage_failed = false;
        let mut degraded = false;
        let mut aborted = false;
        let mut budget_warned = false;

        for (stage, tasks) in stages.iter().zip(resolved) {
            self.events.try_emit(
                "stage.started",
                Some(json!({ "run_id": run_id, "stage": stage.name, "tasks": tasks.len() })),
            );

            let result = stage_runner.run(stage, &tasks, &self.store).await;

            let stage_cost = result.total_cost_units();
            let spent = self.budget.add(stage_cost);

            self.events.try_emit(
                "stage.completed",
                Some(json!({
                    "run_id": run_id,
                    "stage": result.stage_name,
                    "status": result.status,
                    "completed": result.completed_count(),
                    "failed": result.failed_count(),
                    "cost_units": stage_cost,
                    "duration_ms": result.duration_ms,
                })),
            );

            if !result.is_completed() {
                if stage.criticality.is_critical() {
                    critical_stage_failed = true;
                } else {
                    degraded = true;
                }
            }

            // Budget boundary. The stage that caused the overage keeps
            // its results; nothing after it runs.
            if self.budget.is_over_cap() {
                let cap = self.budget.cap().unwrap_or(0.0);
                let err = PipelineError::BudgetExceeded { spent, cap };
                tracing::error!(%run_id, stage = %stage.name, spent, cap, "budget cap breached, stopping run");
                self.events.try_emit(
                    "budget.exceeded",
                    Some(json!({ "run_id": run_id, "stage": stage.name, "spent": spent, "cap": cap })),
                );
                run_errors.push(err.to_string());
                stage_results.push(result);
                aborted = true;
                break;
            }

            if !budget_warned {
                if let Some(percent) = self.budget.percent_used() {
                    if percent >= self.config.budget_warn_ratio * 100.0 {
                        tracing::warn!(%run_id, percent_used = percent, "budget warning threshold crossed");
                        self.events.try_emit(
                            "budget.warning",
                            Some(json!({ "run_id": run_id, "stage": stage.name, "percent_used": percent })),
                        );
                        budget_warned = true;
                    }
                }
            }

            let mut criteria = base_criteria(self.gate.config());
            criteria.extend(stage.criteria.iter().cloned());
            let gate_result = self.gate.evaluate(&result, &criteria).await;

            self.events.try_emit(
                "gate.evaluated",
                Some(json!({
                    "run_id": run_id,
                    "stage": stage.name,
                    "passed": gate_result.passed,
                    "score": gate_result.score,
                    "threshold": gate_result.threshold,
                })),
            );

            if gate_result.passed {
                self.record_outputs(&result);
            } else if stage.criticality.is_critical() {
                let err = PipelineError::GateFailed {
                    stage: stage.name.clone(),
                    score: gate_result.score,
                    threshold: gate_result.threshold,
                };
                tracing::error!(
                    %run_id,
                    stage = %stage.name,
                    score = gate_result.score,
                    threshold = gate_result.threshold,
                    "critical stage failed its quality gate, aborting run"
                );
                self.events.try_emit(
                    "run.aborted",
                    Some(json!({
                        "run_id": run_id,
                        "stage": stage.name,
                        "reason": "gate_failed",
                        "score": gate_result.score,
                    })),
                );
                run_errors.push(err.to_string());
                stage_results.push(result);
                aborted = true;
                break;
            } else {
                let err = PipelineError::GateFailed {
                    stage: stage.name.clone(),
                    score: gate_result.score,
                    threshold: gate_result.threshold,
                };
                tracing::warn!(
                    stage = %stage.name,
                    score = gate_result.score,
                    "non-critical stage failed its quality gate, continuing degraded"
                );
                run_errors.push(err.to_string());
                degraded = true;
                // Later stages still read whatever this stage produced.
                self.record_outputs(&result);
            }

            stage_results.push(result);
        }

        let overall = if aborted || critical_stage_failed {
            RunStatus::Failed
        } else if degraded {
            RunStatus::Partial
        } else {
            RunStatus::Success
        };

        self.finish(run_id, overall, stage_results, run_errors, started_at, started)
    }

    /// Validates the plan and resolves every task type upfront, so an
    /// unknown type is caught before any stage runs.
    fn resolve(&self, stages: &[StageSpec]) -> Result<Vec<Vec<PreparedTask>>, PipelineError> {
        self.config.validate()?;
        let mut seen = HashSet::new();
        let mut resolved = Vec::with_capacity(stages.len());
        for stage in stages {
            stage.validate()?;
            if !seen.insert(stage.name.clone()) {
                return Err(SpecError::new(format!("duplicate stage name '{}'", stage.name)).into());
            }
            let mut tasks = Vec::with_capacity(stage.task_type_ids.len());
            for type_id in &stage.task_type_ids {
                match self.registry.resolve(type_id) {
                    Some(prepared) => tasks.push(prepared),
                    None => {
                        return Err(PipelineError::UnknownTaskType {
                            stage: stage.name.clone(),
                            type_id: type_id.clone(),
                        });
                    }
                }
            }
            resolved.push(tasks);
        }
        Ok(resolved)
    }

    /// Copies a settled stage's completed payloads into the context
    /// store. Conflicts are logged and skipped; the first write wins.
    fn record_outputs(&self, result: &StageResult) {
        for task in &result.task_results {
            if !task.is_completed() {
                continue;
            }
            if let Err(err) =
                self.store
                    .record(&result.stage_name, &task.task_type_id, task.payload.clone())
            {
                tracing::warn!(
                    stage = %result.stage_name,
                    task_type = %task.task_type_id,
                    error = %err,
                    "context entry not recorded"
                );
            }
        }
    }

    fn finish(
        &self,
        run_id: Uuid,
        overall_status: RunStatus,
        stage_results: Vec<StageResult>,
        errors: Vec<String>,
        started_at: DateTime<Utc>,
        started: Instant,
    ) -> PipelineRun {
        let duration_ms = started.elapsed().as_secs_f64() * 1000.0;
        let total_cost_units: f64 = stage_results.iter().map(StageResult::total_cost_units).sum();

        self.events.try_emit(
            "run.completed",
            Some(json!({
                "run_id": run_id,
                "status": overall_status,
                "total_cost_units": total_cost_units,
                "duration_ms": duration_ms,
            })),
        );
        tracing::info!(
            %run_id,
            status = %overall_status,
            total_cost_units,
            duration_ms,
            "pipeline run finished"
        );

        PipelineRun {
            run_id,
            overall_status,
            stage_results,
            total_cost_units,
            started_at,
            completed_at: Utc::now(),
            duration_ms,
            errors,
        }
    }
}
