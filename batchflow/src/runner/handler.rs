//! The work-function seam between the engine and the external resource.

use crate::context::ContextSnapshot;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// The input handed to a work function.
#[derive(Debug, Clone)]
pub struct TaskInput {
    /// The task type being run.
    pub task_type_id: String,
    /// The stage the task runs in.
    pub stage_name: String,
    /// Read-only context recorded by earlier stages, taken at stage
    /// start.
    pub context: Arc<ContextSnapshot>,
}

/// The output of one successful work function call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkOutput {
    /// The structured payload produced by the call.
    pub payload: serde_json::Value,
    /// Cost units consumed by the call.
    pub cost_units: f64,
    /// Optional confidence in `0..=1`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    /// Optional provenance identifiers.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<String>,
}

impl WorkOutput {
    /// Creates an output with zero cost and no provenance.
    #[must_use]
    pub fn new(payload: serde_json::Value) -> Self {
        Self {
            payload,
            cost_units: 0.0,
            confidence: None,
            sources: Vec::new(),
        }
    }

    /// Sets the cost units consumed.
    #[must_use]
    pub const fn with_cost_units(mut self, cost_units: f64) -> Self {
        self.cost_units = cost_units;
        self
    }

    /// Sets the reported confidence.
    #[must_use]
    pub const fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    /// Sets the provenance identifiers.
    #[must_use]
    pub fn with_sources(mut self, sources: Vec<String>) -> Self {
        self.sources = sources;
        self
    }
}

/// A unit of work against the external resource.
///
/// Handlers are registered once per task type and shared across all
/// stages and attempts, so implementations hold their own state behind
/// interior mutability if they need any.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    /// Cheap input validation run before any attempt.
    ///
    /// A rejection fails the task immediately: no rate limiter slot is
    /// consumed, no attempt starts, and nothing is retried.
    fn validate(&self, input: &TaskInput) -> Result<(), String> {
        let _ = input;
        Ok(())
    }

    /// Performs one attempt of the actual work.
    ///
    /// Called up to `max_retries + 1` times; each call races the task's
    /// timeout and must be safe to invoke again after a failure.
    async fn run(&self, input: &TaskInput) -> anyhow::Result<WorkOutput>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct EchoHandler;

    #[async_trait]
    impl TaskHandler for EchoHandler {
        async fn run(&self, input: &TaskInput) -> anyhow::Result<WorkOutput> {
            Ok(WorkOutput::new(json!({"task": input.task_type_id})).with_cost_units(1.0))
        }
    }

    fn input(task: &str) -> TaskInput {
        TaskInput {
            task_type_id: task.to_string(),
            stage_name: "stage".to_string(),
            context: Arc::new(ContextSnapshot::default()),
        }
    }

    #[tokio::test]
    async fn test_default_validate_accepts() {
        let handler = EchoHandler;
        assert!(handler.validate(&input("echo")).is_ok());
    }

    #[tokio::test]
    async fn test_handler_sees_input() {
        let handler = EchoHandler;
        let output = handler.run(&input("echo")).await.unwrap();
        assert_eq!(output.payload, json!({"task": "echo"}));
        assert_eq!(output.cost_units, 1.0);
    }

    #[test]
    fn test_work_output_builders() {
        let output = WorkOutput::new(json!(null))
            .with_cost_units(2.5)
            .with_confidence(0.8)
            .with_sources(vec!["doc-1".to_string()]);
        assert_eq!(output.cost_units, 2.5);
        assert_eq!(output.confidence, Some(0.8));
        assert_eq!(output.sources, vec!["doc-1".to_string()]);
    }
}
