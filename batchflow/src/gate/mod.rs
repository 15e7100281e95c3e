//! Weighted quality gates evaluated at stage boundaries.
//!
//! After a stage settles, the gate scores it against the base criteria
//! plus any criteria the stage spec appended. The score is
//! `10 * passed_weight / total_weight`; the gate passes only when every
//! `required` criterion passed *and* the score meets the pass
//! threshold. What a failed gate means for the run is the engine's
//! decision, driven by stage criticality.

mod criteria;

pub use criteria::{base_criteria, CriterionCheck, FnCriterion, QualityCriterion};

use crate::core::StageResult;
use crate::errors::SpecError;
use serde::{Deserialize, Serialize};

/// Configuration for gate evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GateConfig {
    /// Minimum score, on the 0 to 10 scale, for a gate to pass.
    pub pass_threshold: f64,
    /// Minimum completion ratio demanded by the base criteria.
    pub min_completion_ratio: f64,
    /// Stage duration ceiling demanded by the base criteria.
    pub max_stage_duration_ms: u64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            pass_threshold: 7.0,
            min_completion_ratio: 0.8,
            max_stage_duration_ms: 300_000,
        }
    }
}

impl GateConfig {
    /// Validates the config.
    pub fn validate(&self) -> Result<(), SpecError> {
        if !(0.0..=10.0).contains(&self.pass_threshold) {
            return Err(SpecError::new("gate pass_threshold must be within 0..=10"));
        }
        if !(0.0..=1.0).contains(&self.min_completion_ratio) {
            return Err(SpecError::new(
                "gate min_completion_ratio must be within 0..=1",
            ));
        }
        if self.max_stage_duration_ms == 0 {
            return Err(SpecError::new("gate max_stage_duration_ms must be positive"));
        }
        Ok(())
    }
}

/// The recorded outcome of a single criterion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CriterionOutcome {
    /// Criterion name.
    pub name: String,
    /// The criterion's weight.
    pub weight: f64,
    /// Whether the criterion was required.
    pub required: bool,
    /// Whether the check passed.
    pub passed: bool,
}

/// The result of evaluating a quality gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityGateResult {
    /// The stage that was evaluated.
    pub stage_name: String,
    /// Whether the gate passed.
    pub passed: bool,
    /// The weighted score on the 0 to 10 scale.
    pub score: f64,
    /// The threshold the score was compared against.
    pub threshold: f64,
    /// Per-criterion outcomes in evaluation order.
    pub outcomes: Vec<CriterionOutcome>,
}

impl QualityGateResult {
    /// Names of required criteria that failed.
    #[must_use]
    pub fn failed_required(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| o.required && !o.passed)
            .map(|o| o.name.as_str())
            .collect()
    }
}

/// Evaluates quality criteria against settled stages.
#[derive(Debug, Clone)]
pub struct QualityGate {
    config: GateConfig,
}

impl QualityGate {
    /// Creates a gate from a config.
    #[must_use]
    pub const fn new(config: GateConfig) -> Self {
        Self { config }
    }

    /// The config this gate was built from.
    #[must_use]
    pub const fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Scores a settled stage against the given criteria.
    ///
    /// An empty criteria list scores a perfect 10 and passes.
    pub async fn evaluate(
        &self,
        result: &StageResult,
        criteria: &[QualityCriterion],
    ) -> QualityGateResult {
        if criteria.is_empty() {
            return QualityGateResult {
                stage_name: result.stage_name.clone(),
                passed: true,
                score: 10.0,
                threshold: self.config.pass_threshold,
                outcomes: Vec::new(),
            };
        }

        let mut outcomes = Vec::with_capacity(criteria.len());
        let mut total_weight = 0.0;
        let mut passed_weight = 0.0;
        let mut required_failed = false;

        for criterion in criteria {
            let passed = criterion.passes(result).await;
            total_weight += criterion.weight;
            if passed {
                passed_weight += criterion.weight;
            } else if criterion.required {
                required_failed = true;
            }
            outcomes.push(CriterionOutcome {
                name: criterion.name.clone(),
                weight: criterion.weight,
                required: criterion.required,
                passed,
            });
        }

        let score = if total_weight > 0.0 {
            10.0 * passed_weight / total_weight
        } else {
            10.0
        };
        let passed = !required_failed && score >= self.config.pass_threshold;

        tracing::debug!(
            stage = %result.stage_name,
            score,
            threshold = self.config.pass_threshold,
            passed,
            "quality gate evaluated"
        );

        QualityGateResult {
            stage_name: result.stage_name.clone(),
            passed,
            score,
            threshold: self.config.pass_threshold,
            outcomes,
        }
    }
}
