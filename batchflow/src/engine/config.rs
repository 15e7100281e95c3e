//! Engine configuration.

use crate::context::ContextLimits;
use crate::errors::SpecError;
use crate::gate::GateConfig;
use crate::limiter::LimiterConfig;
use serde::{Deserialize, Serialize};

/// Tunables for a [`PipelineEngine`](crate::engine::PipelineEngine).
///
/// The defaults suit a single moderately rate-limited provider; callers
/// with stricter quotas should tighten `limiter` and set `budget_cap`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Hard cap on cumulative cost units. `None` disables budget
    /// enforcement entirely.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub budget_cap: Option<f64>,

    /// Fraction of the cap at which a one-time warning is emitted.
    pub budget_warn_ratio: f64,

    /// Rate limiter shared by every task attempt in the run.
    pub limiter: LimiterConfig,

    /// Base backoff applied before the first retry; doubles per retry.
    pub backoff_base_ms: u64,

    /// Quality gate thresholds applied at every stage boundary.
    pub gate: GateConfig,

    /// Byte budgets for the context store.
    pub context_limits: ContextLimits,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            budget_cap: None,
            budget_warn_ratio: 0.8,
            limiter: LimiterConfig::default(),
            backoff_base_ms: 1_000,
            gate: GateConfig::default(),
            context_limits: ContextLimits::default(),
        }
    }
}

impl EngineConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the budget cap in cost units.
    #[must_use]
    pub fn with_budget_cap(mut self, cap: f64) -> Self {
        self.budget_cap = Some(cap);
        self
    }

    /// Sets the warning threshold as a fraction of the cap.
    #[must_use]
    pub const fn with_budget_warn_ratio(mut self, ratio: f64) -> Self {
        self.budget_warn_ratio = ratio;
        self
    }

    /// Sets the rate limiter configuration.
    #[must_use]
    pub const fn with_limiter(mut self, limiter: LimiterConfig) -> Self {
        self.limiter = limiter;
        self
    }

    /// Sets the retry backoff base.
    #[must_use]
    pub const fn with_backoff_base_ms(mut self, backoff_base_ms: u64) -> Self {
        self.backoff_base_ms = backoff_base_ms;
        self
    }

    /// Sets the quality gate configuration.
    #[must_use]
    pub const fn with_gate(mut self, gate: GateConfig) -> Self {
        self.gate = gate;
        self
    }

    /// Sets the context store byte budgets.
    #[must_use]
    pub const fn with_context_limits(mut self, limits: ContextLimits) -> Self {
        self.context_limits = limits;
        self
    }

    /// Checks the configuration for internally inconsistent values.
    ///
    /// # Errors
    ///
    /// Returns a [`SpecError`] describing the first invalid field.
    pub fn validate(&self) -> Result<(), SpecError> {
        if let Some(cap) = self.budget_cap {
            if !cap.is_finite() || cap <= 0.0 {
                return Err(SpecError::new("budget_cap must be positive and finite"));
            }
        }
        if !(0.0..=1.0).contains(&self.budget_warn_ratio) {
            return Err(SpecError::new("budget_warn_ratio must be within 0.0..=1.0"));
        }
        self.limiter.validate()?;
        self.gate.validate()?;
        Ok(())
    }
}
