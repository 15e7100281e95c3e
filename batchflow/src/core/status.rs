//! Status and criticality enums for tasks, stages, and whole runs.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The terminal status of a single task.
///
/// A task settles exactly once: either an attempt produced output, or
/// the retry allowance was exhausted (including validation rejections,
/// which fail without consuming any attempt).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// An attempt produced output.
    Completed,
    /// All attempts failed, or validation rejected the input.
    Failed,
}

impl TaskStatus {
    /// Returns `true` if the task produced output.
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// The terminal status of a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// Every task in the stage completed.
    Completed,
    /// At least one task failed after exhausting its retries.
    Failed,
}

impl StageStatus {
    /// Returns `true` if every task completed.
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// The overall status of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every stage completed and every quality gate passed.
    Success,
    /// A non-critical stage failed or its gate failed; critical stages
    /// all held.
    Partial,
    /// A critical stage failed, a critical gate failed, the budget cap
    /// was exceeded, or the run was rejected up front.
    Failed,
}

impl RunStatus {
    /// Returns `true` if the run completed without any degradation.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Returns `true` if the run produced usable output, possibly degraded.
    #[must_use]
    pub const fn is_usable(&self) -> bool {
        matches!(self, Self::Success | Self::Partial)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Partial => write!(f, "partial"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// How a stage's failure affects the rest of the run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criticality {
    /// Failure of this stage aborts the run.
    #[default]
    Critical,
    /// Failure of this stage degrades the run to partial.
    NonCritical,
}

impl Criticality {
    /// Returns `true` for [`Criticality::Critical`].
    #[must_use]
    pub const fn is_critical(&self) -> bool {
        matches!(self, Self::Critical)
    }
}

impl fmt::Display for Criticality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Critical => write!(f, "critical"),
            Self::NonCritical => write!(f, "non_critical"),
        }
    }
}
