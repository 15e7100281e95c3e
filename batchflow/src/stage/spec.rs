//! Stage declarations.

use crate::core::Criticality;
use crate::errors::SpecError;
use crate::gate::QualityCriterion;
use std::collections::HashSet;

/// Declares one stage: a set of independent task types run together.
///
/// Stages are critical by default; call [`StageSpec::non_critical`] for
/// stages the run can survive without.
#[derive(Debug, Clone)]
pub struct StageSpec {
    /// Unique stage name.
    pub name: String,
    /// Task types to run, in scheduling order.
    pub task_type_ids: Vec<String>,
    /// How this stage's failure affects the rest of the run.
    pub criticality: Criticality,
    /// Maximum tasks in flight at once within the stage.
    pub concurrency_limit: usize,
    /// Criteria appended to the base set when the gate evaluates this
    /// stage.
    pub criteria: Vec<QualityCriterion>,
}

impl StageSpec {
    /// Creates a critical stage with a concurrency limit of 5.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            task_type_ids: Vec::new(),
            criticality: Criticality::Critical,
            concurrency_limit: 5,
            criteria: Vec::new(),
        }
    }

    /// Sets the task types, replacing any previously added.
    #[must_use]
    pub fn with_task_types<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.task_type_ids = ids.into_iter().map(Into::into).collect();
        self
    }

    /// Appends one task type.
    #[must_use]
    pub fn with_task_type(mut self, id: impl Into<String>) -> Self {
        self.task_type_ids.push(id.into());
        self
    }

    /// Sets the criticality.
    #[must_use]
    pub const fn with_criticality(mut self, criticality: Criticality) -> Self {
        self.criticality = criticality;
        self
    }

    /// Marks the stage as survivable: its failure degrades the run
    /// instead of aborting it.
    #[must_use]
    pub const fn non_critical(self) -> Self {
        self.with_criticality(Criticality::NonCritical)
    }

    /// Sets the in-stage concurrency limit.
    #[must_use]
    pub const fn with_concurrency_limit(mut self, concurrency_limit: usize) -> Self {
        self.concurrency_limit = concurrency_limit;
        self
    }

    /// Appends a quality criterion for this stage's gate.
    #[must_use]
    pub fn with_criterion(mut self, criterion: QualityCriterion) -> Self {
        self.criteria.push(criterion);
        self
    }

    /// Validates the spec.
    pub fn validate(&self) -> Result<(), SpecError> {
        if self.name.trim().is_empty() {
            return Err(SpecError::new("stage name cannot be empty"));
        }
        if self.task_type_ids.is_empty() {
            return Err(SpecError::new(format!(
                "stage '{}' declares no task types",
                self.name
            )));
        }
        let mut seen = HashSet::new();
        for id in &self.task_type_ids {
            if !seen.insert(id.as_str()) {
                return Err(SpecError::new(format!(
                    "stage '{}' lists task type '{id}' more than once",
                    self.name
                )));
            }
        }
        if self.concurrency_limit == 0 {
            return Err(SpecError::new(format!(
                "stage '{}' concurrency_limit must be at least 1",
                self.name
            )));
        }
        for criterion in &self.criteria {
            if !(criterion.weight > 0.0 && criterion.weight.is_finite()) {
                return Err(SpecError::new(format!(
                    "stage '{}' criterion '{}' must have a positive finite weight",
                    self.name, criterion.name
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let stage = StageSpec::new("outline").with_task_type("draft");
        assert_eq!(stage.name, "outline");
        assert!(stage.criticality.is_critical());
        assert_eq!(stage.concurrency_limit, 5);
        assert!(stage.criteria.is_empty());
        assert!(stage.validate().is_ok());
    }

    #[test]
    fn test_non_critical_builder() {
        let stage = StageSpec::new("extras").with_task_type("t").non_critical();
        assert!(!stage.criticality.is_critical());
    }

    #[test]
    fn test_empty_name_rejected() {
        let stage = StageSpec::new("  ").with_task_type("t");
        assert!(stage.validate().is_err());
    }

    #[test]
    fn test_no_task_types_rejected() {
        assert!(StageSpec::new("empty").validate().is_err());
    }

    #[test]
    fn test_duplicate_task_types_rejected() {
        let stage = StageSpec::new("dup").with_task_types(["a", "b", "a"]);
        let err = stage.validate().unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let stage = StageSpec::new("s")
            .with_task_type("t")
            .with_concurrency_limit(0);
        assert!(stage.validate().is_err());
    }

    #[test]
    fn test_non_positive_criterion_weight_rejected() {
        let stage = StageSpec::new("s")
            .with_task_type("t")
            .with_criterion(QualityCriterion::sync("bad", 0.0, |_| true));
        assert!(stage.validate().is_err());
    }
}
