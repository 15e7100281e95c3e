//! The task type registry: the engine's dispatch table.

use super::handler::TaskHandler;
use super::TaskSpec;
use crate::errors::SpecError;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A task spec resolved together with its handler, ready to run.
#[derive(Clone)]
pub struct PreparedTask {
    /// The registered spec.
    pub spec: TaskSpec,
    /// The registered handler.
    pub handler: Arc<dyn TaskHandler>,
}

impl fmt::Debug for PreparedTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreparedTask")
            .field("spec", &self.spec)
            .finish_non_exhaustive()
    }
}

/// Maps task type ids to their spec and handler.
///
/// Stages reference task types by id only; the engine resolves every
/// id through the registry before the first stage starts, so a
/// dangling reference rejects the whole run up front.
#[derive(Default)]
pub struct TaskRegistry {
    entries: RwLock<HashMap<String, PreparedTask>>,
}

impl TaskRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a task type.
    ///
    /// # Errors
    ///
    /// Returns a [`SpecError`] if the spec is invalid or the type id is
    /// already registered. Re-registering under the same id is rejected
    /// rather than silently replacing the handler.
    pub fn register(&self, spec: TaskSpec, handler: Arc<dyn TaskHandler>) -> Result<(), SpecError> {
        spec.validate()?;
        let mut entries = self.entries.write();
        if entries.contains_key(&spec.type_id) {
            return Err(SpecError::new(format!(
                "task type '{}' is already registered",
                spec.type_id
            )));
        }
        entries.insert(spec.type_id.clone(), PreparedTask { spec, handler });
        Ok(())
    }

    /// Resolves a type id to its spec and handler.
    #[must_use]
    pub fn resolve(&self, type_id: &str) -> Option<PreparedTask> {
        self.entries.read().get(type_id).cloned()
    }

    /// Returns `true` if the type id is registered.
    #[must_use]
    pub fn contains(&self, type_id: &str) -> bool {
        self.entries.read().contains_key(type_id)
    }

    /// Registered type ids, sorted for stable output.
    #[must_use]
    pub fn type_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.entries.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Number of registered task types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl fmt::Debug for TaskRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskRegistry")
            .field("type_ids", &self.type_ids())
            .finish()
    }
}
