//! Write-once context shared across stages.
//!
//! Each completed task's payload is recorded under its `(stage, task
//! type)` pair. The store is append-only: recording the same pair twice
//! is a conflict, and later stages never overwrite earlier entries.
//! Oversized payloads are never stored silently clipped; they become an
//! explicit [`StoredPayload::Truncated`] value carrying the original
//! size.
//!
//! Stages read the store through an immutable [`ContextSnapshot`] taken
//! at stage start, which applies the aggregate byte budget oldest-first.

use crate::errors::ContextError;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Byte budgets for stored payloads and snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextLimits {
    /// Budget for a single rendered payload; larger payloads are stored
    /// truncated.
    pub max_entry_bytes: usize,
    /// Budget for the rendered content of a whole snapshot; entries
    /// beyond it are replaced by a single marker.
    pub max_snapshot_bytes: usize,
}

impl Default for ContextLimits {
    fn default() -> Self {
        Self {
            max_entry_bytes: 16 * 1024,
            max_snapshot_bytes: 128 * 1024,
        }
    }
}

/// A recorded payload: either the full value or an explicit truncation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoredPayload {
    /// The payload fit inside the per-entry budget.
    Full {
        /// The recorded value.
        value: serde_json::Value,
    },
    /// The payload exceeded the per-entry budget; only a prefix of its
    /// rendered form is kept.
    Truncated {
        /// The rendered prefix that fit the budget.
        preview: String,
        /// Rendered size of the original payload.
        original_bytes: usize,
    },
}

impl StoredPayload {
    /// Returns `true` if the payload was stored truncated.
    #[must_use]
    pub const fn is_truncated(&self) -> bool {
        matches!(self, Self::Truncated { .. })
    }

    /// Renders the payload as text for snapshot content.
    ///
    /// Truncated payloads always carry a visible marker so recovered
    /// context is never mistaken for the original.
    #[must_use]
    pub fn render(&self) -> String {
        match self {
            Self::Full { value } => value.to_string(),
            Self::Truncated {
                preview,
                original_bytes,
            } => format!("{preview}...[truncated, {original_bytes} bytes total]"),
        }
    }
}

/// One recorded entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextEntry {
    /// The stage that produced the payload.
    pub stage_name: String,
    /// The task type that produced the payload.
    pub task_type_id: String,
    /// The stored payload.
    pub payload: StoredPayload,
}

/// One rendered entry inside a [`ContextSnapshot`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    /// The stage that produced the payload.
    pub stage_name: String,
    /// The task type that produced the payload.
    pub task_type_id: String,
    /// The rendered payload text.
    pub content: String,
}

/// An immutable, budgeted view of the store handed to running tasks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextSnapshot {
    /// Included entries, oldest first.
    pub entries: Vec<SnapshotEntry>,
    /// Number of newer entries dropped by the snapshot byte budget.
    pub omitted_entries: usize,
}

impl ContextSnapshot {
    /// Returns the rendered content for a `(stage, task type)` pair.
    #[must_use]
    pub fn get(&self, stage_name: &str, task_type_id: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.stage_name == stage_name && e.task_type_id == task_type_id)
            .map(|e| e.content.as_str())
    }

    /// Returns all entries recorded by one stage.
    #[must_use]
    pub fn entries_for_stage(&self, stage_name: &str) -> Vec<&SnapshotEntry> {
        self.entries
            .iter()
            .filter(|e| e.stage_name == stage_name)
            .collect()
    }

    /// Returns `true` if the snapshot byte budget dropped entries.
    #[must_use]
    pub const fn is_truncated(&self) -> bool {
        self.omitted_entries > 0
    }

    /// Number of included entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the snapshot holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Renders the whole snapshot as prompt-ready text, one header per
    /// entry, ending with a marker when entries were omitted.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            out.push_str(&format!(
                "## {}/{}\n{}\n\n",
                entry.stage_name, entry.task_type_id, entry.content
            ));
        }
        if self.omitted_entries > 0 {
            out.push_str(&format!(
                "[context truncated: {} later entries omitted]\n",
                self.omitted_entries
            ));
        }
        out
    }
}

/// The write-once context store.
#[derive(Debug, Default)]
pub struct ContextStore {
    limits: ContextLimits,
    entries: RwLock<Vec<ContextEntry>>,
}

impl ContextStore {
    /// Creates an empty store with the given limits.
    #[must_use]
    pub fn new(limits: ContextLimits) -> Self {
        Self {
            limits,
            entries: RwLock::new(Vec::new()),
        }
    }

    /// The limits this store was built with.
    #[must_use]
    pub const fn limits(&self) -> &ContextLimits {
        &self.limits
    }

    /// Records a payload under `(stage, task type)`.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::Conflict`] if the pair was already
    /// recorded; the existing entry is left untouched.
    pub fn record(
        &self,
        stage_name: &str,
        task_type_id: &str,
        payload: serde_json::Value,
    ) -> Result<(), ContextError> {
        let mut entries = self.entries.write();
        if entries
            .iter()
            .any(|e| e.stage_name == stage_name && e.task_type_id == task_type_id)
        {
            return Err(ContextError::Conflict {
                stage: stage_name.to_string(),
                task_type: task_type_id.to_string(),
            });
        }

        let rendered = payload.to_string();
        let stored = if rendered.len() > self.limits.max_entry_bytes {
            tracing::debug!(
                stage = %stage_name,
                task_type = %task_type_id,
                original_bytes = rendered.len(),
                budget = self.limits.max_entry_bytes,
                "payload exceeds entry budget, storing truncated"
            );
            StoredPayload::Truncated {
                preview: truncate_on_boundary(&rendered, self.limits.max_entry_bytes).to_string(),
                original_bytes: rendered.len(),
            }
        } else {
            StoredPayload::Full { value: payload }
        };

        entries.push(ContextEntry {
            stage_name: stage_name.to_string(),
            task_type_id: task_type_id.to_string(),
            payload: stored,
        });
        Ok(())
    }

    /// Returns the stored payload for a `(stage, task type)` pair.
    #[must_use]
    pub fn get(&self, stage_name: &str, task_type_id: &str) -> Option<StoredPayload> {
        self.entries
            .read()
            .iter()
            .find(|e| e.stage_name == stage_name && e.task_type_id == task_type_id)
            .map(|e| e.payload.clone())
    }

    /// Number of recorded entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns `true` if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Takes a budgeted snapshot for the next stage's inputs.
    ///
    /// Entries are included oldest-first until their rendered content
    /// would exceed the snapshot byte budget; the remainder is dropped
    /// and counted in [`ContextSnapshot::omitted_entries`].
    #[must_use]
    pub fn snapshot(&self) -> ContextSnapshot {
        let entries = self.entries.read();
        let mut included = Vec::with_capacity(entries.len());
        let mut used_bytes = 0usize;
        let mut omitted = 0usize;

        for entry in entries.iter() {
            if omitted > 0 {
                omitted += 1;
                continue;
            }
            let content = entry.payload.render();
            if used_bytes + content.len() > self.limits.max_snapshot_bytes {
                omitted += 1;
                continue;
            }
            used_bytes += content.len();
            included.push(SnapshotEntry {
                stage_name: entry.stage_name.clone(),
                task_type_id: entry.task_type_id.clone(),
                content,
            });
        }

        if omitted > 0 {
            tracing::debug!(
                included = included.len(),
                omitted,
                budget = self.limits.max_snapshot_bytes,
                "snapshot hit byte budget"
            );
        }

        ContextSnapshot {
            entries: included,
            omitted_entries: omitted,
        }
    }

    /// Serializes the whole store state.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::Serialization`] if encoding fails.
    pub fn export(&self) -> Result<String, ContextError> {
        serde_json::to_string(&*self.entries.read())
            .map_err(|e| ContextError::Serialization(e.to_string()))
    }

    /// Replaces the store state with previously exported data.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::Serialization`] if the data does not
    /// parse; the existing state is left untouched in that case.
    pub fn import(&self, data: &str) -> Result<(), ContextError> {
        let entries: Vec<ContextEntry> =
            serde_json::from_str(data).map_err(|e| ContextError::Serialization(e.to_string()))?;
        *self.entries.write() = entries;
        Ok(())
    }
}

/// Cuts a string at the largest char boundary not beyond `max` bytes.
fn truncate_on_boundary(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
