//! Observability events.
//!
//! The engine reports progress through an [`EventSink`] handed to it at
//! construction. There is no process-global sink registry: two engines
//! in one process can report to different sinks, and tests observe a
//! run by injecting a [`CollectingEventSink`].
//!
//! Events emitted by the engine:
//! - `run.started`, `run.completed`, `run.aborted`
//! - `stage.started`, `stage.completed`
//! - `budget.warning`, `budget.exceeded`
//! - `gate.evaluated`

use async_trait::async_trait;
use tracing::{debug, info, warn, Level};

/// Trait for event sinks that receive engine progress events.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Emits an event asynchronously.
    async fn emit(&self, name: &str, data: Option<serde_json::Value>);

    /// Emits an event without blocking.
    ///
    /// Must never fail; sinks swallow their own errors.
    fn try_emit(&self, name: &str, data: Option<serde_json::Value>);
}

/// A sink that discards all events. The default when none is injected.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

#[async_trait]
impl EventSink for NoOpEventSink {
    async fn emit(&self, _name: &str, _data: Option<serde_json::Value>) {}

    fn try_emit(&self, _name: &str, _data: Option<serde_json::Value>) {}
}

/// A sink that forwards events to the tracing framework.
#[derive(Debug, Clone)]
pub struct LoggingEventSink {
    level: Level,
}

impl Default for LoggingEventSink {
    fn default() -> Self {
        Self { level: Level::INFO }
    }
}

impl LoggingEventSink {
    /// Creates a logging sink at the given level.
    #[must_use]
    pub const fn new(level: Level) -> Self {
        Self { level }
    }

    /// Creates a debug-level logging sink.
    #[must_use]
    pub const fn debug() -> Self {
        Self::new(Level::DEBUG)
    }

    fn log(&self, name: &str, data: &Option<serde_json::Value>) {
        match self.level {
            Level::DEBUG | Level::TRACE => debug!(event = %name, data = ?data, "pipeline event"),
            Level::WARN | Level::ERROR => warn!(event = %name, data = ?data, "pipeline event"),
            _ => info!(event = %name, data = ?data, "pipeline event"),
        }
    }
}

#[async_trait]
impl EventSink for LoggingEventSink {
    async fn emit(&self, name: &str, data: Option<serde_json::Value>) {
        self.log(name, &data);
    }

    fn try_emit(&self, name: &str, data: Option<serde_json::Value>) {
        self.log(name, &data);
    }
}

/// An event captured by a [`CollectingEventSink`].
#[derive(Debug, Clone)]
pub struct SinkEvent {
    /// The event name, e.g. `stage.completed`.
    pub name: String,
    /// Structured event data, if any.
    pub data: Option<serde_json::Value>,
}

/// A sink that records events in memory, for tests and inspection.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: parking_lot::RwLock<Vec<SinkEvent>>,
}

impl CollectingEventSink {
    /// Creates an empty collecting sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected events in emission order.
    #[must_use]
    pub fn events(&self) -> Vec<SinkEvent> {
        self.events.read().clone()
    }

    /// Returns just the event names, in emission order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.events.read().iter().map(|e| e.name.clone()).collect()
    }

    /// Returns events whose name starts with the given prefix.
    #[must_use]
    pub fn events_with_prefix(&self, prefix: &str) -> Vec<SinkEvent> {
        self.events
            .read()
            .iter()
            .filter(|e| e.name.starts_with(prefix))
            .cloned()
            .collect()
    }

    /// Number of collected events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Returns `true` if nothing has been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// Discards all collected events.
    pub fn clear(&self) {
        self.events.write().clear();
    }

    fn push(&self, name: &str, data: Option<serde_json::Value>) {
        self.events.write().push(SinkEvent {
            name: name.to_string(),
            data,
        });
    }
}

#[async_trait]
impl EventSink for CollectingEventSink {
    async fn emit(&self, name: &str, data: Option<serde_json::Value>) {
        self.push(name, data);
    }

    fn try_emit(&self, name: &str, data: Option<serde_json::Value>) {
        self.push(name, data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_noop_sink_discards() {
        let sink = NoOpEventSink;
        sink.emit("run.started", None).await;
        sink.try_emit("run.completed", Some(json!({"status": "success"})));
    }

    #[tokio::test]
    async fn test_collecting_sink_preserves_order() {
        let sink = CollectingEventSink::new();
        assert!(sink.is_empty());

        sink.emit("run.started", None).await;
        sink.try_emit("stage.started", Some(json!({"stage": "outline"})));
        sink.try_emit("stage.completed", Some(json!({"stage": "outline"})));

        assert_eq!(sink.len(), 3);
        assert_eq!(
            sink.names(),
            vec!["run.started", "stage.started", "stage.completed"]
        );
    }

    #[tokio::test]
    async fn test_collecting_sink_prefix_filter() {
        let sink = CollectingEventSink::new();
        sink.emit("stage.started", None).await;
        sink.emit("stage.completed", None).await;
        sink.emit("budget.warning", None).await;

        assert_eq!(sink.events_with_prefix("stage.").len(), 2);
        assert_eq!(sink.events_with_prefix("budget.").len(), 1);
    }

    #[tokio::test]
    async fn test_collecting_sink_clear() {
        let sink = CollectingEventSink::new();
        sink.emit("run.started", None).await;
        sink.clear();
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn test_logging_sink_does_not_panic() {
        let sink = LoggingEventSink::debug();
        sink.emit("run.started", Some(json!({"stages": 2}))).await;
        sink.try_emit("run.completed", None);
    }
}
