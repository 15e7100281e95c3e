//! Scripted task handlers with call counters.

use crate::runner::{TaskHandler, TaskInput, WorkOutput};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::time::Duration;

/// Always succeeds with a fixed payload.
#[derive(Debug)]
pub struct FixedHandler {
    payload: Value,
    cost_units: f64,
    confidence: Option<f64>,
    sources: Vec<String>,
    delay_ms: u64,
    calls: AtomicU32,
}

impl FixedHandler {
    /// Creates a handler returning the given payload at zero cost.
    #[must_use]
    pub const fn new(payload: Value) -> Self {
        Self {
            payload,
            cost_units: 0.0,
            confidence: None,
            sources: Vec::new(),
            delay_ms: 0,
            calls: AtomicU32::new(0),
        }
    }

    /// Sets the cost units reported per call.
    #[must_use]
    pub const fn with_cost_units(mut self, cost_units: f64) -> Self {
        self.cost_units = cost_units;
        self
    }

    /// Sets the confidence reported per call.
    #[must_use]
    pub const fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    /// Sets the sources reported per call.
    #[must_use]
    pub fn with_sources(mut self, sources: Vec<String>) -> Self {
        self.sources = sources;
        self
    }

    /// Adds a simulated work delay per call.
    #[must_use]
    pub const fn with_delay_ms(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    /// Number of times `run` was called.
    #[must_use]
    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TaskHandler for FixedHandler {
    async fn run(&self, _input: &TaskInput) -> anyhow::Result<WorkOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
        }
        let mut output = WorkOutput::new(self.payload.clone()).with_cost_units(self.cost_units);
        if let Some(confidence) = self.confidence {
            output = output.with_confidence(confidence);
        }
        Ok(output.with_sources(self.sources.clone()))
    }
}

/// Fails the first `failures` calls, then succeeds.
#[derive(Debug)]
pub struct FlakyHandler {
    failures: u32,
    payload: Value,
    cost_units: f64,
    calls: AtomicU32,
}

impl FlakyHandler {
    /// Creates a handler that fails `failures` times before succeeding.
    #[must_use]
    pub const fn new(failures: u32, payload: Value) -> Self {
        Self {
            failures,
            payload,
            cost_units: 0.0,
            calls: AtomicU32::new(0),
        }
    }

    /// Sets the cost units reported by the successful call.
    #[must_use]
    pub const fn with_cost_units(mut self, cost_units: f64) -> Self {
        self.cost_units = cost_units;
        self
    }

    /// Number of times `run` was called.
    #[must_use]
    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TaskHandler for FlakyHandler {
    async fn run(&self, _input: &TaskInput) -> anyhow::Result<WorkOutput> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= self.failures {
            return Err(anyhow::anyhow!("simulated transient failure {call}"));
        }
        Ok(WorkOutput::new(self.payload.clone()).with_cost_units(self.cost_units))
    }
}

/// Always fails with a fixed message.
#[derive(Debug)]
pub struct FailingHandler {
    message: String,
    calls: AtomicU32,
}

impl FailingHandler {
    /// Creates a handler that always fails with the given message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            calls: AtomicU32::new(0),
        }
    }

    /// Number of times `run` was called.
    #[must_use]
    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TaskHandler for FailingHandler {
    async fn run(&self, _input: &TaskInput) -> anyhow::Result<WorkOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(anyhow::anyhow!("{}", self.message))
    }
}

/// Sleeps before answering, to provoke timeouts.
#[derive(Debug)]
pub struct HangingHandler {
    sleep_ms: u64,
    payload: Value,
    only_first: bool,
    calls: AtomicU32,
}

impl HangingHandler {
    /// Creates a handler that sleeps `sleep_ms` before succeeding.
    #[must_use]
    pub const fn new(sleep_ms: u64, payload: Value) -> Self {
        Self {
            sleep_ms,
            payload,
            only_first: false,
            calls: AtomicU32::new(0),
        }
    }

    /// Only the first call hangs; later calls answer immediately.
    #[must_use]
    pub const fn only_first(mut self) -> Self {
        self.only_first = true;
        self
    }

    /// Number of times `run` was called.
    #[must_use]
    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TaskHandler for HangingHandler {
    async fn run(&self, _input: &TaskInput) -> anyhow::Result<WorkOutput> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.only_first || call == 1 {
            tokio::time::sleep(Duration::from_millis(self.sleep_ms)).await;
        }
        Ok(WorkOutput::new(self.payload.clone()))
    }
}

/// Panics instead of answering.
#[derive(Debug)]
pub struct PanickingHandler {
    message: String,
    payload: Value,
    only_first: bool,
    calls: AtomicU32,
}

impl PanickingHandler {
    /// Creates a handler that panics with the given message.
    #[must_use]
    pub fn new(message: impl Into<String>, payload: Value) -> Self {
        Self {
            message: message.into(),
            payload,
            only_first: false,
            calls: AtomicU32::new(0),
        }
    }

    /// Only the first call panics; later calls succeed.
    #[must_use]
    pub const fn only_first(mut self) -> Self {
        self.only_first = true;
        self
    }

    /// Number of times `run` was called.
    #[must_use]
    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TaskHandler for PanickingHandler {
    async fn run(&self, _input: &TaskInput) -> anyhow::Result<WorkOutput> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.only_first || call == 1 {
            panic!("simulated panic: {}", self.message);
        }
        Ok(WorkOutput::new(self.payload.clone()))
    }
}

/// Rejects every input during validation; `run` is never reached.
#[derive(Debug)]
pub struct RejectingHandler {
    reason: String,
    calls: AtomicU32,
}

impl RejectingHandler {
    /// Creates a handler whose validation always fails.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            calls: AtomicU32::new(0),
        }
    }

    /// Number of times `run` was called. Stays zero when the runner
    /// honors validation.
    #[must_use]
    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TaskHandler for RejectingHandler {
    fn validate(&self, _input: &TaskInput) -> Result<(), String> {
        Err(self.reason.clone())
    }

    async fn run(&self, _input: &TaskInput) -> anyhow::Result<WorkOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(anyhow::anyhow!("run called despite rejected validation"))
    }
}
