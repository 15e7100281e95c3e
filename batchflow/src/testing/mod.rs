//! Test utilities: scripted task handlers and logging setup.
//!
//! The handlers here stand in for real work functions in tests,
//! examples, and benchmarks. Each one counts its calls so assertions
//! can check exactly how often the engine invoked it.

mod handlers;

pub use handlers::{
    FailingHandler, FixedHandler, FlakyHandler, HangingHandler, PanickingHandler, RejectingHandler,
};

/// Initializes a compact tracing subscriber honoring `RUST_LOG`.
///
/// Safe to call from every test; only the first call installs a
/// subscriber.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .compact()
        .try_init();
}
