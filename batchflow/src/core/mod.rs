//! Core domain model types for batchflow.
//!
//! This module contains the fundamental types used throughout the engine:
//! - Status and criticality enums
//! - Task, stage, and run result types with factory methods
//! - Tolerant payload parsing for unreliable text output

mod payload;
mod result;
mod status;

pub use payload::{parse_payload, ParsedPayload};
pub use result::{PipelineRun, StageResult, TaskMetrics, TaskResult};
pub use status::{Criticality, RunStatus, StageStatus, TaskStatus};
