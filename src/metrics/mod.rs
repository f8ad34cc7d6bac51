//! Training diagnostics and metric sinks.
//!
//! ## Diagnostics
//!
//! - [`StepDiagnostics`]: One natural-gradient sub-iteration
//! - [`TrainStepReport`]: Everything one `train_step` call produced
//! - [`QFunctionCheck`]: Q-function quality against Monte-Carlo rollouts
//!
//! ## Sinks
//!
//! - [`ConsoleSink`]: Printed scalar streams, with optional prefix filters
//! - [`CsvSink`]: Long-format CSV file output
//! - [`MemorySink`]: In-memory capture for tests and inspection
//! - [`MultiSink`]: Combine multiple sinks

pub mod diagnostics;
pub mod sink;

pub use diagnostics::{
    summarize, QFunctionCheck, StatSummary, StepDiagnostics, SubIterationStats, TrainStepReport,
};
pub use sink::{record_train_step, ConsoleSink, CsvSink, MemorySink, MetricsSink, MultiSink};
