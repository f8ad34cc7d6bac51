//! Metric sinks for training diagnostics.
//!
//! A [`TrainStepReport`] is flattened into named scalar streams by
//! [`record_train_step`]; sinks decide where the streams go.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::metrics::diagnostics::{summarize, TrainStepReport};

/// Sink for named scalar metrics.
pub trait MetricsSink: Send {
    /// Record one scalar under `name` at training iteration `step`.
    fn record(&mut self, name: &str, value: f64, step: usize);

    /// Flush any buffered output.
    fn flush(&mut self);
}

/// Console sink, optionally restricted to name prefixes.
pub struct ConsoleSink {
    prefixes: Vec<String>,
}

impl ConsoleSink {
    /// Create a sink that prints every record.
    pub fn new() -> Self {
        Self {
            prefixes: Vec::new(),
        }
    }

    /// Only print names starting with `prefix`. Filters accumulate
    /// across calls.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefixes.push(prefix.into());
        self
    }
}

impl Default for ConsoleSink {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsSink for ConsoleSink {
    fn record(&mut self, name: &str, value: f64, step: usize) {
        if self.prefixes.is_empty() || self.prefixes.iter().any(|p| name.starts_with(p.as_str())) {
            println!("{:>6}  {:<42} {:>14.6}", step, name, value);
        }
    }

    fn flush(&mut self) {
        // stdout is typically line-buffered, so nothing to do
    }
}

/// Long-format CSV sink: one `step,metric,value` row per record.
pub struct CsvSink {
    writer: BufWriter<File>,
}

impl CsvSink {
    /// Create the file at `path` and write the header row.
    pub fn new(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        writeln!(writer, "step,metric,value")?;
        Ok(Self { writer })
    }
}

impl MetricsSink for CsvSink {
    fn record(&mut self, name: &str, value: f64, step: usize) {
        let _ = writeln!(self.writer, "{},{},{}", step, name, value);
    }

    fn flush(&mut self) {
        let _ = self.writer.flush();
    }
}

impl Drop for CsvSink {
    fn drop(&mut self) {
        self.flush();
    }
}

/// In-memory sink for tests and programmatic inspection.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Vec<(String, f64, usize)>,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// All records in insertion order as `(name, value, step)`.
    pub fn records(&self) -> &[(String, f64, usize)] {
        &self.records
    }

    /// Values recorded under `name`, in insertion order.
    pub fn values_for(&self, name: &str) -> Vec<f64> {
        self.records
            .iter()
            .filter(|(n, _, _)| n == name)
            .map(|(_, v, _)| *v)
            .collect()
    }
}

impl MetricsSink for MemorySink {
    fn record(&mut self, name: &str, value: f64, step: usize) {
        self.records.push((name.to_string(), value, step));
    }

    fn flush(&mut self) {}
}

/// Fan-out sink that forwards to multiple backends.
pub struct MultiSink {
    sinks: Vec<Box<dyn MetricsSink>>,
}

impl MultiSink {
    /// Create an empty multi-sink.
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    /// Add a backend.
    pub fn add<S: MetricsSink + 'static>(mut self, sink: S) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }
}

impl Default for MultiSink {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsSink for MultiSink {
    fn record(&mut self, name: &str, value: f64, step: usize) {
        for sink in &mut self.sinks {
            sink.record(name, value, step);
        }
    }

    fn flush(&mut self) {
        for sink in &mut self.sinks {
            sink.flush();
        }
    }
}

/// Flatten a [`TrainStepReport`] into named scalars on `sink`.
///
/// Stream names follow a fixed schema: headline return statistics under
/// `*Return/train`, per-sub-iteration engine diagnostics under
/// `{alpha,delta,time_vpg,time_npg,surr_improvement,kl_dist}/sub_iteration_{i}`,
/// estimator loss summaries under `{Mean,Max,Min}{Key}/sub_iteration_{i}`,
/// and per-dimension exploration noise under `PolicyStd/std_{i}`.
pub fn record_train_step(sink: &mut dyn MetricsSink, report: &TrainStepReport) {
    let step = report.iteration;

    sink.record("MeanReturn/train", report.returns.mean, step);
    sink.record("MinReturn/train", report.returns.min, step);
    sink.record("MaxReturn/train", report.returns.max, step);
    sink.record("StdReturn/train", report.returns.std, step);

    sink.record("BufferSize", report.buffer_size as f64, step);
    sink.record("Time/BellmanUpdate", report.bellman_time, step);
    sink.record("Time/PolicyUpdate", report.policy_update_time, step);

    let mut total_means = Vec::new();
    let mut bellman_means = Vec::new();
    let mut recon_means = Vec::new();
    let mut reward_means = Vec::new();
    for (i, sub) in report.sub_iterations.iter().enumerate() {
        let d = &sub.diagnostics;
        sink.record(&format!("alpha/sub_iteration_{}", i), d.alpha, step);
        sink.record(&format!("delta/sub_iteration_{}", i), d.step_size, step);
        sink.record(&format!("time_vpg/sub_iteration_{}", i), d.grad_time, step);
        sink.record(
            &format!("time_npg/sub_iteration_{}", i),
            d.natural_grad_time,
            step,
        );
        sink.record(
            &format!("surr_improvement/sub_iteration_{}", i),
            d.surrogate_improvement(),
            step,
        );
        sink.record(&format!("kl_dist/sub_iteration_{}", i), d.kl_divergence, step);

        total_means.push(record_loss_column(
            sink,
            "TotalLoss",
            i,
            step,
            &sub.losses.total_losses,
        ));
        bellman_means.push(record_loss_column(
            sink,
            "BellmanLoss",
            i,
            step,
            &sub.losses.bellman_losses,
        ));
        recon_means.push(record_loss_column(
            sink,
            "ReconstructionLoss",
            i,
            step,
            &sub.losses.reconstruction_losses,
        ));
        reward_means.push(record_loss_column(
            sink,
            "RewardLoss",
            i,
            step,
            &sub.losses.reward_losses,
        ));
    }

    sink.record("MeanTotalLoss/mean", summarize(&total_means).mean, step);
    sink.record("MeanBellmanLoss/mean", summarize(&bellman_means).mean, step);
    sink.record(
        "MeanReconstructionLoss/mean",
        summarize(&recon_means).mean,
        step,
    );
    sink.record("MeanRewardLoss/mean", summarize(&reward_means).mean, step);

    for (i, std) in report.exploration_std.iter().enumerate() {
        sink.record(&format!("PolicyStd/std_{}", i), *std, step);
    }

    if let Some(check) = &report.q_check {
        sink.record("QFunctionMCMSE_single", check.single_step_mse, step);
        sink.record("QFunctionMCMSE_end", check.start_end_mse, step);
    }
}

fn record_loss_column(
    sink: &mut dyn MetricsSink,
    key: &str,
    sub_iteration: usize,
    step: usize,
    values: &[f64],
) -> f64 {
    let stats = summarize(values);
    sink.record(
        &format!("Mean{}/sub_iteration_{}", key, sub_iteration),
        stats.mean,
        step,
    );
    sink.record(
        &format!("Max{}/sub_iteration_{}", key, sub_iteration),
        stats.max,
        step,
    );
    sink.record(
        &format!("Min{}/sub_iteration_{}", key, sub_iteration),
        stats.min,
        step,
    );
    stats.mean
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ReturnSummary;
    use crate::estimator::BellmanReport;
    use crate::metrics::diagnostics::{QFunctionCheck, StepDiagnostics, SubIterationStats};
    use std::fs;
    use tempfile::tempdir;

    fn sample_report() -> TrainStepReport {
        let diagnostics = StepDiagnostics {
            alpha: 0.1,
            step_size: 0.01,
            grad_time: 0.2,
            natural_grad_time: 0.3,
            surr_before: -0.5,
            surr_after: -0.2,
            kl_divergence: 0.004,
        };
        let losses = BellmanReport {
            total_losses: vec![4.0, 2.0],
            bellman_losses: vec![3.0, 1.0],
            reconstruction_losses: vec![0.5, 0.5],
            reward_losses: vec![0.5, 0.5],
            elapsed_secs: 0.1,
        };
        TrainStepReport {
            iteration: 7,
            returns: ReturnSummary {
                mean: 10.0,
                std: 2.0,
                min: 6.0,
                max: 13.0,
            },
            sub_iterations: vec![
                SubIterationStats {
                    diagnostics,
                    losses: losses.clone(),
                },
                SubIterationStats { diagnostics, losses },
            ],
            buffer_size: 512,
            bellman_time: 0.2,
            policy_update_time: 0.4,
            exploration_std: vec![1.0, 0.5],
            q_check: Some(QFunctionCheck {
                single_step_mse: 0.25,
                start_end_mse: 1.5,
            }),
        }
    }

    #[test]
    fn test_memory_sink_values_for() {
        let mut sink = MemorySink::new();
        sink.record("a", 1.0, 0);
        sink.record("b", 2.0, 0);
        sink.record("a", 3.0, 1);

        assert_eq!(sink.values_for("a"), vec![1.0, 3.0]);
        assert_eq!(sink.values_for("b"), vec![2.0]);
        assert_eq!(sink.records().len(), 3);
    }

    #[test]
    fn test_record_train_step_stream_names() {
        let mut sink = MemorySink::new();
        record_train_step(&mut sink, &sample_report());

        assert_eq!(sink.values_for("MeanReturn/train"), vec![10.0]);
        assert_eq!(sink.values_for("BufferSize"), vec![512.0]);
        assert_eq!(sink.values_for("alpha/sub_iteration_0"), vec![0.1]);
        assert_eq!(sink.values_for("alpha/sub_iteration_1"), vec![0.1]);
        assert_eq!(sink.values_for("delta/sub_iteration_0"), vec![0.01]);
        assert_eq!(sink.values_for("kl_dist/sub_iteration_1"), vec![0.004]);
        assert_eq!(sink.values_for("MeanTotalLoss/sub_iteration_0"), vec![3.0]);
        assert_eq!(sink.values_for("MaxTotalLoss/sub_iteration_0"), vec![4.0]);
        assert_eq!(sink.values_for("MinBellmanLoss/sub_iteration_1"), vec![1.0]);
        assert_eq!(sink.values_for("MeanTotalLoss/mean"), vec![3.0]);
        assert_eq!(sink.values_for("PolicyStd/std_0"), vec![1.0]);
        assert_eq!(sink.values_for("PolicyStd/std_1"), vec![0.5]);
        assert_eq!(sink.values_for("QFunctionMCMSE_single"), vec![0.25]);
        assert_eq!(sink.values_for("QFunctionMCMSE_end"), vec![1.5]);

        let improvement = sink.values_for("surr_improvement/sub_iteration_0");
        assert!((improvement[0] - 0.3).abs() < 1e-12);

        // every record carries the iteration index
        assert!(sink.records().iter().all(|(_, _, step)| *step == 7));
    }

    #[test]
    fn test_record_train_step_without_q_check() {
        let mut report = sample_report();
        report.q_check = None;

        let mut sink = MemorySink::new();
        record_train_step(&mut sink, &report);
        assert!(sink.values_for("QFunctionMCMSE_single").is_empty());
        assert!(sink.values_for("QFunctionMCMSE_end").is_empty());
    }

    #[test]
    fn test_csv_sink_writes_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("metrics.csv");

        {
            let mut sink = CsvSink::new(&path).unwrap();
            sink.record("MeanReturn/train", 1.5, 0);
            sink.record("MeanReturn/train", 2.5, 1);
        }

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines[0], "step,metric,value");
        assert_eq!(lines[1], "0,MeanReturn/train,1.5");
        assert_eq!(lines[2], "1,MeanReturn/train,2.5");
    }

    #[test]
    fn test_multi_sink_fan_out() {
        let mut multi = MultiSink::new()
            .add(ConsoleSink::new().with_prefix("MeanReturn"))
            .add(MemorySink::new());
        record_train_step(&mut multi, &sample_report());
        multi.flush();
    }
}
