//! Prometheus recorder for batch runs.
//!
//! A batch run has no scrape endpoint, so the rendered text exposition is
//! written to a file when the run ends.

use std::path::Path;

use metrics::counter;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::error::{WorkerError, WorkerResult};

/// Metric names as constants for consistency.
pub mod names {
    pub const RUNS_TOTAL: &str = "reel_runs_total";
}

/// Install the Prometheus recorder.
///
/// Fails when a recorder is already installed in this process.
pub fn init_metrics() -> WorkerResult<PrometheusHandle> {
    PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| WorkerError::config_error(format!("metrics recorder: {}", e)))
}

/// Record the outcome of a run.
pub fn record_run(outcome: &'static str) {
    counter!(names::RUNS_TOTAL, "outcome" => outcome).increment(1);
}

/// Write the current text exposition to `path`.
pub async fn write_snapshot(handle: &PrometheusHandle, path: &Path) -> WorkerResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, handle.render()).await?;
    Ok(())
}
