//! Prometheus textfile export.
//!
//! A run is short-lived, so instead of serving a scrape endpoint the
//! recorder is rendered once at exit and written to a file picked up by
//! the node-exporter textfile collector.

use std::path::PathBuf;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::{info, warn};

use duckform_core::config::MetricsConfig;
use duckform_core::metrics as m;

use crate::error::CliError;

/// Installed recorder plus the file it is flushed to.
pub struct MetricsExport {
    handle: PrometheusHandle,
    path: PathBuf,
}

impl MetricsExport {
    /// Install the global recorder when `metrics.textfile_path` is set.
    ///
    /// Returns `None` when metrics are disabled. Must be called at most
    /// once per process.
    ///
    /// # Errors
    ///
    /// Returns `CliError::Command` if a global recorder is already installed.
    pub fn install(config: &MetricsConfig) -> Result<Option<Self>, CliError> {
        if !config.enabled() {
            return Ok(None);
        }

        let handle = PrometheusBuilder::new()
            .install_recorder()
            .map_err(|e| CliError::Command(format!("failed to install metrics recorder: {e}")))?;
        m::describe_all();

        info!(path = %config.textfile_path, "metrics textfile export enabled");
        Ok(Some(Self {
            handle,
            path: PathBuf::from(&config.textfile_path),
        }))
    }

    /// Render the exposition and write it next to the target, then rename.
    ///
    /// The rename keeps the collector from reading a half-written file.
    pub fn write(&self) -> Result<(), CliError> {
        let rendered = self.handle.render();
        let tmp = self.path.with_extension("prom.tmp");
        std::fs::write(&tmp, rendered)?;
        std::fs::rename(&tmp, &self.path)?;
        info!(path = %self.path.display(), "metrics written");
        Ok(())
    }
}

/// Count one finished command.
pub fn record_run(command: &'static str, result: &'static str) {
    metrics::counter!(
        m::RUNS_TOTAL,
        m::LABEL_COMMAND => command,
        m::LABEL_RESULT => result
    )
    .increment(1);
}

/// Flush metrics if enabled; failures are logged, never fatal.
pub fn flush(export: Option<&MetricsExport>) {
    if let Some(export) = export {
        if let Err(e) = export.write() {
            warn!(error = %e, "failed to write metrics textfile");
        }
    }
}
