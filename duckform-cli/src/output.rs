//! Output formatting abstraction for text vs JSON rendering
//!
//! All subcommand output flows through [`OutputWriter`] which handles format switching.
//! This keeps format-specific logic out of command handlers entirely.

use std::io::Write;

use colored::{ColoredString, Colorize};
use serde::Serialize;

use duckform_core::types::{Expectation, ProbeOutcome, ProbeRecord};
use duckform_probe::RunReport;
use duckform_terraform::Teardown;

use crate::cli::OutputFormat;
use crate::error::CliError;

/// Abstraction for writing CLI output in different formats.
///
/// Subcommand handlers call `writer.render(&payload)` where `payload`
/// implements both `Serialize` (for JSON) and `Render` (for text).
pub struct OutputWriter {
    format: OutputFormat,
}

impl OutputWriter {
    /// Create a new output writer with the specified format.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use duckform_cli::output::OutputWriter;
    /// use duckform_cli::cli::OutputFormat;
    ///
    /// let writer = OutputWriter::new(OutputFormat::Text);
    /// ```
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Render a payload to stdout.
    pub fn render<T: Render + Serialize>(&self, payload: &T) -> Result<(), CliError> {
        let stdout = std::io::stdout();
        let mut handle = stdout.lock();
        self.render_to(&mut handle, payload)
    }

    /// Render a payload to an arbitrary writer.
    ///
    /// For `Text` format, delegates to `Render::render_text()`.
    /// For `Json` format, serialises via `serde_json`.
    pub fn render_to<T: Render + Serialize>(
        &self,
        w: &mut dyn Write,
        payload: &T,
    ) -> Result<(), CliError> {
        match self.format {
            OutputFormat::Text => {
                payload.render_text(w)?;
            }
            OutputFormat::Json => {
                serde_json::to_writer_pretty(&mut *w, payload)?;
                writeln!(w)?;
            }
        }
        Ok(())
    }
}

/// Trait for human-readable text rendering.
///
/// Implemented by every CLI output payload alongside `serde::Serialize`.
pub trait Render {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()>;
}

/// Coloured fixed-width label for a probe outcome.
pub fn outcome_label(outcome: &ProbeOutcome) -> ColoredString {
    match outcome {
        ProbeOutcome::Passed => "PASS".green().bold(),
        ProbeOutcome::Skipped { .. } => "SKIP".yellow().bold(),
        ProbeOutcome::Failed { .. } => "FAIL".red().bold(),
        ProbeOutcome::Fatal { .. } => "ABRT".red().bold(),
    }
}

/// `kind identifier` plus the parent resource when there is one.
pub fn describe_expectation(expectation: &Expectation) -> String {
    match &expectation.parent {
        Some(parent) => format!(
            "{:<9} {} ({})",
            expectation.kind.as_str(),
            expectation.identifier,
            parent
        ),
        None => format!(
            "{:<9} {}",
            expectation.kind.as_str(),
            expectation.identifier
        ),
    }
}

fn write_record(w: &mut dyn Write, record: &ProbeRecord) -> std::io::Result<()> {
    writeln!(
        w,
        "  [{}] {} {}",
        outcome_label(&record.outcome),
        describe_expectation(&record.expectation),
        format!("{}ms", record.elapsed.as_millis()).dimmed()
    )?;
    match &record.outcome {
        ProbeOutcome::Skipped { reason } | ProbeOutcome::Fatal { reason } => {
            writeln!(w, "         {}", reason.dimmed())?;
        }
        ProbeOutcome::Failed { reason, raw } => {
            writeln!(w, "         {}", reason.red())?;
            if !raw.is_empty() {
                for line in raw.lines() {
                    writeln!(w, "         | {}", line.dimmed())?;
                }
            }
        }
        ProbeOutcome::Passed => {}
    }
    Ok(())
}

/// Probe table followed by a one-line tally.
pub fn write_report(w: &mut dyn Write, report: &RunReport) -> std::io::Result<()> {
    for record in &report.records {
        write_record(w, record)?;
    }
    for expectation in &report.not_run {
        writeln!(
            w,
            "  [{}] {}",
            "----".dimmed(),
            describe_expectation(expectation)
        )?;
    }

    let counts = report.counts();
    writeln!(w)?;
    writeln!(
        w,
        "Probes: {} passed, {} skipped, {} failed, {} fatal, {} not run",
        counts.passed, counts.skipped, counts.failed, counts.fatal, counts.not_run
    )?;
    Ok(())
}

/// One line describing the teardown result.
pub fn write_teardown(w: &mut dyn Write, teardown: &Teardown) -> std::io::Result<()> {
    match teardown {
        Teardown::Destroyed => writeln!(w, "Teardown: {}", "destroyed".green()),
        Teardown::Failed { reason } => {
            writeln!(w, "Teardown: {}", "FAILED".red().bold())?;
            writeln!(w, "  {}", reason.red())
        }
        Teardown::Kept => writeln!(
            w,
            "Teardown: {} (resources left in place)",
            "kept".yellow().bold()
        ),
    }
}
