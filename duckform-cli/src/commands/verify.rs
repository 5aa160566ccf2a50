//! `duckform verify` command handler

use std::io::Write;

use serde::Serialize;
use tracing::info;

use duckform_core::config::DuckformConfig;
use duckform_core::identity::{RunIdentity, RunNames};
use duckform_probe::{ProbeRunner, RunReport};

use crate::cli::SuffixArgs;
use crate::commands::plan_with_token;
use crate::error::CliError;
use crate::metrics_export::record_run;
use crate::output::{OutputWriter, Render, write_report};

/// Execute the `verify` command.
///
/// Runs the probes of an existing deployment; nothing is applied or destroyed.
pub async fn execute(
    args: SuffixArgs,
    config: &DuckformConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let (plan, credentials) = plan_with_token(config, RunIdentity::from_suffix(args.suffix))?;
    let probes = ProbeRunner::from_config(config, &credentials)?;

    info!(suffix = args.suffix, probes = plan.expectations.len(), "verifying existing run");
    let report = probes.run(&plan.expectations).await;

    let verify = VerifyReport {
        passed: report.passed(),
        names: plan.names,
        report,
    };
    record_run("verify", if verify.passed { "passed" } else { "verification_failed" });

    writer.render(&verify)?;

    if !verify.passed {
        let counts = verify.report.counts();
        return Err(CliError::Verification(format!(
            "{} failed, {} fatal, {} not run",
            counts.failed, counts.fatal, counts.not_run
        )));
    }
    Ok(())
}

/// Probe results for an existing run.
#[derive(Serialize)]
pub struct VerifyReport {
    pub passed: bool,
    pub names: RunNames,
    pub report: RunReport,
}

impl Render for VerifyReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Verify run {}", self.names.suffix.to_string().bold())?;
        writeln!(w)?;
        write_report(w, &self.report)?;
        if self.passed {
            writeln!(w, "Verdict: {}", "passed".green().bold())
        } else {
            writeln!(w, "Verdict: {}", "failed".red().bold())
        }
    }
}
