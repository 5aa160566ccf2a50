//! End-to-end acceptance sequence
//!
//! Applies the module once, hands the ordered expectations to the probe
//! runner, and destroys on every exit path. The provisioning verdict and
//! the teardown result are reported side by side; a failed destroy never
//! replaces the verification verdict.

use std::io::Write;

use serde::Serialize;
use tracing::{error, info, warn};

use duckform_core::identity::RunNames;
use duckform_core::plan::RunPlan;
use duckform_probe::{ManagementApi, ProbeRunner, RunReport, SqlClient};
use duckform_terraform::{ProvisionDriver, Teardown, TerraformRunner};

use crate::error::CliError;
use crate::output::{Render, write_report, write_teardown};

/// Final verdict of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Apply succeeded and no probe failed.
    Passed,
    /// Apply succeeded but a probe failed or aborted.
    VerificationFailed,
    /// Init or apply failed; no probe ran.
    ProvisionFailed,
}

impl Verdict {
    /// Label used in metrics and text output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::VerificationFailed => "verification_failed",
            Self::ProvisionFailed => "provision_failed",
        }
    }
}

/// Everything `duckform run` reports.
#[derive(Debug, Serialize)]
pub struct SuiteSummary {
    pub verdict: Verdict,
    pub names: RunNames,
    pub terraform_dir: String,
    /// Provisioning error, when apply failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Probe report, when apply succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<RunReport>,
    pub teardown: Teardown,
}

impl SuiteSummary {
    fn new(
        plan: &RunPlan,
        terraform_dir: String,
        outcome: Result<RunReport, String>,
        teardown: Teardown,
    ) -> Self {
        let (verdict, error, report) = match outcome {
            Ok(report) if report.passed() => (Verdict::Passed, None, Some(report)),
            Ok(report) => (Verdict::VerificationFailed, None, Some(report)),
            Err(e) => (Verdict::ProvisionFailed, Some(e), None),
        };
        Self {
            verdict,
            names: plan.names.clone(),
            terraform_dir,
            error,
            report,
            teardown,
        }
    }

    /// Map the verdict to the command result.
    pub fn into_result(self) -> Result<(), CliError> {
        match self.verdict {
            Verdict::Passed => Ok(()),
            Verdict::VerificationFailed => {
                let counts = self.report.map(|r| r.counts()).unwrap_or_default();
                Err(CliError::Verification(format!(
                    "{} failed, {} fatal, {} not run",
                    counts.failed, counts.fatal, counts.not_run
                )))
            }
            Verdict::ProvisionFailed => Err(CliError::Provision(
                self.error.unwrap_or_else(|| "apply failed".to_owned()),
            )),
        }
    }
}

impl Render for SuiteSummary {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(
            w,
            "Run {} (terraform dir: {})",
            self.names.suffix.to_string().bold(),
            self.terraform_dir
        )?;
        writeln!(w)?;

        if let Some(error) = &self.error {
            writeln!(w, "Provisioning: {}", "FAILED".red().bold())?;
            for line in error.lines() {
                writeln!(w, "  {}", line.red())?;
            }
        }
        if let Some(report) = &self.report {
            write_report(w, report)?;
        }

        write_teardown(w, &self.teardown)?;

        let verdict = match self.verdict {
            Verdict::Passed => self.verdict.as_str().green().bold(),
            _ => self.verdict.as_str().red().bold(),
        };
        writeln!(w, "Verdict: {}", verdict)?;
        Ok(())
    }
}

/// Apply, verify and destroy.
///
/// With `keep` the resources are left in place after verification, and
/// also when apply fails.
pub async fn run_suite<R, S, A>(
    driver: ProvisionDriver<R>,
    probes: ProbeRunner<S, A>,
    plan: &RunPlan,
    keep: bool,
) -> SuiteSummary
where
    R: TerraformRunner,
    S: SqlClient,
    A: ManagementApi,
{
    let terraform_dir = driver.options().dir.display().to_string();
    info!(
        suffix = plan.identity.suffix(),
        database = %plan.names.database,
        dir = %terraform_dir,
        probes = plan.expectations.len(),
        "starting acceptance run"
    );

    if keep {
        return run_kept(driver, probes, plan, terraform_dir).await;
    }

    let expectations = plan.expectations.clone();
    let scoped = driver
        .scoped(move || async move { Ok(probes.run(&expectations).await) })
        .await;

    if !scoped.teardown.is_clean() {
        error!(
            suffix = plan.identity.suffix(),
            "teardown failed; run `duckform destroy --suffix {}` to clean up",
            plan.identity.suffix()
        );
    }

    let outcome = scoped.result.map_err(|e| e.to_string());
    SuiteSummary::new(plan, terraform_dir, outcome, scoped.teardown)
}

async fn run_kept<R, S, A>(
    mut driver: ProvisionDriver<R>,
    probes: ProbeRunner<S, A>,
    plan: &RunPlan,
    terraform_dir: String,
) -> SuiteSummary
where
    R: TerraformRunner,
    S: SqlClient,
    A: ManagementApi,
{
    let outcome = match driver.apply().await {
        Ok(()) => Ok(probes.run(&plan.expectations).await),
        Err(e) => {
            error!(error = %e, output = ?e.output(), "provisioning failed");
            Err(e.to_string())
        }
    };

    warn!(
        suffix = plan.identity.suffix(),
        "--keep set, resources left in place; run `duckform destroy --suffix {}` when done",
        plan.identity.suffix()
    );
    SuiteSummary::new(plan, terraform_dir, outcome, Teardown::Kept)
}
