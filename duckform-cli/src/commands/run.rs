//! `duckform run` command handler

use std::sync::Arc;

use tracing::warn;

use duckform_core::config::DuckformConfig;
use duckform_core::identity::RunIdentity;
use duckform_probe::ProbeRunner;
use duckform_terraform::{CommandTerraform, ProvisionDriver, TerraformOptions};

use crate::cli::RunArgs;
use crate::commands::plan_with_token;
use crate::error::CliError;
use crate::metrics_export::record_run;
use crate::output::OutputWriter;
use crate::suite::run_suite;

/// Execute the `run` command.
///
/// Applies the module, runs every probe and destroys, unless `--keep`.
pub async fn execute(
    args: RunArgs,
    config: &DuckformConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let identity = args
        .suffix
        .map(RunIdentity::from_suffix)
        .unwrap_or_else(RunIdentity::now);
    let (plan, credentials) = plan_with_token(config, identity)?;

    let options = TerraformOptions::from_config(&config.terraform, plan.inputs.clone())?;
    let driver = ProvisionDriver::new(Arc::new(CommandTerraform::new()), options);
    let probes = ProbeRunner::from_config(config, &credentials)?;

    if args.keep {
        warn!("--keep is for debugging only; resources will not be destroyed");
    }

    let summary = run_suite(driver, probes, &plan, args.keep).await;
    record_run("run", summary.verdict.as_str());

    writer.render(&summary)?;
    summary.into_result()
}
