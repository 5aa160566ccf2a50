//! `duckform destroy` command handler

use std::io::Write;
use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use duckform_core::config::DuckformConfig;
use duckform_core::identity::{RunIdentity, RunNames};
use duckform_terraform::{CommandTerraform, ProvisionDriver, Teardown, TerraformOptions};

use crate::cli::SuffixArgs;
use crate::commands::plan_with_token;
use crate::error::CliError;
use crate::metrics_export::record_run;
use crate::output::{OutputWriter, Render, write_teardown};

/// Execute the `destroy` command.
///
/// Tears down the resources of a run that was kept or whose teardown failed.
/// The variables are rebuilt from the suffix, so the same config must be used.
pub async fn execute(
    args: SuffixArgs,
    config: &DuckformConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let (plan, _credentials) = plan_with_token(config, RunIdentity::from_suffix(args.suffix))?;
    let options = TerraformOptions::from_config(&config.terraform, plan.inputs.clone())?;
    let terraform_dir = options.dir.display().to_string();
    let mut driver = ProvisionDriver::new(Arc::new(CommandTerraform::new()), options);

    info!(suffix = args.suffix, dir = %terraform_dir, "destroying earlier run");
    let teardown = driver.teardown().await;
    record_run(
        "destroy",
        if teardown.is_clean() { "destroyed" } else { "failed" },
    );

    let report = DestroyReport {
        names: plan.names,
        terraform_dir,
        teardown,
    };
    writer.render(&report)?;

    match report.teardown {
        Teardown::Failed { reason } => Err(CliError::Provision(reason)),
        _ => Ok(()),
    }
}

/// Result of tearing down an earlier run.
#[derive(Serialize)]
pub struct DestroyReport {
    pub names: RunNames,
    pub terraform_dir: String,
    pub teardown: Teardown,
}

impl Render for DestroyReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(
            w,
            "Destroy run {} (terraform dir: {})",
            self.names.suffix.to_string().bold(),
            self.terraform_dir
        )?;
        write_teardown(w, &self.teardown)
    }
}
