//! `duckform names` command handler

use std::collections::BTreeMap;
use std::io::Write;

use serde::Serialize;

use duckform_core::config::DuckformConfig;
use duckform_core::credentials::{Credentials, SecretToken};
use duckform_core::identity::{RunIdentity, RunNames};
use duckform_core::plan::RunPlan;
use duckform_core::types::Expectation;

use crate::cli::NamesArgs;
use crate::error::CliError;
use crate::output::{OutputWriter, Render, describe_expectation};

/// Execute the `names` command.
///
/// Works without a token; secret variables are always redacted.
pub async fn execute(
    args: NamesArgs,
    config: &DuckformConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let identity = args
        .suffix
        .map(RunIdentity::from_suffix)
        .unwrap_or_else(RunIdentity::now);
    let report = build_names_report(config, identity);
    writer.render(&report)?;
    Ok(())
}

fn build_names_report(config: &DuckformConfig, identity: RunIdentity) -> NamesReport {
    let (credentials, token_present) = match Credentials::from_env(&config.motherduck) {
        Ok(c) => (c, true),
        Err(_) => (
            Credentials {
                token: SecretToken::new("unset"),
            },
            false,
        ),
    };
    let plan = RunPlan::build(config, identity, &credentials);

    NamesReport {
        token_env: config.motherduck.token_env.clone(),
        token_present,
        variables: plan.inputs.redacted(),
        names: plan.names,
        expectations: plan.expectations,
    }
}

/// Names, Terraform variables and probes of one run.
#[derive(Serialize)]
pub struct NamesReport {
    pub names: RunNames,
    pub token_env: String,
    pub token_present: bool,
    /// Terraform variables with secrets redacted.
    pub variables: BTreeMap<String, String>,
    pub expectations: Vec<Expectation>,
}

impl Render for NamesReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Run suffix: {}", self.names.suffix.to_string().bold())?;
        if !self.token_present {
            writeln!(
                w,
                "{} {} is not set; `run`, `verify` and `destroy` will refuse to start",
                "warning:".yellow().bold(),
                self.token_env
            )?;
        }

        writeln!(w)?;
        writeln!(w, "{}", "Terraform variables".bold())?;
        for (name, value) in &self.variables {
            writeln!(w, "  {:<20} {}", name, value)?;
        }

        writeln!(w)?;
        writeln!(w, "{}", "Probes".bold())?;
        for expectation in &self.expectations {
            writeln!(w, "  {}", describe_expectation(expectation))?;
        }
        Ok(())
    }
}
