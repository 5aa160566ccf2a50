//! Command handlers -- one module per subcommand

pub mod config;
pub mod destroy;
pub mod names;
pub mod run;
pub mod verify;

use duckform_core::config::DuckformConfig;
use duckform_core::credentials::Credentials;
use duckform_core::identity::RunIdentity;
use duckform_core::plan::RunPlan;

use crate::error::CliError;

/// Read the token and build the plan for `identity`.
///
/// Fails with a precondition error before anything is created when the
/// token variable is missing.
pub(crate) fn plan_with_token(
    config: &DuckformConfig,
    identity: RunIdentity,
) -> Result<(RunPlan, Credentials), CliError> {
    let credentials = Credentials::from_env(&config.motherduck)?;
    let plan = RunPlan::build(config, identity, &credentials);
    Ok((plan, credentials))
}
