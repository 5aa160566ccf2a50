use std::path::{Path, PathBuf};

use clap::Parser;
use colored::Colorize;

use duckform_cli::cli::{Cli, Commands};
use duckform_cli::commands;
use duckform_cli::error::CliError;
use duckform_cli::logging::init_tracing;
use duckform_cli::metrics_export::{self, MetricsExport};
use duckform_cli::output::OutputWriter;
use duckform_core::config::{DuckformConfig, GeneralConfig};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let code = match run(cli).await {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("{} {}", "error:".red().bold(), e);
            e.exit_code()
        }
    };

    std::process::exit(code);
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let writer = OutputWriter::new(cli.output);
    let config_path = cli.config_path().to_path_buf();
    let explicit = cli.config_is_explicit();
    let Cli {
        log_level,
        terraform_dir,
        command,
        ..
    } = cli;

    // config commands report load errors themselves
    if let Commands::Config(args) = command {
        let general = GeneralConfig {
            log_level: log_level.unwrap_or_else(|| "warn".to_owned()),
            ..GeneralConfig::default()
        };
        init_tracing(&general).map_err(|e| CliError::Command(e.to_string()))?;
        return commands::config::execute(args, &config_path, &writer).await;
    }

    let config = load_config(&config_path, explicit, log_level, terraform_dir).await?;
    init_tracing(&config.general).map_err(|e| CliError::Command(e.to_string()))?;
    tracing::debug!(config = %config_path.display(), "configuration loaded");

    let export = MetricsExport::install(&config.metrics)?;

    let label = match &command {
        Commands::Run(_) => "run",
        Commands::Verify(_) => "verify",
        Commands::Destroy(_) => "destroy",
        Commands::Names(_) => "names",
        Commands::Config(_) => "config",
    };
    let result = match command {
        Commands::Run(args) => commands::run::execute(args, &config, &writer).await,
        Commands::Verify(args) => commands::verify::execute(args, &config, &writer).await,
        Commands::Destroy(args) => commands::destroy::execute(args, &config, &writer).await,
        Commands::Names(args) => commands::names::execute(args, &config, &writer).await,
        Commands::Config(_) => Ok(()),
    };

    if let Err(e) = &result {
        if e.exit_code() == 3 {
            metrics_export::record_run(label, "precondition_failed");
        }
    }
    metrics_export::flush(export.as_ref());
    result
}

/// defaults → file → env → CLI flags, then validate.
///
/// The default path may be missing; an explicit `--config` must exist.
async fn load_config(
    path: &Path,
    explicit: bool,
    log_level: Option<String>,
    terraform_dir: Option<PathBuf>,
) -> Result<DuckformConfig, CliError> {
    let mut config = if explicit {
        DuckformConfig::load(path).await?
    } else {
        DuckformConfig::load_or_default(path).await?
    };

    if let Some(level) = log_level {
        config.general.log_level = level;
    }
    if let Some(dir) = terraform_dir {
        config.terraform.dir = dir.display().to_string();
    }

    config.validate()?;
    Ok(config)
}
