//! CLI argument parsing using clap derive API
//!
//! This module defines the command-line interface structure using clap's derive macros.
//! It is purely declarative with no side effects or I/O.

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Config file used when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "duckform.toml";

/// duckform -- acceptance harness for the MotherDuck Terraform module.
///
/// Use `duckform <COMMAND> --help` for subcommand details.
#[derive(Parser, Debug)]
#[command(name = "duckform", version, about, long_about = None)]
pub struct Cli {
    /// Path to the duckform.toml configuration file [default: duckform.toml].
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Override the Terraform module directory.
    #[arg(long, global = true)]
    pub terraform_dir: Option<PathBuf>,

    /// Output format.
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Effective config path.
    pub fn config_path(&self) -> &Path {
        self.config
            .as_deref()
            .unwrap_or_else(|| Path::new(DEFAULT_CONFIG_PATH))
    }

    /// Whether the config path was given explicitly.
    ///
    /// An explicit path must exist; the default path may be absent.
    pub fn config_is_explicit(&self) -> bool {
        self.config.is_some()
    }
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table / text output.
    Text,
    /// Machine-readable JSON.
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Apply the module, verify every resource, then destroy.
    Run(RunArgs),

    /// Run the probes against an existing deployment.
    Verify(SuffixArgs),

    /// Destroy the resources of an earlier run.
    Destroy(SuffixArgs),

    /// Print the names and Terraform variables of a run.
    Names(NamesArgs),

    /// Manage configuration.
    Config(ConfigArgs),
}

// ---- run ----

/// Full apply / verify / destroy sequence.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Reuse an explicit run suffix instead of the current timestamp.
    #[arg(long)]
    pub suffix: Option<u64>,

    /// Skip destroy and leave the resources in place (debugging only).
    #[arg(long)]
    pub keep: bool,
}

// ---- verify / destroy ----

/// Target an existing run by its suffix.
#[derive(Args, Debug)]
pub struct SuffixArgs {
    /// Suffix of the run (Unix timestamp printed by `run` or `names`).
    #[arg(long)]
    pub suffix: u64,
}

// ---- names ----

/// Show derived names.
#[derive(Args, Debug)]
pub struct NamesArgs {
    /// Suffix to derive names from (default: current timestamp).
    #[arg(long)]
    pub suffix: Option<u64>,
}

// ---- config ----

/// Manage configuration.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Validate the configuration file.
    Validate,

    /// Show the effective configuration.
    Show {
        /// Section to display (general, motherduck, terraform, duckdb, run, probe, metrics).
        #[arg(long)]
        section: Option<String>,
    },
}
