//! CLI-specific error types and exit code mapping

use duckform_core::error::DuckformError;
use duckform_probe::ProbeFailure;
use duckform_terraform::TerraformError;

/// CLI-specific error type.
///
/// Each variant carries enough context for a user-friendly message.
/// The `exit_code()` method maps errors to process exit codes.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration loading or validation failure.
    #[error("configuration error: {0}")]
    Config(String),

    /// A subcommand-specific operation failed.
    #[error("{0}")]
    Command(String),

    /// A precondition was not met before any resource was created.
    #[error("precondition failed: {0}")]
    Precondition(String),

    /// At least one probe failed or aborted the run.
    #[error("verification failed: {0}")]
    Verification(String),

    /// Terraform init, apply or destroy failed.
    #[error("provisioning failed: {0}")]
    Provision(String),

    /// JSON serialisation failed during output rendering.
    #[error("json output error: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    /// IO error (file read, stdout write, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Wrapped domain error from duckform-core.
    #[error("{0}")]
    Core(#[from] DuckformError),
}

impl CliError {
    /// Map the error to a process exit code.
    ///
    /// | Code | Meaning                                |
    /// |------|----------------------------------------|
    /// | 0    | Success                                |
    /// | 1    | General / command error                |
    /// | 2    | Configuration error                    |
    /// | 3    | Precondition (missing token)           |
    /// | 4    | Verification failed                    |
    /// | 5    | Provisioning failed                    |
    /// | 10   | IO error                               |
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 2,
            Self::Precondition(_) => 3,
            Self::Verification(_) => 4,
            Self::Provision(_) => 5,
            Self::Io(_) => 10,
            Self::Core(e) => match e {
                DuckformError::Config(_) => 2,
                DuckformError::Precondition(_) => 3,
                DuckformError::Provision(_) => 5,
                DuckformError::Io(_) => 10,
                DuckformError::Probe(_) => 1,
            },
            Self::JsonSerialize(_) | Self::Command(_) => 1,
        }
    }
}

impl From<TerraformError> for CliError {
    fn from(e: TerraformError) -> Self {
        match e {
            TerraformError::InvalidPattern { .. } => Self::Config(e.to_string()),
            other => Self::Provision(other.to_string()),
        }
    }
}

impl From<ProbeFailure> for CliError {
    fn from(e: ProbeFailure) -> Self {
        Self::Command(format!("probe setup failed: {e}"))
    }
}
