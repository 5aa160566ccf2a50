//! 재시도 가능한 에러 처리를 포함한 terraform 명령 실행

use std::time::Instant;

use tracing::{debug, info, warn};

use duckform_core::metrics as m;

use crate::error::TerraformError;
use crate::options::{TerraformCommand, TerraformOptions};
use crate::runner::{CommandOutput, TerraformRunner};

/// 명령을 실행하고, 출력이 재시도 가능 패턴과 맞으면 정해진 간격으로 재시도합니다.
///
/// - 종료 코드 0: 출력과 함께 `Ok`
/// - 재시도 가능 에러: `time_between_retries` 후 재시도, 최대 `max_retries`회
/// - 그 외 실패: 즉시 [`TerraformError::CommandFailed`]
/// - 재시도 한도 초과: [`TerraformError::RetriesExhausted`]
///
/// 프로세스 시작 실패(`Spawn`)는 재시도하지 않습니다.
pub async fn run_with_retries<R: TerraformRunner>(
    runner: &R,
    command: TerraformCommand,
    options: &TerraformOptions,
) -> Result<CommandOutput, TerraformError> {
    info!(
        command = %command,
        cmdline = %command.display_line(options),
        "running terraform"
    );

    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        let started = Instant::now();
        let result = runner.run(command, options).await;
        metrics::histogram!(
            m::TERRAFORM_COMMAND_DURATION_SECONDS,
            m::LABEL_COMMAND => command.as_str()
        )
        .record(started.elapsed().as_secs_f64());

        let output = match result {
            Ok(output) => output,
            Err(e) => {
                record_result(command, false);
                return Err(e);
            }
        };

        if output.success() {
            debug!(command = %command, attempt, output = %output.output, "terraform succeeded");
            record_result(command, true);
            return Ok(output);
        }

        warn!(
            command = %command,
            attempt,
            exit_code = ?output.exit_code,
            output = %output.output,
            "terraform command failed"
        );

        let Some(pattern) = options.retryable_match(&output.output) else {
            record_result(command, false);
            return Err(TerraformError::CommandFailed {
                command: command.as_str().to_owned(),
                exit_code: output.exit_code,
                output: output.output,
            });
        };

        if attempt > options.max_retries {
            record_result(command, false);
            return Err(TerraformError::RetriesExhausted {
                command: command.as_str().to_owned(),
                attempts: attempt,
                output: output.output,
            });
        }

        warn!(
            command = %command,
            attempt,
            pattern = pattern.as_str(),
            wait_secs = options.time_between_retries.as_secs(),
            "retryable terraform error, retrying"
        );
        metrics::counter!(m::TERRAFORM_RETRIES_TOTAL, m::LABEL_COMMAND => command.as_str())
            .increment(1);
        tokio::time::sleep(options.time_between_retries).await;
    }
}

fn record_result(command: TerraformCommand, success: bool) {
    metrics::counter!(
        m::TERRAFORM_COMMANDS_TOTAL,
        m::LABEL_COMMAND => command.as_str(),
        m::LABEL_RESULT => if success { "success" } else { "failure" }
    )
    .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::MockTerraformRunner;
    use duckform_core::config::TerraformConfig;
    use duckform_core::types::ProvisionInputs;

    const TRANSIENT: &str = "Error: Failed to query available provider packages";

    fn options(max_retries: u32) -> TerraformOptions {
        let config = TerraformConfig {
            max_retries,
            ..TerraformConfig::default()
        };
        TerraformOptions::from_config(&config, ProvisionInputs::new()).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn success_on_first_attempt() {
        let mock = MockTerraformRunner::new();
        let out = run_with_retries(&mock, TerraformCommand::Init, &options(3))
            .await
            .unwrap();
        assert!(out.success());
        assert_eq!(mock.count(TerraformCommand::Init), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_error_is_retried_until_success() {
        let mock = MockTerraformRunner::new();
        mock.push_result(TerraformCommand::Init, 1, TRANSIENT);
        mock.push_result(TerraformCommand::Init, 1, TRANSIENT);

        let out = run_with_retries(&mock, TerraformCommand::Init, &options(3))
            .await
            .unwrap();
        assert!(out.success());
        assert_eq!(mock.count(TerraformCommand::Init), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn non_retryable_error_fails_immediately() {
        let mock = MockTerraformRunner::new();
        mock.push_result(TerraformCommand::Apply, 1, "Error: Invalid MotherDuck token");

        let err = run_with_retries(&mock, TerraformCommand::Apply, &options(3))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TerraformError::CommandFailed {
                exit_code: Some(1),
                ..
            }
        ));
        assert_eq!(err.output(), Some("Error: Invalid MotherDuck token"));
        assert_eq!(mock.count(TerraformCommand::Apply), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_are_bounded() {
        let mock = MockTerraformRunner::new();
        for _ in 0..5 {
            mock.push_result(TerraformCommand::Init, 1, TRANSIENT);
        }

        let err = run_with_retries(&mock, TerraformCommand::Init, &options(2))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TerraformError::RetriesExhausted { attempts: 3, .. }
        ));
        assert_eq!(mock.count(TerraformCommand::Init), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_retries_runs_once() {
        let mock = MockTerraformRunner::new();
        mock.push_result(TerraformCommand::Destroy, 1, TRANSIENT);

        let err = run_with_retries(&mock, TerraformCommand::Destroy, &options(0))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TerraformError::RetriesExhausted { attempts: 1, .. }
        ));
        assert_eq!(mock.count(TerraformCommand::Destroy), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn spawn_failure_is_not_retried() {
        let mock = MockTerraformRunner::new();
        mock.fail_spawn(TerraformCommand::Init);

        let err = run_with_retries(&mock, TerraformCommand::Init, &options(3))
            .await
            .unwrap_err();
        assert!(matches!(err, TerraformError::Spawn { .. }));
        assert_eq!(mock.count(TerraformCommand::Init), 1);
    }
}
