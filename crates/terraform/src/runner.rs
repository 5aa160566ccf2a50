//! terraform 실행 추상화
//!
//! [`TerraformRunner`] 트레이트는 terraform 바이너리 호출을 추상화합니다.
//! 운영 코드는 [`CommandTerraform`]을, 테스트는 `MockTerraformRunner`를 사용합니다.
//!
//! ```text
//! ┌──────────────────┐
//! │ ProvisionDriver  │
//! └────────┬─────────┘
//!          │ run_with_retries
//!          ▼
//!   ┌────────────────┐
//!   │TerraformRunner │ (trait)
//!   └────────────────┘
//!        │       │
//!        ▼       ▼
//!   ┌────────┐ ┌──────┐
//!   │Command │ │ Mock │
//!   └───┬────┘ └──────┘
//!       │
//!       ▼
//!   terraform CLI
//! ```
//!
//! 러너는 종료 코드와 관계없이 출력을 돌려줍니다. 성공/재시도/실패 판단은
//! [`run_with_retries`](crate::retry::run_with_retries)의 몫입니다.

use std::future::Future;
use std::process::Stdio;

use tokio::process::Command;
use tracing::debug;

use crate::error::TerraformError;
use crate::options::{TerraformCommand, TerraformOptions};

/// 자동화 환경임을 terraform에 알리는 환경변수
pub const TF_IN_AUTOMATION: &str = "TF_IN_AUTOMATION";

/// 명령 한 번의 실행 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// 종료 코드 (시그널 종료 시 None)
    pub exit_code: Option<i32>,
    /// 표준 출력 뒤에 표준 에러를 이어 붙인 출력
    pub output: String,
}

impl CommandOutput {
    /// 종료 코드 0 여부
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// terraform 실행 트레이트
///
/// `Send + Sync + 'static`이므로 `Arc`로 공유하여 여러 태스크에서 사용할 수 있습니다.
pub trait TerraformRunner: Send + Sync + 'static {
    /// 하위 명령을 한 번 실행합니다 (재시도 없음).
    ///
    /// 프로세스가 실행되었다면 종료 코드와 무관하게 `Ok`를 반환합니다.
    ///
    /// # Errors
    ///
    /// 프로세스를 시작할 수 없으면 [`TerraformError::Spawn`]을 반환합니다.
    fn run(
        &self,
        command: TerraformCommand,
        options: &TerraformOptions,
    ) -> impl Future<Output = Result<CommandOutput, TerraformError>> + Send;
}

/// `tokio::process`로 terraform 바이너리를 실행하는 구현
///
/// 셸을 거치지 않고 인자 벡터로 직접 실행하며, 표준 입력은 닫습니다.
#[derive(Debug, Clone, Default)]
pub struct CommandTerraform;

impl CommandTerraform {
    /// 새 실행기를 생성합니다.
    pub fn new() -> Self {
        Self
    }
}

impl TerraformRunner for CommandTerraform {
    async fn run(
        &self,
        command: TerraformCommand,
        options: &TerraformOptions,
    ) -> Result<CommandOutput, TerraformError> {
        debug!(
            command = %command,
            dir = %options.dir.display(),
            cmdline = %command.display_line(options),
            "spawning terraform"
        );

        let output = Command::new(&options.binary)
            .args(command.args(options))
            .current_dir(&options.dir)
            .env(TF_IN_AUTOMATION, "1")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| TerraformError::Spawn {
                command: command.as_str().to_owned(),
                reason: e.to_string(),
            })?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.is_empty() {
            if !combined.is_empty() && !combined.ends_with('\n') {
                combined.push('\n');
            }
            combined.push_str(&stderr);
        }

        Ok(CommandOutput {
            exit_code: output.status.code(),
            output: options.vars.redact_in(&combined),
        })
    }
}

/// 테스트용 Mock terraform 실행기
///
/// 명령별로 미리 정해 둔 결과를 순서대로 돌려주고, 호출 기록을 남깁니다.
/// 준비된 결과가 없으면 성공(exit 0)을 반환합니다.
#[cfg(test)]
#[derive(Default)]
pub struct MockTerraformRunner {
    scripted: std::sync::Mutex<
        std::collections::HashMap<TerraformCommand, std::collections::VecDeque<CommandOutput>>,
    >,
    calls: std::sync::Mutex<Vec<TerraformCommand>>,
    spawn_failure: std::sync::Mutex<Option<TerraformCommand>>,
}

#[cfg(test)]
impl MockTerraformRunner {
    /// 모든 명령이 성공하는 mock을 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 명령의 다음 실행 결과를 예약합니다.
    pub fn push_result(&self, command: TerraformCommand, exit_code: i32, output: &str) {
        if let Ok(mut scripted) = self.scripted.lock() {
            scripted.entry(command).or_default().push_back(CommandOutput {
                exit_code: Some(exit_code),
                output: output.to_owned(),
            });
        }
    }

    /// 해당 명령은 프로세스 시작 자체가 실패하도록 합니다.
    pub fn fail_spawn(&self, command: TerraformCommand) {
        if let Ok(mut slot) = self.spawn_failure.lock() {
            *slot = Some(command);
        }
    }

    /// 지금까지의 호출 순서
    pub fn calls(&self) -> Vec<TerraformCommand> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// 특정 명령의 호출 횟수
    pub fn count(&self, command: TerraformCommand) -> usize {
        self.calls().iter().filter(|c| **c == command).count()
    }
}

#[cfg(test)]
impl TerraformRunner for MockTerraformRunner {
    async fn run(
        &self,
        command: TerraformCommand,
        _options: &TerraformOptions,
    ) -> Result<CommandOutput, TerraformError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(command);
        }
        let spawn_fails = self
            .spawn_failure
            .lock()
            .map(|slot| *slot == Some(command))
            .unwrap_or(false);
        if spawn_fails {
            return Err(TerraformError::Spawn {
                command: command.as_str().to_owned(),
                reason: "mock spawn failure".to_owned(),
            });
        }
        let next = self
            .scripted
            .lock()
            .ok()
            .and_then(|mut s| s.get_mut(&command).and_then(|q| q.pop_front()));
        Ok(next.unwrap_or(CommandOutput {
            exit_code: Some(0),
            output: format!("{command} complete"),
        }))
    }
}
