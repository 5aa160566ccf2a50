//! terraform 에러 타입
//!
//! [`TerraformError`]는 terraform 실행과 프로비저닝 드라이버에서 발생하는
//! 모든 에러를 표현합니다. `From<TerraformError> for DuckformError` 변환이
//! 구현되어 있어 상위 레이어에서 `?` 연산자로 전파할 수 있습니다.

use duckform_core::error::{ConfigError, DuckformError, ProvisionError};

/// terraform 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum TerraformError {
    /// 프로세스 실행 실패 (바이너리 없음, 작업 디렉토리 없음 등)
    #[error("failed to spawn terraform {command}: {reason}")]
    Spawn {
        /// terraform 하위 명령
        command: String,
        /// 실패 사유
        reason: String,
    },

    /// 재시도 불가능한 에러로 명령 실패
    #[error("terraform {command} failed (exit code {exit_code:?})")]
    CommandFailed {
        /// terraform 하위 명령
        command: String,
        /// 종료 코드 (시그널 종료 시 None)
        exit_code: Option<i32>,
        /// 표준 출력 + 표준 에러 (비밀 값 가림)
        output: String,
    },

    /// 재시도 가능한 에러가 재시도 한도까지 반복됨
    #[error("terraform {command} still failing after {attempts} attempts")]
    RetriesExhausted {
        /// terraform 하위 명령
        command: String,
        /// 총 시도 횟수
        attempts: u32,
        /// 마지막 시도의 출력 (비밀 값 가림)
        output: String,
    },

    /// 잘못된 상태 전이
    #[error("invalid driver state: {0}")]
    InvalidState(String),

    /// 재시도 에러 정규식 컴파일 실패
    #[error("invalid retryable error pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// 문제가 된 정규식
        pattern: String,
        /// 컴파일 에러
        reason: String,
    },
}

impl TerraformError {
    /// 진단용 terraform 출력. 출력이 없는 에러면 `None`
    pub fn output(&self) -> Option<&str> {
        match self {
            Self::CommandFailed { output, .. } | Self::RetriesExhausted { output, .. } => {
                Some(output)
            }
            _ => None,
        }
    }
}

impl From<TerraformError> for DuckformError {
    fn from(err: TerraformError) -> Self {
        match err {
            TerraformError::Spawn { command, reason } => {
                DuckformError::Provision(ProvisionError::Spawn {
                    command: format!("terraform {command}"),
                    reason,
                })
            }
            TerraformError::CommandFailed {
                command, exit_code, ..
            } => DuckformError::Provision(ProvisionError::CommandFailed {
                command: format!("terraform {command}"),
                reason: match exit_code {
                    Some(code) => format!("exit code {code}"),
                    None => "terminated by signal".to_owned(),
                },
            }),
            TerraformError::RetriesExhausted {
                command, attempts, ..
            } => DuckformError::Provision(ProvisionError::CommandFailed {
                command: format!("terraform {command}"),
                reason: format!("retryable error persisted after {attempts} attempts"),
            }),
            TerraformError::InvalidState(msg) => {
                DuckformError::Provision(ProvisionError::InvalidState(msg))
            }
            TerraformError::InvalidPattern { pattern, reason } => {
                DuckformError::Config(ConfigError::InvalidValue {
                    field: "terraform.retryable_errors".to_owned(),
                    reason: format!("'{pattern}': {reason}"),
                })
            }
        }
    }
}
