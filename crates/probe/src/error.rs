//! 프로브 에러 타입
//!
//! [`ProbeFailure`]는 프로브를 "수행할 수 없는" 인프라 수준의 문제입니다.
//! 식별자가 없어서 생기는 판정 실패는 에러가 아니라
//! [`ProbeOutcome::Failed`](duckform_core::types::ProbeOutcome::Failed)로 표현됩니다.

use duckform_core::error::{DuckformError, ProbeError};

/// 프로브 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum ProbeFailure {
    /// 외부 프로그램 실행 실패
    #[error("failed to spawn {program}: {reason}")]
    Spawn {
        /// 프로그램 이름
        program: String,
        /// 실패 사유
        reason: String,
    },

    /// 외부 프로그램이 0이 아닌 코드로 종료
    #[error("{program} exited with {exit_code:?}: {output}")]
    Subprocess {
        /// 프로그램 이름
        program: String,
        /// 종료 코드
        exit_code: Option<i32>,
        /// 출력 (비밀 값 가림)
        output: String,
    },

    /// HTTP 전송 실패
    #[error("http request failed: {0}")]
    Http(String),

    /// 응답 디코딩 실패
    #[error("decode failed: {0}")]
    Decode(String),

    /// 타임아웃
    #[error("{what} timed out after {secs}s")]
    Timeout {
        /// 대상 작업
        what: String,
        /// 제한 시간 (초)
        secs: u64,
    },
}

impl From<ProbeFailure> for DuckformError {
    fn from(err: ProbeFailure) -> Self {
        let probe = match err {
            ProbeFailure::Spawn { .. } | ProbeFailure::Subprocess { .. } => {
                ProbeError::SqlClient(err.to_string())
            }
            ProbeFailure::Http(msg) => ProbeError::Api(msg),
            ProbeFailure::Decode(msg) => ProbeError::Decode(msg),
            ProbeFailure::Timeout { what, secs } => ProbeError::Timeout { what, secs },
        };
        DuckformError::Probe(probe)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subprocess_failure_maps_to_sql_client_error() {
        let err: DuckformError = ProbeFailure::Subprocess {
            program: "duckdb".to_owned(),
            exit_code: Some(1),
            output: "Catalog Error".to_owned(),
        }
        .into();
        assert!(matches!(err, DuckformError::Probe(ProbeError::SqlClient(_))));
        assert!(err.to_string().contains("Catalog Error"));
    }

    #[test]
    fn timeout_keeps_fields() {
        let err: DuckformError = ProbeFailure::Timeout {
            what: "GET /v1/users".to_owned(),
            secs: 30,
        }
        .into();
        assert!(matches!(
            err,
            DuckformError::Probe(ProbeError::Timeout { secs: 30, .. })
        ));
    }
}
