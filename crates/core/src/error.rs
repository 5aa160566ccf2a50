//! 에러 타입: 도메인별 에러 정의

/// duckform 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum DuckformError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 실행 전제 조건 불충족 (예: 토큰 환경변수 없음)
    ///
    /// 리소스를 만들기 전에 실행을 중단해야 하는 경우에만 사용합니다.
    #[error("precondition failed: {0}")]
    Precondition(String),

    /// 프로비저닝(terraform) 에러
    #[error("provision error: {0}")]
    Provision(#[from] ProvisionError),

    /// 검증 프로브 에러
    #[error("probe error: {0}")]
    Probe(#[from] ProbeError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 프로비저닝 에러
#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    /// 외부 명령 실행 자체가 실패 (바이너리 없음, 권한 등)
    #[error("failed to spawn '{command}': {reason}")]
    Spawn { command: String, reason: String },

    /// 명령이 0이 아닌 종료 코드로 끝남
    #[error("'{command}' failed: {reason}")]
    CommandFailed { command: String, reason: String },

    /// 잘못된 상태 전이 (예: apply 전에 destroy)
    #[error("invalid provision state: {0}")]
    InvalidState(String),
}

/// 검증 프로브 에러
///
/// 프로브 "판정 실패"(식별자 없음)가 아니라, 프로브를 수행할 수 없는
/// 인프라 수준의 문제를 나타냅니다.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    /// SQL 클라이언트 실행 실패
    #[error("sql client error: {0}")]
    SqlClient(String),

    /// 관리 API 호출 실패
    #[error("management api error: {0}")]
    Api(String),

    /// 응답 디코딩 실패
    #[error("decode failed: {0}")]
    Decode(String),

    /// 타임아웃
    #[error("timed out after {secs}s: {what}")]
    Timeout { what: String, secs: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precondition_display_includes_reason() {
        let err = DuckformError::Precondition("MOTHERDUCK_TOKEN is not set".to_owned());
        assert!(err.to_string().contains("MOTHERDUCK_TOKEN"));
    }

    #[test]
    fn provision_error_converts_into_top_level() {
        let err: DuckformError = ProvisionError::CommandFailed {
            command: "terraform apply".to_owned(),
            reason: "exit status 1".to_owned(),
        }
        .into();
        assert!(matches!(err, DuckformError::Provision(_)));
        assert!(err.to_string().contains("terraform apply"));
    }

    #[test]
    fn probe_timeout_display() {
        let err = ProbeError::Timeout {
            what: "duckdb query".to_owned(),
            secs: 120,
        };
        let msg = err.to_string();
        assert!(msg.contains("120s"));
        assert!(msg.contains("duckdb query"));
    }

    #[test]
    fn config_invalid_value_display() {
        let err = ConfigError::InvalidValue {
            field: "probe.token_match".to_owned(),
            reason: "must be one of: exact_name, any, most_recent".to_owned(),
        };
        assert!(err.to_string().contains("probe.token_match"));
    }
}
