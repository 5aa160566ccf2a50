//! SQL 클라이언트 -- `duckdb` CLI로 MotherDuck 카탈로그를 조회합니다.
//!
//! [`SqlClient`] 트레이트는 "연결 + SQL → 행 목록" 호출을 추상화합니다.
//! 운영 구현 [`DuckDbCli`]는 셸 없이 다음과 같이 실행합니다:
//!
//! ```text
//! duckdb "md:?motherduck_token=<token>" -json -c "<sql>"
//! ```
//!
//! 토큰이 포함된 연결 문자열은 로그와 에러 메시지에서 가려집니다.

use std::future::Future;
use std::process::Stdio;
use std::time::Duration;

use serde_json::{Map, Value};
use tokio::process::Command;
use tracing::{debug, warn};

use duckform_core::config::DuckDbConfig;
use duckform_core::credentials::SecretToken;

use crate::error::ProbeFailure;

/// 결과 행 (컬럼 이름 → 값)
pub type Row = Map<String, Value>;

/// MotherDuck 연결 정보
#[derive(Debug, Clone)]
pub struct MotherDuckConnection {
    token: SecretToken,
}

impl MotherDuckConnection {
    /// 토큰으로 연결 정보를 생성합니다.
    pub fn new(token: SecretToken) -> Self {
        Self { token }
    }

    /// 실제 연결 문자열 (토큰 포함). 프로세스 인자로만 사용합니다.
    pub fn uri(&self) -> String {
        format!("md:?motherduck_token={}", self.token.expose())
    }

    /// 로그용 연결 문자열
    pub fn redacted_uri(&self) -> String {
        self.token.redact_in(&self.uri())
    }

    /// 텍스트에서 토큰을 가립니다.
    pub fn redact(&self, text: &str) -> String {
        self.token.redact_in(text)
    }
}

/// 쿼리 결과
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryRows {
    rows: Vec<Row>,
    raw: String,
}

impl QueryRows {
    /// `-json` 출력을 파싱합니다.
    ///
    /// 빈 출력은 0행입니다. 여러 문장이 각각 배열을 출력하면 모두 이어 붙입니다.
    pub fn parse_json(raw: &str) -> Result<Self, ProbeFailure> {
        let mut rows = Vec::new();
        let stream = serde_json::Deserializer::from_str(raw).into_iter::<Vec<Row>>();
        for batch in stream {
            let batch = batch.map_err(|e| ProbeFailure::Decode(format!("duckdb json output: {e}")))?;
            rows.extend(batch);
        }
        Ok(Self {
            rows,
            raw: raw.to_owned(),
        })
    }

    /// 행 목록으로 결과를 만듭니다.
    pub fn from_rows(rows: Vec<Row>) -> Self {
        let raw = serde_json::to_string(&rows).unwrap_or_default();
        Self { rows, raw }
    }

    /// 행 목록
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// 원본 출력 (진단용)
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// 행 개수
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// 0행 여부
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// 컬럼의 문자열 값 목록. 문자열이 아닌 값은 건너뜁니다.
    pub fn column(&self, name: &str) -> Vec<&str> {
        self.rows
            .iter()
            .filter_map(|row| row.get(name).and_then(Value::as_str))
            .collect()
    }

    /// 컬럼에 정확히 일치하는 값이 있는지 여부
    pub fn contains(&self, column: &str, value: &str) -> bool {
        self.column(column).iter().any(|v| *v == value)
    }
}

/// SQL 문자열 리터럴로 인용합니다 (작은따옴표 이중화).
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// SQL 식별자로 인용합니다 (큰따옴표 이중화).
pub fn quote_identifier(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

/// SQL 클라이언트 트레이트
pub trait SqlClient: Send + Sync + 'static {
    /// 연결에 SQL을 실행하고 결과 행을 반환합니다.
    ///
    /// # Errors
    ///
    /// 실행 실패, 비정상 종료, 타임아웃, 출력 파싱 실패 시 [`ProbeFailure`]를 반환합니다.
    fn run_query(
        &self,
        connection: &MotherDuckConnection,
        sql: &str,
    ) -> impl Future<Output = Result<QueryRows, ProbeFailure>> + Send;
}

/// `duckdb` CLI 구현
#[derive(Debug, Clone)]
pub struct DuckDbCli {
    binary: String,
    timeout: Duration,
}

impl DuckDbCli {
    /// 바이너리 경로와 쿼리 타임아웃으로 생성합니다.
    pub fn new(binary: impl Into<String>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }

    /// 설정에서 생성합니다.
    pub fn from_config(config: &DuckDbConfig) -> Self {
        Self::new(&config.binary, Duration::from_secs(config.timeout_secs))
    }
}

impl SqlClient for DuckDbCli {
    async fn run_query(
        &self,
        connection: &MotherDuckConnection,
        sql: &str,
    ) -> Result<QueryRows, ProbeFailure> {
        debug!(
            binary = %self.binary,
            connection = %connection.redacted_uri(),
            sql,
            "running duckdb query"
        );

        let child = Command::new(&self.binary)
            .arg(connection.uri())
            .arg("-json")
            .arg("-c")
            .arg(sql)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.timeout, child).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(ProbeFailure::Spawn {
                    program: self.binary.clone(),
                    reason: e.to_string(),
                });
            }
            Err(_elapsed) => {
                return Err(ProbeFailure::Timeout {
                    what: "duckdb query".to_owned(),
                    secs: self.timeout.as_secs(),
                });
            }
        };

        let stdout = connection.redact(&String::from_utf8_lossy(&output.stdout));
        let stderr = connection.redact(&String::from_utf8_lossy(&output.stderr));

        if !output.status.success() {
            warn!(
                exit_code = ?output.status.code(),
                stdout = %stdout,
                stderr = %stderr,
                "duckdb query failed"
            );
            return Err(ProbeFailure::Subprocess {
                program: self.binary.clone(),
                exit_code: output.status.code(),
                output: format!("{stdout}{stderr}"),
            });
        }

        debug!(stdout = %stdout, stderr = %stderr, "duckdb query output");
        QueryRows::parse_json(&stdout)
    }
}

/// 테스트용 Mock SQL 클라이언트
///
/// SQL에 특정 문자열이 포함되면 미리 정한 행을 돌려줍니다.
/// 일치하는 규칙이 없으면 0행을 반환합니다.
#[cfg(test)]
#[derive(Default)]
pub struct MockSqlClient {
    rules: Vec<(String, Result<Vec<Row>, String>)>,
    queries: std::sync::Mutex<Vec<String>>,
}

#[cfg(test)]
impl MockSqlClient {
    /// 빈 mock을 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// `needle`을 포함하는 SQL에 `column = value` 한 행을 반환합니다.
    pub fn with_row(mut self, needle: &str, column: &str, value: &str) -> Self {
        let mut row = Row::new();
        row.insert(column.to_owned(), Value::String(value.to_owned()));
        self.rules.push((needle.to_owned(), Ok(vec![row])));
        self
    }

    /// `needle`을 포함하는 SQL은 비정상 종료로 실패합니다.
    pub fn with_failure(mut self, needle: &str, output: &str) -> Self {
        self.rules.push((needle.to_owned(), Err(output.to_owned())));
        self
    }

    /// 실행된 SQL 목록
    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().map(|q| q.clone()).unwrap_or_default()
    }
}

#[cfg(test)]
impl SqlClient for MockSqlClient {
    async fn run_query(
        &self,
        _connection: &MotherDuckConnection,
        sql: &str,
    ) -> Result<QueryRows, ProbeFailure> {
        if let Ok(mut q) = self.queries.lock() {
            q.push(sql.to_owned());
        }
        match self.rules.iter().find(|(needle, _)| sql.contains(needle.as_str())) {
            Some((_, Ok(rows))) => Ok(QueryRows::from_rows(rows.clone())),
            Some((_, Err(output))) => Err(ProbeFailure::Subprocess {
                program: "duckdb".to_owned(),
                exit_code: Some(1),
                output: output.clone(),
            }),
            None => Ok(QueryRows::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_empty_output_is_zero_rows() {
        let rows = QueryRows::parse_json("").unwrap();
        assert!(rows.is_empty());
        let rows = QueryRows::parse_json("  \n").unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn parse_single_result_set() {
        let raw = r#"[{"catalog_name":"test_db_1700000000"}]"#;
        let rows = QueryRows::parse_json(raw).unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows.contains("catalog_name", "test_db_1700000000"));
        assert!(!rows.contains("catalog_name", "test_db_1700000001"));
        assert_eq!(rows.raw(), raw);
    }

    #[test]
    fn parse_multiple_result_sets_concatenates() {
        let raw = "[{\"schema_name\":\"a\"}]\n[{\"schema_name\":\"b\"},{\"schema_name\":\"c\"}]\n";
        let rows = QueryRows::parse_json(raw).unwrap();
        assert_eq!(rows.column("schema_name"), vec!["a", "b", "c"]);
    }

    #[test]
    fn parse_malformed_output_is_decode_error() {
        let err = QueryRows::parse_json("Error: not json").unwrap_err();
        assert!(matches!(err, ProbeFailure::Decode(_)));
    }

    #[test]
    fn contains_is_exact_not_substring() {
        let rows = QueryRows::parse_json(r#"[{"catalog_name":"test_db_17000000001"}]"#).unwrap();
        assert!(!rows.contains("catalog_name", "test_db_1700000000"));
    }

    #[test]
    fn quoting_escapes_embedded_quotes() {
        assert_eq!(quote_literal("o'brien"), "'o''brien'");
        assert_eq!(quote_identifier("my\"db"), "\"my\"\"db\"");
        assert_eq!(quote_identifier("test_db_1"), "\"test_db_1\"");
    }

    #[test]
    fn connection_uri_is_redacted_for_logs() {
        let conn = MotherDuckConnection::new(SecretToken::new("md-secret"));
        assert_eq!(conn.uri(), "md:?motherduck_token=md-secret");
        assert_eq!(conn.redacted_uri(), "md:?motherduck_token=***");
    }

    #[tokio::test]
    async fn missing_binary_is_spawn_failure() {
        let cli = DuckDbCli::new("/nonexistent/duckdb-for-test", Duration::from_secs(5));
        let conn = MotherDuckConnection::new(SecretToken::new("tok"));
        let err = cli.run_query(&conn, "SELECT 1").await.unwrap_err();
        assert!(matches!(err, ProbeFailure::Spawn { .. }));
    }
}
