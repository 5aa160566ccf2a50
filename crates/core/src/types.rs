//! 도메인 타입: 프로비저닝 입력, 검증 기대값, 프로브 결과
//!
//! 드라이버와 프로브 러너가 공유하는 데이터 구조를 정의합니다.
//! 모든 값은 한 번의 실행 동안만 살아 있으며 영속화되지 않습니다.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// terraform 변수 값
///
/// `-var name=value` 인자로 전달될 때 [`to_cli_value`](Self::to_cli_value)로
/// 직렬화됩니다. 리스트는 HCL 리스트 문법을 따릅니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VarValue {
    /// 문자열
    String(String),
    /// 정수
    Int(i64),
    /// 문자열 리스트
    List(Vec<String>),
}

impl VarValue {
    /// `-var` 인자의 값 부분으로 직렬화합니다.
    pub fn to_cli_value(&self) -> String {
        match self {
            Self::String(s) => s.clone(),
            Self::Int(n) => n.to_string(),
            Self::List(items) => {
                let quoted: Vec<String> = items.iter().map(|s| hcl_quote(s)).collect();
                format!("[{}]", quoted.join(", "))
            }
        }
    }
}

impl From<&str> for VarValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl From<String> for VarValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for VarValue {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<Vec<String>> for VarValue {
    fn from(items: Vec<String>) -> Self {
        Self::List(items)
    }
}

fn hcl_quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}

/// 프로비저닝 입력 집합
///
/// 변수 이름 → 값 매핑이며 terraform에 그대로 전달됩니다.
/// 비밀 변수는 [`mark_secret`](Self::mark_secret)으로 표시해 두면
/// [`redacted`](Self::redacted) 출력에서 가려집니다.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProvisionInputs {
    vars: BTreeMap<String, VarValue>,
    secret_keys: Vec<String>,
}

impl ProvisionInputs {
    /// 빈 입력 집합을 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 변수를 설정합니다. 같은 이름이 있으면 덮어씁니다.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<VarValue>) -> &mut Self {
        self.vars.insert(name.into(), value.into());
        self
    }

    /// 비밀 변수를 설정합니다.
    pub fn set_secret(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        let name = name.into();
        self.vars.insert(name.clone(), VarValue::String(value.into()));
        self.mark_secret(name);
        self
    }

    /// 이미 설정된 변수를 비밀로 표시합니다.
    pub fn mark_secret(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.secret_keys.contains(&name) {
            self.secret_keys.push(name);
        }
    }

    /// 변수 값을 조회합니다.
    pub fn get(&self, name: &str) -> Option<&VarValue> {
        self.vars.get(name)
    }

    /// 비밀 변수 여부
    pub fn is_secret(&self, name: &str) -> bool {
        self.secret_keys.iter().any(|k| k == name)
    }

    /// 변수 개수
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// 비어 있는지 여부
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// 이름 순으로 변수를 순회합니다.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &VarValue)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// terraform `-var` 인자 목록을 생성합니다.
    pub fn to_var_args(&self) -> Vec<String> {
        let mut args = Vec::with_capacity(self.vars.len() * 2);
        for (name, value) in &self.vars {
            args.push("-var".to_owned());
            args.push(format!("{name}={}", value.to_cli_value()));
        }
        args
    }

    /// 비밀 값을 `***`로 가린 (이름, 값) 목록. 로그/출력용
    pub fn redacted(&self) -> BTreeMap<String, String> {
        self.vars
            .iter()
            .map(|(k, v)| {
                let shown = if self.is_secret(k) {
                    REDACTED.to_owned()
                } else {
                    v.to_cli_value()
                };
                (k.clone(), shown)
            })
            .collect()
    }

    /// 텍스트에서 비밀 변수 값을 모두 가립니다. 명령 인자/출력 로그용
    pub fn redact_in(&self, text: &str) -> String {
        let mut out = text.to_owned();
        for key in &self.secret_keys {
            if let Some(VarValue::String(secret)) = self.vars.get(key) {
                if !secret.is_empty() {
                    out = out.replace(secret.as_str(), REDACTED);
                }
            }
        }
        out
    }
}

/// 가려진 값 표시
pub const REDACTED: &str = "***";

/// 검증 대상 리소스 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// 데이터베이스
    Database,
    /// 스키마
    Schema,
    /// 사용자
    User,
    /// API 토큰
    Token,
    /// 연결된 데이터 공유
    Share,
    /// 공유 내 테이블
    Table,
}

impl ResourceKind {
    /// 메트릭 레이블/출력용 고정 이름
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Database => "database",
            Self::Schema => "schema",
            Self::User => "user",
            Self::Token => "token",
            Self::Share => "share",
            Self::Table => "table",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 프로브 수단
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeMechanism {
    /// SQL 클라이언트로 카탈로그 조회
    Sql,
    /// 관리 HTTP API 호출
    Api,
}

/// 검증 기대값
///
/// "어떤 리소스가 어떤 식별자로 존재해야 하며, 무엇으로 확인하는가"를 나타냅니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expectation {
    /// 리소스 종류
    pub kind: ResourceKind,
    /// 기대 식별자 (이름, 이메일, 테이블 이름)
    pub identifier: String,
    /// 상위 리소스 (스키마의 데이터베이스, 테이블의 공유, 토큰의 사용자)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    /// 프로브 수단
    pub mechanism: ProbeMechanism,
}

impl Expectation {
    /// 데이터베이스 존재 기대값
    pub fn database(name: impl Into<String>) -> Self {
        Self::new(ResourceKind::Database, name, None, ProbeMechanism::Sql)
    }

    /// 스키마 존재 기대값
    pub fn schema(database: impl Into<String>, schema: impl Into<String>) -> Self {
        Self::new(
            ResourceKind::Schema,
            schema,
            Some(database.into()),
            ProbeMechanism::Sql,
        )
    }

    /// 사용자 존재 기대값. 식별자는 매칭 정책에 따라 사용자 이름 또는 이메일
    pub fn user(identifier: impl Into<String>) -> Self {
        Self::new(ResourceKind::User, identifier, None, ProbeMechanism::Api)
    }

    /// 토큰 존재 기대값
    pub fn token(username: impl Into<String>, token_name: impl Into<String>) -> Self {
        Self::new(
            ResourceKind::Token,
            token_name,
            Some(username.into()),
            ProbeMechanism::Api,
        )
    }

    /// 공유 연결 기대값
    pub fn share(name: impl Into<String>) -> Self {
        Self::new(ResourceKind::Share, name, None, ProbeMechanism::Sql)
    }

    /// 공유 내 테이블 기대값
    pub fn table(share: impl Into<String>, table: impl Into<String>) -> Self {
        Self::new(
            ResourceKind::Table,
            table,
            Some(share.into()),
            ProbeMechanism::Sql,
        )
    }

    fn new(
        kind: ResourceKind,
        identifier: impl Into<String>,
        parent: Option<String>,
        mechanism: ProbeMechanism,
    ) -> Self {
        Self {
            kind,
            identifier: identifier.into(),
            parent,
            mechanism,
        }
    }
}

impl fmt::Display for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.parent {
            Some(parent) => write!(f, "{} {}.{}", self.kind, parent, self.identifier),
            None => write!(f, "{} {}", self.kind, self.identifier),
        }
    }
}

/// 프로브 결과
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProbeOutcome {
    /// 기대 식별자 확인
    Passed,
    /// 권한 부족 등으로 검증 불가 (실패 아님)
    Skipped {
        /// 건너뛴 사유
        reason: String,
    },
    /// 기대 식별자 없음. 나머지 프로브는 계속 실행
    Failed {
        /// 실패 사유
        reason: String,
        /// 진단용 원본 응답
        raw: String,
    },
    /// 인증 실패 등 치명적 오류. 나머지 프로브를 실행하지 않음
    Fatal {
        /// 중단 사유
        reason: String,
    },
}

impl ProbeOutcome {
    /// 메트릭 레이블/출력용 고정 이름
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Skipped { .. } => "skipped",
            Self::Failed { .. } => "failed",
            Self::Fatal { .. } => "fatal",
        }
    }

    /// 실행 판정을 실패로 만드는 결과인지 여부
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. } | Self::Fatal { .. })
    }

    /// 이후 프로브 실행을 중단해야 하는지 여부
    pub fn aborts_run(&self) -> bool {
        matches!(self, Self::Fatal { .. })
    }
}

/// 프로브 하나의 실행 기록
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeRecord {
    /// 검증 기대값
    pub expectation: Expectation,
    /// 결과
    pub outcome: ProbeOutcome,
    /// 소요 시간
    #[serde(with = "duration_millis")]
    pub elapsed: Duration,
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

/// 사용자 매칭 기준
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserMatch {
    /// `username` 필드 비교
    #[default]
    Username,
    /// `email` 필드 비교
    Email,
}

impl UserMatch {
    /// 허용되는 설정 값
    pub const VARIANTS: [&'static str; 2] = ["username", "email"];

    /// 설정 값 문자열
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Username => "username",
            Self::Email => "email",
        }
    }
}

impl FromStr for UserMatch {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "username" => Ok(Self::Username),
            "email" => Ok(Self::Email),
            other => Err(format!("unknown user match policy: {other}")),
        }
    }
}

/// 토큰 매칭 기준
///
/// `ExactName`이 가장 강한 보장이므로 기본값입니다.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenMatch {
    /// 토큰 이름이 정확히 일치
    #[default]
    ExactName,
    /// 토큰이 하나 이상 존재
    Any,
    /// `created_ts`가 가장 큰 토큰의 이름이 비어 있지 않음
    MostRecent,
}

impl TokenMatch {
    /// 허용되는 설정 값
    pub const VARIANTS: [&'static str; 3] = ["exact_name", "any", "most_recent"];

    /// 설정 값 문자열
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExactName => "exact_name",
            Self::Any => "any",
            Self::MostRecent => "most_recent",
        }
    }
}

impl FromStr for TokenMatch {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "exact_name" => Ok(Self::ExactName),
            "any" => Ok(Self::Any),
            "most_recent" => Ok(Self::MostRecent),
            other => Err(format!("unknown token match policy: {other}")),
        }
    }
}
