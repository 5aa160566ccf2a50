//! 인증 정보: 환경변수에서 한 번 읽는 MotherDuck 토큰
//!
//! 토큰은 [`SecretToken`]으로 감싸져 `Debug`/`Display`/직렬화 어디에서도
//! 원문이 노출되지 않습니다. 실제 값이 필요한 곳은 [`SecretToken::expose`]를
//! 명시적으로 호출합니다.

use std::fmt;

use serde::{Serialize, Serializer};

use crate::config::MotherDuckConfig;
use crate::error::DuckformError;
use crate::types::REDACTED;

/// 비밀 토큰
#[derive(Clone, PartialEq, Eq)]
pub struct SecretToken(String);

impl SecretToken {
    /// 토큰을 감쌉니다.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// 원문 토큰. 외부 프로세스/HTTP 헤더로 전달할 때만 사용합니다.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// 주어진 문자열에서 토큰 원문을 가립니다.
    ///
    /// 단순 부분 문자열 치환이므로 토큰과 겹치는 주변 텍스트도 함께 가려질 수 있습니다.
    pub fn redact_in(&self, text: &str) -> String {
        if self.0.is_empty() {
            return text.to_owned();
        }
        text.replace(&self.0, REDACTED)
    }
}

impl fmt::Debug for SecretToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretToken({REDACTED})")
    }
}

impl fmt::Display for SecretToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

impl Serialize for SecretToken {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(REDACTED)
    }
}

/// 실행에 필요한 인증 정보
#[derive(Debug, Clone)]
pub struct Credentials {
    /// MotherDuck 토큰 (SQL 클라이언트, 관리 API, terraform 공용)
    pub token: SecretToken,
}

impl Credentials {
    /// 설정된 환경변수에서 토큰을 읽습니다.
    ///
    /// 변수가 없거나 비어 있으면 [`DuckformError::Precondition`]을 반환합니다.
    /// 이 검사는 어떤 리소스도 만들기 전에 수행되어야 합니다.
    pub fn from_env(config: &MotherDuckConfig) -> Result<Self, DuckformError> {
        let raw = std::env::var(&config.token_env).unwrap_or_default();
        Self::from_value(&config.token_env, raw)
    }

    /// 이미 읽은 값으로 인증 정보를 만듭니다. 빈 값은 거부합니다.
    pub fn from_value(source: &str, raw: impl Into<String>) -> Result<Self, DuckformError> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(DuckformError::Precondition(format!(
                "{source} environment variable must be set"
            )));
        }
        Ok(Self {
            token: SecretToken::new(raw.trim()),
        })
    }
}
