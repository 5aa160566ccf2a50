//! 실행 식별자: 타임스탬프 접미어 기반 리소스 이름 생성
//!
//! 한 번의 실행에서 만드는 모든 리소스 이름은 같은 접미어를 공유합니다.
//! 동시 실행 간 충돌 회피는 벽시계(초 단위) 해상도에만 의존하므로,
//! 같은 초에 시작한 두 실행은 이름이 겹칠 수 있습니다.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::config::ShareConfig;

/// 데이터베이스 이름 접두어
pub const DATABASE_PREFIX: &str = "test_db";
/// 스키마 이름 접두어
pub const SCHEMA_PREFIX: &str = "test_schema";
/// 토큰 이름 접두어
pub const TOKEN_PREFIX: &str = "test_token";
/// 사용자 이름 접두어
pub const USER_PREFIX: &str = "test_user";

/// 테스트 실행 식별자
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunIdentity {
    suffix: u64,
}

impl RunIdentity {
    /// 현재 시각(Unix 초)으로 식별자를 생성합니다.
    pub fn now() -> Self {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        Self::from_suffix(secs)
    }

    /// 기존 실행의 접미어로 식별자를 복원합니다.
    pub fn from_suffix(suffix: u64) -> Self {
        Self { suffix }
    }

    /// 접미어
    pub fn suffix(&self) -> u64 {
        self.suffix
    }

    /// `{prefix}_{suffix}` 형식의 이름
    pub fn name(&self, prefix: &str) -> String {
        format!("{prefix}_{}", self.suffix)
    }

    /// 데이터베이스 이름
    pub fn database_name(&self) -> String {
        self.name(DATABASE_PREFIX)
    }

    /// 스키마 이름
    pub fn schema_name(&self) -> String {
        self.name(SCHEMA_PREFIX)
    }

    /// 토큰 이름
    pub fn token_name(&self) -> String {
        self.name(TOKEN_PREFIX)
    }

    /// 사용자 이름
    pub fn user_name(&self) -> String {
        self.name(USER_PREFIX)
    }

    /// 사용자 이메일. 도메인이 비어 있으면 `None`
    pub fn user_email(&self, domain: &str) -> Option<String> {
        let domain = domain.trim().trim_start_matches('@');
        if domain.is_empty() {
            None
        } else {
            Some(format!("{}@{domain}", self.user_name()))
        }
    }

    /// 공유가 연결될 데이터베이스 이름
    pub fn share_name(&self, share: &ShareConfig) -> String {
        self.name(&share.name_prefix)
    }

    /// 이 실행에서 만들어지는 모든 이름 묶음
    pub fn names(&self, shares: &[ShareConfig], email_domain: &str) -> RunNames {
        RunNames {
            suffix: self.suffix,
            database: self.database_name(),
            schema: self.schema_name(),
            token: self.token_name(),
            user: self.user_name(),
            user_email: self.user_email(email_domain),
            shares: shares.iter().map(|s| self.share_name(s)).collect(),
        }
    }
}

/// 한 실행의 리소스 이름 묶음
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunNames {
    /// 공통 접미어
    pub suffix: u64,
    /// 데이터베이스 이름
    pub database: String,
    /// 스키마 이름
    pub schema: String,
    /// 토큰 이름
    pub token: String,
    /// 사용자 이름
    pub user: String,
    /// 사용자 이메일
    pub user_email: Option<String>,
    /// 공유 데이터베이스 이름 (설정 순서)
    pub shares: Vec<String>,
}

impl RunNames {
    /// 모든 이름을 순회합니다.
    pub fn all(&self) -> impl Iterator<Item = &str> {
        [
            self.database.as_str(),
            self.schema.as_str(),
            self.token.as_str(),
            self.user.as_str(),
        ]
        .into_iter()
        .chain(self.user_email.as_deref())
        .chain(self.shares.iter().map(String::as_str))
    }
}
