//! 관리 API 응답 모델
//!
//! 응답은 배열 그대로(`[...]`)이거나 객체로 감싼 형태(`{"users": [...]}`)일 수 있어
//! 두 모양을 모두 받습니다.

use std::cmp::Ordering;

use serde::Deserialize;

/// 사용자
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct User {
    /// 사용자 이름
    #[serde(default)]
    pub username: String,
    /// 이메일
    #[serde(default)]
    pub email: Option<String>,
}

/// 사용자 목록 응답
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum UserList {
    /// `[...]`
    Bare(Vec<User>),
    /// `{"users": [...]}`
    Wrapped {
        /// 사용자 목록
        users: Vec<User>,
    },
}

impl UserList {
    /// 사용자 목록
    pub fn into_vec(self) -> Vec<User> {
        match self {
            Self::Bare(users) | Self::Wrapped { users } => users,
        }
    }
}

/// 토큰 생성 시각
///
/// 유닉스 타임스탬프 숫자 또는 RFC 3339 문자열로 올 수 있습니다.
/// 같은 형식끼리 비교하며, 숫자는 항상 문자열보다 작게 정렬됩니다.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum CreatedTs {
    /// 유닉스 타임스탬프
    Epoch(f64),
    /// 문자열 타임스탬프
    Text(String),
}

impl CreatedTs {
    fn cmp_key(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Epoch(a), Self::Epoch(b)) => a.total_cmp(b),
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            (Self::Epoch(_), Self::Text(_)) => Ordering::Less,
            (Self::Text(_), Self::Epoch(_)) => Ordering::Greater,
        }
    }
}

/// API 토큰
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Token {
    /// 토큰 이름
    #[serde(default)]
    pub name: String,
    /// 생성 시각
    #[serde(default)]
    pub created_ts: Option<CreatedTs>,
}

/// 토큰 목록 응답
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TokenList {
    /// `[...]`
    Bare(Vec<Token>),
    /// `{"tokens": [...]}`
    Wrapped {
        /// 토큰 목록
        tokens: Vec<Token>,
    },
}

impl TokenList {
    /// 토큰 목록
    pub fn into_vec(self) -> Vec<Token> {
        match self {
            Self::Bare(tokens) | Self::Wrapped { tokens } => tokens,
        }
    }
}

/// `created_ts`가 가장 큰 토큰을 고릅니다.
///
/// 생성 시각이 없는 토큰은 제외합니다. 시각이 같으면 이름이 큰 쪽을 골라
/// 입력 순서와 무관하게 같은 결과를 냅니다.
pub fn most_recent_token(tokens: &[Token]) -> Option<&Token> {
    tokens
        .iter()
        .filter(|t| t.created_ts.is_some())
        .max_by(|a, b| match (&a.created_ts, &b.created_ts) {
            (Some(x), Some(y)) => x.cmp_key(y).then_with(|| a.name.cmp(&b.name)),
            _ => Ordering::Equal,
        })
}
