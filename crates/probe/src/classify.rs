//! 관리 API 응답 분류
//!
//! 모든 API 프로브는 [`classify_response`] 하나로 응답을 판정합니다.
//! 구조화된 파싱 전에 원본 본문에서 알려진 에러 마커를 먼저 찾습니다.
//!
//! | 조건 | 결과 |
//! |---|---|
//! | 본문에 `Invalid MotherDuck token` | `Fatal` |
//! | 본문에 `UNAUTHORIZED` / `Not Found` | `Skipped` (soft skip 비활성 시 `Failed`) |
//! | 2xx 가 아닌 상태 | `Fatal` |
//! | 파싱 실패 | `Fatal` |
//! | 그 외 | `Ok(T)` |

use serde::de::DeserializeOwned;

use duckform_core::config::ProbeConfig;
use duckform_core::types::ProbeOutcome;

use crate::api::ApiResponse;

/// 인증 실패 마커
pub const INVALID_TOKEN_MARKER: &str = "Invalid MotherDuck token";

/// 권한 부족 마커
pub const PERMISSION_MARKERS: [&str; 2] = ["UNAUTHORIZED", "Not Found"];

/// 분류 정책
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassifyPolicy {
    /// 권한 부족을 건너뛰기로 처리할지 여부
    pub soft_skip_on_permission: bool,
}

impl Default for ClassifyPolicy {
    fn default() -> Self {
        Self {
            soft_skip_on_permission: true,
        }
    }
}

impl From<&ProbeConfig> for ClassifyPolicy {
    fn from(config: &ProbeConfig) -> Self {
        Self {
            soft_skip_on_permission: config.soft_skip_on_permission,
        }
    }
}

/// 분류 결과
#[derive(Debug, Clone, PartialEq)]
pub enum Classified<T> {
    /// 치명적 오류. 나머지 프로브 중단
    Fatal {
        /// 사유
        reason: String,
    },
    /// 권한 부족으로 건너뜀
    Skipped {
        /// 사유
        reason: String,
    },
    /// 권한 부족을 실패로 처리 (soft skip 비활성)
    Failed {
        /// 사유
        reason: String,
        /// 원본 응답
        raw: String,
    },
    /// 정상 응답
    Ok(T),
}

impl<T> Classified<T> {
    /// `Ok`가 아닌 결과를 프로브 결과로 변환합니다. `Ok`면 값을 돌려줍니다.
    pub fn into_value(self) -> Result<T, ProbeOutcome> {
        match self {
            Self::Ok(value) => Ok(value),
            Self::Fatal { reason } => Err(ProbeOutcome::Fatal { reason }),
            Self::Skipped { reason } => Err(ProbeOutcome::Skipped { reason }),
            Self::Failed { reason, raw } => Err(ProbeOutcome::Failed { reason, raw }),
        }
    }
}

/// 응답을 분류하고, 정상이면 `T`로 파싱합니다.
pub fn classify_response<T: DeserializeOwned>(
    response: &ApiResponse,
    policy: &ClassifyPolicy,
) -> Classified<T> {
    let body = response.body.as_str();

    if body.contains(INVALID_TOKEN_MARKER) {
        return Classified::Fatal {
            reason: INVALID_TOKEN_MARKER.to_owned(),
        };
    }

    if let Some(marker) = PERMISSION_MARKERS.iter().find(|m| body.contains(*m)) {
        let reason = format!("insufficient permissions ({marker})");
        return if policy.soft_skip_on_permission {
            Classified::Skipped { reason }
        } else {
            Classified::Failed {
                reason,
                raw: body.to_owned(),
            }
        };
    }

    if !response.is_success() {
        return Classified::Fatal {
            reason: format!("unexpected http status {}", response.status),
        };
    }

    match serde_json::from_str(body) {
        Ok(value) => Classified::Ok(value),
        Err(e) => Classified::Fatal {
            reason: format!("malformed api response: {e}"),
        },
    }
}
