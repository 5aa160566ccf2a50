//! duckform 공통 크레이트
//!
//! 프로비저닝 드라이버(`duckform-terraform`)와 검증 프로브(`duckform-probe`)가
//! 공유하는 에러, 설정, 실행 식별자, 도메인 타입을 정의합니다.

pub mod config;
pub mod credentials;
pub mod error;
pub mod identity;
pub mod metrics;
pub mod plan;
pub mod types;

// --- 주요 타입 re-export ---

// 에러
pub use error::{ConfigError, DuckformError, ProbeError, ProvisionError};

// 설정
pub use config::DuckformConfig;

// 인증
pub use credentials::{Credentials, SecretToken};

// 실행 식별자 / 계획
pub use identity::{RunIdentity, RunNames};
pub use plan::RunPlan;

// 도메인 타입
pub use types::{
    Expectation, ProbeMechanism, ProbeOutcome, ProbeRecord, ProvisionInputs, ResourceKind,
    TokenMatch, UserMatch, VarValue,
};
