//! duckform terraform 크레이트
//!
//! terraform CLI를 외부 도구로 호출하여 모듈을 apply/destroy 합니다.
//!
//! - [`TerraformRunner`]: terraform 호출 추상화 ([`CommandTerraform`]이 운영 구현)
//! - [`run_with_retries`]: 일시적 에러 패턴 기반 재시도
//! - [`ProvisionDriver`]: `NotApplied → Applied → Destroyed` 상태 기계와 보장된 정리

pub mod driver;
pub mod error;
pub mod options;
pub mod retry;
pub mod runner;

pub use driver::{ProvisionDriver, ProvisionState, Scoped, Teardown};
pub use error::TerraformError;
pub use options::{DEFAULT_RETRYABLE_ERRORS, TerraformCommand, TerraformOptions};
pub use retry::run_with_retries;
pub use runner::{CommandOutput, CommandTerraform, TerraformRunner};
