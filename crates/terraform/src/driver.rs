//! 프로비저닝 드라이버 -- init/apply 후 검증 본문을 실행하고 반드시 destroy
//!
//! [`ProvisionDriver`]는 `NotApplied → Applied → Destroyed` 상태 기계입니다.
//! destroy는 드라이버당 최대 한 번 실행되며, 두 번째 호출은 경고만 남깁니다.
//!
//! [`ProvisionDriver::scoped`]는 apply 실패, 본문 에러, 본문 패닉 모든 경우에
//! destroy를 실행합니다. 패닉은 정리 후 다시 전파됩니다.

use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};

use duckform_core::error::DuckformError;

use crate::error::TerraformError;
use crate::options::{TerraformCommand, TerraformOptions};
use crate::retry::run_with_retries;
use crate::runner::TerraformRunner;

/// 드라이버 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisionState {
    /// 아직 apply되지 않음 (apply 실패 포함)
    NotApplied,
    /// apply 성공
    Applied,
    /// destroy 실행됨 (성공 여부와 무관)
    Destroyed,
}

/// 정리(destroy) 결과
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Teardown {
    /// destroy 성공
    Destroyed,
    /// destroy 실패. 리소스가 남아 있을 수 있음
    Failed {
        /// 실패 사유
        reason: String,
    },
    /// 의도적으로 남겨 둠 (`--keep`)
    Kept,
}

impl Teardown {
    /// 정리가 성공했는지 여부
    pub fn is_clean(&self) -> bool {
        matches!(self, Self::Destroyed)
    }
}

/// [`ProvisionDriver::scoped`] 실행 결과
///
/// 본문 판정(`result`)과 정리 결과(`teardown`)는 독립적입니다.
/// destroy 실패가 본문 판정을 덮어쓰지 않습니다.
#[derive(Debug)]
pub struct Scoped<T> {
    /// apply 또는 본문의 결과
    pub result: Result<T, DuckformError>,
    /// 정리 결과
    pub teardown: Teardown,
}

enum BodyOutcome<T> {
    Finished(Result<T, DuckformError>),
    Panicked(Box<dyn std::any::Any + Send + 'static>),
}

/// 프로비저닝 드라이버
pub struct ProvisionDriver<R: TerraformRunner> {
    runner: Arc<R>,
    options: TerraformOptions,
    state: ProvisionState,
    initialized: bool,
}

impl<R: TerraformRunner> ProvisionDriver<R> {
    /// 새 드라이버를 생성합니다.
    pub fn new(runner: Arc<R>, options: TerraformOptions) -> Self {
        Self {
            runner,
            options,
            state: ProvisionState::NotApplied,
            initialized: false,
        }
    }

    /// 현재 상태
    pub fn state(&self) -> ProvisionState {
        self.state
    }

    /// 실행 옵션
    pub fn options(&self) -> &TerraformOptions {
        &self.options
    }

    /// `init` 후 `apply`를 실행합니다.
    ///
    /// `NotApplied` 상태에서만 호출할 수 있습니다. 실패해도 상태는 `NotApplied`로
    /// 남으며, 부분적으로 생성된 리소스 정리를 위해 [`destroy`](Self::destroy)를
    /// 호출해야 합니다.
    pub async fn apply(&mut self) -> Result<(), TerraformError> {
        if self.state != ProvisionState::NotApplied {
            return Err(TerraformError::InvalidState(format!(
                "apply requires not_applied, driver is {:?}",
                self.state
            )));
        }

        self.ensure_initialized().await?;
        run_with_retries(self.runner.as_ref(), TerraformCommand::Apply, &self.options).await?;
        self.state = ProvisionState::Applied;
        info!(dir = %self.options.dir.display(), "terraform apply complete");
        Ok(())
    }

    /// `destroy`를 실행합니다. 드라이버당 한 번만 실제로 실행됩니다.
    ///
    /// apply 없이 호출하면 (이전 실행이 남긴 리소스 정리) 먼저 `init`을 실행합니다.
    /// 실패해도 상태는 `Destroyed`가 되며 다시 시도하지 않습니다.
    pub async fn destroy(&mut self) -> Result<(), TerraformError> {
        if self.state == ProvisionState::Destroyed {
            warn!("destroy already ran for this driver, skipping");
            return Ok(());
        }
        self.state = ProvisionState::Destroyed;

        self.ensure_initialized().await?;
        run_with_retries(
            self.runner.as_ref(),
            TerraformCommand::Destroy,
            &self.options,
        )
        .await?;
        info!(dir = %self.options.dir.display(), "terraform destroy complete");
        Ok(())
    }

    /// apply → 본문 → destroy 순으로 실행합니다.
    ///
    /// - apply 실패: 본문을 실행하지 않고 destroy 후 apply 에러 반환
    /// - 본문 에러: destroy 후 본문 에러 반환
    /// - 본문 패닉: destroy 후 패닉 재전파
    ///
    /// 본문은 별도 태스크에서 실행되므로 `'static` 이어야 합니다.
    pub async fn scoped<F, Fut, T>(mut self, body: F) -> Scoped<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, DuckformError>> + Send + 'static,
        T: Send + 'static,
    {
        let outcome = match self.apply().await {
            Err(e) => {
                error!(error = %e, output = ?e.output(), "provisioning failed, tearing down");
                BodyOutcome::Finished(Err(e.into()))
            }
            Ok(()) => match tokio::spawn(body()).await {
                Ok(result) => BodyOutcome::Finished(result),
                Err(join_err) if join_err.is_panic() => {
                    error!("verification body panicked, tearing down");
                    BodyOutcome::Panicked(join_err.into_panic())
                }
                Err(join_err) => BodyOutcome::Finished(Err(DuckformError::Provision(
                    duckform_core::error::ProvisionError::InvalidState(format!(
                        "verification task did not complete: {join_err}"
                    )),
                ))),
            },
        };

        let teardown = self.teardown().await;

        match outcome {
            BodyOutcome::Finished(result) => Scoped { result, teardown },
            BodyOutcome::Panicked(payload) => std::panic::resume_unwind(payload),
        }
    }

    /// destroy를 실행하고 결과를 [`Teardown`]으로 변환합니다. 에러는 로그만 남깁니다.
    pub async fn teardown(&mut self) -> Teardown {
        match self.destroy().await {
            Ok(()) => Teardown::Destroyed,
            Err(e) => {
                error!(
                    error = %e,
                    output = ?e.output(),
                    "terraform destroy failed, resources may be left behind"
                );
                Teardown::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }

    async fn ensure_initialized(&mut self) -> Result<(), TerraformError> {
        if !self.initialized {
            run_with_retries(self.runner.as_ref(), TerraformCommand::Init, &self.options).await?;
            self.initialized = true;
        }
        Ok(())
    }
}
