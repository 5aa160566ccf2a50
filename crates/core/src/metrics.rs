//! 메트릭 상수 및 설명 등록
//!
//! 모든 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 크레이트는 이 상수를 사용하여 `metrics::counter!()`,
//! `metrics::histogram!()` 매크로를 호출합니다.
//!
//! 레코더가 설치되지 않은 프로세스에서는 모든 호출이 무시됩니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `duckform_`
//! - 모듈명: `terraform_`, `probe_`
//! - 접미어: `_total` (counter), `_seconds` (histogram)

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// terraform 명령 레이블 키 (init, apply, destroy)
pub const LABEL_COMMAND: &str = "command";

/// 결과 레이블 키 (success, failure / passed, skipped, failed, fatal)
pub const LABEL_RESULT: &str = "result";

/// 리소스 종류 레이블 키 (database, schema, user, token, share, table)
pub const LABEL_KIND: &str = "kind";

// ─── Terraform 메트릭 ──────────────────────────────────────────────

/// Terraform: 실행한 명령 수 (counter, labels: command, result)
pub const TERRAFORM_COMMANDS_TOTAL: &str = "duckform_terraform_commands_total";

/// Terraform: 명령 소요 시간 (histogram, 초, label: command)
pub const TERRAFORM_COMMAND_DURATION_SECONDS: &str = "duckform_terraform_command_duration_seconds";

/// Terraform: 재시도 가능 에러로 인한 재시도 수 (counter, label: command)
pub const TERRAFORM_RETRIES_TOTAL: &str = "duckform_terraform_retries_total";

// ─── Probe 메트릭 ──────────────────────────────────────────────────

/// Probe: 프로브 결과 수 (counter, labels: kind, result)
pub const PROBE_OUTCOMES_TOTAL: &str = "duckform_probe_outcomes_total";

/// Probe: 프로브 소요 시간 (histogram, 초, label: kind)
pub const PROBE_DURATION_SECONDS: &str = "duckform_probe_duration_seconds";

/// Run: 전체 실행 판정 (counter, label: result)
pub const RUNS_TOTAL: &str = "duckform_runs_total";

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 전역 레코더 설치 후 한 번만 호출합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_histogram};

    describe_counter!(
        TERRAFORM_COMMANDS_TOTAL,
        "Terraform commands executed, by command and result"
    );
    describe_histogram!(
        TERRAFORM_COMMAND_DURATION_SECONDS,
        "Terraform command wall-clock duration in seconds"
    );
    describe_counter!(
        TERRAFORM_RETRIES_TOTAL,
        "Terraform command retries triggered by retryable errors"
    );
    describe_counter!(
        PROBE_OUTCOMES_TOTAL,
        "Verification probe outcomes, by resource kind and result"
    );
    describe_histogram!(
        PROBE_DURATION_SECONDS,
        "Verification probe duration in seconds"
    );
    describe_counter!(RUNS_TOTAL, "Acceptance runs, by final verdict");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_names_use_prefix() {
        for name in [
            TERRAFORM_COMMANDS_TOTAL,
            TERRAFORM_COMMAND_DURATION_SECONDS,
            TERRAFORM_RETRIES_TOTAL,
            PROBE_OUTCOMES_TOTAL,
            PROBE_DURATION_SECONDS,
            RUNS_TOTAL,
        ] {
            assert!(name.starts_with("duckform_"), "{name} lacks prefix");
        }
    }

    #[test]
    fn describe_all_without_recorder_is_noop() {
        describe_all();
    }
}
