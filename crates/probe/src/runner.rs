//! 프로브 러너 -- 기대값 목록을 순서대로 검증하고 보고서를 만듭니다.
//!
//! 프로브는 한 번에 하나씩 실행됩니다. `Failed`는 기록만 하고 계속 진행하며,
//! `Fatal`이 나오면 나머지 기대값은 실행하지 않고 `not_run`에 남깁니다.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{error, info, warn};

use duckform_core::config::DuckformConfig;
use duckform_core::credentials::Credentials;
use duckform_core::metrics as m;
use duckform_core::types::{
    Expectation, ProbeMechanism, ProbeOutcome, ProbeRecord, ResourceKind, TokenMatch, UserMatch,
};

use crate::api::{HttpManagementApi, ManagementApi};
use crate::classify::ClassifyPolicy;
use crate::error::ProbeFailure;
use crate::probes::{probe_catalog, probe_token, probe_user};
use crate::sql::{DuckDbCli, MotherDuckConnection, SqlClient};

/// 결과 종류별 개수
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OutcomeCounts {
    /// 통과
    pub passed: usize,
    /// 건너뜀
    pub skipped: usize,
    /// 실패
    pub failed: usize,
    /// 치명적 오류
    pub fatal: usize,
    /// 실행되지 않음
    pub not_run: usize,
}

/// 검증 실행 보고서
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    /// 실행된 프로브 기록 (실행 순서)
    pub records: Vec<ProbeRecord>,
    /// `Fatal` 이후 실행되지 않은 기대값
    pub not_run: Vec<Expectation>,
}

impl RunReport {
    /// `Failed`/`Fatal`이 하나도 없으면 통과
    pub fn passed(&self) -> bool {
        !self.records.iter().any(|r| r.outcome.is_failure())
    }

    /// 결과 종류별 개수
    pub fn counts(&self) -> OutcomeCounts {
        let mut counts = OutcomeCounts {
            not_run: self.not_run.len(),
            ..OutcomeCounts::default()
        };
        for record in &self.records {
            match record.outcome {
                ProbeOutcome::Passed => counts.passed += 1,
                ProbeOutcome::Skipped { .. } => counts.skipped += 1,
                ProbeOutcome::Failed { .. } => counts.failed += 1,
                ProbeOutcome::Fatal { .. } => counts.fatal += 1,
            }
        }
        counts
    }

    /// 첫 번째 `Fatal` 기록
    pub fn fatal(&self) -> Option<&ProbeRecord> {
        self.records.iter().find(|r| r.outcome.aborts_run())
    }
}

/// 프로브 러너
pub struct ProbeRunner<S: SqlClient, A: ManagementApi> {
    sql: Arc<S>,
    api: Arc<A>,
    connection: MotherDuckConnection,
    policy: ClassifyPolicy,
    user_match: UserMatch,
    token_match: TokenMatch,
}

impl ProbeRunner<DuckDbCli, HttpManagementApi> {
    /// 설정과 인증 정보로 운영용 러너를 만듭니다.
    pub fn from_config(
        config: &DuckformConfig,
        credentials: &Credentials,
    ) -> Result<Self, ProbeFailure> {
        let sql = DuckDbCli::from_config(&config.duckdb);
        let api = HttpManagementApi::new(&config.motherduck, credentials.token.clone())?;
        Ok(Self::new(
            Arc::new(sql),
            Arc::new(api),
            MotherDuckConnection::new(credentials.token.clone()),
        )
        .with_policy(ClassifyPolicy::from(&config.probe))
        .with_matching(
            config.probe.user_match_policy(),
            config.probe.token_match_policy(),
        ))
    }
}

impl<S: SqlClient, A: ManagementApi> ProbeRunner<S, A> {
    /// 기본 정책(soft skip, username, exact_name)으로 러너를 만듭니다.
    pub fn new(sql: Arc<S>, api: Arc<A>, connection: MotherDuckConnection) -> Self {
        Self {
            sql,
            api,
            connection,
            policy: ClassifyPolicy::default(),
            user_match: UserMatch::default(),
            token_match: TokenMatch::default(),
        }
    }

    /// 응답 분류 정책을 지정합니다.
    pub fn with_policy(mut self, policy: ClassifyPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// 사용자/토큰 매칭 정책을 지정합니다.
    pub fn with_matching(mut self, user_match: UserMatch, token_match: TokenMatch) -> Self {
        self.user_match = user_match;
        self.token_match = token_match;
        self
    }

    /// 기대값 하나를 검증합니다.
    pub async fn probe(&self, expectation: &Expectation) -> ProbeOutcome {
        match (expectation.mechanism, expectation.kind) {
            (ProbeMechanism::Api, ResourceKind::User) => {
                probe_user(
                    self.api.as_ref(),
                    expectation,
                    &self.policy,
                    self.user_match,
                )
                .await
            }
            (ProbeMechanism::Api, ResourceKind::Token) => {
                probe_token(
                    self.api.as_ref(),
                    expectation,
                    &self.policy,
                    self.token_match,
                )
                .await
            }
            (ProbeMechanism::Sql, _) => {
                probe_catalog(self.sql.as_ref(), &self.connection, expectation).await
            }
            (ProbeMechanism::Api, kind) => ProbeOutcome::Fatal {
                reason: format!("no api probe for {kind}"),
            },
        }
    }

    /// 기대값 목록을 순서대로 검증합니다.
    pub async fn run(&self, expectations: &[Expectation]) -> RunReport {
        let mut report = RunReport::default();

        for (idx, expectation) in expectations.iter().enumerate() {
            let started = Instant::now();
            let outcome = self.probe(expectation).await;
            let elapsed = started.elapsed();

            record_metrics(expectation.kind, &outcome, elapsed.as_secs_f64());
            log_outcome(expectation, &outcome);

            let aborts = outcome.aborts_run();
            report.records.push(ProbeRecord {
                expectation: expectation.clone(),
                outcome,
                elapsed,
            });

            if aborts {
                report.not_run = expectations[idx + 1..].to_vec();
                if !report.not_run.is_empty() {
                    warn!(
                        remaining = report.not_run.len(),
                        "fatal probe outcome, skipping remaining probes"
                    );
                }
                break;
            }
        }

        let counts = report.counts();
        info!(
            passed = counts.passed,
            skipped = counts.skipped,
            failed = counts.failed,
            fatal = counts.fatal,
            not_run = counts.not_run,
            verdict = if report.passed() { "passed" } else { "failed" },
            "verification finished"
        );
        report
    }
}

fn record_metrics(kind: ResourceKind, outcome: &ProbeOutcome, secs: f64) {
    metrics::counter!(
        m::PROBE_OUTCOMES_TOTAL,
        m::LABEL_KIND => kind.as_str(),
        m::LABEL_RESULT => outcome.as_str()
    )
    .increment(1);
    metrics::histogram!(m::PROBE_DURATION_SECONDS, m::LABEL_KIND => kind.as_str()).record(secs);
}

fn log_outcome(expectation: &Expectation, outcome: &ProbeOutcome) {
    match outcome {
        ProbeOutcome::Passed => info!(expectation = %expectation, "probe passed"),
        ProbeOutcome::Skipped { reason } => {
            warn!(expectation = %expectation, reason = %reason, "probe skipped");
        }
        ProbeOutcome::Failed { reason, raw } => {
            error!(expectation = %expectation, reason = %reason, raw = %raw, "probe failed");
        }
        ProbeOutcome::Fatal { reason } => {
            error!(expectation = %expectation, reason = %reason, "probe fatal");
        }
    }
}
