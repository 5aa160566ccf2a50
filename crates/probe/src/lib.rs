//! duckform 검증 프로브 크레이트
//!
//! apply 이후 리소스가 실제로 존재하는지 외부 경로로 확인합니다.
//!
//! - [`SqlClient`] / [`DuckDbCli`]: `duckdb` CLI로 카탈로그 조회
//! - [`ManagementApi`] / [`HttpManagementApi`]: MotherDuck 관리 API 조회
//! - [`classify_response`]: API 응답의 Fatal / Skipped / Ok 판정
//! - [`ProbeRunner`]: 기대값 목록을 순서대로 검증하고 [`RunReport`] 생성

pub mod api;
pub mod classify;
pub mod error;
pub mod models;
pub mod probes;
pub mod runner;
pub mod sql;

pub use api::{ApiResponse, Endpoint, HttpManagementApi, ManagementApi};
pub use classify::{Classified, ClassifyPolicy, classify_response};
pub use error::ProbeFailure;
pub use models::{Token, TokenList, User, UserList, most_recent_token};
pub use runner::{OutcomeCounts, ProbeRunner, RunReport};
pub use sql::{DuckDbCli, MotherDuckConnection, QueryRows, SqlClient};
