//! 설정 관리: duckform.toml 파싱 및 런타임 설정
//!
//! [`DuckformConfig`]는 프로비저닝 드라이버와 검증 프로브가 사용하는
//! 모든 설정을 담는 최상위 구조체입니다. 프로세스 시작 시 한 번 로드되어
//! 각 컴포넌트 생성자에 명시적으로 전달됩니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`DUCKFORM_TERRAFORM_DIR=./module` 형식)
//! 3. 설정 파일 (`duckform.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! 인증 토큰은 설정 파일에 두지 않습니다. [`MotherDuckConfig::token_env`]가
//! 가리키는 환경변수에서 [`Credentials`](crate::credentials::Credentials)로 읽습니다.
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), duckform_core::error::DuckformError> {
//! use duckform_core::config::DuckformConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = DuckformConfig::load("duckform.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = DuckformConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{ConfigError, DuckformError};
use crate::types::{TokenMatch, UserMatch};

/// duckform 통합 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DuckformConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// MotherDuck 접속 설정
    #[serde(default)]
    pub motherduck: MotherDuckConfig,
    /// terraform 실행 설정
    #[serde(default)]
    pub terraform: TerraformConfig,
    /// duckdb CLI 설정
    #[serde(default)]
    pub duckdb: DuckDbConfig,
    /// 실행 입력값 설정
    #[serde(default)]
    pub run: RunConfig,
    /// 프로브 판정 정책
    #[serde(default)]
    pub probe: ProbeConfig,
    /// 메트릭 내보내기 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl DuckformConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, DuckformError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// 파일이 있으면 [`load`](Self::load)와 같고, 없으면 기본값에
    /// 환경변수 오버라이드만 적용합니다.
    pub async fn load_or_default(path: impl AsRef<Path>) -> Result<Self, DuckformError> {
        let path = path.as_ref();
        if tokio::fs::try_exists(path).await.unwrap_or(false) {
            return Self::load(path).await;
        }
        debug!(path = %path.display(), "config file not found, using defaults");
        let mut config = Self::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, DuckformError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                DuckformError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                DuckformError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, DuckformError> {
        toml::from_str(toml_str).map_err(|e| {
            DuckformError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `DUCKFORM_{SECTION}_{FIELD}`
    /// 예: `DUCKFORM_TERRAFORM_DIR=./module`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "DUCKFORM_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "DUCKFORM_GENERAL_LOG_FORMAT");

        // MotherDuck
        override_string(&mut self.motherduck.token_env, "DUCKFORM_MOTHERDUCK_TOKEN_ENV");
        override_string(
            &mut self.motherduck.api_base_url,
            "DUCKFORM_MOTHERDUCK_API_BASE_URL",
        );
        override_u64(
            &mut self.motherduck.api_timeout_secs,
            "DUCKFORM_MOTHERDUCK_API_TIMEOUT_SECS",
        );

        // Terraform
        override_string(&mut self.terraform.binary, "DUCKFORM_TERRAFORM_BINARY");
        override_string(&mut self.terraform.dir, "DUCKFORM_TERRAFORM_DIR");
        override_u32(
            &mut self.terraform.max_retries,
            "DUCKFORM_TERRAFORM_MAX_RETRIES",
        );
        override_u64(
            &mut self.terraform.time_between_retries_secs,
            "DUCKFORM_TERRAFORM_TIME_BETWEEN_RETRIES_SECS",
        );
        override_bool(&mut self.terraform.no_color, "DUCKFORM_TERRAFORM_NO_COLOR");

        // DuckDB
        override_string(&mut self.duckdb.binary, "DUCKFORM_DUCKDB_BINARY");
        override_u64(&mut self.duckdb.timeout_secs, "DUCKFORM_DUCKDB_TIMEOUT_SECS");

        // Run
        override_u32(
            &mut self.run.token_expiry_days,
            "DUCKFORM_RUN_TOKEN_EXPIRY_DAYS",
        );
        override_string(
            &mut self.run.user_email_domain,
            "DUCKFORM_RUN_USER_EMAIL_DOMAIN",
        );
        override_csv(&mut self.run.expected_tables, "DUCKFORM_RUN_EXPECTED_TABLES");

        // Probe
        override_bool(
            &mut self.probe.soft_skip_on_permission,
            "DUCKFORM_PROBE_SOFT_SKIP_ON_PERMISSION",
        );
        override_string(&mut self.probe.user_match, "DUCKFORM_PROBE_USER_MATCH");
        override_string(&mut self.probe.token_match, "DUCKFORM_PROBE_TOKEN_MATCH");

        // Metrics
        override_string(
            &mut self.metrics.textfile_path,
            "DUCKFORM_METRICS_TEXTFILE_PATH",
        );
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), DuckformError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        if self.motherduck.token_env.trim().is_empty() {
            return Err(invalid("motherduck.token_env", "must not be empty"));
        }

        if !self.motherduck.api_base_url.starts_with("http://")
            && !self.motherduck.api_base_url.starts_with("https://")
        {
            return Err(invalid(
                "motherduck.api_base_url",
                "must start with http:// or https://",
            ));
        }

        if self.motherduck.api_timeout_secs == 0 {
            return Err(invalid(
                "motherduck.api_timeout_secs",
                "must be greater than 0",
            ));
        }

        if self.terraform.binary.is_empty() {
            return Err(invalid("terraform.binary", "must not be empty"));
        }

        if self.terraform.dir.is_empty() {
            return Err(invalid("terraform.dir", "must not be empty"));
        }

        if self.terraform.max_retries > MAX_TERRAFORM_RETRIES {
            return Err(invalid(
                "terraform.max_retries",
                format!("must be at most {MAX_TERRAFORM_RETRIES}"),
            ));
        }

        if self.duckdb.binary.is_empty() {
            return Err(invalid("duckdb.binary", "must not be empty"));
        }

        if self.duckdb.timeout_secs == 0 {
            return Err(invalid("duckdb.timeout_secs", "must be greater than 0"));
        }

        if self.run.token_expiry_days == 0 {
            return Err(invalid("run.token_expiry_days", "must be greater than 0"));
        }

        for (idx, share) in self.run.shares.iter().enumerate() {
            if !share.url.starts_with("md:") {
                return Err(invalid(
                    &format!("run.shares[{idx}].url"),
                    "must be an md: share URL",
                ));
            }
            if !is_identifier(&share.name_prefix) {
                return Err(invalid(
                    &format!("run.shares[{idx}].name_prefix"),
                    "must contain only ASCII letters, digits and '_'",
                ));
            }
            if self.run.shares[..idx]
                .iter()
                .any(|prev| prev.name_prefix == share.name_prefix)
            {
                return Err(invalid(
                    &format!("run.shares[{idx}].name_prefix"),
                    format!("'{}' is already used by another share", share.name_prefix),
                ));
            }
        }

        for table in &self.run.expected_tables {
            if !is_identifier(table) {
                return Err(invalid(
                    "run.expected_tables",
                    format!("'{table}' is not a plain table name"),
                ));
            }
        }

        if !self.run.expected_tables.is_empty() && self.run.shares.is_empty() {
            return Err(invalid(
                "run.expected_tables",
                "requires at least one entry in run.shares",
            ));
        }

        if self.probe.user_match.parse::<UserMatch>().is_err() {
            return Err(invalid(
                "probe.user_match",
                format!("must be one of: {}", UserMatch::VARIANTS.join(", ")),
            ));
        }

        if self.probe.token_match.parse::<TokenMatch>().is_err() {
            return Err(invalid(
                "probe.token_match",
                format!("must be one of: {}", TokenMatch::VARIANTS.join(", ")),
            ));
        }

        if self.probe.user_match == UserMatch::Email.as_str()
            && self.run.user_email_domain.is_empty()
        {
            return Err(invalid(
                "probe.user_match",
                "'email' requires run.user_email_domain to be set",
            ));
        }

        Ok(())
    }
}

/// terraform 재시도 상한
const MAX_TERRAFORM_RETRIES: u32 = 20;

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "pretty".to_owned(),
        }
    }
}

/// MotherDuck 접속 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MotherDuckConfig {
    /// 인증 토큰을 읽을 환경변수 이름
    pub token_env: String,
    /// 관리 API 기본 URL
    pub api_base_url: String,
    /// 관리 API 요청 타임아웃 (초)
    pub api_timeout_secs: u64,
}

impl Default for MotherDuckConfig {
    fn default() -> Self {
        Self {
            token_env: "MOTHERDUCK_TOKEN".to_owned(),
            api_base_url: "https://api.motherduck.com".to_owned(),
            api_timeout_secs: 30,
        }
    }
}

/// terraform 실행 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TerraformConfig {
    /// terraform 바이너리 경로
    pub binary: String,
    /// terraform 모듈 디렉토리
    pub dir: String,
    /// 재시도 가능한 에러의 최대 재시도 횟수
    pub max_retries: u32,
    /// 재시도 간격 (초)
    pub time_between_retries_secs: u64,
    /// 기본 목록에 추가할 재시도 가능 에러 정규식
    pub retryable_errors: Vec<String>,
    /// `-no-color` 전달 여부
    pub no_color: bool,
}

impl Default for TerraformConfig {
    fn default() -> Self {
        Self {
            binary: "terraform".to_owned(),
            dir: ".".to_owned(),
            max_retries: 3,
            time_between_retries_secs: 5,
            retryable_errors: Vec::new(),
            no_color: true,
        }
    }
}

/// duckdb CLI 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DuckDbConfig {
    /// duckdb 바이너리 경로
    pub binary: String,
    /// 쿼리 하나당 타임아웃 (초)
    pub timeout_secs: u64,
}

impl Default for DuckDbConfig {
    fn default() -> Self {
        Self {
            binary: "duckdb".to_owned(),
            timeout_secs: 120,
        }
    }
}

/// 데이터 공유(share) 설정
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareConfig {
    /// `md:_share/...` 형식의 공유 URL
    pub url: String,
    /// 연결(attach)될 데이터베이스 이름 접두어. 실제 이름은 `{prefix}_{suffix}`
    pub name_prefix: String,
}

/// 실행 입력값 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// 생성할 토큰 만료 기간 (일)
    pub token_expiry_days: u32,
    /// 사용자 이메일 도메인. 비어 있으면 이메일 변수를 전달하지 않음
    pub user_email_domain: String,
    /// 연결할 공유 목록
    pub shares: Vec<ShareConfig>,
    /// 첫 번째 공유에 있어야 할 테이블 이름 목록
    pub expected_tables: Vec<String>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            token_expiry_days: 7,
            user_email_domain: String::new(),
            shares: vec![ShareConfig {
                url: "md:_share/sample_data/23b0d623-1361-421d-ae77-62d701d471e6".to_owned(),
                name_prefix: "test_sample_data".to_owned(),
            }],
            expected_tables: [
                "hacker_news",
                "taxi",
                "rideshare",
                "service_requests",
                "ambient_air_quality",
            ]
            .iter()
            .map(|s| (*s).to_owned())
            .collect(),
        }
    }
}

/// 프로브 판정 정책
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// 권한 부족 응답을 건너뛰기(skip)로 처리할지 여부. false면 실패
    pub soft_skip_on_permission: bool,
    /// 사용자 매칭 기준 (username, email)
    pub user_match: String,
    /// 토큰 매칭 기준 (exact_name, any, most_recent)
    pub token_match: String,
}

impl ProbeConfig {
    /// 검증된 사용자 매칭 정책. 알 수 없는 값이면 기본값
    pub fn user_match_policy(&self) -> UserMatch {
        self.user_match.parse().unwrap_or_default()
    }

    /// 검증된 토큰 매칭 정책. 알 수 없는 값이면 기본값
    pub fn token_match_policy(&self) -> TokenMatch {
        self.token_match.parse().unwrap_or_default()
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            soft_skip_on_permission: true,
            user_match: UserMatch::default().as_str().to_owned(),
            token_match: TokenMatch::default().as_str().to_owned(),
        }
    }
}

/// 메트릭 내보내기 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Prometheus textfile 경로. 비어 있으면 비활성화
    pub textfile_path: String,
}

impl MetricsConfig {
    /// 메트릭 내보내기 활성화 여부
    pub fn enabled(&self) -> bool {
        !self.textfile_path.is_empty()
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> DuckformError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason: reason.into(),
    }
    .into()
}

/// terraform 변수나 SQL 리터럴로 안전하게 쓸 수 있는 단순 식별자인지 확인
fn is_identifier(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_u32(target: &mut u32, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u32>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u32 from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}

fn override_csv(target: &mut Vec<String>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val
            .split(',')
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect();
    }
}
