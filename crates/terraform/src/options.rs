//! terraform 실행 옵션 및 명령 인자 구성
//!
//! [`TerraformOptions`]는 작업 디렉토리, 변수, 재시도 정책을 묶고
//! [`TerraformCommand`]는 하위 명령별 인자 목록을 만듭니다.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use regex::Regex;

use duckform_core::config::TerraformConfig;
use duckform_core::types::ProvisionInputs;

use crate::error::TerraformError;

/// 일시적인 네트워크/레지스트리 장애로 간주하는 기본 에러 패턴
///
/// (정규식, 설명) 쌍입니다. 설정의 `terraform.retryable_errors`는 이 목록 뒤에 추가됩니다.
pub const DEFAULT_RETRYABLE_ERRORS: &[(&str, &str)] = &[
    (
        r".*read: connection reset by peer.*",
        "connection reset by remote",
    ),
    (r".*transport is closing.*", "provider transport closed"),
    (
        r".*unable to verify signature.*",
        "plugin signature fetch failed",
    ),
    (
        r".*unable to verify checksum.*",
        "plugin checksum fetch failed",
    ),
    (
        r".*no provider exists with the given name.*",
        "provider registry lookup failed",
    ),
    (
        r".*registry service is unreachable.*",
        "provider registry unreachable",
    ),
    (r".*Error installing provider.*", "provider install failed"),
    (
        r".*Failed to query available provider packages.*",
        "provider registry query failed",
    ),
    (
        r".*timeout while waiting for plugin to start.*",
        "plugin start timeout",
    ),
    (
        r".*timed out waiting for server handshake.*",
        "plugin handshake timeout",
    ),
    (
        r"could not query provider registry for",
        "provider registry query failed",
    ),
    (
        r".*Provider produced inconsistent result after apply.*",
        "provider eventual consistency",
    ),
];

/// terraform 하위 명령
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TerraformCommand {
    /// `terraform init`
    Init,
    /// `terraform apply`
    Apply,
    /// `terraform destroy`
    Destroy,
}

impl TerraformCommand {
    /// 메트릭 레이블/로그용 고정 이름
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Apply => "apply",
            Self::Destroy => "destroy",
        }
    }

    /// 바이너리 뒤에 붙는 전체 인자 목록 (비밀 값 포함)
    pub fn args(&self, options: &TerraformOptions) -> Vec<String> {
        let mut args = vec![self.as_str().to_owned()];
        match self {
            Self::Init => {
                args.push("-upgrade=false".to_owned());
                args.push("-input=false".to_owned());
            }
            Self::Apply => {
                args.push("-input=false".to_owned());
                args.push("-auto-approve".to_owned());
                args.push("-lock=false".to_owned());
            }
            Self::Destroy => {
                args.push("-auto-approve".to_owned());
                args.push("-input=false".to_owned());
            }
        }
        if options.no_color {
            args.push("-no-color".to_owned());
        }
        if matches!(self, Self::Apply | Self::Destroy) {
            args.extend(options.vars.to_var_args());
        }
        args
    }

    /// 로그용 명령줄. 비밀 변수 값은 가려집니다.
    pub fn display_line(&self, options: &TerraformOptions) -> String {
        let line = format!("{} {}", options.binary, self.args(options).join(" "));
        options.vars.redact_in(&line)
    }
}

impl fmt::Display for TerraformCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// terraform 실행 옵션
#[derive(Debug, Clone)]
pub struct TerraformOptions {
    /// terraform 바이너리
    pub binary: String,
    /// 모듈 디렉토리
    pub dir: PathBuf,
    /// `-var` 로 전달할 변수
    pub vars: ProvisionInputs,
    /// 재시도 가능한 에러의 최대 재시도 횟수
    pub max_retries: u32,
    /// 재시도 간격
    pub time_between_retries: Duration,
    /// 재시도 가능 에러 패턴
    pub retryable_errors: Vec<Regex>,
    /// `-no-color` 전달 여부
    pub no_color: bool,
}

impl TerraformOptions {
    /// 설정과 입력 변수로 옵션을 생성합니다.
    ///
    /// 기본 재시도 패턴 뒤에 설정의 추가 패턴을 붙입니다.
    /// 잘못된 정규식이 있으면 [`TerraformError::InvalidPattern`]을 반환합니다.
    pub fn from_config(
        config: &TerraformConfig,
        vars: ProvisionInputs,
    ) -> Result<Self, TerraformError> {
        let patterns = DEFAULT_RETRYABLE_ERRORS
            .iter()
            .map(|(pattern, _)| *pattern)
            .chain(config.retryable_errors.iter().map(String::as_str));
        let retryable_errors = compile_patterns(patterns)?;

        Ok(Self {
            binary: config.binary.clone(),
            dir: PathBuf::from(&config.dir),
            vars,
            max_retries: config.max_retries,
            time_between_retries: Duration::from_secs(config.time_between_retries_secs),
            retryable_errors,
            no_color: config.no_color,
        })
    }

    /// 출력에서 재시도 가능한 에러 패턴을 찾습니다.
    ///
    /// terraform 출력은 여러 줄이므로 줄 단위로 검사합니다.
    pub fn retryable_match(&self, output: &str) -> Option<&Regex> {
        self.retryable_errors
            .iter()
            .find(|re| output.lines().any(|line| re.is_match(line)))
    }
}

fn compile_patterns<'a>(
    patterns: impl Iterator<Item = &'a str>,
) -> Result<Vec<Regex>, TerraformError> {
    patterns
        .map(|pattern| {
            Regex::new(pattern).map_err(|e| TerraformError::InvalidPattern {
                pattern: pattern.to_owned(),
                reason: e.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> TerraformOptions {
        let mut vars = ProvisionInputs::new();
        vars.set_secret("motherduck_token", "md-secret")
            .set("database_name", "test_db_1");
        TerraformOptions::from_config(&TerraformConfig::default(), vars).unwrap()
    }

    #[test]
    fn default_patterns_compile() {
        let opts = options();
        assert_eq!(opts.retryable_errors.len(), DEFAULT_RETRYABLE_ERRORS.len());
        assert_eq!(opts.max_retries, 3);
        assert_eq!(opts.time_between_retries, Duration::from_secs(5));
    }

    #[test]
    fn extra_patterns_are_appended() {
        let config = TerraformConfig {
            retryable_errors: vec![r".*429 Too Many Requests.*".to_owned()],
            ..TerraformConfig::default()
        };
        let opts = TerraformOptions::from_config(&config, ProvisionInputs::new()).unwrap();
        assert_eq!(
            opts.retryable_errors.len(),
            DEFAULT_RETRYABLE_ERRORS.len() + 1
        );
        assert!(
            opts.retryable_match("Error: 429 Too Many Requests")
                .is_some()
        );
    }

    #[test]
    fn invalid_extra_pattern_is_rejected() {
        let config = TerraformConfig {
            retryable_errors: vec!["(unclosed".to_owned()],
            ..TerraformConfig::default()
        };
        let err = TerraformOptions::from_config(&config, ProvisionInputs::new()).unwrap_err();
        assert!(matches!(err, TerraformError::InvalidPattern { .. }));
    }

    #[test]
    fn retryable_match_scans_multiline_output() {
        let opts = options();
        let output = "Initializing provider plugins...\n\
                      Error: Failed to query available provider packages\n\
                      more context";
        assert!(opts.retryable_match(output).is_some());
        assert!(
            opts.retryable_match("Error: Invalid MotherDuck token")
                .is_none()
        );
    }

    #[test]
    fn init_args() {
        let opts = options();
        assert_eq!(
            TerraformCommand::Init.args(&opts),
            vec!["init", "-upgrade=false", "-input=false", "-no-color"]
        );
    }

    #[test]
    fn apply_args_include_vars() {
        let opts = options();
        let args = TerraformCommand::Apply.args(&opts);
        assert_eq!(
            &args[..5],
            &[
                "apply",
                "-input=false",
                "-auto-approve",
                "-lock=false",
                "-no-color"
            ]
        );
        assert!(args.contains(&"database_name=test_db_1".to_owned()));
        assert!(args.contains(&"motherduck_token=md-secret".to_owned()));
    }

    #[test]
    fn destroy_args_without_color_flag() {
        let mut opts = options();
        opts.no_color = false;
        let args = TerraformCommand::Destroy.args(&opts);
        assert_eq!(&args[..3], &["destroy", "-auto-approve", "-input=false"]);
        assert!(!args.contains(&"-no-color".to_owned()));
        assert!(args.contains(&"-var".to_owned()));
    }

    #[test]
    fn display_line_redacts_secrets() {
        let opts = options();
        let line = TerraformCommand::Apply.display_line(&opts);
        assert!(line.starts_with("terraform apply"));
        assert!(!line.contains("md-secret"));
        assert!(line.contains("motherduck_token=***"));
    }
}
