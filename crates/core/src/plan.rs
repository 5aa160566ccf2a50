//! 실행 계획: 식별자와 설정으로부터 terraform 입력과 검증 기대값을 만듭니다.
//!
//! [`RunPlan`]은 한 번의 실행이 무엇을 만들고(입력) 무엇을 확인할지(기대값)를
//! 한곳에 묶습니다. 드라이버와 프로브 러너는 같은 계획을 공유하므로
//! 두 쪽의 이름이 어긋날 수 없습니다.

use serde::Serialize;

use crate::config::DuckformConfig;
use crate::credentials::Credentials;
use crate::identity::{RunIdentity, RunNames};
use crate::types::{Expectation, ProvisionInputs, UserMatch};

/// terraform 변수 이름
pub mod vars {
    /// MotherDuck 토큰 (provider 인증)
    pub const MOTHERDUCK_TOKEN: &str = "motherduck_token";
    /// 관리 API 키 (같은 토큰)
    pub const MOTHERDUCK_API_KEY: &str = "motherduck_api_key";
    /// 데이터베이스 이름
    pub const DATABASE_NAME: &str = "database_name";
    /// 스키마 이름
    pub const SCHEMA_NAME: &str = "schema_name";
    /// 새 사용자 이름
    pub const NEW_USER_NAME: &str = "new_user_name";
    /// 새 사용자 이메일
    pub const NEW_USER_EMAIL: &str = "new_user_email";
    /// 토큰 이름
    pub const TOKEN_NAME: &str = "token_name";
    /// 토큰 만료 기간 (일)
    pub const TOKEN_EXPIRY_DAYS: &str = "token_expiry_days";
    /// 단일 공유 URL
    pub const SHARE_URL: &str = "share_url";
    /// 단일 공유 이름
    pub const SHARE_NAME: &str = "share_name";
    /// 공유 URL 목록
    pub const SHARE_URLS: &str = "share_urls";
    /// 공유 이름 목록
    pub const SHARE_NAMES: &str = "share_names";
}

/// 한 번의 실행 계획
#[derive(Debug, Clone, Serialize)]
pub struct RunPlan {
    /// 실행 식별자
    pub identity: RunIdentity,
    /// 생성될 리소스 이름
    pub names: RunNames,
    /// terraform 입력 (비밀 값 포함, 직렬화 제외)
    #[serde(skip)]
    pub inputs: ProvisionInputs,
    /// 순서가 정해진 검증 기대값 목록
    pub expectations: Vec<Expectation>,
}

impl RunPlan {
    /// 설정과 식별자로 실행 계획을 만듭니다.
    pub fn build(config: &DuckformConfig, identity: RunIdentity, credentials: &Credentials) -> Self {
        let names = identity.names(&config.run.shares, &config.run.user_email_domain);
        let inputs = build_inputs(config, &names, credentials);
        let expectations = build_expectations(config, &names);
        Self {
            identity,
            names,
            inputs,
            expectations,
        }
    }
}

fn build_inputs(config: &DuckformConfig, names: &RunNames, credentials: &Credentials) -> ProvisionInputs {
    let token = credentials.token.expose();
    let mut inputs = ProvisionInputs::new();
    inputs
        .set_secret(vars::MOTHERDUCK_TOKEN, token)
        .set_secret(vars::MOTHERDUCK_API_KEY, token)
        .set(vars::DATABASE_NAME, names.database.as_str())
        .set(vars::SCHEMA_NAME, names.schema.as_str())
        .set(vars::NEW_USER_NAME, names.user.as_str())
        .set(vars::TOKEN_NAME, names.token.as_str())
        .set(
            vars::TOKEN_EXPIRY_DAYS,
            i64::from(config.run.token_expiry_days),
        );

    if let Some(email) = &names.user_email {
        inputs.set(vars::NEW_USER_EMAIL, email.as_str());
    }

    // 공유가 하나면 스칼라 변수, 여러 개면 리스트 변수
    match config.run.shares.as_slice() {
        [] => {}
        [single] => {
            inputs
                .set(vars::SHARE_URL, single.url.as_str())
                .set(vars::SHARE_NAME, names.shares[0].as_str());
        }
        many => {
            let urls: Vec<String> = many.iter().map(|s| s.url.clone()).collect();
            inputs
                .set(vars::SHARE_URLS, urls)
                .set(vars::SHARE_NAMES, names.shares.clone());
        }
    }

    inputs
}

fn build_expectations(config: &DuckformConfig, names: &RunNames) -> Vec<Expectation> {
    let mut expectations = vec![
        Expectation::database(&names.database),
        Expectation::schema(&names.database, &names.schema),
    ];

    let user_identifier = match (config.probe.user_match_policy(), &names.user_email) {
        (UserMatch::Email, Some(email)) => email.clone(),
        _ => names.user.clone(),
    };
    expectations.push(Expectation::user(user_identifier));
    expectations.push(Expectation::token(&names.user, &names.token));

    for share in &names.shares {
        expectations.push(Expectation::share(share));
    }

    // 테이블 목록은 첫 번째 공유에 대해서만 확인
    if let Some(first_share) = names.shares.first() {
        for table in &config.run.expected_tables {
            expectations.push(Expectation::table(first_share, table));
        }
    }

    expectations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ShareConfig;
    use crate::types::{ResourceKind, VarValue};

    fn creds() -> Credentials {
        Credentials::from_value("MOTHERDUCK_TOKEN", "md-secret").unwrap()
    }

    #[test]
    fn default_plan_uses_scalar_share_vars() {
        let config = DuckformConfig::default();
        let plan = RunPlan::build(&config, RunIdentity::from_suffix(1_700_000_000), &creds());

        assert_eq!(
            plan.inputs.get(vars::DATABASE_NAME),
            Some(&VarValue::from("test_db_1700000000"))
        );
        assert_eq!(
            plan.inputs.get(vars::SHARE_NAME),
            Some(&VarValue::from("test_sample_data_1700000000"))
        );
        assert_eq!(plan.inputs.get(vars::TOKEN_EXPIRY_DAYS), Some(&VarValue::Int(7)));
        assert!(plan.inputs.get(vars::SHARE_URLS).is_none());
        assert!(plan.inputs.get(vars::NEW_USER_EMAIL).is_none());
        assert!(plan.inputs.is_secret(vars::MOTHERDUCK_TOKEN));
        assert!(plan.inputs.is_secret(vars::MOTHERDUCK_API_KEY));
    }

    #[test]
    fn multiple_shares_use_list_vars() {
        let mut config = DuckformConfig::default();
        config.run.shares.push(ShareConfig {
            url: "md:_share/other/1".to_owned(),
            name_prefix: "test_other".to_owned(),
        });
        let plan = RunPlan::build(&config, RunIdentity::from_suffix(5), &creds());

        assert!(plan.inputs.get(vars::SHARE_URL).is_none());
        assert_eq!(
            plan.inputs.get(vars::SHARE_NAMES),
            Some(&VarValue::List(vec![
                "test_sample_data_5".to_owned(),
                "test_other_5".to_owned()
            ]))
        );
    }

    #[test]
    fn expectations_follow_probe_order() {
        let config = DuckformConfig::default();
        let plan = RunPlan::build(&config, RunIdentity::from_suffix(9), &creds());
        let kinds: Vec<ResourceKind> = plan.expectations.iter().map(|e| e.kind).collect();

        assert_eq!(
            &kinds[..5],
            &[
                ResourceKind::Database,
                ResourceKind::Schema,
                ResourceKind::User,
                ResourceKind::Token,
                ResourceKind::Share,
            ]
        );
        let tables: Vec<&Expectation> = plan
            .expectations
            .iter()
            .filter(|e| e.kind == ResourceKind::Table)
            .collect();
        assert_eq!(tables.len(), config.run.expected_tables.len());
        assert!(
            tables
                .iter()
                .all(|t| t.parent.as_deref() == Some("test_sample_data_9"))
        );
    }

    #[test]
    fn tables_are_expected_only_in_first_share() {
        let mut config = DuckformConfig::default();
        config.run.shares.push(ShareConfig {
            url: "md:_share/other/1".to_owned(),
            name_prefix: "test_other".to_owned(),
        });
        let plan = RunPlan::build(&config, RunIdentity::from_suffix(3), &creds());

        let shares: Vec<&str> = plan
            .expectations
            .iter()
            .filter(|e| e.kind == ResourceKind::Share)
            .map(|e| e.identifier.as_str())
            .collect();
        assert_eq!(shares, vec!["test_sample_data_3", "test_other_3"]);
        assert!(
            plan.expectations
                .iter()
                .filter(|e| e.kind == ResourceKind::Table)
                .all(|t| t.parent.as_deref() == Some("test_sample_data_3"))
        );
    }

    #[test]
    fn email_match_uses_email_identifier() {
        let mut config = DuckformConfig::default();
        config.run.user_email_domain = "example.com".to_owned();
        config.probe.user_match = "email".to_owned();
        let plan = RunPlan::build(&config, RunIdentity::from_suffix(3), &creds());

        let user = plan
            .expectations
            .iter()
            .find(|e| e.kind == ResourceKind::User)
            .unwrap();
        assert_eq!(user.identifier, "test_user_3@example.com");
        assert_eq!(
            plan.inputs.get(vars::NEW_USER_EMAIL),
            Some(&VarValue::from("test_user_3@example.com"))
        );
        // 토큰 조회는 항상 사용자 이름 기준
        let token = plan
            .expectations
            .iter()
            .find(|e| e.kind == ResourceKind::Token)
            .unwrap();
        assert_eq!(token.parent.as_deref(), Some("test_user_3"));
    }

    #[test]
    fn serialized_plan_has_no_token() {
        let plan = RunPlan::build(
            &DuckformConfig::default(),
            RunIdentity::from_suffix(1),
            &creds(),
        );
        let json = serde_json::to_string(&plan).unwrap();
        assert!(!json.contains("md-secret"));
    }
}
