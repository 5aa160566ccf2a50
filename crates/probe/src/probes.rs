//! 개별 검증 프로브
//!
//! 각 프로브는 독립적이며 상태가 없습니다. 프로브는 에러를 반환하지 않고
//! 항상 [`ProbeOutcome`]으로 결론을 냅니다. 인프라 문제는 `Fatal`입니다.

use tracing::{debug, warn};

use duckform_core::types::{Expectation, ProbeOutcome, ResourceKind, TokenMatch, UserMatch};

use crate::api::{Endpoint, ManagementApi};
use crate::classify::{ClassifyPolicy, classify_response};
use crate::models::{TokenList, UserList, most_recent_token};
use crate::sql::{MotherDuckConnection, SqlClient, quote_identifier, quote_literal};

/// SQL 프로브가 실행할 쿼리와 확인할 컬럼
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogQuery {
    /// 실행할 SQL
    pub sql: String,
    /// 식별자가 나타나야 하는 컬럼
    pub column: &'static str,
}

/// SQL로 확인하는 기대값의 쿼리를 만듭니다. API 대상이거나 부모가 없으면 `None`.
pub fn catalog_query(expectation: &Expectation) -> Option<CatalogQuery> {
    let id = expectation.identifier.as_str();
    match expectation.kind {
        ResourceKind::Database | ResourceKind::Share => Some(CatalogQuery {
            sql: format!(
                "SELECT catalog_name FROM information_schema.schemata WHERE catalog_name = {};",
                quote_literal(id)
            ),
            column: "catalog_name",
        }),
        ResourceKind::Schema => {
            let database = expectation.parent.as_deref()?;
            Some(CatalogQuery {
                sql: format!(
                    "USE {}; SELECT schema_name FROM information_schema.schemata WHERE catalog_name = {} AND schema_name = {};",
                    quote_identifier(database),
                    quote_literal(database),
                    quote_literal(id)
                ),
                column: "schema_name",
            })
        }
        ResourceKind::Table => {
            let share = expectation.parent.as_deref()?;
            Some(CatalogQuery {
                sql: format!(
                    "SELECT table_name FROM information_schema.tables WHERE table_catalog = {} AND table_name = {};",
                    quote_literal(share),
                    quote_literal(id)
                ),
                column: "table_name",
            })
        }
        ResourceKind::User | ResourceKind::Token => None,
    }
}

/// SQL 카탈로그 조회로 식별자 존재를 확인합니다.
pub async fn probe_catalog<S: SqlClient>(
    client: &S,
    connection: &MotherDuckConnection,
    expectation: &Expectation,
) -> ProbeOutcome {
    let Some(query) = catalog_query(expectation) else {
        return ProbeOutcome::Fatal {
            reason: format!("{expectation} cannot be checked through sql"),
        };
    };

    match client.run_query(connection, &query.sql).await {
        Ok(rows) if rows.contains(query.column, &expectation.identifier) => ProbeOutcome::Passed,
        Ok(rows) => {
            debug!(expectation = %expectation, raw = rows.raw(), "identifier missing from catalog");
            ProbeOutcome::Failed {
                reason: format!("{expectation} not found"),
                raw: rows.raw().to_owned(),
            }
        }
        Err(e) => {
            warn!(expectation = %expectation, error = %e, "sql probe could not run");
            ProbeOutcome::Fatal {
                reason: e.to_string(),
            }
        }
    }
}

/// 관리 API 사용자 목록에서 사용자를 찾습니다.
pub async fn probe_user<A: ManagementApi>(
    api: &A,
    expectation: &Expectation,
    policy: &ClassifyPolicy,
    user_match: UserMatch,
) -> ProbeOutcome {
    let response = match api.get(&Endpoint::Users).await {
        Ok(r) => r,
        Err(e) => {
            return ProbeOutcome::Fatal {
                reason: e.to_string(),
            };
        }
    };

    let users = match classify_response::<UserList>(&response, policy).into_value() {
        Ok(list) => list.into_vec(),
        Err(outcome) => return outcome,
    };

    let wanted = expectation.identifier.as_str();
    let found = users.iter().any(|u| match user_match {
        UserMatch::Username => u.username == wanted,
        UserMatch::Email => u
            .email
            .as_deref()
            .is_some_and(|e| e.eq_ignore_ascii_case(wanted)),
    });

    if found {
        ProbeOutcome::Passed
    } else {
        ProbeOutcome::Failed {
            reason: format!("{expectation} not found (match by {})", user_match.as_str()),
            raw: response.body,
        }
    }
}

/// 사용자의 토큰 목록에서 토큰을 찾습니다.
pub async fn probe_token<A: ManagementApi>(
    api: &A,
    expectation: &Expectation,
    policy: &ClassifyPolicy,
    token_match: TokenMatch,
) -> ProbeOutcome {
    let Some(username) = expectation.parent.clone() else {
        return ProbeOutcome::Fatal {
            reason: format!("{expectation} has no owning user"),
        };
    };

    let response = match api.get(&Endpoint::UserTokens { username }).await {
        Ok(r) => r,
        Err(e) => {
            return ProbeOutcome::Fatal {
                reason: e.to_string(),
            };
        }
    };

    let tokens = match classify_response::<TokenList>(&response, policy).into_value() {
        Ok(list) => list.into_vec(),
        Err(outcome) => return outcome,
    };

    let found = match token_match {
        TokenMatch::ExactName => tokens.iter().any(|t| t.name == expectation.identifier),
        TokenMatch::Any => !tokens.is_empty(),
        TokenMatch::MostRecent => most_recent_token(&tokens).is_some_and(|t| !t.name.is_empty()),
    };

    if found {
        ProbeOutcome::Passed
    } else {
        ProbeOutcome::Failed {
            reason: format!(
                "{expectation} not found (match by {})",
                token_match.as_str()
            ),
            raw: response.body,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MockManagementApi;
    use crate::sql::MockSqlClient;
    use duckform_core::credentials::SecretToken;

    fn conn() -> MotherDuckConnection {
        MotherDuckConnection::new(SecretToken::new("tok"))
    }

    fn tokens_endpoint() -> Endpoint {
        Endpoint::UserTokens {
            username: "test_user_1".to_owned(),
        }
    }

    #[test]
    fn catalog_query_for_database() {
        let q = catalog_query(&Expectation::database("test_db_1700000000")).unwrap();
        assert_eq!(
            q.sql,
            "SELECT catalog_name FROM information_schema.schemata WHERE catalog_name = 'test_db_1700000000';"
        );
        assert_eq!(q.column, "catalog_name");
    }

    #[test]
    fn catalog_query_for_schema_uses_database() {
        let q = catalog_query(&Expectation::schema("test_db_1", "test_schema_1")).unwrap();
        assert!(q.sql.starts_with("USE \"test_db_1\";"));
        assert!(q.sql.ends_with("WHERE catalog_name = 'test_db_1' AND schema_name = 'test_schema_1';"));
        assert_eq!(q.column, "schema_name");
    }

    #[test]
    fn catalog_query_for_table_filters_catalog() {
        let q = catalog_query(&Expectation::table("test_sample_data_1", "taxi")).unwrap();
        assert_eq!(
            q.sql,
            "SELECT table_name FROM information_schema.tables WHERE table_catalog = 'test_sample_data_1' AND table_name = 'taxi';"
        );
    }

    #[test]
    fn catalog_query_escapes_quotes() {
        let q = catalog_query(&Expectation::database("we'ird")).unwrap();
        assert!(q.sql.contains("'we''ird'"));
    }

    #[test]
    fn api_expectations_have_no_catalog_query() {
        assert!(catalog_query(&Expectation::user("test_user_1")).is_none());
    }

    #[tokio::test]
    async fn database_probe_passes_when_catalog_lists_it() {
        let sql = MockSqlClient::new().with_row(
            "test_db_1700000000",
            "catalog_name",
            "test_db_1700000000",
        );
        let outcome =
            probe_catalog(&sql, &conn(), &Expectation::database("test_db_1700000000")).await;
        assert_eq!(outcome, ProbeOutcome::Passed);
    }

    #[tokio::test]
    async fn database_probe_fails_when_missing() {
        let sql = MockSqlClient::new();
        let outcome =
            probe_catalog(&sql, &conn(), &Expectation::database("test_db_1700000000")).await;
        assert!(matches!(outcome, ProbeOutcome::Failed { .. }));
    }

    #[tokio::test]
    async fn sql_client_error_is_fatal() {
        let sql = MockSqlClient::new().with_failure("catalog_name", "IO Error: auth failed");
        let outcome = probe_catalog(&sql, &conn(), &Expectation::database("test_db_1")).await;
        assert!(matches!(outcome, ProbeOutcome::Fatal { .. }));
    }

    #[tokio::test]
    async fn user_probe_matches_username() {
        let api = MockManagementApi::new().respond(
            Endpoint::Users,
            200,
            r#"[{"username":"someone"},{"username":"test_user_1"}]"#,
        );
        let outcome = probe_user(
            &api,
            &Expectation::user("test_user_1"),
            &ClassifyPolicy::default(),
            UserMatch::Username,
        )
        .await;
        assert_eq!(outcome, ProbeOutcome::Passed);
    }

    #[tokio::test]
    async fn user_probe_matches_email_case_insensitively() {
        let api = MockManagementApi::new().respond(
            Endpoint::Users,
            200,
            r#"{"users":[{"username":"x","email":"Test_User_1@Example.com"}]}"#,
        );
        let outcome = probe_user(
            &api,
            &Expectation::user("test_user_1@example.com"),
            &ClassifyPolicy::default(),
            UserMatch::Email,
        )
        .await;
        assert_eq!(outcome, ProbeOutcome::Passed);
    }

    #[tokio::test]
    async fn user_probe_missing_user_fails_with_raw_body() {
        let body = r#"[{"username":"someone"}]"#;
        let api = MockManagementApi::new().respond(Endpoint::Users, 200, body);
        let outcome = probe_user(
            &api,
            &Expectation::user("test_user_1"),
            &ClassifyPolicy::default(),
            UserMatch::Username,
        )
        .await;
        match outcome {
            ProbeOutcome::Failed { raw, .. } => assert_eq!(raw, body),
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn user_probe_invalid_token_is_fatal() {
        let api = MockManagementApi::new().respond(
            Endpoint::Users,
            401,
            r#"{"message":"Invalid MotherDuck token"}"#,
        );
        let outcome = probe_user(
            &api,
            &Expectation::user("test_user_1"),
            &ClassifyPolicy::default(),
            UserMatch::Username,
        )
        .await;
        assert!(matches!(outcome, ProbeOutcome::Fatal { .. }));
    }

    #[tokio::test]
    async fn user_probe_transport_error_is_fatal() {
        let api = MockManagementApi::new().fail(Endpoint::Users, "connection refused");
        let outcome = probe_user(
            &api,
            &Expectation::user("test_user_1"),
            &ClassifyPolicy::default(),
            UserMatch::Username,
        )
        .await;
        assert!(matches!(outcome, ProbeOutcome::Fatal { .. }));
    }

    #[tokio::test]
    async fn token_probe_exact_name() {
        let api = MockManagementApi::new().respond(
            tokens_endpoint(),
            200,
            r#"[{"name":"other"},{"name":"test_token_1"}]"#,
        );
        let outcome = probe_token(
            &api,
            &Expectation::token("test_user_1", "test_token_1"),
            &ClassifyPolicy::default(),
            TokenMatch::ExactName,
        )
        .await;
        assert_eq!(outcome, ProbeOutcome::Passed);
        assert_eq!(api.requests(), vec![tokens_endpoint()]);
    }

    #[tokio::test]
    async fn token_probe_exact_name_rejects_other_tokens() {
        let api =
            MockManagementApi::new().respond(tokens_endpoint(), 200, r#"[{"name":"other"}]"#);
        let outcome = probe_token(
            &api,
            &Expectation::token("test_user_1", "test_token_1"),
            &ClassifyPolicy::default(),
            TokenMatch::ExactName,
        )
        .await;
        assert!(matches!(outcome, ProbeOutcome::Failed { .. }));
    }

    #[tokio::test]
    async fn token_probe_any_accepts_nonempty_list() {
        let api =
            MockManagementApi::new().respond(tokens_endpoint(), 200, r#"[{"name":"other"}]"#);
        let outcome = probe_token(
            &api,
            &Expectation::token("test_user_1", "test_token_1"),
            &ClassifyPolicy::default(),
            TokenMatch::Any,
        )
        .await;
        assert_eq!(outcome, ProbeOutcome::Passed);
    }

    #[tokio::test]
    async fn token_probe_most_recent() {
        let api = MockManagementApi::new().respond(
            tokens_endpoint(),
            200,
            r#"{"tokens":[{"name":"a","created_ts":1},{"name":"b","created_ts":2}]}"#,
        );
        let outcome = probe_token(
            &api,
            &Expectation::token("test_user_1", "test_token_1"),
            &ClassifyPolicy::default(),
            TokenMatch::MostRecent,
        )
        .await;
        assert_eq!(outcome, ProbeOutcome::Passed);
    }

    #[tokio::test]
    async fn token_probe_permission_denied_is_skipped() {
        // 등록되지 않은 엔드포인트는 mock이 "Not Found"를 돌려줌
        let api = MockManagementApi::new();
        let outcome = probe_token(
            &api,
            &Expectation::token("test_user_1", "test_token_1"),
            &ClassifyPolicy::default(),
            TokenMatch::ExactName,
        )
        .await;
        assert!(matches!(outcome, ProbeOutcome::Skipped { .. }));
    }
}
