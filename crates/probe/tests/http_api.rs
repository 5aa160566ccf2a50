//! 통합 테스트 -- axum 스텁 서버로 관리 API 클라이언트와 API 프로브 검증
//!
//! 실제 HTTP 왕복으로 헤더, 경로 인코딩, 응답 분류, 타임아웃을 확인합니다.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;

use duckform_core::config::MotherDuckConfig;
use duckform_core::credentials::SecretToken;
use duckform_core::types::{Expectation, ProbeOutcome, TokenMatch, UserMatch};
use duckform_probe::probes::{probe_token, probe_user};
use duckform_probe::{ClassifyPolicy, Endpoint, HttpManagementApi, ManagementApi, ProbeFailure};

#[derive(Clone, Default)]
struct StubState {
    seen: Arc<Mutex<Vec<SeenRequest>>>,
}

#[derive(Clone, Debug)]
struct SeenRequest {
    path: String,
    authorization: Option<String>,
    accept: Option<String>,
}

impl StubState {
    fn record(&self, path: String, headers: &HeaderMap) {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned)
        };
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(SeenRequest {
                path,
                authorization: header("authorization"),
                accept: header("accept"),
            });
        }
    }

    fn seen(&self) -> Vec<SeenRequest> {
        self.seen.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

async fn users(State(state): State<StubState>, headers: HeaderMap) -> (StatusCode, String) {
    state.record("/v1/users".to_owned(), &headers);
    match headers.get("authorization").and_then(|v| v.to_str().ok()) {
        Some("Bearer good-token") => (
            StatusCode::OK,
            r#"{"users":[{"username":"test_user_1700000000","email":"test_user_1700000000@example.com"}]}"#
                .to_owned(),
        ),
        Some("Bearer limited-token") => (
            StatusCode::FORBIDDEN,
            r#"{"code":"UNAUTHORIZED","message":"admin only"}"#.to_owned(),
        ),
        _ => (
            StatusCode::UNAUTHORIZED,
            r#"{"message":"Invalid MotherDuck token"}"#.to_owned(),
        ),
    }
}

async fn tokens(
    State(state): State<StubState>,
    Path(username): Path<String>,
    headers: HeaderMap,
) -> (StatusCode, String) {
    state.record(format!("/v1/users/{username}/tokens"), &headers);
    if username == "test_user_1700000000" {
        (
            StatusCode::OK,
            r#"[
                {"name":"test_token_1700000000","created_ts":1700000100},
                {"name":"older","created_ts":1600000000}
            ]"#
            .to_owned(),
        )
    } else {
        (StatusCode::NOT_FOUND, "Not Found".to_owned())
    }
}

async fn slow() -> &'static str {
    tokio::time::sleep(Duration::from_secs(5)).await;
    "[]"
}

async fn spawn_stub() -> (SocketAddr, StubState) {
    let state = StubState::default();
    let app = Router::new()
        .route("/v1/users", get(users))
        .route("/v1/users/:username/tokens", get(tokens))
        .route("/slow/v1/users", get(slow))
        .with_state(state.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind stub");
    let addr = listener.local_addr().expect("stub addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (addr, state)
}

fn client(base: String, token: &str, timeout_secs: u64) -> HttpManagementApi {
    let config = MotherDuckConfig {
        api_base_url: base,
        api_timeout_secs: timeout_secs,
        ..MotherDuckConfig::default()
    };
    HttpManagementApi::new(&config, SecretToken::new(token)).expect("client")
}

#[tokio::test(flavor = "multi_thread")]
async fn get_sends_bearer_and_json_headers() {
    let (addr, state) = spawn_stub().await;
    let api = client(format!("http://{addr}"), "good-token", 5);

    let response = api.get(&Endpoint::Users).await.expect("request");

    assert_eq!(response.status, 200);
    let seen = state.seen();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].authorization.as_deref(), Some("Bearer good-token"));
    assert_eq!(seen[0].accept.as_deref(), Some("application/json"));
}

#[tokio::test(flavor = "multi_thread")]
async fn user_probe_passes_against_wrapped_response() {
    let (addr, _state) = spawn_stub().await;
    let api = client(format!("http://{addr}"), "good-token", 5);

    let by_name = probe_user(
        &api,
        &Expectation::user("test_user_1700000000"),
        &ClassifyPolicy::default(),
        UserMatch::Username,
    )
    .await;
    let by_email = probe_user(
        &api,
        &Expectation::user("test_user_1700000000@example.com"),
        &ClassifyPolicy::default(),
        UserMatch::Email,
    )
    .await;

    assert_eq!(by_name, ProbeOutcome::Passed);
    assert_eq!(by_email, ProbeOutcome::Passed);
}

#[tokio::test(flavor = "multi_thread")]
async fn invalid_token_makes_user_probe_fatal() {
    let (addr, _state) = spawn_stub().await;
    let api = client(format!("http://{addr}"), "bad-token", 5);

    let outcome = probe_user(
        &api,
        &Expectation::user("test_user_1700000000"),
        &ClassifyPolicy::default(),
        UserMatch::Username,
    )
    .await;

    assert!(matches!(outcome, ProbeOutcome::Fatal { .. }));
}

#[tokio::test(flavor = "multi_thread")]
async fn limited_token_makes_user_probe_skip() {
    let (addr, _state) = spawn_stub().await;
    let api = client(format!("http://{addr}"), "limited-token", 5);

    let outcome = probe_user(
        &api,
        &Expectation::user("test_user_1700000000"),
        &ClassifyPolicy::default(),
        UserMatch::Username,
    )
    .await;

    assert!(matches!(outcome, ProbeOutcome::Skipped { .. }));
}

#[tokio::test(flavor = "multi_thread")]
async fn token_probe_uses_user_path() {
    let (addr, state) = spawn_stub().await;
    let api = client(format!("http://{addr}"), "good-token", 5);
    let expectation = Expectation::token("test_user_1700000000", "test_token_1700000000");

    let exact = probe_token(
        &api,
        &expectation,
        &ClassifyPolicy::default(),
        TokenMatch::ExactName,
    )
    .await;
    let recent = probe_token(
        &api,
        &expectation,
        &ClassifyPolicy::default(),
        TokenMatch::MostRecent,
    )
    .await;

    assert_eq!(exact, ProbeOutcome::Passed);
    assert_eq!(recent, ProbeOutcome::Passed);
    assert!(
        state
            .seen()
            .iter()
            .all(|r| r.path == "/v1/users/test_user_1700000000/tokens")
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_user_tokens_are_skipped() {
    let (addr, _state) = spawn_stub().await;
    let api = client(format!("http://{addr}"), "good-token", 5);

    let outcome = probe_token(
        &api,
        &Expectation::token("ghost", "test_token_1"),
        &ClassifyPolicy::default(),
        TokenMatch::ExactName,
    )
    .await;

    assert!(matches!(outcome, ProbeOutcome::Skipped { .. }));
}

#[tokio::test(flavor = "multi_thread")]
async fn slow_server_times_out() {
    let (addr, _state) = spawn_stub().await;
    let api = client(format!("http://{addr}/slow"), "good-token", 1);

    let err = api.get(&Endpoint::Users).await.unwrap_err();

    assert!(matches!(err, ProbeFailure::Timeout { secs: 1, .. }));
}

#[tokio::test(flavor = "multi_thread")]
async fn unreachable_server_is_transport_error() {
    // 바인드 후 즉시 닫아 아무도 듣지 않는 포트를 얻음
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);
    let api = client(format!("http://{addr}"), "good-token", 5);

    let err = api.get(&Endpoint::Users).await.unwrap_err();

    assert!(matches!(err, ProbeFailure::Http(_)));
}
