//! MotherDuck 관리 API 클라이언트
//!
//! [`ManagementApi`] 트레이트는 GET 요청 하나를 추상화합니다. 응답은 상태 코드와
//! 원본 본문 그대로 돌려주며, 에러 마커 검사와 파싱은
//! [`classify_response`](crate::classify::classify_response)가 담당합니다.

use std::future::Future;
use std::time::Duration;

use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Client, Url};
use tracing::debug;

use duckform_core::config::MotherDuckConfig;
use duckform_core::credentials::SecretToken;

use crate::error::ProbeFailure;

/// 관리 API 엔드포인트
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// `GET /v1/users`
    Users,
    /// `GET /v1/users/{username}/tokens`
    UserTokens {
        /// 대상 사용자 이름
        username: String,
    },
}

impl Endpoint {
    /// 경로 세그먼트 (인코딩 전)
    pub fn segments(&self) -> Vec<&str> {
        match self {
            Self::Users => vec!["v1", "users"],
            Self::UserTokens { username } => vec!["v1", "users", username, "tokens"],
        }
    }

    /// 로그용 경로
    pub fn path(&self) -> String {
        format!("/{}", self.segments().join("/"))
    }
}

/// API 응답 (상태 코드 + 원본 본문)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    /// HTTP 상태 코드
    pub status: u16,
    /// 응답 본문
    pub body: String,
}

impl ApiResponse {
    /// 2xx 여부
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// 관리 API 트레이트
pub trait ManagementApi: Send + Sync + 'static {
    /// 엔드포인트에 GET 요청을 보냅니다.
    ///
    /// HTTP 에러 상태도 `Ok(ApiResponse)`로 반환합니다. 전송 자체가 실패한 경우만
    /// [`ProbeFailure`]입니다.
    fn get(
        &self,
        endpoint: &Endpoint,
    ) -> impl Future<Output = Result<ApiResponse, ProbeFailure>> + Send;
}

/// `reqwest` 기반 구현
#[derive(Debug, Clone)]
pub struct HttpManagementApi {
    client: Client,
    base_url: Url,
    token: SecretToken,
    timeout: Duration,
}

impl HttpManagementApi {
    /// 설정과 토큰으로 클라이언트를 생성합니다.
    pub fn new(config: &MotherDuckConfig, token: SecretToken) -> Result<Self, ProbeFailure> {
        let base_url = Url::parse(&config.api_base_url)
            .map_err(|e| ProbeFailure::Http(format!("invalid api base url: {e}")))?;
        let timeout = Duration::from_secs(config.api_timeout_secs);

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| ProbeFailure::Http(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            token,
            timeout,
        })
    }

    /// 엔드포인트의 전체 URL
    pub fn url_for(&self, endpoint: &Endpoint) -> Result<Url, ProbeFailure> {
        let mut url = self.base_url.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|()| ProbeFailure::Http("api base url cannot be a base".to_owned()))?;
            path.pop_if_empty();
            path.extend(endpoint.segments());
        }
        Ok(url)
    }
}

impl ManagementApi for HttpManagementApi {
    async fn get(&self, endpoint: &Endpoint) -> Result<ApiResponse, ProbeFailure> {
        let url = self.url_for(endpoint)?;
        debug!(url = %url, "management api request");

        let response = self
            .client
            .get(url)
            .bearer_auth(self.token.expose())
            .send()
            .await
            .map_err(|e| self.transport_error(endpoint, &e))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| self.transport_error(endpoint, &e))?;
        let body = self.token.redact_in(&body);

        debug!(endpoint = %endpoint.path(), status, body = %body, "management api response");
        Ok(ApiResponse { status, body })
    }
}

impl HttpManagementApi {
    fn transport_error(&self, endpoint: &Endpoint, e: &reqwest::Error) -> ProbeFailure {
        if e.is_timeout() {
            ProbeFailure::Timeout {
                what: format!("GET {}", endpoint.path()),
                secs: self.timeout.as_secs(),
            }
        } else {
            ProbeFailure::Http(self.token.redact_in(&e.to_string()))
        }
    }
}

/// 테스트용 Mock 관리 API
///
/// 엔드포인트별 고정 응답을 돌려줍니다. 등록되지 않은 엔드포인트는 404입니다.
#[cfg(test)]
#[derive(Default)]
pub struct MockManagementApi {
    responses: Vec<(Endpoint, Result<ApiResponse, String>)>,
    requests: std::sync::Mutex<Vec<Endpoint>>,
}

#[cfg(test)]
impl MockManagementApi {
    /// 빈 mock을 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 엔드포인트 응답을 등록합니다.
    pub fn respond(mut self, endpoint: Endpoint, status: u16, body: &str) -> Self {
        self.responses.push((
            endpoint,
            Ok(ApiResponse {
                status,
                body: body.to_owned(),
            }),
        ));
        self
    }

    /// 엔드포인트 요청이 전송 단계에서 실패하도록 합니다.
    pub fn fail(mut self, endpoint: Endpoint, reason: &str) -> Self {
        self.responses.push((endpoint, Err(reason.to_owned())));
        self
    }

    /// 받은 요청 목록
    pub fn requests(&self) -> Vec<Endpoint> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[cfg(test)]
impl ManagementApi for MockManagementApi {
    async fn get(&self, endpoint: &Endpoint) -> Result<ApiResponse, ProbeFailure> {
        if let Ok(mut r) = self.requests.lock() {
            r.push(endpoint.clone());
        }
        match self.responses.iter().find(|(e, _)| e == endpoint) {
            Some((_, Ok(response))) => Ok(response.clone()),
            Some((_, Err(reason))) => Err(ProbeFailure::Http(reason.clone())),
            None => Ok(ApiResponse {
                status: 404,
                body: "Not Found".to_owned(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(base: &str) -> HttpManagementApi {
        let config = MotherDuckConfig {
            api_base_url: base.to_owned(),
            ..MotherDuckConfig::default()
        };
        HttpManagementApi::new(&config, SecretToken::new("tok")).unwrap()
    }

    #[test]
    fn endpoint_paths() {
        assert_eq!(Endpoint::Users.path(), "/v1/users");
        assert_eq!(
            Endpoint::UserTokens {
                username: "test_user_1".to_owned()
            }
            .path(),
            "/v1/users/test_user_1/tokens"
        );
    }

    #[test]
    fn url_for_joins_base_and_segments() {
        let api = api("https://api.motherduck.com");
        assert_eq!(
            api.url_for(&Endpoint::Users).unwrap().as_str(),
            "https://api.motherduck.com/v1/users"
        );
    }

    #[test]
    fn url_for_keeps_base_path_prefix() {
        let api = api("http://127.0.0.1:9000/proxy/");
        assert_eq!(
            api.url_for(&Endpoint::Users).unwrap().as_str(),
            "http://127.0.0.1:9000/proxy/v1/users"
        );
    }

    #[test]
    fn url_for_encodes_username() {
        let api = api("https://api.motherduck.com");
        let url = api
            .url_for(&Endpoint::UserTokens {
                username: "a b/c".to_owned(),
            })
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.motherduck.com/v1/users/a%20b%2Fc/tokens"
        );
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let config = MotherDuckConfig {
            api_base_url: "not a url".to_owned(),
            ..MotherDuckConfig::default()
        };
        assert!(HttpManagementApi::new(&config, SecretToken::new("tok")).is_err());
    }

    #[test]
    fn response_success_range() {
        let ok = ApiResponse {
            status: 204,
            body: String::new(),
        };
        let not_found = ApiResponse {
            status: 404,
            body: String::new(),
        };
        assert!(ok.is_success());
        assert!(!not_found.is_success());
    }
}
