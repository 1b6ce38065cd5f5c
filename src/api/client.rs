//! HTTP client for the game backend.

use std::time::Duration;

use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, ORIGIN, REFERER};
use reqwest::{Client, Method, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use super::{ApiError, ApiResponse, LoginData};

/// Game id of the daily reward.
const DAILY_GAME_ID: &str = "fa873d13-d831-4d6f-8aee-9cff7a1d0db1";

/// Game id of the farming mechanic.
const FARM_GAME_ID: &str = "53b22103-c7ff-413d-bc63-20f6fb806a07";

/// Game id of the ticket mini-game.
const PLAY_GAME_ID: &str = "59bcd12e-04e2-404c-a172-311a0084587d";

/// Origin the mini-app is served from.
const MINI_APP_ORIGIN: &str = "https://mini-app.tomarket.ai";

/// Service echoing the caller's public IP.
const IP_ECHO_URL: &str = "https://httpbin.org/ip";

/// Timeout of the outbound IP diagnostic.
const IP_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Where a request goes.
#[derive(Debug, Clone, Copy)]
pub enum Route<'a> {
    /// Path appended to the API base URL.
    Endpoint(&'a str),
    /// Fully qualified URL, used as is.
    Absolute(&'a str),
}

/// Client for the game API.
///
/// The access token is attached as the `Authorization` header once
/// [`GameApi::set_token`] has been called.
#[derive(Debug, Clone)]
pub struct GameApi {
    http: Client,
    base_url: String,
    token: Option<String>,
}

impl GameApi {
    /// Creates a client for the API rooted at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiError> {
        let base_url = base_url.into().trim_end_matches('/').to_owned();

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json, text/plain, */*"));
        headers.insert(ORIGIN, HeaderValue::from_static(MINI_APP_ORIGIN));
        headers.insert(REFERER, HeaderValue::from_static("https://mini-app.tomarket.ai/"));

        let http = Client::builder().default_headers(headers).build()?;

        Ok(Self {
            http,
            base_url,
            token: None,
        })
    }

    /// Stores the access token used for subsequent requests.
    pub fn set_token(&mut self, token: impl Into<String>) {
        self.token = Some(token.into());
    }

    fn url_for(&self, route: Route<'_>) -> String {
        match route {
            Route::Endpoint(path) => format!("{}{}", self.base_url, path),
            Route::Absolute(url) => url.to_owned(),
        }
    }

    /// Sends a request and decodes the JSON body.
    ///
    /// The body is decoded whatever the HTTP status, since the backend reports
    /// business failures inside the envelope. 401 and 403 are fatal.
    pub async fn dispatch<T: for<'de> Deserialize<'de>>(
        &self,
        method: Method,
        route: Route<'_>,
        body: Option<&Value>,
        timeout: Option<Duration>,
    ) -> Result<T, ApiError> {
        let url = self.url_for(route);
        debug!("{} {}", method, url);

        let mut request = self.http.request(method, &url);
        if let Some(token) = &self.token {
            request = request.header(AUTHORIZATION, token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await?;
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ApiError::Unauthorized(status.as_u16()));
        }

        let bytes = response.bytes().await?;
        match serde_json::from_slice(&bytes) {
            Ok(decoded) => Ok(decoded),
            Err(_) if !status.is_success() => Err(ApiError::Http {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn post(&self, endpoint: &str, body: Option<Value>) -> Result<ApiResponse, ApiError> {
        self.dispatch(Method::POST, Route::Endpoint(endpoint), body.as_ref(), None)
            .await
    }

    /// Logs in with the launch init data; returns the access token if one was issued.
    pub async fn login(
        &self,
        init_data: &str,
        invite_code: &str,
    ) -> Result<Option<String>, ApiError> {
        let response = self
            .post(
                "/user/login",
                Some(json!({"init_data": init_data, "invite_code": invite_code})),
            )
            .await?;

        Ok(response
            .data::<LoginData>()
            .ok()
            .and_then(|data| data.access_token)
            .filter(|token| !token.is_empty()))
    }

    pub async fn balance(&self) -> Result<ApiResponse, ApiError> {
        self.post("/user/balance", None).await
    }

    pub async fn claim_daily(&self) -> Result<ApiResponse, ApiError> {
        self.post("/daily/claim", Some(json!({"game_id": DAILY_GAME_ID})))
            .await
    }

    pub async fn start_farming(&self) -> Result<ApiResponse, ApiError> {
        self.post("/farm/start", Some(json!({"game_id": FARM_GAME_ID})))
            .await
    }

    pub async fn claim_farming(&self) -> Result<ApiResponse, ApiError> {
        self.post("/farm/claim", Some(json!({"game_id": FARM_GAME_ID})))
            .await
    }

    pub async fn play_game(&self) -> Result<ApiResponse, ApiError> {
        self.post("/game/play", Some(json!({"game_id": PLAY_GAME_ID})))
            .await
    }

    pub async fn claim_game(&self, points: u32) -> Result<ApiResponse, ApiError> {
        self.post(
            "/game/claim",
            Some(json!({"game_id": PLAY_GAME_ID, "points": points})),
        )
        .await
    }

    pub async fn tasks(&self) -> Result<ApiResponse, ApiError> {
        self.post("/tasks/list", Some(json!({"language_code": "en"})))
            .await
    }

    pub async fn start_task(&self, task_id: i64) -> Result<ApiResponse, ApiError> {
        self.post("/tasks/start", Some(json!({"task_id": task_id})))
            .await
    }

    pub async fn check_task(&self, task_id: i64) -> Result<ApiResponse, ApiError> {
        self.post("/tasks/check", Some(json!({"task_id": task_id})))
            .await
    }

    pub async fn claim_task(&self, task_id: i64) -> Result<ApiResponse, ApiError> {
        self.post("/tasks/claim", Some(json!({"task_id": task_id})))
            .await
    }

    /// Fetches the hidden combo list.
    pub async fn combo(&self) -> Result<ApiResponse, ApiError> {
        self.post("/tasks/hidden", None).await
    }

    /// Fetches the star bonus task.
    pub async fn stars(&self) -> Result<ApiResponse, ApiError> {
        self.post("/tasks/classmateTask", None).await
    }

    pub async fn start_stars_claim(&self, task_id: i64) -> Result<ApiResponse, ApiError> {
        self.post("/tasks/classmateStars", Some(json!({"task_id": task_id})))
            .await
    }

    /// Asks an echo service for the outbound IP address.
    pub async fn public_ip(&self) -> Result<Option<String>, ApiError> {
        #[derive(Deserialize)]
        struct IpEcho {
            origin: Option<String>,
        }

        let echo: IpEcho = self
            .dispatch(
                Method::GET,
                Route::Absolute(IP_ECHO_URL),
                None,
                Some(IP_CHECK_TIMEOUT),
            )
            .await?;
        Ok(echo.origin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_login_returns_token() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/user/login"))
            .and(body_json(json!({"init_data": "user=1", "invite_code": "REF"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": 0,
                "data": {"access_token": "tok-123"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let api = GameApi::new(server.uri()).unwrap();
        let token = api.login("user=1", "REF").await.unwrap();
        assert_eq!(token.as_deref(), Some("tok-123"));
    }

    #[tokio::test]
    async fn test_login_without_token() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/user/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": 400,
                "message": "invalid init data",
                "data": {}
            })))
            .mount(&server)
            .await;

        let api = GameApi::new(server.uri()).unwrap();
        assert_eq!(api.login("user=1", "REF").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_token_sent_as_authorization_header() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/user/balance"))
            .and(header("authorization", "tok-123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": 0,
                "data": {"available_balance": "10"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut api = GameApi::new(format!("{}/", server.uri())).unwrap();
        api.set_token("tok-123");

        let response = api.balance().await.unwrap();
        assert!(response.is_ok());
    }

    #[tokio::test]
    async fn test_unauthorized_is_fatal() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/user/balance"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let api = GameApi::new(server.uri()).unwrap();
        let err = api.balance().await.unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_error_status_with_envelope_is_decoded() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/farm/claim"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({"status": 500})))
            .mount(&server)
            .await;

        let api = GameApi::new(server.uri()).unwrap();
        let response = api.claim_farming().await.unwrap();
        assert_eq!(response.status, 500);
    }

    #[tokio::test]
    async fn test_garbage_body_is_transient() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/daily/claim"))
            .respond_with(ResponseTemplate::new(502).set_body_string("<html>bad gateway</html>"))
            .mount(&server)
            .await;

        let api = GameApi::new(server.uri()).unwrap();
        let err = api.claim_daily().await.unwrap_err();
        assert!(matches!(err, ApiError::Http { status: 502, .. }));
        assert!(!err.is_fatal());
    }

    #[tokio::test]
    async fn test_absolute_route_bypasses_base() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/ip"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"origin": "203.0.113.7"})))
            .expect(1)
            .mount(&server)
            .await;

        let api = GameApi::new("http://127.0.0.1:9/unused").unwrap();
        let echo: Value = api
            .dispatch(
                Method::GET,
                Route::Absolute(&format!("{}/ip", server.uri())),
                None,
                Some(IP_CHECK_TIMEOUT),
            )
            .await
            .unwrap();
        assert_eq!(echo["origin"], "203.0.113.7");
    }
}
