//! SSO Backend Client
//!
//! Thin typed wrapper over the backend's authentication endpoints. Each call
//! is a single attempt bounded by [`ApiConfig::request_timeout`]; the callers
//! decide what a failure means for the session.
//!
//! | Operation         | Request                                                   |
//! |-------------------|-----------------------------------------------------------|
//! | `login`           | `POST /auth/login` `{grant_type:"password", email, password}` |
//! | `refresh`         | `POST /auth/login` `{grant_type:"refresh_token", refresh_token}` |
//! | `verify`          | `POST /auth/verify` with bearer token                     |
//! | `logout`          | `POST {logout_path}` with bearer token, when configured   |
//! | `change_password` | `POST /api/auth/change-password` `{currentPassword, newPassword}` |
//! | `check_password`  | `POST /auth/check-password` `{password}`                  |

use crate::error::{AuthError, Result};
use crate::types::{Credentials, TokenPair, UserProfile};
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use core_runtime::config::ApiConfig;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

#[derive(Serialize)]
#[serde(tag = "grant_type", rename_all = "snake_case")]
enum TokenRequest<'a> {
    Password { email: &'a str, password: &'a str },
    RefreshToken { refresh_token: &'a str },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ChangePasswordRequest<'a> {
    current_password: &'a str,
    new_password: &'a str,
}

#[derive(Serialize)]
struct CheckPasswordRequest<'a> {
    password: &'a str,
}

#[derive(Deserialize)]
struct CheckPasswordResponse {
    #[serde(alias = "isValid")]
    valid: bool,
}

/// Body of `POST /auth/verify`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct VerifyResponse {
    pub valid: bool,
    #[serde(default, alias = "userInfo")]
    pub user_info: Option<UserProfile>,
    /// Seconds until the verified token expires, when the backend reports it.
    #[serde(default, alias = "expiresIn")]
    pub expires_in: Option<i64>,
}

/// Client for the SSO backend's authentication endpoints.
#[derive(Clone)]
pub struct SsoApiClient {
    http_client: Arc<dyn HttpClient>,
    config: ApiConfig,
}

impl SsoApiClient {
    pub fn new(http_client: Arc<dyn HttpClient>, config: ApiConfig) -> Self {
        Self {
            http_client,
            config,
        }
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    /// Exchange email and password for a token pair.
    ///
    /// A non-2xx answer becomes [`AuthError::CredentialsRejected`] carrying the
    /// backend's message, ready to show on the login form.
    #[instrument(skip_all)]
    pub async fn login(&self, credentials: &Credentials) -> Result<TokenPair> {
        let body = TokenRequest::Password {
            email: &credentials.email,
            password: credentials.password(),
        };
        let request = self.post(&self.config.login_path)?;
        let response = self.send(request.json(&body).map_err(encode_error)?).await?;

        if !response.is_success() {
            let message = backend_message(&response)
                .unwrap_or_else(|| default_login_message(response.status));
            warn!(status = response.status, "Login rejected");
            return Err(AuthError::CredentialsRejected {
                status: response.status,
                message,
            });
        }

        let pair = parse_token_pair(&response)?;
        info!(access_expires_at = %pair.access_expires_at, "Login accepted");
        Ok(pair)
    }

    /// Exchange a refresh token for a new token pair.
    #[instrument(skip_all)]
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair> {
        let body = TokenRequest::RefreshToken { refresh_token };
        let request = self.post(&self.config.login_path)?;

        debug!("Refreshing access token");
        let response = self
            .send(request.json(&body).map_err(encode_error)?)
            .await
            .map_err(|e| AuthError::TokenRefreshFailed(e.to_string()))?;

        if !response.is_success() {
            let message = backend_message(&response).unwrap_or_default();
            warn!(status = response.status, "Token refresh rejected");
            return Err(AuthError::TokenRefreshFailed(format!(
                "Token endpoint returned {}: {}",
                response.status, message
            )));
        }

        parse_token_pair(&response)
    }

    /// Ask the backend who `access_token` belongs to.
    ///
    /// Non-2xx answers are errors; interpreting `valid` is up to the caller.
    #[instrument(skip_all)]
    pub async fn verify(&self, access_token: &str) -> Result<VerifyResponse> {
        let request = self.post(&self.config.verify_path)?.bearer_token(access_token);
        let response = self.send(request).await?;

        if !response.is_success() {
            return Err(request_failed(&self.config.verify_path, &response));
        }

        response
            .json()
            .map_err(|e| AuthError::InvalidResponse(format!("verify: {}", e)))
    }

    /// Tell the backend the session is over. No-op without a logout endpoint.
    #[instrument(skip_all)]
    pub async fn logout(&self, access_token: &str) -> Result<()> {
        let Some(path) = self.config.logout_path.as_deref() else {
            debug!("No logout endpoint configured, skipping backend logout");
            return Ok(());
        };

        let response = self
            .send(self.post(path)?.bearer_token(access_token))
            .await?;

        if !response.is_success() {
            return Err(request_failed(path, &response));
        }

        Ok(())
    }

    #[instrument(skip_all)]
    pub async fn change_password(
        &self,
        access_token: &str,
        current_password: &str,
        new_password: &str,
    ) -> Result<()> {
        let path = &self.config.change_password_path;
        let body = ChangePasswordRequest {
            current_password,
            new_password,
        };
        let request = self
            .post(path)?
            .bearer_token(access_token)
            .json(&body)
            .map_err(encode_error)?;
        let response = self.send(request).await?;

        if !response.is_success() {
            return Err(request_failed(path, &response));
        }

        info!("Password changed");
        Ok(())
    }

    /// Confirm the signed-in user's password before a sensitive action.
    #[instrument(skip_all)]
    pub async fn check_password(&self, access_token: &str, password: &str) -> Result<bool> {
        let path = &self.config.check_password_path;
        let request = self
            .post(path)?
            .bearer_token(access_token)
            .json(&CheckPasswordRequest { password })
            .map_err(encode_error)?;
        let response = self.send(request).await?;

        if !response.is_success() {
            return Err(request_failed(path, &response));
        }

        let body: CheckPasswordResponse = response
            .json()
            .map_err(|e| AuthError::InvalidResponse(format!("check-password: {}", e)))?;
        Ok(body.valid)
    }

    fn post(&self, path: &str) -> Result<HttpRequest> {
        let url = self.config.endpoint(path);
        url::Url::parse(&url)
            .map_err(|e| AuthError::Network(format!("Invalid endpoint URL '{}': {}", url, e)))?;

        Ok(HttpRequest::new(HttpMethod::Post, url)
            .header("Accept", "application/json")
            .timeout(self.config.request_timeout))
    }

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let url = request.url.clone();
        self.http_client.execute(request).await.map_err(|e| {
            warn!(url = %url, error = %e, "Request to SSO backend failed");
            AuthError::Network(e.to_string())
        })
    }
}

fn encode_error(err: bridge_traits::BridgeError) -> AuthError {
    AuthError::InvalidResponse(format!("Failed to encode request: {}", err))
}

fn parse_token_pair(response: &HttpResponse) -> Result<TokenPair> {
    response
        .json()
        .map_err(|e| AuthError::InvalidResponse(format!("token response: {}", e)))
}

fn request_failed(endpoint: &str, response: &HttpResponse) -> AuthError {
    AuthError::RequestFailed {
        endpoint: endpoint.to_string(),
        status: response.status,
        message: backend_message(response).unwrap_or_default(),
    }
}

/// Human-readable error from a failed response.
///
/// Prefers the JSON `message`, `error_description` or `error` field, then the
/// raw body.
fn backend_message(response: &HttpResponse) -> Option<String> {
    if let Ok(value) = response.json::<serde_json::Value>() {
        let field = ["message", "error_description", "error"]
            .iter()
            .find_map(|key| value.get(*key).and_then(|v| v.as_str()))
            .map(str::trim)
            .filter(|s| !s.is_empty());
        if let Some(message) = field {
            return Some(message.to_string());
        }
        if value.is_object() {
            return None;
        }
    }

    response
        .text()
        .ok()
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

fn default_login_message(status: u16) -> String {
    match status {
        400 | 401 | 403 => "Invalid email or password".to_string(),
        429 => "Too many login attempts, try again later".to_string(),
        500..=599 => "The SSO service is unavailable, try again later".to_string(),
        _ => format!("Login failed with status {}", status),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::BridgeError;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct ScriptedHttp {
        responses: Mutex<VecDeque<BridgeResult<HttpResponse>>>,
        requests: Mutex<Vec<HttpRequest>>,
    }

    impl ScriptedHttp {
        fn reply(self, status: u16, body: &str) -> Self {
            self.responses
                .lock()
                .unwrap()
                .push_back(Ok(HttpResponse::new(status, body.to_string())));
            self
        }

        fn fail(self, err: BridgeError) -> Self {
            self.responses.lock().unwrap().push_back(Err(err));
            self
        }

        fn last_request(&self) -> HttpRequest {
            self.requests.lock().unwrap().last().cloned().unwrap()
        }

        fn last_body(&self) -> serde_json::Value {
            let body = self.last_request().body.unwrap();
            serde_json::from_slice(&body).unwrap()
        }

        fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl HttpClient for ScriptedHttp {
        async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
            self.requests.lock().unwrap().push(request);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(BridgeError::NotAvailable("no scripted reply".into())))
        }
    }

    const PAIR_JSON: &str = r#"{
        "accessToken": "at-1",
        "refreshToken": "rt-1",
        "tokenExpiresAt": "2026-03-01T12:15:00Z",
        "refreshTokenExpiresAt": "2026-03-08T12:00:00Z"
    }"#;

    fn client(http: &Arc<ScriptedHttp>, config: ApiConfig) -> SsoApiClient {
        SsoApiClient::new(http.clone(), config)
    }

    fn api() -> ApiConfig {
        ApiConfig::new("https://sso.example.com/").with_request_timeout(Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_login_request_shape() {
        let http = Arc::new(ScriptedHttp::default().reply(200, PAIR_JSON));
        let pair = client(&http, api())
            .login(&Credentials::new("k@x.com", "pw"))
            .await
            .unwrap();

        assert_eq!(pair.access_token, "at-1");
        let request = http.last_request();
        assert_eq!(request.method, HttpMethod::Post);
        assert_eq!(request.url, "https://sso.example.com/auth/login");
        assert_eq!(request.timeout, Some(Duration::from_secs(5)));
        assert_eq!(
            http.last_body(),
            serde_json::json!({"grant_type": "password", "email": "k@x.com", "password": "pw"})
        );
    }

    #[tokio::test]
    async fn test_login_rejection_uses_backend_message() {
        let http = Arc::new(
            ScriptedHttp::default().reply(401, r#"{"message":"Account is locked"}"#),
        );
        let err = client(&http, api())
            .login(&Credentials::new("bad@x.com", "wrong"))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            AuthError::CredentialsRejected {
                status: 401,
                message: "Account is locked".to_string()
            }
        );
        assert_eq!(err.to_string(), "Account is locked");
    }

    #[tokio::test]
    async fn test_login_rejection_message_fallbacks() {
        let http = Arc::new(
            ScriptedHttp::default()
                .reply(400, r#"{"error":"invalid_grant","error_description":"Bad password"}"#)
                .reply(401, "Unauthorized")
                .reply(401, "")
                .reply(503, r#"{"status":503}"#),
        );
        let api_client = client(&http, api());
        let creds = Credentials::new("bad@x.com", "wrong");

        let messages: Vec<String> = collect_login_errors(&api_client, &creds, 4).await;
        assert_eq!(
            messages,
            vec![
                "Bad password",
                "Unauthorized",
                "Invalid email or password",
                "The SSO service is unavailable, try again later",
            ]
        );
    }

    async fn collect_login_errors(
        api_client: &SsoApiClient,
        creds: &Credentials,
        n: usize,
    ) -> Vec<String> {
        let mut out = Vec::new();
        for _ in 0..n {
            out.push(api_client.login(creds).await.unwrap_err().to_string());
        }
        out
    }

    #[tokio::test]
    async fn test_login_transport_failure_is_network_error() {
        let http = Arc::new(ScriptedHttp::default().fail(BridgeError::Timeout("5s".into())));
        let err = client(&http, api())
            .login(&Credentials::new("k@x.com", "pw"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Network(_)));
        assert!(err.is_recoverable());
    }

    #[tokio::test]
    async fn test_login_malformed_body() {
        let http = Arc::new(ScriptedHttp::default().reply(200, r#"{"accessToken":"at"}"#));
        let err = client(&http, api())
            .login(&Credentials::new("k@x.com", "pw"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_refresh_request_shape_and_failure() {
        let http = Arc::new(
            ScriptedHttp::default()
                .reply(200, PAIR_JSON)
                .reply(401, r#"{"message":"Refresh token revoked"}"#),
        );
        let api_client = client(&http, api());

        api_client.refresh("rt-0").await.unwrap();
        assert_eq!(
            http.last_body(),
            serde_json::json!({"grant_type": "refresh_token", "refresh_token": "rt-0"})
        );

        let err = api_client.refresh("rt-0").await.unwrap_err();
        assert!(matches!(err, AuthError::TokenRefreshFailed(ref m) if m.contains("revoked")));
    }

    #[tokio::test]
    async fn test_verify_sends_bearer_without_body() {
        let http = Arc::new(ScriptedHttp::default().reply(
            200,
            r#"{"valid":true,"user_info":{"id":"1","name":"Kim","email":"k@x.com","employee_number":"E1"},"expires_in":840}"#,
        ));
        let response = client(&http, api()).verify("at-1").await.unwrap();

        assert!(response.valid);
        assert_eq!(response.user_info.unwrap().id, "1");
        assert_eq!(response.expires_in, Some(840));

        let request = http.last_request();
        assert_eq!(request.url, "https://sso.example.com/auth/verify");
        assert_eq!(request.bearer(), Some("at-1"));
        assert!(request.body.is_none());
    }

    #[tokio::test]
    async fn test_verify_non_success_is_error() {
        let http = Arc::new(ScriptedHttp::default().reply(401, ""));
        let err = client(&http, api()).verify("at-1").await.unwrap_err();
        assert!(matches!(err, AuthError::RequestFailed { status: 401, .. }));
    }

    #[tokio::test]
    async fn test_logout_without_endpoint_is_noop() {
        let http = Arc::new(ScriptedHttp::default());
        client(&http, api()).logout("at-1").await.unwrap();
        assert_eq!(http.request_count(), 0);
    }

    #[tokio::test]
    async fn test_logout_with_endpoint() {
        let http = Arc::new(ScriptedHttp::default().reply(204, ""));
        client(&http, api().with_logout_path("/auth/logout"))
            .logout("at-1")
            .await
            .unwrap();

        let request = http.last_request();
        assert_eq!(request.url, "https://sso.example.com/auth/logout");
        assert_eq!(request.bearer(), Some("at-1"));
    }

    #[tokio::test]
    async fn test_change_password_payload() {
        let http = Arc::new(
            ScriptedHttp::default()
                .reply(200, "{}")
                .reply(400, r#"{"message":"Current password is incorrect"}"#),
        );
        let api_client = client(&http, api());

        api_client.change_password("at-1", "old", "new").await.unwrap();
        assert_eq!(
            http.last_body(),
            serde_json::json!({"currentPassword": "old", "newPassword": "new"})
        );
        assert_eq!(
            http.last_request().url,
            "https://sso.example.com/api/auth/change-password"
        );

        let err = api_client
            .change_password("at-1", "wrong", "new")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Current password is incorrect"));
    }

    #[tokio::test]
    async fn test_check_password_accepts_both_field_names() {
        let http = Arc::new(
            ScriptedHttp::default()
                .reply(200, r#"{"valid":true}"#)
                .reply(200, r#"{"isValid":false}"#),
        );
        let api_client = client(&http, api());

        assert!(api_client.check_password("at-1", "pw").await.unwrap());
        assert_eq!(http.last_body(), serde_json::json!({"password": "pw"}));
        assert!(!api_client.check_password("at-1", "pw").await.unwrap());
    }
}
