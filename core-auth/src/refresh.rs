//! Silent Refresh Coordinator
//!
//! Exchanges the stored refresh token for a new pair and re-verifies the
//! result. A single attempt decides the session's fate: every failure wipes
//! the token store so the caller can end the session.
//!
//! ## Flow
//!
//! ```text
//! read store ──none──► NoRefreshToken
//!     │
//! lock (single-flight)
//!     │
//! re-read ──rotated by another refresh──► verify current access token
//!     │
//! refresh expired? ──yes──► clear, Expired         (no request)
//!     │
//! POST refresh ──error──► clear, Failed
//!     │
//! save pair, verify ──invalid──► clear, Failed
//!     │
//! Refreshed(user)
//! ```
//!
//! Refreshes through one coordinator (and its clones) are serialized. A
//! caller that waited on another refresh does not spend the rotated refresh
//! token a second time. Separate coordinators over the same storage are not
//! coordinated; the last write wins.

use crate::api::SsoApiClient;
use crate::token_store::TokenStore;
use crate::types::{TokenPair, UserProfile};
use crate::verifier::{SessionVerifier, VerifyOutcome};
use bridge_traits::time::Clock;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// New pair stored and verified.
    Refreshed(UserProfile),
    /// Nothing to refresh with; the backend was not contacted.
    NoRefreshToken,
    /// The refresh token had already expired; the store was cleared.
    Expired,
    /// Refresh or re-verification failed; the store was cleared.
    Failed(String),
}

impl RefreshOutcome {
    pub fn is_refreshed(&self) -> bool {
        matches!(self, RefreshOutcome::Refreshed(_))
    }
}

#[derive(Clone)]
pub struct RefreshCoordinator {
    api: SsoApiClient,
    token_store: TokenStore,
    verifier: SessionVerifier,
    clock: Arc<dyn Clock>,
    in_flight: Arc<Mutex<()>>,
}

impl RefreshCoordinator {
    pub fn new(
        api: SsoApiClient,
        token_store: TokenStore,
        verifier: SessionVerifier,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            api,
            token_store,
            verifier,
            clock,
            in_flight: Arc::new(Mutex::new(())),
        }
    }

    #[instrument(skip(self))]
    pub async fn refresh(&self) -> RefreshOutcome {
        let snapshot = match self.token_store.read().await {
            Ok(Some(pair)) => pair,
            Ok(None) => {
                debug!("No stored refresh token");
                return RefreshOutcome::NoRefreshToken;
            }
            Err(e) => return self.fail(format!("Could not read token store: {}", e)).await,
        };

        let _guard = self.in_flight.lock().await;

        let current = match self.token_store.read().await {
            Ok(Some(pair)) => pair,
            Ok(None) => {
                debug!("Token store emptied while waiting for another refresh");
                return RefreshOutcome::NoRefreshToken;
            }
            Err(e) => return self.fail(format!("Could not read token store: {}", e)).await,
        };

        if current.refresh_token != snapshot.refresh_token {
            debug!("Token pair rotated by a concurrent refresh, re-verifying");
            return self.verify_stored(&current).await;
        }

        if current.is_refresh_expired_at(self.clock.now()) {
            info!(
                refresh_expires_at = %current.refresh_expires_at,
                "Refresh token expired, not contacting backend"
            );
            self.discard().await;
            return RefreshOutcome::Expired;
        }

        let pair = match self.api.refresh(&current.refresh_token).await {
            Ok(pair) => pair,
            Err(e) => return self.fail(e.to_string()).await,
        };

        if let Err(e) = self.token_store.save(&pair).await {
            return self.fail(e.to_string()).await;
        }

        let outcome = self.verify_stored(&pair).await;
        if outcome.is_refreshed() {
            info!(access_expires_at = %pair.access_expires_at, "Token pair refreshed");
        }
        outcome
    }

    async fn verify_stored(&self, pair: &TokenPair) -> RefreshOutcome {
        match self.verifier.verify_token(&pair.access_token).await {
            VerifyOutcome::Valid(user) => RefreshOutcome::Refreshed(user),
            VerifyOutcome::Invalid => {
                self.fail("Refreshed access token failed verification".to_string())
                    .await
            }
        }
    }

    async fn fail(&self, reason: String) -> RefreshOutcome {
        warn!(reason = %reason, "Silent refresh failed");
        self.discard().await;
        RefreshOutcome::Failed(reason)
    }

    async fn discard(&self) {
        if let Err(e) = self.token_store.clear().await {
            warn!(error = %e, "Failed to clear token store");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_desktop::MemoryLocalStore;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
    use bridge_traits::BridgeError;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use core_runtime::config::ApiConfig;
    use mockall::mock;
    use std::sync::Mutex as StdMutex;

    mock! {
        pub TestClock {}
        impl Clock for TestClock {
            fn now(&self) -> DateTime<Utc>;
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn clock_at(at: DateTime<Utc>) -> Arc<dyn Clock> {
        let mut clock = MockTestClock::new();
        clock.expect_now().returning(move || at);
        Arc::new(clock)
    }

    /// Routes by URL; records every request.
    struct RoutedHttp {
        refresh: StdMutex<Vec<BridgeResult<HttpResponse>>>,
        verify: fn(&str) -> HttpResponse,
        log: StdMutex<Vec<String>>,
        refresh_delay: std::time::Duration,
    }

    impl RoutedHttp {
        fn new(refresh: Vec<BridgeResult<HttpResponse>>, verify: fn(&str) -> HttpResponse) -> Arc<Self> {
            Arc::new(Self {
                refresh: StdMutex::new(refresh),
                verify,
                log: StdMutex::new(Vec::new()),
                refresh_delay: std::time::Duration::ZERO,
            })
        }

        fn calls(&self) -> Vec<String> {
            self.log.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl HttpClient for RoutedHttp {
        async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
            if request.url.ends_with("/auth/verify") {
                let token = request.bearer().unwrap_or_default().to_string();
                self.log.lock().unwrap().push(format!("verify:{}", token));
                return Ok((self.verify)(&token));
            }

            self.log.lock().unwrap().push("refresh".to_string());
            if !self.refresh_delay.is_zero() {
                tokio::time::sleep(self.refresh_delay).await;
            }
            let mut replies = self.refresh.lock().unwrap();
            if replies.is_empty() {
                return Err(BridgeError::NotAvailable("no scripted refresh".into()));
            }
            replies.remove(0)
        }
    }

    fn pair_json(n: u32) -> String {
        format!(
            r#"{{"accessToken":"at-{n}","refreshToken":"rt-{n}","tokenExpiresAt":"2026-03-01T12:15:00Z","refreshTokenExpiresAt":"2026-03-08T12:00:00Z"}}"#
        )
    }

    fn verify_accepts_rotated(token: &str) -> HttpResponse {
        if token == "at-0" {
            HttpResponse::new(200, r#"{"valid":false}"#)
        } else {
            HttpResponse::new(
                200,
                r#"{"valid":true,"user_info":{"id":"1","name":"Kim","email":"k@x.com","employee_number":"E1"}}"#,
            )
        }
    }

    fn stored_pair(refresh_expires_at: DateTime<Utc>) -> TokenPair {
        TokenPair {
            access_token: "at-0".to_string(),
            refresh_token: "rt-0".to_string(),
            access_expires_at: now() - Duration::minutes(1),
            refresh_expires_at,
        }
    }

    async fn coordinator(
        http: Arc<RoutedHttp>,
        stored: Option<TokenPair>,
    ) -> (RefreshCoordinator, TokenStore) {
        let tokens = TokenStore::new(Arc::new(MemoryLocalStore::new()));
        if let Some(pair) = stored {
            tokens.save(&pair).await.unwrap();
        }
        let api = SsoApiClient::new(http, ApiConfig::default());
        let verifier = SessionVerifier::new(api.clone(), tokens.clone());
        (
            RefreshCoordinator::new(api, tokens.clone(), verifier, clock_at(now())),
            tokens,
        )
    }

    #[tokio::test]
    async fn test_refresh_success_replaces_pair() {
        let http = RoutedHttp::new(
            vec![Ok(HttpResponse::new(200, pair_json(1)))],
            verify_accepts_rotated,
        );
        let (refresher, tokens) =
            coordinator(http.clone(), Some(stored_pair(now() + Duration::days(1)))).await;

        let outcome = refresher.refresh().await;

        assert!(matches!(outcome, RefreshOutcome::Refreshed(ref u) if u.id == "1"));
        let stored = tokens.read().await.unwrap().unwrap();
        assert_eq!(stored.access_token, "at-1");
        assert_eq!(stored.refresh_token, "rt-1");
        assert_eq!(http.calls(), vec!["refresh", "verify:at-1"]);
    }

    #[tokio::test]
    async fn test_no_refresh_token_makes_no_request() {
        let http = RoutedHttp::new(vec![], verify_accepts_rotated);
        let (refresher, _) = coordinator(http.clone(), None).await;

        assert_eq!(refresher.refresh().await, RefreshOutcome::NoRefreshToken);
        assert!(http.calls().is_empty());
    }

    #[tokio::test]
    async fn test_expired_refresh_token_short_circuits() {
        let http = RoutedHttp::new(vec![], verify_accepts_rotated);
        let (refresher, tokens) = coordinator(http.clone(), Some(stored_pair(now()))).await;

        assert_eq!(refresher.refresh().await, RefreshOutcome::Expired);
        assert!(http.calls().is_empty());
        assert_eq!(tokens.read().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_backend_rejection_clears_store() {
        let http = RoutedHttp::new(
            vec![Ok(HttpResponse::new(401, r#"{"message":"revoked"}"#))],
            verify_accepts_rotated,
        );
        let (refresher, tokens) =
            coordinator(http.clone(), Some(stored_pair(now() + Duration::days(1)))).await;

        let outcome = refresher.refresh().await;
        assert!(matches!(outcome, RefreshOutcome::Failed(ref m) if m.contains("revoked")));
        assert_eq!(tokens.read().await.unwrap(), None);
        assert_eq!(http.calls(), vec!["refresh"]);
    }

    #[tokio::test]
    async fn test_network_failure_clears_store() {
        let http = RoutedHttp::new(
            vec![Err(BridgeError::Timeout("30s".into()))],
            verify_accepts_rotated,
        );
        let (refresher, tokens) =
            coordinator(http, Some(stored_pair(now() + Duration::days(1)))).await;

        assert!(matches!(refresher.refresh().await, RefreshOutcome::Failed(_)));
        assert_eq!(tokens.read().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_failed_reverification_clears_store() {
        let http = RoutedHttp::new(
            vec![Ok(HttpResponse::new(200, pair_json(1)))],
            |_| HttpResponse::new(200, r#"{"valid":false}"#),
        );
        let (refresher, tokens) =
            coordinator(http, Some(stored_pair(now() + Duration::days(1)))).await;

        assert!(matches!(refresher.refresh().await, RefreshOutcome::Failed(_)));
        assert_eq!(tokens.read().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_concurrent_refreshes_spend_token_once() {
        let http = Arc::new(RoutedHttp {
            refresh: StdMutex::new(vec![
                Ok(HttpResponse::new(200, pair_json(1))),
                Ok(HttpResponse::new(401, r#"{"message":"refresh token reused"}"#)),
            ]),
            verify: verify_accepts_rotated,
            log: StdMutex::new(Vec::new()),
            refresh_delay: std::time::Duration::from_millis(20),
        });
        let (refresher, tokens) =
            coordinator(http.clone(), Some(stored_pair(now() + Duration::days(1)))).await;

        let other = refresher.clone();
        let (a, b) = tokio::join!(refresher.refresh(), other.refresh());

        assert!(a.is_refreshed());
        assert!(b.is_refreshed());
        assert_eq!(
            http.calls().iter().filter(|c| *c == "refresh").count(),
            1
        );
        assert_eq!(
            tokens.read().await.unwrap().map(|p| p.refresh_token),
            Some("rt-1".to_string())
        );
    }
}
