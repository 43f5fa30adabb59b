//! Auth Session
//!
//! The single owner of session state for one console instance. It wires the
//! token store, verifier and refresh coordinator together, publishes every
//! [`SessionState`] change on a `watch` channel and mirrors it as
//! [`AuthEvent`]s on the [`EventBus`].
//!
//! State is updated before each operation returns, so a caller that awaited
//! `login()` observes `is_authenticated() == true` immediately afterwards.
//!
//! Errors from background work (bootstrap verification, silent refresh) never
//! reach callers; they only show up as transitions. `login()` is the exception
//! and returns the backend's message for the login form.
//!
//! ## Example
//!
//! ```no_run
//! use core_auth::{AuthSession, Credentials};
//! use core_runtime::config::CoreConfig;
//! use core_runtime::events::EventBus;
//!
//! # async fn example(config: CoreConfig) -> core_auth::Result<()> {
//! let session = AuthSession::from_config(&config, EventBus::default());
//! let mut state_rx = session.subscribe();
//!
//! session.bootstrap().await;
//! if !session.state().is_authenticated() {
//!     let user = session.login(&Credentials::new("k@x.com", "secret")).await?;
//!     println!("Welcome {}", user.name);
//! }
//!
//! state_rx.changed().await.ok();
//! # Ok(())
//! # }
//! ```

use crate::api::SsoApiClient;
use crate::error::{AuthError, Result};
use crate::refresh::{RefreshCoordinator, RefreshOutcome};
use crate::state::{EndReason, SessionState, Transition};
use crate::token_store::TokenStore;
use crate::types::{Credentials, UserProfile};
use crate::verifier::{SessionVerifier, VerifyOutcome};
use bridge_traits::http::HttpClient;
use bridge_traits::storage::LocalStore;
use bridge_traits::time::Clock;
use core_runtime::config::{ApiConfig, CoreConfig, SessionConfig};
use core_runtime::events::{AuthEvent, CoreEvent, EventBus};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

pub struct AuthSession {
    api: SsoApiClient,
    token_store: TokenStore,
    verifier: SessionVerifier,
    refresher: RefreshCoordinator,
    clock: Arc<dyn Clock>,
    event_bus: EventBus,
    state: watch::Sender<SessionState>,
    refresh_buffer: chrono::Duration,
    bootstrapped: AtomicBool,
}

impl AuthSession {
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        local_store: Arc<dyn LocalStore>,
        clock: Arc<dyn Clock>,
        api_config: ApiConfig,
        session_config: SessionConfig,
        event_bus: EventBus,
    ) -> Self {
        let api = SsoApiClient::new(http_client, api_config);
        let token_store = TokenStore::new(local_store);
        let verifier = SessionVerifier::new(api.clone(), token_store.clone());
        let refresher = RefreshCoordinator::new(
            api.clone(),
            token_store.clone(),
            verifier.clone(),
            clock.clone(),
        );
        let (state, _) = watch::channel(SessionState::default());
        let refresh_buffer = chrono::Duration::from_std(session_config.refresh_buffer)
            .unwrap_or_else(|_| chrono::Duration::zero());

        Self {
            api,
            token_store,
            verifier,
            refresher,
            clock,
            event_bus,
            state,
            refresh_buffer,
            bootstrapped: AtomicBool::new(false),
        }
    }

    pub fn from_config(config: &CoreConfig, event_bus: EventBus) -> Self {
        Self::new(
            config.http_client.clone(),
            config.local_store.clone(),
            config.clock.clone(),
            config.api.clone(),
            config.session,
            event_bus,
        )
    }

    /// Current state snapshot.
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Receiver notified on every transition.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn token_store(&self) -> &TokenStore {
        &self.token_store
    }

    /// Restore the stored session. Runs once; later calls return the current
    /// state without touching storage or the network.
    #[instrument(skip(self))]
    pub async fn bootstrap(&self) -> SessionState {
        if self.bootstrapped.swap(true, Ordering::SeqCst) {
            debug!("Bootstrap already ran");
            return self.state();
        }

        self.emit(AuthEvent::Bootstrapping);
        self.apply(Transition::Bootstrap);

        // A partially written pair counts as no session
        let stored = match self.token_store.read().await {
            Ok(stored) => stored,
            Err(e) => {
                warn!(error = %e, "Could not read stored session");
                None
            }
        };

        let Some(pair) = stored else {
            info!("No stored session");
            self.end(EndReason::NoStoredSession);
            return self.state();
        };

        self.apply(Transition::StartVerify);
        match self.verifier.verify_token(&pair.access_token).await {
            VerifyOutcome::Valid(user) => self.authenticate(user),
            VerifyOutcome::Invalid => {
                debug!("Stored access token rejected, attempting silent refresh");
                self.run_refresh().await;
            }
        }

        self.state()
    }

    /// Sign in with email and password.
    ///
    /// On rejection the store and state are untouched and the backend's
    /// message is returned. If the issued token then fails verification, the
    /// stored pair is discarded and [`AuthError::VerificationFailed`] returned.
    #[instrument(skip_all)]
    pub async fn login(&self, credentials: &Credentials) -> Result<UserProfile> {
        self.emit(AuthEvent::SigningIn);

        let pair = match self.api.login(credentials).await {
            Ok(pair) => pair,
            Err(e) => {
                self.emit_error(&e);
                return Err(e);
            }
        };

        if let Err(e) = self.token_store.save(&pair).await {
            self.emit_error(&e);
            return Err(e);
        }

        match self.verifier.verify_token(&pair.access_token).await {
            VerifyOutcome::Valid(user) => {
                self.authenticate(user.clone());
                Ok(user)
            }
            VerifyOutcome::Invalid => {
                self.discard_tokens().await;
                let err = AuthError::VerificationFailed(
                    "The issued access token could not be verified".to_string(),
                );
                self.emit_error(&err);
                Err(err)
            }
        }
    }

    /// End the session locally, informing the backend on a best-effort basis.
    ///
    /// Always transitions to signed-out, even when the backend or the store
    /// fails. A store failure is still reported to the caller.
    #[instrument(skip(self))]
    pub async fn logout(&self) -> Result<()> {
        match self.token_store.access_token().await {
            Ok(Some(token)) => {
                if let Err(e) = self.api.logout(&token).await {
                    warn!(error = %e, "Backend logout failed, continuing with local logout");
                }
            }
            Ok(None) => debug!("No stored access token, skipping backend logout"),
            Err(e) => warn!(error = %e, "Could not read access token for backend logout"),
        }

        let cleared = self.token_store.clear().await;

        let already_logged_out = {
            let state = self.state.borrow();
            !state.is_authenticated() && state.end_reason() == Some(EndReason::LoggedOut)
        };
        if already_logged_out {
            debug!("Already logged out");
        } else {
            info!("Logged out");
            self.end(EndReason::LoggedOut);
        }

        cleared
    }

    /// Force a silent refresh. Any outcome other than success ends the session.
    #[instrument(skip(self))]
    pub async fn refresh_token(&self) -> bool {
        self.run_refresh().await
    }

    /// Access token for an API call, refreshed first when it expires within
    /// the configured buffer.
    #[instrument(skip(self))]
    pub async fn valid_access_token(&self) -> Result<String> {
        let Some(pair) = self.token_store.read().await? else {
            if self.state.borrow().is_authenticated() {
                warn!("Token pair vanished from storage, ending session");
                self.end(EndReason::SessionExpired);
            }
            return Err(AuthError::NotAuthenticated);
        };

        if !pair.access_expires_within(self.clock.now(), self.refresh_buffer) {
            return Ok(pair.access_token);
        }

        debug!(access_expires_at = %pair.access_expires_at, "Access token near expiry");
        if !self.run_refresh().await {
            return Err(AuthError::NotAuthenticated);
        }

        self.token_store
            .access_token()
            .await?
            .ok_or(AuthError::NotAuthenticated)
    }

    #[instrument(skip_all)]
    pub async fn change_password(&self, current_password: &str, new_password: &str) -> Result<()> {
        let token = self.valid_access_token().await?;
        self.api
            .change_password(&token, current_password, new_password)
            .await?;
        self.emit(AuthEvent::PasswordChanged);
        Ok(())
    }

    #[instrument(skip_all)]
    pub async fn check_password(&self, password: &str) -> Result<bool> {
        let token = self.valid_access_token().await?;
        self.api.check_password(&token, password).await
    }

    async fn run_refresh(&self) -> bool {
        self.apply(Transition::StartRefresh);
        self.emit(AuthEvent::TokenRefreshing);

        match self.refresher.refresh().await {
            RefreshOutcome::Refreshed(user) => {
                if let Ok(Some(pair)) = self.token_store.read().await {
                    self.emit(AuthEvent::TokenRefreshed {
                        expires_at: pair.access_expires_at,
                    });
                }
                self.authenticate(user);
                true
            }
            outcome => {
                info!(?outcome, "Silent refresh did not renew the session");
                if let RefreshOutcome::Failed(message) = &outcome {
                    self.emit(AuthEvent::AuthError {
                        message: message.clone(),
                        recoverable: false,
                    });
                }
                let reason = match outcome {
                    RefreshOutcome::NoRefreshToken => self.reason_without_tokens(),
                    _ => EndReason::SessionExpired,
                };
                self.discard_tokens().await;
                self.end(reason);
                false
            }
        }
    }

    /// End reason when a refresh found nothing stored: a live session lost
    /// its tokens, otherwise the previous reason stands.
    fn reason_without_tokens(&self) -> EndReason {
        let state = self.state.borrow();
        if state.is_authenticated() {
            EndReason::SessionExpired
        } else {
            state.end_reason().unwrap_or(EndReason::NoStoredSession)
        }
    }

    fn authenticate(&self, user: UserProfile) {
        info!(user_id = %user.id, "Session authenticated");
        let event = AuthEvent::SignedIn {
            user_id: user.id.clone(),
            name: user.name.clone(),
        };
        self.apply(Transition::Authenticate(user));
        self.emit(event);
    }

    fn end(&self, reason: EndReason) {
        self.apply(Transition::End(reason));
        self.emit(AuthEvent::SignedOut {
            reason: reason.into(),
        });
    }

    fn apply(&self, transition: Transition) {
        self.state.send_modify(|state| state.transition(transition));
        debug!(phase = %self.state.borrow().phase(), "Session transition");
    }

    async fn discard_tokens(&self) {
        if let Err(e) = self.token_store.clear().await {
            warn!(error = %e, "Failed to clear token store");
        }
    }

    fn emit(&self, event: AuthEvent) {
        let _ = self.event_bus.emit(CoreEvent::Auth(event));
    }

    fn emit_error(&self, err: &AuthError) {
        self.emit(AuthEvent::AuthError {
            message: err.to_string(),
            recoverable: err.is_recoverable(),
        });
    }
}
