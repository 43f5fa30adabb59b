//! # Session Core
//!
//! Client-side session lifecycle for the SSO administration console.
//!
//! ## Overview
//!
//! This crate keeps one console instance signed in against the SSO backend:
//! it persists the token pair, verifies it on startup, refreshes it silently
//! when it expires and guards routes based on the resulting session state.
//!
//! ## Components
//!
//! - [`TokenStore`]: the token pair in the host's local store
//! - [`SsoApiClient`]: login, refresh, verify and logout calls
//! - [`SessionVerifier`]: access token to user profile, failing closed
//! - [`RefreshCoordinator`]: single-flight silent refresh
//! - [`AuthSession`]: the session state machine and its public operations
//! - [`RouteGuard`]: route decisions and redirects

pub mod api;
pub mod error;
pub mod guard;
pub mod refresh;
pub mod session;
pub mod state;
pub mod token_store;
pub mod types;
pub mod verifier;

pub use api::{SsoApiClient, VerifyResponse};
pub use error::{AuthError, Result};
pub use guard::{GuardDecision, RouteGuard};
pub use refresh::{RefreshCoordinator, RefreshOutcome};
pub use session::AuthSession;
pub use state::{EndReason, SessionPhase, SessionState, Transition};
pub use token_store::TokenStore;
pub use types::{Credentials, SystemRole, TokenPair, UserProfile};
pub use verifier::{SessionVerifier, VerifyOutcome};
