//! Session state machine
//!
//! ```text
//!                 Bootstrap
//!                     │
//!               ┌─────▼──────┐  no stored token
//!               │Bootstrapping├──────────────────────┐
//!               └─────┬──────┘                       │
//!                StartVerify                         │
//!               ┌─────▼─────┐  Authenticate   ┌──────▼────────┐
//!               │ Verifying ├────────────────►│               │
//!               └─────┬─────┘                 │ Authenticated │
//!                StartRefresh                 │       /       │
//!               ┌─────▼─────┐  Authenticate   │Unauthenticated│
//!               │Refreshing ├────────────────►│               │
//!               └───────────┘  End(reason)    └───────────────┘
//! ```
//!
//! [`SessionState::apply`] is pure; the session owner decides which
//! transition to apply and publishes the result.

use crate::types::UserProfile;
use core_runtime::events::SignOutReason;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SessionPhase {
    #[default]
    Bootstrapping,
    Verifying,
    Refreshing,
    Authenticated,
    Unauthenticated,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionPhase::Bootstrapping => write!(f, "Bootstrapping"),
            SessionPhase::Verifying => write!(f, "Verifying..."),
            SessionPhase::Refreshing => write!(f, "Refreshing..."),
            SessionPhase::Authenticated => write!(f, "Authenticated"),
            SessionPhase::Unauthenticated => write!(f, "Unauthenticated"),
        }
    }
}

/// Why the session is no longer authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndReason {
    NoStoredSession,
    LoggedOut,
    SessionExpired,
}

impl From<EndReason> for SignOutReason {
    fn from(reason: EndReason) -> Self {
        match reason {
            EndReason::NoStoredSession => SignOutReason::NoStoredSession,
            EndReason::LoggedOut => SignOutReason::LoggedOut,
            EndReason::SessionExpired => SignOutReason::SessionExpired,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Bootstrap,
    StartVerify,
    StartRefresh,
    Authenticate(UserProfile),
    End(EndReason),
}

/// Snapshot of the session as seen by the UI.
///
/// `is_authenticated()` is derived from the presence of a user, so it can
/// never disagree with `user()`.
///
/// # Examples
///
/// ```
/// use core_auth::{EndReason, SessionState, Transition};
///
/// let state = SessionState::default();
/// assert!(state.is_loading());
///
/// let state = state.apply(Transition::End(EndReason::NoStoredSession));
/// assert!(!state.is_loading());
/// assert!(!state.is_authenticated());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionState {
    phase: SessionPhase,
    user: Option<UserProfile>,
    end_reason: Option<EndReason>,
}

impl SessionState {
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn user(&self) -> Option<&UserProfile> {
        self.user.as_ref()
    }

    /// Set once the session has ended, cleared by the next `Authenticate`.
    pub fn end_reason(&self) -> Option<EndReason> {
        self.end_reason
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    /// True while a bootstrap or transition is in flight and no user is known.
    pub fn is_loading(&self) -> bool {
        self.user.is_none()
            && matches!(
                self.phase,
                SessionPhase::Bootstrapping | SessionPhase::Verifying | SessionPhase::Refreshing
            )
    }

    /// Returns the state after `transition`.
    pub fn apply(self, transition: Transition) -> Self {
        match transition {
            Transition::Bootstrap => Self {
                phase: SessionPhase::Bootstrapping,
                ..self
            },
            Transition::StartVerify => Self {
                phase: SessionPhase::Verifying,
                ..self
            },
            Transition::StartRefresh => Self {
                phase: SessionPhase::Refreshing,
                ..self
            },
            Transition::Authenticate(user) => Self {
                phase: SessionPhase::Authenticated,
                user: Some(user),
                end_reason: None,
            },
            Transition::End(reason) => Self {
                phase: SessionPhase::Unauthenticated,
                user: None,
                end_reason: Some(reason),
            },
        }
    }

    /// In-place form of [`apply`](Self::apply), for `watch::Sender::send_modify`.
    pub fn transition(&mut self, transition: Transition) {
        *self = std::mem::take(self).apply(transition);
    }
}
