use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Backend rejected the submitted credentials. `message` is shown to the user.
    #[error("{message}")]
    CredentialsRejected { status: u16, message: String },

    #[error("Token refresh failed: {0}")]
    TokenRefreshFailed(String),

    #[error("Session verification failed: {0}")]
    VerificationFailed(String),

    #[error("Token storage unavailable: {0}")]
    Storage(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response from SSO backend: {0}")]
    InvalidResponse(String),

    #[error("Request to {endpoint} failed with status {status}: {message}")]
    RequestFailed {
        endpoint: String,
        status: u16,
        message: String,
    },

    #[error("Not authenticated")]
    NotAuthenticated,
}

impl AuthError {
    /// Whether retrying the same operation may succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, AuthError::Network(_) | AuthError::Storage(_))
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;
