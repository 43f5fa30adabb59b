//! Session Verifier
//!
//! Turns an access token into a [`UserProfile`] by asking the backend. Any
//! doubt counts as invalid: transport errors, non-2xx answers, `valid:false`
//! and `valid:true` without a user all yield [`VerifyOutcome::Invalid`].
//! There are no retries.

use crate::api::SsoApiClient;
use crate::token_store::TokenStore;
use crate::types::UserProfile;
use tracing::{debug, instrument, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyOutcome {
    Valid(UserProfile),
    Invalid,
}

impl VerifyOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, VerifyOutcome::Valid(_))
    }

    pub fn into_user(self) -> Option<UserProfile> {
        match self {
            VerifyOutcome::Valid(user) => Some(user),
            VerifyOutcome::Invalid => None,
        }
    }
}

#[derive(Clone)]
pub struct SessionVerifier {
    api: SsoApiClient,
    token_store: TokenStore,
}

impl SessionVerifier {
    pub fn new(api: SsoApiClient, token_store: TokenStore) -> Self {
        Self { api, token_store }
    }

    /// Verify the stored access token. Without one, no request is made.
    #[instrument(skip(self))]
    pub async fn verify(&self) -> VerifyOutcome {
        match self.token_store.access_token().await {
            Ok(Some(token)) => self.verify_token(&token).await,
            Ok(None) => {
                debug!("No stored access token to verify");
                VerifyOutcome::Invalid
            }
            Err(e) => {
                warn!(error = %e, "Could not read access token");
                VerifyOutcome::Invalid
            }
        }
    }

    /// Verify an explicit access token.
    #[instrument(skip_all)]
    pub async fn verify_token(&self, access_token: &str) -> VerifyOutcome {
        match self.api.verify(access_token).await {
            Ok(response) => match (response.valid, response.user_info) {
                (true, Some(user)) => {
                    debug!(user_id = %user.id, "Access token verified");
                    VerifyOutcome::Valid(user)
                }
                (true, None) => {
                    warn!("Verify response marked valid but carried no user");
                    VerifyOutcome::Invalid
                }
                (false, _) => {
                    debug!("Access token rejected by backend");
                    VerifyOutcome::Invalid
                }
            },
            Err(e) => {
                warn!(error = %e, "Token verification failed");
                VerifyOutcome::Invalid
            }
        }
    }
}
