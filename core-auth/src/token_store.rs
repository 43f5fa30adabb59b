//! Token Storage
//!
//! Persists the [`TokenPair`] in the host's [`LocalStore`] under four flat
//! keys, mirroring the browser local-storage layout the console has always
//! used:
//!
//! | Key                     | Value                 |
//! |-------------------------|-----------------------|
//! | `accessToken`           | access token          |
//! | `refreshToken`          | refresh token         |
//! | `tokenExpiresAt`        | RFC 3339 timestamp    |
//! | `refreshTokenExpiresAt` | RFC 3339 timestamp    |
//!
//! The store has no multi-key transaction, so `save` is four sequential
//! writes. A sequence interrupted midway can leave stale keys behind; a
//! missing key reads back as "no session" and an unparseable timestamp is
//! treated as corruption and wiped.
//!
//! Token values are never logged.
//!
//! ## Example
//!
//! ```no_run
//! use core_auth::{TokenPair, TokenStore};
//! use std::sync::Arc;
//! # use bridge_traits::storage::LocalStore;
//! # async fn example(local_store: Arc<dyn LocalStore>, pair: TokenPair) -> core_auth::Result<()> {
//! let token_store = TokenStore::new(local_store);
//!
//! token_store.save(&pair).await?;
//! assert_eq!(token_store.read().await?, Some(pair));
//!
//! token_store.clear().await?;
//! assert_eq!(token_store.read().await?, None);
//! # Ok(())
//! # }
//! ```

use crate::error::{AuthError, Result};
use crate::types::TokenPair;
use bridge_traits::storage::LocalStore;
use chrono::{DateTime, SecondsFormat, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const ACCESS_TOKEN_KEY: &str = "accessToken";
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";
pub const ACCESS_EXPIRES_AT_KEY: &str = "tokenExpiresAt";
pub const REFRESH_EXPIRES_AT_KEY: &str = "refreshTokenExpiresAt";

const ALL_KEYS: [&str; 4] = [
    ACCESS_TOKEN_KEY,
    REFRESH_TOKEN_KEY,
    ACCESS_EXPIRES_AT_KEY,
    REFRESH_EXPIRES_AT_KEY,
];

/// Durable storage for the session's token pair.
#[derive(Clone)]
pub struct TokenStore {
    local_store: Arc<dyn LocalStore>,
}

impl TokenStore {
    pub fn new(local_store: Arc<dyn LocalStore>) -> Self {
        debug!("Initializing TokenStore");
        Self { local_store }
    }

    /// Write all four keys, replacing any previous pair.
    pub async fn save(&self, pair: &TokenPair) -> Result<()> {
        let access_expires_at = format_timestamp(pair.access_expires_at);
        let refresh_expires_at = format_timestamp(pair.refresh_expires_at);

        let writes = [
            (ACCESS_TOKEN_KEY, pair.access_token.as_str()),
            (REFRESH_TOKEN_KEY, pair.refresh_token.as_str()),
            (ACCESS_EXPIRES_AT_KEY, access_expires_at.as_str()),
            (REFRESH_EXPIRES_AT_KEY, refresh_expires_at.as_str()),
        ];

        for (key, value) in writes {
            self.local_store
                .set_string(key, value)
                .await
                .map_err(|e| storage_error("write", key, e))?;
        }

        info!(
            access_expires_at = %access_expires_at,
            refresh_expires_at = %refresh_expires_at,
            "Token pair stored"
        );

        Ok(())
    }

    /// Read the stored pair.
    ///
    /// Returns:
    /// - `Ok(Some(pair))` when all four keys are present and valid
    /// - `Ok(None)` when any key is missing, or when a timestamp was corrupted
    ///   (the keys are then removed)
    /// - `Err` if the local store is unavailable
    pub async fn read(&self) -> Result<Option<TokenPair>> {
        let Some(access_token) = self.get(ACCESS_TOKEN_KEY).await? else {
            debug!("No access token in storage");
            return Ok(None);
        };
        let Some(refresh_token) = self.get(REFRESH_TOKEN_KEY).await? else {
            debug!("No refresh token in storage");
            return Ok(None);
        };
        let Some(raw_access_expiry) = self.get(ACCESS_EXPIRES_AT_KEY).await? else {
            debug!("No access token expiry in storage");
            return Ok(None);
        };
        let Some(raw_refresh_expiry) = self.get(REFRESH_EXPIRES_AT_KEY).await? else {
            debug!("No refresh token expiry in storage");
            return Ok(None);
        };

        let (access_expires_at, refresh_expires_at) = match (
            parse_timestamp(&raw_access_expiry),
            parse_timestamp(&raw_refresh_expiry),
        ) {
            (Some(access), Some(refresh)) => (access, refresh),
            _ => {
                warn!("Stored token expiry is not a valid timestamp, discarding session");
                if let Err(e) = self.clear().await {
                    warn!(error = %e, "Failed to delete corrupted token data");
                }
                return Ok(None);
            }
        };

        Ok(Some(TokenPair {
            access_token,
            refresh_token,
            access_expires_at,
            refresh_expires_at,
        }))
    }

    /// Read only the access token.
    pub async fn access_token(&self) -> Result<Option<String>> {
        self.get(ACCESS_TOKEN_KEY).await
    }

    /// Remove all four keys. Succeeds when nothing is stored.
    pub async fn clear(&self) -> Result<()> {
        for key in ALL_KEYS {
            self.local_store
                .delete(key)
                .await
                .map_err(|e| storage_error("delete", key, e))?;
        }

        info!("Token pair cleared");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .local_store
            .get_string(key)
            .await
            .map_err(|e| storage_error("read", key, e))?;

        Ok(value.filter(|v| !v.is_empty()))
    }
}

fn storage_error(operation: &str, key: &str, err: bridge_traits::BridgeError) -> AuthError {
    warn!(key, operation, error = %err, "Local storage operation failed");
    AuthError::Storage(format!("{} {}: {}", operation, key, err))
}

fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|at| at.with_timezone(&Utc))
}
