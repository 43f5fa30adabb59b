//! Local Storage Abstraction
//!
//! Provides a platform-agnostic trait for the flat string key/value store the
//! session core persists its credentials in.

use async_trait::async_trait;

use crate::error::Result;

/// Flat key-value storage trait
///
/// Mirrors the contract of browser local storage so the same core runs on
/// top of:
/// - Web: `window.localStorage`
/// - Desktop: SQLite-backed key-value table
/// - Tests: in-memory map
///
/// Values are plain strings. Each call touches exactly one key; there is no
/// multi-key transaction primitive, so callers that write several keys must
/// tolerate a partially applied sequence.
///
/// The store is shared by every session of the same origin/profile. No change
/// notifications are delivered; readers observe other writers only on their
/// next access.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::LocalStore;
///
/// async fn remember_theme(store: &dyn LocalStore) -> Result<()> {
///     store.set_string("theme", "dark").await?;
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait LocalStore: Send + Sync {
    /// Store a string value, replacing any previous value
    async fn set_string(&self, key: &str, value: &str) -> Result<()>;

    /// Retrieve a string value
    ///
    /// Returns `Ok(None)` if the key doesn't exist.
    async fn get_string(&self, key: &str) -> Result<Option<String>>;

    /// Delete a key
    ///
    /// Succeeds even if the key doesn't exist.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Check if a key exists
    async fn has_key(&self, key: &str) -> Result<bool> {
        Ok(self.get_string(key).await?.is_some())
    }

    /// List all keys
    async fn list_keys(&self) -> Result<Vec<String>>;

    /// Clear all keys
    ///
    /// Use with caution! This removes data written by other components too.
    async fn clear_all(&self) -> Result<()>;
}
