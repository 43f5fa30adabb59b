//! Local Storage using SQLite

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::LocalStore,
};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions},
    Row,
};
use std::path::PathBuf;
use tracing::debug;

const CREATE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS local_storage (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL,
        updated_at INTEGER NOT NULL
    )
"#;

/// SQLite-backed local store implementation
///
/// Provides durable string key-value storage that survives restarts, the
/// desktop counterpart of browser local storage:
/// - One row per key, last write wins
/// - No cross-key transactions are exposed
/// - Async operations
pub struct SqliteLocalStore {
    pool: SqlitePool,
}

impl SqliteLocalStore {
    /// Open (or create) a store at the given database path
    pub async fn new(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(BridgeError::Io)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .connect_with(options)
            .await
            .map_err(|e| BridgeError::Storage(format!("Failed to connect to DB: {}", e)))?;

        Self::create_table(&pool).await?;

        debug!(path = ?db_path, "Initialized local store");

        Ok(Self { pool })
    }

    /// Open the store in the platform data directory
    pub async fn open_default() -> Result<Self> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| BridgeError::NotAvailable("platform data directory".to_string()))?;

        Self::new(data_dir.join("sso-console").join("local_storage.db")).await
    }

    /// Create an in-memory store (for testing)
    pub async fn in_memory() -> Result<Self> {
        // A single connection, otherwise every pooled connection gets its own database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| BridgeError::Storage(format!("Failed to connect to DB: {}", e)))?;

        Self::create_table(&pool).await?;

        Ok(Self { pool })
    }

    async fn create_table(pool: &SqlitePool) -> Result<()> {
        sqlx::query(CREATE_TABLE)
            .execute(pool)
            .await
            .map_err(|e| BridgeError::Storage(format!("Failed to create table: {}", e)))?;
        Ok(())
    }

    /// Get the current Unix timestamp
    fn now() -> i64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or_default()
    }
}

#[async_trait]
impl LocalStore for SqliteLocalStore {
    async fn set_string(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO local_storage (key, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(Self::now())
        .execute(&self.pool)
        .await
        .map_err(|e| BridgeError::Storage(format!("Failed to set key: {}", e)))?;

        debug!(key = key, "Stored value");
        Ok(())
    }

    async fn get_string(&self, key: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT value FROM local_storage WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| BridgeError::Storage(format!("Failed to get key: {}", e)))?;

        Ok(row.map(|row| row.get(0)))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM local_storage WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| BridgeError::Storage(format!("Failed to delete key: {}", e)))?;

        debug!(key = key, "Deleted value");
        Ok(())
    }

    async fn has_key(&self, key: &str) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM local_storage WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| BridgeError::Storage(format!("Failed to check key: {}", e)))?;

        Ok(row.is_some())
    }

    async fn list_keys(&self) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT key FROM local_storage ORDER BY key")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| BridgeError::Storage(format!("Failed to list keys: {}", e)))?;

        Ok(rows.into_iter().map(|row| row.get(0)).collect())
    }

    async fn clear_all(&self) -> Result<()> {
        sqlx::query("DELETE FROM local_storage")
            .execute(&self.pool)
            .await
            .map_err(|e| BridgeError::Storage(format!("Failed to clear store: {}", e)))?;

        debug!("Cleared local store");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_string_operations() {
        let store = SqliteLocalStore::in_memory().await.unwrap();

        store.set_string("accessToken", "abc").await.unwrap();
        let value = store.get_string("accessToken").await.unwrap();
        assert_eq!(value, Some("abc".to_string()));
        assert!(store.has_key("accessToken").await.unwrap());

        store.delete("accessToken").await.unwrap();
        let value = store.get_string("accessToken").await.unwrap();
        assert_eq!(value, None);
        assert!(!store.has_key("accessToken").await.unwrap());
    }

    #[tokio::test]
    async fn test_overwrite() {
        let store = SqliteLocalStore::in_memory().await.unwrap();

        store.set_string("refreshToken", "old").await.unwrap();
        store.set_string("refreshToken", "new").await.unwrap();

        assert_eq!(
            store.get_string("refreshToken").await.unwrap(),
            Some("new".to_string())
        );
    }

    #[tokio::test]
    async fn test_list_and_clear() {
        let store = SqliteLocalStore::in_memory().await.unwrap();

        store.set_string("key2", "value2").await.unwrap();
        store.set_string("key1", "value1").await.unwrap();

        let keys = store.list_keys().await.unwrap();
        assert_eq!(keys, vec!["key1", "key2"]);

        store.clear_all().await.unwrap();
        assert!(store.list_keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_file_store_survives_reopen() {
        let dir = std::env::temp_dir().join(format!("sso-console-store-{}", std::process::id()));
        let path = dir.join("local_storage.db");

        {
            let store = SqliteLocalStore::new(path.clone()).await.unwrap();
            store.set_string("tokenExpiresAt", "2030-01-01T00:00:00Z").await.unwrap();
        }

        let reopened = SqliteLocalStore::new(path).await.unwrap();
        assert_eq!(
            reopened.get_string("tokenExpiresAt").await.unwrap(),
            Some("2030-01-01T00:00:00Z".to_string())
        );

        let _ = std::fs::remove_dir_all(dir);
    }
}
