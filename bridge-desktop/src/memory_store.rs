//! In-memory Local Storage

use async_trait::async_trait;
use bridge_traits::{error::Result, storage::LocalStore};
use std::collections::BTreeMap;
use tokio::sync::Mutex;

/// Process-local store that forgets everything on drop.
///
/// Useful for tests and for hosts that must not persist credentials.
#[derive(Default)]
pub struct MemoryLocalStore {
    values: Mutex<BTreeMap<String, String>>,
}

impl MemoryLocalStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LocalStore for MemoryLocalStore {
    async fn set_string(&self, key: &str, value: &str) -> Result<()> {
        self.values
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn get_string(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.lock().await.get(key).cloned())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.values.lock().await.remove(key);
        Ok(())
    }

    async fn list_keys(&self) -> Result<Vec<String>> {
        Ok(self.values.lock().await.keys().cloned().collect())
    }

    async fn clear_all(&self) -> Result<()> {
        self.values.lock().await.clear();
        Ok(())
    }
}
