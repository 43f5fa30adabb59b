//! In-process Navigator

use async_trait::async_trait;
use bridge_traits::{error::Result, navigation::Navigator};
use std::sync::Mutex;
use tokio::sync::watch;
use tracing::debug;

/// History-stack navigator for hosts without a browser router.
///
/// The current path is published on a `watch` channel so a route guard can
/// react to every change, whether it came from the user (`navigate`) or from
/// a redirect.
pub struct HistoryNavigator {
    current: watch::Sender<String>,
    history: Mutex<Vec<String>>,
}

impl HistoryNavigator {
    /// Create a navigator positioned at `initial_path`
    pub fn new(initial_path: impl Into<String>) -> Self {
        let initial_path = initial_path.into();
        let (current, _) = watch::channel(initial_path.clone());
        Self {
            current,
            history: Mutex::new(vec![initial_path]),
        }
    }

    /// User-initiated navigation; pushes a new history entry
    pub fn navigate(&self, path: impl Into<String>) {
        let path = path.into();
        debug!(path = %path, "Navigating");
        if let Ok(mut history) = self.history.lock() {
            history.push(path.clone());
        }
        self.current.send_replace(path);
    }

    /// Receiver that observes every path change
    pub fn subscribe(&self) -> watch::Receiver<String> {
        self.current.subscribe()
    }

    /// Snapshot of the history stack, oldest first
    pub fn history(&self) -> Vec<String> {
        self.history
            .lock()
            .map(|history| history.clone())
            .unwrap_or_default()
    }
}

impl Default for HistoryNavigator {
    fn default() -> Self {
        Self::new("/")
    }
}

#[async_trait]
impl Navigator for HistoryNavigator {
    fn current_path(&self) -> String {
        self.current.borrow().clone()
    }

    async fn redirect(&self, path: &str) -> Result<()> {
        debug!(path = %path, "Redirecting");
        if let Ok(mut history) = self.history.lock() {
            match history.last_mut() {
                Some(last) => *last = path.to_string(),
                None => history.push(path.to_string()),
            }
        }
        self.current.send_replace(path.to_string());
        Ok(())
    }
}
