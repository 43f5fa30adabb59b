//! Core service façade and bootstrap helpers.
//!
//! This crate wires host-provided bridge implementations (HTTP, local
//! storage, clock, navigation) into the session core. Desktop and headless
//! hosts typically enable the `desktop-shims` feature (which depends on
//! `bridge-desktop`) and call [`bootstrap_desktop`]; web hosts build a
//! [`CoreConfig`] around their own bridges and call [`CoreService::new`].
//!
//! ```no_run
//! # #[cfg(feature = "desktop-shims")]
//! # async fn example() -> core_service::Result<()> {
//! use core_runtime::config::{ApiConfig, RouteConfig};
//! use core_service::bootstrap_desktop;
//!
//! let (core, navigator) =
//!     bootstrap_desktop(ApiConfig::from_env()?, RouteConfig::default(), "/").await?;
//!
//! if !core.session().state().is_authenticated() {
//!     // The guard has already sent the navigator to the login route
//!     println!("now at {}", navigator.history().join(" -> "));
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;

pub use error::{CoreError, Result};

use std::sync::Arc;

use bridge_traits::navigation::Navigator;
use core_auth::{AuthSession, RouteGuard, SessionState};
use core_runtime::config::CoreConfig;
use core_runtime::events::EventBus;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, instrument};

#[cfg(feature = "desktop-shims")]
use bridge_desktop::HistoryNavigator;
#[cfg(feature = "desktop-shims")]
use core_runtime::config::{ApiConfig, RouteConfig};

/// Primary façade exposed to host applications.
#[derive(Clone)]
pub struct CoreService {
    session: Arc<AuthSession>,
    guard: Arc<RouteGuard>,
    event_bus: EventBus,
}

impl CoreService {
    /// Create a service from a validated config and the host's navigator.
    pub fn new(config: CoreConfig, navigator: Arc<dyn Navigator>) -> Result<Self> {
        Self::with_event_bus(config, navigator, EventBus::default())
    }

    /// Like [`new`](Self::new), publishing on a caller-supplied event bus.
    pub fn with_event_bus(
        config: CoreConfig,
        navigator: Arc<dyn Navigator>,
        event_bus: EventBus,
    ) -> Result<Self> {
        config.validate()?;

        let session = Arc::new(AuthSession::from_config(&config, event_bus.clone()));
        let guard = Arc::new(RouteGuard::new(
            config.routes.clone(),
            navigator,
            event_bus.clone(),
        ));

        Ok(Self {
            session,
            guard,
            event_bus,
        })
    }

    pub fn session(&self) -> Arc<AuthSession> {
        Arc::clone(&self.session)
    }

    pub fn guard(&self) -> Arc<RouteGuard> {
        Arc::clone(&self.guard)
    }

    pub fn events(&self) -> &EventBus {
        &self.event_bus
    }

    /// Run the route guard in the background against `path_rx`.
    ///
    /// The task ends when the path channel closes.
    pub fn spawn_guard(&self, path_rx: watch::Receiver<String>) -> JoinHandle<()> {
        let guard = self.guard();
        let session_rx = self.session.subscribe();
        tokio::spawn(async move { guard.run(session_rx, path_rx).await })
    }

    /// Start guarding `path_rx`, then restore the stored session.
    #[instrument(skip_all)]
    pub async fn start(&self, path_rx: watch::Receiver<String>) -> (SessionState, JoinHandle<()>) {
        let guard_task = self.spawn_guard(path_rx);
        let state = self.session.bootstrap().await;
        info!(phase = %state.phase(), "Core service started");
        (state, guard_task)
    }
}

/// Convenience bootstrapper for desktop and headless hosts.
///
/// Uses the reqwest HTTP client, the SQLite store under the platform data
/// directory and an in-process [`HistoryNavigator`] positioned at
/// `initial_path`. The route guard is running and the session bootstrapped
/// when this returns.
#[cfg(feature = "desktop-shims")]
pub async fn bootstrap_desktop(
    api: ApiConfig,
    routes: RouteConfig,
    initial_path: impl Into<String>,
) -> Result<(CoreService, Arc<HistoryNavigator>)> {
    use bridge_desktop::SqliteLocalStore;

    let local_store = SqliteLocalStore::open_default()
        .await
        .map_err(|err| CoreError::InitializationFailed(err.to_string()))?;

    let config = CoreConfig::builder()
        .api(api)
        .routes(routes)
        .local_store(Arc::new(local_store))
        .build()?;

    let navigator = Arc::new(HistoryNavigator::new(initial_path));
    let core = CoreService::new(config, navigator.clone())?;
    core.start(navigator.subscribe()).await;

    Ok((core, navigator))
}
