//! # Core Configuration Module
//!
//! Provides configuration management for the SSO console core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! instance that holds all host bridges and settings the session core needs.
//! It enforces fail-fast validation so a missing capability is reported at
//! startup instead of at the first login attempt.
//!
//! ## Required Dependencies
//!
//! - `HttpClient` - Calls to the SSO backend (desktop default: reqwest)
//! - `LocalStore` - Token persistence (desktop default: SQLite file)
//!
//! ## Optional Dependencies
//!
//! - `Clock` - Time source for expiry checks (default: system clock)
//!
//! When the `desktop-shims` feature is enabled, desktop-ready defaults for
//! `HttpClient` and `LocalStore` are injected automatically if not provided.
//!
//! ## Environment
//!
//! [`ApiConfig::from_env`] reads:
//!
//! | Variable | Meaning | Default |
//! |----------|---------|---------|
//! | `SSO_API_URL` | Backend base URL | `NEXT_PUBLIC_API_URL`, then `http://localhost:8080` |
//! | `SSO_LOGOUT_PATH` | Backend logout endpoint | none (local logout only) |
//! | `SSO_REQUEST_TIMEOUT_SECS` | Per-request timeout | `30` |
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::{ApiConfig, CoreConfig};
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .api(ApiConfig::from_env()?)
//!     .http_client(Arc::new(MyHttpClient))
//!     .local_store(Arc::new(MyLocalStore))
//!     .build()?;
//! ```
//!
//! ## Error Handling
//!
//! Without the `desktop-shims` feature, a missing bridge produces an
//! actionable message:
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//!
//! let err = CoreConfig::builder().build().unwrap_err();
//! assert!(err.to_string().contains("HttpClient"));
//! ```

use crate::error::{Error, Result};
use bridge_traits::{Clock, HttpClient, LocalStore, SystemClock};
use std::sync::Arc;
use std::time::Duration;

/// Default backend base URL used when nothing is configured.
pub const DEFAULT_API_URL: &str = "http://localhost:8080";

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default window before access-token expiry that triggers a silent refresh.
pub const DEFAULT_REFRESH_BUFFER: Duration = Duration::from_secs(60);

/// SSO backend endpoints.
///
/// Paths are joined onto `base_url`; a trailing slash on the base and a
/// leading slash on the path are tolerated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    /// Backend base URL (e.g. `https://sso.example.com`)
    pub base_url: String,
    /// Login and refresh endpoint (`grant_type` selects the flow)
    pub login_path: String,
    /// Token verification endpoint
    pub verify_path: String,
    /// Logout endpoint, when the backend has one
    pub logout_path: Option<String>,
    /// Password change endpoint
    pub change_password_path: String,
    /// Password confirmation endpoint
    pub check_password_path: String,
    /// Timeout applied to every backend request
    pub request_timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            login_path: "/auth/login".to_string(),
            verify_path: "/auth/verify".to_string(),
            logout_path: None,
            change_password_path: "/api/auth/change-password".to_string(),
            check_password_path: "/auth/check-password".to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl ApiConfig {
    /// Create a config for the given base URL with default endpoint paths.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Build a config from process environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let base_url = non_empty("SSO_API_URL")
            .or_else(|| non_empty("NEXT_PUBLIC_API_URL"))
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let request_timeout = match non_empty("SSO_REQUEST_TIMEOUT_SECS") {
            Some(raw) => {
                let secs: u64 = raw.trim().parse().map_err(|_| {
                    Error::Config(format!(
                        "SSO_REQUEST_TIMEOUT_SECS must be a whole number of seconds, got '{}'",
                        raw
                    ))
                })?;
                Duration::from_secs(secs)
            }
            None => DEFAULT_REQUEST_TIMEOUT,
        };

        let config = Self {
            base_url,
            logout_path: non_empty("SSO_LOGOUT_PATH"),
            request_timeout,
            ..Self::default()
        };

        config.validate()?;
        Ok(config)
    }

    /// Set the logout endpoint path.
    pub fn with_logout_path(mut self, path: impl Into<String>) -> Self {
        self.logout_path = Some(path.into());
        self
    }

    /// Set the request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Full URL for an endpoint path.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Checks that the base URL is an absolute http(s) URL and the timeout is usable.
    pub fn validate(&self) -> Result<()> {
        let parsed = url::Url::parse(&self.base_url).map_err(|e| {
            Error::Config(format!("Invalid API base URL '{}': {}", self.base_url, e))
        })?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::Config(format!(
                "API base URL must use http or https, got '{}'",
                parsed.scheme()
            )));
        }

        if self.request_timeout.is_zero() {
            return Err(Error::Config(
                "Request timeout must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

/// Access requirement for a group of routes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleRule {
    /// Routes at or below this path are covered
    pub path_prefix: String,
    /// Role the user must hold
    pub role: String,
    /// Restrict the role to one registered system
    pub system: Option<String>,
}

impl RoleRule {
    pub fn new(path_prefix: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            path_prefix: path_prefix.into(),
            role: role.into(),
            system: None,
        }
    }

    pub fn for_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }
}

/// Route layout the guard enforces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteConfig {
    /// Where unauthenticated users are sent
    pub login_path: String,
    /// Where authenticated users land when they open the login route
    pub landing_path: String,
    /// Where users lacking a required role are sent
    pub unauthorized_path: String,
    /// Routes reachable without a session
    pub public_paths: Vec<String>,
    /// Role requirements, first matching prefix wins
    pub role_rules: Vec<RoleRule>,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            login_path: "/login".to_string(),
            landing_path: "/".to_string(),
            unauthorized_path: "/unauthorized".to_string(),
            public_paths: vec!["/login".to_string()],
            role_rules: Vec::new(),
        }
    }
}

impl RouteConfig {
    pub fn with_public_path(mut self, path: impl Into<String>) -> Self {
        self.public_paths.push(path.into());
        self
    }

    pub fn with_role_rule(mut self, rule: RoleRule) -> Self {
        self.role_rules.push(rule);
        self
    }

    /// Checks that every configured path is absolute and the login route is public.
    pub fn validate(&self) -> Result<()> {
        let named = [
            ("login_path", &self.login_path),
            ("landing_path", &self.landing_path),
            ("unauthorized_path", &self.unauthorized_path),
        ];

        for (name, path) in named {
            if !path.starts_with('/') {
                return Err(Error::Config(format!(
                    "{} must be an absolute path, got '{}'",
                    name, path
                )));
            }
        }

        if let Some(bad) = self
            .public_paths
            .iter()
            .chain(self.role_rules.iter().map(|rule| &rule.path_prefix))
            .find(|path| !path.starts_with('/'))
        {
            return Err(Error::Config(format!(
                "Route paths must be absolute, got '{}'",
                bad
            )));
        }

        if !self.public_paths.iter().any(|p| p == &self.login_path) {
            return Err(Error::Config(
                "The login path must be listed in public_paths, otherwise \
                 unauthenticated users are redirected in a loop"
                    .to_string(),
            ));
        }

        Ok(())
    }
}

/// Session lifecycle tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Refresh proactively when the access token expires within this window
    pub refresh_buffer: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            refresh_buffer: DEFAULT_REFRESH_BUFFER,
        }
    }
}

/// Core configuration for the SSO console core.
///
/// This struct holds all dependencies and settings required to build a
/// session. Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// HTTP client for backend requests
    pub http_client: Arc<dyn HttpClient>,

    /// Persistent store for the token pair
    pub local_store: Arc<dyn LocalStore>,

    /// Time source for expiry checks
    pub clock: Arc<dyn Clock>,

    /// Backend endpoints
    pub api: ApiConfig,

    /// Route guard layout
    pub routes: RouteConfig,

    /// Session tuning
    pub session: SessionConfig,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("http_client", &"HttpClient { ... }")
            .field("local_store", &"LocalStore { ... }")
            .field("clock", &"Clock { ... }")
            .field("api", &self.api)
            .field("routes", &self.routes)
            .field("session", &self.session)
            .finish()
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    pub fn validate(&self) -> Result<()> {
        self.api.validate()?;
        self.routes.validate()?;

        if self.session.refresh_buffer >= Duration::from_secs(24 * 60 * 60) {
            return Err(Error::Config(
                "Refresh buffer must be shorter than one day".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn http_client_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "HttpClient".to_string(),
        message: "HttpClient implementation is required to reach the SSO backend. \
                 Desktop: ensure the 'desktop-shims' feature is enabled to use the default ReqwestHttpClient. \
                 Web: inject a fetch-based client."
            .to_string(),
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn local_store_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "LocalStore".to_string(),
        message: "LocalStore implementation is required for token persistence. \
                 Desktop: ensure the 'desktop-shims' feature is enabled to use the default SqliteLocalStore. \
                 Web: inject a localStorage-backed store."
            .to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client(api: &ApiConfig) -> Result<Arc<dyn HttpClient>> {
    use bridge_desktop::ReqwestHttpClient;

    let client = ReqwestHttpClient::with_timeout(api.request_timeout)
        .map_err(|e| Error::Internal(format!("Failed to initialize default HttpClient: {}", e)))?;
    let client: Arc<dyn HttpClient> = Arc::new(client);
    Ok(client)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client(_api: &ApiConfig) -> Result<Arc<dyn HttpClient>> {
    Err(http_client_missing_error())
}

#[cfg(feature = "desktop-shims")]
fn provide_default_local_store() -> Result<Arc<dyn LocalStore>> {
    use bridge_desktop::SqliteLocalStore;
    use std::thread;
    use tokio::runtime::{Handle, Runtime};

    let init_store = || -> Result<SqliteLocalStore> {
        let runtime = Runtime::new().map_err(|e| {
            Error::Internal(format!(
                "Failed to create Tokio runtime for default LocalStore: {}",
                e
            ))
        })?;

        runtime
            .block_on(SqliteLocalStore::open_default())
            .map_err(|e| Error::Internal(format!("Failed to initialize default LocalStore: {}", e)))
    };

    // block_on panics inside a runtime, so hop to a plain thread there
    let store = match Handle::try_current() {
        Ok(_) => thread::spawn(init_store).join().map_err(|_| {
            Error::Internal("Thread panicked while creating default LocalStore".to_string())
        })??,
        Err(_) => init_store()?,
    };

    let store: Arc<dyn LocalStore> = Arc::new(store);
    Ok(store)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_local_store() -> Result<Arc<dyn LocalStore>> {
    Err(local_store_missing_error())
}

/// Builder for constructing [`CoreConfig`] instances.
///
/// Use this builder to incrementally set configuration options and then
/// call [`build()`](CoreConfigBuilder::build) to create the final config.
#[derive(Default)]
pub struct CoreConfigBuilder {
    http_client: Option<Arc<dyn HttpClient>>,
    local_store: Option<Arc<dyn LocalStore>>,
    clock: Option<Arc<dyn Clock>>,
    api: Option<ApiConfig>,
    routes: Option<RouteConfig>,
    session: Option<SessionConfig>,
}

impl CoreConfigBuilder {
    /// Sets the HTTP client used for backend calls.
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Sets the store that persists the token pair.
    pub fn local_store(mut self, store: Arc<dyn LocalStore>) -> Self {
        self.local_store = Some(store);
        self
    }

    /// Sets the time source.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Sets the backend endpoints.
    pub fn api(mut self, api: ApiConfig) -> Self {
        self.api = Some(api);
        self
    }

    /// Shortcut for `api(ApiConfig::new(base_url))`.
    pub fn api_base_url(mut self, base_url: impl Into<String>) -> Self {
        let api = self.api.take().unwrap_or_default();
        self.api = Some(ApiConfig {
            base_url: base_url.into(),
            ..api
        });
        self
    }

    /// Sets the route guard layout.
    pub fn routes(mut self, routes: RouteConfig) -> Self {
        self.routes = Some(routes);
        self
    }

    /// Sets session tuning.
    pub fn session(mut self, session: SessionConfig) -> Self {
        self.session = Some(session);
        self
    }

    /// Builds the final `CoreConfig` instance.
    ///
    /// # Returns
    ///
    /// Returns `Ok(CoreConfig)` on success, or an error if:
    /// - Required bridges are missing (HttpClient, LocalStore) and no desktop
    ///   defaults are available
    /// - Endpoint or route values are invalid
    pub fn build(self) -> Result<CoreConfig> {
        let api = self.api.unwrap_or_default();

        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client(&api)?,
        };

        let local_store = match self.local_store {
            Some(store) => store,
            None => provide_default_local_store()?,
        };

        let config = CoreConfig {
            http_client,
            local_store,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            api,
            routes: self.routes.unwrap_or_default(),
            session: self.session.unwrap_or_default(),
        };

        config.validate()?;

        Ok(config)
    }
}
