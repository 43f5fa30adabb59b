//! # Host Bridge Traits
//!
//! Platform abstraction traits that must be implemented by each host shell.
//!
//! ## Overview
//!
//! This crate defines the contract between the session core and the host that
//! embeds it. Each trait represents a capability the core requires but that is
//! provided differently per host (desktop shell, browser, test harness).
//!
//! ## Traits
//!
//! ### Networking
//! - [`HttpClient`](http::HttpClient) - Async HTTP requests against the SSO backend
//!
//! ### Storage
//! - [`LocalStore`](storage::LocalStore) - Flat string key/value persistence
//!   with local-storage semantics (no multi-key transactions)
//!
//! ### Navigation
//! - [`Navigator`](navigation::Navigator) - Current route and redirects
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic expiry checks
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type. Host
//! implementations should convert platform-specific errors to `BridgeError`
//! and keep messages actionable.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so a single implementation can be
//! shared across async tasks behind an `Arc`.
//!
//! ## Examples
//!
//! ### Implementing LocalStore
//!
//! ```ignore
//! use bridge_traits::storage::LocalStore;
//! use bridge_traits::error::Result;
//! use async_trait::async_trait;
//!
//! pub struct BrowserStorage;
//!
//! #[async_trait]
//! impl LocalStore for BrowserStorage {
//!     async fn set_string(&self, key: &str, value: &str) -> Result<()> {
//!         // window.localStorage.setItem(key, value)
//!         todo!()
//!     }
//!     // ...
//! }
//! ```

pub mod error;
pub mod http;
pub mod navigation;
pub mod storage;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
pub use navigation::Navigator;
pub use storage::LocalStore;
pub use time::{Clock, LogEntry, LogLevel, LoggerSink, SystemClock};
