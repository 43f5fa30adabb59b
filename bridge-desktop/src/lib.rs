//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop hosts
//! (macOS, Windows, Linux) and headless tooling.
//!
//! ## Overview
//!
//! - `HttpClient` using `reqwest`
//! - `LocalStore` using a SQLite-backed key-value table, or an in-memory map
//! - `Navigator` as an in-process history with a `watch` channel of the
//!   current path
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{ReqwestHttpClient, SqliteLocalStore};
//!
//! #[tokio::main]
//! async fn main() -> bridge_traits::error::Result<()> {
//!     let http_client = ReqwestHttpClient::new()?;
//!     let store = SqliteLocalStore::open_default().await?;
//!
//!     // Use in core configuration
//!     Ok(())
//! }
//! ```

mod http;
mod local_store;
mod memory_store;
mod navigator;

pub use http::ReqwestHttpClient;
pub use local_store::SqliteLocalStore;
pub use memory_store::MemoryLocalStore;
pub use navigator::HistoryNavigator;
