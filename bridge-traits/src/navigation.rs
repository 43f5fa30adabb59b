//! Navigation Abstraction
//!
//! Lets the route guard observe the current route and send the user
//! elsewhere without knowing which router the host uses.

use async_trait::async_trait;

use crate::error::Result;

/// Host router trait
///
/// - Web: wraps the framework router (`router.replace`)
/// - Desktop: in-process history stack
/// - Tests: records every redirect
///
/// # Example
///
/// ```ignore
/// use bridge_traits::navigation::Navigator;
///
/// async fn send_to_login(nav: &dyn Navigator) -> Result<()> {
///     if nav.current_path() != "/login" {
///         nav.redirect("/login").await?;
///     }
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait Navigator: Send + Sync {
    /// Path (with query string, if any) currently displayed
    fn current_path(&self) -> String;

    /// Replace the current route with `path`
    ///
    /// Redirects replace rather than push so the back button does not return
    /// to a route the guard just rejected.
    async fn redirect(&self, path: &str) -> Result<()>;
}
