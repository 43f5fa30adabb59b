//! Route Guard
//!
//! Decides, for a route and a session snapshot, whether the route may render.
//! [`RouteGuard::evaluate`] is a pure function of its inputs;
//! [`RouteGuard::run`] applies its decisions through the host [`Navigator`]
//! whenever the session or the current path changes.
//!
//! | Session          | Route                          | Decision                          |
//! |------------------|--------------------------------|-----------------------------------|
//! | loading          | any                            | `Loading`                         |
//! | unauthenticated  | public                         | `Render`                          |
//! | unauthenticated  | protected                      | login, with `next` (and `reason`) |
//! | authenticated    | login                          | `next` target or landing page     |
//! | authenticated    | covered by an unmet role rule  | unauthorized page                 |
//! | authenticated    | anything else                  | `Render`                          |

use crate::state::{EndReason, SessionState};
use crate::types::UserProfile;
use bridge_traits::navigation::Navigator;
use core_runtime::config::{RoleRule, RouteConfig};
use core_runtime::events::{CoreEvent, EventBus, NavigationEvent, RedirectReason};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use url::form_urlencoded;

pub const NEXT_PARAM: &str = "next";
pub const REASON_PARAM: &str = "reason";
pub const SESSION_EXPIRED_REASON: &str = "session_expired";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// Session not yet known; show a loading indicator.
    Loading,
    Render,
    Redirect { to: String, reason: RedirectReason },
}

impl GuardDecision {
    pub fn is_render(&self) -> bool {
        matches!(self, GuardDecision::Render)
    }

    pub fn redirect_target(&self) -> Option<&str> {
        match self {
            GuardDecision::Redirect { to, .. } => Some(to.as_str()),
            _ => None,
        }
    }
}

pub struct RouteGuard {
    routes: RouteConfig,
    navigator: Arc<dyn Navigator>,
    event_bus: EventBus,
}

impl RouteGuard {
    pub fn new(routes: RouteConfig, navigator: Arc<dyn Navigator>, event_bus: EventBus) -> Self {
        Self {
            routes,
            navigator,
            event_bus,
        }
    }

    pub fn routes(&self) -> &RouteConfig {
        &self.routes
    }

    /// Decide what to do with `path` (query string allowed) given `state`.
    pub fn evaluate(&self, path: &str, state: &SessionState) -> GuardDecision {
        if state.is_loading() {
            return GuardDecision::Loading;
        }

        let route = route_of(path);

        let Some(user) = state.user() else {
            if self.is_public(route) {
                return GuardDecision::Render;
            }
            let expired = state.end_reason() == Some(EndReason::SessionExpired);
            return GuardDecision::Redirect {
                to: self.login_url(path, expired),
                reason: RedirectReason::Unauthenticated,
            };
        };

        if route == self.routes.login_path {
            return GuardDecision::Redirect {
                to: next_target(path).unwrap_or_else(|| self.routes.landing_path.clone()),
                reason: RedirectReason::AlreadyAuthenticated,
            };
        }

        if route != self.routes.unauthorized_path {
            if let Some(rule) = self
                .routes
                .role_rules
                .iter()
                .find(|rule| is_under(route, &rule.path_prefix))
            {
                if !satisfies(user, rule) {
                    debug!(route, role = %rule.role, "Missing role for route");
                    return GuardDecision::Redirect {
                        to: self.routes.unauthorized_path.clone(),
                        reason: RedirectReason::Forbidden,
                    };
                }
            }
        }

        GuardDecision::Render
    }

    /// Evaluate and, on a redirect, send the navigator to the target.
    ///
    /// Navigator failures are logged and published, never returned.
    pub async fn enforce(&self, path: &str, state: &SessionState) -> GuardDecision {
        let decision = self.evaluate(path, state);

        if let GuardDecision::Redirect { to, reason } = &decision {
            if to == path {
                return decision;
            }
            match self.navigator.redirect(to).await {
                Ok(()) => {
                    info!(from = %path, to = %to, ?reason, "Route guard redirect");
                    self.emit(NavigationEvent::Redirected {
                        from: path.to_string(),
                        to: to.clone(),
                        reason: *reason,
                    });
                }
                Err(e) => {
                    warn!(to = %to, error = %e, "Route guard redirect failed");
                    self.emit(NavigationEvent::RedirectFailed {
                        to: to.clone(),
                        message: e.to_string(),
                    });
                }
            }
        }

        decision
    }

    /// Re-evaluate on every session or path change until either channel closes.
    pub async fn run(
        &self,
        mut session_rx: watch::Receiver<SessionState>,
        mut path_rx: watch::Receiver<String>,
    ) {
        debug!("Route guard started");

        loop {
            let state = session_rx.borrow_and_update().clone();
            let path = path_rx.borrow_and_update().clone();
            self.enforce(&path, &state).await;

            tokio::select! {
                changed = session_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                changed = path_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        debug!("Route guard stopped");
    }

    fn is_public(&self, route: &str) -> bool {
        self.routes
            .public_paths
            .iter()
            .any(|public| is_under(route, public))
    }

    fn login_url(&self, path: &str, expired: bool) -> String {
        let mut query = form_urlencoded::Serializer::new(String::new());
        query.append_pair(NEXT_PARAM, path);
        if expired {
            query.append_pair(REASON_PARAM, SESSION_EXPIRED_REASON);
        }
        format!("{}?{}", self.routes.login_path, query.finish())
    }

    fn emit(&self, event: NavigationEvent) {
        let _ = self.event_bus.emit(CoreEvent::Navigation(event));
    }
}

fn route_of(path: &str) -> &str {
    path.split(|c: char| c == '?' || c == '#').next().unwrap_or(path)
}

fn is_under(route: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    route == prefix
        || route
            .strip_prefix(prefix)
            .map_or(false, |rest| rest.starts_with('/'))
}

fn satisfies(user: &UserProfile, rule: &RoleRule) -> bool {
    match &rule.system {
        Some(system) => user.has_system_role(system, &rule.role),
        None => user.has_role(&rule.role),
    }
}

/// `next` query value of a login URL, when it points back into the console.
fn next_target(path: &str) -> Option<String> {
    let (_, query) = path.split_once('?')?;
    form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == NEXT_PARAM)
        .map(|(_, value)| value.into_owned())
        .filter(|next| next.starts_with('/') && !next.starts_with("//"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Transition;
    use async_trait::async_trait;
    use bridge_desktop::HistoryNavigator;
    use bridge_traits::BridgeError;
    use std::time::Duration;

    fn user(roles: &[(&str, &str)]) -> UserProfile {
        let roles: Vec<_> = roles
            .iter()
            .map(|(system, role)| serde_json::json!({ "system": system, "role": role }))
            .collect();
        serde_json::from_value(serde_json::json!({
            "id": 1,
            "name": "Kim",
            "email": "k@x.com",
            "employee_number": "E1",
            "system_roles": roles,
        }))
        .unwrap()
    }

    fn signed_in(roles: &[(&str, &str)]) -> SessionState {
        SessionState::default().apply(Transition::Authenticate(user(roles)))
    }

    fn signed_out(reason: EndReason) -> SessionState {
        SessionState::default().apply(Transition::End(reason))
    }

    fn guard_with(routes: RouteConfig) -> (RouteGuard, Arc<HistoryNavigator>, EventBus) {
        let nav = Arc::new(HistoryNavigator::new("/"));
        let bus = EventBus::new(16);
        (RouteGuard::new(routes, nav.clone(), bus.clone()), nav, bus)
    }

    fn guard() -> RouteGuard {
        guard_with(RouteConfig::default()).0
    }

    #[test]
    fn test_loading_never_redirects() {
        let guard = guard();
        let state = SessionState::default();
        assert_eq!(guard.evaluate("/systems", &state), GuardDecision::Loading);
        assert_eq!(
            guard.evaluate("/systems", &state.apply(Transition::StartRefresh)),
            GuardDecision::Loading
        );
    }

    #[test]
    fn test_unauthenticated_goes_to_login_with_next() {
        let decision = guard().evaluate("/departments?page=2", &signed_out(EndReason::LoggedOut));
        assert_eq!(
            decision,
            GuardDecision::Redirect {
                to: "/login?next=%2Fdepartments%3Fpage%3D2".to_string(),
                reason: RedirectReason::Unauthenticated,
            }
        );
    }

    #[test]
    fn test_expired_session_carries_reason() {
        let decision = guard().evaluate("/systems", &signed_out(EndReason::SessionExpired));
        assert_eq!(
            decision.redirect_target(),
            Some("/login?next=%2Fsystems&reason=session_expired")
        );
    }

    #[test]
    fn test_public_paths_match_by_segment() {
        let guard = guard_with(RouteConfig::default().with_public_path("/docs/")).0;
        let state = signed_out(EndReason::NoStoredSession);

        assert!(guard.evaluate("/login", &state).is_render());
        assert!(guard.evaluate("/login?reason=session_expired", &state).is_render());
        assert!(guard.evaluate("/docs", &state).is_render());
        assert!(guard.evaluate("/docs/api", &state).is_render());
        assert!(!guard.evaluate("/documents", &state).is_render());
        assert!(!guard.evaluate("/login-help", &state).is_render());
    }

    #[test]
    fn test_authenticated_leaves_login_page() {
        let guard = guard();
        let state = signed_in(&[]);

        assert_eq!(
            guard.evaluate("/login", &state),
            GuardDecision::Redirect {
                to: "/".to_string(),
                reason: RedirectReason::AlreadyAuthenticated,
            }
        );
        assert_eq!(
            guard.evaluate("/login?next=%2Fsystems%3Fpage%3D2", &state).redirect_target(),
            Some("/systems?page=2")
        );
        // Off-site targets fall back to the landing page
        assert_eq!(
            guard.evaluate("/login?next=%2F%2Fevil.com", &state).redirect_target(),
            Some("/")
        );
        assert!(guard.evaluate("/departments", &state).is_render());
    }

    #[test]
    fn test_role_rules() {
        let routes = RouteConfig::default()
            .with_role_rule(RoleRule::new("/systems", "admin").for_system("sso"))
            .with_role_rule(RoleRule::new("/organizations", "admin"));
        let guard = guard_with(routes).0;

        let sso_admin = signed_in(&[("sso", "admin")]);
        let hr_admin = signed_in(&[("hr", "admin")]);
        let viewer = signed_in(&[("sso", "viewer")]);

        assert!(guard.evaluate("/systems/42", &sso_admin).is_render());
        assert_eq!(
            guard.evaluate("/systems", &hr_admin),
            GuardDecision::Redirect {
                to: "/unauthorized".to_string(),
                reason: RedirectReason::Forbidden,
            }
        );
        assert!(guard.evaluate("/organizations", &hr_admin).is_render());
        assert!(guard.evaluate("/organizations", &viewer).redirect_target().is_some());
        assert!(guard.evaluate("/unauthorized", &viewer).is_render());
    }

    #[tokio::test]
    async fn test_enforce_redirects_and_emits() {
        let (guard, nav, bus) = guard_with(RouteConfig::default());
        let mut events = bus.stream();
        nav.navigate("/systems");

        guard
            .enforce("/systems", &signed_out(EndReason::NoStoredSession))
            .await;

        assert_eq!(nav.current_path(), "/login?next=%2Fsystems");
        assert_eq!(
            events.recv().await.unwrap(),
            CoreEvent::Navigation(NavigationEvent::Redirected {
                from: "/systems".to_string(),
                to: "/login?next=%2Fsystems".to_string(),
                reason: RedirectReason::Unauthenticated,
            })
        );
    }

    struct RefusingNavigator;

    #[async_trait]
    impl Navigator for RefusingNavigator {
        fn current_path(&self) -> String {
            "/systems".to_string()
        }

        async fn redirect(&self, _path: &str) -> bridge_traits::error::Result<()> {
            Err(BridgeError::NotAvailable("router unmounted".to_string()))
        }
    }

    #[tokio::test]
    async fn test_enforce_reports_navigator_failure() {
        let bus = EventBus::new(4);
        let mut events = bus.stream();
        let guard = RouteGuard::new(RouteConfig::default(), Arc::new(RefusingNavigator), bus);

        let decision = guard
            .enforce("/systems", &signed_out(EndReason::LoggedOut))
            .await;

        assert!(decision.redirect_target().is_some());
        assert!(matches!(
            events.recv().await.unwrap(),
            CoreEvent::Navigation(NavigationEvent::RedirectFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_run_follows_session_and_path_changes() {
        let (guard, nav, _bus) = guard_with(RouteConfig::default());
        let guard = Arc::new(guard);
        nav.navigate("/departments");

        let (session_tx, session_rx) = watch::channel(SessionState::default());
        let runner = {
            let guard = guard.clone();
            let path_rx = nav.subscribe();
            tokio::spawn(async move { guard.run(session_rx, path_rx).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(nav.current_path(), "/departments");

        session_tx.send_replace(signed_out(EndReason::NoStoredSession));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(nav.current_path(), "/login?next=%2Fdepartments");

        session_tx.send_replace(signed_in(&[]));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(nav.current_path(), "/departments");

        drop(session_tx);
        tokio::time::timeout(Duration::from_secs(1), runner)
            .await
            .unwrap()
            .unwrap();
    }
}
