//! Route admission: maps a session snapshot to "render", "wait" or "go elsewhere".
//!
//! - No IO
//! - No panics
//! - No caching: callers re-derive on every navigation and session change

use crate::{Role, SessionState};

/// Screens the console can show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    /// `/`: resolves to the role's home or sign-in.
    Root,
    /// `/login`
    SignIn,
    /// `/register`
    Register,
    /// `/admin/requests`: the review queue.
    AdminRequests,
    /// `/dashboard`: the company dashboard.
    Dashboard,
}

impl Route {
    pub fn path(&self) -> &'static str {
        match self {
            Route::Root => "/",
            Route::SignIn => "/login",
            Route::Register => "/register",
            Route::AdminRequests => "/admin/requests",
            Route::Dashboard => "/dashboard",
        }
    }

    /// Unknown paths resolve like the root.
    pub fn from_path(path: &str) -> Route {
        let trimmed = path.trim();
        let normalized = if trimmed.len() > 1 {
            trimmed.trim_end_matches('/')
        } else {
            trimmed
        };
        match normalized {
            "/login" => Route::SignIn,
            "/register" => Route::Register,
            "/admin/requests" => Route::AdminRequests,
            "/dashboard" => Route::Dashboard,
            _ => Route::Root,
        }
    }

    /// Roles admitted to a protected route; empty for public routes.
    pub fn required_roles(&self) -> &'static [Role] {
        match self {
            Route::AdminRequests => &[Role::Admin],
            Route::Dashboard => &[Role::Company],
            Route::Root | Route::SignIn | Route::Register => &[],
        }
    }
}

impl core::fmt::Display for Route {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.path())
    }
}

/// Outcome of a gate check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Show the requested content.
    Render,
    /// Identity is still resolving: show a neutral spinner, decide later.
    Wait,
    /// Replace the current location.
    Redirect(Route),
}

pub struct AuthorizationGate;

impl AuthorizationGate {
    /// Decide whether protected content may render.
    ///
    /// Unauthorized roles are sent to sign-in rather than a "forbidden" page,
    /// so the response does not reveal that the route exists for someone else.
    pub fn decide(session: &SessionState, required_roles: &[Role]) -> GateDecision {
        if session.is_loading() {
            return GateDecision::Wait;
        }

        let Some(identity) = session.identity() else {
            return GateDecision::Redirect(Route::SignIn);
        };

        if !required_roles.is_empty() && !required_roles.contains(&identity.role) {
            return GateDecision::Redirect(Route::SignIn);
        }

        GateDecision::Render
    }

    /// Landing screen of each role.
    pub fn home_for(role: Role) -> Route {
        match role {
            Role::Admin => Route::AdminRequests,
            Role::Company => Route::Dashboard,
        }
    }

    /// Where `/` leads for this session.
    pub fn resolve_root(session: &SessionState) -> GateDecision {
        if session.is_loading() {
            return GateDecision::Wait;
        }
        match session.role() {
            Some(role) => GateDecision::Redirect(Self::home_for(role)),
            None => GateDecision::Redirect(Route::SignIn),
        }
    }

    /// Full navigation decision for a route.
    ///
    /// Public routes keep rendering while a sign-in is in flight (the form
    /// shows its own progress) and bounce an authenticated user home.
    pub fn navigate(session: &SessionState, route: Route) -> GateDecision {
        let decision = match route {
            Route::Root => Self::resolve_root(session),
            Route::SignIn | Route::Register => match session.role() {
                Some(role) => GateDecision::Redirect(Self::home_for(role)),
                None => GateDecision::Render,
            },
            Route::AdminRequests | Route::Dashboard => {
                Self::decide(session, route.required_roles())
            }
        };
        tracing::debug!(route = %route, ?decision, "gate decision");
        decision
    }
}
