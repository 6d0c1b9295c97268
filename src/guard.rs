//! Navigation guard for protected views.
//!
//! Each mounted view owns one guard. The guard stays in `Checking` while the
//! session is loading, then either settles in `Ready` or moves to
//! `Redirecting`, which is terminal for that mount: the navigation is handed
//! out exactly once no matter how often the guard is re-evaluated.

use crate::models::Role;
use crate::session::Session;

/// Views the client can show
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Auth,
    AdminDashboard,
    MemberArea,
}

impl Route {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auth => "auth",
            Self::AdminDashboard => "dashboard",
            Self::MemberArea => "user",
        }
    }

    /// Landing view for an authenticated role.
    pub fn home_for(role: Role) -> Self {
        match role {
            Role::Admin => Self::AdminDashboard,
            Role::User => Self::MemberArea,
        }
    }
}

/// Who may stay on a view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Login/register: authenticated users are sent to their home view
    Guest,
    AdminOnly,
    MemberOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    Checking,
    Redirecting(Route),
    Ready,
}

impl GuardState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Checking => "checking",
            Self::Redirecting(_) => "redirecting",
            Self::Ready => "ready",
        }
    }
}

pub struct NavigationGuard {
    access: Access,
    state: GuardState,
    navigated: bool,
}

impl NavigationGuard {
    pub fn new(access: Access) -> Self {
        Self {
            access,
            state: GuardState::Checking,
            navigated: false,
        }
    }

    pub fn state(&self) -> GuardState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == GuardState::Ready
    }

    /// Re-evaluate against the current session. Returns the route to push,
    /// at most once per mount.
    pub fn check(&mut self, session: &Session) -> Option<Route> {
        if let GuardState::Redirecting(route) = self.state {
            return self.take(route);
        }
        if session.is_loading() {
            self.state = GuardState::Checking;
            return None;
        }

        let target = match (self.access, session.is_authenticated(), session.role()) {
            (Access::Guest, true, Some(role)) => Some(Route::home_for(role)),
            (Access::Guest, _, _) => None,
            (_, false, _) => Some(Route::Auth),
            // Token without a profile yet: hold until it arrives.
            (_, true, None) => {
                self.state = GuardState::Checking;
                return None;
            }
            (Access::AdminOnly, true, Some(Role::User)) => Some(Route::MemberArea),
            (Access::MemberOnly, true, Some(Role::Admin)) => Some(Route::AdminDashboard),
            (_, true, Some(_)) => None,
        };

        match target {
            Some(route) => {
                self.state = GuardState::Redirecting(route);
                self.take(route)
            }
            None => {
                self.state = GuardState::Ready;
                None
            }
        }
    }

    fn take(&mut self, route: Route) -> Option<Route> {
        if self.navigated {
            None
        } else {
            self.navigated = true;
            Some(route)
        }
    }
}
