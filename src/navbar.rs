//! Header line shown above every authenticated view.

use crate::guard::Route;
use crate::session::Session;

/// One navigation component; optional parts are switched on by flags.
#[derive(Debug, Clone, Copy)]
pub struct Navbar {
    pub notifications: bool,
    pub profile_menu: bool,
}

impl Navbar {
    pub fn new(notifications: bool, profile_menu: bool) -> Self {
        Self {
            notifications,
            profile_menu,
        }
    }

    pub fn render(&self, session: &Session, route: Route, unread: usize) -> String {
        let mut parts = vec![format!("libra [{}]", route.as_str())];

        if let Some(user) = session.user() {
            parts.push(format!("{} ({})", user.name, user.role.as_str()));
        }
        if self.notifications && session.is_authenticated() {
            parts.push(if unread > 0 {
                format!("notifications: {} new", unread)
            } else {
                "notifications: none".to_string()
            });
        }

        let mut actions = Vec::new();
        if self.profile_menu && session.user().is_some() {
            actions.push("/profile");
        }
        if session.is_authenticated() {
            actions.push("/logout");
        }
        if !actions.is_empty() {
            parts.push(actions.join(" "));
        }

        parts.join(" | ")
    }
}
