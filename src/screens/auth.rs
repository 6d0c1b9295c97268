//! Login / register screen and the logout action.

use super::{ActionError, ActionResult};
use crate::api::LibraryApi;
use crate::confirm::{Confirmation, Confirmer};
use crate::forms::{AuthForm, AuthMode, AuthSubmission, BusyFlag, Draft};
use crate::guard::{Access, GuardState, NavigationGuard, Route};
use crate::notify::Notifier;
use crate::session::{Session, SessionContext};
use crate::transcript::{record, SharedTranscript};

/// Result of a successful submit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    /// Logged in; go to the role's home view
    LoggedIn(Route),
    /// Account created; the form is back in login mode
    Registered,
}

pub struct AuthScreen {
    pub form: AuthForm,
    busy: BusyFlag,
    guard: NavigationGuard,
}

impl Default for AuthScreen {
    fn default() -> Self {
        Self {
            form: AuthForm::default(),
            busy: BusyFlag::default(),
            guard: NavigationGuard::new(Access::Guest),
        }
    }
}

impl AuthScreen {
    /// Already-authenticated visitors are sent home, once.
    pub fn check(&mut self, session: &Session) -> Option<Route> {
        self.guard.check(session)
    }

    pub fn guard_state(&self) -> GuardState {
        self.guard.state()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.is_busy()
    }

    pub fn set_mode(&mut self, mode: AuthMode) {
        self.form.switch_mode(mode);
    }

    pub fn set_field(&mut self, field: &str, value: &str) -> Result<(), ActionError> {
        self.form.set_field(field, value)?;
        Ok(())
    }

    pub fn submit(
        &mut self,
        session: &mut SessionContext,
        api: &dyn LibraryApi,
        notifier: &dyn Notifier,
        transcript: Option<&SharedTranscript>,
    ) -> Result<AuthOutcome, ActionError> {
        let _busy = self.busy.begin().ok_or(ActionError::Busy)?;

        let submission = match self.form.validate() {
            Ok(s) => s,
            Err(err) => {
                record(transcript, |t| t.validation_error(&err.field, &err.message));
                notifier.error(&err.message);
                return Err(err.into());
            }
        };

        match submission {
            AuthSubmission::Login(credentials) => {
                let result = session.login(api, &credentials.email, &credentials.password);
                record(transcript, |t| t.login(&credentials.email, result.is_ok()));
                match result {
                    Ok(user) => {
                        let route = Route::home_for(user.role);
                        notifier.success("Logged in successfully!");
                        self.form.password.clear();
                        Ok(AuthOutcome::LoggedIn(route))
                    }
                    Err(err) => {
                        notifier.error(&err.user_message("Authentication failed"));
                        Err(err.into())
                    }
                }
            }
            AuthSubmission::Register(registration) => {
                match session.register(api, &registration) {
                    Ok(()) => {
                        notifier.success("Registered successfully! Please login.");
                        self.form.switch_mode(AuthMode::Login);
                        Ok(AuthOutcome::Registered)
                    }
                    Err(err) => {
                        notifier.error(&err.user_message("Authentication failed"));
                        Err(err.into())
                    }
                }
            }
        }
    }
}

/// Log out, asking first when a confirmer is given. Local state is cleared
/// even if the server call fails.
pub fn logout(
    session: &mut SessionContext,
    api: &dyn LibraryApi,
    confirmer: Option<&dyn Confirmer>,
    transcript: Option<&SharedTranscript>,
) -> ActionResult {
    if let Some(confirmer) = confirmer {
        if !confirmer.confirm(&Confirmation::logout()) {
            return Err(ActionError::Declined);
        }
    }
    let remote = session.logout(api);
    record(transcript, |t| t.logout(remote.is_ok()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::confirm::ScriptedConfirmer;
    use crate::models::Role;
    use crate::notify::CollectingNotifier;
    use crate::session::MemoryTokenStore;
    use crate::testing::{FakeApi, ADMIN_EMAIL, MEMBER_EMAIL, PASSWORD};

    fn fresh(api: &FakeApi) -> SessionContext {
        let mut ctx = SessionContext::new(Box::new(MemoryTokenStore::default()));
        ctx.initialize(api);
        ctx
    }

    fn fill_login(screen: &mut AuthScreen, email: &str, password: &str) {
        screen.set_field("email", email).unwrap();
        screen.set_field("password", password).unwrap();
    }

    #[test]
    fn test_login_routes_by_role() {
        let api = FakeApi::new();
        let notifier = CollectingNotifier::default();

        let mut session = fresh(&api);
        let mut screen = AuthScreen::default();
        fill_login(&mut screen, ADMIN_EMAIL, PASSWORD);
        let outcome = screen.submit(&mut session, &api, &notifier, None).unwrap();
        assert_eq!(outcome, AuthOutcome::LoggedIn(Route::AdminDashboard));
        assert_eq!(notifier.successes(), vec!["Logged in successfully!"]);
        assert!(!screen.is_busy());

        let mut session = fresh(&api);
        let mut screen = AuthScreen::default();
        fill_login(&mut screen, MEMBER_EMAIL, PASSWORD);
        let outcome = screen.submit(&mut session, &api, &notifier, None).unwrap();
        assert_eq!(outcome, AuthOutcome::LoggedIn(Route::MemberArea));
    }

    #[test]
    fn test_login_failure_shows_server_message_and_clears_busy() {
        let api = FakeApi::new();
        let notifier = CollectingNotifier::default();
        let mut session = fresh(&api);
        let mut screen = AuthScreen::default();
        fill_login(&mut screen, MEMBER_EMAIL, "wrong-password");
        assert!(screen.submit(&mut session, &api, &notifier, None).is_err());
        assert_eq!(notifier.errors(), vec!["Invalid credentials"]);
        assert!(!screen.is_busy());
        assert!(!session.session().is_authenticated());
    }

    #[test]
    fn test_register_mismatch_blocked_before_network() {
        let api = FakeApi::new();
        let notifier = CollectingNotifier::default();
        let mut session = fresh(&api);
        let mut screen = AuthScreen::default();
        screen.set_mode(AuthMode::Register);
        screen.set_field("name", "New Reader").unwrap();
        screen.set_field("email", "new@library.test").unwrap();
        screen.set_field("password", "password123").unwrap();
        screen.set_field("password_confirmation", "password321").unwrap();

        let err = screen.submit(&mut session, &api, &notifier, None).unwrap_err();
        assert!(matches!(err, ActionError::Validation(_)));
        assert_eq!(notifier.errors(), vec!["Passwords don't match!"]);
        assert_eq!(api.count("POST /register"), 0);
    }

    #[test]
    fn test_register_switches_to_login_without_session() {
        let api = FakeApi::new();
        let notifier = CollectingNotifier::default();
        let mut session = fresh(&api);
        let mut screen = AuthScreen::default();
        screen.set_mode(AuthMode::Register);
        screen.set_field("name", "New Reader").unwrap();
        screen.set_field("email", "new@library.test").unwrap();
        screen.set_field("password", "password123").unwrap();
        screen.set_field("password_confirmation", "password123").unwrap();
        screen.set_field("role", "user").unwrap();

        let outcome = screen.submit(&mut session, &api, &notifier, None).unwrap();
        assert_eq!(outcome, AuthOutcome::Registered);
        assert_eq!(screen.form.mode, AuthMode::Login);
        assert_eq!(screen.form.email, "new@library.test");
        assert!(!session.session().is_authenticated());

        screen.set_field("password", "password123").unwrap();
        let outcome = screen.submit(&mut session, &api, &notifier, None).unwrap();
        assert_eq!(outcome, AuthOutcome::LoggedIn(Route::home_for(Role::User)));
    }

    #[test]
    fn test_guard_redirects_logged_in_visitor_once() {
        let api = FakeApi::new();
        let mut session = fresh(&api);
        session.login(&api, ADMIN_EMAIL, PASSWORD).unwrap();
        let mut screen = AuthScreen::default();
        assert_eq!(screen.check(session.session()), Some(Route::AdminDashboard));
        assert_eq!(screen.check(session.session()), None);
    }

    #[test]
    fn test_logout_declined_keeps_session() {
        let api = FakeApi::new();
        let mut session = fresh(&api);
        session.login(&api, MEMBER_EMAIL, PASSWORD).unwrap();
        let confirmer = ScriptedConfirmer::answering(&[false]);
        let err = logout(&mut session, &api, Some(&confirmer), None).unwrap_err();
        assert!(matches!(err, ActionError::Declined));
        assert!(session.session().is_authenticated());
        assert_eq!(api.count("POST /logout"), 0);
    }

    #[test]
    fn test_logout_clears_on_server_failure() {
        let api = FakeApi::new();
        let mut session = fresh(&api);
        session.login(&api, MEMBER_EMAIL, PASSWORD).unwrap();
        api.fail_next("POST /logout", 500);
        logout(&mut session, &api, None, None).unwrap();
        assert!(session.session().token().is_none());
        assert!(session.session().user().is_none());
    }
}
