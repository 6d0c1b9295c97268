use crate::api::LibraryApi;
use crate::confirm::Confirmer;
use crate::forms::{AuthMode, Draft};
use crate::guard::{GuardState, Route};
use crate::navbar::Navbar;
use crate::notify::{Notifier, TerminalNotifier};
use crate::render;
use crate::screens::admin::{render_form, AdminScreen, AdminTab, PageNav};
use crate::screens::auth::{self, AuthOutcome, AuthScreen};
use crate::screens::member::{BookFilter, MemberScreen};
use crate::screens::{ActionError, ActionResult, Deps};
use crate::session::SessionContext;
use crate::transcript::{record, SharedTranscript};
use anyhow::Result;
use chrono::{Local, NaiveDate};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::cell::RefCell;
use std::sync::Arc;

/// The screen currently mounted.
pub enum View {
    Auth(AuthScreen),
    Admin(AdminScreen),
    Member(MemberScreen),
}

impl View {
    fn mount(route: Route, per_page: u32) -> Self {
        match route {
            Route::Auth => View::Auth(AuthScreen::default()),
            Route::AdminDashboard => View::Admin(AdminScreen::new(per_page)),
            Route::MemberArea => View::Member(MemberScreen::default()),
        }
    }

    pub fn route(&self) -> Route {
        match self {
            View::Auth(_) => Route::Auth,
            View::Admin(_) => Route::AdminDashboard,
            View::Member(_) => Route::MemberArea,
        }
    }

    pub fn guard_state(&self) -> GuardState {
        match self {
            View::Auth(screen) => screen.guard_state(),
            View::Admin(screen) => screen.guard_state(),
            View::Member(screen) => screen.guard_state(),
        }
    }

    fn unmount(&self) {
        match self {
            View::Auth(_) => {}
            View::Admin(screen) => screen.mounted().unmount(),
            View::Member(screen) => screen.mounted().unmount(),
        }
    }
}

pub struct Context {
    pub session_id: String,
    pub base_url: String,
    pub per_page: u32,
    pub api: Arc<dyn LibraryApi>,
    pub session: RefCell<SessionContext>,
    pub transcript: Option<SharedTranscript>,
    pub notifier: TerminalNotifier,
    pub confirmer: Box<dyn Confirmer>,
    pub navbar: Navbar,
    pub view: RefCell<View>,
}

impl Context {
    fn deps<'a>(&'a self, session: &'a SessionContext) -> Deps<'a> {
        Deps {
            api: self.api.as_ref(),
            session: session.session(),
            notifier: &self.notifier,
            confirmer: self.confirmer.as_ref(),
            transcript: self.transcript.as_ref(),
        }
    }

    pub fn route(&self) -> Route {
        self.view.borrow().route()
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Mount the view for the current session: the role's home when signed in,
/// the login form otherwise.
pub fn start(ctx: &Context) {
    let route = match ctx.session.borrow().session().role() {
        Some(role) => Route::home_for(role),
        None => Route::Auth,
    };
    navigate(ctx, route);
}

/// Swap views, following guard redirects, then run the new view's initial load.
pub fn navigate(ctx: &Context, mut route: Route) {
    // Each guard redirects at most once, so three hops always settle.
    for _ in 0..3 {
        let from = ctx.route();
        let mut view = View::mount(route, ctx.per_page);
        let redirect = {
            let session = ctx.session.borrow();
            match &mut view {
                View::Auth(screen) => screen.check(session.session()),
                View::Admin(screen) => screen.check(session.session()),
                View::Member(screen) => screen.check(session.session()),
            }
        };

        let guard = view.guard_state();
        let old = std::mem::replace(&mut *ctx.view.borrow_mut(), view);
        old.unmount();
        if from != route {
            record(ctx.transcript.as_ref(), |t| {
                t.navigation(from.as_str(), route.as_str(), guard.as_str())
            });
        }

        match redirect {
            Some(next) => route = next,
            None => {
                on_mount(ctx);
                return;
            }
        }
    }
}

fn on_mount(ctx: &Context) {
    act(ctx, |view, deps| match view {
        View::Auth(_) => Ok(()),
        View::Admin(screen) => screen.activate(deps, AdminTab::Dashboard),
        View::Member(screen) => screen.load(deps),
    });
}

/// Run a handler against the mounted view and react to how it ended.
fn act<F>(ctx: &Context, f: F)
where
    F: FnOnce(&mut View, &Deps) -> ActionResult,
{
    let result = {
        let session = ctx.session.borrow();
        let deps = ctx.deps(&session);
        let mut view = ctx.view.borrow_mut();
        f(&mut view, &deps)
    };
    settle(ctx, result);
}

fn settle(ctx: &Context, result: ActionResult) {
    let err = match result {
        Ok(()) => return,
        Err(err) => err,
    };
    if err.is_unauthorized() && ctx.session.borrow().session().is_authenticated() {
        expire(ctx, &err.to_string());
        return;
    }
    match err {
        ActionError::Declined => println!("Cancelled"),
        ActionError::Busy | ActionError::Rejected(_) => println!("{}", err),
        // Already shown as a notice
        ActionError::Validation(_) | ActionError::Api(_) => {}
    }
}

/// Tell the user when the saved token on disk no longer matches the session.
fn report_store_error(ctx: &Context) {
    let err = ctx.session.borrow_mut().take_store_error();
    if let Some(err) = err {
        ctx.notifier
            .error(&format!("Could not update the saved session: {:#}", err));
    }
}

/// Drop the session after a 401 and let the guards send the user to login.
fn expire(ctx: &Context, reason: &str) {
    ctx.session.borrow_mut().expire();
    report_store_error(ctx);
    record(ctx.transcript.as_ref(), |t| t.session_expired(reason));
    ctx.notifier
        .error("Your session has expired. Please log in again.");

    let redirect = {
        let session = ctx.session.borrow();
        let mut view = ctx.view.borrow_mut();
        match &mut *view {
            View::Auth(screen) => screen.check(session.session()),
            View::Admin(screen) => screen.check(session.session()),
            View::Member(screen) => screen.check(session.session()),
        }
    };
    navigate(ctx, redirect.unwrap_or(Route::Auth));
}

pub fn render_view(ctx: &Context) -> String {
    let session = ctx.session.borrow();
    let view = ctx.view.borrow();
    let mut out = ctx
        .navbar
        .render(session.session(), view.route(), ctx.notifier.unread());
    out.push_str("\n\n");
    match &*view {
        View::Auth(screen) => {
            let title = match screen.form.mode {
                AuthMode::Login => "Login",
                AuthMode::Register => "Register",
            };
            out.push_str(&render_form(title, &screen.form.fields(), screen.is_busy()));
            out.push_str("    /mode login|register, /submit\n");
        }
        View::Admin(screen) => out.push_str(&screen.render(today())),
        View::Member(screen) => out.push_str(&screen.render(today())),
    }
    out
}

pub fn run_once(ctx: &Context, commands: &[String]) -> Result<()> {
    for line in commands {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if !line.starts_with('/') {
            eprintln!("Commands start with '/': {}", line);
            continue;
        }
        if handle_command(ctx, line) {
            break;
        }
    }
    Ok(())
}

pub fn run_repl(ctx: Context) -> Result<()> {
    let mut rl = DefaultEditor::new()?;

    println!("libra - type /help for commands, /exit to quit");
    println!("{}", render_view(&ctx));

    loop {
        match rl.readline(&format!("{}> ", ctx.route().as_str())) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                rl.add_history_entry(line)?;

                if !line.starts_with('/') {
                    println!("Commands start with '/'. Type /help for the list.");
                    continue;
                }
                if handle_command(&ctx, line) {
                    break;
                }
            }
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("Input error: {}", e);
                break;
            }
        }
    }

    Ok(())
}

/// Dispatch one slash command. Returns true when the REPL should exit.
pub fn handle_command(ctx: &Context, line: &str) -> bool {
    let words = match shell_words::split(line) {
        Ok(words) => words,
        Err(e) => {
            println!("Could not parse command: {}", e);
            return false;
        }
    };
    let Some((cmd, rest)) = words.split_first() else {
        return false;
    };
    let args: Vec<&str> = rest.iter().map(String::as_str).collect();

    match cmd.as_str() {
        "/exit" | "/quit" => return true,
        "/help" => print_help(ctx.route()),
        "/show" => println!("{}", render_view(ctx)),
        "/session" => {
            println!("Session: {}", ctx.session_id);
            println!("API: {}", ctx.base_url);
            if let Some(t) = &ctx.transcript {
                if let Ok(t) = t.lock() {
                    println!("Transcript: {:?}", t.path);
                }
            }
        }
        "/whoami" | "/profile" => {
            let session = ctx.session.borrow();
            match session.session().user() {
                Some(user) => print!("{}", render::profile(user, &ctx.base_url)),
                None => println!("Not logged in"),
            }
        }
        "/notifications" => {
            let notices = ctx.notifier.take_recent(10);
            if notices.is_empty() {
                println!("No notifications");
            }
            for notice in notices {
                println!("  [{}] {}", notice.level.as_str(), notice.message);
            }
        }
        "/logout" => logout(ctx),
        _ => {
            let route = ctx.route();
            let handled = match route {
                Route::Auth => auth_command(ctx, cmd, &args),
                Route::AdminDashboard => admin_command(ctx, cmd, &args),
                Route::MemberArea => member_command(ctx, cmd, &args),
            };
            if !handled {
                println!("Unknown command: {} (type /help)", cmd);
            }
        }
    }
    false
}

fn logout(ctx: &Context) {
    if !ctx.session.borrow().session().is_authenticated() {
        println!("Not logged in");
        return;
    }
    // Only the member area asks first.
    let confirmer = match ctx.route() {
        Route::MemberArea => Some(ctx.confirmer.as_ref()),
        _ => None,
    };
    let result = {
        let mut session = ctx.session.borrow_mut();
        auth::logout(
            &mut session,
            ctx.api.as_ref(),
            confirmer,
            ctx.transcript.as_ref(),
        )
    };
    report_store_error(ctx);
    match result {
        Ok(()) => {
            println!("Logged out");
            navigate(ctx, Route::Auth);
        }
        Err(err) => settle(ctx, Err(err)),
    }
}

// ----------------------------------------------------------------------
// Auth view
// ----------------------------------------------------------------------

fn auth_command(ctx: &Context, cmd: &str, args: &[&str]) -> bool {
    match cmd {
        "/mode" => match args.first().copied() {
            Some("login") => {
                with_auth(ctx, |s| s.set_mode(AuthMode::Login));
            }
            Some("register") => {
                with_auth(ctx, |s| s.set_mode(AuthMode::Register));
            }
            None => {
                let mode = with_auth(ctx, |s| s.form.mode.as_str());
                println!("Mode: {}", mode.unwrap_or("login"));
            }
            _ => println!("Usage: /mode login|register"),
        },
        "/set" => match args {
            [field, value @ ..] if !value.is_empty() => {
                let value = value.join(" ");
                let result = with_auth(ctx, |s| s.set_field(field, &value));
                report_field(result);
            }
            _ => println!("Usage: /set <field> <value>"),
        },
        "/login" => {
            if let [email, password] = args {
                with_auth(ctx, |s| {
                    s.set_mode(AuthMode::Login);
                    s.form.email = email.trim().to_string();
                    s.form.password = password.to_string();
                });
            } else if !args.is_empty() {
                println!("Usage: /login [<email> <password>]");
                return true;
            }
            submit_auth(ctx);
        }
        "/register" => {
            if args.len() >= 4 {
                let result = with_auth(ctx, |s| {
                    s.set_mode(AuthMode::Register);
                    for (field, value) in ["name", "email", "password", "password_confirmation", "role"]
                        .iter()
                        .zip(args)
                    {
                        s.set_field(field, value)?;
                    }
                    Ok::<(), ActionError>(())
                });
                if report_field(result) {
                    submit_auth(ctx);
                }
            } else if args.is_empty() {
                with_auth(ctx, |s| s.set_mode(AuthMode::Register));
                println!("{}", render_view(ctx));
            } else {
                println!("Usage: /register <name> <email> <password> <confirm> [user|admin]");
            }
        }
        "/submit" => submit_auth(ctx),
        _ => return false,
    }
    true
}

fn with_auth<R>(ctx: &Context, f: impl FnOnce(&mut AuthScreen) -> R) -> Option<R> {
    match &mut *ctx.view.borrow_mut() {
        View::Auth(screen) => Some(f(screen)),
        _ => None,
    }
}

/// Print a field error; true when the value was taken.
fn report_field<E: std::fmt::Display>(result: Option<Result<(), E>>) -> bool {
    match result {
        Some(Ok(())) => true,
        Some(Err(e)) => {
            println!("{}", e);
            false
        }
        None => false,
    }
}

fn submit_auth(ctx: &Context) {
    let outcome = {
        let mut session = ctx.session.borrow_mut();
        with_auth(ctx, |screen| {
            screen.submit(
                &mut session,
                ctx.api.as_ref(),
                &ctx.notifier,
                ctx.transcript.as_ref(),
            )
        })
    };
    report_store_error(ctx);
    match outcome {
        Some(Ok(AuthOutcome::LoggedIn(route))) => {
            navigate(ctx, route);
            println!("{}", render_view(ctx));
        }
        Some(Ok(AuthOutcome::Registered)) => println!("{}", render_view(ctx)),
        Some(Err(err)) => settle(ctx, Err(err)),
        None => {}
    }
}

// ----------------------------------------------------------------------
// Admin view
// ----------------------------------------------------------------------

fn admin_command(ctx: &Context, cmd: &str, args: &[&str]) -> bool {
    let today = today();

    match (cmd, args) {
        ("/tab", [name]) => match AdminTab::parse(name) {
            Some(tab) => on_admin(ctx, &|s, d| s.activate(d, tab)),
            None => println!("Unknown tab: {} (dashboard, books, users, transactions)", name),
        },
        ("/search", terms) => {
            let term = terms.join(" ");
            on_admin(ctx, &|s, d| s.search(d, &term));
        }
        ("/page", [arg]) => {
            let nav = match *arg {
                "next" => Some(PageNav::Next),
                "prev" => Some(PageNav::Prev),
                n => n.parse().ok().map(PageNav::To),
            };
            match nav {
                Some(nav) => on_admin(ctx, &|s, d| s.page(d, nav)),
                None => println!("Usage: /page next|prev|<n>"),
            }
        }
        ("/refresh", []) => on_admin(ctx, &|s, d| {
            let kind = s.tab().list();
            s.load(d, kind)
        }),
        ("/book", ["add"]) => on_admin(ctx, &|s, _| {
            s.open_add_book();
            Ok(())
        }),
        ("/book", ["edit", id]) => match parse_id(id) {
            Some(id) => on_admin(ctx, &|s, _| s.open_edit_book(id)),
            None => println!("Invalid id: {}", id),
        },
        ("/book", ["rm", id]) => match parse_id(id) {
            Some(id) => on_admin(ctx, &|s, d| s.delete_book(d, id)),
            None => println!("Invalid id: {}", id),
        },
        ("/user", ["add"]) => on_admin(ctx, &|s, _| {
            s.open_add_user();
            Ok(())
        }),
        ("/user", ["edit", id]) => match parse_id(id) {
            Some(id) => on_admin(ctx, &|s, _| s.open_edit_user(id)),
            None => println!("Invalid id: {}", id),
        },
        ("/user", ["rm", id]) => match parse_id(id) {
            Some(id) => on_admin(ctx, &|s, d| s.delete_user(d, id)),
            None => println!("Invalid id: {}", id),
        },
        ("/tx", ["add"]) => on_admin(ctx, &|s, _| {
            s.open_add_transaction();
            Ok(())
        }),
        ("/tx", ["return", id]) => match parse_id(id) {
            Some(id) => on_admin(ctx, &|s, d| s.mark_returned(d, id)),
            None => println!("Invalid id: {}", id),
        },
        ("/set", [field, value @ ..]) if !value.is_empty() => {
            let value = value.join(" ");
            let result = match &mut *ctx.view.borrow_mut() {
                View::Admin(screen) => screen.set_field(field, &value),
                _ => Ok(()),
            };
            if let Err(e) = result {
                println!("{}", e);
            }
        }
        ("/save" | "/submit", []) => on_admin(ctx, &|s, d| s.submit(d, today)),
        ("/cancel", []) => on_admin(ctx, &|s, _| {
            s.cancel();
            Ok(())
        }),
        ("/book" | "/user" | "/tx" | "/tab" | "/page" | "/set", _) => print_help(Route::AdminDashboard),
        _ => return false,
    }
    true
}

type AdminAction<'f> = &'f dyn Fn(&mut AdminScreen, &Deps) -> ActionResult;
type MemberAction<'f> = &'f dyn Fn(&mut MemberScreen, &Deps) -> ActionResult;

/// Run against the admin view, then redraw.
fn on_admin(ctx: &Context, f: AdminAction) {
    act(ctx, |view, deps| match view {
        View::Admin(screen) => f(screen, deps),
        _ => Ok(()),
    });
    println!("{}", render_view(ctx));
}

fn on_member(ctx: &Context, f: MemberAction) {
    act(ctx, |view, deps| match view {
        View::Member(screen) => f(screen, deps),
        _ => Ok(()),
    });
    println!("{}", render_view(ctx));
}

fn parse_id(s: &str) -> Option<i64> {
    s.trim_start_matches('#').parse().ok()
}

// ----------------------------------------------------------------------
// Member view
// ----------------------------------------------------------------------

fn member_command(ctx: &Context, cmd: &str, args: &[&str]) -> bool {
    let today = today();

    match (cmd, args) {
        ("/filter", [name]) => match BookFilter::parse(name) {
            Some(filter) => on_member(ctx, &|s, _| {
                s.set_filter(filter);
                Ok(())
            }),
            None => println!("Unknown filter: {} (all, available, borrowed)", name),
        },
        ("/refresh", []) => on_member(ctx, &|s, d| s.refresh(d)),
        ("/select", [id]) => match parse_id(id) {
            Some(id) => on_member(ctx, &|s, _| s.select(id)),
            None => println!("Invalid id: {}", id),
        },
        ("/due", [date]) => on_member(ctx, &|s, _| s.set_due_date(date, today).map(|_| ())),
        ("/borrow", []) => on_member(ctx, &|s, d| s.borrow(d, today)),
        ("/borrow", [id, due @ ..]) if due.len() <= 1 => match parse_id(id) {
            Some(id) => on_member(ctx, &|s, d| {
                s.select(id)?;
                if let Some(date) = due.first() {
                    s.set_due_date(date, today)?;
                }
                s.borrow(d, today)
            }),
            None => println!("Invalid id: {}", id),
        },
        ("/cancel", []) => on_member(ctx, &|s, _| {
            s.clear_selection();
            Ok(())
        }),
        ("/return", [id]) => match parse_id(id) {
            Some(id) => on_member(ctx, &|s, d| s.return_book(d, id)),
            None => println!("Invalid id: {}", id),
        },
        ("/filter" | "/select" | "/due" | "/borrow" | "/return", _) => print_help(Route::MemberArea),
        _ => return false,
    }
    true
}

fn print_help(route: Route) {
    println!("Commands:");
    println!("  /exit                      - quit");
    println!("  /help                      - show commands");
    println!("  /show                      - redraw the current view");
    println!("  /session                   - show session info");
    println!("  /whoami, /profile          - show the signed-in user");
    println!("  /notifications             - recent notices");
    println!("  /logout                    - sign out");
    match route {
        Route::Auth => {
            println!("Login / register:");
            println!("  /login [<email> <password>]");
            println!("  /register <name> <email> <password> <confirm> [user|admin]");
            println!("  /mode login|register       - switch form");
            println!("  /set <field> <value>       - fill a form field");
            println!("  /submit                    - send the form");
        }
        Route::AdminDashboard => {
            println!("Admin:");
            println!("  /tab dashboard|books|users|transactions");
            println!("  /search [term]             - filter the current list");
            println!("  /page next|prev|<n>        - paginate the current list");
            println!("  /refresh                   - reload the current tab");
            println!("  /book add | edit <id> | rm <id>");
            println!("  /user add | edit <id> | rm <id>");
            println!("  /tx add | return <id>");
            println!("  /set <field> <value>       - fill the open dialog");
            println!("  /save, /cancel             - submit or discard the dialog");
        }
        Route::MemberArea => {
            println!("Member:");
            println!("  /filter all|available|borrowed");
            println!("  /select <book id>          - choose a book to borrow");
            println!("  /due <YYYY-MM-DD|today|+N> - choose the return date");
            println!("  /borrow [<book id> [date]] - borrow the chosen book");
            println!("  /cancel                    - clear the selection");
            println!("  /return <transaction id>   - return a borrowed book");
            println!("  /refresh                   - reload both lists");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::confirm::ScriptedConfirmer;
    use crate::session::MemoryTokenStore;
    use crate::testing::{BrokenTokenStore, FakeApi, ADMIN_EMAIL, MEMBER_EMAIL, PASSWORD};

    fn context(api: Arc<FakeApi>, token: Option<String>, answers: &[bool]) -> Context {
        let store = match token {
            Some(t) => MemoryTokenStore::with_token(&t),
            None => MemoryTokenStore::default(),
        };
        let mut session = SessionContext::new(Box::new(store));
        session.initialize(api.as_ref());
        Context {
            session_id: "test".to_string(),
            base_url: "http://localhost:8000/api".to_string(),
            per_page: 10,
            api,
            session: RefCell::new(session),
            transcript: None,
            notifier: TerminalNotifier::quiet(),
            confirmer: Box::new(ScriptedConfirmer::answering(answers)),
            navbar: Navbar::new(true, true),
            view: RefCell::new(View::Auth(AuthScreen::default())),
        }
    }

    #[test]
    fn test_start_anonymous_shows_login() {
        let api = Arc::new(FakeApi::new());
        let ctx = context(api, None, &[]);
        start(&ctx);
        assert_eq!(ctx.route(), Route::Auth);
        assert!(render_view(&ctx).contains("Login"));
    }

    #[test]
    fn test_navigation_event_records_guard_state() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("session.jsonl");
        let api = Arc::new(FakeApi::new());
        let token = api.issue_token(MEMBER_EMAIL);
        let mut ctx = context(api, Some(token), &[]);
        ctx.transcript = Some(
            crate::transcript::Transcript::new(&path, "test", &ctx.base_url)
                .unwrap()
                .shared(),
        );
        start(&ctx);
        assert_eq!(ctx.route(), Route::MemberArea);
        assert_eq!(ctx.view.borrow().guard_state(), GuardState::Ready);

        let content = std::fs::read_to_string(&path).unwrap();
        let nav: serde_json::Value = content
            .lines()
            .filter_map(|l| serde_json::from_str::<serde_json::Value>(l).ok())
            .find(|v| v["type"] == "navigation")
            .unwrap();
        assert_eq!(nav["to"], "user");
        assert_eq!(nav["guard"], "ready");
    }

    #[test]
    fn test_restored_admin_lands_on_dashboard() {
        let api = Arc::new(FakeApi::new());
        let token = api.issue_token(ADMIN_EMAIL);
        let ctx = context(api.clone(), Some(token), &[]);
        start(&ctx);
        assert_eq!(ctx.route(), Route::AdminDashboard);
        assert_eq!(api.count("GET /admin/dashboard-stats"), 1);
    }

    #[test]
    fn test_login_command_routes_member() {
        let api = Arc::new(FakeApi::new());
        api.add_book("Dune", 2, 2);
        let ctx = context(api.clone(), None, &[]);
        start(&ctx);
        let line = format!("/login {} {}", MEMBER_EMAIL, PASSWORD);
        assert!(!handle_command(&ctx, &line));
        assert_eq!(ctx.route(), Route::MemberArea);
        assert!(render_view(&ctx).contains("Dune"));
    }

    #[test]
    fn test_member_logout_declined_stays() {
        let api = Arc::new(FakeApi::new());
        let token = api.issue_token(MEMBER_EMAIL);
        let ctx = context(api, Some(token), &[false, true]);
        start(&ctx);
        handle_command(&ctx, "/logout");
        assert_eq!(ctx.route(), Route::MemberArea);
        handle_command(&ctx, "/logout");
        assert_eq!(ctx.route(), Route::Auth);
        assert!(!ctx.session.borrow().session().is_authenticated());
    }

    #[test]
    fn test_unauthorized_response_expires_session() {
        let api = Arc::new(FakeApi::new());
        let token = api.issue_token(ADMIN_EMAIL);
        let ctx = context(api.clone(), Some(token), &[]);
        start(&ctx);
        api.fail_next("GET /admin/books", 401);
        handle_command(&ctx, "/tab books");
        assert_eq!(ctx.route(), Route::Auth);
        assert!(ctx.session.borrow().session().token().is_none());
    }

    #[test]
    fn test_logout_surfaces_token_store_failure() {
        let api = Arc::new(FakeApi::new());
        let mut ctx = context(api, None, &[]);
        let mut session = SessionContext::new(Box::new(BrokenTokenStore));
        session.initialize(ctx.api.as_ref());
        ctx.session = RefCell::new(session);
        start(&ctx);

        let line = format!("/login {} {}", ADMIN_EMAIL, PASSWORD);
        handle_command(&ctx, &line);
        assert_eq!(ctx.route(), Route::AdminDashboard);
        handle_command(&ctx, "/logout");
        assert_eq!(ctx.route(), Route::Auth);

        let store_errors: Vec<String> = ctx
            .notifier
            .take_recent(20)
            .into_iter()
            .map(|n| n.message)
            .filter(|m| m.starts_with("Could not update the saved session"))
            .collect();
        assert_eq!(store_errors.len(), 2);
        assert!(store_errors[0].contains("read-only"));
    }

    #[test]
    fn test_quoted_arguments_and_exit() {
        let api = Arc::new(FakeApi::new());
        let ctx = context(api, None, &[]);
        start(&ctx);
        handle_command(&ctx, "/mode register");
        handle_command(&ctx, "/set name \"Ada Lovelace\"");
        let name = with_auth(&ctx, |s| s.form.name.clone());
        assert_eq!(name.as_deref(), Some("Ada Lovelace"));
        assert!(handle_command(&ctx, "/exit"));
    }
}
