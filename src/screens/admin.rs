//! Administrator dashboard: stats, books, users and transactions tabs.

use super::{first_error, ActionError, ActionResult, Deps};
use crate::confirm::Confirmation;
use crate::error::ApiError;
use crate::forms::{BookDraft, BusyFlag, Draft, TransactionDraft, UserDraft};
use crate::guard::{Access, GuardState, NavigationGuard, Route};
use crate::modal::{Modal, ModalMode};
use crate::models::{
    Book, BookId, DashboardStats, ListQuery, Page, PageMeta, Transaction, TransactionId, User,
    UserId,
};
use crate::refresh::{ListKind, ListState, Mounted, Mutation};
use crate::render;
use crate::session::Session;
use chrono::NaiveDate;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminTab {
    Dashboard,
    Books,
    Users,
    Transactions,
}

impl AdminTab {
    pub const ALL: [AdminTab; 4] = [
        AdminTab::Dashboard,
        AdminTab::Books,
        AdminTab::Users,
        AdminTab::Transactions,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dashboard => "dashboard",
            Self::Books => "books",
            Self::Users => "users",
            Self::Transactions => "transactions",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
    }

    pub fn list(&self) -> ListKind {
        match self {
            Self::Dashboard => ListKind::Stats,
            Self::Books => ListKind::Books,
            Self::Users => ListKind::Users,
            Self::Transactions => ListKind::Transactions,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageNav {
    Next,
    Prev,
    To(u32),
}

/// Search term and page of one tab; each tab keeps its own.
#[derive(Debug, Clone)]
struct TabQuery {
    search: String,
    page: u32,
}

impl Default for TabQuery {
    fn default() -> Self {
        Self {
            search: String::new(),
            page: 1,
        }
    }
}

/// Which dialog is open, if any
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialog {
    Book,
    User,
    Transaction,
}

pub struct AdminScreen {
    tab: AdminTab,
    per_page: u32,
    pub stats: ListState<DashboardStats>,
    pub books: ListState<Page<Book>>,
    pub users: ListState<Page<User>>,
    pub transactions: ListState<Page<Transaction>>,
    book_query: TabQuery,
    user_query: TabQuery,
    tx_query: TabQuery,
    pub book_modal: Modal<BookDraft>,
    pub user_modal: Modal<UserDraft>,
    pub tx_modal: Modal<TransactionDraft>,
    busy: BusyFlag,
    mounted: Mounted,
    guard: NavigationGuard,
}

/// Write a fetch result into its list unless the screen is gone.
fn apply<T>(
    state: &mut ListState<T>,
    mounted: &Mounted,
    deps: &Deps,
    result: Result<T, ApiError>,
    fallback: &str,
) -> ActionResult {
    if !mounted.is_mounted() {
        return Ok(());
    }
    let failure = result.as_ref().err().cloned();
    state.settle(result, |e| e.user_message(fallback));
    match failure {
        Some(err) => Err(deps.api_failed(err, fallback)),
        None => Ok(()),
    }
}

impl AdminScreen {
    pub fn new(per_page: u32) -> Self {
        Self {
            tab: AdminTab::Dashboard,
            per_page,
            stats: ListState::default(),
            books: ListState::default(),
            users: ListState::default(),
            transactions: ListState::default(),
            book_query: TabQuery::default(),
            user_query: TabQuery::default(),
            tx_query: TabQuery::default(),
            book_modal: Modal::default(),
            user_modal: Modal::default(),
            tx_modal: Modal::default(),
            busy: BusyFlag::default(),
            mounted: Mounted::default(),
            guard: NavigationGuard::new(Access::AdminOnly),
        }
    }

    pub fn check(&mut self, session: &Session) -> Option<Route> {
        self.guard.check(session)
    }

    pub fn is_ready(&self) -> bool {
        self.guard.is_ready()
    }

    pub fn guard_state(&self) -> GuardState {
        self.guard.state()
    }

    pub fn mounted(&self) -> Mounted {
        self.mounted.clone()
    }

    pub fn tab(&self) -> AdminTab {
        self.tab
    }

    pub fn is_busy(&self) -> bool {
        self.busy.is_busy()
    }

    fn query_mut(&mut self, tab: AdminTab) -> Option<&mut TabQuery> {
        match tab {
            AdminTab::Dashboard => None,
            AdminTab::Books => Some(&mut self.book_query),
            AdminTab::Users => Some(&mut self.user_query),
            AdminTab::Transactions => Some(&mut self.tx_query),
        }
    }

    fn list_query(&self, query: &TabQuery) -> ListQuery {
        ListQuery::new(query.page, &query.search, self.per_page)
    }

    fn meta(&self, tab: AdminTab) -> Option<PageMeta> {
        match tab {
            AdminTab::Dashboard => None,
            AdminTab::Books => Some(self.books.data.meta),
            AdminTab::Users => Some(self.users.data.meta),
            AdminTab::Transactions => Some(self.transactions.data.meta),
        }
    }

    /// Switch tab and fetch its data.
    pub fn activate(&mut self, deps: &Deps, tab: AdminTab) -> ActionResult {
        self.tab = tab;
        self.load(deps, tab.list())
    }

    pub fn load(&mut self, deps: &Deps, kind: ListKind) -> ActionResult {
        let token = deps.token();
        match kind {
            ListKind::Stats => {
                self.stats.begin();
                let result = deps.api.dashboard_stats(token);
                apply(
                    &mut self.stats,
                    &self.mounted,
                    deps,
                    result,
                    "Failed to load dashboard statistics",
                )
            }
            ListKind::Books => {
                self.books.begin();
                let result = deps.api.list_books(token, &self.list_query(&self.book_query));
                apply(&mut self.books, &self.mounted, deps, result, "Failed to load books")
            }
            ListKind::Users => {
                self.users.begin();
                let result = deps.api.list_users(token, &self.list_query(&self.user_query));
                apply(&mut self.users, &self.mounted, deps, result, "Failed to load users")
            }
            ListKind::Transactions => {
                self.transactions.begin();
                let result = deps
                    .api
                    .list_transactions(token, &self.list_query(&self.tx_query));
                apply(
                    &mut self.transactions,
                    &self.mounted,
                    deps,
                    result,
                    "Failed to load transactions",
                )
            }
            ListKind::MemberBooks | ListKind::BorrowedBooks => Ok(()),
        }
    }

    /// Reload the given lists in order; every one is attempted.
    pub fn reload(&mut self, deps: &Deps, kinds: &[ListKind]) -> ActionResult {
        deps.refreshed(kinds);
        let mut failure = None;
        for kind in kinds {
            failure = first_error(failure, self.load(deps, *kind));
        }
        failure.map_or(Ok(()), Err)
    }

    /// New search term for the current tab; goes back to page 1.
    pub fn search(&mut self, deps: &Deps, term: &str) -> ActionResult {
        let tab = self.tab;
        let query = self
            .query_mut(tab)
            .ok_or_else(|| ActionError::Rejected("Nothing to search on the dashboard".to_string()))?;
        query.search = term.trim().to_string();
        query.page = 1;
        self.load(deps, tab.list())
    }

    pub fn page(&mut self, deps: &Deps, nav: PageNav) -> ActionResult {
        let tab = self.tab;
        let meta = self
            .meta(tab)
            .ok_or_else(|| ActionError::Rejected("The dashboard has no pages".to_string()))?;
        let target = match nav {
            PageNav::Next if meta.has_next() => meta.current_page + 1,
            PageNav::Next => return Err(ActionError::Rejected("Already on the last page".to_string())),
            PageNav::Prev if meta.has_prev() => meta.current_page - 1,
            PageNav::Prev => return Err(ActionError::Rejected("Already on the first page".to_string())),
            PageNav::To(n) if (1..=meta.last_page).contains(&n) => n,
            PageNav::To(n) => {
                return Err(ActionError::Rejected(format!(
                    "Page {} does not exist (1-{})",
                    n, meta.last_page
                )))
            }
        };
        if let Some(query) = self.query_mut(tab) {
            query.page = target;
        }
        self.load(deps, tab.list())
    }

    // ------------------------------------------------------------------
    // Dialogs
    // ------------------------------------------------------------------

    pub fn dialog(&self) -> Option<Dialog> {
        if self.book_modal.is_open() {
            Some(Dialog::Book)
        } else if self.user_modal.is_open() {
            Some(Dialog::User)
        } else if self.tx_modal.is_open() {
            Some(Dialog::Transaction)
        } else {
            None
        }
    }

    /// Close whatever dialog is open, discarding its draft.
    pub fn cancel(&mut self) {
        self.book_modal.cancel();
        self.user_modal.cancel();
        self.tx_modal.cancel();
    }

    pub fn open_add_book(&mut self) {
        self.cancel();
        self.book_modal.open_add();
    }

    pub fn open_edit_book(&mut self, id: BookId) -> ActionResult {
        let book = self
            .books
            .data
            .items
            .iter()
            .find(|b| b.id == id)
            .ok_or_else(|| ActionError::Rejected(format!("Book {} is not in the current list", id)))?;
        let draft = BookDraft::from_book(book);
        self.cancel();
        self.book_modal.open_edit(id, draft);
        Ok(())
    }

    pub fn open_add_user(&mut self) {
        self.cancel();
        self.user_modal.open_add();
    }

    pub fn open_edit_user(&mut self, id: UserId) -> ActionResult {
        let user = self
            .users
            .data
            .items
            .iter()
            .find(|u| u.id == id)
            .ok_or_else(|| ActionError::Rejected(format!("User {} is not in the current list", id)))?;
        let draft = UserDraft::from_user(user);
        self.cancel();
        self.user_modal.open_edit(id, draft);
        Ok(())
    }

    pub fn open_add_transaction(&mut self) {
        self.cancel();
        self.tx_modal.open_add();
    }

    pub fn set_field(&mut self, field: &str, value: &str) -> ActionResult {
        let result = match self.dialog() {
            Some(Dialog::Book) => self.book_modal.draft_mut().map(|d| d.set_field(field, value)),
            Some(Dialog::User) => self.user_modal.draft_mut().map(|d| d.set_field(field, value)),
            Some(Dialog::Transaction) => self.tx_modal.draft_mut().map(|d| d.set_field(field, value)),
            None => None,
        };
        match result {
            Some(r) => Ok(r?),
            None => Err(ActionError::Rejected("No form is open".to_string())),
        }
    }

    /// Submit the open dialog.
    pub fn submit(&mut self, deps: &Deps, today: NaiveDate) -> ActionResult {
        match self.dialog() {
            Some(Dialog::Book) => self.submit_book(deps),
            Some(Dialog::User) => self.submit_user(deps),
            Some(Dialog::Transaction) => self.submit_transaction(deps, today),
            None => Err(ActionError::Rejected("No form is open".to_string())),
        }
    }

    fn submit_book(&mut self, deps: &Deps) -> ActionResult {
        let _busy = self.busy.begin().ok_or(ActionError::Busy)?;
        let (Some(mode), Some(draft)) = (self.book_modal.mode(), self.book_modal.draft().cloned())
        else {
            return Err(ActionError::Rejected("No book form is open".to_string()));
        };
        let token = deps.token();

        let (mutation, result, success, fallback) = match mode {
            ModalMode::Add => {
                let book = draft.to_new_book().map_err(|e| deps.invalid(e))?;
                (
                    Mutation::AddBook,
                    deps.api.create_book(token, &book).map(|b| Some(b.id)),
                    "Book added successfully",
                    "Failed to add book. Please try again.",
                )
            }
            ModalMode::Edit(id) => {
                let update = draft.to_update().map_err(|e| deps.invalid(e))?;
                (
                    Mutation::EditBook,
                    deps.api.update_book(token, id, &update).map(|_| Some(id)),
                    "Book updated successfully",
                    "Failed to update book",
                )
            }
        };
        self.finish(deps, mutation, result, success, fallback)?;
        self.book_modal.close();
        self.reload(deps, mutation.invalidates())
    }

    fn submit_user(&mut self, deps: &Deps) -> ActionResult {
        let _busy = self.busy.begin().ok_or(ActionError::Busy)?;
        let (Some(mode), Some(draft)) = (self.user_modal.mode(), self.user_modal.draft().cloned())
        else {
            return Err(ActionError::Rejected("No user form is open".to_string()));
        };
        let token = deps.token();

        let (mutation, result, success, fallback) = match mode {
            ModalMode::Add => {
                let user = draft.to_new_user().map_err(|e| deps.invalid(e))?;
                (
                    Mutation::AddUser,
                    deps.api.create_user(token, &user).map(|u| Some(u.id)),
                    "User added successfully",
                    "Failed to add user",
                )
            }
            ModalMode::Edit(id) => {
                let update = draft.to_update().map_err(|e| deps.invalid(e))?;
                (
                    Mutation::EditUser,
                    deps.api.update_user(token, id, &update).map(|_| Some(id)),
                    "User updated successfully",
                    "Failed to update user",
                )
            }
        };
        self.finish(deps, mutation, result, success, fallback)?;
        self.user_modal.close();
        self.reload(deps, mutation.invalidates())
    }

    fn submit_transaction(&mut self, deps: &Deps, today: NaiveDate) -> ActionResult {
        let _busy = self.busy.begin().ok_or(ActionError::Busy)?;
        let Some(draft) = self.tx_modal.draft().cloned() else {
            return Err(ActionError::Rejected("No transaction form is open".to_string()));
        };
        let tx = draft
            .to_new_transaction(today)
            .map_err(|e| deps.invalid(e))?;
        let result = deps
            .api
            .create_transaction(deps.token(), &tx)
            .map(|t| Some(t.id));
        self.finish(
            deps,
            Mutation::AddTransaction,
            result,
            "Transaction added successfully",
            "Failed to add transaction. Please try again.",
        )?;
        self.tx_modal.close();
        self.reload(deps, Mutation::AddTransaction.invalidates())
    }

    /// Record and announce the outcome of a mutation call.
    fn finish(
        &self,
        deps: &Deps,
        mutation: Mutation,
        result: Result<Option<i64>, ApiError>,
        success: &str,
        fallback: &str,
    ) -> ActionResult {
        match result {
            Ok(id) => {
                deps.mutated(mutation, id, true);
                deps.notifier.success(success);
                Ok(())
            }
            Err(err) => {
                deps.mutated(mutation, None, false);
                Err(deps.api_failed(err, fallback))
            }
        }
    }

    // ------------------------------------------------------------------
    // Destructive actions
    // ------------------------------------------------------------------

    pub fn delete_book(&mut self, deps: &Deps, id: BookId) -> ActionResult {
        let _busy = self.busy.begin().ok_or(ActionError::Busy)?;
        let subject = self
            .books
            .data
            .items
            .iter()
            .find(|b| b.id == id)
            .map(|b| format!("\"{}\"", b.title))
            .unwrap_or_else(|| format!("book #{}", id));
        if !deps.confirmer.confirm(&Confirmation::delete(&subject)) {
            return Err(ActionError::Declined);
        }
        let result = deps.api.delete_book(deps.token(), id).map(|_| Some(id));
        self.finish(
            deps,
            Mutation::DeleteBook,
            result,
            "Book deleted successfully",
            "Failed to delete book",
        )?;
        // Confirmed gone on the server; never show it again even if the
        // refetch below fails.
        self.books.data.items.retain(|b| b.id != id);
        self.reload(deps, Mutation::DeleteBook.invalidates())
    }

    pub fn delete_user(&mut self, deps: &Deps, id: UserId) -> ActionResult {
        let _busy = self.busy.begin().ok_or(ActionError::Busy)?;
        let subject = self
            .users
            .data
            .items
            .iter()
            .find(|u| u.id == id)
            .map(|u| u.name.clone())
            .unwrap_or_else(|| format!("user #{}", id));
        if !deps.confirmer.confirm(&Confirmation::delete(&subject)) {
            return Err(ActionError::Declined);
        }
        let result = deps.api.delete_user(deps.token(), id).map(|_| Some(id));
        self.finish(
            deps,
            Mutation::DeleteUser,
            result,
            "User deleted successfully",
            "Failed to delete user",
        )?;
        self.users.data.items.retain(|u| u.id != id);
        self.reload(deps, Mutation::DeleteUser.invalidates())
    }

    fn find_transaction(&self, id: TransactionId) -> Option<&Transaction> {
        self.transactions
            .data
            .items
            .iter()
            .chain(self.stats.data.recent_transactions.iter())
            .find(|t| t.id == id)
    }

    /// Check a borrowed copy back in on the member's behalf.
    pub fn mark_returned(&mut self, deps: &Deps, id: TransactionId) -> ActionResult {
        let _busy = self.busy.begin().ok_or(ActionError::Busy)?;
        let tx = self.find_transaction(id).ok_or_else(|| {
            ActionError::Rejected(format!("Transaction {} is not in the current list", id))
        })?;
        if tx.is_returned() {
            return Err(ActionError::Rejected(
                "This book was already returned".to_string(),
            ));
        }
        if !deps.confirmer.confirm(&Confirmation::return_book(&tx.book_title)) {
            return Err(ActionError::Declined);
        }
        let result = deps.api.mark_returned(deps.token(), id).map(|_| Some(id));
        self.finish(
            deps,
            Mutation::MarkReturned,
            result,
            "Book returned successfully",
            "Failed to return book",
        )?;
        self.reload(deps, Mutation::MarkReturned.invalidates())
    }

    // ------------------------------------------------------------------
    // Rendering
    // ------------------------------------------------------------------

    pub fn render(&self, today: NaiveDate) -> String {
        let mut out = String::new();
        let tabs: Vec<String> = AdminTab::ALL
            .iter()
            .map(|t| {
                if *t == self.tab {
                    format!("[{}]", t.as_str())
                } else {
                    t.as_str().to_string()
                }
            })
            .collect();
        out.push_str(&format!("Tabs: {}\n\n", tabs.join("  ")));

        match self.tab {
            AdminTab::Dashboard => {
                out.push_str(&status_line(self.stats.loading, self.stats.error.as_deref()));
                out.push_str(&render::stats_panel(&self.stats.data, today));
            }
            AdminTab::Books => {
                out.push_str(&list_header(&self.book_query, &self.books));
                out.push_str(&render::books_table(&self.books.data.items));
                out.push_str(&render::pagination_line(&self.books.data.meta));
            }
            AdminTab::Users => {
                out.push_str(&list_header(&self.user_query, &self.users));
                out.push_str(&render::users_table(&self.users.data.items));
                out.push_str(&render::pagination_line(&self.users.data.meta));
            }
            AdminTab::Transactions => {
                out.push_str(&list_header(&self.tx_query, &self.transactions));
                out.push_str(&render::transactions_table(
                    &self.transactions.data.items,
                    today,
                ));
                out.push_str(&render::pagination_line(&self.transactions.data.meta));
            }
        }

        if let Some(form) = self.render_dialog() {
            out.push('\n');
            out.push_str(&form);
        }
        out
    }

    fn render_dialog(&self) -> Option<String> {
        let (name, mode, fields) = match self.dialog()? {
            Dialog::Book => ("book", self.book_modal.mode()?, self.book_modal.draft()?.fields()),
            Dialog::User => ("user", self.user_modal.mode()?, self.user_modal.draft()?.fields()),
            Dialog::Transaction => (
                "transaction",
                self.tx_modal.mode()?,
                self.tx_modal.draft()?.fields(),
            ),
        };
        let title = match mode {
            ModalMode::Add => format!("Add {}", name),
            ModalMode::Edit(id) => format!("Edit {} #{}", name, id),
        };
        Some(render_form(&title, &fields, self.busy.is_busy()))
    }
}

fn status_line(loading: bool, error: Option<&str>) -> String {
    match (loading, error) {
        (true, _) => "  Loading...\n".to_string(),
        (false, Some(e)) => format!("  Error: {}\n", e),
        (false, None) => String::new(),
    }
}

fn list_header<T>(query: &TabQuery, state: &ListState<T>) -> String {
    let mut out = status_line(state.loading, state.error.as_deref());
    if !query.search.is_empty() {
        out.push_str(&format!("  Search: \"{}\"\n", query.search));
    }
    out
}

pub fn render_form(title: &str, fields: &[(&'static str, String)], busy: bool) -> String {
    let mut out = format!("  {}\n", title);
    for (name, value) in fields {
        out.push_str(&format!("    {:<22} {}\n", name, value));
    }
    out.push_str(if busy {
        "    (saving...)\n"
    } else {
        "    /set <field> <value>, /save, /cancel\n"
    });
    out
}
