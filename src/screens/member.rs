//! Member area: browse, borrow and return.

use super::{ActionError, ActionResult, Deps};
use crate::confirm::Confirmation;
use crate::error::ApiError;
use crate::forms::{parse_date, validate_due_date, BusyFlag, ValidationError, MAX_BORROW_DAYS};
use crate::guard::{Access, GuardState, NavigationGuard, Route};
use crate::models::{assign_unique_keys, Book, BookId, BorrowedBook, TransactionId};
use crate::refresh::{self, ListKind, ListState, Mounted, Mutation};
use crate::render::{self, BorrowControl};
use crate::session::Session;
use chrono::NaiveDate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BookFilter {
    #[default]
    All,
    Available,
    Borrowed,
}

impl BookFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Available => "available",
            Self::Borrowed => "borrowed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "all" => Some(Self::All),
            "available" => Some(Self::Available),
            "borrowed" => Some(Self::Borrowed),
            _ => None,
        }
    }
}

pub struct MemberScreen {
    pub filter: BookFilter,
    pub books: ListState<Vec<Book>>,
    pub borrowed: ListState<Vec<BorrowedBook>>,
    selected: Option<BookId>,
    due_date: Option<NaiveDate>,
    busy: BusyFlag,
    refreshing: BusyFlag,
    mounted: Mounted,
    guard: NavigationGuard,
}

impl Default for MemberScreen {
    fn default() -> Self {
        Self {
            filter: BookFilter::All,
            books: ListState::default(),
            borrowed: ListState::default(),
            selected: None,
            due_date: None,
            busy: BusyFlag::default(),
            refreshing: BusyFlag::default(),
            mounted: Mounted::default(),
            guard: NavigationGuard::new(Access::MemberOnly),
        }
    }
}

impl MemberScreen {
    pub fn check(&mut self, session: &Session) -> Option<Route> {
        self.guard.check(session)
    }

    pub fn guard_state(&self) -> GuardState {
        self.guard.state()
    }

    pub fn mounted(&self) -> Mounted {
        self.mounted.clone()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.is_busy()
    }

    pub fn selected(&self) -> Option<BookId> {
        self.selected
    }

    pub fn due_date(&self) -> Option<NaiveDate> {
        self.due_date
    }

    pub fn set_filter(&mut self, filter: BookFilter) {
        self.filter = filter;
    }

    /// Fetch the catalogue and the borrowed list at the same time. With
    /// `quiet`, per-list failures are not announced individually.
    fn fetch_both(&mut self, deps: &Deps, quiet: bool) -> ActionResult {
        let api = deps.api;
        let token = deps.token();
        self.books.begin();
        self.borrowed.begin();
        let (books, borrowed) = refresh::join(
            move || api.member_books(token),
            move || api.borrowed_books(token),
        );
        if !self.mounted.is_mounted() {
            return Ok(());
        }

        let borrowed = borrowed.map(|mut rows| {
            assign_unique_keys(&mut rows);
            rows
        });
        let books_err = books.as_ref().err().cloned();
        let borrowed_err = borrowed.as_ref().err().cloned();
        self.books
            .settle(books, |e| e.user_message("Failed to load books"));
        self.borrowed
            .settle(borrowed, |e| e.user_message("Failed to load borrowed books"));

        let mut failure: Option<ApiError> = None;
        for (err, fallback) in [
            (books_err, "Failed to load books"),
            (borrowed_err, "Failed to load borrowed books"),
        ] {
            if let Some(err) = err {
                if !quiet {
                    deps.notifier.error(&err.user_message(fallback));
                }
                if failure.as_ref().map_or(true, |f| !f.is_unauthorized()) {
                    failure = Some(err);
                }
            }
        }
        failure.map_or(Ok(()), |e| Err(ActionError::Api(e)))
    }

    /// Initial load on mount.
    pub fn load(&mut self, deps: &Deps) -> ActionResult {
        self.fetch_both(deps, false)
    }

    /// Manual refresh: one notice for the pair.
    pub fn refresh(&mut self, deps: &Deps) -> ActionResult {
        let _refreshing = self.refreshing.begin().ok_or(ActionError::Busy)?;
        deps.refreshed(&[ListKind::MemberBooks, ListKind::BorrowedBooks]);
        match self.fetch_both(deps, true) {
            Ok(()) => {
                deps.notifier.success("Data refreshed successfully");
                Ok(())
            }
            Err(err) => {
                deps.notifier.error("Failed to refresh data");
                Err(err)
            }
        }
    }

    fn after(&mut self, deps: &Deps, mutation: Mutation) -> ActionResult {
        deps.refreshed(mutation.invalidates());
        self.fetch_both(deps, false)
    }

    fn find_book(&self, id: BookId) -> Option<&Book> {
        self.books.data.iter().find(|b| b.id == id)
    }

    /// Pick the book to borrow. Clears any due date chosen for another book.
    pub fn select(&mut self, id: BookId) -> ActionResult {
        let book = self
            .find_book(id)
            .ok_or_else(|| ActionError::Rejected(format!("Book {} is not in the list", id)))?;
        if !BorrowControl::for_book(book).enabled() {
            return Err(ActionError::Rejected(
                "This book is currently unavailable".to_string(),
            ));
        }
        if self.selected != Some(id) {
            self.due_date = None;
        }
        self.selected = Some(id);
        Ok(())
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
        self.due_date = None;
    }

    /// Accepts `YYYY-MM-DD`, `today` or `+N`. Range is checked on borrow.
    pub fn set_due_date(&mut self, input: &str, today: NaiveDate) -> Result<NaiveDate, ActionError> {
        let date = parse_date(input, today).ok_or_else(|| {
            ActionError::Validation(ValidationError::new(
                "due_date",
                "Enter a date as YYYY-MM-DD, today, or +N days",
            ))
        })?;
        self.due_date = Some(date);
        Ok(date)
    }

    pub fn borrow(&mut self, deps: &Deps, today: NaiveDate) -> ActionResult {
        let _busy = self.busy.begin().ok_or(ActionError::Busy)?;
        let id = self
            .selected
            .ok_or_else(|| ActionError::Rejected("Select a book to borrow first".to_string()))?;
        let available = self
            .find_book(id)
            .map(|b| BorrowControl::for_book(b).enabled())
            .unwrap_or(false);
        if !available {
            return Err(ActionError::Rejected(
                "This book is currently unavailable".to_string(),
            ));
        }
        let due = validate_due_date(self.due_date, today).map_err(|e| deps.invalid(e))?;

        match deps.api.borrow_book(deps.token(), id, due) {
            Ok(ack) => {
                deps.mutated(Mutation::Borrow, Some(id), true);
                deps.notifier.success(
                    ack.message
                        .as_deref()
                        .unwrap_or("Book borrowed successfully"),
                );
            }
            Err(err) => {
                deps.mutated(Mutation::Borrow, Some(id), false);
                return Err(deps.api_failed(err, "Failed to borrow book"));
            }
        }
        self.clear_selection();
        self.after(deps, Mutation::Borrow)
    }

    pub fn return_book(&mut self, deps: &Deps, transaction_id: TransactionId) -> ActionResult {
        let _busy = self.busy.begin().ok_or(ActionError::Busy)?;
        let row = self
            .borrowed
            .data
            .iter()
            .find(|r| r.transaction_id == transaction_id)
            .ok_or_else(|| {
                ActionError::Rejected(format!(
                    "Transaction {} is not in your borrowed books",
                    transaction_id
                ))
            })?;
        if row.is_returned() {
            return Err(ActionError::Rejected(
                "This book was already returned".to_string(),
            ));
        }
        if deps.token().is_none() {
            deps.notifier.error("Authentication required");
            return Err(ActionError::Api(ApiError::Unauthenticated));
        }
        if !deps.confirmer.confirm(&Confirmation::return_book(&row.title)) {
            return Err(ActionError::Declined);
        }

        match deps.api.return_transaction(deps.token(), transaction_id) {
            Ok(ack) if ack.success == Some(true) => {
                deps.mutated(Mutation::Return, Some(transaction_id), true);
                deps.notifier.success(
                    ack.message
                        .as_deref()
                        .unwrap_or("Book returned successfully"),
                );
            }
            Ok(ack) => {
                deps.mutated(Mutation::Return, Some(transaction_id), false);
                let message = ack
                    .message
                    .unwrap_or_else(|| "Failed to process return".to_string());
                deps.notifier.error(&message);
                return Err(ActionError::Rejected(message));
            }
            Err(err) => {
                deps.mutated(Mutation::Return, Some(transaction_id), false);
                deps.notifier.error(&err.return_message());
                return Err(ActionError::Api(err));
            }
        }
        self.after(deps, Mutation::Return)
    }

    pub fn render(&self, today: NaiveDate) -> String {
        let mut out = String::new();
        out.push_str(&render::member_summary(&self.books.data, &self.borrowed.data));
        out.push_str(&format!(
            "  Filter: {} (all | available | borrowed)\n\n",
            self.filter.as_str()
        ));

        let (loading, error) = match self.filter {
            BookFilter::Borrowed => (self.borrowed.loading, self.borrowed.error.as_deref()),
            _ => (self.books.loading, self.books.error.as_deref()),
        };
        if loading {
            out.push_str("  Loading...\n");
        } else if let Some(e) = error {
            out.push_str(&format!("  Error: {}\n", e));
        }

        match self.filter {
            BookFilter::All => out.push_str(&render::catalogue_table(&self.books.data)),
            BookFilter::Available => {
                let available: Vec<Book> = self
                    .books
                    .data
                    .iter()
                    .filter(|b| b.is_available())
                    .cloned()
                    .collect();
                out.push_str(&render::catalogue_table(&available));
            }
            BookFilter::Borrowed => {
                out.push_str(&render::borrowed_table(&self.borrowed.data, today))
            }
        }

        if let Some(book) = self.selected.and_then(|id| self.find_book(id)) {
            out.push_str(&format!(
                "\n  Borrowing \"{}\" - due date: {} (within {} days; /due <date>, /borrow)\n",
                book.title,
                self.due_date
                    .map(|d| d.format("%Y-%m-%d").to_string())
                    .unwrap_or_else(|| "not set".to_string()),
                MAX_BORROW_DAYS
            ));
        }
        out
    }
}
