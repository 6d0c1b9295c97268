//! List refresh policy.
//!
//! Every successful mutation names the lists it made stale. Screens reload
//! exactly those lists, replacing their local copy with whatever the server
//! returns; nothing is patched in place beforehand.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A list a screen holds a copy of
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListKind {
    Stats,
    Books,
    Users,
    Transactions,
    MemberBooks,
    BorrowedBooks,
}

impl ListKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stats => "stats",
            Self::Books => "books",
            Self::Users => "users",
            Self::Transactions => "transactions",
            Self::MemberBooks => "member_books",
            Self::BorrowedBooks => "borrowed_books",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    AddBook,
    EditBook,
    DeleteBook,
    AddUser,
    EditUser,
    DeleteUser,
    AddTransaction,
    MarkReturned,
    Borrow,
    Return,
}

impl Mutation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AddBook => "add_book",
            Self::EditBook => "edit_book",
            Self::DeleteBook => "delete_book",
            Self::AddUser => "add_user",
            Self::EditUser => "edit_user",
            Self::DeleteUser => "delete_user",
            Self::AddTransaction => "add_transaction",
            Self::MarkReturned => "mark_returned",
            Self::Borrow => "borrow",
            Self::Return => "return",
        }
    }

    /// Lists to reload after this mutation succeeds, in reload order.
    /// Admin mutations always end with the aggregate stats.
    pub fn invalidates(&self) -> &'static [ListKind] {
        use ListKind::*;
        match self {
            Self::AddBook | Self::EditBook | Self::DeleteBook => &[Books, Stats],
            Self::AddUser | Self::EditUser | Self::DeleteUser => &[Users, Stats],
            // Checkout and check-in move copy counts too.
            Self::AddTransaction | Self::MarkReturned => &[Transactions, Books, Stats],
            Self::Borrow | Self::Return => &[MemberBooks, BorrowedBooks],
        }
    }
}

pub fn names(kinds: &[ListKind]) -> Vec<&'static str> {
    kinds.iter().map(ListKind::as_str).collect()
}

/// Cleared when a screen goes away. Fetches that finish afterwards check it
/// and drop their result instead of writing into a dead screen.
#[derive(Debug, Clone)]
pub struct Mounted(Arc<AtomicBool>);

impl Default for Mounted {
    fn default() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }
}

impl Mounted {
    pub fn is_mounted(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn unmount(&self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Local copy of one list plus its fetch status
#[derive(Debug, Clone, Default)]
pub struct ListState<T> {
    pub data: T,
    pub loading: bool,
    pub error: Option<String>,
    /// Number of completed loads, successful or not.
    pub loads: u32,
}

impl<T> ListState<T> {
    pub fn begin(&mut self) {
        self.loading = true;
    }

    /// Replace the local copy wholesale, or keep the stale copy and remember
    /// why the refetch failed.
    pub fn settle<E>(&mut self, result: Result<T, E>, on_error: impl FnOnce(E) -> String) {
        self.loading = false;
        self.loads += 1;
        match result {
            Ok(data) => {
                self.data = data;
                self.error = None;
            }
            Err(e) => self.error = Some(on_error(e)),
        }
    }
}

/// Run two independent fetches at once. Either may finish first.
pub fn join<A, B, FA, FB>(fa: FA, fb: FB) -> (A, B)
where
    FA: FnOnce() -> A + Send,
    FB: FnOnce() -> B,
    A: Send,
{
    std::thread::scope(|scope| {
        let handle = scope.spawn(fa);
        let b = fb();
        let a = match handle.join() {
            Ok(a) => a,
            Err(panic) => std::panic::resume_unwind(panic),
        };
        (a, b)
    })
}
