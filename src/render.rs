//! List and table renderers.
//!
//! Pure functions from fetched data to text. Action controls are computed per
//! row so that the rules for disabling them live in one place.

use crate::models::{
    Book, BorrowedBook, DashboardStats, PageMeta, Transaction, TransactionStatus, User,
};
use chrono::{DateTime, NaiveDate, NaiveDateTime};

const MAX_CELL: usize = 32;

/// Borrow action for a book row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BorrowControl {
    Borrow,
    Unavailable,
}

impl BorrowControl {
    pub fn for_book(book: &Book) -> Self {
        if book.available_copies <= 0 {
            Self::Unavailable
        } else {
            Self::Borrow
        }
    }

    pub fn enabled(&self) -> bool {
        *self == Self::Borrow
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Borrow => "[borrow]",
            Self::Unavailable => "Unavailable",
        }
    }
}

/// Return action for a transaction row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnControl {
    Return,
    AlreadyReturned,
}

impl ReturnControl {
    pub fn for_status(status: TransactionStatus) -> Self {
        match status {
            TransactionStatus::Returned => Self::AlreadyReturned,
            TransactionStatus::Borrowed => Self::Return,
        }
    }

    pub fn enabled(&self) -> bool {
        *self == Self::Return
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Return => "[return]",
            Self::AlreadyReturned => "Already Returned",
        }
    }
}

/// Calendar date of an API timestamp or `YYYY-MM-DD` string.
pub fn parse_api_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.date());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(dt.date());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

/// `Oct 19, 2026`; "N/A" when absent, "Invalid Date" when unparseable.
pub fn format_date(value: Option<&str>) -> String {
    match value.map(str::trim).filter(|s| !s.is_empty()) {
        None => "N/A".to_string(),
        Some(s) => match parse_api_date(s) {
            Some(date) => date.format("%b %-d, %Y").to_string(),
            None => "Invalid Date".to_string(),
        },
    }
}

/// Still out and past its due date.
pub fn is_overdue(status: TransactionStatus, due_date: Option<&str>, today: NaiveDate) -> bool {
    status == TransactionStatus::Borrowed
        && due_date
            .and_then(parse_api_date)
            .is_some_and(|due| due < today)
}

fn truncate(s: &str) -> String {
    if s.chars().count() > MAX_CELL {
        let cut: String = s.chars().take(MAX_CELL - 3).collect();
        format!("{}...", cut)
    } else {
        s.to_string()
    }
}

struct Table {
    headers: Vec<&'static str>,
    rows: Vec<Vec<String>>,
}

impl Table {
    fn new(headers: &[&'static str]) -> Self {
        Self {
            headers: headers.to_vec(),
            rows: Vec::new(),
        }
    }

    fn row(&mut self, cells: Vec<String>) {
        self.rows.push(cells.iter().map(|c| truncate(c)).collect());
    }

    fn render(&self, empty: &str) -> String {
        if self.rows.is_empty() {
            return format!("  {}\n", empty);
        }
        let mut widths: Vec<usize> = self.headers.iter().map(|h| h.len()).collect();
        for row in &self.rows {
            for (i, cell) in row.iter().enumerate() {
                widths[i] = widths[i].max(cell.chars().count());
            }
        }
        let line = |cells: Vec<&str>| {
            let padded: Vec<String> = cells
                .iter()
                .zip(&widths)
                .map(|(c, w)| format!("{:<width$}", c, width = *w))
                .collect();
            format!("  {}\n", padded.join("  ").trim_end())
        };
        let mut out = line(self.headers.clone());
        let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        out.push_str(&line(rule.iter().map(String::as_str).collect()));
        for row in &self.rows {
            out.push_str(&line(row.iter().map(String::as_str).collect()));
        }
        out
    }
}

/// Admin books table.
pub fn books_table(books: &[Book]) -> String {
    let mut table = Table::new(&["ID", "Title", "Author", "Genre", "Available", "Actions"]);
    for book in books {
        table.row(vec![
            book.id.to_string(),
            book.title.clone(),
            book.author.clone(),
            book.genre.clone(),
            format!("{}/{}", book.available_copies, book.total_copies),
            "[edit] [delete]".to_string(),
        ]);
    }
    table.render("No books found")
}

/// Member catalogue with borrow controls.
pub fn catalogue_table(books: &[Book]) -> String {
    let mut table = Table::new(&["ID", "Title", "Author", "Genre", "Available", "Action"]);
    for book in books {
        table.row(vec![
            book.id.to_string(),
            book.title.clone(),
            book.author.clone(),
            book.genre.clone(),
            format!("{}/{}", book.available_copies, book.total_copies),
            BorrowControl::for_book(book).label().to_string(),
        ]);
    }
    table.render("No books found")
}

pub fn users_table(users: &[User]) -> String {
    let mut table = Table::new(&["ID", "Name", "Email", "Role", "Joined", "Actions"]);
    for user in users {
        table.row(vec![
            user.id.to_string(),
            user.name.clone(),
            user.email.clone(),
            user.role.as_str().to_string(),
            format_date(user.created_at.as_deref()),
            "[edit] [delete]".to_string(),
        ]);
    }
    table.render("No users found")
}

pub fn transactions_table(transactions: &[Transaction], today: NaiveDate) -> String {
    let mut table = Table::new(&[
        "ID", "Member", "Book", "Borrowed", "Due", "Returned", "Status", "Action",
    ]);
    for tx in transactions {
        let mut status = tx.status.as_str().to_string();
        if is_overdue(tx.status, tx.due_date.as_deref(), today) {
            status.push_str(" (overdue)");
        }
        table.row(vec![
            tx.id.to_string(),
            tx.user_name.clone(),
            tx.book_title.clone(),
            format_date(tx.borrowed_date.as_deref()),
            format_date(tx.due_date.as_deref()),
            tx.returned_date
                .as_deref()
                .map(|d| format_date(Some(d)))
                .unwrap_or_else(|| "-".to_string()),
            status,
            ReturnControl::for_status(tx.status).label().to_string(),
        ]);
    }
    table.render("No transactions found")
}

pub fn borrowed_table(rows: &[BorrowedBook], today: NaiveDate) -> String {
    let mut table = Table::new(&["Tx", "Title", "Author", "Borrowed", "Due", "Status", "Action"]);
    for row in rows {
        let mut status = row.status.as_str().to_string();
        if is_overdue(row.status, row.due_date.as_deref(), today) {
            status.push_str(" (overdue)");
        }
        table.row(vec![
            row.transaction_id.to_string(),
            row.title.clone(),
            row.author.clone(),
            format_date(row.borrowed_at.as_deref()),
            format_date(row.due_date.as_deref()),
            status,
            ReturnControl::for_status(row.status).label().to_string(),
        ]);
    }
    table.render("You have not borrowed any books yet")
}

pub fn stats_panel(stats: &DashboardStats, today: NaiveDate) -> String {
    let mut out = String::new();
    out.push_str(&format!("  Total books:        {}\n", stats.books_count));
    out.push_str(&format!("  Registered users:   {}\n", stats.users_count));
    out.push_str(&format!("  Transactions:       {}\n", stats.transactions_count));
    out.push_str(&format!("  Overdue:            {}\n", stats.overdue_count));
    out.push_str("\n  Recent transactions\n");
    out.push_str(&transactions_table(&stats.recent_transactions, today));
    out
}

/// Counters shown above the member lists, computed from fetched data.
pub fn member_summary(books: &[Book], borrowed: &[BorrowedBook]) -> String {
    let available = books.iter().filter(|b| b.is_available()).count();
    let out = borrowed.iter().filter(|b| !b.is_returned()).count();
    format!(
        "  Books: {}  Available: {}  Currently borrowed: {}\n",
        books.len(),
        available,
        out
    )
}

pub fn pagination_line(meta: &PageMeta) -> String {
    let mut nav = Vec::new();
    if meta.has_prev() {
        nav.push("/page prev");
    }
    if meta.has_next() {
        nav.push("/page next");
    }
    let mut line = format!(
        "  Page {} of {} ({} total)",
        meta.current_page, meta.last_page, meta.total
    );
    if !nav.is_empty() {
        line.push_str(&format!("  [{}]", nav.join(", ")));
    }
    line.push('\n');
    line
}

/// Public URL of a stored profile image. Uploaded files live next to the
/// API, not under it.
pub fn profile_image_url(base_url: &str, path: &str) -> String {
    let root = base_url.trim_end_matches('/');
    let root = root.strip_suffix("/api").unwrap_or(root);
    format!("{}/storage/{}", root, path.trim_start_matches('/'))
}

pub fn profile(user: &User, base_url: &str) -> String {
    let mut out = String::new();
    out.push_str(&format!("  Name:         {}\n", user.name));
    out.push_str(&format!("  Email:        {}\n", user.email));
    out.push_str(&format!("  Role:         {}\n", user.role.as_str()));
    out.push_str(&format!(
        "  Member since: {}\n",
        format_date(user.created_at.as_deref())
    ));
    if let Some(path) = user.profile_image.as_deref().filter(|p| !p.is_empty()) {
        out.push_str(&format!(
            "  Image:        {}\n",
            profile_image_url(base_url, path)
        ));
    }
    out
}
