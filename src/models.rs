//! Transport shapes exchanged with the library API.
//!
//! None of these are owned by the client: they are transient copies that get
//! replaced wholesale on every refetch.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub type BookId = i64;
pub type UserId = i64;
pub type TransactionId = i64;

/// Access tier of an account. Any role the client does not know is treated
/// as a regular member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[default]
    #[serde(other)]
    User,
}

impl Role {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "user" | "member" => Some(Self::User),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub profile_image: Option<String>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Book {
    pub id: BookId,
    #[serde(default = "untitled")]
    pub title: String,
    #[serde(default = "unknown_author")]
    pub author: String,
    #[serde(default = "uncategorized")]
    pub genre: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient_count")]
    pub total_copies: i64,
    #[serde(default, deserialize_with = "lenient_count")]
    pub available_copies: i64,
    #[serde(default)]
    pub publisher: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl Book {
    /// A book with no copies left cannot be borrowed.
    pub fn is_available(&self) -> bool {
        self.available_copies > 0
    }
}

fn untitled() -> String {
    "No Title".to_string()
}

fn unknown_author() -> String {
    "Unknown Author".to_string()
}

fn uncategorized() -> String {
    "Uncategorized".to_string()
}

/// Copy counts sometimes arrive as strings or null.
fn lenient_count<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Number(n) => n.as_i64().unwrap_or(0),
        serde_json::Value::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    #[default]
    Borrowed,
    Returned,
}

impl TransactionStatus {
    /// Anything other than "returned" is treated as still out.
    pub fn parse(s: Option<&str>) -> Self {
        match s.map(|s| s.trim().to_lowercase()) {
            Some(s) if s == "returned" => Self::Returned,
            _ => Self::Borrowed,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Borrowed => "borrowed",
            Self::Returned => "returned",
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NamedRef {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    title: Option<String>,
}

/// Transaction as the server may send it, before normalization.
#[derive(Debug, Clone, Deserialize)]
pub struct RawTransaction {
    id: TransactionId,
    #[serde(default)]
    user_name: Option<String>,
    #[serde(default)]
    user: Option<NamedRef>,
    #[serde(default)]
    book_title: Option<String>,
    #[serde(default)]
    book: Option<NamedRef>,
    #[serde(default)]
    borrowed_date: Option<String>,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    due_date: Option<String>,
    #[serde(default)]
    returned_date: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(from = "RawTransaction")]
pub struct Transaction {
    pub id: TransactionId,
    pub user_name: String,
    pub book_title: String,
    pub borrowed_date: Option<String>,
    pub due_date: Option<String>,
    pub returned_date: Option<String>,
    pub status: TransactionStatus,
}

impl Transaction {
    pub fn is_returned(&self) -> bool {
        self.status == TransactionStatus::Returned
    }
}

impl From<RawTransaction> for Transaction {
    fn from(raw: RawTransaction) -> Self {
        let user_name = raw
            .user_name
            .or_else(|| raw.user.and_then(|u| u.name))
            .unwrap_or_else(|| "Unknown User".to_string());
        let book_title = raw
            .book_title
            .or_else(|| raw.book.and_then(|b| b.title))
            .unwrap_or_else(|| "Unknown Book".to_string());
        Transaction {
            id: raw.id,
            user_name,
            book_title,
            borrowed_date: raw.borrowed_date.or(raw.created_at),
            due_date: raw.due_date,
            returned_date: raw.returned_date,
            status: TransactionStatus::parse(raw.status.as_deref()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawBorrowedBook {
    id: BookId,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    genre: Option<String>,
    #[serde(default, deserialize_with = "lenient_count")]
    available_copies: i64,
    #[serde(default, deserialize_with = "lenient_count")]
    total_copies: i64,
    #[serde(default)]
    transaction_id: Option<TransactionId>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    due_date: Option<String>,
    #[serde(default)]
    borrowed_at: Option<String>,
    #[serde(default)]
    returned_date: Option<String>,
}

/// A row of the member's borrowed-books list.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(from = "RawBorrowedBook")]
pub struct BorrowedBook {
    pub book_id: BookId,
    pub transaction_id: TransactionId,
    pub title: String,
    pub author: String,
    pub genre: String,
    pub available_copies: i64,
    pub total_copies: i64,
    pub status: TransactionStatus,
    pub due_date: Option<String>,
    pub borrowed_at: Option<String>,
    pub returned_date: Option<String>,
    /// Display-only row key, assigned after fetch.
    #[serde(skip)]
    pub unique_key: String,
}

impl BorrowedBook {
    pub fn is_returned(&self) -> bool {
        self.status == TransactionStatus::Returned
    }
}

impl From<RawBorrowedBook> for BorrowedBook {
    fn from(raw: RawBorrowedBook) -> Self {
        BorrowedBook {
            book_id: raw.id,
            transaction_id: raw.transaction_id.unwrap_or(raw.id),
            title: raw.title.unwrap_or_else(untitled),
            author: raw.author.unwrap_or_else(unknown_author),
            genre: raw.genre.unwrap_or_else(uncategorized),
            available_copies: raw.available_copies,
            total_copies: raw.total_copies,
            status: TransactionStatus::parse(raw.status.as_deref()),
            due_date: raw.due_date,
            borrowed_at: raw.borrowed_at,
            returned_date: raw.returned_date,
            unique_key: String::new(),
        }
    }
}

/// Give every row a key that is unique within the list, even when the same
/// book was borrowed more than once.
pub fn assign_unique_keys(rows: &mut [BorrowedBook]) {
    for (position, row) in rows.iter_mut().enumerate() {
        row.unique_key = format!("{}-{}-{}", row.book_id, row.transaction_id, position);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct DashboardStats {
    #[serde(default)]
    pub books_count: i64,
    #[serde(default)]
    pub users_count: i64,
    #[serde(default)]
    pub transactions_count: i64,
    #[serde(default)]
    pub overdue_count: i64,
    #[serde(default)]
    pub recent_transactions: Vec<Transaction>,
}

/// Pagination metadata of a list response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageMeta {
    pub current_page: u32,
    pub last_page: u32,
    pub per_page: u32,
    pub total: u64,
}

impl Default for PageMeta {
    fn default() -> Self {
        Self {
            current_page: 1,
            last_page: 1,
            per_page: 10,
            total: 0,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawPageMeta {
    #[serde(default)]
    current_page: Option<u32>,
    #[serde(default)]
    last_page: Option<u32>,
    #[serde(default)]
    per_page: Option<u32>,
    #[serde(default)]
    total: Option<u64>,
}

impl PageMeta {
    /// Fill whatever the server left out: page 1 of 1, all items on it.
    pub fn from_partial(raw: Option<RawPageMeta>, item_count: usize, per_page: u32) -> Self {
        let raw = raw.unwrap_or_default();
        PageMeta {
            current_page: raw.current_page.filter(|p| *p > 0).unwrap_or(1),
            last_page: raw.last_page.filter(|p| *p > 0).unwrap_or(1),
            per_page: raw.per_page.filter(|p| *p > 0).unwrap_or(per_page),
            total: raw.total.unwrap_or(item_count as u64),
        }
    }

    pub fn has_next(&self) -> bool {
        self.current_page < self.last_page
    }

    pub fn has_prev(&self) -> bool {
        self.current_page > 1
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub meta: PageMeta,
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            meta: PageMeta::default(),
        }
    }
}

/// Query parameters of the paginated admin lists
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub page: u32,
    pub search: Option<String>,
    pub per_page: u32,
}

impl ListQuery {
    pub fn new(page: u32, search: &str, per_page: u32) -> Self {
        let search = search.trim();
        Self {
            page: page.max(1),
            search: (!search.is_empty()).then(|| search.to_string()),
            per_page,
        }
    }

    pub fn pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![("page", self.page.to_string())];
        if let Some(search) = &self.search {
            pairs.push(("search", search.clone()));
        }
        pairs.push(("per_page", self.per_page.to_string()));
        pairs
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
    pub password_confirmation: String,
    pub role: Role,
}

/// Successful login: bearer token plus the account it belongs to
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    #[serde(alias = "access_token")]
    pub token: String,
    pub user: User,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewBook {
    pub title: String,
    pub author: String,
    pub genre: String,
    pub description: String,
    pub total_copies: i64,
    pub available_copies: i64,
    pub publisher: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BookUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_copies: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UserUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewTransaction {
    pub book_id: BookId,
    pub user_id: UserId,
    #[serde(with = "iso_date")]
    pub due_date: NaiveDate,
}

/// Acknowledgement body of borrow/return calls
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiMessage {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub message: Option<String>,
}

/// `YYYY-MM-DD` on the wire.
pub mod iso_date {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    pub const FORMAT: &str = "%Y-%m-%d";

    pub fn serialize<S: Serializer>(date: &NaiveDate, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&date.format(FORMAT).to_string())
    }

    #[allow(dead_code)]
    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDate, D::Error> {
        let s = String::deserialize(d)?;
        NaiveDate::parse_from_str(&s, FORMAT).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_transaction_normalization_from_nested_refs() {
        let tx: Transaction = serde_json::from_value(json!({
            "id": 7,
            "user": { "name": "Ada" },
            "book": { "title": "Dune" },
            "created_at": "2026-10-01T10:00:00Z",
            "due_date": "2026-10-08"
        }))
        .unwrap();
        assert_eq!(tx.user_name, "Ada");
        assert_eq!(tx.book_title, "Dune");
        assert_eq!(tx.borrowed_date.as_deref(), Some("2026-10-01T10:00:00Z"));
        assert_eq!(tx.status, TransactionStatus::Borrowed);
        assert!(tx.returned_date.is_none());
    }

    #[test]
    fn test_transaction_defaults_for_missing_names() {
        let tx: Transaction =
            serde_json::from_value(json!({ "id": 1, "status": "returned" })).unwrap();
        assert_eq!(tx.user_name, "Unknown User");
        assert_eq!(tx.book_title, "Unknown Book");
        assert!(tx.is_returned());
    }

    #[test]
    fn test_book_counts_accept_strings() {
        let book: Book = serde_json::from_value(json!({
            "id": 3,
            "title": "Dune",
            "author": "Herbert",
            "genre": "SciFi",
            "total_copies": "3",
            "available_copies": null
        }))
        .unwrap();
        assert_eq!(book.total_copies, 3);
        assert_eq!(book.available_copies, 0);
        assert!(!book.is_available());
    }

    #[test]
    fn test_borrowed_book_transaction_id_falls_back_to_book_id() {
        let mut rows: Vec<BorrowedBook> = serde_json::from_value(json!([
            { "id": 5, "title": "Dune" },
            { "id": 5, "title": "Dune", "transaction_id": 40, "status": "returned" }
        ]))
        .unwrap();
        assign_unique_keys(&mut rows);
        assert_eq!(rows[0].transaction_id, 5);
        assert_eq!(rows[0].status, TransactionStatus::Borrowed);
        assert_eq!(rows[1].transaction_id, 40);
        assert_ne!(rows[0].unique_key, rows[1].unique_key);
    }

    #[test]
    fn test_page_meta_defaults() {
        let meta = PageMeta::from_partial(None, 4, 10);
        assert_eq!(meta.current_page, 1);
        assert_eq!(meta.last_page, 1);
        assert_eq!(meta.total, 4);
        assert!(!meta.has_next());
        assert!(!meta.has_prev());
    }

    #[test]
    fn test_list_query_omits_empty_search() {
        let query = ListQuery::new(0, "   ", 10);
        assert_eq!(query.page, 1);
        assert!(query.search.is_none());
        let keys: Vec<_> = query.pairs().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["page", "per_page"]);

        let query = ListQuery::new(2, "dune", 25);
        assert_eq!(query.pairs()[1], ("search", "dune".to_string()));
    }

    #[test]
    fn test_new_transaction_serializes_iso_date() {
        let tx = NewTransaction {
            book_id: 1,
            user_id: 2,
            due_date: NaiveDate::from_ymd_opt(2026, 10, 21).unwrap(),
        };
        let value = serde_json::to_value(&tx).unwrap();
        assert_eq!(value["due_date"], "2026-10-21");
    }

    #[test]
    fn test_login_response_accepts_access_token() {
        let resp: LoginResponse = serde_json::from_value(json!({
            "access_token": "abc",
            "user": { "id": 1, "name": "Ada", "email": "ada@example.com", "role": "admin" }
        }))
        .unwrap();
        assert_eq!(resp.token, "abc");
        assert!(resp.user.is_admin());
    }

    #[test]
    fn test_unknown_role_is_treated_as_member() {
        let users: Vec<User> = serde_json::from_value(json!([
            { "id": 1, "name": "Ada", "email": "ada@example.com", "role": "librarian" },
            { "id": 2, "name": "Bob", "email": "bob@example.com", "role": "admin" }
        ]))
        .unwrap();
        assert_eq!(users[0].role, Role::User);
        assert!(!users[0].is_admin());
        assert_eq!(users[1].role, Role::Admin);
        assert_eq!(serde_json::to_value(users[0].role).unwrap(), "user");
    }
}
