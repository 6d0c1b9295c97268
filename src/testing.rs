//! In-memory stand-in for the library API, used by unit tests.
//!
//! Behaves like the real server for the parts the client depends on: bearer
//! token checks, role checks, copy counts on borrow/return, transaction status
//! transitions and pagination metadata.

use crate::api::LibraryApi;
use crate::error::ApiError;
use crate::session::TokenStore;
use crate::models::{
    ApiMessage, Book, BookId, BookUpdate, BorrowedBook, Credentials, DashboardStats, ListQuery,
    LoginResponse, NewBook, NewTransaction, NewUser, Page, PageMeta, Registration, Role,
    Transaction, TransactionId, TransactionStatus, User, UserId, UserUpdate,
};
use chrono::{Local, NaiveDate};
use std::collections::HashMap;
use std::sync::Mutex;

pub const PASSWORD: &str = "password123";
pub const ADMIN_EMAIL: &str = "admin@library.test";
pub const MEMBER_EMAIL: &str = "member@library.test";

/// Token store whose writes always fail, like a read-only home directory.
pub struct BrokenTokenStore;

impl TokenStore for BrokenTokenStore {
    fn load(&self) -> Option<String> {
        None
    }

    fn save(&self, _token: &str) -> anyhow::Result<()> {
        Err(anyhow::anyhow!("token store is read-only"))
    }

    fn clear(&self) -> anyhow::Result<()> {
        Err(anyhow::anyhow!("token store is read-only"))
    }
}

struct FakeTransaction {
    id: TransactionId,
    user_id: UserId,
    book_id: BookId,
    borrowed_date: String,
    due_date: NaiveDate,
    returned_date: Option<String>,
}

struct State {
    users: Vec<(User, String)>,
    tokens: HashMap<String, UserId>,
    books: Vec<Book>,
    transactions: Vec<FakeTransaction>,
    next_id: i64,
    failures: Vec<(String, u16)>,
    requests: Vec<String>,
}

pub struct FakeApi {
    state: Mutex<State>,
}

fn status(code: u16, message: &str) -> ApiError {
    ApiError::Status {
        status: code,
        message: Some(message.to_string()),
    }
}

impl FakeApi {
    /// One admin, one member, no books.
    pub fn new() -> Self {
        let user = |id, name: &str, email: &str, role| User {
            id,
            name: name.to_string(),
            email: email.to_string(),
            role,
            created_at: Some("2026-01-15T09:30:00Z".to_string()),
            profile_image: None,
        };
        Self {
            state: Mutex::new(State {
                users: vec![
                    (user(1, "Head Librarian", ADMIN_EMAIL, Role::Admin), PASSWORD.to_string()),
                    (user(2, "Regular Reader", MEMBER_EMAIL, Role::User), PASSWORD.to_string()),
                ],
                tokens: HashMap::new(),
                books: Vec::new(),
                transactions: Vec::new(),
                next_id: 100,
                failures: Vec::new(),
                requests: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Mint a valid token for a seeded account without going through login.
    pub fn issue_token(&self, email: &str) -> String {
        let mut state = self.lock();
        let id = state
            .users
            .iter()
            .find(|(u, _)| u.email == email)
            .map(|(u, _)| u.id)
            .unwrap_or(0);
        let token = format!("token-{}-{}", id, state.tokens.len());
        state.tokens.insert(token.clone(), id);
        token
    }

    pub fn add_book(&self, title: &str, total: i64, available: i64) -> BookId {
        let mut state = self.lock();
        state.next_id += 1;
        let id = state.next_id;
        state.books.push(Book {
            id,
            title: title.to_string(),
            author: "Author".to_string(),
            genre: "Genre".to_string(),
            description: None,
            total_copies: total,
            available_copies: available,
            publisher: None,
            created_at: None,
            updated_at: None,
        });
        id
    }

    pub fn book(&self, id: BookId) -> Option<Book> {
        self.lock().books.iter().find(|b| b.id == id).cloned()
    }

    /// The next request whose "METHOD /path" starts with `route` fails with `code`.
    pub fn fail_next(&self, route: &str, code: u16) {
        self.lock().failures.push((route.to_string(), code));
    }

    pub fn calls(&self) -> usize {
        self.lock().requests.len()
    }

    pub fn requests(&self) -> Vec<String> {
        self.lock().requests.clone()
    }

    pub fn count(&self, route: &str) -> usize {
        self.lock()
            .requests
            .iter()
            .filter(|r| r.starts_with(route))
            .count()
    }

    fn enter(&self, route: String) -> Result<std::sync::MutexGuard<'_, State>, ApiError> {
        let mut state = self.lock();
        state.requests.push(route.clone());
        if let Some(pos) = state.failures.iter().position(|(r, _)| route.starts_with(r.as_str())) {
            let (_, code) = state.failures.remove(pos);
            return Err(status(code, "Simulated failure"));
        }
        Ok(state)
    }

    fn authed(
        &self,
        route: String,
        token: Option<&str>,
        admin: bool,
    ) -> Result<(std::sync::MutexGuard<'_, State>, User), ApiError> {
        let state = self.enter(route)?;
        let user = token
            .and_then(|t| state.tokens.get(t))
            .and_then(|id| state.users.iter().find(|(u, _)| u.id == *id))
            .map(|(u, _)| u.clone())
            .ok_or_else(|| status(401, "Unauthenticated."))?;
        if admin && user.role != Role::Admin {
            return Err(status(403, "This action is unauthorized."));
        }
        Ok((state, user))
    }
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn view(&self, tx: &FakeTransaction) -> Transaction {
        let user_name = self
            .users
            .iter()
            .find(|(u, _)| u.id == tx.user_id)
            .map(|(u, _)| u.name.clone())
            .unwrap_or_else(|| "Unknown User".to_string());
        let book_title = self
            .books
            .iter()
            .find(|b| b.id == tx.book_id)
            .map(|b| b.title.clone())
            .unwrap_or_else(|| "Unknown Book".to_string());
        Transaction {
            id: tx.id,
            user_name,
            book_title,
            borrowed_date: Some(tx.borrowed_date.clone()),
            due_date: Some(tx.due_date.format("%Y-%m-%d").to_string()),
            returned_date: tx.returned_date.clone(),
            status: if tx.returned_date.is_some() {
                TransactionStatus::Returned
            } else {
                TransactionStatus::Borrowed
            },
        }
    }

    fn checkout(&mut self, user_id: UserId, book_id: BookId, due: NaiveDate) -> Result<TransactionId, ApiError> {
        let book = self
            .books
            .iter_mut()
            .find(|b| b.id == book_id)
            .ok_or_else(|| status(404, "Book not found"))?;
        if book.available_copies <= 0 {
            return Err(status(400, "No copies available"));
        }
        book.available_copies -= 1;
        let id = self.next_id();
        self.transactions.push(FakeTransaction {
            id,
            user_id,
            book_id,
            borrowed_date: Local::now().date_naive().format("%Y-%m-%d").to_string(),
            due_date: due,
            returned_date: None,
        });
        Ok(id)
    }

    fn check_in(&mut self, id: TransactionId, owner: Option<UserId>) -> Result<(), ApiError> {
        let tx = self
            .transactions
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| status(404, "Transaction not found"))?;
        if let Some(owner) = owner {
            if tx.user_id != owner {
                return Err(status(403, "Forbidden"));
            }
        }
        if tx.returned_date.is_some() {
            return Err(status(400, "Book already returned"));
        }
        tx.returned_date = Some(Local::now().date_naive().format("%Y-%m-%d").to_string());
        let book_id = tx.book_id;
        if let Some(book) = self.books.iter_mut().find(|b| b.id == book_id) {
            book.available_copies = (book.available_copies + 1).min(book.total_copies);
        }
        Ok(())
    }
}

fn paginate<T: Clone>(items: Vec<T>, query: &ListQuery) -> Page<T> {
    let per_page = query.per_page.max(1) as usize;
    let total = items.len();
    let last_page = total.div_ceil(per_page).max(1);
    let start = (query.page.max(1) as usize - 1) * per_page;
    Page {
        items: items.into_iter().skip(start).take(per_page).collect(),
        meta: PageMeta {
            current_page: query.page,
            last_page: last_page as u32,
            per_page: per_page as u32,
            total: total as u64,
        },
    }
}

fn matches(search: &Option<String>, fields: &[&str]) -> bool {
    match search {
        None => true,
        Some(term) => {
            let term = term.to_lowercase();
            fields.iter().any(|f| f.to_lowercase().contains(&term))
        }
    }
}

impl LibraryApi for FakeApi {
    fn login(&self, credentials: &Credentials) -> Result<LoginResponse, ApiError> {
        let mut state = self.enter("POST /login".to_string())?;
        let user = state
            .users
            .iter()
            .find(|(u, p)| u.email == credentials.email && *p == credentials.password)
            .map(|(u, _)| u.clone())
            .ok_or_else(|| status(401, "Invalid credentials"))?;
        let token = format!("token-{}-{}", user.id, state.tokens.len());
        state.tokens.insert(token.clone(), user.id);
        Ok(LoginResponse { token, user })
    }

    fn register(&self, registration: &Registration) -> Result<(), ApiError> {
        let mut state = self.enter("POST /register".to_string())?;
        if state.users.iter().any(|(u, _)| u.email == registration.email) {
            return Err(status(422, "The email has already been taken."));
        }
        let id = state.next_id();
        state.users.push((
            User {
                id,
                name: registration.name.clone(),
                email: registration.email.clone(),
                role: registration.role,
                created_at: None,
                profile_image: None,
            },
            registration.password.clone(),
        ));
        Ok(())
    }

    fn logout(&self, token: Option<&str>) -> Result<(), ApiError> {
        let (mut state, _) = self.authed("POST /logout".to_string(), token, false)?;
        if let Some(token) = token {
            state.tokens.remove(token);
        }
        Ok(())
    }

    fn current_user(&self, token: Option<&str>) -> Result<User, ApiError> {
        let (state, user) = self.authed("GET /user".to_string(), token, false)?;
        drop(state);
        Ok(user)
    }

    fn dashboard_stats(&self, token: Option<&str>) -> Result<DashboardStats, ApiError> {
        let (state, _) = self.authed("GET /admin/dashboard-stats".to_string(), token, true)?;
        let today = Local::now().date_naive();
        Ok(DashboardStats {
            books_count: state.books.len() as i64,
            users_count: state.users.len() as i64,
            transactions_count: state.transactions.len() as i64,
            overdue_count: state
                .transactions
                .iter()
                .filter(|t| t.returned_date.is_none() && t.due_date < today)
                .count() as i64,
            recent_transactions: state.transactions.iter().rev().take(5).map(|t| state.view(t)).collect(),
        })
    }

    fn list_books(&self, token: Option<&str>, query: &ListQuery) -> Result<Page<Book>, ApiError> {
        let (state, _) = self.authed("GET /admin/books".to_string(), token, true)?;
        let items = state
            .books
            .iter()
            .filter(|b| matches(&query.search, &[&b.title, &b.author, &b.genre]))
            .cloned()
            .collect();
        Ok(paginate(items, query))
    }

    fn create_book(&self, token: Option<&str>, book: &NewBook) -> Result<Book, ApiError> {
        let (mut state, _) = self.authed("POST /admin/books".to_string(), token, true)?;
        let id = state.next_id();
        let created = Book {
            id,
            title: book.title.clone(),
            author: book.author.clone(),
            genre: book.genre.clone(),
            description: Some(book.description.clone()),
            total_copies: book.total_copies,
            available_copies: book.available_copies.min(book.total_copies),
            publisher: Some(book.publisher.clone()),
            created_at: None,
            updated_at: None,
        };
        state.books.push(created.clone());
        Ok(created)
    }

    fn update_book(&self, token: Option<&str>, id: BookId, update: &BookUpdate) -> Result<(), ApiError> {
        let (mut state, _) = self.authed(format!("PUT /admin/books/{}", id), token, true)?;
        let book = state
            .books
            .iter_mut()
            .find(|b| b.id == id)
            .ok_or_else(|| status(404, "Book not found"))?;
        if let Some(v) = &update.title {
            book.title = v.clone();
        }
        if let Some(v) = &update.author {
            book.author = v.clone();
        }
        if let Some(v) = &update.genre {
            book.genre = v.clone();
        }
        if let Some(v) = &update.description {
            book.description = Some(v.clone());
        }
        if let Some(v) = &update.publisher {
            book.publisher = Some(v.clone());
        }
        if let Some(total) = update.total_copies {
            let out = book.total_copies - book.available_copies;
            if total < out {
                return Err(status(422, "Total copies cannot be less than borrowed copies"));
            }
            book.total_copies = total;
            book.available_copies = total - out;
        }
        Ok(())
    }

    fn delete_book(&self, token: Option<&str>, id: BookId) -> Result<(), ApiError> {
        let (mut state, _) = self.authed(format!("DELETE /admin/books/{}", id), token, true)?;
        let before = state.books.len();
        state.books.retain(|b| b.id != id);
        if state.books.len() == before {
            return Err(status(404, "Book not found"));
        }
        Ok(())
    }

    fn list_users(&self, token: Option<&str>, query: &ListQuery) -> Result<Page<User>, ApiError> {
        let (state, _) = self.authed("GET /admin/users".to_string(), token, true)?;
        let items = state
            .users
            .iter()
            .map(|(u, _)| u)
            .filter(|u| matches(&query.search, &[&u.name, &u.email]))
            .cloned()
            .collect();
        Ok(paginate(items, query))
    }

    fn create_user(&self, token: Option<&str>, user: &NewUser) -> Result<User, ApiError> {
        let (mut state, _) = self.authed("POST /admin/users".to_string(), token, true)?;
        if state.users.iter().any(|(u, _)| u.email == user.email) {
            return Err(status(422, "The email has already been taken."));
        }
        let id = state.next_id();
        let created = User {
            id,
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
            created_at: None,
            profile_image: None,
        };
        state.users.push((created.clone(), user.password.clone()));
        Ok(created)
    }

    fn update_user(&self, token: Option<&str>, id: UserId, update: &UserUpdate) -> Result<(), ApiError> {
        let (mut state, _) = self.authed(format!("PUT /admin/users/{}", id), token, true)?;
        let (user, password) = state
            .users
            .iter_mut()
            .find(|(u, _)| u.id == id)
            .ok_or_else(|| status(404, "User not found"))?;
        if let Some(v) = &update.name {
            user.name = v.clone();
        }
        if let Some(v) = &update.email {
            user.email = v.clone();
        }
        if let Some(v) = update.role {
            user.role = v;
        }
        if let Some(v) = &update.password {
            *password = v.clone();
        }
        Ok(())
    }

    fn delete_user(&self, token: Option<&str>, id: UserId) -> Result<(), ApiError> {
        let (mut state, _) = self.authed(format!("DELETE /admin/users/{}", id), token, true)?;
        let before = state.users.len();
        state.users.retain(|(u, _)| u.id != id);
        if state.users.len() == before {
            return Err(status(404, "User not found"));
        }
        Ok(())
    }

    fn list_transactions(&self, token: Option<&str>, query: &ListQuery) -> Result<Page<Transaction>, ApiError> {
        let (state, _) = self.authed("GET /admin/transactions".to_string(), token, true)?;
        let items = state
            .transactions
            .iter()
            .map(|t| state.view(t))
            .filter(|t| matches(&query.search, &[&t.user_name, &t.book_title]))
            .collect();
        Ok(paginate(items, query))
    }

    fn create_transaction(&self, token: Option<&str>, transaction: &NewTransaction) -> Result<Transaction, ApiError> {
        let (mut state, _) = self.authed("POST /admin/transactions".to_string(), token, true)?;
        if !state.users.iter().any(|(u, _)| u.id == transaction.user_id) {
            return Err(status(404, "User not found"));
        }
        let id = state.checkout(transaction.user_id, transaction.book_id, transaction.due_date)?;
        let tx = state
            .transactions
            .iter()
            .find(|t| t.id == id)
            .map(|t| state.view(t))
            .ok_or_else(|| status(500, "lost transaction"))?;
        Ok(tx)
    }

    fn mark_returned(&self, token: Option<&str>, id: TransactionId) -> Result<(), ApiError> {
        let (mut state, _) = self.authed(
            format!("PUT /admin/transactions/{}/mark-returned", id),
            token,
            true,
        )?;
        state.check_in(id, None)
    }

    fn member_books(&self, token: Option<&str>) -> Result<Vec<Book>, ApiError> {
        let (state, _) = self.authed("GET /books".to_string(), token, false)?;
        Ok(state.books.clone())
    }

    fn borrow_book(&self, token: Option<&str>, id: BookId, due_date: NaiveDate) -> Result<ApiMessage, ApiError> {
        let (mut state, user) = self.authed(format!("POST /books/{}/borrow", id), token, false)?;
        state.checkout(user.id, id, due_date)?;
        Ok(ApiMessage {
            success: Some(true),
            message: Some("Book borrowed successfully".to_string()),
        })
    }

    fn borrowed_books(&self, token: Option<&str>) -> Result<Vec<BorrowedBook>, ApiError> {
        let (state, user) = self.authed("GET /user/borrowed-books".to_string(), token, false)?;
        Ok(state
            .transactions
            .iter()
            .filter(|t| t.user_id == user.id)
            .filter_map(|t| {
                let book = state.books.iter().find(|b| b.id == t.book_id)?;
                Some(BorrowedBook {
                    book_id: book.id,
                    transaction_id: t.id,
                    title: book.title.clone(),
                    author: book.author.clone(),
                    genre: book.genre.clone(),
                    available_copies: book.available_copies,
                    total_copies: book.total_copies,
                    status: if t.returned_date.is_some() {
                        TransactionStatus::Returned
                    } else {
                        TransactionStatus::Borrowed
                    },
                    due_date: Some(t.due_date.format("%Y-%m-%d").to_string()),
                    borrowed_at: Some(t.borrowed_date.clone()),
                    returned_date: t.returned_date.clone(),
                    unique_key: String::new(),
                })
            })
            .collect())
    }

    fn return_transaction(&self, token: Option<&str>, id: TransactionId) -> Result<ApiMessage, ApiError> {
        let (mut state, user) = self.authed(format!("POST /transactions/{}/return", id), token, false)?;
        state.check_in(id, Some(user.id))?;
        Ok(ApiMessage {
            success: Some(true),
            message: Some("Book returned successfully".to_string()),
        })
    }
}
