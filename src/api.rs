//! API client wrapper: one method per backend call.
//!
//! Every request gets the configured base URL, `Accept: application/json`
//! and, when a token is present, `Authorization: Bearer <token>`. No retries,
//! no caching, no per-call timeout override.

use crate::error::ApiError;
use crate::models::{
    ApiMessage, Book, BookId, BookUpdate, BorrowedBook, Credentials, DashboardStats, ListQuery,
    LoginResponse, NewBook, NewTransaction, NewUser, Page, PageMeta, RawPageMeta, Registration,
    Transaction, TransactionId, User, UserId, UserUpdate,
};
use crate::transcript::{record, SharedTranscript};
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::time::{Duration, Instant};

/// Backend calls, abstracted so screens can run against a fake server.
///
/// `Sync` because independent refreshes run on scoped threads.
pub trait LibraryApi: Sync {
    fn login(&self, credentials: &Credentials) -> Result<LoginResponse, ApiError>;
    fn register(&self, registration: &Registration) -> Result<(), ApiError>;
    fn logout(&self, token: Option<&str>) -> Result<(), ApiError>;
    fn current_user(&self, token: Option<&str>) -> Result<User, ApiError>;

    fn dashboard_stats(&self, token: Option<&str>) -> Result<DashboardStats, ApiError>;

    fn list_books(&self, token: Option<&str>, query: &ListQuery) -> Result<Page<Book>, ApiError>;
    fn create_book(&self, token: Option<&str>, book: &NewBook) -> Result<Book, ApiError>;
    fn update_book(
        &self,
        token: Option<&str>,
        id: BookId,
        update: &BookUpdate,
    ) -> Result<(), ApiError>;
    fn delete_book(&self, token: Option<&str>, id: BookId) -> Result<(), ApiError>;

    fn list_users(&self, token: Option<&str>, query: &ListQuery) -> Result<Page<User>, ApiError>;
    fn create_user(&self, token: Option<&str>, user: &NewUser) -> Result<User, ApiError>;
    fn update_user(
        &self,
        token: Option<&str>,
        id: UserId,
        update: &UserUpdate,
    ) -> Result<(), ApiError>;
    fn delete_user(&self, token: Option<&str>, id: UserId) -> Result<(), ApiError>;

    fn list_transactions(
        &self,
        token: Option<&str>,
        query: &ListQuery,
    ) -> Result<Page<Transaction>, ApiError>;
    fn create_transaction(
        &self,
        token: Option<&str>,
        transaction: &NewTransaction,
    ) -> Result<Transaction, ApiError>;
    fn mark_returned(&self, token: Option<&str>, id: TransactionId) -> Result<(), ApiError>;

    fn member_books(&self, token: Option<&str>) -> Result<Vec<Book>, ApiError>;
    fn borrow_book(
        &self,
        token: Option<&str>,
        id: BookId,
        due_date: NaiveDate,
    ) -> Result<ApiMessage, ApiError>;
    fn borrowed_books(&self, token: Option<&str>) -> Result<Vec<BorrowedBook>, ApiError>;
    fn return_transaction(
        &self,
        token: Option<&str>,
        id: TransactionId,
    ) -> Result<ApiMessage, ApiError>;
}

pub struct Client {
    base_url: String,
    per_page: u32,
    agent: ureq::Agent,
    verbose: bool,
    transcript: Option<SharedTranscript>,
}

impl Client {
    pub fn new(base_url: &str, per_page: u32, timeout_ms: u64) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            per_page,
            agent: ureq::AgentBuilder::new()
                .timeout(Duration::from_millis(timeout_ms))
                .build(),
            verbose: false,
            transcript: None,
        }
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_transcript(mut self, transcript: SharedTranscript) -> Self {
        self.transcript = Some(transcript);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(
        &self,
        method: &str,
        path: &str,
        token: Option<&str>,
        query: &[(&'static str, String)],
        body: Option<Value>,
    ) -> Result<Value, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        let mut req = self
            .agent
            .request(method, &url)
            .set("Accept", "application/json");
        if let Some(token) = token {
            req = req.set("Authorization", &format!("Bearer {}", token));
        }
        for (key, value) in query {
            req = req.query(key, value);
        }

        if self.verbose {
            eprintln!("[VERBOSE] {} {}", method, url);
        }
        record(self.transcript.as_ref(), |t| t.api_call(method, path));
        let started = Instant::now();

        let resp = match body {
            Some(body) => req.send_json(body),
            None => req.call(),
        };

        let elapsed = started.elapsed().as_millis() as u64;
        match resp {
            Ok(r) => {
                let status = r.status();
                self.trace_result(method, path, Some(status), true, elapsed);
                let text = r
                    .into_string()
                    .map_err(|e| ApiError::Decode(e.to_string()))?;
                if text.trim().is_empty() {
                    return Ok(Value::Null);
                }
                serde_json::from_str(&text).map_err(|e| ApiError::Decode(e.to_string()))
            }
            Err(ureq::Error::Status(code, resp)) => {
                self.trace_result(method, path, Some(code), false, elapsed);
                let body = resp.into_string().unwrap_or_default();
                Err(ApiError::from_status(code, &body))
            }
            Err(e) => {
                self.trace_result(method, path, None, false, elapsed);
                Err(ApiError::Transport(e.to_string()))
            }
        }
    }

    fn trace_result(&self, method: &str, path: &str, status: Option<u16>, ok: bool, ms: u64) {
        if self.verbose {
            eprintln!(
                "[VERBOSE] {} {} -> {} ({} ms)",
                method,
                path,
                status.map(|s| s.to_string()).unwrap_or_else(|| "no response".to_string()),
                ms
            );
        }
        record(self.transcript.as_ref(), |t| {
            t.api_result(method, path, status, ok, ms)
        });
    }

    fn get(&self, path: &str, token: Option<&str>) -> Result<Value, ApiError> {
        self.request("GET", path, Some(bearer(token)?), &[], None)
    }

    fn send<B: serde::Serialize>(
        &self,
        method: &str,
        path: &str,
        token: Option<&str>,
        body: &B,
    ) -> Result<Value, ApiError> {
        let body = serde_json::to_value(body).map_err(|e| ApiError::Decode(e.to_string()))?;
        self.request(method, path, Some(bearer(token)?), &[], Some(body))
    }

    fn list<T: DeserializeOwned>(
        &self,
        path: &str,
        token: Option<&str>,
        query: &ListQuery,
    ) -> Result<Page<T>, ApiError> {
        let body = self.request("GET", path, Some(bearer(token)?), &query.pairs(), None)?;
        parse_page(body, self.per_page)
    }
}

/// Protected endpoints are never called without a token.
fn bearer(token: Option<&str>) -> Result<&str, ApiError> {
    token.filter(|t| !t.is_empty()).ok_or(ApiError::Unauthenticated)
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, ApiError> {
    serde_json::from_value(value).map_err(|e| ApiError::Decode(e.to_string()))
}

/// Unwrap `{ "data": ... }` envelopes; pass anything else through.
pub fn unwrap_data(body: Value) -> Value {
    match body {
        Value::Object(mut map) if map.contains_key("data") => {
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    }
}

/// Paginated list: items under `data`, pagination under `meta`.
/// A bare array is accepted as a single page.
pub fn parse_page<T: DeserializeOwned>(body: Value, per_page: u32) -> Result<Page<T>, ApiError> {
    match body {
        Value::Array(_) => {
            let items: Vec<T> = decode(body)?;
            let meta = PageMeta::from_partial(None, items.len(), per_page);
            Ok(Page { items, meta })
        }
        Value::Object(mut map) => {
            let data = map
                .remove("data")
                .filter(Value::is_array)
                .ok_or_else(|| ApiError::Decode("expected a data array".to_string()))?;
            let items: Vec<T> = decode(data)?;
            let raw_meta: Option<RawPageMeta> = map
                .remove("meta")
                .and_then(|m| serde_json::from_value(m).ok());
            let meta = PageMeta::from_partial(raw_meta, items.len(), per_page);
            Ok(Page { items, meta })
        }
        _ => Err(ApiError::Decode("expected a list".to_string())),
    }
}

/// Unpaginated member lists come back as a bare array, `{books: []}` or `{data: []}`.
pub fn parse_items<T: DeserializeOwned>(body: Value) -> Result<Vec<T>, ApiError> {
    match body {
        Value::Array(_) => decode(body),
        Value::Object(mut map) => {
            let items = map
                .remove("books")
                .filter(Value::is_array)
                .or_else(|| map.remove("data").filter(Value::is_array))
                .unwrap_or_else(|| json!([]));
            decode(items)
        }
        Value::Null => Ok(Vec::new()),
        _ => Err(ApiError::Decode("expected a list".to_string())),
    }
}

/// Profile body: the user itself, or wrapped under `data` / `user`.
pub fn parse_user(body: Value) -> Result<User, ApiError> {
    match body {
        Value::Object(mut map) if !map.contains_key("email") => {
            let inner = map
                .remove("data")
                .or_else(|| map.remove("user"))
                .ok_or_else(|| ApiError::Decode("expected a user".to_string()))?;
            decode(inner)
        }
        other => decode(other),
    }
}

impl LibraryApi for Client {
    fn login(&self, credentials: &Credentials) -> Result<LoginResponse, ApiError> {
        let body = serde_json::to_value(credentials).map_err(|e| ApiError::Decode(e.to_string()))?;
        let resp = self.request("POST", "/login", None, &[], Some(body))?;
        decode(unwrap_data(resp))
    }

    fn register(&self, registration: &Registration) -> Result<(), ApiError> {
        let body =
            serde_json::to_value(registration).map_err(|e| ApiError::Decode(e.to_string()))?;
        self.request("POST", "/register", None, &[], Some(body))?;
        Ok(())
    }

    fn logout(&self, token: Option<&str>) -> Result<(), ApiError> {
        self.send("POST", "/logout", token, &json!({}))?;
        Ok(())
    }

    fn current_user(&self, token: Option<&str>) -> Result<User, ApiError> {
        parse_user(self.get("/user", token)?)
    }

    fn dashboard_stats(&self, token: Option<&str>) -> Result<DashboardStats, ApiError> {
        decode(unwrap_data(self.get("/admin/dashboard-stats", token)?))
    }

    fn list_books(&self, token: Option<&str>, query: &ListQuery) -> Result<Page<Book>, ApiError> {
        self.list("/admin/books", token, query)
    }

    fn create_book(&self, token: Option<&str>, book: &NewBook) -> Result<Book, ApiError> {
        decode(unwrap_data(self.send("POST", "/admin/books", token, book)?))
    }

    fn update_book(
        &self,
        token: Option<&str>,
        id: BookId,
        update: &BookUpdate,
    ) -> Result<(), ApiError> {
        self.send("PUT", &format!("/admin/books/{}", id), token, update)?;
        Ok(())
    }

    fn delete_book(&self, token: Option<&str>, id: BookId) -> Result<(), ApiError> {
        self.request(
            "DELETE",
            &format!("/admin/books/{}", id),
            Some(bearer(token)?),
            &[],
            None,
        )?;
        Ok(())
    }

    fn list_users(&self, token: Option<&str>, query: &ListQuery) -> Result<Page<User>, ApiError> {
        self.list("/admin/users", token, query)
    }

    fn create_user(&self, token: Option<&str>, user: &NewUser) -> Result<User, ApiError> {
        decode(unwrap_data(self.send("POST", "/admin/users", token, user)?))
    }

    fn update_user(
        &self,
        token: Option<&str>,
        id: UserId,
        update: &UserUpdate,
    ) -> Result<(), ApiError> {
        self.send("PUT", &format!("/admin/users/{}", id), token, update)?;
        Ok(())
    }

    fn delete_user(&self, token: Option<&str>, id: UserId) -> Result<(), ApiError> {
        self.request(
            "DELETE",
            &format!("/admin/users/{}", id),
            Some(bearer(token)?),
            &[],
            None,
        )?;
        Ok(())
    }

    fn list_transactions(
        &self,
        token: Option<&str>,
        query: &ListQuery,
    ) -> Result<Page<Transaction>, ApiError> {
        self.list("/admin/transactions", token, query)
    }

    fn create_transaction(
        &self,
        token: Option<&str>,
        transaction: &NewTransaction,
    ) -> Result<Transaction, ApiError> {
        decode(unwrap_data(self.send(
            "POST",
            "/admin/transactions",
            token,
            transaction,
        )?))
    }

    fn mark_returned(&self, token: Option<&str>, id: TransactionId) -> Result<(), ApiError> {
        self.send(
            "PUT",
            &format!("/admin/transactions/{}/mark-returned", id),
            token,
            &json!({}),
        )?;
        Ok(())
    }

    fn member_books(&self, token: Option<&str>) -> Result<Vec<Book>, ApiError> {
        parse_items(self.get("/books", token)?)
    }

    fn borrow_book(
        &self,
        token: Option<&str>,
        id: BookId,
        due_date: NaiveDate,
    ) -> Result<ApiMessage, ApiError> {
        let body = json!({ "due_date": due_date.format("%Y-%m-%d").to_string() });
        let resp = self.send("POST", &format!("/books/{}/borrow", id), token, &body)?;
        Ok(serde_json::from_value(resp).unwrap_or_default())
    }

    fn borrowed_books(&self, token: Option<&str>) -> Result<Vec<BorrowedBook>, ApiError> {
        parse_items(self.get("/user/borrowed-books", token)?)
    }

    fn return_transaction(
        &self,
        token: Option<&str>,
        id: TransactionId,
    ) -> Result<ApiMessage, ApiError> {
        let resp = self.send(
            "POST",
            &format!("/transactions/{}/return", id),
            token,
            &json!({}),
        )?;
        Ok(serde_json::from_value(resp).unwrap_or_default())
    }
}
