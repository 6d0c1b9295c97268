//! Form state controllers.
//!
//! Each form owns a draft mirroring the editable fields of its entity. Fields
//! are set by name, the way input change events fill a form, and `validate`
//! turns the draft into a request payload or a [`ValidationError`] before
//! anything touches the network.

use crate::models::{
    Book, BookUpdate, BookId, Credentials, NewBook, NewTransaction, NewUser, Registration, Role,
    User, UserId, UserUpdate,
};
use chrono::{Duration, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use std::cell::Cell;
use std::rc::Rc;

pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_BORROW_DAYS: i64 = 7;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex"));

/// Client-side rejection of a draft; no request is made
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &str, message: &str) -> Self {
        Self {
            field: field.to_string(),
            message: message.to_string(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ValidationError {}

/// A draft entity whose fields can be set by name
pub trait Draft: Default {
    fn set_field(&mut self, field: &str, value: &str) -> Result<(), ValidationError>;

    /// Current field values, in form order, for display.
    fn fields(&self) -> Vec<(&'static str, String)>;
}

fn unknown_field(field: &str) -> ValidationError {
    ValidationError::new(field, &format!("Unknown field: {}", field))
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email.trim())
}

/// Per-action busy flag. While a guard is alive the submit control is
/// disabled; dropping the guard re-enables it whatever the outcome.
#[derive(Debug, Clone, Default)]
pub struct BusyFlag(Rc<Cell<bool>>);

pub struct BusyGuard(Rc<Cell<bool>>);

impl BusyFlag {
    pub fn is_busy(&self) -> bool {
        self.0.get()
    }

    /// `None` when an action is already in flight.
    pub fn begin(&self) -> Option<BusyGuard> {
        if self.0.replace(true) {
            return None;
        }
        Some(BusyGuard(Rc::clone(&self.0)))
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

// ============================================================================
// Authentication
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthMode {
    #[default]
    Login,
    Register,
}

impl AuthMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::Register => "register",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AuthForm {
    pub mode: AuthMode,
    pub name: String,
    pub email: String,
    pub password: String,
    pub password_confirmation: String,
    pub role: Role,
}

pub enum AuthSubmission {
    Login(Credentials),
    Register(Registration),
}

impl Draft for AuthForm {
    fn set_field(&mut self, field: &str, value: &str) -> Result<(), ValidationError> {
        match field {
            "name" => self.name = value.to_string(),
            "email" => self.email = value.trim().to_string(),
            "password" => self.password = value.to_string(),
            "password_confirmation" | "confirm" => self.password_confirmation = value.to_string(),
            "role" => {
                self.role = Role::from_str(value)
                    .ok_or_else(|| ValidationError::new("role", "Role must be user or admin"))?
            }
            _ => return Err(unknown_field(field)),
        }
        Ok(())
    }

    fn fields(&self) -> Vec<(&'static str, String)> {
        let mask = |s: &str| "*".repeat(s.chars().count());
        let mut fields = Vec::new();
        if self.mode == AuthMode::Register {
            fields.push(("name", self.name.clone()));
            fields.push(("role", self.role.as_str().to_string()));
        }
        fields.push(("email", self.email.clone()));
        fields.push(("password", mask(&self.password)));
        if self.mode == AuthMode::Register {
            fields.push(("password_confirmation", mask(&self.password_confirmation)));
        }
        fields
    }
}

impl AuthForm {
    /// Switch between login and register, keeping what was typed.
    pub fn switch_mode(&mut self, mode: AuthMode) {
        self.mode = mode;
        self.password.clear();
        self.password_confirmation.clear();
    }

    pub fn validate(&self) -> Result<AuthSubmission, ValidationError> {
        if self.email.is_empty() || self.password.is_empty() {
            return Err(ValidationError::new(
                "email",
                "Please fill in all required fields",
            ));
        }
        if !is_valid_email(&self.email) {
            return Err(ValidationError::new(
                "email",
                "Please enter a valid email address",
            ));
        }

        match self.mode {
            AuthMode::Login => Ok(AuthSubmission::Login(Credentials {
                email: self.email.clone(),
                password: self.password.clone(),
            })),
            AuthMode::Register => {
                if self.name.trim().is_empty() {
                    return Err(ValidationError::new(
                        "name",
                        "Please fill in all required fields",
                    ));
                }
                if self.password.chars().count() < MIN_PASSWORD_LEN {
                    return Err(ValidationError::new(
                        "password",
                        "Password must be at least 8 characters",
                    ));
                }
                if self.password != self.password_confirmation {
                    return Err(ValidationError::new(
                        "password_confirmation",
                        "Passwords don't match!",
                    ));
                }
                Ok(AuthSubmission::Register(Registration {
                    name: self.name.trim().to_string(),
                    email: self.email.clone(),
                    password: self.password.clone(),
                    password_confirmation: self.password_confirmation.clone(),
                    role: self.role,
                }))
            }
        }
    }
}

// ============================================================================
// Books
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct BookDraft {
    pub title: String,
    pub author: String,
    pub genre: String,
    pub description: String,
    pub total_copies: String,
    pub publisher: String,
}

impl Default for BookDraft {
    fn default() -> Self {
        Self {
            title: String::new(),
            author: String::new(),
            genre: String::new(),
            description: String::new(),
            total_copies: "1".to_string(),
            publisher: String::new(),
        }
    }
}

impl Draft for BookDraft {
    fn set_field(&mut self, field: &str, value: &str) -> Result<(), ValidationError> {
        let value = value.to_string();
        match field {
            "title" => self.title = value,
            "author" => self.author = value,
            "genre" => self.genre = value,
            "description" => self.description = value,
            "total_copies" | "copies" => self.total_copies = value.trim().to_string(),
            "publisher" => self.publisher = value,
            _ => return Err(unknown_field(field)),
        }
        Ok(())
    }

    fn fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("title", self.title.clone()),
            ("author", self.author.clone()),
            ("genre", self.genre.clone()),
            ("description", self.description.clone()),
            ("total_copies", self.total_copies.clone()),
            ("publisher", self.publisher.clone()),
        ]
    }
}

impl BookDraft {
    pub fn from_book(book: &Book) -> Self {
        Self {
            title: book.title.clone(),
            author: book.author.clone(),
            genre: book.genre.clone(),
            description: book.description.clone().unwrap_or_default(),
            total_copies: book.total_copies.to_string(),
            publisher: book.publisher.clone().unwrap_or_default(),
        }
    }

    fn checked(&self) -> Result<i64, ValidationError> {
        if self.title.trim().is_empty()
            || self.author.trim().is_empty()
            || self.genre.trim().is_empty()
        {
            return Err(ValidationError::new(
                "title",
                "Please fill in all required fields",
            ));
        }
        match self.total_copies.trim().parse::<i64>() {
            Ok(n) if n >= 1 => Ok(n),
            _ => Err(ValidationError::new(
                "total_copies",
                "Number of copies must be at least 1",
            )),
        }
    }

    /// New books start with every copy on the shelf.
    pub fn to_new_book(&self) -> Result<NewBook, ValidationError> {
        let total = self.checked()?;
        let description = self.description.trim();
        let publisher = self.publisher.trim();
        Ok(NewBook {
            title: self.title.trim().to_string(),
            author: self.author.trim().to_string(),
            genre: self.genre.trim().to_string(),
            description: if description.is_empty() {
                "No description provided".to_string()
            } else {
                description.to_string()
            },
            total_copies: total,
            available_copies: total,
            publisher: if publisher.is_empty() {
                "Unknown".to_string()
            } else {
                publisher.to_string()
            },
        })
    }

    pub fn to_update(&self) -> Result<BookUpdate, ValidationError> {
        let total = self.checked()?;
        Ok(BookUpdate {
            title: Some(self.title.trim().to_string()),
            author: Some(self.author.trim().to_string()),
            genre: Some(self.genre.trim().to_string()),
            description: Some(self.description.trim().to_string()),
            total_copies: Some(total),
            publisher: Some(self.publisher.trim().to_string()),
        })
    }
}

// ============================================================================
// Users
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserDraft {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}

impl Draft for UserDraft {
    fn set_field(&mut self, field: &str, value: &str) -> Result<(), ValidationError> {
        match field {
            "name" => self.name = value.to_string(),
            "email" => self.email = value.trim().to_string(),
            "password" => self.password = value.to_string(),
            "role" => {
                self.role = Role::from_str(value)
                    .ok_or_else(|| ValidationError::new("role", "Role must be user or admin"))?
            }
            _ => return Err(unknown_field(field)),
        }
        Ok(())
    }

    fn fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("name", self.name.clone()),
            ("email", self.email.clone()),
            ("password", "*".repeat(self.password.chars().count())),
            ("role", self.role.as_str().to_string()),
        ]
    }
}

impl UserDraft {
    /// Edit drafts start from the user; the password stays blank.
    pub fn from_user(user: &User) -> Self {
        Self {
            name: user.name.clone(),
            email: user.email.clone(),
            password: String::new(),
            role: user.role,
        }
    }

    fn check_identity(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() || self.email.is_empty() {
            return Err(ValidationError::new(
                "name",
                "Please fill in all required fields",
            ));
        }
        if !is_valid_email(&self.email) {
            return Err(ValidationError::new(
                "email",
                "Please enter a valid email address",
            ));
        }
        Ok(())
    }

    fn check_password(&self) -> Result<(), ValidationError> {
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ValidationError::new(
                "password",
                "Password must be at least 8 characters",
            ));
        }
        Ok(())
    }

    pub fn to_new_user(&self) -> Result<NewUser, ValidationError> {
        self.check_identity()?;
        self.check_password()?;
        Ok(NewUser {
            name: self.name.trim().to_string(),
            email: self.email.clone(),
            password: self.password.clone(),
            role: self.role,
        })
    }

    /// A blank password leaves the current one unchanged.
    pub fn to_update(&self) -> Result<UserUpdate, ValidationError> {
        self.check_identity()?;
        let password = if self.password.is_empty() {
            None
        } else {
            self.check_password()?;
            Some(self.password.clone())
        };
        Ok(UserUpdate {
            name: Some(self.name.trim().to_string()),
            email: Some(self.email.clone()),
            password,
            role: Some(self.role),
        })
    }
}

// ============================================================================
// Transactions and borrowing
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionDraft {
    pub book_id: String,
    pub user_id: String,
    pub due_date: String,
}

impl Draft for TransactionDraft {
    fn set_field(&mut self, field: &str, value: &str) -> Result<(), ValidationError> {
        let value = value.trim().to_string();
        match field {
            "book_id" | "book" => self.book_id = value,
            "user_id" | "user" | "member" => self.user_id = value,
            "due_date" | "due" => self.due_date = value,
            _ => return Err(unknown_field(field)),
        }
        Ok(())
    }

    fn fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("book_id", self.book_id.clone()),
            ("user_id", self.user_id.clone()),
            ("due_date", self.due_date.clone()),
        ]
    }
}

impl TransactionDraft {
    pub fn to_new_transaction(&self, today: NaiveDate) -> Result<NewTransaction, ValidationError> {
        let book_id = self.book_id.parse::<BookId>().ok().filter(|id| *id > 0);
        let user_id = self.user_id.parse::<UserId>().ok().filter(|id| *id > 0);
        let (Some(book_id), Some(user_id)) = (book_id, user_id) else {
            return Err(ValidationError::new(
                "book_id",
                "Please select a book and a member",
            ));
        };
        let due_date = parse_date(&self.due_date, today).ok_or_else(|| {
            ValidationError::new("due_date", "Please enter a valid due date")
        })?;
        if due_date < today {
            return Err(ValidationError::new(
                "due_date",
                "Return date cannot be in the past",
            ));
        }
        Ok(NewTransaction {
            book_id,
            user_id,
            due_date,
        })
    }
}

/// Accepts `YYYY-MM-DD`, `today`, or `+N` days from today.
pub fn parse_date(input: &str, today: NaiveDate) -> Option<NaiveDate> {
    let input = input.trim();
    if input.eq_ignore_ascii_case("today") {
        return Some(today);
    }
    if let Some(days) = input.strip_prefix('+') {
        let days: i64 = days.parse().ok()?;
        return today.checked_add_signed(Duration::try_days(days)?);
    }
    NaiveDate::parse_from_str(input, "%Y-%m-%d").ok()
}

/// A borrow due date must fall within today..=today + 7 days.
pub fn validate_due_date(
    due_date: Option<NaiveDate>,
    today: NaiveDate,
) -> Result<NaiveDate, ValidationError> {
    let due_date =
        due_date.ok_or_else(|| ValidationError::new("due_date", "Please select a return date"))?;
    if due_date < today {
        return Err(ValidationError::new(
            "due_date",
            "Return date cannot be in the past",
        ));
    }
    if due_date > today + Duration::days(MAX_BORROW_DAYS) {
        return Err(ValidationError::new(
            "due_date",
            "Maximum borrowing period is 1 week",
        ));
    }
    Ok(due_date)
}
