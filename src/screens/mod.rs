pub mod admin;
pub mod auth;
pub mod member;

use crate::api::LibraryApi;
use crate::confirm::Confirmer;
use crate::error::ApiError;
use crate::forms::ValidationError;
use crate::notify::Notifier;
use crate::refresh::{ListKind, Mutation};
use crate::session::Session;
use crate::transcript::{record, SharedTranscript};
use thiserror::Error;

/// Everything a screen handler may touch besides its own state.
/// The session is read-only here; only the auth lifecycle writes it.
pub struct Deps<'a> {
    pub api: &'a dyn LibraryApi,
    pub session: &'a Session,
    pub notifier: &'a dyn Notifier,
    pub confirmer: &'a dyn Confirmer,
    pub transcript: Option<&'a SharedTranscript>,
}

impl<'a> Deps<'a> {
    pub fn token(&self) -> Option<&'a str> {
        self.session.token()
    }

    /// Show an API failure with the operation's fallback text.
    fn api_failed(&self, err: ApiError, fallback: &str) -> ActionError {
        self.notifier.error(&err.user_message(fallback));
        ActionError::Api(err)
    }

    fn invalid(&self, err: ValidationError) -> ActionError {
        record(self.transcript, |t| t.validation_error(&err.field, &err.message));
        self.notifier.error(&err.message);
        ActionError::Validation(err)
    }

    fn mutated(&self, mutation: Mutation, id: Option<i64>, ok: bool) {
        record(self.transcript, |t| t.mutation(mutation.as_str(), id, ok));
    }

    fn refreshed(&self, lists: &[ListKind]) {
        let names = crate::refresh::names(lists);
        record(self.transcript, |t| t.refresh(&names));
    }
}

/// Why a handler did not complete
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Api(#[from] ApiError),

    /// The user dismissed the confirmation; nothing was sent.
    #[error("Cancelled")]
    Declined,

    #[error("Another request is still in progress")]
    Busy,

    #[error("{0}")]
    Rejected(String),
}

impl ActionError {
    /// True when the session must be dropped.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ActionError::Api(e) if e.is_unauthorized())
    }
}

pub type ActionResult = Result<(), ActionError>;

/// Keep the first failure of a batch of reloads, preferring a 401.
fn first_error(acc: Option<ActionError>, next: ActionResult) -> Option<ActionError> {
    match (acc, next) {
        (None, Err(e)) => Some(e),
        (Some(prev), Err(e)) if !prev.is_unauthorized() && e.is_unauthorized() => Some(e),
        (acc, _) => acc,
    }
}
