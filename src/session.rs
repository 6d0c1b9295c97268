//! Session context: the one place that knows who is logged in.
//!
//! Token and user are written only by the auth lifecycle methods on
//! [`SessionContext`] (`initialize`, `login`, `logout`, `expire`). Everything
//! else gets a read-only [`Session`].

use crate::api::LibraryApi;
use crate::error::ApiError;
use crate::models::{Credentials, Registration, Role, User};
use anyhow::{Context as _, Result};
use std::cell::RefCell;
use std::path::{Path, PathBuf};

/// Read-only snapshot of the authentication state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    token: Option<String>,
    user: Option<User>,
    loading: bool,
}

impl Session {
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn role(&self) -> Option<Role> {
        self.user.as_ref().map(|u| u.role)
    }

    /// True until the startup profile fetch settles.
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }
}

/// Persistence for the bearer token across restarts
pub trait TokenStore {
    fn load(&self) -> Option<String>;
    fn save(&self, token: &str) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

/// Token kept in a single file, e.g. `~/.libra/token`
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Option<String> {
        std::fs::read_to_string(&self.path)
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    fn save(&self, token: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, token)
            .with_context(|| format!("Failed to write token file {}", self.path.display()))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))?;
        }
        Ok(())
    }

    /// Remove the file; if that is refused, blank it so `load` finds nothing.
    fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => std::fs::write(&self.path, "").map_err(|_| {
                anyhow::Error::new(e)
                    .context(format!("Failed to remove token file {}", self.path.display()))
            }),
        }
    }
}

/// Token held only for the life of the process
#[derive(Default)]
pub struct MemoryTokenStore {
    token: RefCell<Option<String>>,
}

impl MemoryTokenStore {
    pub fn with_token(token: &str) -> Self {
        Self {
            token: RefCell::new(Some(token.to_string())),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Option<String> {
        self.token.borrow().clone()
    }

    fn save(&self, token: &str) -> Result<()> {
        *self.token.borrow_mut() = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.token.borrow_mut() = None;
        Ok(())
    }
}

/// How the startup profile fetch settled
#[derive(Debug, Clone, PartialEq)]
pub enum InitOutcome {
    /// No persisted token; nothing fetched
    Anonymous,
    Restored(User),
    /// Persisted token rejected or unusable; cleared silently
    Expired(String),
}

pub struct SessionContext {
    state: Session,
    store: Box<dyn TokenStore>,
    store_error: Option<anyhow::Error>,
}

impl SessionContext {
    /// Start with whatever token the store holds. `loading` stays true until
    /// [`SessionContext::initialize`] runs.
    pub fn new(store: Box<dyn TokenStore>) -> Self {
        let token = store.load();
        Self {
            state: Session {
                token,
                user: None,
                loading: true,
            },
            store,
            store_error: None,
        }
    }

    pub fn session(&self) -> &Session {
        &self.state
    }

    /// The last token persistence failure, if any. The in-memory session is
    /// already updated; only the copy on disk is out of step.
    pub fn take_store_error(&mut self) -> Option<anyhow::Error> {
        self.store_error.take()
    }

    /// Fetch the profile behind a persisted token. Failure of any kind is
    /// treated as an expired session, never as a user-facing error.
    pub fn initialize(&mut self, api: &dyn LibraryApi) -> InitOutcome {
        let outcome = match self.state.token.clone() {
            None => InitOutcome::Anonymous,
            Some(token) => match api.current_user(Some(&token)) {
                Ok(user) => {
                    self.state.user = Some(user.clone());
                    InitOutcome::Restored(user)
                }
                Err(err) => {
                    self.clear_local();
                    InitOutcome::Expired(err.to_string())
                }
            },
        };
        self.state.loading = false;
        outcome
    }

    /// Authenticate and keep the token. Errors go back to the caller for display.
    pub fn login(
        &mut self,
        api: &dyn LibraryApi,
        email: &str,
        password: &str,
    ) -> Result<&User, ApiError> {
        let resp = api.login(&Credentials {
            email: email.trim().to_string(),
            password: password.to_string(),
        })?;
        // A session that only lives in memory is still usable.
        if let Err(e) = self.store.save(&resp.token) {
            self.store_error = Some(e);
        }
        self.state.token = Some(resp.token);
        self.state.loading = false;
        Ok(self.state.user.insert(resp.user))
    }

    /// Create an account. Does not log in.
    pub fn register(
        &self,
        api: &dyn LibraryApi,
        registration: &Registration,
    ) -> Result<(), ApiError> {
        api.register(registration)
    }

    /// Tell the server (best effort), then clear local state no matter what.
    pub fn logout(&mut self, api: &dyn LibraryApi) -> Result<(), ApiError> {
        let remote = match self.state.token.as_deref() {
            Some(token) => api.logout(Some(token)),
            None => Ok(()),
        };
        self.clear_local();
        remote
    }

    /// Drop the session after the server rejected the token (401).
    pub fn expire(&mut self) {
        self.clear_local();
    }

    fn clear_local(&mut self) {
        self.state.token = None;
        self.state.user = None;
        self.state.loading = false;
        if let Err(e) = self.store.clear() {
            self.store_error = Some(e);
        }
    }
}
