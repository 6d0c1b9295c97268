use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Transcript shared between the UI thread and background fetches
pub type SharedTranscript = Arc<Mutex<Transcript>>;

/// Append-only JSONL activity log for one client session.
/// Tokens and passwords never go in here.
pub struct Transcript {
    pub path: PathBuf,
    session_id: String,
    base_url: String,
    file: File,
}

#[derive(Serialize)]
struct Event<'a> {
    ts: DateTime<Utc>,
    session_id: &'a str,
    base_url: &'a str,
    #[serde(rename = "type")]
    event_type: &'a str,
    #[serde(flatten)]
    data: serde_json::Value,
}

impl Transcript {
    pub fn new(path: &Path, session_id: &str, base_url: &str) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            path: path.to_path_buf(),
            session_id: session_id.to_string(),
            base_url: base_url.to_string(),
            file,
        })
    }

    pub fn shared(self) -> SharedTranscript {
        Arc::new(Mutex::new(self))
    }

    pub fn log(&mut self, event_type: &str, data: serde_json::Value) -> Result<()> {
        let event = Event {
            ts: Utc::now(),
            session_id: &self.session_id,
            base_url: &self.base_url,
            event_type,
            data,
        };
        let line = serde_json::to_string(&event)?;
        writeln!(self.file, "{}", line)?;
        self.file.flush()?;
        Ok(())
    }

    pub fn api_call(&mut self, method: &str, path: &str) -> Result<()> {
        self.log(
            "api_call",
            serde_json::json!({ "method": method, "path": path }),
        )
    }

    pub fn api_result(
        &mut self,
        method: &str,
        path: &str,
        status: Option<u16>,
        ok: bool,
        duration_ms: u64,
    ) -> Result<()> {
        self.log(
            "api_result",
            serde_json::json!({
                "method": method,
                "path": path,
                "status": status,
                "ok": ok,
                "duration_ms": duration_ms,
            }),
        )
    }

    pub fn login(&mut self, email: &str, ok: bool) -> Result<()> {
        self.log("login", serde_json::json!({ "email": email, "ok": ok }))
    }

    /// `remote_ok` is whether the server acknowledged; local state is cleared either way
    pub fn logout(&mut self, remote_ok: bool) -> Result<()> {
        self.log("logout", serde_json::json!({ "remote_ok": remote_ok }))
    }

    pub fn session_restored(&mut self, user_id: i64, role: &str) -> Result<()> {
        self.log(
            "session_restored",
            serde_json::json!({ "user_id": user_id, "role": role }),
        )
    }

    pub fn session_expired(&mut self, reason: &str) -> Result<()> {
        self.log("session_expired", serde_json::json!({ "reason": reason }))
    }

    pub fn mutation(&mut self, action: &str, id: Option<i64>, ok: bool) -> Result<()> {
        self.log(
            "mutation",
            serde_json::json!({ "action": action, "id": id, "ok": ok }),
        )
    }

    pub fn refresh(&mut self, lists: &[&str]) -> Result<()> {
        self.log("refresh", serde_json::json!({ "lists": lists }))
    }

    pub fn validation_error(&mut self, field: &str, message: &str) -> Result<()> {
        self.log(
            "validation_error",
            serde_json::json!({ "field": field, "message": message }),
        )
    }

    pub fn navigation(&mut self, from: &str, to: &str, guard: &str) -> Result<()> {
        self.log(
            "navigation",
            serde_json::json!({ "from": from, "to": to, "guard": guard }),
        )
    }
}

/// Log to a shared transcript, ignoring write failures and poisoned locks.
pub fn record<F>(transcript: Option<&SharedTranscript>, f: F)
where
    F: FnOnce(&mut Transcript) -> Result<()>,
{
    if let Some(shared) = transcript {
        if let Ok(mut t) = shared.lock() {
            let _ = f(&mut t);
        }
    }
}
