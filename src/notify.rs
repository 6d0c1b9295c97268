//! Transient feedback: success and error toasts.

use std::cell::RefCell;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Success,
    Error,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: Level,
    pub message: String,
}

pub trait Notifier {
    fn notify(&self, level: Level, message: &str);

    fn success(&self, message: &str) {
        self.notify(Level::Success, message);
    }

    fn error(&self, message: &str) {
        self.notify(Level::Error, message);
    }
}

/// Prints each notice as it happens and keeps them for the navbar bell.
pub struct TerminalNotifier {
    history: RefCell<Vec<Notice>>,
    unread: RefCell<usize>,
    quiet: bool,
}

const HISTORY_LIMIT: usize = 50;

impl TerminalNotifier {
    pub fn new() -> Self {
        Self {
            history: RefCell::new(Vec::new()),
            unread: RefCell::new(0),
            quiet: false,
        }
    }

    /// Keep history but print nothing (used by tests and `--command` piping).
    #[allow(dead_code)]
    pub fn quiet() -> Self {
        Self {
            quiet: true,
            ..Self::new()
        }
    }

    pub fn unread(&self) -> usize {
        *self.unread.borrow()
    }

    /// Most recent first. Reading marks everything as seen.
    pub fn take_recent(&self, limit: usize) -> Vec<Notice> {
        *self.unread.borrow_mut() = 0;
        self.history
            .borrow()
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }
}

impl Notifier for TerminalNotifier {
    fn notify(&self, level: Level, message: &str) {
        if !self.quiet {
            match level {
                Level::Success => println!("✓ {}", message),
                Level::Error => eprintln!("✗ {}", message),
            }
        }
        let mut history = self.history.borrow_mut();
        history.push(Notice {
            level,
            message: message.to_string(),
        });
        if history.len() > HISTORY_LIMIT {
            history.remove(0);
        }
        *self.unread.borrow_mut() += 1;
    }
}

/// Collects notices for assertions.
#[cfg(test)]
#[derive(Default)]
pub struct CollectingNotifier {
    notices: RefCell<Vec<Notice>>,
}

#[cfg(test)]
impl CollectingNotifier {
    pub fn last(&self) -> Option<Notice> {
        self.notices.borrow().last().cloned()
    }

    pub fn errors(&self) -> Vec<String> {
        self.notices
            .borrow()
            .iter()
            .filter(|n| n.level == Level::Error)
            .map(|n| n.message.clone())
            .collect()
    }

    pub fn successes(&self) -> Vec<String> {
        self.notices
            .borrow()
            .iter()
            .filter(|n| n.level == Level::Success)
            .map(|n| n.message.clone())
            .collect()
    }
}

#[cfg(test)]
impl Notifier for CollectingNotifier {
    fn notify(&self, level: Level, message: &str) {
        self.notices.borrow_mut().push(Notice {
            level,
            message: message.to_string(),
        });
    }
}
