//! Confirmation prompts for destructive actions.

#[cfg(test)]
use std::cell::RefCell;
#[cfg(test)]
use std::collections::VecDeque;
use std::io::{self, Write};

/// What the user is asked before something irreversible happens
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    pub title: String,
    pub text: String,
    pub confirm_label: String,
}

impl Confirmation {
    pub fn new(title: &str, text: &str, confirm_label: &str) -> Self {
        Self {
            title: title.to_string(),
            text: text.to_string(),
            confirm_label: confirm_label.to_string(),
        }
    }

    pub fn delete(what: &str) -> Self {
        Self::new(
            &format!("Delete {}? Are you sure?", what),
            "You won't be able to revert this!",
            "Yes, delete it!",
        )
    }

    pub fn return_book(book_title: &str) -> Self {
        Self::new(
            "Confirm Return",
            &format!("Are you sure you want to return \"{}\"?", book_title),
            "Yes, return it",
        )
    }

    pub fn logout() -> Self {
        Self::new(
            "Confirm Logout",
            "Are you sure you want to logout?",
            "Yes, logout",
        )
    }
}

pub trait Confirmer {
    /// True only when the user explicitly accepted.
    fn confirm(&self, confirmation: &Confirmation) -> bool;
}

/// Asks on the terminal. Non-interactive runs decline unless `--yes`.
pub struct PromptConfirmer {
    interactive: bool,
    auto_yes: bool,
    enabled: bool,
}

impl PromptConfirmer {
    pub fn new(interactive: bool, auto_yes: bool) -> Self {
        Self {
            interactive,
            auto_yes,
            enabled: true,
        }
    }

    /// `ui.confirm_destructive = false` skips the question entirely.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

impl Confirmer for PromptConfirmer {
    fn confirm(&self, confirmation: &Confirmation) -> bool {
        if !self.enabled || self.auto_yes {
            return true;
        }

        if !self.interactive {
            eprintln!(
                "Declined: {} - use --yes in --command mode",
                confirmation.title
            );
            return false;
        }

        println!("{}", confirmation.title);
        println!("  {}", confirmation.text);
        print!("{} [y/N]: ", confirmation.confirm_label);
        io::stdout().flush().ok();

        let mut input = String::new();
        if io::stdin().read_line(&mut input).is_ok() {
            let input = input.trim().to_lowercase();
            input == "y" || input == "yes"
        } else {
            false
        }
    }
}

/// Replays canned answers; records every question asked.
#[cfg(test)]
#[derive(Default)]
pub struct ScriptedConfirmer {
    answers: RefCell<VecDeque<bool>>,
    asked: RefCell<Vec<Confirmation>>,
}

#[cfg(test)]
impl ScriptedConfirmer {
    pub fn answering(answers: &[bool]) -> Self {
        Self {
            answers: RefCell::new(answers.iter().copied().collect()),
            asked: RefCell::new(Vec::new()),
        }
    }

    pub fn asked(&self) -> Vec<Confirmation> {
        self.asked.borrow().clone()
    }
}

#[cfg(test)]
impl Confirmer for ScriptedConfirmer {
    fn confirm(&self, confirmation: &Confirmation) -> bool {
        self.asked.borrow_mut().push(confirmation.clone());
        // Running out of answers counts as dismissing the dialog.
        self.answers.borrow_mut().pop_front().unwrap_or(false)
    }
}
