//! Add/edit dialogs.
//!
//! A modal is either closed or open in one mode with one draft. Closing always
//! discards the draft, so reopening in add mode starts blank.

use crate::forms::Draft;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModalMode {
    Add,
    /// Editing the entity with this id
    Edit(i64),
}

impl ModalMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Edit(_) => "edit",
        }
    }
}

pub struct Modal<D: Draft> {
    open: Option<(ModalMode, D)>,
}

impl<D: Draft> Default for Modal<D> {
    fn default() -> Self {
        Self { open: None }
    }
}

impl<D: Draft> Modal<D> {
    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }

    pub fn mode(&self) -> Option<ModalMode> {
        self.open.as_ref().map(|(mode, _)| *mode)
    }

    pub fn open_add(&mut self) {
        self.open = Some((ModalMode::Add, D::default()));
    }

    /// Open in edit mode with a draft seeded from the current entity.
    pub fn open_edit(&mut self, id: i64, draft: D) {
        self.open = Some((ModalMode::Edit(id), draft));
    }

    pub fn draft(&self) -> Option<&D> {
        self.open.as_ref().map(|(_, draft)| draft)
    }

    pub fn draft_mut(&mut self) -> Option<&mut D> {
        self.open.as_mut().map(|(_, draft)| draft)
    }

    /// Dismiss without saving.
    pub fn cancel(&mut self) {
        self.open = None;
    }

    /// Close after a successful save.
    pub fn close(&mut self) {
        self.open = None;
    }
}
