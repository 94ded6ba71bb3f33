//! Dialog state types

use crate::db::CatalogItem;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;

/// Position of a user in the logging dialog
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DialogState {
    /// No dialog in progress; never stored in a session
    #[default]
    Idle,

    /// Body part menu shown
    AwaitingBodyPartChoice,

    /// Body part chosen; browsing or about to browse exercises
    AwaitingExerciseChoice,

    /// Waiting for the name of a new exercise
    AwaitingNewExerciseName,

    /// Exercise chosen; waiting for the note text
    AwaitingNote,

    /// Note drafted; waiting for Yes/No
    AwaitingNoteConfirmation,
}

impl DialogState {
    #[allow(dead_code)] // Used in tests
    pub fn is_active(self) -> bool {
        !matches!(self, DialogState::Idle)
    }
}

/// Scratch state for one dialog, not persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Surrogate id of the persisted user
    pub user_id: i64,
    pub body_part: Option<CatalogItem>,
    pub exercise: Option<CatalogItem>,
    pub draft_note: Option<String>,
    pub state: DialogState,
}

impl Session {
    /// Fresh session at the body part menu
    pub fn new(user_id: i64) -> Self {
        Self {
            user_id,
            body_part: None,
            exercise: None,
            draft_note: None,
            state: DialogState::AwaitingBodyPartChoice,
        }
    }

    /// Back to the body part menu, keeping the user
    pub fn restart(&self) -> Self {
        Self::new(self.user_id)
    }

    pub fn with_state(mut self, state: DialogState) -> Self {
        self.state = state;
        self
    }
}

/// Static parameters of the dialog
#[derive(Debug, Clone)]
pub struct DialogContext {
    pub page_size: NonZeroUsize,
    pub history_limit: usize,
}

impl DialogContext {
    pub fn new(page_size: NonZeroUsize, history_limit: usize) -> Self {
        Self {
            page_size,
            history_limit,
        }
    }
}

impl Default for DialogContext {
    fn default() -> Self {
        Self {
            page_size: NonZeroUsize::new(6).unwrap_or(NonZeroUsize::MIN),
            history_limit: 10,
        }
    }
}
