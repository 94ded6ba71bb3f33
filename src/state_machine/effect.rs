//! Effects produced by state transitions

use crate::button::Keyboard;
use crate::db::NewHistoryEntry;
use serde::Serialize;

/// Outbound message for the chat transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Reply {
    Text {
        text: String,
    },
    /// Message with inline buttons; edits `edit_message_id` in place when set
    Menu {
        text: String,
        keyboard: Keyboard,
        #[serde(skip_serializing_if = "Option::is_none")]
        edit_message_id: Option<i64>,
    },
    RemoveKeyboard {
        message_id: i64,
    },
    DeleteMessage {
        message_id: i64,
    },
    Document {
        file_name: String,
        content: String,
    },
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Reply::Text { text: text.into() }
    }

    pub fn menu(text: impl Into<String>, keyboard: Keyboard, edit_message_id: Option<i64>) -> Self {
        Reply::Menu {
            text: text.into(),
            keyboard,
            edit_message_id,
        }
    }
}

/// Effects to be executed after state transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Find or create the persisted user for this chat identity
    EnsureUser { display_name: String },

    LoadBodyParts {
        page: usize,
        message_id: Option<i64>,
    },

    ResolveBodyPart { body_part_id: i64, message_id: i64 },

    LoadExercises {
        user_id: i64,
        body_part_id: i64,
        page: usize,
        message_id: i64,
    },

    /// Look up the exercise within the session scope plus its recent notes
    LoadExerciseHistory {
        user_id: i64,
        body_part_id: i64,
        exercise_id: i64,
        message_id: i64,
    },

    CreateExercise {
        user_id: i64,
        body_part_id: i64,
        name: String,
    },

    SaveHistory {
        entry: NewHistoryEntry,
        message_id: i64,
    },

    /// Emit a reply to the user
    Send(Reply),
}

impl Effect {
    pub fn send_text(text: impl Into<String>) -> Self {
        Effect::Send(Reply::text(text))
    }

    pub fn send_menu(text: impl Into<String>, keyboard: Keyboard, edit: Option<i64>) -> Self {
        Effect::Send(Reply::menu(text, keyboard, edit))
    }

    #[allow(dead_code)] // Used in tests
    pub fn is_storage(&self) -> bool {
        !matches!(self, Effect::Send(_))
    }
}
