//! Events that drive the dialog

use crate::button::ButtonToken;
use crate::db::{CatalogItem, HistoryLine};

/// Events that trigger state transitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    // User events
    Start {
        display_name: String,
    },
    /// `/exit`; a Stop button arrives as `Button`
    Cancel,
    Button {
        token: ButtonToken,
        message_id: i64,
    },
    /// Button press whose token could not be decoded
    Unrecognized {
        message_id: Option<i64>,
    },
    Text {
        text: String,
    },

    // Storage outcomes
    UserReady {
        user_id: i64,
    },
    BodyPartsLoaded {
        items: Vec<CatalogItem>,
        page: usize,
        message_id: Option<i64>,
    },
    BodyPartResolved {
        body_part: Option<CatalogItem>,
        message_id: i64,
    },
    ExercisesLoaded {
        items: Vec<CatalogItem>,
        page: usize,
        message_id: i64,
    },
    ExerciseHistoryLoaded {
        /// `None` when the exercise no longer matches the session scope
        exercise: Option<CatalogItem>,
        history: Vec<HistoryLine>,
        message_id: i64,
    },
    ExerciseCreated {
        exercise: CatalogItem,
    },
    ExerciseNameTaken {
        name: String,
    },
    HistorySaved {
        message_id: i64,
    },
    StorageFailed {
        message: String,
    },
}

impl Event {
    /// Events produced by the runtime after executing an effect
    pub fn is_generated(&self) -> bool {
        !matches!(
            self,
            Event::Start { .. }
                | Event::Cancel
                | Event::Button { .. }
                | Event::Unrecognized { .. }
                | Event::Text { .. }
        )
    }
}
