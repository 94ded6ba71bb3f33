//! Pure state transition function
//!
//! Storage reads and writes are requested as effects; their outcomes come
//! back as generated events that finish the step. A failed effect therefore
//! never leaves the session half-updated.

use super::effect::Reply;
use super::{DialogContext, DialogState, Effect, Event, Session};
use crate::button::{Button, ButtonToken, Domain, Keyboard};
use crate::db::{CatalogItem, HistoryLine, NewHistoryEntry, MAX_TEXT_LEN};
use crate::pagination::paginate;
use chrono::Local;
use thiserror::Error;

pub const DIALOG_CLOSED: &str = "Dialog closed. Send /start to log another exercise.";
pub const NOTHING_TO_CANCEL: &str = "No active dialog.";
pub const STORAGE_FAILED: &str = "Could not complete the action, please try again.";
pub const COULD_NOT_PROCESS: &str = "Could not process that, here is where you are:";
pub const NO_BODY_PARTS: &str = "No body parts are configured yet.";

/// What the runtime should do with the stored session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionUpdate {
    Keep,
    Replace(Session),
    Clear,
}

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub session: SessionUpdate,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(session: SessionUpdate) -> Self {
        Self {
            session,
            effects: vec![],
        }
    }

    pub fn keep() -> Self {
        Self::new(SessionUpdate::Keep)
    }

    pub fn replace(session: Session) -> Self {
        Self::new(SessionUpdate::Replace(session))
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Your dialog has expired. Send /start to begin again.")]
    SessionExpired,
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

/// Pure transition function
///
/// `session` is `None` while the user is idle.
pub fn transition(
    session: Option<&Session>,
    context: &DialogContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match event {
        // /start works from anywhere and always replaces the session
        Event::Start { display_name } => {
            Ok(TransitionResult::keep().with_effect(Effect::EnsureUser { display_name }))
        }
        Event::UserReady { user_id } => Ok(TransitionResult::replace(Session::new(user_id))
            .with_effect(Effect::LoadBodyParts {
                page: 0,
                message_id: None,
            })),

        // Cancellation is accepted in every state, including Idle
        Event::Cancel => Ok(cancel(session, None)),
        Event::Button {
            token: ButtonToken::Stop,
            message_id,
        } => Ok(cancel(session, Some(message_id))),

        Event::StorageFailed { .. } => {
            Ok(TransitionResult::keep().with_effect(Effect::send_text(STORAGE_FAILED)))
        }

        event => {
            let session = session.ok_or(TransitionError::SessionExpired)?;
            in_dialog(session, context, event)
        }
    }
}

#[allow(clippy::too_many_lines)] // One arm per row of the dialog table
fn in_dialog(
    session: &Session,
    context: &DialogContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    use DialogState as S;

    match (session.state, event) {
        // ============================================================
        // Body part menu
        // ============================================================
        (
            S::AwaitingBodyPartChoice,
            Event::Button {
                token:
                    ButtonToken::Page {
                        domain: Domain::BodyPart,
                        page,
                    },
                message_id,
            },
        ) => Ok(TransitionResult::keep().with_effect(Effect::LoadBodyParts {
            page,
            message_id: Some(message_id),
        })),

        (
            S::AwaitingBodyPartChoice,
            Event::BodyPartsLoaded {
                items,
                page,
                message_id,
            },
        ) => Ok(TransitionResult::keep().with_effect(render_body_parts(
            context, &items, page, message_id,
        ))),

        (
            S::AwaitingBodyPartChoice,
            Event::Button {
                token:
                    ButtonToken::Item {
                        domain: Domain::BodyPart,
                        id,
                    },
                message_id,
            },
        ) => Ok(TransitionResult::keep().with_effect(Effect::ResolveBodyPart {
            body_part_id: id,
            message_id,
        })),

        (
            S::AwaitingBodyPartChoice,
            Event::BodyPartResolved {
                body_part: Some(body_part),
                message_id,
            },
        ) => {
            let menu = exercise_choice_menu(&body_part, Some(message_id));
            let next = Session {
                body_part: Some(body_part),
                exercise: None,
                draft_note: None,
                ..session.clone()
            }
            .with_state(S::AwaitingExerciseChoice);
            Ok(TransitionResult::replace(next).with_effect(menu))
        }

        // Unknown id (stale or forged button): show the menu again
        (
            S::AwaitingBodyPartChoice,
            Event::BodyPartResolved {
                body_part: None,
                message_id,
            },
        ) => Ok(TransitionResult::keep().with_effect(Effect::LoadBodyParts {
            page: 0,
            message_id: Some(message_id),
        })),

        // ============================================================
        // Exercise menu
        // ============================================================
        (
            S::AwaitingExerciseChoice,
            Event::Button {
                token: ButtonToken::ChooseExercise,
                message_id,
            },
        ) => load_exercises(session, 0, message_id),

        (
            S::AwaitingExerciseChoice,
            Event::Button {
                token:
                    ButtonToken::Page {
                        domain: Domain::Exercise,
                        page,
                    },
                message_id,
            },
        ) => load_exercises(session, page, message_id),

        (
            S::AwaitingExerciseChoice,
            Event::ExercisesLoaded {
                items,
                page,
                message_id,
            },
        ) => {
            let body_part = selected(session.body_part.as_ref(), "body part")?;
            Ok(TransitionResult::keep().with_effect(render_exercises(
                context, body_part, &items, page, message_id,
            )))
        }

        (
            S::AwaitingExerciseChoice,
            Event::Button {
                token:
                    ButtonToken::Item {
                        domain: Domain::Exercise,
                        id,
                    },
                message_id,
            },
        ) => {
            let body_part = selected(session.body_part.as_ref(), "body part")?;
            Ok(
                TransitionResult::keep().with_effect(Effect::LoadExerciseHistory {
                    user_id: session.user_id,
                    body_part_id: body_part.id,
                    exercise_id: id,
                    message_id,
                }),
            )
        }

        (
            S::AwaitingExerciseChoice,
            Event::ExerciseHistoryLoaded {
                exercise: Some(exercise),
                history,
                message_id,
            },
        ) => {
            let prompt = note_prompt(&exercise, &history, Some(message_id));
            let next = Session {
                exercise: Some(exercise),
                ..session.clone()
            }
            .with_state(S::AwaitingNote);
            Ok(TransitionResult::replace(next).with_effect(prompt))
        }

        (
            S::AwaitingExerciseChoice,
            Event::ExerciseHistoryLoaded {
                exercise: None,
                message_id,
                ..
            },
        ) => {
            let body_part = selected(session.body_part.as_ref(), "body part")?;
            Ok(TransitionResult::keep().with_effect(exercise_choice_menu(body_part, Some(message_id))))
        }

        (
            S::AwaitingExerciseChoice,
            Event::Button {
                token: ButtonToken::CreateExercise,
                message_id,
            },
        ) => {
            let body_part = selected(session.body_part.as_ref(), "body part")?;
            Ok(TransitionResult::replace(
                session.clone().with_state(S::AwaitingNewExerciseName),
            )
            .with_effect(name_prompt(body_part, Some(message_id))))
        }

        // Back returns to the body part menu without a new user lookup
        (
            S::AwaitingBodyPartChoice | S::AwaitingExerciseChoice,
            Event::Button {
                token: ButtonToken::Back,
                message_id,
            },
        ) => Ok(TransitionResult::replace(session.restart()).with_effects([
            Effect::Send(Reply::DeleteMessage { message_id }),
            Effect::LoadBodyParts {
                page: 0,
                message_id: None,
            },
        ])),

        // ============================================================
        // New exercise
        // ============================================================
        (S::AwaitingNewExerciseName, Event::Text { text }) => match clean_text(&text) {
            Ok(name) => {
                let body_part = selected(session.body_part.as_ref(), "body part")?;
                Ok(TransitionResult::keep().with_effect(Effect::CreateExercise {
                    user_id: session.user_id,
                    body_part_id: body_part.id,
                    name,
                }))
            }
            Err(message) => Ok(TransitionResult::keep().with_effect(Effect::send_text(message))),
        },

        (S::AwaitingNewExerciseName, Event::ExerciseCreated { exercise }) => {
            let prompt = note_prompt(&exercise, &[], None);
            let next = Session {
                exercise: Some(exercise),
                ..session.clone()
            }
            .with_state(S::AwaitingNote);
            Ok(TransitionResult::replace(next).with_effect(prompt))
        }

        (S::AwaitingNewExerciseName, Event::ExerciseNameTaken { name }) => {
            let body_part = selected(session.body_part.as_ref(), "body part")?;
            Ok(TransitionResult::keep().with_effect(Effect::send_text(format!(
                "\"{name}\" already exists under {}. Try another name:",
                body_part.name
            ))))
        }

        // ============================================================
        // Note and confirmation
        // ============================================================
        (S::AwaitingNote, Event::Text { text }) => match clean_text(&text) {
            Ok(note) => {
                let exercise = selected(session.exercise.as_ref(), "exercise")?;
                let prompt = confirm_prompt(exercise, &note, None);
                let next = Session {
                    draft_note: Some(note),
                    ..session.clone()
                }
                .with_state(S::AwaitingNoteConfirmation);
                Ok(TransitionResult::replace(next).with_effect(prompt))
            }
            Err(message) => Ok(TransitionResult::keep().with_effect(Effect::send_text(message))),
        },

        (
            S::AwaitingNoteConfirmation,
            Event::Button {
                token: ButtonToken::ConfirmYes,
                message_id,
            },
        ) => {
            let body_part = selected(session.body_part.as_ref(), "body part")?;
            let exercise = selected(session.exercise.as_ref(), "exercise")?;
            let note = session
                .draft_note
                .clone()
                .ok_or_else(|| TransitionError::InvalidTransition("session has no draft note".into()))?;
            Ok(TransitionResult::keep().with_effect(Effect::SaveHistory {
                entry: NewHistoryEntry {
                    user_id: session.user_id,
                    body_part_id: body_part.id,
                    exercise_id: exercise.id,
                    note,
                },
                message_id,
            }))
        }

        // The write committed; only now does the session go away
        (S::AwaitingNoteConfirmation, Event::HistorySaved { message_id }) => {
            let exercise = selected(session.exercise.as_ref(), "exercise")?;
            let note = session.draft_note.as_deref().unwrap_or_default();
            Ok(TransitionResult::new(SessionUpdate::Clear).with_effects([
                Effect::Send(Reply::RemoveKeyboard { message_id }),
                Effect::send_text(format!("Saved {}: {note}", exercise.name)),
            ]))
        }

        (
            S::AwaitingNoteConfirmation,
            Event::Button {
                token: ButtonToken::ConfirmNo,
                message_id,
            },
        ) => {
            let exercise = selected(session.exercise.as_ref(), "exercise")?;
            let next = Session {
                draft_note: None,
                ..session.clone()
            }
            .with_state(S::AwaitingNote);
            Ok(TransitionResult::replace(next)
                .with_effect(Effect::Send(Reply::RemoveKeyboard { message_id }))
                .with_effect(note_prompt(exercise, &[], None)))
        }

        // ============================================================
        // Malformed and stale input
        // ============================================================
        (_, Event::Unrecognized { message_id }) => Ok(TransitionResult::keep()
            .with_effect(Effect::send_text(COULD_NOT_PROCESS))
            .with_effects(canonical(session, message_id)?)),

        // Keyboard from an earlier step: redraw the current one in its place
        (_, Event::Button { message_id, .. }) => {
            Ok(TransitionResult::keep().with_effects(canonical(session, Some(message_id))?))
        }

        (_, Event::Text { .. }) => Ok(TransitionResult::keep()
            .with_effect(Effect::send_text(COULD_NOT_PROCESS))
            .with_effects(canonical(session, None)?)),

        (state, event) => Err(TransitionError::InvalidTransition(format!(
            "{event:?} in {state:?}"
        ))),
    }
}

fn cancel(session: Option<&Session>, message_id: Option<i64>) -> TransitionResult {
    let (update, text) = if session.is_some() {
        (SessionUpdate::Clear, DIALOG_CLOSED)
    } else {
        (SessionUpdate::Keep, NOTHING_TO_CANCEL)
    };

    TransitionResult::new(update)
        .with_effects(message_id.map(|message_id| Effect::Send(Reply::RemoveKeyboard { message_id })))
        .with_effect(Effect::send_text(text))
}

/// Effects that redraw the menu of the session's current state
fn canonical(session: &Session, message_id: Option<i64>) -> Result<Vec<Effect>, TransitionError> {
    let effect = match session.state {
        DialogState::Idle => return Err(TransitionError::SessionExpired),
        DialogState::AwaitingBodyPartChoice => Effect::LoadBodyParts { page: 0, message_id },
        DialogState::AwaitingExerciseChoice => {
            exercise_choice_menu(selected(session.body_part.as_ref(), "body part")?, message_id)
        }
        DialogState::AwaitingNewExerciseName => {
            name_prompt(selected(session.body_part.as_ref(), "body part")?, message_id)
        }
        DialogState::AwaitingNote => {
            note_prompt(selected(session.exercise.as_ref(), "exercise")?, &[], message_id)
        }
        DialogState::AwaitingNoteConfirmation => {
            let exercise = selected(session.exercise.as_ref(), "exercise")?;
            let note = session.draft_note.as_deref().unwrap_or_default();
            confirm_prompt(exercise, note, message_id)
        }
    };
    Ok(vec![effect])
}

fn load_exercises(
    session: &Session,
    page: usize,
    message_id: i64,
) -> Result<TransitionResult, TransitionError> {
    let body_part = selected(session.body_part.as_ref(), "body part")?;
    Ok(TransitionResult::keep().with_effect(Effect::LoadExercises {
        user_id: session.user_id,
        body_part_id: body_part.id,
        page,
        message_id,
    }))
}

fn selected<'a>(
    item: Option<&'a CatalogItem>,
    what: &str,
) -> Result<&'a CatalogItem, TransitionError> {
    item.ok_or_else(|| TransitionError::InvalidTransition(format!("session has no {what}")))
}

/// Trimmed, non-empty text that fits the storage column
fn clean_text(text: &str) -> Result<String, String> {
    let text = text.trim();
    if text.is_empty() {
        return Err("Please send some text.".to_string());
    }
    if text.chars().count() > MAX_TEXT_LEN {
        return Err(format!("Please keep it to {MAX_TEXT_LEN} characters or fewer."));
    }
    Ok(text.to_string())
}

// ============================================================================
// Rendering
// ============================================================================

fn page_title(title: &str, page: usize, total_pages: usize) -> String {
    if total_pages > 1 {
        format!("{title} (page {}/{total_pages}):", page + 1)
    } else {
        format!("{title}:")
    }
}

fn render_body_parts(
    context: &DialogContext,
    items: &[CatalogItem],
    page: usize,
    message_id: Option<i64>,
) -> Effect {
    if items.is_empty() {
        return Effect::send_text(NO_BODY_PARTS);
    }
    // Out-of-range requests fall back to the first page
    let mut rendered = paginate(items, page, context.page_size);
    if rendered.is_empty() {
        rendered = paginate(items, 0, context.page_size);
    }
    Effect::send_menu(
        page_title("Choose a body part", rendered.page, rendered.total_pages),
        rendered.keyboard(Domain::BodyPart),
        message_id,
    )
}

fn render_exercises(
    context: &DialogContext,
    body_part: &CatalogItem,
    items: &[CatalogItem],
    page: usize,
    message_id: i64,
) -> Effect {
    if items.is_empty() {
        return Effect::send_menu(
            format!("No exercises under {} yet.", body_part.name),
            vec![
                vec![Button::new("Create exercise", ButtonToken::CreateExercise)],
                back_stop_row(),
            ],
            Some(message_id),
        );
    }
    let mut rendered = paginate(items, page, context.page_size);
    if rendered.is_empty() {
        rendered = paginate(items, 0, context.page_size);
    }
    Effect::send_menu(
        page_title(
            &format!("{}: choose an exercise", body_part.name),
            rendered.page,
            rendered.total_pages,
        ),
        rendered.keyboard(Domain::Exercise),
        Some(message_id),
    )
}

fn back_stop_row() -> Vec<Button> {
    vec![
        Button::new("Back", ButtonToken::Back),
        Button::new("Stop", ButtonToken::Stop),
    ]
}

fn stop_keyboard() -> Keyboard {
    vec![vec![Button::new("Stop", ButtonToken::Stop)]]
}

fn exercise_choice_menu(body_part: &CatalogItem, message_id: Option<i64>) -> Effect {
    Effect::send_menu(
        format!("{}: pick an existing exercise or create a new one.", body_part.name),
        vec![
            vec![Button::new("Choose exercise", ButtonToken::ChooseExercise)],
            vec![Button::new("Create exercise", ButtonToken::CreateExercise)],
            back_stop_row(),
        ],
        message_id,
    )
}

fn name_prompt(body_part: &CatalogItem, message_id: Option<i64>) -> Effect {
    Effect::send_menu(
        format!("Type the name of the new {} exercise:", body_part.name),
        stop_keyboard(),
        message_id,
    )
}

fn note_prompt(exercise: &CatalogItem, history: &[HistoryLine], message_id: Option<i64>) -> Effect {
    let mut text = exercise.name.clone();
    if history.is_empty() {
        text.push_str("\n\nNo previous records.");
    } else {
        text.push_str("\n\nPrevious records:");
        for line in history {
            let day = line.created_at.with_timezone(&Local).format("%d.%m.%Y");
            text.push_str(&format!("\n{day}  {}", line.note));
        }
    }
    text.push_str("\n\nSend today's note, e.g. 100(8)-90(7):");
    Effect::send_menu(text, stop_keyboard(), message_id)
}

fn confirm_prompt(exercise: &CatalogItem, note: &str, message_id: Option<i64>) -> Effect {
    Effect::send_menu(
        format!("Save \"{note}\" for {}?", exercise.name),
        vec![vec![
            Button::new("Yes", ButtonToken::ConfirmYes),
            Button::new("No", ButtonToken::ConfirmNo),
        ]],
        message_id,
    )
}
