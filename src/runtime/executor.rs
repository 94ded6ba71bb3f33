//! Dialog runtime executor

use super::traits::{Gateway, StorageError, StorageResult};
use crate::db::User;
use crate::session::SessionStore;
use crate::state_machine::{
    transition, DialogContext, Effect, Event, Reply, SessionUpdate, TransitionError,
};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

pub const SOMETHING_WENT_WRONG: &str = "Something went wrong. Send /start to begin again.";

/// Work queued for a dialog runtime
#[derive(Debug)]
pub enum Envelope {
    /// An inbound event and the channel that receives its replies
    Event {
        event: Event,
        reply_tx: oneshot::Sender<Vec<Reply>>,
    },
    /// Drop the chat's session and stop; reports whether a session existed
    Shutdown { done_tx: oneshot::Sender<bool> },
}

/// Processes one chat's events strictly in arrival order
pub struct DialogRuntime<G>
where
    G: Gateway + 'static,
{
    chat_id: i64,
    context: DialogContext,
    gateway: Arc<G>,
    sessions: Arc<SessionStore>,
    event_rx: mpsc::UnboundedReceiver<Envelope>,
}

impl<G> DialogRuntime<G>
where
    G: Gateway + 'static,
{
    pub fn new(
        chat_id: i64,
        context: DialogContext,
        gateway: Arc<G>,
        sessions: Arc<SessionStore>,
        event_rx: mpsc::UnboundedReceiver<Envelope>,
    ) -> Self {
        Self {
            chat_id,
            context,
            gateway,
            sessions,
            event_rx,
        }
    }

    pub async fn run(mut self) {
        tracing::debug!(chat_id = self.chat_id, "Starting dialog runtime");

        while let Some(envelope) = self.event_rx.recv().await {
            match envelope {
                Envelope::Event { event, reply_tx } => {
                    let replies = self.process_event(event).await;
                    if reply_tx.send(replies).is_err() {
                        tracing::debug!(chat_id = self.chat_id, "Caller went away before replies");
                    }
                }
                Envelope::Shutdown { done_tx } => {
                    let removed = self.sessions.remove(self.chat_id).await.is_some();
                    if done_tx.send(removed).is_err() {
                        tracing::debug!(chat_id = self.chat_id, "Eviction caller went away");
                    }
                    break;
                }
            }
        }

        tracing::debug!(chat_id = self.chat_id, "Dialog runtime stopped");
    }

    /// Run an event and every event its effects generate
    pub async fn process_event(&self, event: Event) -> Vec<Reply> {
        let mut replies = Vec::new();
        let mut events_to_process = VecDeque::from([event]);

        while let Some(current_event) = events_to_process.pop_front() {
            let session = self.sessions.get(self.chat_id).await;
            let state = session.as_ref().map(|s| s.state);
            let generated = current_event.is_generated();

            let result = match transition(session.as_ref(), &self.context, current_event) {
                Ok(r) => r,
                Err(e) => {
                    match &e {
                        TransitionError::SessionExpired => {
                            tracing::debug!(chat_id = self.chat_id, "Event without a session");
                            replies.push(Reply::text(e.to_string()));
                        }
                        TransitionError::InvalidTransition(reason) => {
                            tracing::warn!(
                                chat_id = self.chat_id,
                                generated,
                                reason = %reason,
                                "Rejected transition"
                            );
                            replies.push(Reply::text(SOMETHING_WENT_WRONG));
                        }
                    }
                    break;
                }
            };

            match result.session {
                SessionUpdate::Keep => {}
                SessionUpdate::Replace(next) => {
                    if state != Some(next.state) {
                        tracing::info!(
                            chat_id = self.chat_id,
                            from = ?state,
                            to = ?next.state,
                            "Dialog state change"
                        );
                    }
                    self.sessions.put(self.chat_id, next).await;
                }
                SessionUpdate::Clear => {
                    if self.sessions.remove(self.chat_id).await.is_some() {
                        tracing::info!(chat_id = self.chat_id, from = ?state, "Dialog finished");
                    }
                }
            }

            for effect in result.effects {
                if let Some(generated_event) = self.execute_effect(effect, &mut replies).await {
                    events_to_process.push_back(generated_event);
                }
            }
        }

        replies
    }

    /// Execute an effect and optionally return a generated event
    async fn execute_effect(&self, effect: Effect, replies: &mut Vec<Reply>) -> Option<Event> {
        let outcome = match effect {
            Effect::Send(reply) => {
                replies.push(reply);
                return None;
            }

            Effect::EnsureUser { display_name } => self
                .ensure_user(&display_name)
                .await
                .map(|user| Event::UserReady { user_id: user.id }),

            Effect::LoadBodyParts { page, message_id } => self
                .gateway
                .list_body_parts()
                .await
                .map(|items| Event::BodyPartsLoaded {
                    items,
                    page,
                    message_id,
                }),

            Effect::ResolveBodyPart {
                body_part_id,
                message_id,
            } => self
                .gateway
                .find_body_part(body_part_id)
                .await
                .map(|body_part| Event::BodyPartResolved {
                    body_part,
                    message_id,
                }),

            Effect::LoadExercises {
                user_id,
                body_part_id,
                page,
                message_id,
            } => self
                .gateway
                .list_exercises(user_id, body_part_id)
                .await
                .map(|items| Event::ExercisesLoaded {
                    items,
                    page,
                    message_id,
                }),

            Effect::LoadExerciseHistory {
                user_id,
                body_part_id,
                exercise_id,
                message_id,
            } => {
                self.load_exercise_history(user_id, body_part_id, exercise_id, message_id)
                    .await
            }

            Effect::CreateExercise {
                user_id,
                body_part_id,
                name,
            } => match self
                .gateway
                .create_exercise(user_id, body_part_id, &name)
                .await
            {
                Ok(exercise) => {
                    tracing::info!(chat_id = self.chat_id, exercise_id = exercise.id, "Created exercise");
                    Ok(Event::ExerciseCreated {
                        exercise: exercise.as_item(),
                    })
                }
                Err(StorageError::UniquenessViolation(_)) => Ok(Event::ExerciseNameTaken { name }),
                Err(e) => Err(e),
            },

            Effect::SaveHistory { entry, message_id } => {
                self.gateway.create_history_entry(&entry).await.map(|saved| {
                    tracing::info!(
                        chat_id = self.chat_id,
                        history_id = saved.id,
                        exercise_id = saved.exercise_id,
                        "Saved history entry"
                    );
                    Event::HistorySaved { message_id }
                })
            }
        };

        Some(outcome.unwrap_or_else(|e| {
            tracing::error!(chat_id = self.chat_id, error = %e, "Storage call failed");
            Event::StorageFailed {
                message: e.to_string(),
            }
        }))
    }

    /// Find the persisted user for this chat, creating it on first contact
    async fn ensure_user(&self, display_name: &str) -> StorageResult<User> {
        if let Some(user) = self.gateway.find_user_by_external_id(self.chat_id).await? {
            return Ok(user);
        }

        match self.gateway.create_user(self.chat_id, display_name).await {
            Ok(user) => {
                tracing::info!(chat_id = self.chat_id, user_id = user.id, "Registered user");
                Ok(user)
            }
            // Another writer registered the same identity first
            Err(StorageError::UniquenessViolation(_)) => self
                .gateway
                .find_user_by_external_id(self.chat_id)
                .await?
                .ok_or_else(|| StorageError::Transient("user vanished after insert".to_string())),
            Err(e) => Err(e),
        }
    }

    async fn load_exercise_history(
        &self,
        user_id: i64,
        body_part_id: i64,
        exercise_id: i64,
        message_id: i64,
    ) -> StorageResult<Event> {
        let exercise = self
            .gateway
            .find_exercise(user_id, body_part_id, exercise_id)
            .await?;
        let history = match &exercise {
            Some(exercise) => {
                self.gateway
                    .list_recent_history(user_id, exercise.id, self.context.history_limit)
                    .await?
            }
            None => vec![],
        };
        Ok(Event::ExerciseHistoryLoaded {
            exercise,
            history,
            message_id,
        })
    }
}
