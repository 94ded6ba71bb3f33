//! Runtime for executing dialogs
//!
//! Every chat gets its own worker task fed by an unbounded channel. Events
//! for one chat are handled one at a time in arrival order; different chats
//! proceed concurrently.

mod executor;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use executor::{DialogRuntime, Envelope};
pub use traits::*;

use crate::session::SessionStore;
use crate::state_machine::{DialogContext, Event, Reply};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot, RwLock};

const MIN_SWEEP_PERIOD: Duration = Duration::from_secs(1);

/// Handle to a running dialog worker
struct DialogHandle {
    event_tx: mpsc::UnboundedSender<Envelope>,
    last_event: Instant,
}

/// Manager for all dialog runtimes
pub struct DialogManager<G>
where
    G: Gateway + 'static,
{
    gateway: Arc<G>,
    sessions: Arc<SessionStore>,
    context: DialogContext,
    runtimes: RwLock<HashMap<i64, DialogHandle>>,
}

impl<G> DialogManager<G>
where
    G: Gateway + 'static,
{
    pub fn new(gateway: Arc<G>, sessions: Arc<SessionStore>, context: DialogContext) -> Self {
        Self {
            gateway,
            sessions,
            context,
            runtimes: RwLock::new(HashMap::new()),
        }
    }

    fn spawn(&self, chat_id: i64) -> DialogHandle {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let runtime = DialogRuntime::new(
            chat_id,
            self.context.clone(),
            Arc::clone(&self.gateway),
            Arc::clone(&self.sessions),
            event_rx,
        );
        tokio::spawn(runtime.run());
        DialogHandle {
            event_tx,
            last_event: Instant::now(),
        }
    }

    /// Submit an event for a chat and wait for the replies it produces
    pub async fn submit(&self, chat_id: i64, event: Event) -> Result<Vec<Reply>, String> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let envelope = Envelope::Event { event, reply_tx };

        // Enqueue while holding the lock so per-chat order matches arrival order
        {
            let mut runtimes = self.runtimes.write().await;
            let handle = runtimes
                .entry(chat_id)
                .or_insert_with(|| self.spawn(chat_id));
            handle.last_event = Instant::now();

            if let Err(mpsc::error::SendError(envelope)) = handle.event_tx.send(envelope) {
                tracing::warn!(chat_id, "Dialog runtime stopped, restarting");
                let fresh = self.spawn(chat_id);
                fresh
                    .event_tx
                    .send(envelope)
                    .map_err(|e| format!("Failed to send event: {e}"))?;
                *handle = fresh;
            }
        }

        reply_rx
            .await
            .map_err(|e| format!("Dialog runtime dropped the event: {e}"))
    }

    /// Stop workers idle for longer than `max_idle` together with their sessions
    ///
    /// Each worker drops its own session after draining its queue, so a write
    /// already in flight completes its dialog step before the session goes.
    /// Returns the number of sessions removed.
    pub async fn evict_idle(&self, max_idle: Duration) -> usize {
        // Held until every stopped worker has finished, so a new event for the
        // same chat cannot start a second worker in the meantime
        let mut runtimes = self.runtimes.write().await;
        let idle: Vec<i64> = runtimes
            .iter()
            .filter(|(_, handle)| handle.last_event.elapsed() > max_idle)
            .map(|(chat_id, _)| *chat_id)
            .collect();

        let mut evicted = 0;
        for chat_id in &idle {
            let Some(handle) = runtimes.remove(chat_id) else {
                continue;
            };
            let (done_tx, done_rx) = oneshot::channel();
            let removed = match handle.event_tx.send(Envelope::Shutdown { done_tx }) {
                Ok(()) => match done_rx.await {
                    Ok(removed) => removed,
                    // Worker died mid-event
                    Err(_) => self.sessions.remove(*chat_id).await.is_some(),
                },
                Err(_) => self.sessions.remove(*chat_id).await.is_some(),
            };
            if removed {
                evicted += 1;
            }
        }

        if !idle.is_empty() {
            tracing::info!(sessions = evicted, runtimes = idle.len(), "Evicted idle dialogs");
        }
        evicted
    }

    /// Evict idle dialogs in the background every quarter of `max_idle`
    pub fn spawn_idle_sweeper(self: &Arc<Self>, max_idle: Duration) {
        let dialogs = Arc::clone(self);
        let period = (max_idle / 4).max(MIN_SWEEP_PERIOD);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                dialogs.evict_idle(max_idle).await;
                let active = dialogs.sessions.len().await;
                tracing::debug!(active, "Session sweep");
            }
        });
    }

    /// Get the persistence gateway
    pub fn gateway(&self) -> &Arc<G> {
        &self.gateway
    }

    #[allow(dead_code)] // Used in tests
    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }
}
