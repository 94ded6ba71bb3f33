//! In-memory session store
//!
//! One dialog session per chat identity. Sessions are scratch state and are
//! lost on restart; a user mid-dialog is asked to send /start again. Idle
//! expiry belongs to the chat's dialog runtime, which removes its own session.

use crate::state_machine::Session;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Sessions keyed by the chat's external user id
#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<i64, Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, chat_id: i64) -> Option<Session> {
        self.sessions.read().await.get(&chat_id).cloned()
    }

    /// Insert or replace the session for a chat
    pub async fn put(&self, chat_id: i64, session: Session) {
        self.sessions.write().await.insert(chat_id, session);
    }

    /// Remove the session; a missing session is not an error
    pub async fn remove(&self, chat_id: i64) -> Option<Session> {
        self.sessions.write().await.remove(&chat_id)
    }

    #[allow(dead_code)] // API completeness
    pub async fn get_or_create(&self, chat_id: i64, user_id: i64) -> Session {
        self.sessions
            .write()
            .await
            .entry(chat_id)
            .or_insert_with(|| Session::new(user_id))
            .clone()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}
