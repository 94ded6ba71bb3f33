//! Classifies inbound chat updates
//!
//! Commands, button presses and free text become dialog events for the
//! per-user runtime. `/today_stat` and `/export` are read-only and answered
//! here without touching the session.

use crate::button::ButtonToken;
use crate::db::{HistoryExportRow, TodayRecord};
use crate::runtime::{DialogManager, Gateway};
use crate::state_machine::transition::STORAGE_FAILED;
use crate::state_machine::{Event, Reply};
use std::sync::Arc;

pub const NO_RECORDS_TODAY: &str = "No records today.";
pub const ACCESS_DENIED: &str = "Access denied.";
pub const EXPORT_FILE_NAME: &str = "history_export.json";

/// Inbound update from the chat transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Message { text: String },
    ButtonPress { data: String, message_id: i64 },
}

/// Identity of the sender
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatUser {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Exit,
    TodayStat,
    Export { phrase: String },
    Unknown(String),
}

impl Command {
    /// Parse a slash command; `None` for plain text
    pub fn parse(text: &str) -> Option<Self> {
        let body = text.trim().strip_prefix('/')?;
        let (word, rest) = body
            .split_once(char::is_whitespace)
            .unwrap_or((body, ""));
        // "/start@my_bot" addresses a bot by name in group chats
        let word = word.split('@').next().unwrap_or(word);

        Some(match word {
            "start" => Command::Start,
            "exit" => Command::Exit,
            "today_stat" => Command::TodayStat,
            "export" => Command::Export {
                phrase: rest.trim().to_string(),
            },
            other => Command::Unknown(other.to_string()),
        })
    }
}

pub struct EventRouter<G>
where
    G: Gateway + 'static,
{
    dialogs: Arc<DialogManager<G>>,
    export_secret: Option<String>,
}

impl<G> EventRouter<G>
where
    G: Gateway + 'static,
{
    pub fn new(dialogs: Arc<DialogManager<G>>, export_secret: Option<String>) -> Self {
        Self {
            dialogs,
            export_secret,
        }
    }

    pub async fn dispatch(&self, user: &ChatUser, inbound: Inbound) -> Result<Vec<Reply>, String> {
        let event = match inbound {
            Inbound::Message { text } => match Command::parse(&text) {
                Some(Command::Start) => Event::Start {
                    display_name: user.name.clone(),
                },
                Some(Command::Exit) => Event::Cancel,
                Some(Command::TodayStat) => return Ok(vec![self.today_stat(user).await]),
                Some(Command::Export { phrase }) => return Ok(vec![self.export(user, &phrase).await]),
                Some(Command::Unknown(word)) => {
                    tracing::debug!(user_id = user.id, command = %word, "Unknown command");
                    return Ok(vec![Reply::text(format!(
                        "Unknown command /{word}. Send /start to log an exercise."
                    ))]);
                }
                None => Event::Text { text },
            },
            Inbound::ButtonPress { data, message_id } => match ButtonToken::decode(&data) {
                Ok(token) => Event::Button { token, message_id },
                Err(e) => {
                    tracing::warn!(user_id = user.id, error = %e, "Malformed button token");
                    Event::Unrecognized {
                        message_id: Some(message_id),
                    }
                }
            },
        };

        self.dialogs.submit(user.id, event).await
    }

    async fn today_stat(&self, user: &ChatUser) -> Reply {
        let gateway = self.dialogs.gateway();
        let records = match gateway.find_user_by_external_id(user.id).await {
            Ok(Some(stored)) => gateway.list_today_history(stored.id).await,
            Ok(None) => Ok(vec![]),
            Err(e) => Err(e),
        };

        match records {
            Ok(records) => Reply::text(render_today(&records)),
            Err(e) => {
                tracing::error!(user_id = user.id, error = %e, "Failed to load today's records");
                Reply::text(STORAGE_FAILED)
            }
        }
    }

    async fn export(&self, user: &ChatUser, phrase: &str) -> Reply {
        let authorized = self
            .export_secret
            .as_deref()
            .is_some_and(|secret| !phrase.is_empty() && secret == phrase);
        if !authorized {
            tracing::warn!(user_id = user.id, "Rejected history export");
            return Reply::text(ACCESS_DENIED);
        }

        match self.dialogs.gateway().export_history().await {
            Ok(rows) => match render_export(&rows) {
                Ok(content) => {
                    tracing::info!(user_id = user.id, rows = rows.len(), "Exported history");
                    Reply::Document {
                        file_name: EXPORT_FILE_NAME.to_string(),
                        content,
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to serialize export");
                    Reply::text(STORAGE_FAILED)
                }
            },
            Err(e) => {
                tracing::error!(error = %e, "Failed to load history for export");
                Reply::text(STORAGE_FAILED)
            }
        }
    }
}

/// Today's records grouped by body part, numbered within each group
pub fn render_today(records: &[TodayRecord]) -> String {
    if records.is_empty() {
        return NO_RECORDS_TODAY.to_string();
    }

    let mut text = String::from("Today:");
    let mut current: Option<&str> = None;
    let mut number = 0;
    for record in records {
        if current != Some(record.body_part.as_str()) {
            current = Some(record.body_part.as_str());
            number = 0;
            text.push_str(&format!("\n\n{}", record.body_part));
        }
        number += 1;
        text.push_str(&format!("\n{number}. {}: {}", record.exercise, record.note));
    }
    text
}

pub fn render_export(rows: &[HistoryExportRow]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(rows)
}
