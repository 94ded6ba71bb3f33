//! API request and response types

use crate::state_machine::Reply;
use serde::{Deserialize, Serialize};

/// Inbound chat update
#[derive(Debug, Deserialize)]
pub struct UpdateRequest {
    pub user_id: i64,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(flatten)]
    pub kind: UpdateKind,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UpdateKind {
    Message { text: String },
    Button { data: String, message_id: i64 },
}

/// Replies to deliver for one update, in order
#[derive(Debug, Serialize)]
pub struct UpdateResponse {
    pub replies: Vec<Reply>,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
