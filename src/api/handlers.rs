//! HTTP request handlers

use super::types::{ErrorResponse, UpdateKind, UpdateRequest, UpdateResponse};
use super::AppState;
use crate::db::MAX_TEXT_LEN;
use crate::router::{ChatUser, Inbound};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Chat updates from the transport
        .route("/api/updates", post(post_update))
        // Version
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Chat Updates
// ============================================================

async fn post_update(
    State(state): State<AppState>,
    body: Result<Json<UpdateRequest>, JsonRejection>,
) -> Result<Json<UpdateResponse>, AppError> {
    let Json(req) = body.map_err(|e| AppError::BadRequest(e.body_text()))?;

    let user = ChatUser {
        id: req.user_id,
        name: display_name(req.user_name.as_deref(), req.user_id),
    };
    let inbound = match req.kind {
        UpdateKind::Message { text } => Inbound::Message { text },
        UpdateKind::Button { data, message_id } => Inbound::ButtonPress { data, message_id },
    };

    let replies = state
        .router
        .dispatch(&user, inbound)
        .await
        .map_err(AppError::Internal)?;

    Ok(Json(UpdateResponse { replies }))
}

/// Stored user name: trimmed, fits the column, never empty
fn display_name(name: Option<&str>, user_id: i64) -> String {
    match name.map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) => name.chars().take(MAX_TEXT_LEN).collect(),
        None => format!("user {user_id}"),
    }
}

// ============================================================
// Version
// ============================================================

async fn get_version() -> &'static str {
    concat!("workout-log ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
