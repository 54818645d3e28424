//! Order event pages, backed by the queue.

use std::sync::Arc;

use axum::extract::State;
use axum::response::{Html, Redirect};
use axum::Form;
use serde::Deserialize;
use tera::Context;
use tracing::debug;

use super::page;
use crate::errors::AppError;
use crate::service::MAX_PEEK_MESSAGES;
use crate::AppState;

/// Suggestions offered by the send form.
const ORDER_STATUSES: &[&str] = &["Placed", "Processing", "Shipped", "Delivered", "Cancelled"];

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SendForm {
    pub message: String,
    pub status: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DeleteForm {
    pub message_id: String,
}

/// Body stored for a send: `"{message} - {status}"`, or `None` when
/// either part is blank.
pub fn compose_message(message: &str, status: &str) -> Option<String> {
    if message.trim().is_empty() || status.trim().is_empty() {
        return None;
    }
    Some(format!("{message} - {status}"))
}

/// `GET /queue` -- peeks, never consumes.
pub async fn list(State(state): State<Arc<AppState>>) -> Result<Html<String>, AppError> {
    let messages = state.storage.peek_messages(MAX_PEEK_MESSAGES).await?;
    let mut context = Context::new();
    context.insert("queue", &state.storage.names().queue);
    context.insert("max", &MAX_PEEK_MESSAGES);
    context.insert("messages", &messages);
    context.insert("statuses", ORDER_STATUSES);
    page("queue.html", &context)
}

/// `POST /queue/send`
pub async fn send(
    State(state): State<Arc<AppState>>,
    Form(form): Form<SendForm>,
) -> Result<Redirect, AppError> {
    if let Some(text) = compose_message(&form.message, &form.status) {
        state.storage.send_message(&text).await?;
    }
    Ok(Redirect::to("/queue"))
}

/// `POST /queue/delete` -- best effort; a message outside the scan window
/// is left in place without an error.
pub async fn delete(
    State(state): State<Arc<AppState>>,
    Form(form): Form<DeleteForm>,
) -> Result<Redirect, AppError> {
    let deleted = state.storage.delete_message_by_id(&form.message_id).await?;
    debug!(id = %form.message_id, deleted, "queue delete by id");
    Ok(Redirect::to("/queue"))
}
