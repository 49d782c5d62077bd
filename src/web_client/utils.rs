//! Shared utility functions for the web client.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::calendar::DayKey;
use crate::message::Message;
use crate::session::{FetchTicket, Page, ViewError};
use crate::storage::{MessageStore, RecordStore, StorageError};
use crate::window::Entry;

/// Build a standard JSON error response.
pub fn api_error(status: StatusCode, message: impl Into<String>) -> Response {
    let body = serde_json::json!({ "error": message.into() });
    (status, axum::Json(body)).into_response()
}

/// Map a view error onto its HTTP status.
pub fn view_error(e: ViewError) -> Response {
    let status = match &e {
        ViewError::InvalidParams(_) => StatusCode::BAD_REQUEST,
        ViewError::UnknownView(_) => StatusCode::NOT_FOUND,
        ViewError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
    };
    api_error(status, e.to_string())
}

/// JSON for one window entry.  Separators carry a label relative to `today`.
pub fn entry_to_json(entry: &Entry, today: DayKey) -> serde_json::Value {
    match entry {
        Entry::Separator { day } => serde_json::json!({
            "entry": "separator",
            "day": day,
            "label": day.label(today),
        }),
        Entry::Message { message } => message_to_json(message),
    }
}

fn message_to_json(m: &Message) -> serde_json::Value {
    serde_json::json!({
        "entry": "message",
        "id": m.id,
        "conversation_id": m.conversation_id,
        "from_me": m.from_me,
        "timestamp_ms": m.timestamp_ms,
        "content": m.content,
        "sender": m.sender,
        "quoted_text": m.quoted_text,
    })
}

pub fn page_to_json(page: &Page, today: DayKey) -> serde_json::Value {
    let entries: Vec<serde_json::Value> = page
        .splice
        .entries
        .iter()
        .map(|e| entry_to_json(e, today))
        .collect();
    serde_json::json!({
        "view": page.view,
        "edge": page.edge,
        "side": page.splice.side,
        "entries": entries,
        "retired_separator": page.splice.retired_separator,
        "exhausted": page.exhausted,
        "exhausted_older": page.exhausted_older,
        "exhausted_newer": page.exhausted_newer,
    })
}

/// Run a ticket's range read on the blocking pool.
pub async fn run_ticket(
    store: std::sync::Arc<MessageStore>,
    ticket: &FetchTicket,
) -> Result<Vec<Message>, StorageError> {
    let conversation = ticket.conversation;
    let query = ticket.query;
    tokio::task::spawn_blocking(move || store.query(conversation, &query))
        .await
        .unwrap_or_else(|e| Err(StorageError::Unavailable(format!("query task failed: {e}"))))
}
