//! Health check endpoint.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::web_client::state::SharedState;

pub async fn health_handler(State(state): State<SharedState>) -> impl IntoResponse {
    let state = state.lock().await;
    let body = serde_json::json!({
        "status": "ok",
        "database": state.db_path.display().to_string(),
        "utc_offset": state.navigator.calendar().offset().to_string(),
        "default_page_size": state.default_page_size,
        "open_views": state.navigator.view_count(),
    });
    (StatusCode::OK, axum::Json(body))
}
