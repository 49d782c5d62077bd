//! Axum router construction.

use axum::routing::{get, post};
use axum::Router;

use crate::web_client::handlers;
use crate::web_client::state::SharedState;

/// Build the complete Axum router with all API routes.
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/api/health", get(handlers::health::health_handler))
        .route("/api/views", post(handlers::views::open_view_handler))
        .route(
            "/api/views/:view",
            get(handlers::views::get_view_handler)
                .patch(handlers::views::change_params_handler)
                .delete(handlers::views::close_view_handler),
        )
        .route(
            "/api/views/:view/more",
            post(handlers::views::more_handler),
        )
        .with_state(state)
}
