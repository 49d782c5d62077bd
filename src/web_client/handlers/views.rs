//! View lifecycle handlers: open, page, reparametrize, inspect, close.
//!
//! Store reads run with the state lock released.  A view closed or
//! reparametrized meanwhile turns the completion stale, which is reported
//! as `{"stale": true}` rather than an error.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use crate::cursor::Edge;
use crate::navigator::Step;
use crate::session::{Completion, FetchTicket, OrderMode, ViewHandle, ViewParams};
use crate::web_client::state::SharedState;
use crate::web_client::utils::{api_error, entry_to_json, page_to_json, run_ticket, view_error};

fn parse_order(raw: Option<&str>) -> Result<Option<OrderMode>, Response> {
    raw.map(str::parse::<OrderMode>)
        .transpose()
        .map_err(view_error)
}

/// Run `ticket` off-lock, then apply it.
async fn finish(state: &SharedState, ticket: FetchTicket) -> Response {
    let store = state.lock().await.navigator.store();
    let records = run_ticket(store, &ticket).await;

    let mut st = state.lock().await;
    let today = st.navigator.calendar().today();
    match st.navigator.complete(ticket, records) {
        Ok(Completion::Applied(page)) => {
            (StatusCode::OK, axum::Json(page_to_json(&page, today))).into_response()
        }
        Ok(Completion::Stale) => (
            StatusCode::OK,
            axum::Json(serde_json::json!({ "stale": true })),
        )
            .into_response(),
        Err(e) => view_error(e),
    }
}

// -- Open --

#[derive(Deserialize)]
pub struct OpenViewRequest {
    conversation_id: i64,
    order: Option<String>,
    page_size: Option<usize>,
}

pub async fn open_view_handler(
    State(state): State<SharedState>,
    axum::Json(req): axum::Json<OpenViewRequest>,
) -> Response {
    let order = match parse_order(req.order.as_deref()) {
        Ok(order) => order.unwrap_or(OrderMode::ReverseChronological),
        Err(resp) => return resp,
    };

    let ticket = {
        let mut st = state.lock().await;
        let page_size = req.page_size.unwrap_or(st.default_page_size);
        let params = match ViewParams::new(order, page_size) {
            Ok(p) => p,
            Err(e) => return view_error(e),
        };
        match st.navigator.begin_open(req.conversation_id, params) {
            Ok(t) => t,
            Err(e) => return view_error(e),
        }
    };

    finish(&state, ticket).await
}

// -- More --

#[derive(Deserialize)]
pub struct MoreRequest {
    edge: String,
}

pub async fn more_handler(
    State(state): State<SharedState>,
    Path(view): Path<u64>,
    axum::Json(req): axum::Json<MoreRequest>,
) -> Response {
    let edge: Edge = match req.edge.parse() {
        Ok(edge) => edge,
        Err(e) => return api_error(StatusCode::BAD_REQUEST, e),
    };

    let ticket = {
        let mut st = state.lock().await;
        match st.navigator.begin_more(ViewHandle(view), edge) {
            Ok(Step::Query(ticket)) => ticket,
            Ok(Step::Done(page)) => {
                let today = st.navigator.calendar().today();
                return (StatusCode::OK, axum::Json(page_to_json(&page, today))).into_response();
            }
            Err(e) => return view_error(e),
        }
    };

    finish(&state, ticket).await
}

// -- Change parameters --

#[derive(Deserialize)]
pub struct ChangeParamsRequest {
    order: Option<String>,
    page_size: Option<usize>,
}

pub async fn change_params_handler(
    State(state): State<SharedState>,
    Path(view): Path<u64>,
    axum::Json(req): axum::Json<ChangeParamsRequest>,
) -> Response {
    let order = match parse_order(req.order.as_deref()) {
        Ok(order) => order,
        Err(resp) => return resp,
    };

    let ticket = {
        let mut st = state.lock().await;
        match st
            .navigator
            .begin_change_params(ViewHandle(view), order, req.page_size)
        {
            Ok(t) => t,
            Err(e) => return view_error(e),
        }
    };

    finish(&state, ticket).await
}

// -- Inspect / close --

pub async fn get_view_handler(
    State(state): State<SharedState>,
    Path(view): Path<u64>,
) -> Response {
    let st = state.lock().await;
    let handle = ViewHandle(view);
    let Some(session) = st.navigator.session(handle) else {
        return api_error(StatusCode::NOT_FOUND, format!("unknown view {handle}"));
    };

    let today = st.navigator.calendar().today();
    let entries: Vec<serde_json::Value> = session
        .window()
        .entries()
        .map(|e| entry_to_json(e, today))
        .collect();
    let params = session.params();
    let cursor = session.cursor();

    let body = serde_json::json!({
        "view": handle,
        "conversation_id": session.conversation(),
        "order": params.order,
        "page_size": params.page_size,
        "state": session.state(),
        "message_count": session.window().message_count(),
        "exhausted_older": cursor.is_exhausted(Edge::Older),
        "exhausted_newer": cursor.is_exhausted(Edge::Newer),
        "entries": entries,
    });
    (StatusCode::OK, axum::Json(body)).into_response()
}

pub async fn close_view_handler(
    State(state): State<SharedState>,
    Path(view): Path<u64>,
) -> Response {
    let mut st = state.lock().await;
    let handle = ViewHandle(view);
    if st.navigator.close(handle) {
        StatusCode::NO_CONTENT.into_response()
    } else {
        api_error(StatusCode::NOT_FOUND, format!("unknown view {handle}"))
    }
}
