//! Notification history.

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use ripple_common::error::AppError;
use ripple_engine::history::EventsPage;

use crate::middleware::auth::AuthUser;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/events", get(list_events))
}

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    pub limit: Option<u32>,
    pub cursor: Option<String>,
}

/// GET /api/events?limit&cursor: one page of the caller's history, newest first.
async fn list_events(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<EventsQuery>,
) -> Result<Json<EventsPage>, AppError> {
    let page = state
        .history
        .get_events(&auth.address, query.limit, query.cursor.as_deref())
        .await?;
    Ok(Json(page))
}
