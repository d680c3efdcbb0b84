//! App account approval sync.

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;

use ripple_engine::approvals::SyncResult;

use crate::middleware::auth::AuthUser;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/apps/sync", post(sync_app))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequest {
    pub chain_id: i64,
}

/// POST /api/apps/sync: refresh the caller's approvals and report whether any are active.
///
/// Sync degrades to local state on upstream failures, so this never errors.
async fn sync_app(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<SyncRequest>,
) -> Json<SyncResult> {
    Json(state.resolver.sync(&auth.address, req.chain_id).await)
}
