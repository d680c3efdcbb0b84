//! Test-send of a push notification to the caller's own devices.

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Map, Value};

use ripple_common::error::AppError;
use ripple_common::queue::{NOTIFICATIONS_QUEUE, enqueue};
use ripple_common::types::{NotificationJob, PushNotification};

use crate::middleware::auth::AuthUser;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/notifications/test", post(send_test))
}

#[derive(Debug, Deserialize)]
pub struct TestNotificationRequest {
    pub title: Option<String>,
    pub body: Option<String>,
}

/// POST /api/notifications/test: queue a push addressed directly to the caller.
///
/// Both fields are optional; send `{}` for the default text.
async fn send_test(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<TestNotificationRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let mut data = Map::new();
    data.insert("type".to_string(), Value::String("test".to_string()));

    let job = NotificationJob {
        author: auth.address.clone(),
        notification: PushNotification {
            title: req.title.unwrap_or_else(|| "Test notification".to_string()),
            body: req
                .body
                .unwrap_or_else(|| "Push notifications are working.".to_string()),
            data: Some(data),
            ..Default::default()
        },
        target_user_ids: Some(vec![auth.address.clone()]),
        event: None,
    };

    enqueue(state.jobs.as_ref(), NOTIFICATIONS_QUEUE, &job).await?;
    tracing::info!(user_id = %auth.address, "Test notification queued");

    Ok(Json(serde_json::json!({"queued": true})))
}
