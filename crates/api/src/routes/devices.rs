//! Push device registration.

use axum::extract::{Path, State};
use axum::routing::{delete, post};
use axum::{Json, Router};
use serde::Deserialize;

use ripple_common::error::AppError;
use ripple_common::types::DeviceRegistration;

use crate::middleware::auth::AuthUser;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/devices", post(register_device))
        .route("/api/devices/{token}", delete(unregister_device))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterDeviceRequest {
    pub device_token: String,
}

/// POST /api/devices: register a device token for the caller. Idempotent.
async fn register_device(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<RegisterDeviceRequest>,
) -> Result<Json<DeviceRegistration>, AppError> {
    let token = req.device_token.trim();
    if token.is_empty() {
        return Err(AppError::Validation("deviceToken is required".to_string()));
    }

    let device = state.devices.register(&auth.address, token).await?;
    tracing::info!(user_id = %auth.address, "Device registered");
    Ok(Json(device))
}

/// DELETE /api/devices/:token: remove one of the caller's device tokens.
async fn unregister_device(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(token): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let deleted = state.devices.delete(&auth.address, &token).await?;
    if deleted {
        Ok(Json(serde_json::json!({"deleted": true})))
    } else {
        Err(AppError::NotFound("Device not registered".to_string()))
    }
}
