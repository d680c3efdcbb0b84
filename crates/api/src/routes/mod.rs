pub mod apps;
pub mod devices;
pub mod events;
pub mod health;
pub mod notifications;

use axum::Router;

use crate::state::AppState;

/// Build the complete API router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(health::router())
        .merge(events::router())
        .merge(devices::router())
        .merge(apps::router())
        .merge(notifications::router())
        .with_state(state)
}
