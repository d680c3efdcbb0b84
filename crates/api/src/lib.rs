//! HTTP API for Ripple clients.
//!
//! Endpoints:
//! - GET    /health
//! - GET    /api/events?limit&cursor notification history, reactions grouped
//! - POST   /api/devices register a push device token
//! - DELETE /api/devices/{token} unregister a device token
//! - POST   /api/apps/sync refresh approvals for the calling app account
//! - POST   /api/notifications/test queue a push to the caller's own devices

pub mod middleware;
pub mod routes;
pub mod state;
