//! Push notification delivery.
//!
//! - [`sanitizer`] shapes caller payloads into a small, whitelisted form
//! - [`apns`] owns the lazily-initialized APNs gateway connection
//! - [`delivery`] fans a notification out to every registered device of an account
//!   and removes registrations the gateway reports as dead
//! - [`devices`] stores device registrations

pub mod apns;
pub mod delivery;
pub mod devices;
pub mod gateway;
pub mod lazy;
pub mod sanitizer;

use thiserror::Error;

use ripple_common::error::AppError;

#[derive(Debug, Error)]
pub enum NotifierError {
    /// Gateway credentials are missing or unusable. Every send fails until fixed.
    #[error("Push configuration error: {0}")]
    Config(String),

    #[error("Push gateway error: {0}")]
    Gateway(String),

    #[error("Device store error: {0}")]
    Store(String),
}

impl From<sqlx::Error> for NotifierError {
    fn from(e: sqlx::Error) -> Self {
        NotifierError::Store(e.to_string())
    }
}

impl From<reqwest::Error> for NotifierError {
    fn from(e: reqwest::Error) -> Self {
        NotifierError::Gateway(e.to_string())
    }
}

impl From<NotifierError> for AppError {
    fn from(e: NotifierError) -> Self {
        match e {
            NotifierError::Config(msg) => AppError::Config(msg),
            NotifierError::Gateway(msg) => AppError::Internal(msg),
            NotifierError::Store(msg) => {
                tracing::error!(error = %msg, "Device store error");
                AppError::Internal("Failed to load data".to_string())
            }
        }
    }
}
