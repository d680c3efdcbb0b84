//! Transport seam between push delivery and a concrete push service.

use async_trait::async_trait;

use crate::NotifierError;
use crate::sanitizer::SanitizedNotification;

/// Status code APNs returns for a token that is no longer registered.
pub const STATUS_UNREGISTERED: u16 = 410;

/// Reason string APNs returns for a malformed or foreign token.
pub const REASON_BAD_DEVICE_TOKEN: &str = "BadDeviceToken";

/// Per-device result reported by the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    Delivered,
    Rejected {
        status: Option<u16>,
        reason: Option<String>,
    },
}

impl PushOutcome {
    /// The token can never receive pushes again and its registration should go.
    pub fn is_device_invalid(&self) -> bool {
        match self {
            PushOutcome::Delivered => false,
            PushOutcome::Rejected { status, reason } => {
                *status == Some(STATUS_UNREGISTERED)
                    || reason.as_deref() == Some(REASON_BAD_DEVICE_TOKEN)
            }
        }
    }
}

#[async_trait]
pub trait PushGateway: Send + Sync {
    /// Make sure the gateway connection exists, initializing it on first use.
    async fn ensure_ready(&self) -> Result<(), NotifierError>;

    /// Send one notification to one device. Device-level rejections come back
    /// as `Ok(PushOutcome::Rejected { .. })`; `Err` means the request itself failed.
    async fn send(
        &self,
        device_token: &str,
        notification: &SanitizedNotification,
    ) -> Result<PushOutcome, NotifierError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_device_detection() {
        let gone = PushOutcome::Rejected {
            status: Some(410),
            reason: Some("Unregistered".to_string()),
        };
        let bad = PushOutcome::Rejected {
            status: Some(400),
            reason: Some("BadDeviceToken".to_string()),
        };
        let throttled = PushOutcome::Rejected {
            status: Some(429),
            reason: Some("TooManyRequests".to_string()),
        };
        assert!(gone.is_device_invalid());
        assert!(bad.is_device_invalid());
        assert!(!throttled.is_device_invalid());
        assert!(!PushOutcome::Delivered.is_device_invalid());
    }
}
