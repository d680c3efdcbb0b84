//! Per-account push delivery.
//!
//! Sends one notification to every device registered for an account:
//! 1. Load the account's device registrations (none → no-op)
//! 2. Sanitize once and reuse the result for every device
//! 3. Send in batches of [`BATCH_SIZE`]; each batch settles before the next starts
//! 4. Delete registrations the gateway reports as dead; log everything else

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;

use ripple_common::types::{PushNotification, redact};

use crate::NotifierError;
use crate::devices::DeviceStore;
use crate::gateway::{PushGateway, PushOutcome};
use crate::sanitizer::{SanitizedNotification, sanitize};

/// Devices sent to concurrently.
pub const BATCH_SIZE: usize = 5;

/// Tally of one `send_to_account` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub attempted: usize,
    pub delivered: usize,
    pub failed: usize,
    /// Registrations deleted because the gateway rejected the token for good
    pub removed: usize,
}

#[async_trait]
pub trait AccountDelivery: Send + Sync {
    /// Deliver to every device of `user_id`. Per-device failures are logged and
    /// counted, never returned; `Err` is reserved for failures that affect every
    /// device (store unavailable, gateway misconfigured).
    async fn send_to_account(
        &self,
        user_id: &str,
        notification: &PushNotification,
    ) -> Result<DeliveryReport, NotifierError>;
}

enum DeviceResult {
    Delivered,
    Failed,
    Removed,
}

pub struct PushDelivery {
    devices: Arc<dyn DeviceStore>,
    gateway: Arc<dyn PushGateway>,
}

impl PushDelivery {
    pub fn new(devices: Arc<dyn DeviceStore>, gateway: Arc<dyn PushGateway>) -> Self {
        Self { devices, gateway }
    }

    async fn deliver_one(
        &self,
        user_id: &str,
        device_token: &str,
        notification: &SanitizedNotification,
    ) -> DeviceResult {
        let outcome = match self.gateway.send(device_token, notification).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(
                    user_id = %redact(user_id),
                    device = %redact(device_token),
                    error = %e,
                    "Push send failed"
                );
                return DeviceResult::Failed;
            }
        };

        match outcome {
            PushOutcome::Delivered => DeviceResult::Delivered,
            rejected if rejected.is_device_invalid() => {
                match self.devices.delete(user_id, device_token).await {
                    Ok(_) => {
                        tracing::info!(
                            user_id = %redact(user_id),
                            device = %redact(device_token),
                            outcome = ?rejected,
                            "Removed invalid device registration"
                        );
                        DeviceResult::Removed
                    }
                    Err(e) => {
                        tracing::error!(
                            user_id = %redact(user_id),
                            device = %redact(device_token),
                            error = %e,
                            "Failed to remove invalid device registration"
                        );
                        DeviceResult::Failed
                    }
                }
            }
            PushOutcome::Rejected { status, reason } => {
                tracing::warn!(
                    user_id = %redact(user_id),
                    device = %redact(device_token),
                    status = ?status,
                    reason = ?reason,
                    "Push rejected"
                );
                DeviceResult::Failed
            }
        }
    }
}

#[async_trait]
impl AccountDelivery for PushDelivery {
    async fn send_to_account(
        &self,
        user_id: &str,
        notification: &PushNotification,
    ) -> Result<DeliveryReport, NotifierError> {
        let devices = self.devices.list_for_user(user_id).await?;
        if devices.is_empty() {
            tracing::debug!(user_id = %redact(user_id), "No registered devices");
            return Ok(DeliveryReport::default());
        }

        let sanitized = sanitize(notification);
        self.gateway.ensure_ready().await?;

        let mut report = DeliveryReport::default();
        for batch in devices.chunks(BATCH_SIZE) {
            let sends = batch
                .iter()
                .map(|device| self.deliver_one(user_id, &device.device_token, &sanitized));

            for result in join_all(sends).await {
                report.attempted += 1;
                match result {
                    DeviceResult::Delivered => report.delivered += 1,
                    DeviceResult::Failed => report.failed += 1,
                    DeviceResult::Removed => {
                        report.failed += 1;
                        report.removed += 1;
                    }
                }
            }
        }

        tracing::info!(
            user_id = %redact(user_id),
            attempted = report.attempted,
            delivered = report.delivered,
            failed = report.failed,
            removed = report.removed,
            "Push delivery finished"
        );

        Ok(report)
    }
}


#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::testing::ScriptedGateway;
    use super::*;
    use crate::devices::MemoryDeviceStore;

    fn notification() -> PushNotification {
        PushNotification {
            title: "@alice replied".to_string(),
            body: "gm".to_string(),
            ..Default::default()
        }
    }

    async fn store_with(user: &str, tokens: &[&str]) -> Arc<MemoryDeviceStore> {
        let store = Arc::new(MemoryDeviceStore::new());
        for token in tokens {
            store.register(user, token).await.unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_unregistered_device_is_deleted() {
        let store = store_with("0xapp", &["good", "gone"]).await;
        let mut gateway = ScriptedGateway::default();
        gateway.outcomes.insert(
            "gone".to_string(),
            Ok(PushOutcome::Rejected {
                status: Some(410),
                reason: Some("Unregistered".to_string()),
            }),
        );
        let delivery = PushDelivery::new(store.clone(), Arc::new(gateway));

        let report = delivery
            .send_to_account("0xapp", &notification())
            .await
            .unwrap();

        assert_eq!(report.attempted, 2);
        assert_eq!(report.delivered, 1);
        assert_eq!(report.removed, 1);
        let remaining = store.list_for_user("0xapp").await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].device_token, "good");
    }

    #[tokio::test]
    async fn test_bad_device_token_is_deleted() {
        let store = store_with("0xapp", &["good", "typo"]).await;
        let mut gateway = ScriptedGateway::default();
        gateway.outcomes.insert(
            "typo".to_string(),
            Ok(PushOutcome::Rejected {
                status: Some(400),
                reason: Some("BadDeviceToken".to_string()),
            }),
        );
        let delivery = PushDelivery::new(store.clone(), Arc::new(gateway));

        let report = delivery
            .send_to_account("0xapp", &notification())
            .await
            .unwrap();

        assert_eq!(report.delivered, 1);
        assert_eq!(report.removed, 1);
        let remaining = store.list_for_user("0xapp").await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].device_token, "good");
    }

    #[tokio::test]
    async fn test_other_rejections_keep_registration() {
        let store = store_with("0xapp", &["busy", "broken"]).await;
        let mut gateway = ScriptedGateway::default();
        gateway.outcomes.insert(
            "busy".to_string(),
            Ok(PushOutcome::Rejected {
                status: Some(429),
                reason: Some("TooManyRequests".to_string()),
            }),
        );
        gateway
            .outcomes
            .insert("broken".to_string(), Err("connection reset".to_string()));
        let delivery = PushDelivery::new(store.clone(), Arc::new(gateway));

        let report = delivery
            .send_to_account("0xapp", &notification())
            .await
            .unwrap();

        assert_eq!(report.failed, 2);
        assert_eq!(report.removed, 0);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_batches_bound_concurrency() {
        let tokens: Vec<String> = (0..12).map(|i| format!("token-{i}")).collect();
        let refs: Vec<&str> = tokens.iter().map(String::as_str).collect();
        let store = store_with("0xapp", &refs).await;
        let gateway = Arc::new(ScriptedGateway::default());
        let delivery = PushDelivery::new(store, gateway.clone());

        let report = delivery
            .send_to_account("0xapp", &notification())
            .await
            .unwrap();

        assert_eq!(report.delivered, 12);
        assert_eq!(gateway.sent.lock().unwrap().len(), 12);
        let peak = gateway.max_in_flight.load(Ordering::SeqCst);
        assert!(peak <= BATCH_SIZE, "peak concurrency {peak}");
    }

    #[tokio::test]
    async fn test_no_devices_sends_nothing() {
        let store = Arc::new(MemoryDeviceStore::new());
        let gateway = Arc::new(ScriptedGateway {
            config_error: Some("not configured".to_string()),
            ..Default::default()
        });
        let delivery = PushDelivery::new(store, gateway.clone());

        let report = delivery
            .send_to_account("0xnobody", &notification())
            .await
            .unwrap();

        assert_eq!(report, DeliveryReport::default());
        assert!(gateway.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_configuration_error_aborts_send() {
        let store = store_with("0xapp", &["token"]).await;
        let gateway = Arc::new(ScriptedGateway {
            config_error: Some("APNS_KEY_ID missing".to_string()),
            ..Default::default()
        });
        let delivery = PushDelivery::new(store.clone(), gateway.clone());

        let err = delivery
            .send_to_account("0xapp", &notification())
            .await
            .unwrap_err();

        assert!(matches!(err, NotifierError::Config(_)));
        assert!(gateway.sent.lock().unwrap().is_empty());
        assert_eq!(store.len(), 1);
    }
}
