//! Notification fan-out worker.
//!
//! Resolves the app accounts a `NotificationJob` is for and hands each one to
//! push delivery. Every destination is attempted; one failing account never
//! stops the others and never fails the job.

use std::sync::Arc;

use futures::future::join_all;

use ripple_common::types::{NotificationEvent, NotificationJob, normalize_address, redact};
use ripple_notifier::delivery::AccountDelivery;

use crate::approvals::ApprovalResolver;
use crate::events::EventStore;

/// Tally of one fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanoutReport {
    pub accounts: usize,
    pub failed: usize,
}

pub struct NotificationFanout {
    resolver: Arc<ApprovalResolver>,
    delivery: Arc<dyn AccountDelivery>,
    events: Option<Arc<dyn EventStore>>,
}

impl NotificationFanout {
    pub fn new(resolver: Arc<ApprovalResolver>, delivery: Arc<dyn AccountDelivery>) -> Self {
        Self {
            resolver,
            delivery,
            events: None,
        }
    }

    /// Record a `NotificationEvent` per destination for jobs that carry event metadata.
    pub fn with_event_store(mut self, events: Arc<dyn EventStore>) -> Self {
        self.events = Some(events);
        self
    }

    pub async fn on_notification_job(&self, job: &NotificationJob) -> anyhow::Result<FanoutReport> {
        let destinations = match &job.target_user_ids {
            Some(ids) => {
                let mut distinct: Vec<String> = Vec::with_capacity(ids.len());
                for id in ids.iter().map(|id| normalize_address(id)) {
                    if !distinct.contains(&id) {
                        distinct.push(id);
                    }
                }
                distinct
            }
            None => self
                .resolver
                .resolve_apps_for_author(&job.author, job.chain_id())
                .await?
                .into_iter()
                .map(|account| account.id)
                .collect(),
        };

        if destinations.is_empty() {
            tracing::info!(author = %job.author, "No destination accounts, skipping");
            return Ok(FanoutReport::default());
        }

        let results = join_all(destinations.iter().map(|user_id| self.deliver(user_id, job))).await;

        let report = FanoutReport {
            accounts: destinations.len(),
            failed: results.iter().filter(|ok| !**ok).count(),
        };

        tracing::info!(
            author = %job.author,
            accounts = report.accounts,
            failed = report.failed,
            "Notification fanned out"
        );

        Ok(report)
    }

    /// Record and deliver for one account. Returns whether delivery succeeded.
    async fn deliver(&self, user_id: &str, job: &NotificationJob) -> bool {
        if let (Some(events), Some(meta)) = (&self.events, &job.event) {
            let event = NotificationEvent::record(user_id, meta, &job.notification);
            if let Err(e) = events.insert(&event).await {
                tracing::warn!(user_id = %redact(user_id), error = %e, "Failed to record notification event");
            }
        }

        match self.delivery.send_to_account(user_id, &job.notification).await {
            Ok(_) => true,
            Err(e) => {
                tracing::error!(user_id = %redact(user_id), error = %e, "Delivery to account failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use chrono::Utc;
    use ripple_common::queue::{JobQueue, MemoryQueue, NOTIFICATIONS_QUEUE};
    use ripple_common::types::{Approval, CommentJob, PushNotification};

    use super::*;
    use crate::approvals::ApprovalStore;
    use crate::enrichment::CommentEnrichmentWorker;
    use crate::events::MemoryEventStore;
    use crate::testing::{
        FakeApprovalSource, FakeCommentSource, MemoryApprovalStore, RecordingDelivery, comment,
    };

    const AUTHOR: &str = "0xaaa0000000000000000000000000000000000001";

    fn approval(app: &str) -> Approval {
        Approval {
            author: AUTHOR.to_string(),
            app: app.to_string(),
            chain_id: 8453,
            tx_hash: None,
            log_index: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            deleted_at: None,
        }
    }

    async fn resolver_with_apps(apps: &[&str]) -> Arc<ApprovalResolver> {
        let store = Arc::new(MemoryApprovalStore::default());
        let approvals: Vec<Approval> = apps.iter().map(|app| approval(app)).collect();
        store.upsert_approvals(&approvals).await.unwrap();
        for app in apps {
            store.add_device(app);
        }
        Arc::new(ApprovalResolver::new(store, Arc::new(FakeApprovalSource::failing())))
    }

    fn job(target_user_ids: Option<Vec<String>>) -> NotificationJob {
        NotificationJob {
            author: AUTHOR.to_string(),
            notification: PushNotification {
                title: "@bob replied".to_string(),
                body: "hi".to_string(),
                ..Default::default()
            },
            target_user_ids,
            event: None,
        }
    }

    #[tokio::test]
    async fn test_zero_accounts_is_a_successful_no_op() {
        let delivery = Arc::new(RecordingDelivery::default());
        let fanout = NotificationFanout::new(resolver_with_apps(&[]).await, delivery.clone());

        let report = fanout.on_notification_job(&job(None)).await.unwrap();

        assert_eq!(report, FanoutReport::default());
        assert!(delivery.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_account_does_not_stop_others() {
        let delivery = Arc::new(RecordingDelivery {
            failing: HashSet::from(["0xapp1".to_string()]),
            ..Default::default()
        });
        let fanout = NotificationFanout::new(
            resolver_with_apps(&["0xapp1", "0xapp2"]).await,
            delivery.clone(),
        );

        let report = fanout.on_notification_job(&job(None)).await.unwrap();

        assert_eq!(report.accounts, 2);
        assert_eq!(report.failed, 1);
        let mut sent: Vec<String> = delivery
            .sent
            .lock()
            .unwrap()
            .iter()
            .map(|(user, _)| user.clone())
            .collect();
        sent.sort();
        assert_eq!(sent, vec!["0xapp1", "0xapp2"]);
    }

    #[tokio::test]
    async fn test_explicit_targets_bypass_resolution() {
        let delivery = Arc::new(RecordingDelivery::default());
        let fanout = NotificationFanout::new(resolver_with_apps(&["0xapp1"]).await, delivery.clone());

        let targets = vec!["0xDIRECT".to_string(), "0xdirect".to_string()];
        let report = fanout.on_notification_job(&job(Some(targets))).await.unwrap();

        assert_eq!(report.accounts, 1);
        let sent = delivery.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "0xdirect");
    }

    #[tokio::test]
    async fn test_reply_flows_from_comment_to_both_apps() {
        let mut source = FakeCommentSource::default();
        source.insert(comment("c1", AUTHOR, "original", None));
        source.insert(comment("c2", "0xbbb", "nice", Some("c1")));
        let queue = Arc::new(MemoryQueue::new());
        let enrichment = CommentEnrichmentWorker::new(Arc::new(source), queue.clone());

        let comment_job = CommentJob {
            comment_id: "c2".to_string(),
            content: None,
            parent_id: Some("c1".to_string()),
            comment_type: Some(0),
            chain_id: 8453,
        };
        assert_eq!(enrichment.on_comment_job(&comment_job).await.unwrap(), 1);

        let raw = queue
            .pop(NOTIFICATIONS_QUEUE, std::time::Duration::from_secs(1))
            .await
            .unwrap()
            .unwrap();
        let notification_job: NotificationJob = serde_json::from_str(&raw).unwrap();
        assert_eq!(notification_job.author, AUTHOR);
        assert_eq!(notification_job.notification.title, "@0xbbb replied");
        assert_eq!(notification_job.notification.body, "nice");

        let delivery = Arc::new(RecordingDelivery {
            failing: HashSet::from(["0xapp1".to_string()]),
            ..Default::default()
        });
        let events = Arc::new(MemoryEventStore::new());
        let fanout = NotificationFanout::new(
            resolver_with_apps(&["0xapp1", "0xapp2"]).await,
            delivery.clone(),
        )
        .with_event_store(events.clone());

        let report = fanout.on_notification_job(&notification_job).await.unwrap();

        assert_eq!(report.accounts, 2);
        assert_eq!(delivery.sent.lock().unwrap().len(), 2);

        let recorded = events.all();
        assert_eq!(recorded.len(), 2);
        assert!(recorded.iter().all(|e| e.subject_comment_id == "c2"));
        assert!(recorded.iter().all(|e| e.parent_address() == Some(AUTHOR)));
    }
}
