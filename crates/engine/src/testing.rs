//! In-memory collaborators for worker tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;

use ripple_common::error::AppError;
use ripple_common::types::{AppAccount, Approval, PushNotification, normalize_address};
use ripple_indexer::models::{Author, CommentData};
use ripple_indexer::{ApprovalSource, CommentSource, FetchError, ProfileSource};
use ripple_notifier::NotifierError;
use ripple_notifier::delivery::{AccountDelivery, DeliveryReport};

use crate::approvals::ApprovalStore;

#[derive(Default)]
pub struct MemoryApprovalStore {
    accounts: Mutex<HashSet<String>>,
    approvals: Mutex<Vec<Approval>>,
    with_devices: Mutex<HashSet<String>>,
    fail_account: AtomicBool,
    fail_count: AtomicBool,
}

impl MemoryApprovalStore {
    pub fn add_device(&self, app: &str) {
        self.with_devices.lock().unwrap().insert(normalize_address(app));
    }

    pub fn has_account(&self, id: &str) -> bool {
        self.accounts.lock().unwrap().contains(id)
    }

    pub fn fail_account_upsert(&self) {
        self.fail_account.store(true, Ordering::SeqCst);
    }

    pub fn fail_count(&self) {
        self.fail_count.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl ApprovalStore for MemoryApprovalStore {
    async fn upsert_account(&self, id: &str) -> Result<(), AppError> {
        if self.fail_account.load(Ordering::SeqCst) {
            return Err(AppError::Internal("account upsert failed".to_string()));
        }
        self.accounts.lock().unwrap().insert(normalize_address(id));
        Ok(())
    }

    async fn upsert_approvals(&self, approvals: &[Approval]) -> Result<u64, AppError> {
        let mut stored = self.approvals.lock().unwrap();
        for approval in approvals {
            stored.retain(|a| {
                !(a.author == approval.author
                    && a.app == approval.app
                    && a.chain_id == approval.chain_id)
            });
            stored.push(approval.clone());
        }
        Ok(approvals.len() as u64)
    }

    async fn count_active(&self, app: &str, chain_id: i64) -> Result<i64, AppError> {
        if self.fail_count.load(Ordering::SeqCst) {
            return Err(AppError::Internal("count failed".to_string()));
        }
        let count = self
            .approvals
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.app == app && a.chain_id == chain_id && a.is_active())
            .count();
        Ok(count as i64)
    }

    async fn apps_for_author_with_devices(
        &self,
        author: &str,
        chain_id: Option<i64>,
    ) -> Result<Vec<AppAccount>, AppError> {
        let devices = self.with_devices.lock().unwrap();
        let mut apps: Vec<String> = self
            .approvals
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.author == author && a.is_active())
            .filter(|a| chain_id.is_none_or(|c| a.chain_id == c))
            .filter(|a| devices.contains(&a.app))
            .map(|a| a.app.clone())
            .collect();
        apps.sort();
        apps.dedup();

        Ok(apps
            .into_iter()
            .map(|id| AppAccount {
                id,
                created_at: Utc::now(),
            })
            .collect())
    }
}

pub struct FakeApprovalSource {
    approvals: Option<Vec<Approval>>,
}

impl FakeApprovalSource {
    pub fn with(approvals: Vec<Approval>) -> Self {
        Self {
            approvals: Some(approvals),
        }
    }

    pub fn failing() -> Self {
        Self { approvals: None }
    }
}

#[async_trait]
impl ApprovalSource for FakeApprovalSource {
    async fn approvals_for_app(
        &self,
        app: &str,
        _chain_id: i64,
    ) -> Result<Vec<Approval>, FetchError> {
        match &self.approvals {
            Some(approvals) => Ok(approvals.iter().filter(|a| a.app == app).cloned().collect()),
            None => Err(FetchError::Status {
                status: 503,
                url: "/api/approvals".to_string(),
            }),
        }
    }
}

/// Comments by id; unknown ids fail like an exhausted fetch.
#[derive(Default)]
pub struct FakeCommentSource {
    pub comments: HashMap<String, CommentData>,
}

impl FakeCommentSource {
    pub fn insert(&mut self, comment: CommentData) {
        self.comments.insert(comment.id.clone(), comment);
    }
}

#[async_trait]
impl CommentSource for FakeCommentSource {
    async fn comment(&self, _chain_id: i64, comment_id: &str) -> Result<CommentData, FetchError> {
        self.comments
            .get(comment_id)
            .cloned()
            .ok_or_else(|| FetchError::Exhausted {
                attempts: 5,
                last: Box::new(FetchError::Status {
                    status: 404,
                    url: format!("/api/comments/{comment_id}"),
                }),
            })
    }
}

pub fn comment(id: &str, author: &str, content: &str, parent_id: Option<&str>) -> CommentData {
    CommentData {
        id: id.to_string(),
        author: Author::bare(author),
        content: content.to_string(),
        parent_id: parent_id.map(str::to_string),
        comment_type: None,
        chain_id: Some(8453),
        channel_id: None,
        references: Vec::new(),
        created_at: None,
    }
}

#[derive(Default)]
pub struct FakeProfileSource {
    pub profiles: HashMap<String, Author>,
    pub calls: Mutex<Vec<Vec<String>>>,
}

#[async_trait]
impl ProfileSource for FakeProfileSource {
    async fn profiles(&self, addresses: &[String]) -> Result<HashMap<String, Author>, FetchError> {
        self.calls.lock().unwrap().push(addresses.to_vec());
        Ok(addresses
            .iter()
            .filter_map(|a| self.profiles.get(a).map(|p| (a.clone(), p.clone())))
            .collect())
    }
}

/// Records every account it is asked to deliver to; listed accounts fail.
#[derive(Default)]
pub struct RecordingDelivery {
    pub failing: HashSet<String>,
    pub sent: Mutex<Vec<(String, PushNotification)>>,
}

#[async_trait]
impl AccountDelivery for RecordingDelivery {
    async fn send_to_account(
        &self,
        user_id: &str,
        notification: &PushNotification,
    ) -> Result<DeliveryReport, NotifierError> {
        self.sent
            .lock()
            .unwrap()
            .push((user_id.to_string(), notification.clone()));
        if self.failing.contains(user_id) {
            return Err(NotifierError::Store("devices unavailable".to_string()));
        }
        Ok(DeliveryReport {
            attempted: 1,
            delivered: 1,
            ..Default::default()
        })
    }
}
