//! Redis list-backed job queues.
//!
//! Producers `LPUSH` JSON-encoded jobs, consumers `BRPOP` them, giving FIFO
//! order per queue. A job whose handler fails is copied to `<queue>:failed`
//! along with the error text; redelivery from there is an operator concern.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use serde::Serialize;

use crate::error::AppError;

/// Queue carrying `CommentJob` messages.
pub const COMMENTS_QUEUE: &str = "comments";

/// Queue carrying `NotificationJob` messages.
pub const NOTIFICATIONS_QUEUE: &str = "notifications";

/// Anything that accepts serialized jobs for a named queue.
#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn push(&self, queue: &str, payload: String) -> Result<(), AppError>;

    /// Push several payloads in one operation: either all land or none do.
    async fn push_many(&self, queue: &str, payloads: Vec<String>) -> Result<(), AppError>;

    /// Wait up to `timeout` for the next job on `queue`.
    async fn pop(&self, queue: &str, timeout: Duration) -> Result<Option<String>, AppError>;

    /// Park a failed job for inspection.
    async fn dead_letter(&self, queue: &str, payload: String, error: &str)
    -> Result<(), AppError>;
}

/// Serialize `job` and push it onto `queue`.
pub async fn enqueue<T: Serialize + Sync>(
    jobs: &dyn JobQueue,
    queue: &str,
    job: &T,
) -> Result<(), AppError> {
    let payload = serde_json::to_string(job)?;
    jobs.push(queue, payload).await
}

/// Serialize every job up front, then push them as one batch.
pub async fn enqueue_all<T: Serialize + Sync>(
    jobs: &dyn JobQueue,
    queue: &str,
    batch: &[T],
) -> Result<(), AppError> {
    let payloads = batch
        .iter()
        .map(serde_json::to_string)
        .collect::<Result<Vec<_>, _>>()?;
    if payloads.is_empty() {
        return Ok(());
    }
    jobs.push_many(queue, payloads).await
}

#[derive(Clone)]
pub struct RedisQueue {
    redis: ConnectionManager,
}

impl RedisQueue {
    pub fn new(redis: ConnectionManager) -> Self {
        Self { redis }
    }

    fn key(queue: &str) -> String {
        format!("ripple:queue:{}", queue)
    }
}

#[async_trait]
impl JobQueue for RedisQueue {
    async fn push(&self, queue: &str, payload: String) -> Result<(), AppError> {
        let mut conn = self.redis.clone();
        conn.lpush::<_, _, ()>(Self::key(queue), payload).await?;
        Ok(())
    }

    async fn push_many(&self, queue: &str, payloads: Vec<String>) -> Result<(), AppError> {
        if payloads.is_empty() {
            return Ok(());
        }
        // A single variadic LPUSH is atomic
        let mut conn = self.redis.clone();
        conn.lpush::<_, _, ()>(Self::key(queue), payloads).await?;
        Ok(())
    }

    async fn pop(&self, queue: &str, timeout: Duration) -> Result<Option<String>, AppError> {
        let mut conn = self.redis.clone();
        let popped: Option<(String, String)> = conn
            .brpop(Self::key(queue), timeout.as_secs_f64())
            .await?;
        Ok(popped.map(|(_, payload)| payload))
    }

    async fn dead_letter(
        &self,
        queue: &str,
        payload: String,
        error: &str,
    ) -> Result<(), AppError> {
        let entry = serde_json::json!({
            "payload": payload,
            "error": error,
            "failedAt": chrono::Utc::now(),
        });
        let mut conn = self.redis.clone();
        conn.lpush::<_, _, ()>(format!("{}:failed", Self::key(queue)), entry.to_string())
            .await?;
        Ok(())
    }
}

/// In-process queue with the same semantics, for tests and local runs.
#[derive(Debug, Default)]
pub struct MemoryQueue {
    queues: Mutex<HashMap<String, VecDeque<String>>>,
    failed: Mutex<Vec<(String, String, String)>>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Jobs currently waiting on `queue`, oldest first.
    pub fn pending(&self, queue: &str) -> Vec<String> {
        self.queues
            .lock()
            .map(|q| q.get(queue).map(|d| d.iter().cloned().collect()).unwrap_or_default())
            .unwrap_or_default()
    }

    /// `(queue, payload, error)` triples that were dead-lettered.
    pub fn failed(&self) -> Vec<(String, String, String)> {
        self.failed.lock().map(|f| f.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl JobQueue for MemoryQueue {
    async fn push(&self, queue: &str, payload: String) -> Result<(), AppError> {
        self.queues
            .lock()
            .map_err(|_| AppError::Internal("queue lock poisoned".to_string()))?
            .entry(queue.to_string())
            .or_default()
            .push_back(payload);
        Ok(())
    }

    async fn push_many(&self, queue: &str, payloads: Vec<String>) -> Result<(), AppError> {
        self.queues
            .lock()
            .map_err(|_| AppError::Internal("queue lock poisoned".to_string()))?
            .entry(queue.to_string())
            .or_default()
            .extend(payloads);
        Ok(())
    }

    async fn pop(&self, queue: &str, _timeout: Duration) -> Result<Option<String>, AppError> {
        Ok(self
            .queues
            .lock()
            .map_err(|_| AppError::Internal("queue lock poisoned".to_string()))?
            .get_mut(queue)
            .and_then(|q| q.pop_front()))
    }

    async fn dead_letter(
        &self,
        queue: &str,
        payload: String,
        error: &str,
    ) -> Result<(), AppError> {
        self.failed
            .lock()
            .map_err(|_| AppError::Internal("queue lock poisoned".to_string()))?
            .push((queue.to_string(), payload, error.to_string()));
        Ok(())
    }
}
