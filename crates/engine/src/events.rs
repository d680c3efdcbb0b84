//! Append-only notification event store.

use std::sync::Mutex;

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use ripple_common::error::AppError;
use ripple_common::types::{NotificationEvent, normalize_address};

#[async_trait]
pub trait EventStore: Send + Sync {
    async fn insert(&self, event: &NotificationEvent) -> Result<(), AppError>;

    /// Up to `fetch` events for `user_id`, newest first by `(created_at, id)`,
    /// strictly after the `cursor` event when given. An unknown cursor is a
    /// validation error.
    async fn page(
        &self,
        user_id: &str,
        fetch: i64,
        cursor: Option<Uuid>,
    ) -> Result<Vec<NotificationEvent>, AppError>;
}

#[derive(Clone)]
pub struct PgEventStore {
    pool: PgPool,
}

impl PgEventStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EventStore for PgEventStore {
    async fn insert(&self, event: &NotificationEvent) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO notification_events (
                id, user_id, type, origin_address, chain_id, subject_comment_id,
                target_comment_id, parent_comment_id, reaction_type, group_key,
                title, body, badge, sound, data, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(event.id)
        .bind(&event.user_id)
        .bind(event.kind)
        .bind(&event.origin_address)
        .bind(event.chain_id)
        .bind(&event.subject_comment_id)
        .bind(&event.target_comment_id)
        .bind(&event.parent_comment_id)
        .bind(&event.reaction_type)
        .bind(&event.group_key)
        .bind(&event.title)
        .bind(&event.body)
        .bind(event.badge)
        .bind(&event.sound)
        .bind(&event.data)
        .bind(event.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn page(
        &self,
        user_id: &str,
        fetch: i64,
        cursor: Option<Uuid>,
    ) -> Result<Vec<NotificationEvent>, AppError> {
        let user_id = normalize_address(user_id);

        let Some(cursor) = cursor else {
            let events: Vec<NotificationEvent> = sqlx::query_as(
                r#"
                SELECT * FROM notification_events
                WHERE user_id = $1
                ORDER BY created_at DESC, id DESC
                LIMIT $2
                "#,
            )
            .bind(&user_id)
            .bind(fetch)
            .fetch_all(&self.pool)
            .await?;
            return Ok(events);
        };

        let anchor: Option<chrono::DateTime<chrono::Utc>> = sqlx::query_scalar(
            "SELECT created_at FROM notification_events WHERE id = $1 AND user_id = $2",
        )
        .bind(cursor)
        .bind(&user_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(anchor) = anchor else {
            return Err(AppError::Validation(format!("Unknown cursor: {}", cursor)));
        };

        let events: Vec<NotificationEvent> = sqlx::query_as(
            r#"
            SELECT * FROM notification_events
            WHERE user_id = $1 AND (created_at, id) < ($2, $3)
            ORDER BY created_at DESC, id DESC
            LIMIT $4
            "#,
        )
        .bind(&user_id)
        .bind(anchor)
        .bind(cursor)
        .bind(fetch)
        .fetch_all(&self.pool)
        .await?;

        Ok(events)
    }
}

/// In-memory store for tests and local runs.
#[derive(Debug, Default)]
pub struct MemoryEventStore {
    events: Mutex<Vec<NotificationEvent>>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<NotificationEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<NotificationEvent>>, AppError> {
        self.events
            .lock()
            .map_err(|_| AppError::Internal("event store lock poisoned".to_string()))
    }
}

#[async_trait]
impl EventStore for MemoryEventStore {
    async fn insert(&self, event: &NotificationEvent) -> Result<(), AppError> {
        self.lock()?.push(event.clone());
        Ok(())
    }

    async fn page(
        &self,
        user_id: &str,
        fetch: i64,
        cursor: Option<Uuid>,
    ) -> Result<Vec<NotificationEvent>, AppError> {
        let user_id = normalize_address(user_id);
        let mut events: Vec<NotificationEvent> = self
            .lock()?
            .iter()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect();
        events.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));

        let start = match cursor {
            Some(cursor) => match events.iter().position(|e| e.id == cursor) {
                Some(i) => i + 1,
                None => return Err(AppError::Validation(format!("Unknown cursor: {}", cursor))),
            },
            None => 0,
        };

        Ok(events
            .into_iter()
            .skip(start)
            .take(usize::try_from(fetch).unwrap_or(0))
            .collect())
    }
}
