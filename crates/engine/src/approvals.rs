//! Approval resolver.
//!
//! Keeps a local mirror of author → app delegations and answers the fan-out
//! question "which app accounts should hear about this author's activity".

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use sqlx::PgPool;

use ripple_common::error::AppError;
use ripple_common::types::{AppAccount, Approval, normalize_address};
use ripple_indexer::ApprovalSource;

/// Local approval state.
#[async_trait]
pub trait ApprovalStore: Send + Sync {
    async fn upsert_account(&self, id: &str) -> Result<(), AppError>;

    /// Upsert by `(author, app, chain_id)`; remote timestamps win.
    async fn upsert_approvals(&self, approvals: &[Approval]) -> Result<u64, AppError>;

    async fn count_active(&self, app: &str, chain_id: i64) -> Result<i64, AppError>;

    /// Distinct app accounts with an active approval from `author` and at least
    /// one registered device. `None` matches every chain.
    async fn apps_for_author_with_devices(
        &self,
        author: &str,
        chain_id: Option<i64>,
    ) -> Result<Vec<AppAccount>, AppError>;
}

#[derive(Clone)]
pub struct PgApprovalStore {
    pool: PgPool,
}

impl PgApprovalStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ApprovalStore for PgApprovalStore {
    async fn upsert_account(&self, id: &str) -> Result<(), AppError> {
        sqlx::query("INSERT INTO app_accounts (id) VALUES ($1) ON CONFLICT (id) DO NOTHING")
            .bind(normalize_address(id))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn upsert_approvals(&self, approvals: &[Approval]) -> Result<u64, AppError> {
        let mut tx = self.pool.begin().await?;
        let mut written = 0;

        for approval in approvals {
            let result = sqlx::query(
                r#"
                INSERT INTO approvals
                    (author, app, chain_id, tx_hash, log_index, created_at, updated_at, deleted_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                ON CONFLICT (author, app, chain_id) DO UPDATE SET
                    tx_hash = EXCLUDED.tx_hash,
                    log_index = EXCLUDED.log_index,
                    updated_at = EXCLUDED.updated_at,
                    deleted_at = EXCLUDED.deleted_at
                "#,
            )
            .bind(&approval.author)
            .bind(&approval.app)
            .bind(approval.chain_id)
            .bind(&approval.tx_hash)
            .bind(approval.log_index)
            .bind(approval.created_at)
            .bind(approval.updated_at)
            .bind(approval.deleted_at)
            .execute(&mut *tx)
            .await?;
            written += result.rows_affected();
        }

        tx.commit().await?;
        Ok(written)
    }

    async fn count_active(&self, app: &str, chain_id: i64) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM approvals WHERE app = $1 AND chain_id = $2 AND deleted_at IS NULL",
        )
        .bind(normalize_address(app))
        .bind(chain_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn apps_for_author_with_devices(
        &self,
        author: &str,
        chain_id: Option<i64>,
    ) -> Result<Vec<AppAccount>, AppError> {
        let apps: Vec<AppAccount> = sqlx::query_as(
            r#"
            SELECT a.id, a.created_at
            FROM app_accounts a
            WHERE EXISTS (
                SELECT 1 FROM approvals ap
                WHERE ap.app = a.id
                  AND ap.author = $1
                  AND ($2::BIGINT IS NULL OR ap.chain_id = $2)
                  AND ap.deleted_at IS NULL
            )
            AND EXISTS (SELECT 1 FROM device_registrations d WHERE d.user_id = a.id)
            ORDER BY a.id
            "#,
        )
        .bind(normalize_address(author))
        .bind(chain_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(apps)
    }
}

/// Outcome of [`ApprovalResolver::sync`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResult {
    pub approved: bool,
    pub approvals_count: i64,
}

pub struct ApprovalResolver {
    store: Arc<dyn ApprovalStore>,
    source: Arc<dyn ApprovalSource>,
}

impl ApprovalResolver {
    pub fn new(store: Arc<dyn ApprovalStore>, source: Arc<dyn ApprovalSource>) -> Self {
        Self { store, source }
    }

    /// Refresh the local mirror for `app` and report whether it holds any active approval.
    ///
    /// The account upsert and the approval import are independent best-effort
    /// steps. Only a failure of the final count changes the answer, to
    /// `approved: false`.
    pub async fn sync(&self, app: &str, chain_id: i64) -> SyncResult {
        let app = normalize_address(app);

        if let Err(e) = self.store.upsert_account(&app).await {
            tracing::warn!(app = %app, error = %e, "Failed to upsert app account");
        }

        match self.import_approvals(&app, chain_id).await {
            Ok(written) => tracing::info!(app = %app, chain_id, written, "Approvals imported"),
            Err(e) => {
                tracing::warn!(app = %app, chain_id, error = %e, "Approval import failed, using local state")
            }
        }

        match self.store.count_active(&app, chain_id).await {
            Ok(count) => SyncResult {
                approved: count > 0,
                approvals_count: count,
            },
            Err(e) => {
                tracing::error!(app = %app, chain_id, error = %e, "Failed to count approvals");
                SyncResult::default()
            }
        }
    }

    async fn import_approvals(&self, app: &str, chain_id: i64) -> Result<u64, AppError> {
        let approvals = self.source.approvals_for_app(app, chain_id).await?;
        self.store.upsert_approvals(&approvals).await
    }

    /// App accounts that should receive pushes for `author`'s activity.
    pub async fn resolve_apps_for_author(
        &self,
        author: &str,
        chain_id: Option<i64>,
    ) -> Result<Vec<AppAccount>, AppError> {
        self.store
            .apps_for_author_with_devices(&normalize_address(author), chain_id)
            .await
    }
}
