//! Shared application state for the Axum API server.

use std::sync::Arc;

use redis::aio::ConnectionManager;
use sqlx::PgPool;

use ripple_common::cache::RedisCache;
use ripple_common::config::AppConfig;
use ripple_common::error::AppError;
use ripple_common::queue::{JobQueue, RedisQueue};
use ripple_engine::approvals::{ApprovalResolver, PgApprovalStore};
use ripple_engine::events::PgEventStore;
use ripple_engine::history::HistoryAggregator;
use ripple_engine::profiles::ProfileLookup;
use ripple_indexer::client::IndexerClient;
use ripple_notifier::devices::{DeviceStore, PgDeviceStore};

/// Application state shared across all route handlers via Axum `State`.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub history: Arc<HistoryAggregator>,
    pub resolver: Arc<ApprovalResolver>,
    pub devices: Arc<dyn DeviceStore>,
    pub jobs: Arc<dyn JobQueue>,
}

impl AppState {
    /// Wire the Postgres stores, Redis cache/queue and indexer client.
    pub fn new(pool: PgPool, redis: ConnectionManager, config: AppConfig) -> Result<Self, AppError> {
        let indexer = IndexerClient::new(config.indexer_api_url.clone())?;

        let profiles = ProfileLookup::new(
            Arc::new(indexer.clone()),
            Arc::new(RedisCache::new(redis.clone())),
        )
        .with_ttl(config.profile_cache_ttl_secs);

        let history = HistoryAggregator::new(
            Arc::new(PgEventStore::new(pool.clone())),
            Arc::new(profiles),
        );
        let resolver = ApprovalResolver::new(
            Arc::new(PgApprovalStore::new(pool.clone())),
            Arc::new(indexer),
        );

        Ok(Self {
            config,
            history: Arc::new(history),
            resolver: Arc::new(resolver),
            devices: Arc::new(PgDeviceStore::new(pool)),
            jobs: Arc::new(RedisQueue::new(redis)),
        })
    }
}
