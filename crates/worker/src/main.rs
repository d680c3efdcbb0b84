//! Ripple queue worker.
//!
//! Usage: `ripple-worker [comments|notifications|all]` (default `all`).

mod consumer;

use std::sync::Arc;

use ripple_common::cache::RedisCache;
use ripple_common::config::AppConfig;
use ripple_common::db;
use ripple_common::queue::{COMMENTS_QUEUE, JobQueue, NOTIFICATIONS_QUEUE, RedisQueue};
use ripple_common::redis_pool::create_redis_pool;
use ripple_common::retry::RetryPolicy;
use ripple_common::types::{CommentJob, NotificationJob};
use ripple_engine::approvals::{ApprovalResolver, PgApprovalStore};
use ripple_engine::enrichment::CommentEnrichmentWorker;
use ripple_engine::events::PgEventStore;
use ripple_engine::fanout::NotificationFanout;
use ripple_indexer::client::IndexerClient;
use ripple_indexer::fetcher::CommentFetcher;
use ripple_notifier::apns::ApnsClient;
use ripple_notifier::delivery::PushDelivery;
use ripple_notifier::devices::PgDeviceStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Comments,
    Notifications,
    All,
}

impl Role {
    fn parse(arg: Option<&str>) -> anyhow::Result<Self> {
        match arg {
            None | Some("all") => Ok(Role::All),
            Some("comments") => Ok(Role::Comments),
            Some("notifications") => Ok(Role::Notifications),
            Some(other) => anyhow::bail!(
                "unknown worker role '{}', expected comments, notifications or all",
                other
            ),
        }
    }

    fn runs_comments(self) -> bool {
        matches!(self, Role::Comments | Role::All)
    }

    fn runs_notifications(self) -> bool {
        matches!(self, Role::Notifications | Role::All)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "ripple_worker=info,ripple_engine=info,ripple_notifier=info,ripple_indexer=info"
                    .into()
            }),
        )
        .json()
        .init();

    let role = Role::parse(std::env::args().nth(1).as_deref())?;
    tracing::info!(role = ?role, "Ripple worker starting...");

    // Load configuration
    let config = AppConfig::from_env()?;

    // Connect to database
    let pool = db::create_pool(&config.database_url, config.db_max_connections).await?;
    db::run_migrations(&pool).await?;

    // Shared connection for cache reads/writes and enqueueing
    let redis = create_redis_pool(&config.redis_url).await?;
    let jobs: Arc<dyn JobQueue> = Arc::new(RedisQueue::new(redis.clone()));

    let indexer = IndexerClient::new(config.indexer_api_url.clone())?;
    let apns = Arc::new(ApnsClient::new(config.apns.clone()));

    let mut consumers = tokio::task::JoinSet::new();

    if role.runs_comments() {
        let fetcher = CommentFetcher::new(
            indexer.clone(),
            Arc::new(RedisCache::new(redis.clone())),
            RetryPolicy::new(config.fetch_max_attempts, config.fetch_initial_delay_ms),
        )
        .with_ttl(config.comment_cache_ttl_secs);
        let worker = Arc::new(CommentEnrichmentWorker::new(Arc::new(fetcher), jobs.clone()));

        // BRPOP blocks its connection, so each consumer pops on its own
        let source: Arc<dyn JobQueue> =
            Arc::new(RedisQueue::new(create_redis_pool(&config.redis_url).await?));

        consumers.spawn(consumer::run(source, COMMENTS_QUEUE, move |job: CommentJob| {
            let worker = worker.clone();
            async move { worker.on_comment_job(&job).await.map(|_| ()) }
        }));
    }

    if role.runs_notifications() {
        let resolver = ApprovalResolver::new(
            Arc::new(PgApprovalStore::new(pool.clone())),
            Arc::new(indexer.clone()),
        );
        let delivery = PushDelivery::new(Arc::new(PgDeviceStore::new(pool.clone())), apns.clone());
        let fanout = Arc::new(
            NotificationFanout::new(Arc::new(resolver), Arc::new(delivery))
                .with_event_store(Arc::new(PgEventStore::new(pool.clone()))),
        );

        let source: Arc<dyn JobQueue> =
            Arc::new(RedisQueue::new(create_redis_pool(&config.redis_url).await?));

        consumers.spawn(consumer::run(
            source,
            NOTIFICATIONS_QUEUE,
            move |job: NotificationJob| {
                let fanout = fanout.clone();
                async move { fanout.on_notification_job(&job).await.map(|_| ()) }
            },
        ));
    }

    // Run with graceful shutdown on Ctrl+C
    tokio::select! {
        Some(result) = consumers.join_next() => {
            if let Err(e) = result {
                tracing::error!(error = %e, "Consumer task exited unexpectedly");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received shutdown signal, stopping gracefully...");
        }
    }

    consumers.shutdown().await;
    apns.shutdown().await;

    tracing::info!("Ripple worker stopped.");
    Ok(())
}
