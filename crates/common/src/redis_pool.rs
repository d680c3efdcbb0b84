use redis::Client;
use redis::aio::ConnectionManager;

/// Create a Redis connection manager shared by the result cache and the job queues.
///
/// `ConnectionManager` reconnects on its own, so callers clone it freely.
pub async fn create_redis_pool(redis_url: &str) -> anyhow::Result<ConnectionManager> {
    let client = Client::open(redis_url)?;
    let manager = ConnectionManager::new(client).await?;

    tracing::info!("Connected to Redis");
    Ok(manager)
}
