//! Queue consumer loop shared by the comment and notification workers.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;

use ripple_common::queue::JobQueue;

/// How long one blocking pop waits before looping.
const POP_TIMEOUT: Duration = Duration::from_secs(5);

/// Pause after a broker error before polling again.
const ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Pop jobs from `queue` forever, handing each to `handler`.
///
/// Jobs that fail to decode or whose handler fails are dead-lettered; the
/// loop itself only stops if the task is dropped.
pub async fn run<T, F, Fut>(jobs: Arc<dyn JobQueue>, queue: &'static str, handler: F)
where
    T: DeserializeOwned,
    F: Fn(T) -> Fut,
    Fut: Future<Output = anyhow::Result<()>>,
{
    tracing::info!(queue, "Consumer started");

    loop {
        let payload = match jobs.pop(queue, POP_TIMEOUT).await {
            Ok(Some(payload)) => payload,
            Ok(None) => continue,
            Err(e) => {
                tracing::error!(queue, error = %e, "Failed to pop job");
                tokio::time::sleep(ERROR_BACKOFF).await;
                continue;
            }
        };

        process(jobs.as_ref(), queue, payload, &handler).await;
    }
}

/// Decode and handle one payload. Returns whether the job succeeded.
pub async fn process<T, F, Fut>(jobs: &dyn JobQueue, queue: &str, payload: String, handler: &F) -> bool
where
    T: DeserializeOwned,
    F: Fn(T) -> Fut,
    Fut: Future<Output = anyhow::Result<()>>,
{
    let result = match serde_json::from_str::<T>(&payload) {
        Ok(job) => handler(job).await,
        Err(e) => Err(anyhow::anyhow!("Undecodable job: {}", e)),
    };

    let Err(e) = result else {
        return true;
    };

    tracing::error!(queue, error = %e, "Job failed");
    if let Err(dl) = jobs.dead_letter(queue, payload, &format!("{:#}", e)).await {
        tracing::error!(queue, error = %dl, "Failed to dead-letter job");
    }
    false
}
