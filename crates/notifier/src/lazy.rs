//! Single-flight lazy initialization for long-lived connections.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Mutex;

/// Holds a connection that is created on first use and can be released.
///
/// Concurrent first callers queue on the same lock, so exactly one
/// initialization runs and every caller receives its result. A failed
/// initialization leaves the slot empty and the next caller tries again.
pub struct LazyConnection<T> {
    slot: Mutex<Option<Arc<T>>>,
}

impl<T> Default for LazyConnection<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> LazyConnection<T> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    pub async fn get_or_try_init<E, F, Fut>(&self, init: F) -> Result<Arc<T>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut slot = self.slot.lock().await;
        if let Some(conn) = slot.as_ref() {
            return Ok(Arc::clone(conn));
        }

        let conn = Arc::new(init().await?);
        *slot = Some(Arc::clone(&conn));
        Ok(conn)
    }

    /// Release the connection. The next `get_or_try_init` creates a fresh one.
    pub async fn take(&self) -> Option<Arc<T>> {
        self.slot.lock().await.take()
    }

    pub async fn is_initialized(&self) -> bool {
        self.slot.lock().await.is_some()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use futures::future::join_all;

    use super::*;

    #[tokio::test]
    async fn test_concurrent_first_calls_initialize_once() {
        let lazy = Arc::new(LazyConnection::<u32>::new());
        let inits = Arc::new(AtomicU32::new(0));

        let callers = (0..16).map(|_| {
            let lazy = Arc::clone(&lazy);
            let inits = Arc::clone(&inits);
            tokio::spawn(async move {
                lazy.get_or_try_init(|| async {
                    inits.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    Ok::<_, String>(7)
                })
                .await
                .map(|v| *v)
            })
        });

        for result in join_all(callers).await {
            assert_eq!(result.unwrap(), Ok(7));
        }
        assert_eq!(inits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_init_is_retried_and_take_resets() {
        let lazy = LazyConnection::<u32>::new();

        let err = lazy
            .get_or_try_init(|| async { Err::<u32, _>("no key".to_string()) })
            .await;
        assert!(err.is_err());
        assert!(!lazy.is_initialized().await);

        let value = lazy
            .get_or_try_init(|| async { Ok::<_, String>(1) })
            .await
            .unwrap();
        assert_eq!(*value, 1);

        assert!(lazy.take().await.is_some());
        assert!(!lazy.is_initialized().await);
    }
}
