//! Comment fetcher: indexer lookups with bounded retry, memoized in the result cache.

use std::sync::Arc;

use async_trait::async_trait;

use ripple_common::cache::{CacheBackend, with_cache};
use ripple_common::retry::{RetryPolicy, Sleeper, TokioSleeper};

use crate::client::IndexerClient;
use crate::models::CommentData;
use crate::{CommentSource, FetchError};

/// Default comment cache lifetime: two days.
pub const DEFAULT_COMMENT_TTL_SECS: u64 = 2 * 24 * 60 * 60;

pub struct CommentFetcher {
    client: IndexerClient,
    cache: Arc<dyn CacheBackend>,
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
    ttl_seconds: u64,
}

impl CommentFetcher {
    pub fn new(client: IndexerClient, cache: Arc<dyn CacheBackend>, policy: RetryPolicy) -> Self {
        Self {
            client,
            cache,
            policy,
            sleeper: Arc::new(TokioSleeper),
            ttl_seconds: DEFAULT_COMMENT_TTL_SECS,
        }
    }

    pub fn with_ttl(mut self, ttl_seconds: u64) -> Self {
        self.ttl_seconds = ttl_seconds;
        self
    }

    /// Replace the backoff sleeper (tests inject one that does not wait).
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn cache_key(chain_id: i64, comment_id: &str) -> String {
        format!("comment:{}:{}", chain_id, comment_id)
    }
}

#[async_trait]
impl CommentSource for CommentFetcher {
    async fn comment(&self, chain_id: i64, comment_id: &str) -> Result<CommentData, FetchError> {
        let key = Self::cache_key(chain_id, comment_id);
        with_cache(self.cache.as_ref(), &key, self.ttl_seconds, || {
            self.client
                .fetch_comment(chain_id, comment_id, &self.policy, self.sleeper.as_ref())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use ripple_common::cache::MemoryCache;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[tokio::test]
    async fn test_cached_fetch_hits_network_once() {
        let server = MockServer::start().await;
        let body = r#"{
            "id": "0xc1",
            "author": { "address": "0xaaa" },
            "content": "gm",
            "channelId": 340282366920938463463374607431768211457
        }"#;
        Mock::given(method("GET"))
            .and(path("/api/comments/0xc1"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/json"))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = CommentFetcher::new(
            IndexerClient::new(server.uri()).unwrap(),
            Arc::new(MemoryCache::new()),
            RetryPolicy::new(1, 0),
        );

        let first = fetcher.comment(8453, "0xc1").await.unwrap();
        let second = fetcher.comment(8453, "0xc1").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(
            second.channel_id.unwrap().to_string(),
            "340282366920938463463374607431768211457"
        );
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }

    #[test]
    fn test_cache_is_scoped_by_chain() {
        assert_ne!(
            CommentFetcher::cache_key(1, "0xc1"),
            CommentFetcher::cache_key(8453, "0xc1")
        );
    }
}
