//! Cached, batched profile lookup for display enrichment.

use std::collections::HashMap;
use std::sync::Arc;

use ripple_common::cache::CacheBackend;
use ripple_common::types::normalize_address;
use ripple_indexer::ProfileSource;
use ripple_indexer::models::Author;

/// Default profile cache lifetime: one hour.
pub const DEFAULT_PROFILE_TTL_SECS: u64 = 60 * 60;

pub struct ProfileLookup {
    source: Arc<dyn ProfileSource>,
    cache: Arc<dyn CacheBackend>,
    ttl_seconds: u64,
}

impl ProfileLookup {
    pub fn new(source: Arc<dyn ProfileSource>, cache: Arc<dyn CacheBackend>) -> Self {
        Self {
            source,
            cache,
            ttl_seconds: DEFAULT_PROFILE_TTL_SECS,
        }
    }

    pub fn with_ttl(mut self, ttl_seconds: u64) -> Self {
        self.ttl_seconds = ttl_seconds;
        self
    }

    fn cache_key(address: &str) -> String {
        format!("profile:{}", address)
    }

    /// Profiles keyed by lowercased address, one entry per distinct input.
    ///
    /// Cached profiles are served directly; the rest are fetched in a single
    /// batch. Addresses the indexer cannot resolve (or any lookup failure)
    /// fall back to a bare profile, so this never fails.
    pub async fn lookup(&self, addresses: &[String]) -> HashMap<String, Author> {
        let mut distinct: Vec<String> = Vec::new();
        for address in addresses {
            let address = normalize_address(address);
            if !address.is_empty() && !distinct.contains(&address) {
                distinct.push(address);
            }
        }

        let mut profiles = HashMap::with_capacity(distinct.len());
        let mut misses = Vec::new();

        for address in distinct {
            match self.cache.get(&Self::cache_key(&address)).await {
                Ok(Some(raw)) => match serde_json::from_str::<Author>(&raw) {
                    Ok(author) => {
                        profiles.insert(address, author);
                        continue;
                    }
                    Err(e) => tracing::warn!(address = %address, error = %e, "Discarding cached profile"),
                },
                Ok(None) => {}
                Err(e) => tracing::warn!(address = %address, error = %e, "Profile cache read failed"),
            }
            misses.push(address);
        }

        if misses.is_empty() {
            return profiles;
        }

        let fetched = match self.source.profiles(&misses).await {
            Ok(fetched) => fetched,
            Err(e) => {
                tracing::warn!(count = misses.len(), error = %e, "Profile batch lookup failed");
                HashMap::new()
            }
        };

        for address in misses {
            match fetched.get(&address) {
                Some(author) => {
                    if let Ok(raw) = serde_json::to_string(author)
                        && let Err(e) = self
                            .cache
                            .set(&Self::cache_key(&address), raw, self.ttl_seconds)
                            .await
                    {
                        tracing::warn!(address = %address, error = %e, "Profile cache write failed");
                    }
                    profiles.insert(address, author.clone());
                }
                None => {
                    let bare = Author::bare(&address);
                    profiles.insert(address, bare);
                }
            }
        }

        profiles
    }
}
