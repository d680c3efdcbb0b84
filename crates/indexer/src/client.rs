//! HTTP client for the content-indexing service.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use futures::{StreamExt, stream};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;

use ripple_common::retry::{RetryPolicy, Sleeper, retry_with_backoff};
use ripple_common::types::{Approval, normalize_address};

use crate::models::{ApprovalsPage, Author, CommentData};
use crate::{ApprovalSource, FetchError, ProfileSource};

/// Page size requested when listing approvals.
const APPROVALS_PAGE_SIZE: u32 = 100;

/// Upper bound on approval pages walked in one sync.
const MAX_APPROVAL_PAGES: u32 = 50;

/// Author lookups in flight at once for one profile batch.
pub const PROFILE_CONCURRENCY: usize = 8;

/// Read-only client for the content indexer's REST API.
#[derive(Clone)]
pub struct IndexerClient {
    client: Client,
    base_url: String,
}

impl IndexerClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent(concat!("ripple/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Single attempt at `GET /api/comments/{id}?chainId=`.
    pub async fn fetch_comment_once(
        &self,
        chain_id: i64,
        comment_id: &str,
    ) -> Result<CommentData, FetchError> {
        let url = format!("{}/api/comments/{}", self.base_url, comment_id);
        self.get_json(&url, &[("chainId", chain_id.to_string())])
            .await
    }

    /// Fetch a comment, retrying failures with exponential backoff.
    ///
    /// With the default policy the waits between attempts are 1s, 2s, 4s, 8s.
    /// Once attempts run out the last error is returned inside
    /// [`FetchError::Exhausted`].
    pub async fn fetch_comment(
        &self,
        chain_id: i64,
        comment_id: &str,
        policy: &RetryPolicy,
        sleeper: &dyn Sleeper,
    ) -> Result<CommentData, FetchError> {
        retry_with_backoff(policy, sleeper, |attempt| {
            tracing::debug!(chain_id, comment_id, attempt, "Fetching comment");
            self.fetch_comment_once(chain_id, comment_id)
        })
        .await
        .map_err(|exhausted| {
            tracing::error!(
                chain_id,
                comment_id,
                attempts = exhausted.attempts,
                error = %exhausted.last_error,
                "Comment fetch failed"
            );
            FetchError::Exhausted {
                attempts: exhausted.attempts,
                last: Box::new(exhausted.last_error),
            }
        })
    }

    /// One page of `GET /api/approvals?app=&chainId=&limit=&offset=`.
    pub async fn fetch_approvals_page(
        &self,
        app: &str,
        chain_id: i64,
        offset: u32,
    ) -> Result<ApprovalsPage, FetchError> {
        let url = format!("{}/api/approvals", self.base_url);
        self.get_json(
            &url,
            &[
                ("app", app.to_string()),
                ("chainId", chain_id.to_string()),
                ("limit", APPROVALS_PAGE_SIZE.to_string()),
                ("offset", offset.to_string()),
            ],
        )
        .await
    }

    /// `GET /api/authors/{address}`; `None` when the indexer has no record.
    pub async fn fetch_author(&self, address: &str) -> Result<Option<Author>, FetchError> {
        let url = format!("{}/api/authors/{}", self.base_url, address);
        match self.get_json::<Author>(&url, &[]).await {
            Ok(author) => Ok(Some(author)),
            Err(FetchError::Status { status: 404, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, FetchError> {
        let response = self.client.get(url).query(query).send().await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        // Decode from text so big integers keep full precision.
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| FetchError::Decode(e.to_string()))
    }
}

#[async_trait]
impl ApprovalSource for IndexerClient {
    async fn approvals_for_app(
        &self,
        app: &str,
        chain_id: i64,
    ) -> Result<Vec<Approval>, FetchError> {
        let mut approvals = Vec::new();
        let mut offset = 0;

        for _ in 0..MAX_APPROVAL_PAGES {
            let page = self.fetch_approvals_page(app, chain_id, offset).await?;
            let fetched = page.results.len() as u32;
            approvals.extend(page.results.into_iter().map(Approval::from));

            if !page.pagination.has_more || fetched == 0 {
                return Ok(approvals);
            }
            offset += fetched;
        }

        tracing::warn!(
            app,
            chain_id,
            fetched = approvals.len(),
            "Stopped paging approvals at page limit"
        );
        Ok(approvals)
    }
}

#[async_trait]
impl ProfileSource for IndexerClient {
    async fn profiles(&self, addresses: &[String]) -> Result<HashMap<String, Author>, FetchError> {
        let mut lookups = stream::iter(addresses.to_vec())
            .map(|address| async move {
                let result = self.fetch_author(&address).await;
                (address, result)
            })
            .buffer_unordered(PROFILE_CONCURRENCY);

        let mut profiles = HashMap::new();
        while let Some((address, result)) = lookups.next().await {
            match result {
                Ok(Some(author)) => {
                    profiles.insert(normalize_address(&address), author);
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(address = %address, error = %e, "Profile lookup failed");
                }
            }
        }
        Ok(profiles)
    }
}
