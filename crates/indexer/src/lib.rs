//! Client side of the content-indexing service.
//!
//! - [`client::IndexerClient`] speaks HTTP to the indexer (comments, approvals, author profiles)
//! - [`fetcher::CommentFetcher`] adds bounded retry and the result cache on top of it
//!
//! Consumers depend on the source traits below so they can be exercised
//! without a network.

pub mod client;
pub mod fetcher;
pub mod models;

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

use ripple_common::error::AppError;
use ripple_common::types::Approval;

use crate::models::{Author, CommentData};

/// Failure talking to the content indexer.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Indexer returned status {status} for {url}")]
    Status { status: u16, url: String },

    #[error("Failed to decode indexer response: {0}")]
    Decode(String),

    #[error("Giving up after {attempts} attempts: {last}")]
    Exhausted {
        attempts: u32,
        #[source]
        last: Box<FetchError>,
    },
}

impl From<FetchError> for AppError {
    fn from(e: FetchError) -> Self {
        AppError::Fetch(e.to_string())
    }
}

/// Loads comments by id.
#[async_trait]
pub trait CommentSource: Send + Sync {
    async fn comment(&self, chain_id: i64, comment_id: &str) -> Result<CommentData, FetchError>;
}

/// Lists the approvals granted to an app account.
#[async_trait]
pub trait ApprovalSource: Send + Sync {
    async fn approvals_for_app(&self, app: &str, chain_id: i64)
    -> Result<Vec<Approval>, FetchError>;
}

/// Resolves display profiles for a batch of addresses.
#[async_trait]
pub trait ProfileSource: Send + Sync {
    /// Returns profiles keyed by lowercased address. Addresses the indexer
    /// does not know are simply absent from the map.
    async fn profiles(&self, addresses: &[String]) -> Result<HashMap<String, Author>, FetchError>;
}
