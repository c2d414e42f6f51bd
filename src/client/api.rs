//! Daemon API abstraction
//!
//! The orchestration code only talks to the daemon through these traits,
//! so the HTTP client can be swapped for an in-memory one.

use crate::model::{DownloadRequest, RawResult, SearchState, TransferUser};
use anyhow::Result;
use async_trait::async_trait;

/// Search endpoints
#[async_trait]
pub trait SearchApi: Send + Sync {
    /// Every search the daemon still remembers, oldest first
    async fn list_searches(&self) -> Result<Vec<SearchState>>;

    /// Start a new search for `text`
    async fn start_search(&self, text: &str) -> Result<SearchState>;

    /// Current state of a search
    async fn search_state(&self, id: &str) -> Result<SearchState>;

    /// Responses gathered by a search
    async fn search_responses(&self, id: &str) -> Result<Vec<RawResult>>;
}

/// Transfer endpoints
#[async_trait]
pub trait DownloadApi: Send + Sync {
    /// Every download the daemon knows about, grouped by uploader
    async fn all_downloads(&self) -> Result<Vec<TransferUser>>;

    /// Enqueue `files` from `username`
    async fn initiate_downloads(&self, username: &str, files: &[DownloadRequest]) -> Result<()>;

    /// Cancel one transfer, optionally removing it from the daemon's list
    ///
    /// With `remove` set the daemon cancels the transfer first and then
    /// drops it, all in one request.
    async fn cancel_download(&self, username: &str, id: &str, remove: bool) -> Result<()>;
}
