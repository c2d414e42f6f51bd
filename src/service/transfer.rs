//! Transfer service
//!
//! Gated wrapper around the daemon's enqueue and cancel endpoints.

use crate::client::DownloadApi;
use crate::model::DownloadRequest;
use crate::service::gate::DownloadGate;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct TransferService {
    api: Arc<dyn DownloadApi>,
    gate: DownloadGate,
}

impl TransferService {
    pub fn new(api: Arc<dyn DownloadApi>, gate: DownloadGate) -> Self {
        Self { api, gate }
    }

    /// Enqueue files from one uploader once the gate is open
    ///
    /// Returns false if the daemon rejected the request.
    pub async fn initiate_downloads(&self, username: &str, files: &[DownloadRequest]) -> bool {
        self.gate.wait_open().await;
        match self.api.initiate_downloads(username, files).await {
            Ok(()) => {
                debug!("Enqueued {} files from {}", files.len(), username);
                true
            }
            Err(e) => {
                warn!("Failed to enqueue {} files from {}: {}", files.len(), username, e);
                false
            }
        }
    }

    /// Cancel transfers by id, optionally removing them from the daemon's list
    ///
    /// `remove = true` is cancel-then-remove: the daemon stops the transfer
    /// and deletes its entry in the same `DELETE ?remove=true` call, so one
    /// request per id is enough. Returns how many cancellations the daemon
    /// accepted.
    pub async fn cancel_downloads(&self, username: &str, ids: &[String], remove: bool) -> usize {
        let mut cancelled = 0;
        for id in ids {
            match self.api.cancel_download(username, id, remove).await {
                Ok(()) => cancelled += 1,
                Err(e) => warn!("Failed to cancel transfer {} from {}: {}", id, username, e),
            }
        }
        cancelled
    }
}
