//! Download gate
//!
//! Admission control for new searches and transfers. The gate is closed
//! while too many uploaders are actively sending us files.

use crate::model::TransferUser;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info};

/// Default ceiling on uploaders with a transfer in progress
pub const DEFAULT_MAX_ACTIVE_UPLOADERS: usize = 30;

/// Number of uploaders with at least one file in progress
pub fn active_uploaders(snapshot: &[TransferUser]) -> usize {
    snapshot.iter().filter(|u| u.has_active_transfer()).count()
}

/// Shared open/closed flag; cloning shares the same gate
#[derive(Debug, Clone)]
pub struct DownloadGate {
    state: Arc<watch::Sender<bool>>,
}

impl DownloadGate {
    /// Create an open gate
    pub fn new() -> Self {
        let (state, _) = watch::channel(true);
        Self { state: Arc::new(state) }
    }

    pub fn is_open(&self) -> bool {
        *self.state.borrow()
    }

    /// Set the gate; opening it wakes every waiter
    pub fn set_open(&self, open: bool) {
        let changed = self.state.send_if_modified(|current| {
            if *current == open {
                false
            } else {
                *current = open;
                true
            }
        });
        if changed {
            if open {
                info!("Download gate opened");
            } else {
                info!("Download gate closed, holding new searches and transfers");
            }
        }
    }

    /// Recompute the gate from a download snapshot
    pub fn update(&self, snapshot: &[TransferUser], max_active_uploaders: usize) -> usize {
        let active = active_uploaders(snapshot);
        debug!("{} uploaders actively transferring (max {})", active, max_active_uploaders);
        self.set_open(active < max_active_uploaders);
        active
    }

    /// Wait until the gate is open
    pub async fn wait_open(&self) {
        let mut rx = self.state.subscribe();
        // The sender lives as long as self, so this only fails after shutdown
        let _ = rx.wait_for(|open| *open).await;
    }
}

impl Default for DownloadGate {
    fn default() -> Self {
        Self::new()
    }
}
