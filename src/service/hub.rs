//! Polling hub
//!
//! Polls the daemon's download list once per refresh interval, keeps the
//! latest snapshot, drives the download gate and fans out per-uploader
//! status updates to subscribers.

use crate::client::DownloadApi;
use crate::model::{TransferFile, TransferUser};
use crate::service::gate::{DownloadGate, DEFAULT_MAX_ACTIVE_UPLOADERS};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, trace};

/// Polling hub settings
#[derive(Debug, Clone)]
pub struct HubSettings {
    /// How often the download list is fetched
    pub refresh_interval: Duration,
    /// Status updates go out on every n-th refresh
    pub dispatch_every: u64,
    /// Gate closes at this many actively transferring uploaders
    pub max_active_uploaders: usize,
}

impl Default for HubSettings {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(1),
            dispatch_every: 10,
            max_active_uploaders: DEFAULT_MAX_ACTIVE_UPLOADERS,
        }
    }
}

/// Handle returned by [`PollingHub::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// What one subscriber sees on a dispatch
#[derive(Debug, Clone)]
pub struct StatusUpdate {
    pub subscription: SubscriptionId,
    pub username: String,
    /// Files from the snapshot claimed by this subscription; may be empty
    pub files: Vec<TransferFile>,
    /// Every file the uploader currently has in the snapshot
    pub uploader_files: Vec<TransferFile>,
}

/// Receives status updates for a subscription
#[async_trait]
pub trait StatusListener: Send + Sync {
    async fn on_status(&self, update: StatusUpdate);
}

struct Subscription {
    id: SubscriptionId,
    filenames: HashSet<String>,
    listener: Arc<dyn StatusListener>,
}

/// Shared download-list poller
pub struct PollingHub {
    api: Arc<dyn DownloadApi>,
    gate: DownloadGate,
    settings: HubSettings,
    /// Latest download list; the gate is only updated while this is write-locked
    snapshot: RwLock<Vec<TransferUser>>,
    /// Subscriptions per uploader, in subscription order
    subscriptions: RwLock<HashMap<String, Vec<Subscription>>>,
    next_id: AtomicU64,
    ticks: AtomicU64,
}

impl PollingHub {
    pub fn new(api: Arc<dyn DownloadApi>, gate: DownloadGate, settings: HubSettings) -> Self {
        Self {
            api,
            gate,
            settings,
            snapshot: RwLock::new(Vec::new()),
            subscriptions: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(0),
            ticks: AtomicU64::new(0),
        }
    }

    pub fn gate(&self) -> &DownloadGate {
        &self.gate
    }

    /// Copy of the latest download list
    pub async fn snapshot(&self) -> Vec<TransferUser> {
        self.snapshot.read().await.clone()
    }

    /// Register interest in a set of files from one uploader
    pub async fn subscribe(
        &self,
        username: &str,
        filenames: HashSet<String>,
        listener: Arc<dyn StatusListener>,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        debug!("Subscribing {:?} to {} files from {}", id, filenames.len(), username);
        self.subscriptions
            .write()
            .await
            .entry(username.to_string())
            .or_default()
            .push(Subscription { id, filenames, listener });
        id
    }

    /// Remove a subscription; returns false if it was already gone
    pub async fn unsubscribe(&self, username: &str, filenames: &HashSet<String>, id: SubscriptionId) -> bool {
        let mut subscriptions = self.subscriptions.write().await;
        let Some(list) = subscriptions.get_mut(username) else {
            return false;
        };
        let before = list.len();
        list.retain(|s| !(s.id == id && &s.filenames == filenames));
        let removed = list.len() < before;
        if list.is_empty() {
            subscriptions.remove(username);
        }
        if removed {
            debug!("Unsubscribed {:?} from {}", id, username);
        }
        removed
    }

    /// Number of live subscriptions for an uploader
    pub async fn subscription_count(&self, username: &str) -> usize {
        self.subscriptions.read().await.get(username).map_or(0, Vec::len)
    }

    /// Fetch the download list, then store it and recompute the gate together
    pub async fn refresh(&self) -> Result<()> {
        let users = self.api.all_downloads().await?;
        let mut snapshot = self.snapshot.write().await;
        let active = self.gate.update(&users, self.settings.max_active_uploaders);
        trace!("Snapshot refreshed: {} uploaders, {} active", users.len(), active);
        *snapshot = users;
        Ok(())
    }

    /// Partition the snapshot among subscribers and notify each one
    ///
    /// A file goes to the first subscription of its uploader whose filename
    /// set contains it. Subscriptions that claim nothing still receive an
    /// empty update. Listeners run on their own tasks.
    pub async fn dispatch(&self) -> usize {
        let snapshot = self.snapshot.read().await;
        let subscriptions = self.subscriptions.read().await;

        let mut updates = Vec::new();
        for (username, subs) in subscriptions.iter() {
            let uploader_files: Vec<TransferFile> = snapshot
                .iter()
                .filter(|u| &u.username == username)
                .flat_map(|u| u.files().cloned())
                .collect();

            let mut buckets: Vec<Vec<TransferFile>> = vec![Vec::new(); subs.len()];
            for file in &uploader_files {
                if let Some(index) = subs.iter().position(|s| s.filenames.contains(&file.filename)) {
                    buckets[index].push(file.clone());
                }
            }

            for (sub, files) in subs.iter().zip(buckets) {
                let update = StatusUpdate {
                    subscription: sub.id,
                    username: username.clone(),
                    files,
                    uploader_files: uploader_files.clone(),
                };
                updates.push((Arc::clone(&sub.listener), update));
            }
        }
        drop(subscriptions);
        drop(snapshot);

        let count = updates.len();
        for (listener, update) in updates {
            tokio::spawn(async move { listener.on_status(update).await });
        }
        if count > 0 {
            debug!("Dispatched {} status updates", count);
        }
        count
    }

    /// One poll cycle
    pub async fn tick(&self) {
        if let Err(e) = self.refresh().await {
            error!("Error refreshing download list: {}", e);
        }
        let tick = self.ticks.fetch_add(1, Ordering::Relaxed) + 1;
        if tick % self.settings.dispatch_every.max(1) == 0 {
            self.dispatch().await;
        }
    }

    /// Run the polling loop forever
    pub async fn run_polling_loop(&self) {
        info!(
            "Starting download polling loop (interval: {:?}, updates every {} polls)",
            self.settings.refresh_interval, self.settings.dispatch_every
        );
        let mut interval = tokio::time::interval(self.settings.refresh_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            self.tick().await;
        }
    }
}
