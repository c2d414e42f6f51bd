//! Retry scheduler
//!
//! Periodically resubmits failed transfers found in the latest download
//! snapshot, up to a fixed number of attempts per file.

use crate::model::DownloadRequest;
use crate::service::hub::PollingHub;
use crate::service::transfer::TransferService;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

#[derive(Debug, Clone)]
pub struct RetrySettings {
    pub interval: Duration,
    /// Resubmissions allowed per uploader and file
    pub retry_limit: u32,
    /// Upper bound on one resubmission, including time spent at the gate
    pub dispatch_timeout: Duration,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5 * 60),
            retry_limit: 10,
            dispatch_timeout: Duration::from_secs(30),
        }
    }
}

pub struct RetryScheduler {
    hub: Arc<PollingHub>,
    transfers: Arc<TransferService>,
    settings: RetrySettings,
    /// Resubmissions so far, keyed by (username, filename)
    attempts: Mutex<HashMap<(String, String), u32>>,
}

impl RetryScheduler {
    pub fn new(hub: Arc<PollingHub>, transfers: Arc<TransferService>, settings: RetrySettings) -> Self {
        Self {
            hub,
            transfers,
            settings,
            attempts: Mutex::new(HashMap::new()),
        }
    }

    /// Resubmit every failed file that still has attempts left
    ///
    /// Submissions run in the background; returns how many files were sent.
    pub async fn sweep(&self) -> usize {
        let snapshot = self.hub.snapshot().await;
        let mut by_user: BTreeMap<String, Vec<DownloadRequest>> = BTreeMap::new();

        {
            let mut attempts = self.attempts.lock().await;
            for user in &snapshot {
                for file in user.files().filter(|f| f.is_failed()) {
                    let count = attempts
                        .entry((user.username.clone(), file.filename.clone()))
                        .or_insert(0);
                    if *count >= self.settings.retry_limit {
                        trace!("Retry limit reached for {} from {}", file.filename, user.username);
                        continue;
                    }
                    *count += 1;
                    by_user
                        .entry(user.username.clone())
                        .or_default()
                        .push(file.to_request());
                }
            }
        }

        let mut dispatched = 0;
        for (username, files) in by_user {
            dispatched += files.len();
            let transfers = Arc::clone(&self.transfers);
            let limit = self.settings.dispatch_timeout;
            tokio::spawn(async move {
                match tokio::time::timeout(limit, transfers.initiate_downloads(&username, &files)).await {
                    Ok(true) => debug!("Resubmitted {} files from {}", files.len(), username),
                    Ok(false) => {}
                    Err(_) => warn!("Resubmitting files from {} timed out", username),
                }
            });
        }
        if dispatched > 0 {
            info!("Retrying {} failed transfers", dispatched);
        }
        dispatched
    }

    /// Run the retry loop forever; the first sweep happens after one interval
    pub async fn run_retry_loop(&self) {
        info!("Starting retry loop (interval: {:?})", self.settings.interval);
        let mut interval = tokio::time::interval_at(Instant::now() + self.settings.interval, self.settings.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            self.sweep().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::testing::{transfer_file, transfer_user, FakeDaemon};
    use crate::service::gate::DownloadGate;
    use crate::service::hub::HubSettings;

    async fn fixture(fake: FakeDaemon, settings: RetrySettings) -> (Arc<FakeDaemon>, RetryScheduler) {
        let fake = Arc::new(fake);
        let gate = DownloadGate::new();
        let hub = Arc::new(PollingHub::new(fake.clone(), gate.clone(), HubSettings::default()));
        hub.refresh().await.unwrap();
        let transfers = Arc::new(TransferService::new(fake.clone(), gate));
        (fake, RetryScheduler::new(hub, transfers, settings))
    }

    async fn wait_for_initiated(fake: &FakeDaemon, count: usize) -> usize {
        for _ in 0..100 {
            if fake.initiated.lock().unwrap().len() >= count {
                break;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        fake.initiated.lock().unwrap().len()
    }

    fn snapshot() -> Vec<crate::model::TransferUser> {
        vec![
            transfer_user(
                "kim",
                vec![
                    transfer_file("1", "k\\01.flac", "Completed, Errored", 0),
                    transfer_file("2", "k\\02.flac", "Completed, TimedOut", 0),
                    transfer_file("3", "k\\03.flac", "Completed, Succeeded", 30_000_000),
                ],
            ),
            transfer_user("lee", vec![transfer_file("4", "l\\01.flac", "InProgress", 10)]),
        ]
    }

    #[tokio::test]
    async fn test_sweep_groups_failed_files_by_uploader() {
        let (fake, retry) = fixture(FakeDaemon::new().with_snapshots(vec![snapshot()]), RetrySettings::default()).await;

        assert_eq!(retry.sweep().await, 2);
        assert_eq!(wait_for_initiated(&fake, 1).await, 1);

        let initiated = fake.initiated.lock().unwrap();
        assert_eq!(initiated[0].0, "kim");
        let names: Vec<&str> = initiated[0].1.iter().map(|r| r.filename.as_str()).collect();
        assert_eq!(names, vec!["k\\01.flac", "k\\02.flac"]);
    }

    #[tokio::test]
    async fn test_sweep_respects_retry_limit() {
        let settings = RetrySettings {
            retry_limit: 2,
            ..RetrySettings::default()
        };
        let (fake, retry) = fixture(FakeDaemon::new().with_snapshots(vec![snapshot()]), settings).await;

        assert_eq!(retry.sweep().await, 2);
        assert_eq!(retry.sweep().await, 2);
        assert_eq!(retry.sweep().await, 0);
        assert_eq!(wait_for_initiated(&fake, 2).await, 2);
    }

    #[tokio::test]
    async fn test_sweep_with_nothing_failed() {
        let (fake, retry) = fixture(FakeDaemon::new(), RetrySettings::default()).await;
        assert_eq!(retry.sweep().await, 0);
        assert!(fake.initiated.lock().unwrap().is_empty());
    }
}
