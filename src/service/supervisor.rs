//! Download supervisor
//!
//! Drives one release through its ranked uploaders: enqueue the files from
//! one uploader, watch status updates from the polling hub, and either
//! finish, clean up, or move on to the next uploader.

use crate::matcher::{RankedResult, UploaderCandidateSet};
use crate::model::{DownloadRequest, ReleaseSpec, TransferFile};
use crate::service::hub::{PollingHub, StatusListener, StatusUpdate, SubscriptionId};
use crate::service::transfer::TransferService;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, info, trace, warn};

/// Minimum uploader score worth trying
pub const DEFAULT_MIN_SCORE: f64 = 0.8;

/// Final result for one release
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// Every file downloaded
    Ok,
    /// At least one uploader was tried and none delivered
    TriedFailed,
    /// A decision maker declined the release
    ExplicitlySkipped,
    /// No uploader qualified
    DidntTry,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Outcome::Ok => "OK",
            Outcome::TriedFailed => "TRIED_FAILED",
            Outcome::ExplicitlySkipped => "EXPLICITLY_SKIPPED",
            Outcome::DidntTry => "DIDNT_TRY",
        };
        f.write_str(s)
    }
}

/// Thresholds for giving up on an uploader
#[derive(Debug, Clone)]
pub struct SupervisorPolicy {
    pub min_score: f64,
    /// Consecutive updates with none of our files listed
    pub empty_limit: u32,
    /// Consecutive updates with transfers running but no bytes moving
    pub stale_limit: u32,
    /// Consecutive updates with nothing running at all
    pub idle_limit: u32,
    /// Accumulated failures per file before giving up
    pub failure_ratio_limit: usize,
}

impl Default for SupervisorPolicy {
    fn default() -> Self {
        Self {
            min_score: DEFAULT_MIN_SCORE,
            empty_limit: 5,
            stale_limit: 6,
            idle_limit: 12,
            failure_ratio_limit: 10,
        }
    }
}

/// Progress on the uploader currently being tried
#[derive(Debug)]
struct Tracker {
    target: UploaderCandidateSet,
    filenames: HashSet<String>,
    subscription: SubscriptionId,
    failure_count: usize,
    times_empty: u32,
    times_stale: u32,
    times_idle: u32,
    /// Bytes transferred per transfer id at the previous update
    last_bytes: HashMap<String, u64>,
}

impl Tracker {
    fn new(target: UploaderCandidateSet, subscription: SubscriptionId) -> Self {
        let filenames = target.filenames();
        Self {
            target,
            filenames,
            subscription,
            failure_count: 0,
            times_empty: 0,
            times_stale: 0,
            times_idle: 0,
            last_bytes: HashMap::new(),
        }
    }
}

/// What to do after a status update
#[derive(Debug, PartialEq)]
enum Action {
    Wait,
    Succeed,
    /// Give up on the uploader, cancelling and removing these transfers first
    Abandon { cancel: Vec<String>, reason: &'static str },
    /// Cancel and remove surplus copies of the same file
    Deduplicate(Vec<String>),
    Resubmit(Vec<DownloadRequest>),
}

#[derive(Debug, Default)]
struct SupervisorState {
    /// Index of the next candidate to try
    position: usize,
    tracker: Option<Tracker>,
}

/// Clears the busy flag on drop
struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn try_acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| BusyGuard(flag))
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn ids(files: &[TransferFile]) -> Vec<String> {
    files.iter().map(|f| f.id.clone()).collect()
}

pub struct DownloadSupervisor {
    release: ReleaseSpec,
    candidates: Vec<UploaderCandidateSet>,
    policy: SupervisorPolicy,
    transfers: Arc<TransferService>,
    hub: Arc<PollingHub>,
    /// Updates that arrive while another is being handled are dropped
    busy: AtomicBool,
    state: Mutex<SupervisorState>,
    outcome: std::sync::Mutex<Option<oneshot::Sender<Outcome>>>,
    this: Weak<DownloadSupervisor>,
}

/// Running supervisor plus the receiving end of its outcome
pub struct SupervisorHandle {
    supervisor: Arc<DownloadSupervisor>,
    outcome: oneshot::Receiver<Outcome>,
}

impl SupervisorHandle {
    pub fn supervisor(&self) -> &Arc<DownloadSupervisor> {
        &self.supervisor
    }

    /// Wait for the release to resolve
    pub async fn outcome(self) -> Outcome {
        self.outcome.await.unwrap_or(Outcome::TriedFailed)
    }
}

impl DownloadSupervisor {
    /// Start supervising a ranked result
    ///
    /// Only uploaders scoring at least `min_score` and offering exactly one
    /// file per track are tried, best first.
    pub async fn apply(
        ranked: RankedResult,
        transfers: Arc<TransferService>,
        hub: Arc<PollingHub>,
        policy: SupervisorPolicy,
    ) -> SupervisorHandle {
        let track_count = ranked.release.track_count();
        let candidates: Vec<UploaderCandidateSet> = ranked
            .uploaders
            .into_iter()
            .filter(|u| u.score >= policy.min_score && u.best_candidates.len() == track_count)
            .collect();
        let (tx, rx) = oneshot::channel();

        let supervisor = Arc::new_cyclic(|this| DownloadSupervisor {
            release: ranked.release,
            candidates,
            policy,
            transfers,
            hub,
            busy: AtomicBool::new(false),
            state: Mutex::new(SupervisorState::default()),
            outcome: std::sync::Mutex::new(Some(tx)),
            this: this.clone(),
        });

        if supervisor.candidates.is_empty() {
            info!("No qualifying uploaders for '{}'", supervisor.release.search_string());
            supervisor.resolve(Outcome::DidntTry);
        } else {
            info!(
                "{} qualifying uploaders for '{}'",
                supervisor.candidates.len(),
                supervisor.release.search_string()
            );
            let _busy = BusyGuard::try_acquire(&supervisor.busy);
            let mut state = supervisor.state.lock().await;
            supervisor.advance(&mut state).await;
        }

        SupervisorHandle {
            supervisor,
            outcome: rx,
        }
    }

    pub fn release(&self) -> &ReleaseSpec {
        &self.release
    }

    /// Uploader and subscription currently being tried
    pub async fn current_attempt(&self) -> Option<(String, SubscriptionId)> {
        let state = self.state.lock().await;
        state
            .tracker
            .as_ref()
            .map(|t| (t.target.username.clone(), t.subscription))
    }

    fn resolve(&self, outcome: Outcome) {
        let sender = self.outcome.lock().ok().and_then(|mut slot| slot.take());
        if let Some(sender) = sender {
            info!("'{}' finished: {}", self.release.search_string(), outcome);
            let _ = sender.send(outcome);
        }
    }

    /// Try candidates from the current position until one accepts an enqueue
    async fn advance(&self, state: &mut SupervisorState) {
        let Some(listener) = self.this.upgrade() else {
            return;
        };
        let listener: Arc<dyn StatusListener> = listener;

        while let Some(target) = self.candidates.get(state.position).cloned() {
            state.position += 1;
            let username = target.username.clone();
            let requests = target.download_requests();
            info!(
                "Trying {} for '{}' ({} files, score {:.2})",
                username,
                self.release.search_string(),
                requests.len(),
                target.score
            );

            let subscription = self
                .hub
                .subscribe(&username, target.filenames(), Arc::clone(&listener))
                .await;
            let tracker = Tracker::new(target, subscription);

            if self.transfers.initiate_downloads(&username, &requests).await {
                state.tracker = Some(tracker);
                return;
            }
            warn!("{} rejected the download request, moving on", username);
            self.hub
                .unsubscribe(&username, &tracker.filenames, subscription)
                .await;
        }

        state.tracker = None;
        self.resolve(Outcome::TriedFailed);
    }

    async fn handle_update(&self, update: StatusUpdate) {
        let mut state = self.state.lock().await;
        let track_count = self.release.track_count();
        let policy = &self.policy;

        let action = match state.tracker.as_mut() {
            Some(tracker) if tracker.subscription == update.subscription => {
                evaluate(tracker, &update, track_count, policy)
            }
            _ => {
                trace!("Ignoring stale update for {:?}", update.subscription);
                return;
            }
        };

        match action {
            Action::Wait => {}
            Action::Succeed => {
                if let Some(tracker) = state.tracker.take() {
                    self.hub
                        .unsubscribe(&update.username, &tracker.filenames, tracker.subscription)
                        .await;
                }
                self.resolve(Outcome::Ok);
            }
            Action::Abandon { cancel, reason } => {
                info!("Giving up on {}: {}", update.username, reason);
                if let Some(tracker) = state.tracker.take() {
                    self.hub
                        .unsubscribe(&update.username, &tracker.filenames, tracker.subscription)
                        .await;
                }
                if !cancel.is_empty() {
                    self.transfers
                        .cancel_downloads(&update.username, &cancel, true)
                        .await;
                }
                self.advance(&mut state).await;
            }
            Action::Deduplicate(duplicates) => {
                debug!("Removing {} duplicate transfers from {}", duplicates.len(), update.username);
                self.transfers
                    .cancel_downloads(&update.username, &duplicates, true)
                    .await;
            }
            Action::Resubmit(requests) => {
                debug!("Resubmitting {} failed files from {}", requests.len(), update.username);
                self.transfers
                    .initiate_downloads(&update.username, &requests)
                    .await;
            }
        }
    }
}

#[async_trait]
impl StatusListener for DownloadSupervisor {
    async fn on_status(&self, update: StatusUpdate) {
        let Some(_busy) = BusyGuard::try_acquire(&self.busy) else {
            trace!("Supervisor busy, dropping update for {}", update.username);
            return;
        };
        self.handle_update(update).await;
    }
}

fn evaluate(tracker: &mut Tracker, update: &StatusUpdate, track_count: usize, policy: &SupervisorPolicy) -> Action {
    let files = &update.files;

    if files.is_empty() {
        tracker.times_empty += 1;
        if tracker.times_empty >= policy.empty_limit {
            return Action::Abandon {
                cancel: Vec::new(),
                reason: "requested files never showed up",
            };
        }
        return Action::Wait;
    }
    tracker.times_empty = 0;

    if files.iter().all(TransferFile::is_succeeded) {
        return Action::Succeed;
    }

    if files.iter().any(TransferFile::is_in_progress) {
        tracker.times_idle = 0;
        let moved = files
            .iter()
            .any(|f| tracker.last_bytes.get(&f.id) != Some(&f.bytes_transferred));
        tracker.last_bytes = files.iter().map(|f| (f.id.clone(), f.bytes_transferred)).collect();
        if moved {
            tracker.times_stale = 0;
            return Action::Wait;
        }
        tracker.times_stale += 1;
        if tracker.times_stale >= policy.stale_limit {
            return Action::Abandon {
                cancel: ids(files),
                reason: "transfers stalled",
            };
        }
        return Action::Wait;
    }
    tracker.times_stale = 0;

    if files.len() > track_count {
        let mut seen = HashSet::new();
        let duplicates: Vec<String> = files
            .iter()
            .filter(|f| !seen.insert(f.filename.as_str()))
            .map(|f| f.id.clone())
            .collect();
        if !duplicates.is_empty() {
            return Action::Deduplicate(duplicates);
        }
    }

    let busy_elsewhere = update
        .uploader_files
        .iter()
        .any(|f| f.is_in_progress() && !tracker.filenames.contains(&f.filename));

    let failures: Vec<&TransferFile> = files.iter().filter(|f| f.is_failed()).collect();
    if !failures.is_empty() {
        if busy_elsewhere {
            return Action::Wait;
        }
        tracker.failure_count += failures.len();
        // Integer ratio: roughly ten rounds of failures per file
        if tracker.failure_count / files.len() >= policy.failure_ratio_limit {
            return Action::Abandon {
                cancel: ids(files),
                reason: "too many failed transfers",
            };
        }
        return Action::Resubmit(failures.iter().map(|f| f.to_request()).collect());
    }

    if busy_elsewhere {
        tracker.times_idle = 0;
        return Action::Wait;
    }
    tracker.times_idle += 1;
    if tracker.times_idle >= policy.idle_limit {
        return Action::Abandon {
            cancel: ids(files),
            reason: "transfers never started",
        };
    }
    Action::Wait
}
