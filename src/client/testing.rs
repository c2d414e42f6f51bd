//! In-memory daemon used by unit tests

use crate::client::api::{DownloadApi, SearchApi};
use crate::model::{DownloadRequest, RawResult, SearchState, TransferDirectory, TransferFile, TransferUser};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub(crate) fn transfer_file(id: &str, filename: &str, state: &str, bytes_transferred: u64) -> TransferFile {
    TransferFile {
        id: id.to_string(),
        username: String::new(),
        filename: filename.to_string(),
        size: 30_000_000,
        state: state.to_string(),
        bytes_transferred,
        average_speed: 0.0,
        place_in_queue: None,
        percent_complete: 0.0,
    }
}

pub(crate) fn transfer_user(username: &str, files: Vec<TransferFile>) -> TransferUser {
    TransferUser {
        username: username.to_string(),
        directories: vec![TransferDirectory {
            directory: "remote".to_string(),
            files,
        }],
    }
}

/// `count` distinct uploaders, each with one file in progress
pub(crate) fn busy_users(count: usize) -> Vec<TransferUser> {
    (0..count)
        .map(|i| {
            transfer_user(
                &format!("busy{}", i),
                vec![transfer_file(&format!("b{}", i), "x\\track.flac", "InProgress", 1)],
            )
        })
        .collect()
}

#[derive(Default)]
pub(crate) struct FakeDaemon {
    /// Responses served per search text
    responses: Mutex<HashMap<String, Vec<RawResult>>>,
    /// Searches the daemon already knows about
    existing: Mutex<Vec<SearchState>>,
    /// Number of state polls before a search reports completion; None = never
    polls_until_complete: Mutex<Option<usize>>,
    polls: Mutex<HashMap<String, usize>>,
    failing_searches: Mutex<HashSet<String>>,
    /// Snapshots served in order; the last one repeats
    snapshots: Mutex<VecDeque<Vec<TransferUser>>>,
    failing_users: Mutex<HashSet<String>>,
    pub started_searches: Mutex<Vec<String>>,
    pub initiated: Mutex<Vec<(String, Vec<DownloadRequest>)>>,
    pub cancelled: Mutex<Vec<(String, String, bool)>>,
    pub snapshot_calls: AtomicUsize,
    next_id: AtomicUsize,
}

impl FakeDaemon {
    pub(crate) fn new() -> Self {
        let fake = Self::default();
        *fake.polls_until_complete.lock().unwrap() = Some(1);
        fake
    }

    pub(crate) fn with_responses(self, text: &str, responses: Vec<RawResult>) -> Self {
        self.responses.lock().unwrap().insert(text.to_string(), responses);
        self
    }

    pub(crate) fn with_existing_search(self, id: &str, text: &str) -> Self {
        self.existing.lock().unwrap().push(SearchState {
            id: id.to_string(),
            state: "Completed, Succeeded".to_string(),
            search_text: text.to_string(),
        });
        self
    }

    pub(crate) fn never_completing(self) -> Self {
        *self.polls_until_complete.lock().unwrap() = None;
        self
    }

    pub(crate) fn failing_search(self, text: &str) -> Self {
        self.failing_searches.lock().unwrap().insert(text.to_string());
        self
    }

    pub(crate) fn with_snapshots(self, snapshots: Vec<Vec<TransferUser>>) -> Self {
        *self.snapshots.lock().unwrap() = snapshots.into();
        self
    }

    pub(crate) fn failing_user(self, username: &str) -> Self {
        self.failing_users.lock().unwrap().insert(username.to_string());
        self
    }

    pub(crate) fn initiated_users(&self) -> Vec<String> {
        self.initiated.lock().unwrap().iter().map(|(u, _)| u.clone()).collect()
    }

    pub(crate) fn cancel_count(&self) -> usize {
        self.cancelled.lock().unwrap().len()
    }

    fn text_for(&self, id: &str) -> Option<String> {
        if let Some(state) = self.existing.lock().unwrap().iter().find(|s| s.id == id) {
            return Some(state.search_text.clone());
        }
        id.strip_prefix("search-")
            .and_then(|rest| rest.split_once(':'))
            .map(|(_, text)| text.to_string())
    }
}

#[async_trait]
impl SearchApi for FakeDaemon {
    async fn list_searches(&self) -> Result<Vec<SearchState>> {
        Ok(self.existing.lock().unwrap().clone())
    }

    async fn start_search(&self, text: &str) -> Result<SearchState> {
        if self.failing_searches.lock().unwrap().contains(text) {
            return Err(anyhow!("connection refused"));
        }
        self.started_searches.lock().unwrap().push(text.to_string());
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        Ok(SearchState {
            id: format!("search-{}:{}", n, text),
            state: "InProgress".to_string(),
            search_text: text.to_string(),
        })
    }

    async fn search_state(&self, id: &str) -> Result<SearchState> {
        let mut polls = self.polls.lock().unwrap();
        let count = polls.entry(id.to_string()).or_insert(0);
        *count += 1;
        let done = matches!(*self.polls_until_complete.lock().unwrap(), Some(n) if *count >= n);
        Ok(SearchState {
            id: id.to_string(),
            state: if done { "Completed, Succeeded" } else { "InProgress" }.to_string(),
            search_text: String::new(),
        })
    }

    async fn search_responses(&self, id: &str) -> Result<Vec<RawResult>> {
        let text = self.text_for(id).ok_or_else(|| anyhow!("unknown search {}", id))?;
        Ok(self.responses.lock().unwrap().get(&text).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl DownloadApi for FakeDaemon {
    async fn all_downloads(&self) -> Result<Vec<TransferUser>> {
        self.snapshot_calls.fetch_add(1, Ordering::SeqCst);
        let mut snapshots = self.snapshots.lock().unwrap();
        if snapshots.len() > 1 {
            Ok(snapshots.pop_front().unwrap_or_default())
        } else {
            Ok(snapshots.front().cloned().unwrap_or_default())
        }
    }

    async fn initiate_downloads(&self, username: &str, files: &[DownloadRequest]) -> Result<()> {
        if self.failing_users.lock().unwrap().contains(username) {
            return Err(anyhow!("user {} is offline", username));
        }
        self.initiated.lock().unwrap().push((username.to_string(), files.to_vec()));
        Ok(())
    }

    async fn cancel_download(&self, username: &str, id: &str, remove: bool) -> Result<()> {
        self.cancelled
            .lock()
            .unwrap()
            .push((username.to_string(), id.to_string(), remove));
        Ok(())
    }
}
