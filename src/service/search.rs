//! Search scheduler
//!
//! Runs daemon searches for releases with bounded concurrency, reusing
//! searches the daemon already has for an identical query.

use crate::client::SearchApi;
use crate::error::FetchError;
use crate::model::{RawResult, ReleaseSpec, SearchState};
use crate::service::gate::DownloadGate;
use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Mutex, RwLock};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Search scheduler settings
#[derive(Debug, Clone)]
pub struct SearchSettings {
    /// Searches allowed in flight at once
    pub workers: usize,
    /// Delay between state polls
    pub poll_interval: Duration,
    /// Polls before a search is abandoned
    pub max_polls: u32,
    /// Pause after draining a full batch of searches
    pub cooldown: Duration,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            workers: 5,
            poll_interval: Duration::from_secs(1),
            max_polls: 45,
            cooldown: Duration::from_secs(5),
        }
    }
}

pub struct SearchScheduler {
    api: Arc<dyn SearchApi>,
    gate: DownloadGate,
    settings: SearchSettings,
    /// Searches by query text
    known: RwLock<HashMap<String, SearchState>>,
    in_flight: Mutex<JoinSet<()>>,
}

impl SearchScheduler {
    pub fn new(api: Arc<dyn SearchApi>, gate: DownloadGate, settings: SearchSettings) -> Self {
        Self {
            api,
            gate,
            settings,
            known: RwLock::new(HashMap::new()),
            in_flight: Mutex::new(JoinSet::new()),
        }
    }

    /// Load the daemon's existing searches so identical queries are reused
    ///
    /// When the daemon lists the same query more than once the last entry wins.
    pub async fn preload(&self) -> Result<usize> {
        let searches = self.api.list_searches().await?;
        let mut known = self.known.write().await;
        for search in searches {
            known.insert(search.search_text.clone(), search);
        }
        info!("Loaded {} existing searches", known.len());
        Ok(known.len())
    }

    /// Search for a release; any failure yields no results
    pub async fn search(&self, release: &ReleaseSpec) -> Vec<RawResult> {
        let text = release.search_string();
        match self.try_search(&text).await {
            Ok(results) => {
                info!("Search for '{}' returned {} responses", text, results.len());
                results
            }
            Err(e) => {
                let transient = e.downcast_ref::<FetchError>().is_some_and(FetchError::is_transient);
                if transient {
                    warn!("Search for '{}' failed: {}", text, e);
                } else {
                    error!("Search for '{}' failed: {}", text, e);
                }
                Vec::new()
            }
        }
    }

    async fn try_search(&self, text: &str) -> Result<Vec<RawResult>> {
        let existing = self.known.read().await.get(text).cloned();
        let state = match existing {
            Some(state) => {
                debug!("Reusing search {} for '{}'", state.id, text);
                state
            }
            None => {
                let state = self.api.start_search(text).await?;
                debug!("Started search {} for '{}'", state.id, text);
                self.known.write().await.insert(text.to_string(), state.clone());
                state
            }
        };

        if !state.is_complete() {
            let finished = self.await_completion(&state.id).await?;
            self.known.write().await.insert(text.to_string(), finished);
        }

        self.api.search_responses(&state.id).await
    }

    async fn await_completion(&self, id: &str) -> Result<SearchState> {
        for _ in 0..self.settings.max_polls {
            tokio::time::sleep(self.settings.poll_interval).await;
            let state = self.api.search_state(id).await?;
            if state.is_complete() {
                return Ok(state);
            }
        }
        Err(FetchError::timeout_error_with_operation(
            format!("Search {} did not complete after {} polls", id, self.settings.max_polls),
            "search",
        )
        .into())
    }

    /// Queue a search, returning a receiver for its results
    ///
    /// Waits for the download gate. When the in-flight batch is full, waits
    /// for all of it to finish and then cools down before admitting more.
    pub async fn submit(self: &Arc<Self>, release: ReleaseSpec) -> oneshot::Receiver<Vec<RawResult>> {
        self.gate.wait_open().await;

        let mut in_flight = self.in_flight.lock().await;
        if in_flight.len() >= self.settings.workers {
            info!("{} searches in flight, waiting for them to finish", in_flight.len());
            while let Some(joined) = in_flight.join_next().await {
                if let Err(e) = joined {
                    error!("Search task failed: {}", e);
                }
            }
            tokio::time::sleep(self.settings.cooldown).await;
        }

        let (tx, rx) = oneshot::channel();
        let this = Arc::clone(self);
        in_flight.spawn(async move {
            let results = this.search(&release).await;
            let _ = tx.send(results);
        });
        rx
    }
}
