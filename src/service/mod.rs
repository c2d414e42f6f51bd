//! Service module
//!
//! Concurrent orchestration: search admission, download-list polling,
//! per-release download supervision and periodic retries.

pub mod decision;
pub mod gate;
pub mod hub;
pub mod retry;
pub mod runner;
pub mod search;
pub mod supervisor;
pub mod transfer;

pub use decision::{Decision, DecisionMaker, UnattendedDecisionMaker};
pub use gate::{active_uploaders, DownloadGate, DEFAULT_MAX_ACTIVE_UPLOADERS};
pub use hub::{HubSettings, PollingHub, StatusListener, StatusUpdate, SubscriptionId};
pub use retry::{RetryScheduler, RetrySettings};
pub use runner::{BatchRunner, BatchSummary, ServiceHandles};
pub use search::{SearchScheduler, SearchSettings};
pub use supervisor::{DownloadSupervisor, Outcome, SupervisorHandle, SupervisorPolicy, DEFAULT_MIN_SCORE};
pub use transfer::TransferService;
