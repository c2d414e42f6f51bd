//! release-fetcher
//!
//! Searches a Soulseek daemon for music releases, ranks what uploaders
//! offer against each release's track list and supervises the downloads.

pub mod cli;
pub mod client;
pub mod error;
pub mod matcher;
pub mod model;
pub mod service;

pub use error::FetchError;

pub use cli::{CliArgs, Config, SummaryDisplay};
pub use client::{DownloadApi, SearchApi};
#[cfg(feature = "download")]
pub use client::DaemonClient;
pub use matcher::{load_blacklist, Candidate, MatchEngine, RankedResult, UploaderCandidateSet};
pub use model::{load_releases, RawResult, ReleaseSpec, TrackSpec, TransferFile, TransferUser};
pub use service::{
    BatchRunner, BatchSummary, DecisionMaker, DownloadGate, DownloadSupervisor, Outcome, PollingHub,
    RetryScheduler, SearchScheduler, ServiceHandles, TransferService, UnattendedDecisionMaker,
};
