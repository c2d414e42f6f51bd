//! Transfer wire types
//!
//! Shapes returned by the daemon's download endpoints.

use serde::{Deserialize, Serialize};

/// Recognized transfer states; anything else is still pending
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferState {
    InProgress,
    Succeeded,
    Errored,
    TimedOut,
    Other(String),
}

impl TransferState {
    pub fn parse(state: &str) -> Self {
        match state {
            "InProgress" => TransferState::InProgress,
            "Completed, Succeeded" => TransferState::Succeeded,
            "Completed, Errored" => TransferState::Errored,
            "Completed, TimedOut" => TransferState::TimedOut,
            other => TransferState::Other(other.to_string()),
        }
    }

    /// Errored or timed out, and therefore worth resubmitting
    pub fn is_failed(&self) -> bool {
        matches!(self, TransferState::Errored | TransferState::TimedOut)
    }
}

/// One file transfer known to the daemon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferFile {
    pub id: String,
    #[serde(default)]
    pub username: String,
    pub filename: String,
    pub size: u64,
    pub state: String,
    #[serde(default)]
    pub bytes_transferred: u64,
    #[serde(default)]
    pub average_speed: f64,
    #[serde(default)]
    pub place_in_queue: Option<u32>,
    #[serde(default)]
    pub percent_complete: f64,
}

impl TransferFile {
    pub fn transfer_state(&self) -> TransferState {
        TransferState::parse(&self.state)
    }

    pub fn is_in_progress(&self) -> bool {
        self.transfer_state() == TransferState::InProgress
    }

    pub fn is_succeeded(&self) -> bool {
        self.transfer_state() == TransferState::Succeeded
    }

    pub fn is_failed(&self) -> bool {
        self.transfer_state().is_failed()
    }

    /// Request that would enqueue this same file again
    pub fn to_request(&self) -> DownloadRequest {
        DownloadRequest::new(self.filename.clone(), self.size)
    }
}

/// A remote directory grouping within a user's transfers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferDirectory {
    #[serde(default)]
    pub directory: String,
    #[serde(default)]
    pub files: Vec<TransferFile>,
}

/// All transfers from one uploader
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferUser {
    pub username: String,
    #[serde(default)]
    pub directories: Vec<TransferDirectory>,
}

impl TransferUser {
    /// Flattened view over every directory
    pub fn files(&self) -> impl Iterator<Item = &TransferFile> {
        self.directories.iter().flat_map(|d| d.files.iter())
    }

    pub fn has_active_transfer(&self) -> bool {
        self.files().any(TransferFile::is_in_progress)
    }
}

/// Body entry for enqueueing a download
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DownloadRequest {
    pub filename: String,
    pub size: u64,
}

impl DownloadRequest {
    pub fn new(filename: impl Into<String>, size: u64) -> Self {
        Self {
            filename: filename.into(),
            size,
        }
    }
}
