//! Search wire types
//!
//! Shapes returned by the daemon's search endpoints.

use serde::{Deserialize, Serialize};

/// State of a search at the daemon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchState {
    pub id: String,
    pub state: String,
    #[serde(default)]
    pub search_text: String,
}

impl SearchState {
    /// The daemon reports finished searches as "Completed" plus a reason
    pub fn is_complete(&self) -> bool {
        self.state.contains("Completed")
    }
}

/// One file offered by an uploader in a search response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawFile {
    pub filename: String,
    pub size: u64,
    #[serde(default, alias = "bitRate")]
    pub bitrate: Option<u32>,
    #[serde(default)]
    pub length: Option<u32>,
}

impl RawFile {
    pub fn new(filename: impl Into<String>, size: u64) -> Self {
        Self {
            filename: filename.into(),
            size,
            bitrate: None,
            length: None,
        }
    }
}

/// Everything one uploader returned for a search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawResult {
    pub username: String,
    #[serde(default)]
    pub upload_speed: u64,
    #[serde(default)]
    pub files: Vec<RawFile>,
}
