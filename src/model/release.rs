//! Release descriptions
//!
//! The desired releases, as produced by whatever metadata source feeds the
//! batch (playlist export, rating export, release database lookup).

use crate::error::FetchError;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// One track of a desired release
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackSpec {
    /// Track number as printed on the release ("3", "A1", "1-04")
    pub number: String,
    /// Track title
    pub title: String,
}

impl TrackSpec {
    pub fn new(number: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            number: number.into(),
            title: title.into(),
        }
    }
}

/// A release we want to acquire
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReleaseSpec {
    /// Release name
    pub name: String,
    /// Credited artists
    pub artists: Vec<String>,
    /// Ordered track list
    pub tracks: Vec<TrackSpec>,
}

impl ReleaseSpec {
    pub fn new(name: impl Into<String>, artists: Vec<String>, tracks: Vec<TrackSpec>) -> Self {
        Self {
            name: name.into(),
            artists,
            tracks,
        }
    }

    /// Query text sent to the search service
    pub fn search_string(&self) -> String {
        format!("{} {}", self.artists.join(" "), self.name)
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }
}

/// Load the ordered list of releases from a JSON file
pub fn load_releases(path: &Path) -> Result<Vec<ReleaseSpec>> {
    info!("Loading releases from {}", path.display());

    let data = std::fs::read(path).map_err(|e| {
        FetchError::input_error_full("Failed to read release list", path.display().to_string(), e.to_string())
    })?;

    let releases: Vec<ReleaseSpec> = serde_json::from_slice(&data).map_err(|e| {
        FetchError::input_error_full("Failed to parse release list", path.display().to_string(), e.to_string())
    })?;

    for release in &releases {
        debug!("Loaded release '{}' ({} tracks)", release.search_string(), release.track_count());
    }
    info!("Loaded {} releases", releases.len());
    Ok(releases)
}
