//! Candidate types and scoring
//!
//! A candidate is one remote file proposed for one target track. Candidates
//! roll up into per-directory sets and then into one set per uploader.

use crate::model::{DownloadRequest, RawFile, ReleaseSpec, TrackSpec};
use std::collections::HashSet;

const SIZE_POINTS: f64 = 20.0;
const FORMAT_POINTS: f64 = 20.0;
const DISTANCE_POINTS: f64 = 50.0;
const AVAILABLE_FILE_POINTS: f64 = SIZE_POINTS + FORMAT_POINTS + DISTANCE_POINTS;

const MATCHED_TRACKS_POINTS: f64 = 60.0;
const AVERAGE_SCORE_POINTS: f64 = 30.0;
const AVAILABLE_UPLOADER_POINTS: f64 = MATCHED_TRACKS_POINTS + AVERAGE_SCORE_POINTS;

/// Score of a single file in [0, 1]
///
/// Distance points decay with log10(distance + 1): distance 0 earns all 50,
/// distance 9 and above earns none.
pub fn file_score(distance: usize, is_target_format: bool, size_ok: bool) -> f64 {
    let size_points = if size_ok { SIZE_POINTS } else { 0.0 };
    let format_points = if is_target_format { FORMAT_POINTS } else { 0.0 };
    let decay = ((distance as f64) + 1.0).log10().min(1.0);
    let distance_points = DISTANCE_POINTS * (1.0 - decay);
    (size_points + format_points + distance_points) / AVAILABLE_FILE_POINTS
}

/// Score of an uploader from track coverage and mean file score, both in [0, 1]
pub fn uploader_score(coverage: f64, mean_file_score: f64) -> f64 {
    (MATCHED_TRACKS_POINTS * coverage + AVERAGE_SCORE_POINTS * mean_file_score) / AVAILABLE_UPLOADER_POINTS
}

/// Score rounded to the nearest 0.05, as compared when ranking
pub fn rounded_score(score: f64) -> f64 {
    (score * 20.0).round() / 20.0
}

/// A remote file bound to one target track
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub file: RawFile,
    /// Index into the release's track list
    pub track_index: usize,
    pub track: TrackSpec,
    pub distance: usize,
    pub is_target_format: bool,
    pub size_ok: bool,
    pub score: f64,
}

impl Candidate {
    pub fn new(
        file: RawFile,
        track_index: usize,
        track: TrackSpec,
        distance: usize,
        is_target_format: bool,
        size_ok: bool,
    ) -> Self {
        let score = file_score(distance, is_target_format, size_ok);
        Self {
            file,
            track_index,
            track,
            distance,
            is_target_format,
            size_ok,
            score,
        }
    }

    pub fn filename(&self) -> &str {
        &self.file.filename
    }
}

/// Best candidates within one remote folder
#[derive(Debug, Clone, PartialEq)]
pub struct DirectoryCandidateSet {
    pub directory: String,
    /// At most one candidate per track, each with a distinct filename
    pub best_candidates: Vec<Candidate>,
    /// Matched tracks / target tracks
    pub score: f64,
}

/// Files chosen from one uploader to cover the release
#[derive(Debug, Clone, PartialEq)]
pub struct UploaderCandidateSet {
    pub username: String,
    pub upload_speed: u64,
    pub directories: Vec<DirectoryCandidateSet>,
    pub best_candidates: Vec<Candidate>,
    pub score: f64,
}

impl UploaderCandidateSet {
    /// Requests that enqueue every chosen file
    pub fn download_requests(&self) -> Vec<DownloadRequest> {
        self.best_candidates
            .iter()
            .map(|c| DownloadRequest::new(c.file.filename.clone(), c.file.size))
            .collect()
    }

    pub fn filenames(&self) -> HashSet<String> {
        self.best_candidates.iter().map(|c| c.file.filename.clone()).collect()
    }
}

/// Ranked uploaders for one release, best first
#[derive(Debug, Clone, PartialEq)]
pub struct RankedResult {
    pub release: ReleaseSpec,
    pub uploaders: Vec<UploaderCandidateSet>,
}

impl RankedResult {
    pub fn best(&self) -> Option<&UploaderCandidateSet> {
        self.uploaders.first()
    }

    pub fn is_empty(&self) -> bool {
        self.uploaders.is_empty()
    }
}
