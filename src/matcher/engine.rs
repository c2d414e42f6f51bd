//! Match engine
//!
//! Scores every file an uploader offers against every track of the target
//! release, keeps the best distinct file per track, and ranks uploaders.

use crate::error::FetchError;
use crate::matcher::candidate::{
    rounded_score, uploader_score, Candidate, DirectoryCandidateSet, RankedResult, UploaderCandidateSet,
};
use crate::matcher::distance::edit_distance;
use crate::matcher::sanitize::{extension, parent_directory, Sanitizer};
use crate::model::{RawFile, RawResult, ReleaseSpec};
use anyhow::Result;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use tracing::{debug, info, trace};

/// Extension preferred when none is configured
pub const DEFAULT_TARGET_FORMAT: &str = "flac";

/// Files at or below this size are almost never audio (covers, cue sheets, logs)
pub const MIN_AUDIO_FILE_SIZE: u64 = 500_000;

/// Load a JSON array of blacklisted usernames
pub fn load_blacklist(path: &Path) -> Result<HashSet<String>> {
    let data = std::fs::read(path).map_err(|e| {
        FetchError::input_error_full("Failed to read blacklist", path.display().to_string(), e.to_string())
    })?;
    let users: HashSet<String> = serde_json::from_slice(&data).map_err(|e| {
        FetchError::input_error_full("Failed to parse blacklist", path.display().to_string(), e.to_string())
    })?;
    info!("Loaded {} blacklisted users", users.len());
    Ok(users)
}

/// Ranks uploaders' files against a release
#[derive(Debug, Clone)]
pub struct MatchEngine {
    target_format: String,
    blacklist: HashSet<String>,
}

impl MatchEngine {
    pub fn new(target_format: impl Into<String>) -> Self {
        Self {
            target_format: target_format.into().trim_start_matches('.').to_lowercase(),
            blacklist: HashSet::new(),
        }
    }

    pub fn with_blacklist(mut self, blacklist: HashSet<String>) -> Self {
        self.blacklist = blacklist;
        self
    }

    /// Rank every non-blacklisted uploader in `results` for `release`
    pub fn process(&self, release: &ReleaseSpec, results: &[RawResult]) -> RankedResult {
        if release.tracks.is_empty() {
            debug!("Release '{}' has no tracks, nothing to match", release.search_string());
            return RankedResult {
                release: release.clone(),
                uploaders: Vec::new(),
            };
        }

        let sanitizer = Sanitizer::for_release(release);
        let uploaders = results
            .iter()
            .filter(|r| {
                let blocked = self.blacklist.contains(&r.username);
                if blocked {
                    trace!("Skipping blacklisted user {}", r.username);
                }
                !blocked
            })
            .filter_map(|r| self.match_uploader(&sanitizer, release, r))
            .collect();

        let uploaders = rank_uploaders(uploaders);
        debug!(
            "Ranked {} of {} uploaders for '{}'",
            uploaders.len(),
            results.len(),
            release.search_string()
        );

        RankedResult {
            release: release.clone(),
            uploaders,
        }
    }

    fn match_uploader(
        &self,
        sanitizer: &Sanitizer,
        release: &ReleaseSpec,
        result: &RawResult,
    ) -> Option<UploaderCandidateSet> {
        let mut by_directory: BTreeMap<&str, Vec<&RawFile>> = BTreeMap::new();
        for file in &result.files {
            by_directory
                .entry(parent_directory(&file.filename))
                .or_default()
                .push(file);
        }

        let mut directories: Vec<DirectoryCandidateSet> = by_directory
            .into_iter()
            .filter_map(|(dir, files)| self.match_directory(sanitizer, release, dir, &files))
            .collect();
        if directories.is_empty() {
            return None;
        }

        // Stable sort, so equal-scoring folders stay in path order
        directories.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));

        let track_count = release.tracks.len();
        let mut matched_tracks = HashSet::new();
        let mut best_candidates: Vec<Candidate> = Vec::new();
        'directories: for directory in &directories {
            for candidate in &directory.best_candidates {
                if matched_tracks.len() == track_count {
                    break 'directories;
                }
                if matched_tracks.insert(candidate.track_index) {
                    best_candidates.push(candidate.clone());
                }
            }
        }
        if best_candidates.is_empty() {
            return None;
        }
        best_candidates.sort_by_key(|c| c.track_index);

        let coverage = best_candidates.len() as f64 / track_count as f64;
        let mean = best_candidates.iter().map(|c| c.score).sum::<f64>() / best_candidates.len() as f64;
        let score = uploader_score(coverage, mean);
        trace!(
            "User {} covers {}/{} tracks with mean file score {:.3} (score {:.3})",
            result.username,
            best_candidates.len(),
            track_count,
            mean,
            score
        );

        Some(UploaderCandidateSet {
            username: result.username.clone(),
            upload_speed: result.upload_speed,
            directories,
            best_candidates,
            score,
        })
    }

    fn match_directory(
        &self,
        sanitizer: &Sanitizer,
        release: &ReleaseSpec,
        directory: &str,
        files: &[&RawFile],
    ) -> Option<DirectoryCandidateSet> {
        let mut per_track: Vec<Vec<Candidate>> = vec![Vec::new(); release.tracks.len()];

        for file in files {
            let sanitized = sanitizer.sanitize(&file.filename);
            let is_target_format = extension(&file.filename).as_deref() == Some(self.target_format.as_str());
            let size_ok = file.size > MIN_AUDIO_FILE_SIZE;

            for (index, track) in release.tracks.iter().enumerate() {
                if let Some(distance) = edit_distance(&track.title, &sanitized) {
                    per_track[index].push(Candidate::new(
                        (*file).clone(),
                        index,
                        track.clone(),
                        distance,
                        is_target_format,
                        size_ok,
                    ));
                }
            }
        }

        let mut claimed: HashSet<String> = HashSet::new();
        let mut best_candidates = Vec::new();
        for mut candidates in per_track {
            candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
            // A file that already won another track is not reused
            if let Some(best) = candidates.into_iter().find(|c| !claimed.contains(c.filename())) {
                claimed.insert(best.filename().to_string());
                best_candidates.push(best);
            }
        }

        if best_candidates.is_empty() {
            return None;
        }

        let score = best_candidates.len() as f64 / release.tracks.len() as f64;
        Some(DirectoryCandidateSet {
            directory: directory.to_string(),
            best_candidates,
            score,
        })
    }
}

impl Default for MatchEngine {
    fn default() -> Self {
        Self::new(DEFAULT_TARGET_FORMAT)
    }
}

/// Best first: rounded score, then upload speed, then username
pub(crate) fn rank_uploaders(mut uploaders: Vec<UploaderCandidateSet>) -> Vec<UploaderCandidateSet> {
    uploaders.sort_by(|a, b| {
        rounded_score(b.score)
            .partial_cmp(&rounded_score(a.score))
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.upload_speed.cmp(&a.upload_speed))
            .then_with(|| a.username.cmp(&b.username))
    });
    uploaders
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TrackSpec;

    fn release() -> ReleaseSpec {
        ReleaseSpec::new(
            "Interior Design",
            vec!["Sparks".to_string()],
            vec![
                TrackSpec::new("1", "So Important"),
                TrackSpec::new("2", "Just Got Back From Heaven"),
                TrackSpec::new("3", "Lots Of Reasons"),
            ],
        )
    }

    fn uploader(username: &str, upload_speed: u64, files: Vec<RawFile>) -> RawResult {
        RawResult {
            username: username.to_string(),
            upload_speed,
            files,
        }
    }

    fn full_folder(root: &str, ext: &str) -> Vec<RawFile> {
        vec![
            RawFile::new(format!("{}\\01 - So Important.{}", root, ext), 30_000_000),
            RawFile::new(format!("{}\\02 - Just Got Back From Heaven.{}", root, ext), 32_000_000),
            RawFile::new(format!("{}\\03 - Lots Of Reasons.{}", root, ext), 28_000_000),
        ]
    }

    fn scored(username: &str, upload_speed: u64, score: f64) -> UploaderCandidateSet {
        UploaderCandidateSet {
            username: username.to_string(),
            upload_speed,
            directories: Vec::new(),
            best_candidates: Vec::new(),
            score,
        }
    }

    #[test]
    fn test_perfect_uploader_scores_one() {
        let engine = MatchEngine::default();
        let results = vec![uploader("crate_digger", 100, full_folder("@@music\\Sparks\\Interior Design", "flac"))];

        let ranked = engine.process(&release(), &results);

        assert_eq!(ranked.uploaders.len(), 1);
        let best = ranked.best().unwrap();
        assert_eq!(best.score, 1.0);
        assert_eq!(best.best_candidates.len(), 3);
        assert_eq!(best.filenames().len(), 3);
    }

    #[test]
    fn test_wrong_format_ranks_below_target_format() {
        let engine = MatchEngine::default();
        let results = vec![
            uploader("mp3_fan", 900, full_folder("mp3s\\Interior Design", "mp3")),
            uploader("flac_fan", 100, full_folder("flacs\\Interior Design", "flac")),
        ];

        let ranked = engine.process(&release(), &results);

        assert_eq!(ranked.uploaders[0].username, "flac_fan");
        assert_eq!(ranked.uploaders[1].username, "mp3_fan");
        assert!(ranked.uploaders[1].score < 1.0);
    }

    #[test]
    fn test_blacklisted_uploader_is_dropped() {
        let engine = MatchEngine::default().with_blacklist(HashSet::from(["leech".to_string()]));
        let results = vec![
            uploader("leech", 1_000, full_folder("a", "flac")),
            uploader("friend", 10, full_folder("b", "flac")),
        ];

        let ranked = engine.process(&release(), &results);

        assert_eq!(ranked.uploaders.len(), 1);
        assert_eq!(ranked.uploaders[0].username, "friend");
    }

    #[test]
    fn test_unmatched_uploader_is_dropped() {
        let engine = MatchEngine::default();
        let results = vec![uploader(
            "other",
            10,
            vec![
                RawFile::new("x\\01 - Something Else Entirely.flac", 30_000_000),
                RawFile::new("x\\cover.jpg", 80_000),
            ],
        )];

        let ranked = engine.process(&release(), &results);
        assert!(ranked.is_empty());
    }

    #[test]
    fn test_complete_folder_preferred_over_mixing() {
        let engine = MatchEngine::default();
        let mut files = vec![RawFile::new("singles\\So Important.flac", 30_000_000)];
        files.extend(full_folder("albums\\Interior Design", "flac"));
        let results = vec![uploader("collector", 10, files)];

        let ranked = engine.process(&release(), &results);
        let best = ranked.best().unwrap();

        assert_eq!(best.best_candidates.len(), 3);
        assert!(best
            .best_candidates
            .iter()
            .all(|c| c.filename().starts_with("albums\\Interior Design")));
    }

    #[test]
    fn test_partial_coverage_fills_from_weaker_folder() {
        let engine = MatchEngine::default();
        let files = vec![
            RawFile::new("cd\\01 - So Important.flac", 30_000_000),
            RawFile::new("cd\\02 - Just Got Back From Heaven.flac", 30_000_000),
            RawFile::new("extras\\Lots Of Reasons.flac", 30_000_000),
        ];
        let results = vec![uploader("collector", 10, files)];

        let ranked = engine.process(&release(), &results);
        let best = ranked.best().unwrap();

        assert_eq!(best.best_candidates.len(), 3);
        assert_eq!(best.best_candidates[2].filename(), "extras\\Lots Of Reasons.flac");
        assert_eq!(best.directories[0].directory, "cd");
    }

    #[test]
    fn test_numeric_title_matches() {
        let engine = MatchEngine::default();
        let release = ReleaseSpec::new(
            "Siamese Dream",
            vec!["Smashing Pumpkins".to_string()],
            vec![TrackSpec::new("1", "1979")],
        );
        let results = vec![
            uploader("bare", 10, vec![RawFile::new("x\\1979.flac", 30_000_000)]),
            uploader("numbered", 10, vec![RawFile::new("y\\05 - 1979.flac", 30_000_000)]),
        ];

        let ranked = engine.process(&release, &results);

        assert_eq!(ranked.uploaders.len(), 2);
        assert!(ranked.uploaders.iter().all(|u| u.score == 1.0));
    }

    #[test]
    fn test_album_name_in_filenames_is_ignored() {
        let engine = MatchEngine::default();
        let files = vec![
            RawFile::new("x\\Sparks - Interior Design - 01 - So Important.flac", 30_000_000),
            RawFile::new("x\\Sparks - Interior Design - 02 - Just Got Back From Heaven.flac", 30_000_000),
            RawFile::new("x\\Sparks - Interior Design - 03 - Lots Of Reasons.flac", 30_000_000),
        ];
        let ranked = engine.process(&release(), &[uploader("tagger", 10, files)]);

        assert_eq!(ranked.best().unwrap().score, 1.0);
    }

    #[test]
    fn test_small_files_lose_size_points() {
        let engine = MatchEngine::default();
        let results = vec![uploader(
            "tiny",
            10,
            vec![
                RawFile::new("x\\01 - So Important.flac", 400_000),
                RawFile::new("x\\02 - Just Got Back From Heaven.flac", 400_000),
                RawFile::new("x\\03 - Lots Of Reasons.flac", 400_000),
            ],
        )];

        let ranked = engine.process(&release(), &results);
        let best = ranked.best().unwrap();
        assert!(best.best_candidates.iter().all(|c| !c.size_ok));
        assert!(best.score < 1.0);
    }

    #[test]
    fn test_rounded_tie_broken_by_upload_speed() {
        let ranked = rank_uploaders(vec![
            scored("slow", 100, 0.96),
            scored("fast", 900, 0.93),
            scored("worse", 5_000, 0.80),
        ]);

        let names: Vec<&str> = ranked.iter().map(|u| u.username.as_str()).collect();
        assert_eq!(names, vec!["fast", "slow", "worse"]);
    }

    #[test]
    fn test_ranking_is_deterministic() {
        let input = vec![scored("b", 10, 0.9), scored("a", 10, 0.9), scored("c", 10, 0.91)];
        let first = rank_uploaders(input.clone());
        let second = rank_uploaders(input.into_iter().rev().collect());
        assert_eq!(first, second);
    }

    #[test]
    fn test_load_blacklist() {
        let path = std::env::temp_dir().join(format!("release-fetcher-blacklist-{}.json", std::process::id()));
        std::fs::write(&path, r#"["leech", "spammer"]"#).unwrap();

        let users = load_blacklist(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(users.len(), 2);
        assert!(users.contains("leech"));
    }
}
