//! Matcher module
//!
//! Turns raw per-uploader search responses into a ranked list of candidate
//! file sets for one release.

pub mod candidate;
pub mod distance;
pub mod engine;
pub mod sanitize;

pub use candidate::{
    file_score, rounded_score, uploader_score, Candidate, DirectoryCandidateSet, RankedResult,
    UploaderCandidateSet,
};
pub use distance::{edit_distance, max_distance};
pub use engine::{load_blacklist, MatchEngine, DEFAULT_TARGET_FORMAT, MIN_AUDIO_FILE_SIZE};
pub use sanitize::{base_name, extension, parent_directory, sanitize, Sanitizer};
