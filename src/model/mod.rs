//! Model module
//!
//! Release descriptions and the daemon's search/transfer wire types.

pub mod release;
pub mod search;
pub mod transfer;

pub use release::{load_releases, ReleaseSpec, TrackSpec};
pub use search::{RawFile, RawResult, SearchState};
pub use transfer::{DownloadRequest, TransferDirectory, TransferFile, TransferState, TransferUser};
