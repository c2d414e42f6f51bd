//! Client module
//!
//! Interfaces to the P2P daemon's search and transfer endpoints.

pub mod api;
#[cfg(feature = "download")]
pub mod daemon;
#[cfg(test)]
pub(crate) mod testing;

pub use api::{DownloadApi, SearchApi};
#[cfg(feature = "download")]
pub use daemon::DaemonClient;
