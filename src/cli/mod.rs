//! CLI module
//!
//! Command-line interface for the release fetcher.

pub mod args;
pub mod config;
pub mod progress;

pub use args::CliArgs;
pub use config::Config;
pub use progress::{format_duration, SummaryDisplay};
