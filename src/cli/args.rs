//! CLI arguments module
//!
//! Defines command-line argument parsing using clap.

use clap::Parser;
use std::path::PathBuf;

/// CLI arguments for the release fetcher
#[derive(Debug, Parser)]
#[command(name = "release-fetcher")]
#[command(about = "Searches a Soulseek daemon for music releases and supervises their download", long_about = None)]
pub struct CliArgs {
    /// JSON file with the releases to fetch
    #[arg(value_name = "RELEASES_FILE", required_unless_present = "retry_only")]
    pub releases_file: Option<PathBuf>,

    /// Daemon base URL
    #[arg(long, default_value = "http://localhost:5030")]
    pub base_url: String,

    /// Daemon username
    #[arg(long, default_value = "slskd")]
    pub username: String,

    /// Daemon password
    #[arg(long, default_value = "slskd")]
    pub password: String,

    /// Preferred file extension
    #[arg(long, default_value = "flac")]
    pub target_format: String,

    /// JSON file listing uploaders to ignore
    #[arg(long, value_name = "FILE")]
    pub blacklist: Option<PathBuf>,

    /// Searches allowed in flight at once
    #[arg(long, default_value_t = 5)]
    pub search_workers: usize,

    /// Hold new work while this many uploaders are sending files
    #[arg(long, default_value_t = 30)]
    pub max_active_uploaders: usize,

    /// Resubmissions per failed file
    #[arg(long, default_value_t = 10)]
    pub retry_limit: u32,

    /// Minimum uploader score worth downloading from
    #[arg(long, default_value_t = 0.8)]
    pub min_score: f64,

    /// Only accept perfect matches
    #[arg(long)]
    pub strict: bool,

    /// Only retry failed transfers, without searching
    #[arg(long)]
    pub retry_only: bool,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Quiet mode (no output except errors)
    #[arg(short, long)]
    pub quiet: bool,
}

impl CliArgs {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the log level based on verbosity settings
    pub fn log_level(&self) -> tracing::Level {
        if self.verbose {
            tracing::Level::DEBUG
        } else if self.quiet {
            tracing::Level::ERROR
        } else {
            tracing::Level::INFO
        }
    }
}
