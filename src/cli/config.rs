//! CLI configuration module
//!
//! Turns parsed arguments into validated per-component settings.

use crate::cli::args::CliArgs;
use crate::error::FetchError;
use crate::service::{HubSettings, RetrySettings, SearchSettings, SupervisorPolicy};
use anyhow::Result;
use std::path::PathBuf;

/// Configuration for the release fetcher
#[derive(Debug, Clone)]
pub struct Config {
    pub releases_file: Option<PathBuf>,
    pub base_url: String,
    pub username: String,
    pub password: String,
    pub target_format: String,
    pub blacklist: Option<PathBuf>,
    pub strict: bool,
    pub retry_only: bool,
    pub search: SearchSettings,
    pub hub: HubSettings,
    pub supervisor: SupervisorPolicy,
    pub retry: RetrySettings,
    pub verbose: bool,
    pub quiet: bool,
}

impl Config {
    /// Create configuration from CLI arguments
    pub fn from_args(args: &CliArgs) -> Self {
        Self {
            releases_file: args.releases_file.clone(),
            base_url: args.base_url.clone(),
            username: args.username.clone(),
            password: args.password.clone(),
            target_format: args.target_format.clone(),
            blacklist: args.blacklist.clone(),
            strict: args.strict,
            retry_only: args.retry_only,
            search: SearchSettings {
                workers: args.search_workers,
                ..SearchSettings::default()
            },
            hub: HubSettings {
                max_active_uploaders: args.max_active_uploaders,
                ..HubSettings::default()
            },
            supervisor: SupervisorPolicy {
                min_score: args.min_score,
                ..SupervisorPolicy::default()
            },
            retry: RetrySettings {
                retry_limit: args.retry_limit,
                ..RetrySettings::default()
            },
            verbose: args.verbose,
            quiet: args.quiet,
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.search.workers == 0 {
            return Err(FetchError::config_error_with_field("must be at least 1", "search_workers").into());
        }

        if self.hub.max_active_uploaders == 0 {
            return Err(FetchError::config_error_with_field("must be at least 1", "max_active_uploaders").into());
        }

        if self.retry.retry_limit == 0 {
            return Err(FetchError::config_error_with_field("must be at least 1", "retry_limit").into());
        }

        if !(0.0..=1.0).contains(&self.supervisor.min_score) {
            return Err(FetchError::config_error_with_field("must be between 0 and 1", "min_score").into());
        }

        if self.target_format.trim_start_matches('.').is_empty() {
            return Err(FetchError::config_error_with_field("cannot be empty", "target_format").into());
        }

        let url = url::Url::parse(&self.base_url)
            .map_err(|e| FetchError::config_error_with_field(format!("invalid URL: {}", e), "base_url"))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(FetchError::config_error_with_field("must be an http(s) URL", "base_url").into());
        }

        if !self.retry_only && self.releases_file.is_none() {
            return Err(FetchError::config_error_with_field("required unless --retry-only", "releases_file").into());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn config(extra: &[&str]) -> Config {
        let mut argv = vec!["release-fetcher", "releases.json"];
        argv.extend_from_slice(extra);
        Config::from_args(&CliArgs::try_parse_from(argv).unwrap())
    }

    #[test]
    fn test_config_from_args() {
        let config = config(&["--search-workers", "3", "--min-score", "0.9", "--retry-limit", "4"]);

        assert_eq!(config.search.workers, 3);
        assert_eq!(config.search.max_polls, 45);
        assert_eq!(config.hub.max_active_uploaders, 30);
        assert_eq!(config.hub.dispatch_every, 10);
        assert_eq!(config.supervisor.min_score, 0.9);
        assert_eq!(config.supervisor.empty_limit, 5);
        assert_eq!(config.retry.retry_limit, 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validate_rejects_zero_workers() {
        let err = config(&["--search-workers", "0"]).validate().unwrap_err();
        assert!(err.to_string().contains("search_workers"));
    }

    #[test]
    fn test_config_validate_rejects_bad_score() {
        assert!(config(&["--min-score", "1.5"]).validate().is_err());
    }

    #[test]
    fn test_config_validate_rejects_bad_url() {
        let err = config(&["--base-url", "not a url"]).validate().unwrap_err();
        assert!(err.to_string().contains("base_url"));
        assert!(config(&["--base-url", "ftp://host"]).validate().is_err());
    }

    #[test]
    fn test_config_validate_rejects_empty_format() {
        assert!(config(&["--target-format", "."]).validate().is_err());
    }
}
