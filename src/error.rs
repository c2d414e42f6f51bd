//! Error types for the release fetcher
//!
//! This module defines the error taxonomy shared by the search, matching
//! and download supervision components.

use std::fmt;

/// Error type for release fetching operations
#[derive(Debug, Clone)]
pub enum FetchError {
    /// A call to the daemon (or any other external service) failed
    NetworkError {
        message: String,
        endpoint: Option<String>,
        source: Option<String>,
    },

    /// An operation did not finish within its allotted time
    TimeoutError {
        message: String,
        operation: Option<String>,
    },

    /// An external response did not have the expected shape
    LogicError {
        message: String,
        source: Option<String>,
    },

    /// Configuration errors
    ConfigError {
        message: String,
        field: Option<String>,
    },

    /// Errors reading the release list or the blacklist
    InputError {
        message: String,
        path: Option<String>,
        source: Option<String>,
    },
}

impl FetchError {
    /// Create a new NetworkError with the endpoint and source
    pub fn network_error_full(
        message: impl Into<String>,
        endpoint: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        FetchError::NetworkError {
            message: message.into(),
            endpoint: Some(endpoint.into()),
            source: Some(source.into()),
        }
    }

    /// Create a new TimeoutError naming the operation that timed out
    pub fn timeout_error_with_operation(message: impl Into<String>, operation: impl Into<String>) -> Self {
        FetchError::TimeoutError {
            message: message.into(),
            operation: Some(operation.into()),
        }
    }

    /// Create a new LogicError with source
    pub fn logic_error_with_source(message: impl Into<String>, source: impl Into<String>) -> Self {
        FetchError::LogicError {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Create a new ConfigError with field
    pub fn config_error_with_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        FetchError::ConfigError {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a new InputError with path and source
    pub fn input_error_full(message: impl Into<String>, path: impl Into<String>, source: impl Into<String>) -> Self {
        FetchError::InputError {
            message: message.into(),
            path: Some(path.into()),
            source: Some(source.into()),
        }
    }

    /// Whether retrying the failed operation later could succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::NetworkError { .. } | FetchError::TimeoutError { .. })
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::NetworkError { message, endpoint, source } => match (endpoint, source) {
                (Some(e), Some(s)) => write!(f, "Network error: {} (endpoint: {}, source: {})", message, e, s),
                (Some(e), None) => write!(f, "Network error: {} (endpoint: {})", message, e),
                (None, Some(s)) => write!(f, "Network error: {} (source: {})", message, s),
                (None, None) => write!(f, "Network error: {}", message),
            },
            FetchError::TimeoutError { message, operation } => {
                if let Some(op) = operation {
                    write!(f, "Timeout: {} (operation: {})", message, op)
                } else {
                    write!(f, "Timeout: {}", message)
                }
            }
            FetchError::LogicError { message, source } => {
                if let Some(src) = source {
                    write!(f, "Unexpected response: {} (source: {})", message, src)
                } else {
                    write!(f, "Unexpected response: {}", message)
                }
            }
            FetchError::ConfigError { message, field } => {
                if let Some(field_val) = field {
                    write!(f, "Config error: {} (field: {})", message, field_val)
                } else {
                    write!(f, "Config error: {}", message)
                }
            }
            FetchError::InputError { message, path, source } => match (path, source) {
                (Some(p), Some(s)) => write!(f, "Input error: {} (path: {}, source: {})", message, p, s),
                (Some(p), None) => write!(f, "Input error: {} (path: {})", message, p),
                (None, Some(s)) => write!(f, "Input error: {} (source: {})", message, s),
                (None, None) => write!(f, "Input error: {}", message),
            },
        }
    }
}

impl std::error::Error for FetchError {}

impl From<std::io::Error> for FetchError {
    fn from(err: std::io::Error) -> Self {
        FetchError::InputError {
            message: err.to_string(),
            path: None,
            source: Some(err.kind().to_string()),
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::logic_error_with_source("Failed to parse JSON data", err.to_string())
    }
}

impl From<tokio::time::error::Elapsed> for FetchError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        FetchError::TimeoutError {
            message: "Operation timed out".to_string(),
            operation: None,
        }
    }
}

#[cfg(feature = "download")]
impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        let endpoint = err
            .url()
            .map(|u| u.path().to_string())
            .unwrap_or_else(|| "unknown".to_string());
        if err.is_decode() {
            FetchError::logic_error_with_source(format!("Failed to decode response from {}", endpoint), err.to_string())
        } else if err.is_timeout() {
            FetchError::timeout_error_with_operation("Request timed out", endpoint)
        } else {
            FetchError::network_error_full("Request failed", endpoint, err.to_string())
        }
    }
}
