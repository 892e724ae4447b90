//! Error handling for the verification pipeline.
//!
//! Only a handful of these ever reach the caller: configuration problems and
//! ledger I/O. Per-domain failures (probe errors, registrar timeouts, parse
//! failures) are folded into result values and never abort a run; the
//! variants below still describe them so they can be logged and classified
//! consistently.

use std::fmt;

/// Main error type for domain-sieve operations.
#[derive(Debug, Clone)]
pub enum DomainSieveError {
    /// Network-related errors (connection refused, DNS failure of the API host, etc.)
    NetworkError {
        message: String,
        source: Option<String>,
    },

    /// A registrar returned something we could not interpret
    ParseError {
        message: String,
        content: Option<String>,
    },

    /// Configuration errors (invalid settings, no active providers, etc.)
    ConfigError { message: String },

    /// File I/O errors on the ledger, export file or config files
    FileError { path: String, message: String },

    /// An operation ran past its configured timeout
    Timeout { operation: String },
}

impl DomainSieveError {
    /// Create a new network error with source information.
    pub fn network_with_source<M: Into<String>, S: Into<String>>(message: M, source: S) -> Self {
        Self::NetworkError {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Create a new parse error carrying an excerpt of the offending content.
    pub fn parse<M: Into<String>, C: Into<String>>(message: M, content: C) -> Self {
        Self::ParseError {
            message: message.into(),
            content: Some(content.into()),
        }
    }

    /// Create a new configuration error.
    pub fn config<M: Into<String>>(message: M) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// Create a new file error.
    pub fn file_error<P: Into<String>, M: Into<String>>(path: P, message: M) -> Self {
        Self::FileError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new timeout error.
    pub fn timeout<O: Into<String>>(operation: O) -> Self {
        Self::Timeout {
            operation: operation.into(),
        }
    }
}

impl fmt::Display for DomainSieveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NetworkError { message, source } => {
                if let Some(source) = source {
                    write!(f, "Network error: {} (source: {})", message, source)
                } else {
                    write!(f, "Network error: {}", message)
                }
            }
            Self::ParseError { message, content } => match content {
                Some(content) if !content.is_empty() => {
                    write!(f, "Parse error: {} (content: {})", message, content)
                }
                _ => write!(f, "Parse error: {}", message),
            },
            Self::ConfigError { message } => {
                write!(f, "Configuration error: {}", message)
            }
            Self::FileError { path, message } => {
                write!(f, "File error at '{}': {}", path, message)
            }
            Self::Timeout { operation } => {
                write!(f, "Timed out during: {}", operation)
            }
        }
    }
}

impl std::error::Error for DomainSieveError {}

impl From<reqwest::Error> for DomainSieveError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::timeout("HTTP request")
        } else if err.is_connect() {
            Self::network_with_source("Connection failed", err.to_string())
        } else {
            Self::network_with_source("HTTP request failed", err.to_string())
        }
    }
}

impl From<toml::de::Error> for DomainSieveError {
    fn from(err: toml::de::Error) -> Self {
        Self::config(format!("Failed to parse TOML configuration: {}", err))
    }
}
