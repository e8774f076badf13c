//! Error type definitions for the stream watcher

use thiserror::Error;

/// Top-level application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Upstream source errors
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// Cache storage errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

/// Errors raised while talking to an upstream source
///
/// Every poller catches these at its own boundary. They are logged and
/// reported to the orchestrator as a failed source, never propagated to the
/// caller of the resolve operation.
#[derive(Error, Debug)]
pub enum SourceError {
    /// Network failure, timeout or unexpected HTTP status
    #[error("Transport error: {source_name} - {message}")]
    Transport { source_name: String, message: String },

    /// Structurally malformed upstream payload
    #[error("Parse error: {source_name} - {message}")]
    Parse { source_name: String, message: String },

    /// Upstream answered with a structured error body
    #[error("Upstream error: {source_name} returned {status} - {detail}")]
    Upstream {
        source_name: String,
        status: u16,
        detail: String,
    },

    /// Credentials required for this source are not configured
    #[error("Missing credentials for {source_name}")]
    MissingCredentials { source_name: String },
}

/// Cache storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    /// Query or transaction failure reported by the driver
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The initial connection could not be established
    #[error("Database connection failed after {attempts} attempts: {message}")]
    Connection { attempts: u32, message: String },

    /// Unsupported database URL
    #[error("Unsupported database URL: {url}")]
    UnsupportedBackend { url: String },

    /// A stored row could not be mapped back into a descriptor
    #[error("Corrupt cache row: {field} = {value}")]
    Corrupt { field: String, value: String },
}

impl AppError {
    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

impl SourceError {
    /// Create a transport error
    pub fn transport<S: Into<String>, M: Into<String>>(source_name: S, message: M) -> Self {
        Self::Transport {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    /// Create a parse error
    pub fn parse<S: Into<String>, M: Into<String>>(source_name: S, message: M) -> Self {
        Self::Parse {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    /// Create an upstream error from a status code and response body
    pub fn upstream<S: Into<String>, D: Into<String>>(source_name: S, status: u16, detail: D) -> Self {
        Self::Upstream {
            source_name: source_name.into(),
            status,
            detail: detail.into(),
        }
    }

    /// Create a missing credentials error
    pub fn missing_credentials<S: Into<String>>(source_name: S) -> Self {
        Self::MissingCredentials {
            source_name: source_name.into(),
        }
    }

    /// Map a reqwest failure onto the transport variant, naming timeouts explicitly
    pub fn from_reqwest<S: Into<String>>(source_name: S, err: reqwest::Error) -> Self {
        let message = if err.is_timeout() {
            format!("request timed out: {err}")
        } else {
            err.to_string()
        };
        Self::transport(source_name, message)
    }
}

impl StorageError {
    /// Create a corrupt row error
    pub fn corrupt<F: Into<String>, V: ToString>(field: F, value: V) -> Self {
        Self::Corrupt {
            field: field.into(),
            value: value.to_string(),
        }
    }
}
