//! Centralized error handling for the stream watcher
//!
//! Errors are grouped by the layer that produces them:
//!
//! - **Source Errors**: upstream fetch failures and malformed payloads
//! - **Storage Errors**: cache reads, writes and transactions
//! - **App Errors**: everything surfaced at the process edge
//!
//! "No stream" is never an error. Pollers return `Option::None` or an explicit
//! outcome variant for it, so callers can tell an empty channel apart from a
//! broken upstream.
//!
//! # Usage
//!
//! ```rust
//! use stream_watch::errors::{SourceError, SourceResult};
//!
//! fn example() -> SourceResult<u32> {
//!     Err(SourceError::parse("live page", "canonical link missing"))
//! }
//! ```

pub mod types;

pub use types::*;

/// Convenience type alias for Results using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Convenience type alias for upstream source Results
pub type SourceResult<T> = Result<T, SourceError>;

/// Convenience type alias for cache storage Results
pub type StorageResult<T> = Result<T, StorageError>;
