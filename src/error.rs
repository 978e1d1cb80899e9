//! Error types for reportfetch
//!
//! This module provides the error taxonomy for the retrieval engine:
//! - Domain-specific error types (Remote, Tracking, Build, Commit)
//! - Machine-readable error codes for tracker diagnostics
//! - A crate-wide `Result` alias

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for reportfetch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for reportfetch
///
/// Each variant wraps one class of failure from the retrieval protocol.
/// `Remote` errors are transient and retryable by re-invoking `retrieve`;
/// the other classes are permanent for the attempt that produced them.
#[derive(Debug, Error)]
pub enum Error {
    /// Remote job API failure (transport, throttling, server fault)
    #[error("remote job API error: {0}")]
    Remote(#[from] RemoteError),

    /// Tracker I/O failure
    #[error("tracker error: {0}")]
    Tracking(#[from] TrackingError),

    /// Artifact could not be turned into structured records
    #[error("artifact build error: {0}")]
    Build(#[from] BuildError),

    /// Output sink failed to commit structured records
    #[error("commit error: {0}")]
    Commit(#[from] CommitError),

    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "rate_limit.poll")
        key: Option<String>,
    },
}

/// Failures reported by the remote job API
///
/// All three variants are transient from the engine's point of view: the
/// caller may re-invoke `retrieve` and the state machine resumes from the
/// last committed tracker record.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Transport-level failure (connection refused, timeout, reset)
    #[error("transport failure during {operation}: {message}")]
    Transport {
        /// The remote operation that failed ("create", "poll", "fetch")
        operation: String,
        /// Underlying failure description
        message: String,
    },

    /// Request rejected by the vendor's throttling layer
    #[error("request throttled during {operation}: {message}")]
    Throttled {
        /// The remote operation that was throttled
        operation: String,
        /// Vendor-supplied throttling detail
        message: String,
    },

    /// Server-side fault reported by the vendor
    #[error("server fault during {operation}: {message}")]
    Server {
        /// The remote operation the server rejected
        operation: String,
        /// Vendor-supplied fault detail
        message: String,
    },
}

/// Tracker persistence errors
#[derive(Debug, Error)]
pub enum TrackingError {
    /// Failed to open or connect to the tracker store
    #[error("failed to connect to tracker store: {0}")]
    ConnectionFailed(String),

    /// Failed to run tracker schema migrations
    #[error("failed to run tracker migrations: {0}")]
    MigrationFailed(String),

    /// Tracker read or write failed
    #[error("tracker query failed: {0}")]
    QueryFailed(String),

    /// Snapshot save/load failed (file-backed trackers)
    #[error("tracker snapshot failed: {0}")]
    Snapshot(String),
}

/// Artifact build errors
#[derive(Debug, Error)]
pub enum BuildError {
    /// The raw artifact was structurally invalid
    #[error("malformed artifact: {0}")]
    Malformed(String),

    /// The raw artifact could not be decoded into records
    #[error("failed to decode artifact: {0}")]
    Decode(String),
}

/// Output sink commit errors
///
/// A commit is all-or-nothing: when one of these is raised, no records
/// from the attempt were persisted.
#[derive(Debug, Error)]
pub enum CommitError {
    /// Sink-side I/O failure
    #[error("sink I/O failure: {0}")]
    Io(String),

    /// The sink refused the records (constraint violation, bad shape)
    #[error("sink rejected records: {0}")]
    Rejected(String),
}

/// Coarse classification of an [`Error`]
///
/// Used in [`RetrievalStatus::Failed`](crate::types::RetrievalStatus) and
/// in tracker diagnostics, where the full error value is not available.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Remote job API failure
    Remote,
    /// Tracker I/O failure
    Tracking,
    /// Artifact build failure
    Build,
    /// Output sink commit failure
    Commit,
    /// Configuration failure
    Config,
}

impl ErrorKind {
    /// Machine-readable code for this kind
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Remote => "remote_error",
            ErrorKind::Tracking => "tracking_error",
            ErrorKind::Build => "build_error",
            ErrorKind::Commit => "commit_error",
            ErrorKind::Config => "config_error",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error {
    /// Classify this error into its coarse kind
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Remote(_) => ErrorKind::Remote,
            Error::Tracking(_) => ErrorKind::Tracking,
            Error::Build(_) => ErrorKind::Build,
            Error::Commit(_) => ErrorKind::Commit,
            Error::Config { .. } => ErrorKind::Config,
        }
    }

    /// Get the machine-readable error code
    pub fn error_code(&self) -> &'static str {
        self.kind().as_str()
    }

    /// Diagnostic string recorded into the tracker's `last_error` field
    ///
    /// Format: `[code] message`, so operators can grep the tracker store
    /// by failure class.
    pub fn diagnostic(&self) -> String {
        format!("[{}] {}", self.error_code(), self)
    }
}
