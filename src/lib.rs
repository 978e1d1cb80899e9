//! # reportfetch
//!
//! Resumable retrieval of asynchronously generated remote reports.
//!
//! Many report APIs work the same way: you ask for a report, the vendor
//! generates it in the background, you poll until it is done, then you
//! download the finished artifact. reportfetch drives that create / poll
//! / fetch protocol one step at a time, records every transition in a
//! durable tracker, and saves the fetched artifact through a pluggable
//! builder/sink pair.
//!
//! ## Design Philosophy
//!
//! reportfetch is designed to be:
//! - **Resumable** - every transition is committed to the tracker before
//!   control returns, so a crashed or restarted process picks up exactly
//!   where it left off
//! - **Idempotent** - a saved report is never created, polled, or fetched
//!   again
//! - **Vendor-agnostic** - the remote API, artifact format, and output
//!   destination are all trait seams
//! - **Library-first** - no CLI or UI, purely a Rust crate for embedding
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use reportfetch::{
//!     JobKey, RateLimitConfig, RateLimiter, RetrievalCoordinator, SqliteTracker,
//! };
//! # use reportfetch::{ReportApi, ArtifactBuilder, OutputSink};
//! # async fn example(
//! #     api: impl ReportApi,
//! #     builder: impl ArtifactBuilder<Records = Vec<String>>,
//! #     sink: impl OutputSink<Records = Vec<String>>,
//! # ) -> Result<(), Box<dyn std::error::Error>> {
//! let tracker = Arc::new(SqliteTracker::new(std::path::Path::new("jobs.db")).await?);
//! let limiter = RateLimiter::new(&RateLimitConfig::default());
//! let coordinator = RetrievalCoordinator::new(api, tracker, builder, sink, limiter);
//!
//! let key = JobKey::new(
//!     "orders",
//!     "US",
//!     chrono::NaiveDate::from_ymd_opt(2024, 7, 1).unwrap(),
//!     chrono::NaiveDate::from_ymd_opt(2024, 7, 31).unwrap(),
//! );
//!
//! // Call repeatedly (e.g. from a scheduler) until the report is saved.
//! let result = coordinator.retrieve(&key).await?;
//! println!("status: {:?}", result.status);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// The retrieval protocol state machine
pub mod coordinator;
/// Error types
pub mod error;
/// Stop-and-wait rate limiting for remote operations
pub mod rate_limiter;
/// Remote report job API seam
pub mod remote;
/// Retry logic with exponential backoff
pub mod retry;
/// Artifact builder and output sink seams
pub mod sink;
/// Durable per-job state tracking
pub mod tracker;
/// Core types
pub mod types;

// Re-export commonly used types
pub use config::{RateLimitConfig, RateWindowConfig, RetryConfig};
pub use coordinator::RetrievalCoordinator;
pub use error::{
    BuildError, CommitError, Error, ErrorKind, RemoteError, Result, TrackingError,
};
pub use rate_limiter::{OperationClass, RateLimiter};
pub use remote::{CreateOutcome, PollOutcome, RawArtifact, ReportApi};
pub use retry::{IsRetryable, retrieve_with_retry};
pub use sink::{ArtifactBuilder, CommitOutcome, OutputSink};
pub use tracker::{MemoryTracker, SqliteTracker, Tracker};
pub use types::{
    JobKey, JobRecord, ProcessingState, RetrievalResult, RetrievalStatus, SavingState,
};
