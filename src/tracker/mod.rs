//! Durable job-state tracking
//!
//! The tracker is the engine's only shared mutable resource: a key-value
//! store mapping a [`JobKey`] to its last-known [`JobRecord`]. Durability
//! across process restarts is what makes retrieval idempotent: after a
//! crash, a re-invocation resumes from the last committed record instead
//! of creating a duplicate remote job.
//!
//! ## Implementations
//!
//! - [`MemoryTracker`]: in-memory map with optional JSON snapshots,
//!   for tests and one-shot scripts
//! - [`SqliteTracker`]: SQLite-backed, the durable default

use async_trait::async_trait;

use crate::error::TrackingError;
use crate::types::{JobKey, JobRecord};

mod memory;
mod sqlite;

pub use memory::MemoryTracker;
pub use sqlite::SqliteTracker;

/// Durable key-value store for job records
///
/// Writes are whole-record replacements keyed by [`JobKey`]; the
/// coordinator never mutates a stored record in place. Implementations do
/// not need to coordinate concurrent writers for a single key; per-key
/// serialization is the caller's responsibility.
#[async_trait]
pub trait Tracker: Send + Sync {
    /// Fetch the last committed record for a key, if any
    async fn get(&self, key: &JobKey) -> Result<Option<JobRecord>, TrackingError>;

    /// Replace the record for a key
    async fn put(&self, key: &JobKey, record: JobRecord) -> Result<(), TrackingError>;
}
