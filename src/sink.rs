//! Artifact building and output persistence
//!
//! The engine hands a fetched [`RawArtifact`] to an injected
//! [`ArtifactBuilder`], then passes the structured records to an
//! [`OutputSink`]. The pair replaces per-report subclassing: to change
//! where records land, swap the sink, not the coordinator.

use async_trait::async_trait;

use crate::error::{BuildError, CommitError};
use crate::remote::RawArtifact;
use crate::types::JobKey;

/// Outcome of a committed save
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Records were persisted
    Saved {
        /// Number of records written
        records: u64,
    },
    /// The artifact built to zero records; nothing was written
    ///
    /// A distinct success, not an error: the vendor may fill in data on a
    /// later window, so the caller can retry the fetch.
    Empty,
}

/// Turns a raw fetched artifact into structured records
#[async_trait]
pub trait ArtifactBuilder: Send + Sync {
    /// Structured record batch produced from one artifact
    type Records: Send + 'static;

    /// Decode and shape the artifact
    ///
    /// An artifact with no usable rows is not an error; return an empty
    /// batch and let the sink classify the commit as
    /// [`CommitOutcome::Empty`].
    async fn build(&self, key: &JobKey, artifact: RawArtifact)
    -> Result<Self::Records, BuildError>;
}

/// Persists structured records
///
/// `commit` is all-or-nothing per call: when it returns an error, none of
/// the batch was persisted; when it returns `Saved`, all of it was.
#[async_trait]
pub trait OutputSink: Send + Sync {
    /// Record batch type accepted by this sink
    type Records: Send + 'static;

    /// Persist the batch, reporting how much landed
    async fn commit(
        &self,
        key: &JobKey,
        records: Self::Records,
    ) -> Result<CommitOutcome, CommitError>;
}
