//! Remote job API contract
//!
//! The engine drives any vendor that exposes a create/poll/fetch job
//! protocol through this trait. Wire formats, authentication, and
//! marketplace specifics live in the vendor adapter, not here.

use async_trait::async_trait;

use crate::error::RemoteError;
use crate::types::{JobKey, ProcessingState};

/// Result of a successful CREATE request
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreateOutcome {
    /// Remote-assigned job ID
    pub job_id: String,
    /// Processing state reported at creation time, if any
    pub initial_state: Option<ProcessingState>,
    /// Non-fatal diagnostics the vendor attached to the creation response
    pub diagnostics: Option<String>,
}

/// Result of a successful POLL request
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PollOutcome {
    /// Current vendor-reported processing state
    pub state: ProcessingState,
    /// Artifact ID, present once the state is done
    pub artifact_id: Option<String>,
}

/// Raw generated report payload, fetched once processing completes
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RawArtifact {
    /// Undecoded artifact bytes as served by the vendor
    pub data: Vec<u8>,
}

impl RawArtifact {
    /// Wrap raw bytes
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }
}

/// Vendor adapter for one remote reporting account
///
/// Every method fails with a [`RemoteError`] on transport, throttling, or
/// server faults; the coordinator records the failure in the tracker and
/// propagates it. Implementations should not retry internally; repeated
/// `retrieve` calls are the retry mechanism.
#[async_trait]
pub trait ReportApi: Send + Sync {
    /// Ask the vendor to start generating the report identified by `key`
    async fn create_job(&self, key: &JobKey) -> Result<CreateOutcome, RemoteError>;

    /// Query the current state of a previously created job
    async fn poll_job(&self, job_id: &str) -> Result<PollOutcome, RemoteError>;

    /// Download the generated artifact
    async fn fetch_artifact(&self, artifact_id: &str) -> Result<RawArtifact, RemoteError>;
}
