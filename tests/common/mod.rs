//! Common test utilities for reportfetch integration tests

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDate;
use reportfetch::{
    ArtifactBuilder, BuildError, CommitError, CommitOutcome, CreateOutcome, JobKey, OutputSink,
    PollOutcome, ProcessingState, RawArtifact, RemoteError, ReportApi,
};

/// A report key for a fixed July 2024 window
#[allow(dead_code)]
pub fn july_key() -> JobKey {
    JobKey::new(
        "orders",
        "US",
        NaiveDate::from_ymd_opt(2024, 7, 1).expect("valid date"),
        NaiveDate::from_ymd_opt(2024, 7, 31).expect("valid date"),
    )
}

/// Shared scripted vendor: each call pops the next queued response for
/// its operation and bumps a counter. Clones share the same script.
#[derive(Clone, Default)]
pub struct TestVendor {
    inner: Arc<VendorInner>,
}

#[derive(Default)]
struct VendorInner {
    create_responses: Mutex<VecDeque<Result<CreateOutcome, RemoteError>>>,
    poll_responses: Mutex<VecDeque<Result<PollOutcome, RemoteError>>>,
    fetch_responses: Mutex<VecDeque<Result<RawArtifact, RemoteError>>>,
    create_calls: AtomicU32,
    poll_calls: AtomicU32,
    fetch_calls: AtomicU32,
}

#[allow(dead_code)]
impl TestVendor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_create(&self, response: Result<CreateOutcome, RemoteError>) {
        self.inner
            .create_responses
            .lock()
            .expect("lock poisoned")
            .push_back(response);
    }

    pub fn on_poll(&self, response: Result<PollOutcome, RemoteError>) {
        self.inner
            .poll_responses
            .lock()
            .expect("lock poisoned")
            .push_back(response);
    }

    pub fn on_fetch(&self, response: Result<RawArtifact, RemoteError>) {
        self.inner
            .fetch_responses
            .lock()
            .expect("lock poisoned")
            .push_back(response);
    }

    /// `(create, poll, fetch)` call counts so far
    pub fn calls(&self) -> (u32, u32, u32) {
        (
            self.inner.create_calls.load(Ordering::SeqCst),
            self.inner.poll_calls.load(Ordering::SeqCst),
            self.inner.fetch_calls.load(Ordering::SeqCst),
        )
    }
}

#[async_trait]
impl ReportApi for TestVendor {
    async fn create_job(&self, _key: &JobKey) -> Result<CreateOutcome, RemoteError> {
        self.inner.create_calls.fetch_add(1, Ordering::SeqCst);
        self.inner
            .create_responses
            .lock()
            .expect("lock poisoned")
            .pop_front()
            .expect("unexpected CREATE call")
    }

    async fn poll_job(&self, _job_id: &str) -> Result<PollOutcome, RemoteError> {
        self.inner.poll_calls.fetch_add(1, Ordering::SeqCst);
        self.inner
            .poll_responses
            .lock()
            .expect("lock poisoned")
            .pop_front()
            .expect("unexpected POLL call")
    }

    async fn fetch_artifact(&self, _artifact_id: &str) -> Result<RawArtifact, RemoteError> {
        self.inner.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.inner
            .fetch_responses
            .lock()
            .expect("lock poisoned")
            .pop_front()
            .expect("unexpected FETCH call")
    }
}

/// Successful CREATE response with the given job ID, queued state
#[allow(dead_code)]
pub fn create_ok(job_id: &str) -> Result<CreateOutcome, RemoteError> {
    Ok(CreateOutcome {
        job_id: job_id.to_string(),
        initial_state: Some(ProcessingState::InQueue),
        diagnostics: None,
    })
}

/// Successful POLL response for a still-waiting job
#[allow(dead_code)]
pub fn poll_waiting(state: ProcessingState) -> Result<PollOutcome, RemoteError> {
    Ok(PollOutcome {
        state,
        artifact_id: None,
    })
}

/// Successful POLL response for a finished job
#[allow(dead_code)]
pub fn poll_done(artifact_id: &str) -> Result<PollOutcome, RemoteError> {
    Ok(PollOutcome {
        state: ProcessingState::Done,
        artifact_id: Some(artifact_id.to_string()),
    })
}

/// Builder that decodes the artifact as UTF-8 and splits it into
/// non-empty lines
#[derive(Clone, Default)]
pub struct LineBuilder;

#[async_trait]
impl ArtifactBuilder for LineBuilder {
    type Records = Vec<String>;

    async fn build(&self, _key: &JobKey, artifact: RawArtifact) -> Result<Vec<String>, BuildError> {
        let text =
            String::from_utf8(artifact.data).map_err(|e| BuildError::Decode(e.to_string()))?;
        Ok(text
            .lines()
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }
}

/// Sink that collects committed batches in memory; clones share storage
#[derive(Clone, Default)]
pub struct CollectingSink {
    batches: Arc<Mutex<Vec<Vec<String>>>>,
}

#[allow(dead_code)]
impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batches(&self) -> Vec<Vec<String>> {
        self.batches.lock().expect("lock poisoned").clone()
    }

    pub fn total_records(&self) -> usize {
        self.batches
            .lock()
            .expect("lock poisoned")
            .iter()
            .map(Vec::len)
            .sum()
    }
}

#[async_trait]
impl OutputSink for CollectingSink {
    type Records = Vec<String>;

    async fn commit(&self, _key: &JobKey, records: Vec<String>) -> Result<CommitOutcome, CommitError> {
        if records.is_empty() {
            return Ok(CommitOutcome::Empty);
        }
        let count = records.len() as u64;
        self.batches.lock().expect("lock poisoned").push(records);
        Ok(CommitOutcome::Saved { records: count })
    }
}
