//! The retrieval protocol state machine
//!
//! [`RetrievalCoordinator::retrieve`] is the engine's sole entry point.
//! Given a job key and the tracker's current view, it decides whether to
//! create, poll, fetch, or do nothing, drives the tracker's transitions,
//! and returns a [`RetrievalResult`].

use std::sync::Arc;

use futures::stream::{self, StreamExt};

use crate::error::{Error, Result};
use crate::rate_limiter::{OperationClass, RateLimiter};
use crate::remote::ReportApi;
use crate::sink::{ArtifactBuilder, CommitOutcome, OutputSink};
use crate::tracker::Tracker;
use crate::types::{JobKey, JobRecord, RetrievalResult, RetrievalStatus, SavingState};

/// Drives the create/poll/fetch protocol for one remote account
///
/// Holds the vendor adapter, the durable tracker, the builder/sink pair
/// that lands fetched artifacts, and the shared rate limiter. The
/// coordinator owns no job state of its own: every `retrieve` call reads
/// a fresh tracker snapshot and writes a whole replacement record back on
/// every exit path, success or failure.
///
/// # Preconditions
///
/// Calls for a single [`JobKey`] must be serialized by the caller. The
/// read-then-write of a job record is not transactional, so two
/// concurrent `retrieve` calls on the same key can race. Different keys
/// never contend and may run concurrently, sharing one limiter.
pub struct RetrievalCoordinator<A, B, S>
where
    A: ReportApi,
    B: ArtifactBuilder,
    S: OutputSink<Records = B::Records>,
{
    api: A,
    tracker: Arc<dyn Tracker>,
    builder: B,
    sink: S,
    limiter: RateLimiter,
}

impl<A, B, S> RetrievalCoordinator<A, B, S>
where
    A: ReportApi,
    B: ArtifactBuilder,
    S: OutputSink<Records = B::Records>,
{
    /// Assemble a coordinator from its collaborators
    ///
    /// Pass a clone of one [`RateLimiter`] to every coordinator that
    /// talks to the same remote account so they share the account-wide
    /// limit.
    pub fn new(
        api: A,
        tracker: Arc<dyn Tracker>,
        builder: B,
        sink: S,
        limiter: RateLimiter,
    ) -> Self {
        Self {
            api,
            tracker,
            builder,
            sink,
            limiter,
        }
    }

    /// The rate limiter this coordinator waits on
    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Advance retrieval of the report identified by `key` by one step
    ///
    /// Reads the tracker's record for the key and takes exactly one
    /// protocol action:
    ///
    /// - no record, a record with no job ID (failed CREATE), or a
    ///   terminal vendor failure: issue CREATE, returns
    ///   [`RetrievalStatus::Created`]
    /// - record already saved: no remote call, returns
    ///   [`RetrievalStatus::AlreadySaved`]
    /// - job finished (now or on an earlier call): issue FETCH, hand
    ///   the artifact to the builder and sink, returns
    ///   `FetchedSaved` / `FetchedEmpty` / `Failed`
    /// - otherwise: issue POLL; if the job just finished, continue
    ///   straight into FETCH, else returns
    ///   [`RetrievalStatus::Processing`]
    ///
    /// Idempotent with respect to already-saved jobs: once a key has
    /// returned `FetchedSaved`, every later call returns `AlreadySaved`
    /// without touching the network.
    ///
    /// Remote and tracker failures propagate as errors, but only after
    /// the attempt has been recorded in the tracker, so a subsequent call
    /// resumes correctly.
    pub async fn retrieve(&self, key: &JobKey) -> Result<RetrievalResult> {
        let snapshot = self.tracker.get(key).await.map_err(Error::Tracking)?;

        match snapshot {
            Some(record) if record.is_saved() => {
                tracing::debug!(key = %key, "Report already saved, nothing to do");
                Ok(RetrievalResult::status(RetrievalStatus::AlreadySaved))
            }
            Some(record) if record.needs_create() => {
                if record.job_id.is_some() {
                    tracing::info!(
                        key = %key,
                        state = ?record.processing_state,
                        "Previous job ended in a terminal vendor state, creating a new one"
                    );
                }
                self.create(key).await
            }
            Some(record) if record.is_done() => self.fetch_and_save(key, record).await,
            Some(record) => self.poll(key, record).await,
            None => self.create(key).await,
        }
    }

    /// Advance retrieval for a batch of keys, a few at a time
    ///
    /// Bulk counterpart of [`retrieve`](Self::retrieve) for sweeping many
    /// report windows in one pass. At most `concurrency` retrievals run at
    /// once; the shared rate limiter spaces their remote requests out.
    /// Returns one `(key, outcome)` pair per input key, in completion
    /// order.
    ///
    /// `keys` must not contain duplicates: per-key call serialization is
    /// the caller's responsibility, and a duplicated key would race with
    /// itself here.
    pub async fn retrieve_many(
        &self,
        keys: Vec<JobKey>,
        concurrency: usize,
    ) -> Vec<(JobKey, Result<RetrievalResult>)> {
        stream::iter(keys)
            .map(|key| async move {
                let outcome = self.retrieve(&key).await;
                (key, outcome)
            })
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await
    }

    /// CREATE branch: ask the vendor to start generating the report
    async fn create(&self, key: &JobKey) -> Result<RetrievalResult> {
        self.limiter.admit(OperationClass::Create).await;
        tracing::info!(key = %key, "Creating remote report job");

        match self.api.create_job(key).await {
            Ok(outcome) => {
                tracing::info!(
                    key = %key,
                    job_id = %outcome.job_id,
                    state = ?outcome.initial_state,
                    "Remote report job created"
                );
                let mut record = JobRecord::created(outcome.job_id, outcome.initial_state);
                // Non-fatal vendor diagnostics from the creation response
                // are kept for the operator.
                record.last_error = outcome.diagnostics;
                self.tracker
                    .put(key, record)
                    .await
                    .map_err(Error::Tracking)?;
                Ok(RetrievalResult::status(RetrievalStatus::Created))
            }
            Err(remote) => {
                let err = Error::Remote(remote);
                tracing::warn!(key = %key, error = %err, "CREATE request failed");
                // Record the failure before propagating so the next call
                // attempts CREATE again instead of getting stuck.
                self.tracker
                    .put(key, JobRecord::create_failed(err.diagnostic()))
                    .await
                    .map_err(Error::Tracking)?;
                Err(err)
            }
        }
    }

    /// POLL branch: refresh the vendor-reported processing state
    async fn poll(&self, key: &JobKey, mut record: JobRecord) -> Result<RetrievalResult> {
        // retrieve() routes records without a job ID to the CREATE branch,
        // but keep the fallback rather than panic on a malformed store.
        let Some(job_id) = record.job_id.clone() else {
            return self.create(key).await;
        };

        self.limiter.admit(OperationClass::Poll).await;
        record.last_error = None;
        tracing::debug!(key = %key, job_id = %job_id, "Polling remote report job");

        match self.api.poll_job(&job_id).await {
            Ok(outcome) => {
                record.processing_state = Some(outcome.state.clone());

                if outcome.state.is_done() {
                    if let Some(artifact_id) = outcome.artifact_id {
                        record.artifact_id = Some(artifact_id);
                    }
                    tracing::info!(
                        key = %key,
                        job_id = %job_id,
                        artifact_id = ?record.artifact_id,
                        "Remote job finished, fetching artifact"
                    );
                    // Commit the done state first so a crash between poll
                    // and fetch resumes at FETCH, not at POLL.
                    self.tracker
                        .put(key, record.clone())
                        .await
                        .map_err(Error::Tracking)?;
                    self.fetch_and_save(key, record).await
                } else {
                    tracing::debug!(
                        key = %key,
                        job_id = %job_id,
                        state = %outcome.state,
                        "Remote job still processing"
                    );
                    self.tracker
                        .put(key, record)
                        .await
                        .map_err(Error::Tracking)?;
                    Ok(RetrievalResult::status(RetrievalStatus::Processing {
                        state: outcome.state,
                    }))
                }
            }
            Err(remote) => {
                let err = Error::Remote(remote);
                tracing::warn!(key = %key, job_id = %job_id, error = %err, "POLL request failed");
                // Keep the previously known processing state; only the
                // diagnostic changes.
                record.last_error = Some(err.diagnostic());
                self.tracker
                    .put(key, record)
                    .await
                    .map_err(Error::Tracking)?;
                Err(err)
            }
        }
    }

    /// FETCH branch: download the artifact, build records, commit them
    async fn fetch_and_save(&self, key: &JobKey, mut record: JobRecord) -> Result<RetrievalResult> {
        record.last_error = None;

        let Some(artifact_id) = record.artifact_id.clone() else {
            // Vendor reported done without an artifact ID. Record the
            // anomaly and propagate; a later poll may supply the ID.
            let err = Error::Remote(crate::error::RemoteError::Server {
                operation: "fetch".into(),
                message: "job is done but no artifact id was reported".into(),
            });
            record.last_error = Some(err.diagnostic());
            self.tracker
                .put(key, record)
                .await
                .map_err(Error::Tracking)?;
            return Err(err);
        };

        self.limiter.admit(OperationClass::Fetch).await;
        tracing::debug!(key = %key, artifact_id = %artifact_id, "Fetching report artifact");

        let artifact = match self.api.fetch_artifact(&artifact_id).await {
            Ok(artifact) => artifact,
            Err(remote) => {
                let err = Error::Remote(remote);
                tracing::warn!(key = %key, artifact_id = %artifact_id, error = %err, "FETCH request failed");
                // Processing stays done so retries skip straight back to
                // FETCH rather than re-creating the job.
                record.last_error = Some(err.diagnostic());
                record.saving_state = SavingState::SaveFailed;
                self.tracker
                    .put(key, record)
                    .await
                    .map_err(Error::Tracking)?;
                return Err(err);
            }
        };

        let records = match self.builder.build(key, artifact).await {
            Ok(records) => records,
            Err(build) => {
                let err = Error::Build(build);
                tracing::warn!(key = %key, error = %err, "Artifact could not be built into records");
                record.last_error = Some(err.diagnostic());
                record.saving_state = SavingState::SaveFailed;
                self.tracker
                    .put(key, record)
                    .await
                    .map_err(Error::Tracking)?;
                return Ok(RetrievalResult::status(RetrievalStatus::Failed {
                    kind: err.kind(),
                }));
            }
        };

        match self.sink.commit(key, records).await {
            Ok(CommitOutcome::Saved { records }) => {
                tracing::info!(key = %key, records, "Report artifact saved");
                record.saving_state = SavingState::Saved;
                self.tracker
                    .put(key, record)
                    .await
                    .map_err(Error::Tracking)?;
                Ok(RetrievalResult::saved(records))
            }
            Ok(CommitOutcome::Empty) => {
                tracing::info!(key = %key, "Report artifact was empty");
                // Empty is a success, but not terminal: the vendor may
                // fill in data later, so a subsequent call re-fetches.
                record.saving_state = SavingState::EmptySave;
                self.tracker
                    .put(key, record)
                    .await
                    .map_err(Error::Tracking)?;
                Ok(RetrievalResult::status(RetrievalStatus::FetchedEmpty))
            }
            Err(commit) => {
                let err = Error::Commit(commit);
                tracing::warn!(key = %key, error = %err, "Sink commit failed");
                record.last_error = Some(err.diagnostic());
                record.saving_state = SavingState::SaveFailed;
                self.tracker
                    .put(key, record)
                    .await
                    .map_err(Error::Tracking)?;
                Ok(RetrievalResult::status(RetrievalStatus::Failed {
                    kind: err.kind(),
                }))
            }
        }
    }
}
