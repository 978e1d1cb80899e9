//! Core types for reportfetch

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;

/// Identity of one report request: kind + scope + date range
///
/// Stable and comparable; used as the tracker's lookup key. A `JobKey` is
/// immutable once it has been passed to
/// [`retrieve`](crate::coordinator::RetrievalCoordinator::retrieve).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobKey {
    /// Report kind (e.g., a vendor report type name)
    pub kind: String,
    /// Scope the report covers (e.g., a marketplace or account)
    pub scope: String,
    /// First day of the reporting period (inclusive)
    pub period_start: NaiveDate,
    /// Last day of the reporting period (inclusive)
    pub period_end: NaiveDate,
}

impl JobKey {
    /// Create a new JobKey
    pub fn new(
        kind: impl Into<String>,
        scope: impl Into<String>,
        period_start: NaiveDate,
        period_end: NaiveDate,
    ) -> Self {
        Self {
            kind: kind.into(),
            scope: scope.into(),
            period_start,
            period_end,
        }
    }
}

impl std::fmt::Display for JobKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}/{}..{}",
            self.kind, self.scope, self.period_start, self.period_end
        )
    }
}

/// Vendor-reported processing state of a remote report job
///
/// Unrecognized vendor states are preserved verbatim in `Other` rather
/// than dropped, so the tracker always reflects what the vendor said.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ProcessingState {
    /// Job accepted, waiting to start
    InQueue,
    /// Job is being generated
    InProgress,
    /// Job finished; an artifact is available
    Done,
    /// Job was cancelled by the vendor
    Cancelled,
    /// Job failed on the vendor side
    Fatal,
    /// Any other vendor-reported state, preserved verbatim
    Other(String),
}

impl ProcessingState {
    /// The canonical vendor string for this state
    pub fn as_str(&self) -> &str {
        match self {
            ProcessingState::InQueue => "IN_QUEUE",
            ProcessingState::InProgress => "IN_PROGRESS",
            ProcessingState::Done => "DONE",
            ProcessingState::Cancelled => "CANCELLED",
            ProcessingState::Fatal => "FATAL",
            ProcessingState::Other(s) => s,
        }
    }

    /// Parse a vendor state string
    pub fn parse(s: &str) -> Self {
        match s {
            "IN_QUEUE" => ProcessingState::InQueue,
            "IN_PROGRESS" => ProcessingState::InProgress,
            "DONE" => ProcessingState::Done,
            "CANCELLED" => ProcessingState::Cancelled,
            "FATAL" => ProcessingState::Fatal,
            other => ProcessingState::Other(other.to_string()),
        }
    }

    /// Whether the job is still being generated and should be polled again
    pub fn is_waiting(&self) -> bool {
        matches!(
            self,
            ProcessingState::InQueue | ProcessingState::InProgress | ProcessingState::Other(_)
        )
    }

    /// Whether the job finished and an artifact exists
    pub fn is_done(&self) -> bool {
        matches!(self, ProcessingState::Done)
    }

    /// Whether the vendor gave up on the job (re-creatable)
    pub fn is_terminal_failure(&self) -> bool {
        matches!(self, ProcessingState::Cancelled | ProcessingState::Fatal)
    }
}

impl From<String> for ProcessingState {
    fn from(s: String) -> Self {
        ProcessingState::parse(&s)
    }
}

impl From<ProcessingState> for String {
    fn from(state: ProcessingState) -> Self {
        state.as_str().to_string()
    }
}

impl std::fmt::Display for ProcessingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Save status of a job's fetched artifact
///
/// `Saved` is terminal: once a record reaches it, no further create, poll,
/// or fetch is ever issued for that key.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SavingState {
    /// Nothing has been saved for this job yet
    #[default]
    NotSaved,
    /// The last fetch attempt failed while building or committing
    SaveFailed,
    /// The artifact was fetched and committed, but contained zero records
    EmptySave,
    /// The artifact's records were committed
    Saved,
}

impl SavingState {
    /// The canonical stored string for this state
    pub fn as_str(&self) -> &'static str {
        match self {
            SavingState::NotSaved => "NOT_SAVED",
            SavingState::SaveFailed => "SAVE_FAILED",
            SavingState::EmptySave => "EMPTY_SAVE",
            SavingState::Saved => "SAVED",
        }
    }

    /// Parse a stored state string; unknown values map to `NotSaved`
    pub fn parse(s: &str) -> Self {
        match s {
            "SAVE_FAILED" => SavingState::SaveFailed,
            "EMPTY_SAVE" => SavingState::EmptySave,
            "SAVED" => SavingState::Saved,
            _ => SavingState::NotSaved,
        }
    }
}

impl std::fmt::Display for SavingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Durable state tracked per [`JobKey`]
///
/// Owned by the tracker. The coordinator only ever reads a snapshot and
/// submits whole-record replacements; it never mutates a record in place.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    /// Remote-assigned job ID, absent until creation succeeds
    pub job_id: Option<String>,
    /// Last vendor-reported processing state, absent until first poll
    pub processing_state: Option<ProcessingState>,
    /// Artifact ID, set only once processing has reached done
    pub artifact_id: Option<String>,
    /// Diagnostic from the most recent failed attempt
    pub last_error: Option<String>,
    /// Save status of the fetched artifact
    pub saving_state: SavingState,
}

impl JobRecord {
    /// Record for a job that was just created remotely
    pub fn created(job_id: String, initial_state: Option<ProcessingState>) -> Self {
        Self {
            job_id: Some(job_id),
            processing_state: initial_state,
            artifact_id: None,
            last_error: None,
            saving_state: SavingState::NotSaved,
        }
    }

    /// Record for a CREATE attempt that failed before a job ID was assigned
    pub fn create_failed(diagnostic: String) -> Self {
        Self {
            job_id: None,
            processing_state: None,
            artifact_id: None,
            last_error: Some(diagnostic),
            saving_state: SavingState::NotSaved,
        }
    }

    /// Whether this record is terminal (artifact committed)
    pub fn is_saved(&self) -> bool {
        self.saving_state == SavingState::Saved
    }

    /// Whether the remote job has finished generating an artifact
    pub fn is_done(&self) -> bool {
        self.processing_state
            .as_ref()
            .is_some_and(ProcessingState::is_done)
    }

    /// Whether the next attempt must start over with CREATE
    ///
    /// True when the record never got a job ID (a failed CREATE) or the
    /// vendor reported a terminal failure for the job.
    pub fn needs_create(&self) -> bool {
        self.job_id.is_none()
            || self
                .processing_state
                .as_ref()
                .is_some_and(ProcessingState::is_terminal_failure)
    }
}

/// Transient outcome of one `retrieve` call
///
/// Never persisted; the durable truth lives only in the [`JobRecord`]
/// held by the tracker.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RetrievalStatus {
    /// A remote job was created for this key
    Created,
    /// The job is still being generated; carries the current vendor state
    Processing {
        /// Current vendor-reported state
        state: ProcessingState,
    },
    /// The artifact was fetched and committed, but contained zero records
    FetchedEmpty,
    /// The artifact's records were fetched and committed
    FetchedSaved,
    /// The job was already saved by an earlier call; nothing was issued
    AlreadySaved,
    /// The fetch attempt completed but its output could not be saved
    Failed {
        /// Classification of the failure
        kind: ErrorKind,
    },
}

/// Outcome returned to the caller by one `retrieve` call
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievalResult {
    /// What the call did
    pub status: RetrievalStatus,
    /// Number of records committed, when the call saved data
    pub records_committed: Option<u64>,
}

impl RetrievalResult {
    /// Result with no committed-record count
    pub fn status(status: RetrievalStatus) -> Self {
        Self {
            status,
            records_committed: None,
        }
    }

    /// Result for a fetch that committed `records` rows
    pub fn saved(records: u64) -> Self {
        Self {
            status: RetrievalStatus::FetchedSaved,
            records_committed: Some(records),
        }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> JobKey {
        JobKey::new(
            "settlement",
            "US",
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
        )
    }

    #[test]
    fn job_key_display_is_stable() {
        assert_eq!(key().to_string(), "settlement/US/2024-03-01..2024-03-31");
    }

    #[test]
    fn job_key_equality_and_hash_use_all_fields() {
        let a = key();
        let mut b = key();
        assert_eq!(a, b);

        b.scope = "DE".into();
        assert_ne!(a, b);
    }

    #[test]
    fn processing_state_round_trips_known_values() {
        for s in ["IN_QUEUE", "IN_PROGRESS", "DONE", "CANCELLED", "FATAL"] {
            assert_eq!(ProcessingState::parse(s).as_str(), s);
        }
    }

    #[test]
    fn processing_state_preserves_unknown_values() {
        let state = ProcessingState::parse("IN_REVIEW");
        assert_eq!(state, ProcessingState::Other("IN_REVIEW".into()));
        assert_eq!(state.as_str(), "IN_REVIEW");
        // Unknown states are waiting states: keep polling, the vendor may
        // still move the job to DONE.
        assert!(state.is_waiting());
        assert!(!state.is_done());
        assert!(!state.is_terminal_failure());
    }

    #[test]
    fn processing_state_classification() {
        assert!(ProcessingState::InQueue.is_waiting());
        assert!(ProcessingState::InProgress.is_waiting());
        assert!(!ProcessingState::Done.is_waiting());
        assert!(ProcessingState::Done.is_done());
        assert!(ProcessingState::Cancelled.is_terminal_failure());
        assert!(ProcessingState::Fatal.is_terminal_failure());
        assert!(!ProcessingState::Fatal.is_waiting());
    }

    #[test]
    fn processing_state_serde_uses_vendor_strings() {
        let json = serde_json::to_string(&ProcessingState::InQueue).unwrap();
        assert_eq!(json, "\"IN_QUEUE\"");

        let back: ProcessingState = serde_json::from_str("\"SOMETHING_NEW\"").unwrap();
        assert_eq!(back, ProcessingState::Other("SOMETHING_NEW".into()));
    }

    #[test]
    fn saving_state_round_trips() {
        for s in [
            SavingState::NotSaved,
            SavingState::SaveFailed,
            SavingState::EmptySave,
            SavingState::Saved,
        ] {
            assert_eq!(SavingState::parse(s.as_str()), s);
        }
        assert_eq!(SavingState::parse("garbage"), SavingState::NotSaved);
    }

    #[test]
    fn fresh_record_needs_create() {
        assert!(JobRecord::default().needs_create());
        assert!(JobRecord::create_failed("[remote_error] boom".into()).needs_create());
    }

    #[test]
    fn created_record_does_not_need_create() {
        let record = JobRecord::created("job-1".into(), Some(ProcessingState::InQueue));
        assert!(!record.needs_create());
        assert!(!record.is_done());
        assert!(!record.is_saved());
        assert_eq!(record.last_error, None);
    }

    #[test]
    fn terminal_failure_record_needs_create_again() {
        let record = JobRecord {
            job_id: Some("job-1".into()),
            processing_state: Some(ProcessingState::Fatal),
            ..Default::default()
        };
        assert!(record.needs_create());
    }

    #[test]
    fn done_record_is_done_regardless_of_saving_state() {
        let record = JobRecord {
            job_id: Some("job-1".into()),
            processing_state: Some(ProcessingState::Done),
            artifact_id: Some("doc-1".into()),
            last_error: None,
            saving_state: SavingState::SaveFailed,
        };
        assert!(record.is_done());
        assert!(!record.needs_create());
        assert!(!record.is_saved());
    }

    #[test]
    fn retrieval_result_constructors() {
        let r = RetrievalResult::saved(3);
        assert_eq!(r.status, RetrievalStatus::FetchedSaved);
        assert_eq!(r.records_committed, Some(3));

        let r = RetrievalResult::status(RetrievalStatus::Created);
        assert_eq!(r.records_committed, None);
    }

    #[test]
    fn job_record_serde_round_trip() {
        let record = JobRecord {
            job_id: Some("job-9".into()),
            processing_state: Some(ProcessingState::Other("IN_REVIEW".into())),
            artifact_id: None,
            last_error: Some("[remote_error] throttled".into()),
            saving_state: SavingState::NotSaved,
        };
        let json = serde_json::to_string(&record).unwrap();
        let back: JobRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }
}
