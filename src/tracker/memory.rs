//! In-memory tracker with optional JSON snapshots

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use tokio::sync::RwLock;

use crate::error::TrackingError;
use crate::types::{JobKey, JobRecord};

use super::Tracker;

/// Tracker backed by an in-process map
///
/// Not durable by itself; [`save`](MemoryTracker::save) and
/// [`load`](MemoryTracker::load) snapshot the whole map to a JSON file
/// for crude persistence between runs. Suited to tests and one-shot
/// scripts; long-running processes should use
/// [`SqliteTracker`](super::SqliteTracker).
#[derive(Default)]
pub struct MemoryTracker {
    records: RwLock<HashMap<JobKey, JobRecord>>,
}

impl MemoryTracker {
    /// Create an empty tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a tracker from a JSON snapshot written by [`save`](Self::save)
    pub async fn load(path: &Path) -> Result<Self, TrackingError> {
        let data = tokio::fs::read(path)
            .await
            .map_err(|e| TrackingError::Snapshot(format!("failed to read {}: {e}", path.display())))?;
        let entries: Vec<(JobKey, JobRecord)> = serde_json::from_slice(&data)
            .map_err(|e| TrackingError::Snapshot(format!("failed to parse {}: {e}", path.display())))?;
        Ok(Self {
            records: RwLock::new(entries.into_iter().collect()),
        })
    }

    /// Write the current map to a JSON snapshot
    pub async fn save(&self, path: &Path) -> Result<(), TrackingError> {
        let records = self.records.read().await;
        // Stored as an entry list: JobKey is a struct key, which JSON maps
        // cannot express.
        let entries: Vec<(&JobKey, &JobRecord)> = records.iter().collect();
        let data = serde_json::to_vec_pretty(&entries)
            .map_err(|e| TrackingError::Snapshot(format!("failed to serialize tracker: {e}")))?;
        tokio::fs::write(path, data)
            .await
            .map_err(|e| TrackingError::Snapshot(format!("failed to write {}: {e}", path.display())))?;
        Ok(())
    }

    /// Number of tracked keys
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Whether the tracker holds no records
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl Tracker for MemoryTracker {
    async fn get(&self, key: &JobKey) -> Result<Option<JobRecord>, TrackingError> {
        Ok(self.records.read().await.get(key).cloned())
    }

    async fn put(&self, key: &JobKey, record: JobRecord) -> Result<(), TrackingError> {
        self.records.write().await.insert(key.clone(), record);
        Ok(())
    }
}
