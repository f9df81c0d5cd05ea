//! In-memory scan registry.
//!
//! A scan is one completed analysis plus the summaries of the two images it
//! compared. Records live for the lifetime of the process only; image bytes
//! are never retained. The store holds at most a fixed number of records and
//! evicts the oldest when a new one would exceed it.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::analysis::AnalysisResult;
use crate::types::{ScanId, Timestamp};
use crate::upload::ImageSummary;

/// A completed analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanRecord {
    pub id: ScanId,
    pub patient_id: Option<String>,
    pub created_at: Timestamp,
    pub pre_op: ImageSummary,
    pub during_op: ImageSummary,
    pub analysis_results: AnalysisResult,
}

/// Default number of scans kept before the oldest is evicted.
pub const DEFAULT_MAX_SCANS: usize = 10_000;

/// Thread-safe registry of [`ScanRecord`]s, shared via `Arc<ScanStore>`.
#[derive(Debug)]
pub struct ScanStore {
    scans: RwLock<HashMap<ScanId, ScanRecord>>,
    max_records: usize,
}

impl Default for ScanStore {
    fn default() -> Self {
        Self::with_limit(DEFAULT_MAX_SCANS)
    }
}

impl ScanStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store holding at most `max_records` scans (minimum one).
    pub fn with_limit(max_records: usize) -> Self {
        Self {
            scans: RwLock::new(HashMap::new()),
            max_records: max_records.max(1),
        }
    }

    pub fn max_records(&self) -> usize {
        self.max_records
    }

    /// Store a record, replacing any existing record with the same id.
    ///
    /// When the store is full, the record with the oldest `created_at` is
    /// evicted first.
    pub async fn insert(&self, record: ScanRecord) {
        let mut scans = self.scans.write().await;
        if !scans.contains_key(&record.id) {
            while scans.len() >= self.max_records {
                let Some(oldest) = scans
                    .values()
                    .min_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)))
                    .map(|scan| scan.id)
                else {
                    break;
                };
                scans.remove(&oldest);
                tracing::debug!(scan_id = %oldest, "Evicted oldest scan");
            }
        }
        scans.insert(record.id, record);
    }

    pub async fn get(&self, id: ScanId) -> Option<ScanRecord> {
        self.scans.read().await.get(&id).cloned()
    }

    /// List scans oldest first, optionally restricted to one patient.
    pub async fn list(&self, patient_id: Option<&str>) -> Vec<ScanRecord> {
        let mut scans: Vec<ScanRecord> = self
            .scans
            .read()
            .await
            .values()
            .filter(|scan| patient_id.is_none() || scan.patient_id.as_deref() == patient_id)
            .cloned()
            .collect();
        scans.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        scans
    }

    /// Remove a record. Returns `false` if no such scan existed.
    pub async fn remove(&self, id: ScanId) -> bool {
        self.scans.write().await.remove(&id).is_some()
    }

    pub async fn count(&self) -> usize {
        self.scans.read().await.len()
    }
}
