//! Progress events published after every synchronized batch.

use serde::{Deserialize, Serialize};
use std::sync::Mutex;

use crate::orders::SyncRunReport;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncProgressEvent {
    pub run_id: String,
    pub dry_run: bool,
    pub processed: usize,
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
    pub elapsed_seconds: f64,
    pub peak_memory_delta_bytes: u64,
}

impl SyncProgressEvent {
    pub fn from_report(report: &SyncRunReport) -> Self {
        Self {
            run_id: report.run_id.clone(),
            dry_run: report.dry_run,
            processed: report.processed,
            created: report.created,
            updated: report.updated,
            skipped: report.skipped,
            failed: report.failed,
            elapsed_seconds: report.duration_ms as f64 / 1000.0,
            peak_memory_delta_bytes: report.peak_memory_delta_bytes,
        }
    }
}

/// Receives progress events. Implementations must not block the sync.
pub trait SyncEventSink: Send + Sync {
    fn emit(&self, event: SyncProgressEvent);
}

pub struct NoOpSyncEventSink;

impl SyncEventSink for NoOpSyncEventSink {
    fn emit(&self, _event: SyncProgressEvent) {}
}

/// Keeps every emitted event in memory. Useful for tests and for callers that
/// poll progress.
#[derive(Default)]
pub struct CollectingSyncEventSink {
    events: Mutex<Vec<SyncProgressEvent>>,
}

impl CollectingSyncEventSink {
    pub fn events(&self) -> Vec<SyncProgressEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl SyncEventSink for CollectingSyncEventSink {
    fn emit(&self, event: SyncProgressEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
