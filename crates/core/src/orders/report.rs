use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::relations::RelationSyncOutcome;

/// Counters and timings for one engine invocation, or for a whole streaming
/// run once page reports are merged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRunReport {
    pub run_id: String,
    pub dry_run: bool,
    /// Records that entered the pipeline after normalization.
    pub processed: usize,
    pub created: usize,
    pub updated: usize,
    /// `processed - created - updated - failed`.
    pub skipped: usize,
    pub failed: usize,
    /// Raw payloads dropped because no identity could be resolved.
    pub discarded: usize,
    pub duplicates: usize,
    pub skipped_no_sku: usize,
    pub placeholder_products: usize,
    pub relations: Vec<RelationSyncOutcome>,
    pub duration_ms: u64,
    pub peak_memory_delta_bytes: u64,
}

impl SyncRunReport {
    pub fn new(dry_run: bool) -> Self {
        Self {
            run_id: Uuid::now_v7().to_string(),
            dry_run,
            ..Default::default()
        }
    }

    /// Derives `skipped` from the other counters.
    pub fn finalize(&mut self) {
        self.skipped = self
            .processed
            .saturating_sub(self.created)
            .saturating_sub(self.updated)
            .saturating_sub(self.failed);
    }

    pub fn record_relations(&mut self, outcomes: Vec<RelationSyncOutcome>) {
        for outcome in outcomes {
            self.skipped_no_sku += outcome.skipped_no_sku;
            self.placeholder_products += outcome.placeholders_created;
            match self.relations.iter_mut().find(|r| r.kind == outcome.kind) {
                Some(existing) => existing.absorb(outcome),
                None => self.relations.push(outcome),
            }
        }
    }

    pub fn relation_errors(&self) -> impl Iterator<Item = &RelationSyncOutcome> {
        self.relations.iter().filter(|r| r.error.is_some())
    }

    pub fn orders_per_second(&self) -> f64 {
        if self.duration_ms == 0 {
            return 0.0;
        }
        self.processed as f64 / (self.duration_ms as f64 / 1000.0)
    }

    /// Adds a page report into a run total. Durations add up; the memory
    /// figure keeps the highest peak seen.
    pub fn merge(&mut self, other: SyncRunReport) {
        self.processed += other.processed;
        self.created += other.created;
        self.updated += other.updated;
        self.skipped += other.skipped;
        self.failed += other.failed;
        self.discarded += other.discarded;
        self.duplicates += other.duplicates;
        self.duration_ms += other.duration_ms;
        self.peak_memory_delta_bytes = self
            .peak_memory_delta_bytes
            .max(other.peak_memory_delta_bytes);

        // Relation counters are re-derived from the outcomes.
        let skipped_no_sku = self.skipped_no_sku;
        let placeholder_products = self.placeholder_products;
        self.record_relations(other.relations);
        self.skipped_no_sku = skipped_no_sku + other.skipped_no_sku;
        self.placeholder_products = placeholder_products + other.placeholder_products;
    }
}
