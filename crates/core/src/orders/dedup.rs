use std::collections::HashSet;

use super::orders_model::ImportRecord;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DedupOutcome {
    pub records: Vec<ImportRecord>,
    /// Records dropped because an earlier-ranked record had the same identity.
    pub duplicates: usize,
}

/// Collapses records sharing an identity.
///
/// Processed records rank before open ones; within a rank, arrival order is
/// kept (the sort is stable). The first record per identity survives.
pub fn deduplicate(mut records: Vec<ImportRecord>) -> DedupOutcome {
    records.sort_by_key(|record| !record.is_processed);

    let before = records.len();
    let mut seen = HashSet::with_capacity(before);
    records.retain(|record| seen.insert(record.identity.clone()));

    DedupOutcome {
        duplicates: before - records.len(),
        records,
    }
}
