use std::collections::HashSet;

use super::index::ExistingOrderIndex;
use super::orders_model::{ImportRecord, OrderAttributes};

/// A batch record matched to a stored order.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingUpdate {
    pub order_id: i64,
    pub record: ImportRecord,
    /// Incoming attributes with the stored identity keys filled back in.
    pub attributes: OrderAttributes,
    /// Whether `attributes` differs from the stored row.
    pub dirty: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Partition {
    pub to_insert: Vec<ImportRecord>,
    pub to_update: Vec<PendingUpdate>,
    /// Records that would have claimed a row already claimed earlier in the
    /// batch, e.g. one record keyed by remote id and another by the same
    /// order number.
    pub collapsed: usize,
}

impl PendingUpdate {
    /// Skip-unless-dirty: forced runs write every match, others only changed rows.
    pub fn should_write(&self, force_update: bool) -> bool {
        force_update || self.dirty
    }
}

impl Partition {
    pub fn dirty_count(&self) -> usize {
        self.to_update.iter().filter(|update| update.dirty).count()
    }
}

/// Splits a deduplicated batch into new and existing orders. Input order is
/// preserved within each side.
pub fn partition(records: Vec<ImportRecord>, index: &ExistingOrderIndex) -> Partition {
    let mut result = Partition::default();
    let mut claimed_rows = HashSet::new();
    let mut claimed_keys = HashSet::new();

    for record in records {
        match index.resolve(&record.attributes) {
            Some(existing) => {
                if !claimed_rows.insert(existing.id) {
                    result.collapsed += 1;
                    continue;
                }
                let attributes = record
                    .attributes
                    .clone()
                    .with_identity_from(&existing.attributes);
                let dirty = is_dirty(&existing.attributes, &attributes);
                result.to_update.push(PendingUpdate {
                    order_id: existing.id,
                    record,
                    attributes,
                    dirty,
                });
            }
            None => {
                let keys = insert_keys(&record.attributes);
                if keys.iter().any(|key| claimed_keys.contains(key)) {
                    result.collapsed += 1;
                    continue;
                }
                claimed_keys.extend(keys);
                result.to_insert.push(record);
            }
        }
    }
    result
}

/// Skip-unless-dirty comparison over every writable column.
pub fn is_dirty(existing: &OrderAttributes, incoming: &OrderAttributes) -> bool {
    existing != incoming
}

fn insert_keys(attributes: &OrderAttributes) -> Vec<(bool, String)> {
    let mut keys = Vec::with_capacity(2);
    if let Some(id) = attributes.remote_id.as_deref().map(str::trim) {
        if !id.is_empty() {
            keys.push((true, id.to_string()));
        }
    }
    if let Some(number) = attributes.order_number.as_deref().map(str::trim) {
        if !number.is_empty() {
            keys.push((false, number.to_string()));
        }
    }
    keys
}
