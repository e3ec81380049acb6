use log::debug;
use std::collections::{BTreeSet, HashMap};

use super::orders_model::{ExistingOrder, ImportRecord, OrderAttributes};
use super::orders_traits::OrderRepositoryTrait;
use crate::errors::Result;

/// Identity → stored row map for one batch, built from at most two bulk lookups.
#[derive(Debug, Clone, Default)]
pub struct ExistingOrderIndex {
    orders: Vec<ExistingOrder>,
    by_remote_id: HashMap<String, usize>,
    by_order_number: HashMap<String, usize>,
}

impl ExistingOrderIndex {
    /// Looks up every remote id and order number present in `records`.
    ///
    /// Both keys are collected from every record, not only the identity key,
    /// because matching falls back to the order number.
    pub fn load(repository: &dyn OrderRepositoryTrait, records: &[ImportRecord]) -> Result<Self> {
        let (remote_ids, order_numbers) = Self::lookup_keys(records);

        let mut rows = Vec::new();
        if !remote_ids.is_empty() {
            rows.extend(repository.find_by_remote_ids(&remote_ids)?);
        }
        if !order_numbers.is_empty() {
            rows.extend(repository.find_by_order_numbers(&order_numbers)?);
        }
        debug!(
            "Existing order lookup: {} remote ids, {} order numbers, {} rows",
            remote_ids.len(),
            order_numbers.len(),
            rows.len()
        );

        Ok(Self::from_rows(rows))
    }

    /// Distinct, non-empty lookup values, sorted for stable statements.
    pub fn lookup_keys(records: &[ImportRecord]) -> (Vec<String>, Vec<String>) {
        let mut remote_ids = BTreeSet::new();
        let mut order_numbers = BTreeSet::new();
        for record in records {
            if let Some(id) = trimmed(record.attributes.remote_id.as_deref()) {
                remote_ids.insert(id.to_string());
            }
            if let Some(number) = trimmed(record.attributes.order_number.as_deref()) {
                order_numbers.insert(number.to_string());
            }
        }
        (
            remote_ids.into_iter().collect(),
            order_numbers.into_iter().collect(),
        )
    }

    /// Builds the index from lookup rows. A row returned by both lookups is kept once.
    pub fn from_rows(rows: impl IntoIterator<Item = ExistingOrder>) -> Self {
        let mut index = Self::default();
        let mut by_id: HashMap<i64, usize> = HashMap::new();

        for row in rows {
            if by_id.contains_key(&row.id) {
                continue;
            }
            let position = index.orders.len();
            by_id.insert(row.id, position);
            if let Some(id) = trimmed(row.attributes.remote_id.as_deref()) {
                index.by_remote_id.insert(id.to_string(), position);
            }
            if let Some(number) = trimmed(row.attributes.order_number.as_deref()) {
                index.by_order_number.insert(number.to_string(), position);
            }
            index.orders.push(row);
        }
        index
    }

    /// Matches by remote id first, then by order number.
    pub fn resolve(&self, attributes: &OrderAttributes) -> Option<&ExistingOrder> {
        let by_remote = trimmed(attributes.remote_id.as_deref())
            .and_then(|id| self.by_remote_id.get(id));
        let by_number = || {
            trimmed(attributes.order_number.as_deref())
                .and_then(|number| self.by_order_number.get(number))
        };
        by_remote
            .or_else(by_number)
            .map(|position| &self.orders[*position])
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}

fn trimmed(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orders::test_support::{attributes, record, InMemoryOrderStore};

    #[test]
    fn resolves_by_remote_id_before_order_number() {
        let index = ExistingOrderIndex::from_rows(vec![
            ExistingOrder {
                id: 1,
                attributes: attributes(Some("R-1"), Some("100")),
            },
            ExistingOrder {
                id: 2,
                attributes: attributes(Some("R-2"), Some("200")),
            },
        ]);

        // Remote id points at row 1, order number at row 2: remote id wins.
        let incoming = attributes(Some("R-1"), Some("200"));
        assert_eq!(index.resolve(&incoming).map(|o| o.id), Some(1));

        let by_number = attributes(None, Some("200"));
        assert_eq!(index.resolve(&by_number).map(|o| o.id), Some(2));

        let unknown_remote = attributes(Some("R-9"), Some("100"));
        assert_eq!(index.resolve(&unknown_remote).map(|o| o.id), Some(1));

        assert!(index.resolve(&attributes(Some("R-9"), None)).is_none());
    }

    #[test]
    fn rows_returned_by_both_lookups_are_kept_once() {
        let row = ExistingOrder {
            id: 7,
            attributes: attributes(Some("R-7"), Some("700")),
        };
        let index = ExistingOrderIndex::from_rows(vec![row.clone(), row]);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn lookup_keys_are_distinct_and_non_empty() {
        let records = vec![
            record(Some("R-1"), Some("100")),
            record(Some("R-1"), None),
            record(Some(" "), Some("200")),
        ];
        let (remote_ids, order_numbers) = ExistingOrderIndex::lookup_keys(&records);
        assert_eq!(remote_ids, vec!["R-1".to_string()]);
        assert_eq!(order_numbers, vec!["100".to_string(), "200".to_string()]);
    }

    #[test]
    fn load_issues_at_most_two_lookups() {
        let store = InMemoryOrderStore::default();
        store.seed_order(attributes(Some("R-1"), Some("100")));
        store.seed_order(attributes(None, Some("200")));

        let records: Vec<_> = (0..250)
            .map(|n| record(Some(&format!("R-{n}")), Some(&format!("{n}00"))))
            .collect();
        let index = ExistingOrderIndex::load(&store, &records).expect("load index");

        assert_eq!(store.stats().lookups, 2);
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn load_skips_lookups_without_keys() {
        let store = InMemoryOrderStore::default();
        let records = vec![record(None, Some("100"))];
        ExistingOrderIndex::load(&store, &records).expect("load index");
        assert_eq!(store.stats().lookups, 1);
    }
}
