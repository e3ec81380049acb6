use log::debug;
use std::sync::Arc;

use super::orders_model::{ImportRecord, OrderAttributes};
use super::orders_traits::OrderRepositoryTrait;
use crate::errors::Result;

pub const DEFAULT_UPDATE_CHUNK_SIZE: usize = 50;

/// Writes order headers in bulk: one atomic insert for the whole new set and
/// chunked update transactions for matched rows.
pub struct OrderBulkWriter {
    repository: Arc<dyn OrderRepositoryTrait>,
    chunk_size: usize,
}

impl OrderBulkWriter {
    pub fn new(repository: Arc<dyn OrderRepositoryTrait>) -> Self {
        Self {
            repository,
            chunk_size: DEFAULT_UPDATE_CHUNK_SIZE,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Inserts every record in one repository call. Either all rows land or
    /// none do.
    pub async fn insert(&self, records: &[ImportRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }
        let rows = records
            .iter()
            .map(|record| record.attributes.clone())
            .collect::<Vec<_>>();
        let inserted = self.repository.insert_orders(rows).await?;
        debug!("Inserted {} orders", inserted);
        Ok(inserted)
    }

    /// Applies updates chunk by chunk, each chunk committed on its own. A
    /// failing chunk stops the run; chunks before it stay committed.
    pub async fn update(&self, updates: Vec<(i64, OrderAttributes)>) -> Result<usize> {
        let mut affected = 0;
        let mut remaining = updates.into_iter().peekable();
        let mut chunk_index = 0;
        while remaining.peek().is_some() {
            let chunk: Vec<_> = remaining.by_ref().take(self.chunk_size).collect();
            let chunk_len = chunk.len();
            affected += self.repository.update_orders(chunk).await?;
            debug!("Committed update chunk {} ({} orders)", chunk_index, chunk_len);
            chunk_index += 1;
        }
        Ok(affected)
    }

    pub async fn insert_one(&self, record: &ImportRecord) -> Result<i64> {
        self.repository
            .insert_order(record.attributes.clone())
            .await
    }

    pub async fn update_one(&self, order_id: i64, attributes: OrderAttributes) -> Result<usize> {
        self.repository.update_order(order_id, attributes).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orders::test_support::{attributes, record, InMemoryOrderStore};

    #[tokio::test]
    async fn updates_are_committed_in_chunks() {
        let store = Arc::new(InMemoryOrderStore::default());
        let updates: Vec<_> = (0..120)
            .map(|n| {
                let id = store.seed_order(attributes(Some(&format!("R-{n}")), None));
                (id, attributes(Some(&format!("R-{n}")), Some(&format!("{n}"))))
            })
            .collect();

        let writer = OrderBulkWriter::new(store.clone());
        let affected = writer.update(updates).await.expect("update");

        assert_eq!(affected, 120);
        assert_eq!(store.stats().update_transactions, 3);
        assert_eq!(
            store.order(1).and_then(|o| o.order_number).as_deref(),
            Some("0")
        );
    }

    #[tokio::test]
    async fn insert_is_one_call_and_skips_empty_sets() {
        let store = Arc::new(InMemoryOrderStore::default());
        let writer = OrderBulkWriter::new(store.clone()).with_chunk_size(0);
        assert_eq!(writer.chunk_size(), 1);

        assert_eq!(writer.insert(&[]).await.expect("empty insert"), 0);
        assert_eq!(store.stats().bulk_inserts, 0);

        let records = vec![record(Some("A"), None), record(Some("B"), None)];
        assert_eq!(writer.insert(&records).await.expect("insert"), 2);
        assert_eq!(store.stats().bulk_inserts, 1);
        assert_eq!(store.order_count(), 2);
    }

    #[tokio::test]
    async fn conflicting_insert_writes_nothing() {
        let store = Arc::new(InMemoryOrderStore::default());
        store.seed_order(attributes(Some("B"), None));
        let writer = OrderBulkWriter::new(store.clone());

        let records = vec![record(Some("A"), None), record(Some("B"), None)];
        let err = writer.insert(&records).await.expect_err("conflict");
        assert!(err.is_unique_violation());
        assert_eq!(store.order_count(), 1);
    }
}
