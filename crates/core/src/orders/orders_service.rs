use log::{debug, error, info, warn};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;

use super::config::{SyncEngineConfig, WriteMode};
use super::dedup::deduplicate;
use super::index::ExistingOrderIndex;
use super::normalizer::normalize_batch;
use super::orders_model::{ImportRecord, OrderAttributes, OrderPage, PagingState, ResolvedOrder};
use super::orders_traits::{OrderRelationRepositoryTrait, OrderRepositoryTrait, OrderSource};
use super::partition::{partition, Partition};
use super::relations::{RelationSyncHandler, RelationshipReconciler};
use super::report::SyncRunReport;
use super::writer::OrderBulkWriter;
use crate::errors::Result;
use crate::events::{NoOpSyncEventSink, SyncEventSink, SyncProgressEvent};
use crate::utils::memory::MemoryTracker;

/// Imports batches of remote orders into local storage.
///
/// Each call is a function of the input batch and the current database state:
/// normalize, deduplicate, index existing rows, partition, write order
/// headers, then reconcile child relations.
pub struct OrderSyncService {
    orders: Arc<dyn OrderRepositoryTrait>,
    writer: OrderBulkWriter,
    reconciler: RelationshipReconciler,
    config: SyncEngineConfig,
    event_sink: Arc<dyn SyncEventSink>,
}

/// Timing and memory sampling for one batch.
struct RunClock {
    started: Instant,
    memory: MemoryTracker,
}

impl RunClock {
    fn start() -> Self {
        Self {
            started: Instant::now(),
            memory: MemoryTracker::start(),
        }
    }

    fn checkpoint(&mut self) {
        self.memory.sample();
    }
}

impl OrderSyncService {
    pub fn new(
        orders: Arc<dyn OrderRepositoryTrait>,
        relations: Arc<dyn OrderRelationRepositoryTrait>,
    ) -> Self {
        Self::with_config(orders, relations, SyncEngineConfig::default())
    }

    pub fn with_config(
        orders: Arc<dyn OrderRepositoryTrait>,
        relations: Arc<dyn OrderRelationRepositoryTrait>,
        config: SyncEngineConfig,
    ) -> Self {
        Self {
            writer: OrderBulkWriter::new(orders.clone()).with_chunk_size(config.update_chunk_size),
            reconciler: RelationshipReconciler::for_kinds(relations, &config.relations),
            orders,
            config,
            event_sink: Arc::new(NoOpSyncEventSink),
        }
    }

    pub fn with_event_sink(mut self, event_sink: Arc<dyn SyncEventSink>) -> Self {
        self.event_sink = event_sink;
        self
    }

    /// Replaces the relation handlers, e.g. to add a custom child table.
    pub fn with_relation_handlers(
        mut self,
        relations: Arc<dyn OrderRelationRepositoryTrait>,
        handlers: Vec<Box<dyn RelationSyncHandler>>,
    ) -> Self {
        self.reconciler = RelationshipReconciler::with_handlers(relations, handlers);
        self
    }

    pub fn config(&self) -> &SyncEngineConfig {
        &self.config
    }

    /// Imports one batch of raw payloads.
    ///
    /// With `force_update = false`, matched orders whose attributes are
    /// unchanged are not written and count as skipped. Their child relations
    /// are still reconciled.
    pub async fn import(&self, batch: &[Value], force_update: bool) -> Result<SyncRunReport> {
        let mut clock = RunClock::start();
        let mut report = SyncRunReport::new(false);

        let normalized = normalize_batch(batch);
        report.discarded = normalized.discarded;
        clock.checkpoint();

        self.run(normalized.records, force_update, report, clock)
            .await
    }

    /// Imports records that were already normalized by the caller.
    pub async fn import_records(
        &self,
        records: Vec<ImportRecord>,
        force_update: bool,
    ) -> Result<SyncRunReport> {
        let clock = RunClock::start();
        self.run(records, force_update, SyncRunReport::new(false), clock)
            .await
    }

    /// Classifies a batch without writing anything. `created` is the number of
    /// new orders, `updated` the number of matched orders whose attributes
    /// differ from the stored row.
    pub async fn dry_run_import(&self, batch: &[Value]) -> Result<SyncRunReport> {
        let mut clock = RunClock::start();
        let mut report = SyncRunReport::new(true);

        let normalized = normalize_batch(batch);
        report.discarded = normalized.discarded;
        report.processed = normalized.records.len();
        clock.checkpoint();

        if !normalized.records.is_empty() {
            let deduped = deduplicate(normalized.records);
            report.duplicates = deduped.duplicates;
            let index = ExistingOrderIndex::load(self.orders.as_ref(), &deduped.records)?;
            let classified = partition(deduped.records, &index);
            report.created = classified.to_insert.len();
            report.updated = classified.dirty_count();
        }

        Ok(self.finish(report, clock))
    }

    /// Pulls pages from `source` until it reports no further page, importing
    /// each page before fetching the next.
    pub async fn sync_from_source(
        &self,
        source: &dyn OrderSource,
        force_update: bool,
    ) -> Result<SyncRunReport> {
        let mut total = SyncRunReport::new(false);
        let mut state = PagingState::default();
        let mut pages = 0;

        loop {
            let OrderPage { orders, next } = source.fetch_page(&state).await?;
            pages += 1;
            let page_report = self.import(&orders, force_update).await?;
            debug!(
                "Imported page {} ({} payloads, run {})",
                state.page,
                orders.len(),
                page_report.run_id
            );
            total.merge(page_report);

            match next {
                Some(next_state) if next_state == state => {
                    warn!(
                        "Order source returned the same paging state for page {}; stopping",
                        state.page
                    );
                    break;
                }
                Some(next_state) => state = next_state,
                None => break,
            }
        }

        info!(
            "Order sync {} finished after {} pages: {} processed, {} created, {} updated, {} skipped, {} failed",
            total.run_id, pages, total.processed, total.created, total.updated, total.skipped, total.failed
        );
        Ok(total)
    }

    async fn run(
        &self,
        records: Vec<ImportRecord>,
        force_update: bool,
        mut report: SyncRunReport,
        mut clock: RunClock,
    ) -> Result<SyncRunReport> {
        report.processed = records.len();
        if records.is_empty() {
            return Ok(self.finish(report, clock));
        }

        let deduped = deduplicate(records);
        report.duplicates = deduped.duplicates;
        let index = ExistingOrderIndex::load(self.orders.as_ref(), &deduped.records)?;
        let classified = partition(deduped.records, &index);
        debug!(
            "Partitioned batch: {} to insert, {} matched ({} changed), {} collapsed",
            classified.to_insert.len(),
            classified.to_update.len(),
            classified.dirty_count(),
            classified.collapsed
        );

        let resolved = match self.config.write_mode {
            WriteMode::Bulk => self.write_bulk(classified, force_update, &mut report).await?,
            WriteMode::PerRecord => {
                self.write_individually(classified, force_update, &mut report)
                    .await
            }
        };
        clock.checkpoint();

        let outcomes = self.reconciler.reconcile(&resolved).await;
        report.record_relations(outcomes);
        clock.checkpoint();

        Ok(self.finish(report, clock))
    }

    async fn write_bulk(
        &self,
        classified: Partition,
        force_update: bool,
        report: &mut SyncRunReport,
    ) -> Result<Vec<ResolvedOrder>> {
        let Partition {
            to_insert,
            to_update,
            ..
        } = classified;

        let mut resolved = Vec::with_capacity(to_insert.len() + to_update.len());
        let mut updates: Vec<(i64, OrderAttributes)> = Vec::new();
        for pending in to_update {
            if pending.should_write(force_update) {
                updates.push((pending.order_id, pending.attributes));
            }
            resolved.push(ResolvedOrder {
                order_id: pending.order_id,
                record: pending.record,
            });
        }

        match self.writer.insert(&to_insert).await {
            Ok(inserted) => {
                report.created += inserted;
                resolved.extend(self.resolve_inserted(to_insert)?);
            }
            Err(e) if e.is_unique_violation() && self.config.retry_insert_conflicts => {
                warn!(
                    "Bulk insert of {} orders hit an existing identity, resolving them individually: {}",
                    to_insert.len(),
                    e
                );
                let index = ExistingOrderIndex::load(self.orders.as_ref(), &to_insert)?;
                let retry = partition(to_insert, &index);
                resolved.extend(
                    self.write_individually(retry, force_update, report)
                        .await,
                );
            }
            Err(e) => {
                error!("Bulk insert of {} orders failed: {}", to_insert.len(), e);
                return Err(e);
            }
        }

        match self.writer.update(updates).await {
            Ok(affected) => report.updated += affected,
            Err(e) => {
                error!("Bulk order update failed: {}", e);
                return Err(e);
            }
        }

        Ok(resolved)
    }

    /// One transaction per order. Failures are logged with the order identity,
    /// counted, and do not stop the batch.
    async fn write_individually(
        &self,
        classified: Partition,
        force_update: bool,
        report: &mut SyncRunReport,
    ) -> Vec<ResolvedOrder> {
        let mut resolved = Vec::with_capacity(classified.to_insert.len() + classified.to_update.len());

        for pending in classified.to_update {
            if pending.should_write(force_update) {
                match self
                    .writer
                    .update_one(pending.order_id, pending.attributes)
                    .await
                {
                    Ok(affected) => report.updated += affected,
                    Err(e) => {
                        warn!("Failed to update order {}: {}", pending.record.identity, e);
                        report.failed += 1;
                        continue;
                    }
                }
            }
            resolved.push(ResolvedOrder {
                order_id: pending.order_id,
                record: pending.record,
            });
        }

        for record in classified.to_insert {
            match self.writer.insert_one(&record).await {
                Ok(order_id) => {
                    report.created += 1;
                    resolved.push(ResolvedOrder { order_id, record });
                }
                Err(e) => {
                    warn!("Failed to insert order {}: {}", record.identity, e);
                    report.failed += 1;
                }
            }
        }

        resolved
    }

    /// Looks up the row ids of freshly inserted orders with the same two bulk
    /// reads used for the existing-order index.
    fn resolve_inserted(&self, records: Vec<ImportRecord>) -> Result<Vec<ResolvedOrder>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }
        let index = ExistingOrderIndex::load(self.orders.as_ref(), &records)?;
        let mut resolved = Vec::with_capacity(records.len());
        for record in records {
            match index.resolve(&record.attributes) {
                Some(existing) => resolved.push(ResolvedOrder {
                    order_id: existing.id,
                    record,
                }),
                None => warn!(
                    "Inserted order {} not found on reload; skipping its relations",
                    record.identity
                ),
            }
        }
        Ok(resolved)
    }

    fn finish(&self, mut report: SyncRunReport, mut clock: RunClock) -> SyncRunReport {
        clock.checkpoint();
        report.duration_ms = clock.started.elapsed().as_millis() as u64;
        report.peak_memory_delta_bytes = clock.memory.peak_delta_bytes();
        report.finalize();

        info!(
            "Order batch {}{}: {} processed, {} created, {} updated, {} skipped, {} failed, {} discarded in {} ms",
            report.run_id,
            if report.dry_run { " (dry run)" } else { "" },
            report.processed,
            report.created,
            report.updated,
            report.skipped,
            report.failed,
            report.discarded,
            report.duration_ms
        );
        for failed in report.relation_errors() {
            warn!(
                "Relation {} was not synced for batch {}",
                failed.kind.table_name(),
                report.run_id
            );
        }

        self.event_sink
            .emit(SyncProgressEvent::from_report(&report));
        report
    }
}
