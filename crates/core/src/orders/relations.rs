//! Child relation reconciliation.
//!
//! Every relation kind is replaced wholesale for the orders of a batch that
//! carry data for it: one delete scoped to those orders, then one insert of the
//! full new row set. Re-running a batch therefore always converges to the same
//! child rows.

use async_trait::async_trait;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use super::orders_model::{
    OrderIdentifierRow, OrderItemRow, OrderNoteRow, OrderPropertyRow, OrderShippingRow,
    RelationRows, RelationWriteCount, ResolvedOrder,
};
use super::orders_traits::OrderRelationRepositoryTrait;
use crate::errors::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    Items,
    Shipping,
    Notes,
    Properties,
    Identifiers,
}

impl RelationKind {
    /// Default reconciliation order. Items go first.
    pub const ALL: [RelationKind; 5] = [
        RelationKind::Items,
        RelationKind::Shipping,
        RelationKind::Notes,
        RelationKind::Properties,
        RelationKind::Identifiers,
    ];

    pub fn table_name(&self) -> &'static str {
        match self {
            Self::Items => "order_items",
            Self::Shipping => "order_shipping",
            Self::Notes => "order_notes",
            Self::Properties => "order_properties",
            Self::Identifiers => "order_identifiers",
        }
    }

    pub fn of(rows: &RelationRows) -> Self {
        match rows {
            RelationRows::Items(_) => Self::Items,
            RelationRows::Shipping(_) => Self::Shipping,
            RelationRows::Notes(_) => Self::Notes,
            RelationRows::Properties(_) => Self::Properties,
            RelationRows::Identifiers(_) => Self::Identifiers,
        }
    }

    /// Parses the configuration spelling (`items`, `shipping`, ...).
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "items" => Some(Self::Items),
            "shipping" => Some(Self::Shipping),
            "notes" => Some(Self::Notes),
            "properties" => Some(Self::Properties),
            "identifiers" => Some(Self::Identifiers),
            _ => None,
        }
    }
}

/// Result of reconciling one relation kind for one batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationSyncOutcome {
    pub kind: RelationKind,
    /// Orders whose rows of this kind were replaced.
    pub orders: usize,
    pub deleted: usize,
    pub inserted: usize,
    pub skipped_no_sku: usize,
    pub placeholders_created: usize,
    pub error: Option<String>,
}

impl RelationSyncOutcome {
    pub fn empty(kind: RelationKind) -> Self {
        Self {
            kind,
            orders: 0,
            deleted: 0,
            inserted: 0,
            skipped_no_sku: 0,
            placeholders_created: 0,
            error: None,
        }
    }

    pub fn failed(kind: RelationKind, error: String) -> Self {
        Self {
            error: Some(error),
            ..Self::empty(kind)
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    fn with_writes(mut self, orders: usize, count: RelationWriteCount) -> Self {
        self.orders = orders;
        self.deleted = count.deleted;
        self.inserted = count.inserted;
        self
    }

    /// Folds the outcome of a later batch for the same kind into this one.
    pub fn absorb(&mut self, other: RelationSyncOutcome) {
        self.orders += other.orders;
        self.deleted += other.deleted;
        self.inserted += other.inserted;
        self.skipped_no_sku += other.skipped_no_sku;
        self.placeholders_created += other.placeholders_created;
        if self.error.is_none() {
            self.error = other.error;
        }
    }
}

/// Replaces one kind of child rows for a batch of resolved orders.
#[async_trait]
pub trait RelationSyncHandler: Send + Sync {
    fn kind(&self) -> RelationKind;

    async fn sync(
        &self,
        repository: &dyn OrderRelationRepositoryTrait,
        orders: &[ResolvedOrder],
    ) -> Result<RelationSyncOutcome>;
}

/// The five built-in handlers, items first.
pub fn default_relation_handlers() -> Vec<Box<dyn RelationSyncHandler>> {
    vec![
        Box::new(ItemsHandler),
        Box::new(ShippingHandler),
        Box::new(NotesHandler),
        Box::new(PropertiesHandler),
        Box::new(IdentifiersHandler),
    ]
}

async fn replace(
    repository: &dyn OrderRelationRepositoryTrait,
    kind: RelationKind,
    order_ids: Vec<i64>,
    rows: RelationRows,
) -> Result<RelationSyncOutcome> {
    if order_ids.is_empty() {
        return Ok(RelationSyncOutcome::empty(kind));
    }
    let orders = order_ids.len();
    let count = repository.replace_relation(order_ids, rows).await?;
    debug!(
        "Replaced {}: {} orders, {} deleted, {} inserted",
        kind.table_name(),
        orders,
        count.deleted,
        count.inserted
    );
    Ok(RelationSyncOutcome::empty(kind).with_writes(orders, count))
}

/// Order items. Lines without a SKU are never written; SKUs unknown to the
/// catalog get a placeholder product first.
pub struct ItemsHandler;

#[async_trait]
impl RelationSyncHandler for ItemsHandler {
    fn kind(&self) -> RelationKind {
        RelationKind::Items
    }

    async fn sync(
        &self,
        repository: &dyn OrderRelationRepositoryTrait,
        orders: &[ResolvedOrder],
    ) -> Result<RelationSyncOutcome> {
        let mut order_ids = Vec::new();
        let mut rows = Vec::new();
        let mut skipped_no_sku = 0;

        for order in orders.iter().filter(|o| !o.record.items.is_empty()) {
            order_ids.push(order.order_id);
            let mut position = 0;
            for item in &order.record.items {
                let Some(sku) = item.linked_sku() else {
                    skipped_no_sku += 1;
                    continue;
                };
                rows.push(OrderItemRow {
                    order_id: order.order_id,
                    sku: sku.to_string(),
                    title: item.title.clone(),
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                    cost_price: item.cost_price,
                    position,
                });
                position += 1;
            }
        }
        if skipped_no_sku > 0 {
            debug!("Skipping {} order items without a SKU", skipped_no_sku);
        }

        let mut placeholders_created = 0;
        let written = self
            .write(repository, order_ids, rows, &mut placeholders_created)
            .await;
        // Partial counters survive a failed write.
        let mut outcome =
            written.unwrap_or_else(|e| RelationSyncOutcome::failed(self.kind(), e.to_string()));
        outcome.skipped_no_sku = skipped_no_sku;
        outcome.placeholders_created = placeholders_created;
        Ok(outcome)
    }
}

impl ItemsHandler {
    async fn write(
        &self,
        repository: &dyn OrderRelationRepositoryTrait,
        order_ids: Vec<i64>,
        rows: Vec<OrderItemRow>,
        placeholders_created: &mut usize,
    ) -> Result<RelationSyncOutcome> {
        let skus: Vec<String> = rows
            .iter()
            .map(|row| row.sku.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if !skus.is_empty() {
            let existing: HashSet<String> = repository.find_existing_skus(&skus)?;
            let missing: Vec<String> = skus
                .into_iter()
                .filter(|sku| !existing.contains(sku))
                .collect();
            if !missing.is_empty() {
                *placeholders_created = repository.create_placeholder_products(missing).await?;
                debug!("Created {} placeholder products", placeholders_created);
            }
        }

        replace(repository, self.kind(), order_ids, RelationRows::Items(rows)).await
    }
}

pub struct ShippingHandler;

#[async_trait]
impl RelationSyncHandler for ShippingHandler {
    fn kind(&self) -> RelationKind {
        RelationKind::Shipping
    }

    async fn sync(
        &self,
        repository: &dyn OrderRelationRepositoryTrait,
        orders: &[ResolvedOrder],
    ) -> Result<RelationSyncOutcome> {
        let mut order_ids = Vec::new();
        let mut rows = Vec::new();
        for order in orders {
            if let Some(shipping) = &order.record.shipping {
                order_ids.push(order.order_id);
                rows.push(OrderShippingRow {
                    order_id: order.order_id,
                    carrier: shipping.carrier.clone(),
                    service: shipping.service.clone(),
                    tracking_number: shipping.tracking_number.clone(),
                    postage_cost: shipping.postage_cost,
                    weight: shipping.weight,
                    shipped_at: shipping.shipped_at,
                });
            }
        }
        replace(repository, self.kind(), order_ids, RelationRows::Shipping(rows)).await
    }
}

pub struct NotesHandler;

#[async_trait]
impl RelationSyncHandler for NotesHandler {
    fn kind(&self) -> RelationKind {
        RelationKind::Notes
    }

    async fn sync(
        &self,
        repository: &dyn OrderRelationRepositoryTrait,
        orders: &[ResolvedOrder],
    ) -> Result<RelationSyncOutcome> {
        let mut order_ids = Vec::new();
        let mut rows = Vec::new();
        for order in orders.iter().filter(|o| !o.record.notes.is_empty()) {
            order_ids.push(order.order_id);
            rows.extend(
                order
                    .record
                    .notes
                    .iter()
                    .zip(0..)
                    .map(|(note, position)| OrderNoteRow {
                        order_id: order.order_id,
                        body: note.body.clone(),
                        author: note.author.clone(),
                        is_internal: note.is_internal,
                        noted_at: note.noted_at,
                        position,
                    }),
            );
        }
        replace(repository, self.kind(), order_ids, RelationRows::Notes(rows)).await
    }
}

pub struct PropertiesHandler;

#[async_trait]
impl RelationSyncHandler for PropertiesHandler {
    fn kind(&self) -> RelationKind {
        RelationKind::Properties
    }

    async fn sync(
        &self,
        repository: &dyn OrderRelationRepositoryTrait,
        orders: &[ResolvedOrder],
    ) -> Result<RelationSyncOutcome> {
        let mut order_ids = Vec::new();
        let mut rows = Vec::new();
        for order in orders.iter().filter(|o| !o.record.properties.is_empty()) {
            order_ids.push(order.order_id);
            rows.extend(
                order
                    .record
                    .properties
                    .iter()
                    .zip(0..)
                    .map(|(property, position)| OrderPropertyRow {
                        order_id: order.order_id,
                        name: property.name.clone(),
                        value: property.value.clone(),
                        property_type: property.property_type.clone(),
                        position,
                    }),
            );
        }
        replace(
            repository,
            self.kind(),
            order_ids,
            RelationRows::Properties(rows),
        )
        .await
    }
}

pub struct IdentifiersHandler;

#[async_trait]
impl RelationSyncHandler for IdentifiersHandler {
    fn kind(&self) -> RelationKind {
        RelationKind::Identifiers
    }

    async fn sync(
        &self,
        repository: &dyn OrderRelationRepositoryTrait,
        orders: &[ResolvedOrder],
    ) -> Result<RelationSyncOutcome> {
        let mut order_ids = Vec::new();
        let mut rows = Vec::new();
        for order in orders.iter().filter(|o| !o.record.identifiers.is_empty()) {
            order_ids.push(order.order_id);
            rows.extend(
                order
                    .record
                    .identifiers
                    .iter()
                    .zip(0..)
                    .map(|(identifier, position)| OrderIdentifierRow {
                        order_id: order.order_id,
                        tag: identifier.tag.clone(),
                        name: identifier.name.clone(),
                        position,
                    }),
            );
        }
        replace(
            repository,
            self.kind(),
            order_ids,
            RelationRows::Identifiers(rows),
        )
        .await
    }
}

/// Runs the configured relation handlers over a batch of resolved orders.
pub struct RelationshipReconciler {
    repository: Arc<dyn OrderRelationRepositoryTrait>,
    handlers: Vec<Box<dyn RelationSyncHandler>>,
}

impl RelationshipReconciler {
    pub fn new(repository: Arc<dyn OrderRelationRepositoryTrait>) -> Self {
        Self::with_handlers(repository, default_relation_handlers())
    }

    /// Built-in handlers restricted to `kinds`, run in the given order.
    pub fn for_kinds(
        repository: Arc<dyn OrderRelationRepositoryTrait>,
        kinds: &[RelationKind],
    ) -> Self {
        let mut available = default_relation_handlers();
        let mut handlers = Vec::with_capacity(kinds.len());
        for kind in kinds {
            if let Some(position) = available.iter().position(|h| h.kind() == *kind) {
                handlers.push(available.remove(position));
            }
        }
        Self::with_handlers(repository, handlers)
    }

    pub fn with_handlers(
        repository: Arc<dyn OrderRelationRepositoryTrait>,
        handlers: Vec<Box<dyn RelationSyncHandler>>,
    ) -> Self {
        Self {
            repository,
            handlers,
        }
    }

    pub fn kinds(&self) -> Vec<RelationKind> {
        self.handlers.iter().map(|h| h.kind()).collect()
    }

    /// Reconciles every handler in turn. A failing kind is recorded and
    /// logged; it never stops the kinds after it.
    pub async fn reconcile(&self, orders: &[ResolvedOrder]) -> Vec<RelationSyncOutcome> {
        if orders.is_empty() {
            return Vec::new();
        }
        let mut outcomes = Vec::with_capacity(self.handlers.len());
        for handler in &self.handlers {
            let kind = handler.kind();
            let outcome = handler
                .sync(self.repository.as_ref(), orders)
                .await
                .unwrap_or_else(|e| RelationSyncOutcome::failed(kind, e.to_string()));
            if let Some(error) = &outcome.error {
                warn!(
                    "Failed to sync {} for {} orders: {}",
                    kind.table_name(),
                    orders.len(),
                    error
                );
            }
            outcomes.push(outcome);
        }
        outcomes
    }
}
