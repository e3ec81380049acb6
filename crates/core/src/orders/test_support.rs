//! In-memory repositories for exercising the pipeline without a database.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

use super::orders_model::{
    ExistingOrder, ImportItem, ImportRecord, OrderAttributes, RelationRows, RelationWriteCount,
};
use super::orders_traits::{OrderRelationRepositoryTrait, OrderRepositoryTrait};
use super::relations::RelationKind;
use crate::errors::{DatabaseError, Error, Result};

pub fn attributes(remote_id: Option<&str>, order_number: Option<&str>) -> OrderAttributes {
    OrderAttributes {
        remote_id: remote_id.map(str::to_string),
        order_number: order_number.map(str::to_string),
        ..Default::default()
    }
}

pub fn record(remote_id: Option<&str>, order_number: Option<&str>) -> ImportRecord {
    ImportRecord::new(attributes(remote_id, order_number)).expect("record with identity")
}

pub fn item(sku: Option<&str>, title: &str) -> ImportItem {
    ImportItem {
        sku: sku.map(str::to_string),
        title: title.to_string(),
        quantity: 1,
        ..Default::default()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub lookups: usize,
    pub bulk_inserts: usize,
    pub update_transactions: usize,
    pub single_inserts: usize,
    pub single_updates: usize,
    pub relation_replacements: usize,
}

#[derive(Default)]
struct StoreState {
    next_id: i64,
    orders: BTreeMap<i64, OrderAttributes>,
    products: HashSet<String>,
    children: BTreeMap<(RelationKind, i64), usize>,
    stats: StoreStats,
    failing_relations: HashSet<RelationKind>,
    fail_next_bulk_insert_with_conflict: bool,
    hide_rows_from_next_lookups: usize,
}

/// Mirrors the SQLite repositories closely enough for pipeline tests:
/// unique identity keys, one-call bulk writes, per-kind child counts.
#[derive(Default)]
pub struct InMemoryOrderStore {
    state: Mutex<StoreState>,
}

impl InMemoryOrderStore {
    pub fn seed_order(&self, attributes: OrderAttributes) -> i64 {
        let mut state = self.state.lock().expect("store lock");
        state.next_id += 1;
        let id = state.next_id;
        state.orders.insert(id, attributes);
        id
    }

    pub fn seed_product(&self, sku: &str) {
        let mut state = self.state.lock().expect("store lock");
        state.products.insert(sku.to_string());
    }

    pub fn stats(&self) -> StoreStats {
        self.state.lock().expect("store lock").stats
    }

    pub fn order_count(&self) -> usize {
        self.state.lock().expect("store lock").orders.len()
    }

    pub fn order(&self, id: i64) -> Option<OrderAttributes> {
        self.state.lock().expect("store lock").orders.get(&id).cloned()
    }

    pub fn products(&self) -> HashSet<String> {
        self.state.lock().expect("store lock").products.clone()
    }

    pub fn child_count(&self, kind: RelationKind, order_id: i64) -> usize {
        let state = self.state.lock().expect("store lock");
        state.children.get(&(kind, order_id)).copied().unwrap_or(0)
    }

    pub fn fail_relation(&self, kind: RelationKind) {
        let mut state = self.state.lock().expect("store lock");
        state.failing_relations.insert(kind);
    }

    /// Simulates a concurrent run: the next lookups miss existing rows, so the
    /// following bulk insert collides with them.
    pub fn hide_rows_from_next_lookups(&self, lookups: usize) {
        let mut state = self.state.lock().expect("store lock");
        state.hide_rows_from_next_lookups = lookups;
    }

    pub fn fail_next_bulk_insert_with_conflict(&self) {
        let mut state = self.state.lock().expect("store lock");
        state.fail_next_bulk_insert_with_conflict = true;
    }

    fn find_by(&self, matches: impl Fn(&OrderAttributes) -> bool) -> Vec<ExistingOrder> {
        let mut state = self.state.lock().expect("store lock");
        state.stats.lookups += 1;
        if state.hide_rows_from_next_lookups > 0 {
            state.hide_rows_from_next_lookups -= 1;
            return Vec::new();
        }
        state
            .orders
            .iter()
            .filter(|(_, attributes)| matches(attributes))
            .map(|(id, attributes)| ExistingOrder {
                id: *id,
                attributes: attributes.clone(),
            })
            .collect()
    }
}

fn conflicts(state: &StoreState, candidate: &OrderAttributes, skip_id: Option<i64>) -> bool {
    state.orders.iter().any(|(id, stored)| {
        Some(*id) != skip_id
            && ((candidate.remote_id.is_some() && stored.remote_id == candidate.remote_id)
                || (candidate.order_number.is_some()
                    && stored.order_number == candidate.order_number))
    })
}

fn conflict_error() -> Error {
    Error::Database(DatabaseError::UniqueViolation(
        "UNIQUE constraint failed: orders.remote_id".to_string(),
    ))
}

#[async_trait]
impl OrderRepositoryTrait for InMemoryOrderStore {
    fn find_by_remote_ids(&self, remote_ids: &[String]) -> Result<Vec<ExistingOrder>> {
        Ok(self.find_by(|attributes| {
            attributes
                .remote_id
                .as_ref()
                .is_some_and(|id| remote_ids.contains(id))
        }))
    }

    fn find_by_order_numbers(&self, order_numbers: &[String]) -> Result<Vec<ExistingOrder>> {
        Ok(self.find_by(|attributes| {
            attributes
                .order_number
                .as_ref()
                .is_some_and(|number| order_numbers.contains(number))
        }))
    }

    async fn insert_orders(&self, orders: Vec<OrderAttributes>) -> Result<usize> {
        let mut state = self.state.lock().expect("store lock");
        state.stats.bulk_inserts += 1;
        if state.fail_next_bulk_insert_with_conflict {
            state.fail_next_bulk_insert_with_conflict = false;
            return Err(conflict_error());
        }
        if orders.iter().any(|order| conflicts(&state, order, None)) {
            return Err(conflict_error());
        }
        let count = orders.len();
        for order in orders {
            state.next_id += 1;
            let id = state.next_id;
            state.orders.insert(id, order);
        }
        Ok(count)
    }

    async fn update_orders(&self, updates: Vec<(i64, OrderAttributes)>) -> Result<usize> {
        let mut state = self.state.lock().expect("store lock");
        state.stats.update_transactions += 1;
        let mut affected = 0;
        for (id, attributes) in updates {
            if let Some(stored) = state.orders.get_mut(&id) {
                *stored = attributes;
                affected += 1;
            }
        }
        Ok(affected)
    }

    async fn insert_order(&self, order: OrderAttributes) -> Result<i64> {
        let mut state = self.state.lock().expect("store lock");
        state.stats.single_inserts += 1;
        if conflicts(&state, &order, None) {
            return Err(conflict_error());
        }
        state.next_id += 1;
        let id = state.next_id;
        state.orders.insert(id, order);
        Ok(id)
    }

    async fn update_order(&self, order_id: i64, order: OrderAttributes) -> Result<usize> {
        let mut state = self.state.lock().expect("store lock");
        state.stats.single_updates += 1;
        if conflicts(&state, &order, Some(order_id)) {
            return Err(conflict_error());
        }
        Ok(match state.orders.get_mut(&order_id) {
            Some(stored) => {
                *stored = order;
                1
            }
            None => 0,
        })
    }
}

#[async_trait]
impl OrderRelationRepositoryTrait for InMemoryOrderStore {
    fn find_existing_skus(&self, skus: &[String]) -> Result<HashSet<String>> {
        let state = self.state.lock().expect("store lock");
        Ok(skus
            .iter()
            .filter(|sku| state.products.contains(*sku))
            .cloned()
            .collect())
    }

    async fn create_placeholder_products(&self, skus: Vec<String>) -> Result<usize> {
        let mut state = self.state.lock().expect("store lock");
        Ok(skus
            .into_iter()
            .filter(|sku| state.products.insert(sku.clone()))
            .count())
    }

    async fn replace_relation(
        &self,
        order_ids: Vec<i64>,
        rows: RelationRows,
    ) -> Result<RelationWriteCount> {
        let kind = RelationKind::of(&rows);
        let mut state = self.state.lock().expect("store lock");
        state.stats.relation_replacements += 1;
        if state.failing_relations.contains(&kind) {
            return Err(Error::Database(DatabaseError::QueryFailed(format!(
                "no such table: {}",
                kind.table_name()
            ))));
        }

        let mut deleted = 0;
        for order_id in &order_ids {
            deleted += state.children.remove(&(kind, *order_id)).unwrap_or(0);
        }
        let owners: Vec<i64> = match &rows {
            RelationRows::Items(rows) => rows.iter().map(|r| r.order_id).collect(),
            RelationRows::Shipping(rows) => rows.iter().map(|r| r.order_id).collect(),
            RelationRows::Notes(rows) => rows.iter().map(|r| r.order_id).collect(),
            RelationRows::Properties(rows) => rows.iter().map(|r| r.order_id).collect(),
            RelationRows::Identifiers(rows) => rows.iter().map(|r| r.order_id).collect(),
        };
        for order_id in &owners {
            *state.children.entry((kind, *order_id)).or_insert(0) += 1;
        }
        Ok(RelationWriteCount {
            deleted,
            inserted: owners.len(),
        })
    }
}
