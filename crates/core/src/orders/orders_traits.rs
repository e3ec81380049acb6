use async_trait::async_trait;
use std::collections::HashSet;

use super::orders_model::{
    ExistingOrder, OrderAttributes, OrderPage, PagingState, RelationRows, RelationWriteCount,
};
use crate::errors::Result;

/// Persistence contract for order headers.
///
/// Reads run on pooled connections; every async write is exactly one committed
/// transaction, which callers rely on as the unit of rollback.
#[async_trait]
pub trait OrderRepositoryTrait: Send + Sync {
    /// Bulk lookup by remote order id. One statement for the whole key set.
    fn find_by_remote_ids(&self, remote_ids: &[String]) -> Result<Vec<ExistingOrder>>;

    /// Bulk lookup by order number. One statement for the whole key set.
    fn find_by_order_numbers(&self, order_numbers: &[String]) -> Result<Vec<ExistingOrder>>;

    /// Inserts all orders atomically. Returns the number of rows inserted.
    async fn insert_orders(&self, orders: Vec<OrderAttributes>) -> Result<usize>;

    /// Applies targeted updates by row id inside a single transaction.
    /// `created_at` is never touched. Returns affected rows.
    async fn update_orders(&self, updates: Vec<(i64, OrderAttributes)>) -> Result<usize>;

    /// Inserts one order in its own transaction and returns its row id.
    async fn insert_order(&self, order: OrderAttributes) -> Result<i64>;

    /// Updates one order in its own transaction.
    async fn update_order(&self, order_id: i64, order: OrderAttributes) -> Result<usize>;
}

/// Persistence contract for order child relations and the product catalog.
#[async_trait]
pub trait OrderRelationRepositoryTrait: Send + Sync {
    /// Returns the subset of `skus` that already exist as products.
    fn find_existing_skus(&self, skus: &[String]) -> Result<HashSet<String>>;

    /// Creates placeholder products for the given SKUs, ignoring SKUs that were
    /// created concurrently. Returns the number of products created.
    async fn create_placeholder_products(&self, skus: Vec<String>) -> Result<usize>;

    /// Deletes every row of the relation owned by `order_ids`, then inserts
    /// `rows`, in one transaction.
    async fn replace_relation(
        &self,
        order_ids: Vec<i64>,
        rows: RelationRows,
    ) -> Result<RelationWriteCount>;
}

/// Remote order feed. Authentication, rate limiting and retry state belong to
/// the implementor, not to the engine.
#[async_trait]
pub trait OrderSource: Send + Sync {
    async fn fetch_page(&self, state: &PagingState) -> Result<OrderPage>;
}
