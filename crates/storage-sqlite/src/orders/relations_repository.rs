use async_trait::async_trait;
use diesel::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;

use orderlens_core::orders::{OrderRelationRepositoryTrait, RelationRows, RelationWriteCount};
use orderlens_core::Result;

use super::model::{
    NewOrderIdentifierDB, NewOrderItemDB, NewOrderNoteDB, NewOrderPropertyDB, NewOrderShippingDB,
};
use super::repository::now_timestamp;
use crate::db::{get_connection, rows_per_statement, DbPool, WriteHandle, MAX_BIND_PARAMS};
use crate::errors::StorageError;
use crate::products::{existing_skus, insert_placeholder_products};
use crate::schema::{order_identifiers, order_items, order_notes, order_properties, order_shipping};

/// Deletes the relation rows owned by `$order_ids` from `$table`, then inserts
/// `$rows` converted to `$new`, bound `$columns` values per row.
macro_rules! replace_rows {
    ($conn:expr, $table:ident, $order_ids:expr, $rows:expr, $new:ty, $columns:expr) => {{
        let mut count = RelationWriteCount::default();
        for ids in $order_ids.chunks(MAX_BIND_PARAMS) {
            count.deleted += diesel::delete($table::table.filter($table::order_id.eq_any(ids)))
                .execute($conn)
                .map_err(StorageError::from)?;
        }
        let new_rows: Vec<$new> = $rows.into_iter().map(<$new>::from).collect();
        for chunk in new_rows.chunks(rows_per_statement($columns)) {
            count.inserted += diesel::insert_into($table::table)
                .values(chunk)
                .execute($conn)
                .map_err(StorageError::from)?;
        }
        count
    }};
}

/// Child relations of orders plus the product lookups items depend on.
pub struct OrderRelationRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl OrderRelationRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        OrderRelationRepository { pool, writer }
    }
}

#[async_trait]
impl OrderRelationRepositoryTrait for OrderRelationRepository {
    fn find_existing_skus(&self, skus: &[String]) -> Result<HashSet<String>> {
        let mut conn = get_connection(&self.pool)?;
        existing_skus(&mut conn, skus)
    }

    async fn create_placeholder_products(&self, skus: Vec<String>) -> Result<usize> {
        if skus.is_empty() {
            return Ok(0);
        }
        let now = now_timestamp();
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<usize> {
                insert_placeholder_products(conn, &skus, &now)
            })
            .await
    }

    async fn replace_relation(
        &self,
        order_ids: Vec<i64>,
        rows: RelationRows,
    ) -> Result<RelationWriteCount> {
        if order_ids.is_empty() {
            return Ok(RelationWriteCount::default());
        }
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<RelationWriteCount> {
                let count = match rows {
                    RelationRows::Items(rows) => {
                        replace_rows!(conn, order_items, order_ids, rows, NewOrderItemDB, 7)
                    }
                    RelationRows::Shipping(rows) => {
                        replace_rows!(conn, order_shipping, order_ids, rows, NewOrderShippingDB, 7)
                    }
                    RelationRows::Notes(rows) => {
                        replace_rows!(conn, order_notes, order_ids, rows, NewOrderNoteDB, 6)
                    }
                    RelationRows::Properties(rows) => {
                        replace_rows!(conn, order_properties, order_ids, rows, NewOrderPropertyDB, 5)
                    }
                    RelationRows::Identifiers(rows) => {
                        replace_rows!(conn, order_identifiers, order_ids, rows, NewOrderIdentifierDB, 4)
                    }
                };
                Ok(count)
            })
            .await
    }
}
