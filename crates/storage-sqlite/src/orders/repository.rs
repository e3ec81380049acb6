use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use std::sync::Arc;

use orderlens_core::orders::{ExistingOrder, OrderAttributes, OrderRepositoryTrait};
use orderlens_core::Result;

use super::model::{
    timestamp_to_db, NewOrderDB, OrderChangesDB, OrderChildren, OrderDB, OrderIdentifierDB,
    OrderItemDB, OrderNoteDB, OrderPropertyDB, OrderShippingDB, NEW_ORDER_COLUMNS,
};
use crate::db::{get_connection, rows_per_statement, DbPool, WriteHandle, MAX_BIND_PARAMS};
use crate::errors::StorageError;
use crate::schema::{
    order_identifiers, order_items, order_notes, order_properties, order_shipping, orders,
};

pub(crate) fn now_timestamp() -> String {
    timestamp_to_db(Utc::now())
}

pub struct OrderRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl OrderRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        OrderRepository { pool, writer }
    }

    pub fn count_orders(&self) -> Result<i64> {
        let mut conn = get_connection(&self.pool)?;
        let count = orders::table
            .count()
            .get_result::<i64>(&mut conn)
            .map_err(StorageError::from)?;
        Ok(count)
    }

    /// Raw stored rows, oldest first. Includes the storage-owned timestamps.
    pub fn load_order_rows(&self) -> Result<Vec<OrderDB>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = orders::table
            .order(orders::id.asc())
            .select(OrderDB::as_select())
            .load::<OrderDB>(&mut conn)
            .map_err(StorageError::from)?;
        Ok(rows)
    }

    pub fn get_order(&self, order_id: i64) -> Result<Option<ExistingOrder>> {
        let mut conn = get_connection(&self.pool)?;
        let row = orders::table
            .find(order_id)
            .select(OrderDB::as_select())
            .first::<OrderDB>(&mut conn)
            .optional()
            .map_err(StorageError::from)?;
        Ok(row.map(ExistingOrder::from))
    }

    pub fn load_children(&self, order_id: i64) -> Result<OrderChildren> {
        let mut conn = get_connection(&self.pool)?;
        let items = order_items::table
            .filter(order_items::order_id.eq(order_id))
            .order((order_items::position.asc(), order_items::id.asc()))
            .select(OrderItemDB::as_select())
            .load::<OrderItemDB>(&mut conn)
            .map_err(StorageError::from)?;
        let shipping = order_shipping::table
            .filter(order_shipping::order_id.eq(order_id))
            .order(order_shipping::id.asc())
            .select(OrderShippingDB::as_select())
            .load::<OrderShippingDB>(&mut conn)
            .map_err(StorageError::from)?;
        let notes = order_notes::table
            .filter(order_notes::order_id.eq(order_id))
            .order((order_notes::position.asc(), order_notes::id.asc()))
            .select(OrderNoteDB::as_select())
            .load::<OrderNoteDB>(&mut conn)
            .map_err(StorageError::from)?;
        let properties = order_properties::table
            .filter(order_properties::order_id.eq(order_id))
            .order((order_properties::position.asc(), order_properties::id.asc()))
            .select(OrderPropertyDB::as_select())
            .load::<OrderPropertyDB>(&mut conn)
            .map_err(StorageError::from)?;
        let identifiers = order_identifiers::table
            .filter(order_identifiers::order_id.eq(order_id))
            .order((order_identifiers::position.asc(), order_identifiers::id.asc()))
            .select(OrderIdentifierDB::as_select())
            .load::<OrderIdentifierDB>(&mut conn)
            .map_err(StorageError::from)?;

        Ok(OrderChildren {
            items,
            shipping,
            notes,
            properties,
            identifiers,
        })
    }
}

#[async_trait]
impl OrderRepositoryTrait for OrderRepository {
    fn find_by_remote_ids(&self, remote_ids: &[String]) -> Result<Vec<ExistingOrder>> {
        let mut conn = get_connection(&self.pool)?;
        let mut found = Vec::new();
        for chunk in remote_ids.chunks(MAX_BIND_PARAMS) {
            let rows = orders::table
                .filter(orders::remote_id.eq_any(chunk))
                .select(OrderDB::as_select())
                .load::<OrderDB>(&mut conn)
                .map_err(StorageError::from)?;
            found.extend(rows.into_iter().map(ExistingOrder::from));
        }
        Ok(found)
    }

    fn find_by_order_numbers(&self, order_numbers: &[String]) -> Result<Vec<ExistingOrder>> {
        let mut conn = get_connection(&self.pool)?;
        let mut found = Vec::new();
        for chunk in order_numbers.chunks(MAX_BIND_PARAMS) {
            let rows = orders::table
                .filter(orders::order_number.eq_any(chunk))
                .select(OrderDB::as_select())
                .load::<OrderDB>(&mut conn)
                .map_err(StorageError::from)?;
            found.extend(rows.into_iter().map(ExistingOrder::from));
        }
        Ok(found)
    }

    async fn insert_orders(&self, new_orders: Vec<OrderAttributes>) -> Result<usize> {
        let now = now_timestamp();
        let rows: Vec<NewOrderDB> = new_orders
            .into_iter()
            .map(|attributes| NewOrderDB::from_attributes(attributes, &now))
            .collect();

        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<usize> {
                let mut inserted = 0;
                for chunk in rows.chunks(rows_per_statement(NEW_ORDER_COLUMNS)) {
                    inserted += diesel::insert_into(orders::table)
                        .values(chunk)
                        .execute(conn)
                        .map_err(StorageError::from)?;
                }
                Ok(inserted)
            })
            .await
    }

    async fn update_orders(&self, updates: Vec<(i64, OrderAttributes)>) -> Result<usize> {
        let now = now_timestamp();
        let changes: Vec<(i64, OrderChangesDB)> = updates
            .into_iter()
            .map(|(order_id, attributes)| (order_id, OrderChangesDB::from_attributes(attributes, &now)))
            .collect();

        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<usize> {
                let mut affected = 0;
                for (order_id, change) in &changes {
                    affected += diesel::update(orders::table.find(*order_id))
                        .set(change)
                        .execute(conn)
                        .map_err(StorageError::from)?;
                }
                Ok(affected)
            })
            .await
    }

    async fn insert_order(&self, order: OrderAttributes) -> Result<i64> {
        let row = NewOrderDB::from_attributes(order, &now_timestamp());
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<i64> {
                let order_id = diesel::insert_into(orders::table)
                    .values(&row)
                    .returning(orders::id)
                    .get_result::<i64>(conn)
                    .map_err(StorageError::from)?;
                Ok(order_id)
            })
            .await
    }

    async fn update_order(&self, order_id: i64, order: OrderAttributes) -> Result<usize> {
        let change = OrderChangesDB::from_attributes(order, &now_timestamp());
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<usize> {
                let affected = diesel::update(orders::table.find(order_id))
                    .set(&change)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(affected)
            })
            .await
    }
}
