//! Database models for orders and their child relations.
//!
//! Money is stored as decimal strings and timestamps as RFC 3339 text.

use chrono::{DateTime, SecondsFormat, Utc};
use diesel::prelude::*;
use log::warn;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use orderlens_core::orders::{
    ExistingOrder, OrderAttributes, OrderIdentifierRow, OrderItemRow, OrderNoteRow,
    OrderPropertyRow, OrderShippingRow,
};

pub(crate) fn decimal_to_db(value: Decimal) -> String {
    value.normalize().to_string()
}

pub(crate) fn decimal_from_db(value: &str) -> Decimal {
    Decimal::from_str(value).unwrap_or_else(|e| {
        warn!("Unreadable stored decimal {:?}: {}", value, e);
        Decimal::ZERO
    })
}

pub(crate) fn timestamp_to_db(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

pub(crate) fn timestamp_from_db(value: Option<&str>) -> Option<DateTime<Utc>> {
    let raw = value?;
    match DateTime::parse_from_rfc3339(raw) {
        Ok(parsed) => Some(parsed.with_timezone(&Utc)),
        Err(e) => {
            warn!("Unreadable stored timestamp {:?}: {}", raw, e);
            None
        }
    }
}

#[derive(Queryable, Identifiable, Selectable, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::orders)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct OrderDB {
    pub id: i64,
    pub remote_id: Option<String>,
    pub order_number: Option<String>,
    pub channel: String,
    pub sub_channel: String,
    pub channel_reference: String,
    pub status: String,
    pub currency: String,
    pub is_paid: bool,
    pub is_cancelled: bool,
    pub is_processed: bool,
    pub subtotal: String,
    pub shipping_cost: String,
    pub tax: String,
    pub discount: String,
    pub total: String,
    pub received_at: Option<String>,
    pub processed_at: Option<String>,
    pub paid_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<OrderDB> for ExistingOrder {
    fn from(db: OrderDB) -> Self {
        ExistingOrder {
            id: db.id,
            attributes: OrderAttributes {
                remote_id: db.remote_id,
                order_number: db.order_number,
                channel: db.channel,
                sub_channel: db.sub_channel,
                channel_reference: db.channel_reference,
                status: db.status,
                currency: db.currency,
                is_paid: db.is_paid,
                is_cancelled: db.is_cancelled,
                is_processed: db.is_processed,
                subtotal: decimal_from_db(&db.subtotal),
                shipping_cost: decimal_from_db(&db.shipping_cost),
                tax: decimal_from_db(&db.tax),
                discount: decimal_from_db(&db.discount),
                total: decimal_from_db(&db.total),
                received_at: timestamp_from_db(db.received_at.as_deref()),
                processed_at: timestamp_from_db(db.processed_at.as_deref()),
                paid_at: timestamp_from_db(db.paid_at.as_deref()),
            },
        }
    }
}

/// Insert row. Every column is bound explicitly so a batch compiles to one
/// multi-row `INSERT`.
#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = crate::schema::orders)]
#[diesel(treat_none_as_default_value = false)]
pub struct NewOrderDB {
    pub remote_id: Option<String>,
    pub order_number: Option<String>,
    pub channel: String,
    pub sub_channel: String,
    pub channel_reference: String,
    pub status: String,
    pub currency: String,
    pub is_paid: bool,
    pub is_cancelled: bool,
    pub is_processed: bool,
    pub subtotal: String,
    pub shipping_cost: String,
    pub tax: String,
    pub discount: String,
    pub total: String,
    pub received_at: Option<String>,
    pub processed_at: Option<String>,
    pub paid_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Bound parameters per `NewOrderDB` row.
pub const NEW_ORDER_COLUMNS: usize = 20;

impl NewOrderDB {
    pub fn from_attributes(attributes: OrderAttributes, now: &str) -> Self {
        let changes = OrderChangesDB::from_attributes(attributes, now);
        NewOrderDB {
            remote_id: changes.remote_id,
            order_number: changes.order_number,
            channel: changes.channel,
            sub_channel: changes.sub_channel,
            channel_reference: changes.channel_reference,
            status: changes.status,
            currency: changes.currency,
            is_paid: changes.is_paid,
            is_cancelled: changes.is_cancelled,
            is_processed: changes.is_processed,
            subtotal: changes.subtotal,
            shipping_cost: changes.shipping_cost,
            tax: changes.tax,
            discount: changes.discount,
            total: changes.total,
            received_at: changes.received_at,
            processed_at: changes.processed_at,
            paid_at: changes.paid_at,
            created_at: now.to_string(),
            updated_at: changes.updated_at,
        }
    }
}

/// Update changeset. `created_at` is deliberately absent.
#[derive(AsChangeset, Debug, Clone)]
#[diesel(table_name = crate::schema::orders)]
#[diesel(treat_none_as_null = true)]
pub struct OrderChangesDB {
    pub remote_id: Option<String>,
    pub order_number: Option<String>,
    pub channel: String,
    pub sub_channel: String,
    pub channel_reference: String,
    pub status: String,
    pub currency: String,
    pub is_paid: bool,
    pub is_cancelled: bool,
    pub is_processed: bool,
    pub subtotal: String,
    pub shipping_cost: String,
    pub tax: String,
    pub discount: String,
    pub total: String,
    pub received_at: Option<String>,
    pub processed_at: Option<String>,
    pub paid_at: Option<String>,
    pub updated_at: String,
}

impl OrderChangesDB {
    pub fn from_attributes(attributes: OrderAttributes, now: &str) -> Self {
        OrderChangesDB {
            remote_id: blank_to_none(attributes.remote_id),
            order_number: blank_to_none(attributes.order_number),
            channel: attributes.channel,
            sub_channel: attributes.sub_channel,
            channel_reference: attributes.channel_reference,
            status: attributes.status,
            currency: attributes.currency,
            is_paid: attributes.is_paid,
            is_cancelled: attributes.is_cancelled,
            is_processed: attributes.is_processed,
            subtotal: decimal_to_db(attributes.subtotal),
            shipping_cost: decimal_to_db(attributes.shipping_cost),
            tax: decimal_to_db(attributes.tax),
            discount: decimal_to_db(attributes.discount),
            total: decimal_to_db(attributes.total),
            received_at: attributes.received_at.map(timestamp_to_db),
            processed_at: attributes.processed_at.map(timestamp_to_db),
            paid_at: attributes.paid_at.map(timestamp_to_db),
            updated_at: now.to_string(),
        }
    }
}

// Empty strings would collide on the unique identity columns.
fn blank_to_none(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[derive(Queryable, Identifiable, Selectable, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::order_items)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct OrderItemDB {
    pub id: i64,
    pub order_id: i64,
    pub sku: String,
    pub title: String,
    pub quantity: i64,
    pub unit_price: String,
    pub cost_price: String,
    pub position: i32,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = crate::schema::order_items)]
#[diesel(treat_none_as_default_value = false)]
pub struct NewOrderItemDB {
    pub order_id: i64,
    pub sku: String,
    pub title: String,
    pub quantity: i64,
    pub unit_price: String,
    pub cost_price: String,
    pub position: i32,
}

impl From<OrderItemRow> for NewOrderItemDB {
    fn from(row: OrderItemRow) -> Self {
        NewOrderItemDB {
            order_id: row.order_id,
            sku: row.sku,
            title: row.title,
            quantity: row.quantity,
            unit_price: decimal_to_db(row.unit_price),
            cost_price: decimal_to_db(row.cost_price),
            position: row.position,
        }
    }
}

#[derive(Queryable, Identifiable, Selectable, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::order_shipping)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct OrderShippingDB {
    pub id: i64,
    pub order_id: i64,
    pub carrier: String,
    pub service: String,
    pub tracking_number: String,
    pub postage_cost: String,
    pub weight: String,
    pub shipped_at: Option<String>,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = crate::schema::order_shipping)]
#[diesel(treat_none_as_default_value = false)]
pub struct NewOrderShippingDB {
    pub order_id: i64,
    pub carrier: String,
    pub service: String,
    pub tracking_number: String,
    pub postage_cost: String,
    pub weight: String,
    pub shipped_at: Option<String>,
}

impl From<OrderShippingRow> for NewOrderShippingDB {
    fn from(row: OrderShippingRow) -> Self {
        NewOrderShippingDB {
            order_id: row.order_id,
            carrier: row.carrier,
            service: row.service,
            tracking_number: row.tracking_number,
            postage_cost: decimal_to_db(row.postage_cost),
            weight: decimal_to_db(row.weight),
            shipped_at: row.shipped_at.map(timestamp_to_db),
        }
    }
}

#[derive(Queryable, Identifiable, Selectable, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::order_notes)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct OrderNoteDB {
    pub id: i64,
    pub order_id: i64,
    pub body: String,
    pub author: String,
    pub is_internal: bool,
    pub noted_at: Option<String>,
    pub position: i32,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = crate::schema::order_notes)]
#[diesel(treat_none_as_default_value = false)]
pub struct NewOrderNoteDB {
    pub order_id: i64,
    pub body: String,
    pub author: String,
    pub is_internal: bool,
    pub noted_at: Option<String>,
    pub position: i32,
}

impl From<OrderNoteRow> for NewOrderNoteDB {
    fn from(row: OrderNoteRow) -> Self {
        NewOrderNoteDB {
            order_id: row.order_id,
            body: row.body,
            author: row.author,
            is_internal: row.is_internal,
            noted_at: row.noted_at.map(timestamp_to_db),
            position: row.position,
        }
    }
}

#[derive(Queryable, Identifiable, Selectable, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::order_properties)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct OrderPropertyDB {
    pub id: i64,
    pub order_id: i64,
    pub name: String,
    pub value: String,
    pub property_type: String,
    pub position: i32,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = crate::schema::order_properties)]
#[diesel(treat_none_as_default_value = false)]
pub struct NewOrderPropertyDB {
    pub order_id: i64,
    pub name: String,
    pub value: String,
    pub property_type: String,
    pub position: i32,
}

impl From<OrderPropertyRow> for NewOrderPropertyDB {
    fn from(row: OrderPropertyRow) -> Self {
        NewOrderPropertyDB {
            order_id: row.order_id,
            name: row.name,
            value: row.value,
            property_type: row.property_type,
            position: row.position,
        }
    }
}

#[derive(Queryable, Identifiable, Selectable, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::order_identifiers)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct OrderIdentifierDB {
    pub id: i64,
    pub order_id: i64,
    pub tag: String,
    pub name: String,
    pub position: i32,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = crate::schema::order_identifiers)]
#[diesel(treat_none_as_default_value = false)]
pub struct NewOrderIdentifierDB {
    pub order_id: i64,
    pub tag: String,
    pub name: String,
    pub position: i32,
}

impl From<OrderIdentifierRow> for NewOrderIdentifierDB {
    fn from(row: OrderIdentifierRow) -> Self {
        NewOrderIdentifierDB {
            order_id: row.order_id,
            tag: row.tag,
            name: row.name,
            position: row.position,
        }
    }
}

/// Every stored child row of one order, in payload order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderChildren {
    pub items: Vec<OrderItemDB>,
    pub shipping: Vec<OrderShippingDB>,
    pub notes: Vec<OrderNoteDB>,
    pub properties: Vec<OrderPropertyDB>,
    pub identifiers: Vec<OrderIdentifierDB>,
}
