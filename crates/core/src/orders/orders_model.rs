//! Canonical order import models shared by every pipeline stage.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Product code prefix reserved for products created on the fly for unknown SKUs.
pub const PLACEHOLDER_PRODUCT_PREFIX: &str = "AUTO-";

/// Title given to auto-provisioned products until the catalog is enriched.
pub const PLACEHOLDER_PRODUCT_TITLE: &str = "Unknown Product";

/// Key used to match an incoming order to a local row.
///
/// The remote order id wins when present; the human order number is the fallback.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum OrderIdentity {
    RemoteId(String),
    OrderNumber(String),
}

impl OrderIdentity {
    pub fn value(&self) -> &str {
        match self {
            Self::RemoteId(value) | Self::OrderNumber(value) => value,
        }
    }
}

impl fmt::Display for OrderIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RemoteId(value) => write!(f, "remote_id={}", value),
            Self::OrderNumber(value) => write!(f, "order_number={}", value),
        }
    }
}

/// Order header columns as stored locally.
///
/// Equality is used by the skip-unless-dirty policy, so every field here is a
/// column that an update may write. `created_at`/`updated_at` are owned by storage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderAttributes {
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
    pub subtotal: Decimal,
    pub shipping_cost: Decimal,
    pub tax: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
    pub received_at: Option<DateTime<Utc>>,
    pub processed_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
}

impl OrderAttributes {
    /// Resolves the identity key, or `None` when neither key is populated.
    pub fn identity(&self) -> Option<OrderIdentity> {
        if let Some(remote_id) = non_empty(self.remote_id.as_deref()) {
            return Some(OrderIdentity::RemoteId(remote_id.to_string()));
        }
        non_empty(self.order_number.as_deref())
            .map(|number| OrderIdentity::OrderNumber(number.to_string()))
    }

    /// Keeps the stored identity keys when the incoming payload omits them, so
    /// an update matched by one key never clears the other.
    pub fn with_identity_from(mut self, existing: &OrderAttributes) -> Self {
        if non_empty(self.remote_id.as_deref()).is_none() {
            self.remote_id = existing.remote_id.clone();
        }
        if non_empty(self.order_number.as_deref()).is_none() {
            self.order_number = existing.order_number.clone();
        }
        self
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportItem {
    /// Absent for marketplace lines that are not linked to inventory.
    pub sku: Option<String>,
    pub title: String,
    pub quantity: i64,
    pub unit_price: Decimal,
    pub cost_price: Decimal,
}

impl ImportItem {
    /// Trimmed SKU, `None` when missing or blank.
    pub fn linked_sku(&self) -> Option<&str> {
        non_empty(self.sku.as_deref())
    }
}

/// Shipment details. Carries no recipient or address data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportShipping {
    pub carrier: String,
    pub service: String,
    pub tracking_number: String,
    pub postage_cost: Decimal,
    pub weight: Decimal,
    pub shipped_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportNote {
    pub body: String,
    pub author: String,
    pub is_internal: bool,
    pub noted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportProperty {
    pub name: String,
    pub value: String,
    pub property_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportIdentifier {
    pub tag: String,
    pub name: String,
}

/// One normalized remote order, ready for deduplication and persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRecord {
    pub identity: OrderIdentity,
    pub is_processed: bool,
    pub attributes: OrderAttributes,
    pub items: Vec<ImportItem>,
    pub shipping: Option<ImportShipping>,
    pub notes: Vec<ImportNote>,
    pub properties: Vec<ImportProperty>,
    pub identifiers: Vec<ImportIdentifier>,
}

impl ImportRecord {
    /// Builds a record with no child data. Returns `None` when the attributes
    /// carry neither a remote id nor an order number.
    pub fn new(attributes: OrderAttributes) -> Option<Self> {
        let identity = attributes.identity()?;
        Some(Self {
            identity,
            is_processed: attributes.is_processed,
            attributes,
            items: Vec::new(),
            shipping: None,
            notes: Vec::new(),
            properties: Vec::new(),
            identifiers: Vec::new(),
        })
    }

    pub fn with_items(mut self, items: Vec<ImportItem>) -> Self {
        self.items = items;
        self
    }

    pub fn with_shipping(mut self, shipping: Option<ImportShipping>) -> Self {
        self.shipping = shipping;
        self
    }

    pub fn with_notes(mut self, notes: Vec<ImportNote>) -> Self {
        self.notes = notes;
        self
    }

    pub fn with_properties(mut self, properties: Vec<ImportProperty>) -> Self {
        self.properties = properties;
        self
    }

    pub fn with_identifiers(mut self, identifiers: Vec<ImportIdentifier>) -> Self {
        self.identifiers = identifiers;
        self
    }
}

/// Snapshot of a stored order row returned by the bulk lookups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExistingOrder {
    pub id: i64,
    pub attributes: OrderAttributes,
}

/// A record whose local row id is known after the order writes.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedOrder {
    pub order_id: i64,
    pub record: ImportRecord,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderItemRow {
    pub order_id: i64,
    pub sku: String,
    pub title: String,
    pub quantity: i64,
    pub unit_price: Decimal,
    pub cost_price: Decimal,
    pub position: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderShippingRow {
    pub order_id: i64,
    pub carrier: String,
    pub service: String,
    pub tracking_number: String,
    pub postage_cost: Decimal,
    pub weight: Decimal,
    pub shipped_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderNoteRow {
    pub order_id: i64,
    pub body: String,
    pub author: String,
    pub is_internal: bool,
    pub noted_at: Option<DateTime<Utc>>,
    pub position: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderPropertyRow {
    pub order_id: i64,
    pub name: String,
    pub value: String,
    pub property_type: String,
    pub position: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderIdentifierRow {
    pub order_id: i64,
    pub tag: String,
    pub name: String,
    pub position: i32,
}

/// Replacement child rows for one relation kind across a batch.
#[derive(Debug, Clone, PartialEq)]
pub enum RelationRows {
    Items(Vec<OrderItemRow>),
    Shipping(Vec<OrderShippingRow>),
    Notes(Vec<OrderNoteRow>),
    Properties(Vec<OrderPropertyRow>),
    Identifiers(Vec<OrderIdentifierRow>),
}

/// Row counts from one delete-then-insert relation replacement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationWriteCount {
    pub deleted: usize,
    pub inserted: usize,
}

/// Paging cursor handed to the remote order feed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PagingState {
    pub page: u32,
    pub cursor: Option<String>,
}

impl PagingState {
    pub fn next_page(&self) -> Self {
        Self {
            page: self.page + 1,
            cursor: self.cursor.clone(),
        }
    }
}

/// One page of raw remote payloads.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderPage {
    pub orders: Vec<serde_json::Value>,
    /// `None` when the feed is exhausted.
    pub next: Option<PagingState>,
}
