//! Maps raw remote order payloads onto [`ImportRecord`].
//!
//! Payloads arrive either in the remote API's shape (`NumOrderId`, nested
//! `GeneralInfo`/`TotalsInfo`/`ShippingInfo`, PascalCase item fields) or already
//! flattened to local column names. This module is the only place that knows
//! about both spellings; later stages only see canonical fields.
//!
//! Customer sections (`CustomerInfo`, names, emails, addresses) are never read.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::{Map, Value};
use std::str::FromStr;

use super::orders_model::{
    ImportIdentifier, ImportItem, ImportNote, ImportProperty, ImportRecord, ImportShipping,
    OrderAttributes,
};

const NIL_REMOTE_ID: &str = "00000000-0000-0000-0000-000000000000";

const NAIVE_DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
];

// Local spelling first, remote spelling after. Dotted keys walk nested objects.
const REMOTE_ID_KEYS: &[&str] = &["remote_id", "remote_order_id", "OrderId", "pkOrderID"];
const ORDER_NUMBER_KEYS: &[&str] = &["order_number", "num_order_id", "NumOrderId"];
const PROCESSED_KEYS: &[&str] = &["is_processed", "processed", "Processed"];
const CHANNEL_KEYS: &[&str] = &["channel", "source", "GeneralInfo.Source", "Source"];
const SUB_CHANNEL_KEYS: &[&str] = &[
    "sub_channel",
    "sub_source",
    "GeneralInfo.SubSource",
    "SubSource",
];
const CHANNEL_REFERENCE_KEYS: &[&str] = &[
    "channel_reference",
    "reference_number",
    "GeneralInfo.ReferenceNum",
    "ReferenceNum",
];
const STATUS_KEYS: &[&str] = &["status", "GeneralInfo.Status", "Status"];
const CURRENCY_KEYS: &[&str] = &["currency", "TotalsInfo.Currency", "Currency"];
const PAID_KEYS: &[&str] = &["is_paid", "paid", "GeneralInfo.IsPaid", "IsPaid"];
const CANCELLED_KEYS: &[&str] = &[
    "is_cancelled",
    "cancelled",
    "GeneralInfo.IsCancelled",
    "IsCancelled",
];
const SUBTOTAL_KEYS: &[&str] = &["subtotal", "TotalsInfo.Subtotal", "Subtotal"];
const SHIPPING_COST_KEYS: &[&str] = &["shipping_cost", "TotalsInfo.PostageCost", "PostageCost"];
const TAX_KEYS: &[&str] = &["tax", "TotalsInfo.Tax", "Tax"];
const DISCOUNT_KEYS: &[&str] = &["discount", "TotalsInfo.TotalDiscount", "TotalDiscount"];
const TOTAL_KEYS: &[&str] = &["total", "TotalsInfo.TotalCharge", "TotalCharge"];
const RECEIVED_AT_KEYS: &[&str] = &["received_at", "GeneralInfo.ReceivedDate", "ReceivedDate"];
const PROCESSED_AT_KEYS: &[&str] = &["processed_at", "ProcessedDateTime", "ProcessedDate"];
const PAID_AT_KEYS: &[&str] = &["paid_at", "GeneralInfo.PaidDate", "PaidDate"];

const ITEMS_KEYS: &[&str] = &["items", "Items"];
const SHIPPING_KEYS: &[&str] = &["shipping", "ShippingInfo"];
const NOTES_KEYS: &[&str] = &["notes", "Notes"];
const PROPERTIES_KEYS: &[&str] = &["properties", "extended_properties", "ExtendedProperties"];
const IDENTIFIERS_KEYS: &[&str] = &["identifiers", "Identifiers"];

/// Outcome of normalizing one page of raw payloads.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedBatch {
    pub records: Vec<ImportRecord>,
    /// Payloads dropped because no identity could be resolved.
    pub discarded: usize,
}

/// Normalizes every payload of a page, dropping the ones without identity.
pub fn normalize_batch(raws: &[Value]) -> NormalizedBatch {
    let mut batch = NormalizedBatch {
        records: Vec::with_capacity(raws.len()),
        discarded: 0,
    };
    for raw in raws {
        match normalize_order(raw) {
            Some(record) => batch.records.push(record),
            None => batch.discarded += 1,
        }
    }
    batch
}

/// Normalizes a typed payload by way of its JSON representation.
pub fn normalize_typed<T: Serialize>(raw: &T) -> Option<ImportRecord> {
    let value = serde_json::to_value(raw).ok()?;
    normalize_order(&value)
}

/// Maps one raw payload. Returns `None` when neither a remote id nor an order
/// number resolves; missing optional fields fall back to neutral defaults.
pub fn normalize_order(raw: &Value) -> Option<ImportRecord> {
    let fields = Fields::new(raw.as_object()?);

    let remote_id = fields
        .text(REMOTE_ID_KEYS)
        .filter(|id| !id.eq_ignore_ascii_case(NIL_REMOTE_ID));
    let attributes = OrderAttributes {
        remote_id,
        order_number: fields.text(ORDER_NUMBER_KEYS),
        channel: fields.text_or_default(CHANNEL_KEYS),
        sub_channel: fields.text_or_default(SUB_CHANNEL_KEYS),
        channel_reference: fields.text_or_default(CHANNEL_REFERENCE_KEYS),
        status: fields.text_or_default(STATUS_KEYS),
        currency: fields.text_or_default(CURRENCY_KEYS),
        is_paid: fields.flag(PAID_KEYS),
        is_cancelled: fields.flag(CANCELLED_KEYS),
        is_processed: fields.flag(PROCESSED_KEYS),
        subtotal: fields.decimal(SUBTOTAL_KEYS),
        shipping_cost: fields.decimal(SHIPPING_COST_KEYS),
        tax: fields.decimal(TAX_KEYS),
        discount: fields.decimal(DISCOUNT_KEYS),
        total: fields.decimal(TOTAL_KEYS),
        received_at: fields.timestamp(RECEIVED_AT_KEYS),
        processed_at: fields.timestamp(PROCESSED_AT_KEYS),
        paid_at: fields.timestamp(PAID_AT_KEYS),
    };

    let record = ImportRecord::new(attributes)?
        .with_items(fields.objects(ITEMS_KEYS).map(item).collect())
        .with_shipping(fields.object(SHIPPING_KEYS).map(shipping))
        .with_notes(fields.objects(NOTES_KEYS).filter_map(note).collect())
        .with_properties(fields.objects(PROPERTIES_KEYS).filter_map(property).collect())
        .with_identifiers(identifiers(&fields));
    Some(record)
}

/// Every item object is kept, linked or not; the items relation decides
/// which lines are written and counts the rest.
fn item(fields: Fields<'_>) -> ImportItem {
    ImportItem {
        sku: fields.text(&["sku", "SKU", "ItemNumber"]),
        title: fields.text_or_default(&["title", "Title", "ItemTitle"]),
        quantity: fields.integer(&["quantity", "Quantity"]),
        unit_price: fields.decimal(&["unit_price", "PricePerUnit"]),
        cost_price: fields.decimal(&["cost_price", "UnitCost"]),
    }
}

fn shipping(fields: Fields<'_>) -> ImportShipping {
    ImportShipping {
        carrier: fields.text_or_default(&["carrier", "Vendor"]),
        service: fields.text_or_default(&["service", "PostalServiceName"]),
        tracking_number: fields.text_or_default(&["tracking_number", "TrackingNumber"]),
        postage_cost: fields.decimal(&["postage_cost", "PostageCost"]),
        weight: fields.decimal(&["weight", "TotalWeight"]),
        shipped_at: fields.timestamp(&["shipped_at", "ShippedDate"]),
    }
}

fn note(fields: Fields<'_>) -> Option<ImportNote> {
    let body = fields.text(&["body", "note", "Note"])?;
    Some(ImportNote {
        body,
        author: fields.text_or_default(&["author", "created_by", "CreatedBy"]),
        is_internal: fields.flag(&["is_internal", "internal", "Internal"]),
        noted_at: fields.timestamp(&["noted_at", "NoteDate"]),
    })
}

fn property(fields: Fields<'_>) -> Option<ImportProperty> {
    let name = fields.text(&["name", "Name", "PropertyName"])?;
    Some(ImportProperty {
        name,
        value: fields.text_or_default(&["value", "Value", "PropertyValue"]),
        property_type: fields.text_or_default(&["property_type", "type", "Type", "PropertyType"]),
    })
}

fn identifiers(fields: &Fields<'_>) -> Vec<ImportIdentifier> {
    let Some(list) = fields.first(IDENTIFIERS_KEYS).and_then(Value::as_array) else {
        return Vec::new();
    };
    list.iter()
        .filter_map(|entry| match entry {
            Value::String(tag) if !tag.trim().is_empty() => Some(ImportIdentifier {
                tag: tag.trim().to_string(),
                name: String::new(),
            }),
            Value::Object(map) => {
                let fields = Fields::new(map);
                let tag = fields.text(&["tag", "Tag"])?;
                Some(ImportIdentifier {
                    tag,
                    name: fields.text_or_default(&["name", "Name"]),
                })
            }
            _ => None,
        })
        .collect()
}

/// Read-only view over one JSON object with key fallbacks.
#[derive(Clone, Copy)]
struct Fields<'a> {
    map: &'a Map<String, Value>,
}

impl<'a> Fields<'a> {
    fn new(map: &'a Map<String, Value>) -> Self {
        Self { map }
    }

    fn get(&self, path: &str) -> Option<&'a Value> {
        let mut segments = path.split('.');
        let mut current = self.map.get(segments.next()?)?;
        for segment in segments {
            current = current.as_object()?.get(segment)?;
        }
        (!current.is_null()).then_some(current)
    }

    fn first(&self, paths: &[&str]) -> Option<&'a Value> {
        paths.iter().find_map(|path| self.get(path))
    }

    fn text(&self, paths: &[&str]) -> Option<String> {
        paths.iter().find_map(|path| self.get(path).and_then(value_text))
    }

    fn text_or_default(&self, paths: &[&str]) -> String {
        self.text(paths).unwrap_or_default()
    }

    fn decimal(&self, paths: &[&str]) -> Decimal {
        paths
            .iter()
            .find_map(|path| self.get(path).and_then(value_decimal))
            .unwrap_or_default()
    }

    fn integer(&self, paths: &[&str]) -> i64 {
        paths
            .iter()
            .find_map(|path| self.get(path).and_then(value_integer))
            .unwrap_or_default()
    }

    fn flag(&self, paths: &[&str]) -> bool {
        paths
            .iter()
            .find_map(|path| self.get(path).and_then(value_bool))
            .unwrap_or(false)
    }

    fn timestamp(&self, paths: &[&str]) -> Option<DateTime<Utc>> {
        paths
            .iter()
            .find_map(|path| self.get(path).and_then(value_timestamp))
    }

    fn object(&self, paths: &[&str]) -> Option<Fields<'a>> {
        self.first(paths)
            .and_then(Value::as_object)
            .map(Fields::new)
    }

    /// Object entries of the first array found; non-object entries are dropped.
    fn objects(&self, paths: &[&str]) -> impl Iterator<Item = Fields<'a>> {
        self.first(paths)
            .and_then(Value::as_array)
            .map(|list| list.as_slice())
            .unwrap_or_default()
            .iter()
            .filter_map(Value::as_object)
            .map(Fields::new)
    }
}

fn value_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

fn value_decimal(value: &Value) -> Option<Decimal> {
    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        _ => return None,
    };
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}

fn value_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => {
            let trimmed = s.trim();
            trimmed.parse::<i64>().ok().or_else(|| {
                Decimal::from_str(trimmed)
                    .ok()
                    .and_then(|d| d.trunc().to_string().parse::<i64>().ok())
            })
        }
        _ => None,
    }
}

fn value_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_i64().map(|v| v != 0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Some(true),
            "false" | "0" | "no" | "" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn value_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    parse_timestamp(value.as_str()?)
}

/// Parses RFC 3339 or zone-less timestamps (assumed UTC). Bare dates map to midnight.
pub(crate) fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orders::orders_model::OrderIdentity;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn remote_payload() -> Value {
        json!({
            "OrderId": "5f0c7e0a-8a41-4d4e-9f0e-1b2c3d4e5f60",
            "NumOrderId": 100231,
            "Processed": true,
            "GeneralInfo": {
                "Source": "AMAZON",
                "SubSource": "Amazon UK",
                "ReferenceNum": "203-1234567-1234567",
                "ReceivedDate": "2024-03-05T10:15:00Z",
                "Status": 1
            },
            "TotalsInfo": {
                "Subtotal": 19.99,
                "PostageCost": "3.50",
                "Tax": 4.7,
                "TotalCharge": 28.19,
                "Currency": "GBP"
            },
            "ShippingInfo": {
                "Vendor": "Royal Mail",
                "PostalServiceName": "Tracked 48",
                "TrackingNumber": "RM123456789GB",
                "PostageCost": 3.5,
                "TotalWeight": 0.42
            },
            "CustomerInfo": {
                "Address": {
                    "FullName": "Jane Doe",
                    "EmailAddress": "jane@example.com",
                    "Address1": "1 High Street"
                }
            },
            "Items": [
                { "SKU": "MUG-RED", "Title": "Red Mug", "Quantity": 2, "PricePerUnit": 7.5, "UnitCost": 2.1 },
                { "ItemNumber": "", "Title": "Unlinked listing", "Quantity": "1", "PricePerUnit": "4.99" },
                "not-an-item"
            ],
            "Notes": [
                { "Note": "Gift wrap", "CreatedBy": "ops", "Internal": false, "NoteDate": "2024-03-05 11:00:00" }
            ],
            "ExtendedProperties": [
                { "Name": "Gift", "Value": "yes", "Type": "Info" }
            ],
            "Identifiers": [ { "Tag": "PRIME", "Name": "Prime order" }, "EXPRESS" ]
        })
    }

    #[test]
    fn maps_remote_api_field_names() {
        let record = normalize_order(&remote_payload()).expect("record");

        assert_eq!(
            record.identity,
            OrderIdentity::RemoteId("5f0c7e0a-8a41-4d4e-9f0e-1b2c3d4e5f60".to_string())
        );
        assert!(record.is_processed);
        let attrs = &record.attributes;
        assert_eq!(attrs.order_number.as_deref(), Some("100231"));
        assert_eq!(attrs.channel, "AMAZON");
        assert_eq!(attrs.sub_channel, "Amazon UK");
        assert_eq!(attrs.channel_reference, "203-1234567-1234567");
        assert_eq!(attrs.status, "1");
        assert_eq!(attrs.currency, "GBP");
        assert_eq!(attrs.subtotal, dec!(19.99));
        assert_eq!(attrs.shipping_cost, dec!(3.50));
        assert_eq!(attrs.total, dec!(28.19));
        assert_eq!(
            attrs.received_at,
            Some(Utc.with_ymd_and_hms(2024, 3, 5, 10, 15, 0).unwrap())
        );

        assert_eq!(record.items.len(), 2);
        assert_eq!(record.items[0].sku.as_deref(), Some("MUG-RED"));
        assert_eq!(record.items[0].quantity, 2);
        assert_eq!(record.items[1].sku, None);
        assert_eq!(record.items[1].unit_price, dec!(4.99));

        let shipping = record.shipping.as_ref().expect("shipping");
        assert_eq!(shipping.carrier, "Royal Mail");
        assert_eq!(shipping.tracking_number, "RM123456789GB");

        assert_eq!(record.notes.len(), 1);
        assert_eq!(
            record.notes[0].noted_at,
            Some(Utc.with_ymd_and_hms(2024, 3, 5, 11, 0, 0).unwrap())
        );
        assert_eq!(record.properties[0].name, "Gift");
        assert_eq!(record.identifiers.len(), 2);
        assert_eq!(record.identifiers[1].tag, "EXPRESS");
    }

    #[test]
    fn never_carries_customer_data() {
        let record = normalize_order(&remote_payload()).expect("record");
        let serialized = serde_json::to_string(&record).expect("serialize");
        assert!(!serialized.contains("jane@example.com"));
        assert!(!serialized.contains("Jane Doe"));
        assert!(!serialized.contains("High Street"));
    }

    #[test]
    fn maps_local_field_names() {
        let raw = json!({
            "order_number": "A-17",
            "is_processed": "0",
            "channel": "shopify",
            "total": "12.00",
            "is_paid": 1,
            "paid_at": "2024-01-02",
            "items": [ { "sku": " SKU-1 ", "title": "Thing", "quantity": 3, "unit_price": "4", "cost_price": 1 } ],
            "notes": [ { "body": "call first" }, { "author": "no body" } ],
            "properties": [ { "name": "priority", "value": "high" } ]
        });
        let record = normalize_order(&raw).expect("record");

        assert_eq!(record.identity, OrderIdentity::OrderNumber("A-17".to_string()));
        assert!(!record.is_processed);
        assert!(record.attributes.is_paid);
        assert_eq!(record.attributes.total, dec!(12));
        assert_eq!(
            record.attributes.paid_at,
            Some(Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap())
        );
        assert_eq!(record.items[0].sku.as_deref(), Some("SKU-1"));
        assert_eq!(record.notes.len(), 1);
        assert!(record.shipping.is_none());
    }

    #[test]
    fn local_keys_win_over_remote_keys() {
        let raw = json!({
            "order_number": "LOCAL-1",
            "NumOrderId": 999,
            "channel": "ebay",
            "GeneralInfo": { "Source": "AMAZON" }
        });
        let record = normalize_order(&raw).expect("record");
        assert_eq!(record.attributes.order_number.as_deref(), Some("LOCAL-1"));
        assert_eq!(record.attributes.channel, "ebay");
    }

    #[test]
    fn missing_identity_yields_nothing() {
        assert!(normalize_order(&json!({ "channel": "amazon", "total": 5 })).is_none());
        assert!(normalize_order(&json!({ "OrderId": NIL_REMOTE_ID })).is_none());
        assert!(normalize_order(&json!(["not", "a", "map"])).is_none());
    }

    #[test]
    fn nil_remote_id_falls_back_to_order_number() {
        let record =
            normalize_order(&json!({ "OrderId": NIL_REMOTE_ID, "NumOrderId": 5 })).expect("record");
        assert_eq!(record.identity, OrderIdentity::OrderNumber("5".to_string()));
        assert_eq!(record.attributes.remote_id, None);
    }

    #[test]
    fn malformed_values_fall_back_to_defaults() {
        let raw = json!({
            "remote_id": "r-9",
            "total": "n/a",
            "is_paid": "maybe",
            "received_at": "yesterday",
            "items": [ { "sku": "X", "quantity": "lots" } ]
        });
        let record = normalize_order(&raw).expect("record");
        assert_eq!(record.attributes.total, Decimal::ZERO);
        assert!(!record.attributes.is_paid);
        assert_eq!(record.attributes.received_at, None);
        assert_eq!(record.items[0].quantity, 0);
    }

    #[test]
    fn untitled_lines_without_sku_are_kept() {
        let raw = json!({
            "OrderId": "r-10",
            "Items": [ { "ItemNumber": "", "Quantity": 1 }, { "sku": "", "quantity": 2 } ]
        });
        let record = normalize_order(&raw).expect("record");
        assert_eq!(record.items.len(), 2);
        assert!(record.items.iter().all(|item| item.linked_sku().is_none()));
        assert_eq!(record.items[0].title, "");
        assert_eq!(record.items[1].quantity, 2);
    }

    #[test]
    fn batch_counts_discarded_payloads() {
        let batch = normalize_batch(&[
            json!({ "remote_id": "a" }),
            json!({ "channel": "no identity" }),
            json!({ "order_number": 7 }),
        ]);
        assert_eq!(batch.records.len(), 2);
        assert_eq!(batch.discarded, 1);
    }

    #[test]
    fn typed_payloads_are_normalized_through_json() {
        #[derive(Serialize)]
        struct LocalOrder {
            order_number: String,
            total: f64,
        }
        let record = normalize_typed(&LocalOrder {
            order_number: "T-1".to_string(),
            total: 9.5,
        })
        .expect("record");
        assert_eq!(record.attributes.total, dec!(9.5));
    }

    #[test]
    fn parses_supported_timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 6, 1, 8, 30, 0).unwrap();
        assert_eq!(parse_timestamp("2024-06-01T08:30:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2024-06-01T09:30:00+01:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-06-01 08:30:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-06-01T08:30:00"), Some(expected));
        assert_eq!(parse_timestamp(""), None);
    }
}
