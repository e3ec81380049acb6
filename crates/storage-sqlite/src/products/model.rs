use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use orderlens_core::orders::{PLACEHOLDER_PRODUCT_PREFIX, PLACEHOLDER_PRODUCT_TITLE};

#[derive(Queryable, Identifiable, Selectable, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::products)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ProductDB {
    pub id: i64,
    pub sku: String,
    pub product_code: String,
    pub title: String,
    pub stock_level: i32,
    pub is_placeholder: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = crate::schema::products)]
#[diesel(treat_none_as_default_value = false)]
pub struct NewProductDB {
    pub sku: String,
    pub product_code: String,
    pub title: String,
    pub stock_level: i32,
    pub is_placeholder: bool,
    pub created_at: String,
    pub updated_at: String,
}

pub const NEW_PRODUCT_COLUMNS: usize = 7;

impl NewProductDB {
    /// Stand-in product for a SKU the catalog does not know yet.
    pub fn placeholder(sku: &str, now: &str) -> Self {
        NewProductDB {
            sku: sku.to_string(),
            product_code: format!("{}{}", PLACEHOLDER_PRODUCT_PREFIX, sku),
            title: PLACEHOLDER_PRODUCT_TITLE.to_string(),
            stock_level: 0,
            is_placeholder: true,
            created_at: now.to_string(),
            updated_at: now.to_string(),
        }
    }
}
