use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use std::collections::HashSet;
use std::sync::Arc;

use orderlens_core::Result;

use super::model::{NewProductDB, ProductDB, NEW_PRODUCT_COLUMNS};
use crate::db::{get_connection, rows_per_statement, DbPool, MAX_BIND_PARAMS};
use crate::errors::StorageError;
use crate::schema::products;

/// Read access to the product catalog.
pub struct ProductRepository {
    pool: Arc<DbPool>,
}

impl ProductRepository {
    pub fn new(pool: Arc<DbPool>) -> Self {
        ProductRepository { pool }
    }

    pub fn get_product_by_sku(&self, sku: &str) -> Result<Option<ProductDB>> {
        let mut conn = get_connection(&self.pool)?;
        let product = products::table
            .filter(products::sku.eq(sku))
            .select(ProductDB::as_select())
            .first::<ProductDB>(&mut conn)
            .optional()
            .map_err(StorageError::from)?;
        Ok(product)
    }

    /// Auto-provisioned products still waiting for catalog enrichment.
    pub fn list_placeholder_products(&self) -> Result<Vec<ProductDB>> {
        let mut conn = get_connection(&self.pool)?;
        let placeholders = products::table
            .filter(products::is_placeholder.eq(true))
            .order(products::sku.asc())
            .select(ProductDB::as_select())
            .load::<ProductDB>(&mut conn)
            .map_err(StorageError::from)?;
        Ok(placeholders)
    }

    pub fn count_products(&self) -> Result<i64> {
        let mut conn = get_connection(&self.pool)?;
        let count = products::table
            .count()
            .get_result::<i64>(&mut conn)
            .map_err(StorageError::from)?;
        Ok(count)
    }
}

/// Subset of `skus` already present in the catalog.
pub(crate) fn existing_skus(
    conn: &mut SqliteConnection,
    skus: &[String],
) -> Result<HashSet<String>> {
    let mut found = HashSet::with_capacity(skus.len());
    for chunk in skus.chunks(MAX_BIND_PARAMS) {
        let rows = products::table
            .filter(products::sku.eq_any(chunk))
            .select(products::sku)
            .load::<String>(conn)
            .map_err(StorageError::from)?;
        found.extend(rows);
    }
    Ok(found)
}

/// Inserts placeholder products, ignoring SKUs another run created first.
/// Returns the number of rows actually inserted.
pub(crate) fn insert_placeholder_products(
    conn: &mut SqliteConnection,
    skus: &[String],
    now: &str,
) -> Result<usize> {
    let rows: Vec<NewProductDB> = skus
        .iter()
        .map(|sku| NewProductDB::placeholder(sku, now))
        .collect();
    let mut inserted = 0;
    for chunk in rows.chunks(rows_per_statement(NEW_PRODUCT_COLUMNS)) {
        inserted += diesel::insert_or_ignore_into(products::table)
            .values(chunk)
            .execute(conn)
            .map_err(StorageError::from)?;
    }
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_pool, init, run_migrations};
    use tempfile::tempdir;

    fn setup_pool() -> Arc<DbPool> {
        let app_data = tempdir()
            .expect("tempdir")
            .keep()
            .to_string_lossy()
            .to_string();
        let db_path = init(&app_data).expect("init db");
        run_migrations(&db_path).expect("migrate db");
        create_pool(&db_path).expect("create pool")
    }

    #[test]
    fn placeholders_are_created_once() {
        let pool = setup_pool();
        let repository = ProductRepository::new(pool.clone());
        let mut conn = get_connection(&pool).expect("conn");

        let skus = vec!["NEW-SKU-1".to_string(), "NEW-SKU-2".to_string()];
        let inserted =
            insert_placeholder_products(&mut conn, &skus, "2026-01-01T00:00:00Z").expect("insert");
        assert_eq!(inserted, 2);

        let again = insert_placeholder_products(&mut conn, &skus[..1], "2026-01-02T00:00:00Z")
            .expect("insert again");
        assert_eq!(again, 0);
        assert_eq!(repository.count_products().expect("count"), 2);

        let product = repository
            .get_product_by_sku("NEW-SKU-1")
            .expect("lookup")
            .expect("product exists");
        assert_eq!(product.product_code, "AUTO-NEW-SKU-1");
        assert_eq!(product.title, "Unknown Product");
        assert_eq!(product.stock_level, 0);
        assert!(product.is_placeholder);
        assert_eq!(product.created_at, "2026-01-01T00:00:00Z");
    }

    #[test]
    fn existing_skus_returns_only_known_products() {
        let pool = setup_pool();
        let mut conn = get_connection(&pool).expect("conn");
        insert_placeholder_products(&mut conn, &["A".to_string()], "2026-01-01T00:00:00Z")
            .expect("insert");

        let found = existing_skus(&mut conn, &["A".to_string(), "B".to_string()]).expect("lookup");
        assert_eq!(found, HashSet::from(["A".to_string()]));
        assert!(existing_skus(&mut conn, &[]).expect("empty").is_empty());

        let repository = ProductRepository::new(pool);
        assert_eq!(
            repository
                .list_placeholder_products()
                .expect("placeholders")
                .len(),
            1
        );
        assert!(repository.get_product_by_sku("B").expect("lookup").is_none());
    }
}
