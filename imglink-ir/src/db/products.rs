//! Catalog read access
//!
//! Products are owned by the catalog service; this module only reads them.

use crate::models::Product;
use imglink_common::{Error, Result};
use sqlx::SqlitePool;
use uuid::Uuid;

/// Load every active product that carries a catalog code
pub async fn list_active_with_code(pool: &SqlitePool) -> Result<Vec<Product>> {
    let rows: Vec<(String, String, String)> = sqlx::query_as(
        r#"
        SELECT id, code, name
        FROM products
        WHERE active = 1 AND TRIM(code) != ''
        ORDER BY code
        "#,
    )
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|(id, code, name)| {
            let id = Uuid::parse_str(&id)
                .map_err(|e| Error::Internal(format!("Invalid UUID in products table: {}", e)))?;
            Ok(Product {
                id,
                code,
                name,
                active: true,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_util::memory_pool;

    async fn insert_product(pool: &SqlitePool, code: &str, active: bool) -> Uuid {
        let id = Uuid::new_v4();
        sqlx::query("INSERT INTO products (id, code, name, active) VALUES (?, ?, ?, ?)")
            .bind(id.to_string())
            .bind(code)
            .bind(format!("Product {}", code))
            .bind(active as i64)
            .execute(pool)
            .await
            .unwrap();
        id
    }

    #[tokio::test]
    async fn test_lists_only_active_products_with_codes() {
        let pool = memory_pool().await;
        let active = insert_product(&pool, "445404", true).await;
        insert_product(&pool, "319027", false).await;
        insert_product(&pool, "  ", true).await;

        let products = list_active_with_code(&pool).await.unwrap();
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].id, active);
        assert_eq!(products[0].code, "445404");
    }

    #[tokio::test]
    async fn test_empty_catalog() {
        let pool = memory_pool().await;
        let products = list_active_with_code(&pool).await.unwrap();
        assert!(products.is_empty());
    }
}
