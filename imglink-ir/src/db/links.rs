//! Image link persistence
//!
//! Links are created once, by either the scan orchestrator (auto) or the
//! review workflow (on approval), and not otherwise mutated here.

use crate::models::ImageLink;
use chrono::Utc;
use imglink_common::Result;
use sqlx::SqlitePool;
use std::collections::HashSet;
use uuid::Uuid;

/// Insert a new image link
///
/// Callers must check `has_active_link` first; the partial unique index on
/// active links turns a lost race into a database error rather than a
/// duplicate primary link.
pub async fn insert(
    pool: &SqlitePool,
    product_id: Uuid,
    image_url: &str,
    confidence: u8,
    auto_matched: bool,
    source_filename: &str,
) -> Result<ImageLink> {
    let link = ImageLink {
        id: Uuid::new_v4(),
        product_id,
        image_url: image_url.to_string(),
        confidence,
        auto_matched,
        source_filename: source_filename.to_string(),
        active: true,
        created_at: Utc::now(),
    };

    sqlx::query(
        r#"
        INSERT INTO image_links (id, product_id, image_url, confidence, auto_matched, source_filename, active, created_at)
        VALUES (?, ?, ?, ?, ?, ?, 1, ?)
        "#,
    )
    .bind(link.id.to_string())
    .bind(link.product_id.to_string())
    .bind(&link.image_url)
    .bind(link.confidence as i64)
    .bind(link.auto_matched as i64)
    .bind(&link.source_filename)
    .bind(link.created_at.to_rfc3339())
    .execute(pool)
    .await?;

    tracing::debug!(
        product_id = %product_id,
        image_url = %image_url,
        auto_matched = auto_matched,
        "Created image link"
    );

    Ok(link)
}

/// Does this product already have an active link?
pub async fn has_active_link(pool: &SqlitePool, product_id: Uuid) -> Result<bool> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM image_links WHERE product_id = ? AND active = 1",
    )
    .bind(product_id.to_string())
    .fetch_one(pool)
    .await?;

    Ok(count > 0)
}

/// Filenames already consumed by an active link, for skip-on-rescan
pub async fn list_linked_filenames(pool: &SqlitePool) -> Result<HashSet<String>> {
    let rows: Vec<(String,)> = sqlx::query_as(
        "SELECT source_filename FROM image_links WHERE active = 1 AND source_filename != ''",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|(f,)| f).collect())
}

/// Count of active links referencing a product (diagnostics and tests)
pub async fn count_active_for_product(pool: &SqlitePool, product_id: Uuid) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM image_links WHERE product_id = ? AND active = 1",
    )
    .bind(product_id.to_string())
    .fetch_one(pool)
    .await?;
    Ok(count)
}
