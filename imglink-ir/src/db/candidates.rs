//! Image candidate persistence
//!
//! Candidates are created pending by the scan orchestrator and mutated
//! exactly once by the review workflow.

use crate::models::{CandidateStatus, ImageCandidate};
use chrono::Utc;
use imglink_common::{Error, Result};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// Insert a new pending candidate
pub async fn insert(
    pool: &SqlitePool,
    product_id: Uuid,
    image_url: &str,
    confidence: u8,
    extracted_code: &str,
    source_filename: &str,
    metadata: serde_json::Value,
) -> Result<ImageCandidate> {
    let candidate = ImageCandidate {
        id: Uuid::new_v4(),
        product_id,
        image_url: image_url.to_string(),
        confidence,
        extracted_code: extracted_code.to_string(),
        source_filename: source_filename.to_string(),
        metadata,
        status: CandidateStatus::Pending,
        rejection_reason: None,
        created_at: Utc::now(),
        reviewed_at: None,
    };

    let metadata_json = serde_json::to_string(&candidate.metadata)
        .map_err(|e| Error::Internal(format!("Failed to serialize metadata: {}", e)))?;

    sqlx::query(
        r#"
        INSERT INTO image_candidates
            (id, product_id, image_url, confidence, extracted_code, source_filename, metadata, status, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, 'pending', ?)
        "#,
    )
    .bind(candidate.id.to_string())
    .bind(candidate.product_id.to_string())
    .bind(&candidate.image_url)
    .bind(candidate.confidence as i64)
    .bind(&candidate.extracted_code)
    .bind(&candidate.source_filename)
    .bind(&metadata_json)
    .bind(candidate.created_at.to_rfc3339())
    .execute(pool)
    .await?;

    tracing::debug!(
        candidate_id = %candidate.id,
        product_id = %product_id,
        confidence = confidence,
        "Created image candidate"
    );

    Ok(candidate)
}

/// Load one candidate by id
pub async fn get(pool: &SqlitePool, candidate_id: Uuid) -> Result<Option<ImageCandidate>> {
    let row = sqlx::query(
        r#"
        SELECT id, product_id, image_url, confidence, extracted_code, source_filename,
               metadata, status, rejection_reason, created_at, reviewed_at
        FROM image_candidates
        WHERE id = ?
        "#,
    )
    .bind(candidate_id.to_string())
    .fetch_optional(pool)
    .await?;

    row.map(candidate_from_row).transpose()
}

/// Update candidate status, recording the review time
///
/// Returns the number of rows changed; the review workflow relies on this
/// to detect lost races on the pending precondition.
pub async fn update_status(
    pool: &SqlitePool,
    candidate_id: Uuid,
    status: CandidateStatus,
    rejection_reason: Option<&str>,
) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE image_candidates
        SET status = ?, rejection_reason = ?, reviewed_at = ?
        WHERE id = ? AND status = 'pending'
        "#,
    )
    .bind(status.as_str())
    .bind(rejection_reason)
    .bind(Utc::now().to_rfc3339())
    .bind(candidate_id.to_string())
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Overwrite status without the pending precondition
///
/// Only the review workflow uses this, to back out an approval whose link
/// insert lost the active-link race.
pub(crate) async fn overwrite_status(
    pool: &SqlitePool,
    candidate_id: Uuid,
    status: CandidateStatus,
    rejection_reason: Option<&str>,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE image_candidates
        SET status = ?, rejection_reason = ?, reviewed_at = ?
        WHERE id = ?
        "#,
    )
    .bind(status.as_str())
    .bind(rejection_reason)
    .bind(Utc::now().to_rfc3339())
    .bind(candidate_id.to_string())
    .execute(pool)
    .await?;

    Ok(())
}

/// List pending candidates, optionally filtered by product or by free-text
/// search over filename and extracted code
pub async fn list_pending(
    pool: &SqlitePool,
    product_id: Option<Uuid>,
    search: Option<&str>,
) -> Result<Vec<ImageCandidate>> {
    let mut sql = String::from(
        r#"
        SELECT id, product_id, image_url, confidence, extracted_code, source_filename,
               metadata, status, rejection_reason, created_at, reviewed_at
        FROM image_candidates
        WHERE status = 'pending'
        "#,
    );
    if product_id.is_some() {
        sql.push_str(" AND product_id = ?");
    }
    if search.is_some() {
        sql.push_str(" AND (source_filename LIKE ? OR extracted_code LIKE ?)");
    }
    sql.push_str(" ORDER BY created_at DESC");

    let mut query = sqlx::query(&sql);
    if let Some(id) = product_id {
        query = query.bind(id.to_string());
    }
    if let Some(term) = search {
        let pattern = format!("%{}%", term);
        query = query.bind(pattern.clone()).bind(pattern);
    }

    let rows = query.fetch_all(pool).await?;
    rows.into_iter().map(candidate_from_row).collect()
}

fn candidate_from_row(row: sqlx::sqlite::SqliteRow) -> Result<ImageCandidate> {
    let id: String = row.get("id");
    let id = Uuid::parse_str(&id)
        .map_err(|e| Error::Internal(format!("Invalid candidate UUID: {}", e)))?;

    let product_id: String = row.get("product_id");
    let product_id = Uuid::parse_str(&product_id)
        .map_err(|e| Error::Internal(format!("Invalid product UUID: {}", e)))?;

    let status: String = row.get("status");
    let status = CandidateStatus::parse(&status)
        .ok_or_else(|| Error::Internal(format!("Invalid candidate status: {}", status)))?;

    let metadata: String = row.get("metadata");
    let metadata = serde_json::from_str(&metadata)
        .map_err(|e| Error::Internal(format!("Failed to deserialize metadata: {}", e)))?;

    let created_at: String = row.get("created_at");
    let created_at = chrono::DateTime::parse_from_rfc3339(&created_at)
        .map_err(|e| Error::Internal(format!("Failed to parse created_at: {}", e)))?
        .with_timezone(&chrono::Utc);

    let reviewed_at: Option<String> = row.get("reviewed_at");
    let reviewed_at = reviewed_at
        .map(|s| chrono::DateTime::parse_from_rfc3339(&s))
        .transpose()
        .map_err(|e| Error::Internal(format!("Failed to parse reviewed_at: {}", e)))?
        .map(|dt| dt.with_timezone(&chrono::Utc));

    Ok(ImageCandidate {
        id,
        product_id,
        image_url: row.get("image_url"),
        confidence: row.get::<i64, _>("confidence") as u8,
        extracted_code: row.get("extracted_code"),
        source_filename: row.get("source_filename"),
        metadata,
        status,
        rejection_reason: row.get("rejection_reason"),
        created_at,
        reviewed_at,
    })
}
