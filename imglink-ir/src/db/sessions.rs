//! Scan session database operations

use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use imglink_common::{Error, Result};

use crate::models::{MatchPolicy, ScanProgress, ScanReport, ScanSession, ScanState};

/// Save scan session to database (insert or update)
pub async fn save_session(pool: &SqlitePool, session: &ScanSession) -> Result<()> {
    let session_id = session.session_id.to_string();
    let state = serde_json::to_string(&session.state)
        .map_err(|e| Error::Internal(format!("Failed to serialize state: {}", e)))?;
    let policy = serde_json::to_string(&session.policy)
        .map_err(|e| Error::Internal(format!("Failed to serialize policy: {}", e)))?;
    let report = session
        .report
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| Error::Internal(format!("Failed to serialize report: {}", e)))?;
    let started_at = session.started_at.to_rfc3339();
    let ended_at = session.ended_at.map(|dt| dt.to_rfc3339());

    sqlx::query(
        r#"
        INSERT INTO scan_sessions (
            session_id, state, root_folder, policy,
            progress_current, progress_total, progress_percentage,
            current_operation, report, started_at, ended_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(session_id) DO UPDATE SET
            state = excluded.state,
            progress_current = excluded.progress_current,
            progress_total = excluded.progress_total,
            progress_percentage = excluded.progress_percentage,
            current_operation = excluded.current_operation,
            report = excluded.report,
            ended_at = excluded.ended_at
        "#,
    )
    .bind(&session_id)
    .bind(&state)
    .bind(&session.root_folder)
    .bind(&policy)
    .bind(session.progress.current as i64)
    .bind(session.progress.total as i64)
    .bind(session.progress.percentage)
    .bind(&session.progress.current_operation)
    .bind(&report)
    .bind(&started_at)
    .bind(&ended_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Load scan session from database
pub async fn load_session(pool: &SqlitePool, session_id: Uuid) -> Result<Option<ScanSession>> {
    let row = sqlx::query(
        r#"
        SELECT session_id, state, root_folder, policy,
               progress_current, progress_total, progress_percentage,
               current_operation, report, started_at, ended_at
        FROM scan_sessions
        WHERE session_id = ?
        "#,
    )
    .bind(session_id.to_string())
    .fetch_optional(pool)
    .await?;

    row.map(session_from_row).transpose()
}

/// Check if any scan session is currently running
pub async fn has_running_session(pool: &SqlitePool) -> Result<bool> {
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*)
        FROM scan_sessions
        WHERE state NOT IN ('"COMPLETED"', '"CANCELLED"', '"FAILED"')
        "#,
    )
    .fetch_one(pool)
    .await?;

    Ok(count > 0)
}

/// Latest finished report, for the admin report endpoint
pub async fn latest_report(pool: &SqlitePool) -> Result<Option<(Uuid, ScanReport)>> {
    let row = sqlx::query(
        r#"
        SELECT session_id, report
        FROM scan_sessions
        WHERE report IS NOT NULL
        ORDER BY started_at DESC
        LIMIT 1
        "#,
    )
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => {
            let session_id: String = row.get("session_id");
            let session_id = Uuid::parse_str(&session_id)
                .map_err(|e| Error::Internal(format!("Invalid session UUID: {}", e)))?;
            let report: String = row.get("report");
            let report = serde_json::from_str(&report)
                .map_err(|e| Error::Internal(format!("Failed to deserialize report: {}", e)))?;
            Ok(Some((session_id, report)))
        }
        None => Ok(None),
    }
}

/// Cleanup stale scan sessions on startup
///
/// Any session not in a terminal state when the service starts is from a
/// previous run and will never complete; mark these as CANCELLED.
pub async fn cleanup_stale_sessions(pool: &SqlitePool) -> Result<usize> {
    let result = sqlx::query(
        r#"
        UPDATE scan_sessions
        SET state = '"CANCELLED"',
            ended_at = ?,
            current_operation = 'Scan cancelled - service was restarted'
        WHERE state NOT IN ('"COMPLETED"', '"CANCELLED"', '"FAILED"')
        "#,
    )
    .bind(chrono::Utc::now().to_rfc3339())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() as usize)
}

fn session_from_row(row: sqlx::sqlite::SqliteRow) -> Result<ScanSession> {
    let session_id: String = row.get("session_id");
    let session_id = Uuid::parse_str(&session_id)
        .map_err(|e| Error::Internal(format!("Invalid session UUID: {}", e)))?;

    let state: String = row.get("state");
    let state: ScanState = serde_json::from_str(&state)
        .map_err(|e| Error::Internal(format!("Failed to deserialize state: {}", e)))?;

    let policy: String = row.get("policy");
    let policy: MatchPolicy = serde_json::from_str(&policy)
        .map_err(|e| Error::Internal(format!("Failed to deserialize policy: {}", e)))?;

    let report: Option<String> = row.get("report");
    let report = report
        .map(|r| serde_json::from_str(&r))
        .transpose()
        .map_err(|e| Error::Internal(format!("Failed to deserialize report: {}", e)))?;

    let started_at: String = row.get("started_at");
    let started_at = chrono::DateTime::parse_from_rfc3339(&started_at)
        .map_err(|e| Error::Internal(format!("Failed to parse started_at: {}", e)))?
        .with_timezone(&chrono::Utc);

    let ended_at: Option<String> = row.get("ended_at");
    let ended_at = ended_at
        .map(|s| chrono::DateTime::parse_from_rfc3339(&s))
        .transpose()
        .map_err(|e| Error::Internal(format!("Failed to parse ended_at: {}", e)))?
        .map(|dt| dt.with_timezone(&chrono::Utc));

    let progress = ScanProgress {
        current: row.get::<i64, _>("progress_current") as usize,
        total: row.get::<i64, _>("progress_total") as usize,
        percentage: row.get("progress_percentage"),
        current_operation: row.get("current_operation"),
        current_file: None,
        elapsed_seconds: if let Some(end) = ended_at {
            (end - started_at).num_seconds() as u64
        } else {
            (chrono::Utc::now() - started_at).num_seconds() as u64
        },
    };

    Ok(ScanSession {
        session_id,
        state,
        root_folder: row.get("root_folder"),
        policy,
        progress,
        report,
        started_at,
        ended_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_util::memory_pool;

    #[tokio::test]
    async fn test_save_and_load_round_trip() {
        let pool = memory_pool().await;
        let mut session = ScanSession::new("images".to_string(), MatchPolicy::default());
        session.update_progress(3, 10, "Processing".to_string());

        save_session(&pool, &session).await.unwrap();

        let loaded = load_session(&pool, session.session_id).await.unwrap().unwrap();
        assert_eq!(loaded.session_id, session.session_id);
        assert_eq!(loaded.state, ScanState::Initializing);
        assert_eq!(loaded.progress.current, 3);
        assert_eq!(loaded.progress.total, 10);
        assert!(loaded.report.is_none());
    }

    #[tokio::test]
    async fn test_load_missing_session() {
        let pool = memory_pool().await;
        assert!(load_session(&pool, Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_running_session_guard() {
        let pool = memory_pool().await;
        assert!(!has_running_session(&pool).await.unwrap());

        let mut session = ScanSession::new("images".to_string(), MatchPolicy::default());
        save_session(&pool, &session).await.unwrap();
        assert!(has_running_session(&pool).await.unwrap());

        session.transition_to(ScanState::Completed);
        save_session(&pool, &session).await.unwrap();
        assert!(!has_running_session(&pool).await.unwrap());
    }

    #[tokio::test]
    async fn test_latest_report() {
        let pool = memory_pool().await;
        assert!(latest_report(&pool).await.unwrap().is_none());

        let mut session = ScanSession::new("images".to_string(), MatchPolicy::default());
        session.report = Some(ScanReport {
            total_images: 5,
            direct_links_created: 3,
            ..Default::default()
        });
        session.transition_to(ScanState::Completed);
        save_session(&pool, &session).await.unwrap();

        let (id, report) = latest_report(&pool).await.unwrap().unwrap();
        assert_eq!(id, session.session_id);
        assert_eq!(report.total_images, 5);
        assert_eq!(report.direct_links_created, 3);
    }

    #[tokio::test]
    async fn test_cleanup_stale_sessions() {
        let pool = memory_pool().await;
        let session = ScanSession::new("images".to_string(), MatchPolicy::default());
        save_session(&pool, &session).await.unwrap();

        let cleaned = cleanup_stale_sessions(&pool).await.unwrap();
        assert_eq!(cleaned, 1);

        let loaded = load_session(&pool, session.session_id).await.unwrap().unwrap();
        assert_eq!(loaded.state, ScanState::Cancelled);
        assert!(loaded.ended_at.is_some());
    }
}
