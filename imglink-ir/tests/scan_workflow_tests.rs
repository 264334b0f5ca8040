//! End-to-end reconciliation scan scenarios
//!
//! Each test builds a real folder of image files, a small product catalog,
//! and runs the orchestrator to a terminal state against an in-memory
//! database.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use imglink_common::events::EventBus;
use imglink_ir::db;
use imglink_ir::models::{CandidateStatus, MatchPolicy, ScanSession, ScanState};
use imglink_ir::services::{FsImageStore, ScanOrchestrator};

async fn test_pool() -> SqlitePool {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect(":memory:")
        .await
        .expect("Failed to create in-memory database");
    imglink_ir::db::init_tables(&pool)
        .await
        .expect("Failed to initialize schema");
    pool
}

async fn insert_product(pool: &SqlitePool, code: &str) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO products (id, code, name, active) VALUES (?, ?, ?, 1)")
        .bind(id.to_string())
        .bind(code)
        .bind(format!("Product {}", code))
        .execute(pool)
        .await
        .unwrap();
    id
}

fn policy() -> MatchPolicy {
    MatchPolicy {
        batch_pause_ms: 0,
        ..MatchPolicy::default()
    }
}

async fn run_scan(pool: &SqlitePool, root: &Path) -> ScanSession {
    let orchestrator = ScanOrchestrator::new(
        pool.clone(),
        Arc::new(FsImageStore::new(root.to_path_buf())),
        EventBus::new(100),
        CancellationToken::new(),
    );
    let session = ScanSession::new(String::new(), policy());
    orchestrator.run(session).await
}

#[tokio::test]
async fn test_exact_filename_links_directly() {
    let pool = test_pool().await;
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("445404.jpg"), b"img").unwrap();
    let product_id = insert_product(&pool, "445404").await;

    let result = run_scan(&pool, dir.path()).await;

    assert_eq!(result.state, ScanState::Completed);
    let report = result.report.unwrap();
    assert_eq!(report.total_images, 1);
    assert_eq!(report.direct_links_created, 1);
    assert_eq!(report.candidates_created, 0);
    assert!(report.unresolved.is_empty());
    assert_eq!(
        db::links::count_active_for_product(&pool, product_id).await.unwrap(),
        1
    );
}

#[tokio::test]
async fn test_multi_code_filename_commits_best_match_only() {
    let pool = test_pool().await;
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("319027.319026.png"), b"img").unwrap();
    let first = insert_product(&pool, "319027").await;
    let second = insert_product(&pool, "319026").await;

    let result = run_scan(&pool, dir.path()).await;

    // Both codes resolve, but only the higher-confidence first code links
    let report = result.report.unwrap();
    assert_eq!(report.direct_links_created, 1);
    assert_eq!(
        db::links::count_active_for_product(&pool, first).await.unwrap(),
        1
    );
    assert_eq!(
        db::links::count_active_for_product(&pool, second).await.unwrap(),
        0
    );
}

#[tokio::test]
async fn test_directly_linked_image_not_counted_unlinked() {
    let pool = test_pool().await;
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("319027.319026.png"), b"img").unwrap();
    insert_product(&pool, "319027").await;

    let result = run_scan(&pool, dir.path()).await;

    let report = result.report.unwrap();
    assert_eq!(report.total_images, 1);
    assert_eq!(report.direct_links_created, 1);
    assert_eq!(report.candidates_created, 0);
    assert!(report.unresolved.is_empty());
    // The link was created during this run, so nothing remains unlinked
    assert_eq!(report.unlinked_images, 0);
}

#[tokio::test]
async fn test_decorated_prefix_filename_links_directly() {
    let pool = test_pool().await;
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("500123_frontview_extra_text.jpg"), b"img").unwrap();
    let product_id = insert_product(&pool, "500123").await;

    let result = run_scan(&pool, dir.path()).await;

    let report = result.report.unwrap();
    assert_eq!(report.direct_links_created, 1);
    assert!(db::links::has_active_link(&pool, product_id).await.unwrap());
}

#[tokio::test]
async fn test_zero_padding_difference_still_links() {
    let pool = test_pool().await;
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("00445.jpg"), b"img").unwrap();
    let product_id = insert_product(&pool, "445").await;

    let result = run_scan(&pool, dir.path()).await;

    let report = result.report.unwrap();
    assert_eq!(report.direct_links_created, 1);
    assert!(db::links::has_active_link(&pool, product_id).await.unwrap());
}

#[tokio::test]
async fn test_mid_confidence_creates_candidate_not_link() {
    let pool = test_pool().await;
    let dir = tempfile::tempdir().unwrap();
    // Buried mid-string digit run extracts at mid confidence
    fs::write(dir.path().join("sku-44540_photo.jpg"), b"img").unwrap();
    let product_id = insert_product(&pool, "44540").await;

    let result = run_scan(&pool, dir.path()).await;

    let report = result.report.unwrap();
    assert_eq!(report.direct_links_created, 0);
    assert_eq!(report.candidates_created, 1);
    // A candidate is not a link yet
    assert_eq!(report.unlinked_images, 1);
    assert!(!db::links::has_active_link(&pool, product_id).await.unwrap());

    let pending = db::candidates::list_pending(&pool, Some(product_id), None)
        .await
        .unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].status, CandidateStatus::Pending);
    assert_eq!(pending[0].source_filename, "sku-44540_photo.jpg");
    assert!(pending[0].confidence >= 60 && pending[0].confidence < 80);
}

#[tokio::test]
async fn test_rescan_creates_no_duplicate_links() {
    let pool = test_pool().await;
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("445404.jpg"), b"img").unwrap();
    let product_id = insert_product(&pool, "445404").await;

    let first = run_scan(&pool, dir.path()).await;
    assert_eq!(first.report.unwrap().direct_links_created, 1);

    let second = run_scan(&pool, dir.path()).await;
    let report = second.report.unwrap();
    assert_eq!(report.direct_links_created, 0);
    assert_eq!(report.linked_images, 1);
    assert_eq!(report.unlinked_images, 0);
    assert_eq!(
        db::links::count_active_for_product(&pool, product_id).await.unwrap(),
        1
    );
}

#[tokio::test]
async fn test_product_linked_once_within_a_run() {
    let pool = test_pool().await;
    let dir = tempfile::tempdir().unwrap();
    // Two different filenames resolving to the same product
    fs::write(dir.path().join("445404.jpg"), b"img").unwrap();
    fs::write(dir.path().join("445404_alt.jpg"), b"img").unwrap();
    let product_id = insert_product(&pool, "445404").await;

    let result = run_scan(&pool, dir.path()).await;

    let report = result.report.unwrap();
    assert_eq!(report.direct_links_created, 1);
    assert_eq!(report.duplicate_link_skips, 1);
    assert_eq!(
        db::links::count_active_for_product(&pool, product_id).await.unwrap(),
        1
    );
}

#[tokio::test]
async fn test_every_unmatched_image_appears_unresolved() {
    let pool = test_pool().await;
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("holiday_banner.jpg"), b"img").unwrap();
    fs::write(dir.path().join("999999.jpg"), b"img").unwrap();
    insert_product(&pool, "445404").await;

    let result = run_scan(&pool, dir.path()).await;

    let report = result.report.unwrap();
    assert_eq!(report.direct_links_created, 0);
    assert_eq!(report.candidates_created, 0);
    assert_eq!(report.unresolved.len(), 2);

    let filenames: Vec<&str> = report.unresolved.iter().map(|u| u.filename.as_str()).collect();
    assert!(filenames.contains(&"holiday_banner.jpg"));
    assert!(filenames.contains(&"999999.jpg"));

    // The code-bearing filename records its extraction and attempts
    let coded = report
        .unresolved
        .iter()
        .find(|u| u.filename == "999999.jpg")
        .unwrap();
    assert!(coded.extracted_codes.contains(&"999999".to_string()));
    assert!(coded.match_attempts > 0);
}

#[tokio::test]
async fn test_subfolder_images_are_scanned() {
    let pool = test_pool().await;
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("summer/week1")).unwrap();
    fs::write(dir.path().join("summer/week1/445404.jpg"), b"img").unwrap();
    let product_id = insert_product(&pool, "445404").await;

    let result = run_scan(&pool, dir.path()).await;

    assert_eq!(result.report.unwrap().direct_links_created, 1);
    assert!(db::links::has_active_link(&pool, product_id).await.unwrap());
}

#[tokio::test]
async fn test_session_persisted_with_final_report() {
    let pool = test_pool().await;
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("445404.jpg"), b"img").unwrap();
    insert_product(&pool, "445404").await;

    let result = run_scan(&pool, dir.path()).await;

    let stored = db::sessions::load_session(&pool, result.session_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.state, ScanState::Completed);
    assert!(stored.ended_at.is_some());
    assert_eq!(stored.report.unwrap().direct_links_created, 1);

    let (latest_id, latest) = db::sessions::latest_report(&pool).await.unwrap().unwrap();
    assert_eq!(latest_id, result.session_id);
    assert_eq!(latest.total_images, 1);
}
