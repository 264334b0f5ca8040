//! imglink-ir - Image Reconciliation Microservice
//!
//! **Module Identity:**
//! - Name: imglink-ir (Image Reconciliation)
//! - Port: 5741
//!
//! Responsible for scanning uploaded product image files, extracting
//! candidate SKU codes from filenames, matching them against the product
//! catalog with confidence scoring, and routing each image to an automatic
//! link, a human-reviewable candidate, or an unresolved bucket.
//!
//! Integrates with the back-office UI via HTTP REST + SSE.

use anyhow::Result;
use imglink_common::events::EventBus;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use imglink_ir::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting imglink-ir (Image Reconciliation) microservice");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    // Step 1: Resolve root folder (CLI arg -> env -> TOML -> OS default)
    let cli_root = std::env::args().nth(1);
    let root_folder = imglink_common::config::resolve_root_folder(cli_root.as_deref());

    // Step 2: Create root folder directory if missing
    let initializer = imglink_common::config::RootFolderInitializer::new(root_folder);
    initializer
        .ensure_directory_exists()
        .map_err(|e| anyhow::anyhow!("Failed to initialize root folder: {}", e))?;

    // Step 3: Open or create database
    let db_path = initializer.database_path();
    info!("Database: {}", db_path.display());

    let db_pool = imglink_ir::db::init_database_pool(&db_path).await?;
    info!("Database connection established");

    // Sessions left mid-flight by a previous process will never progress
    let stale = imglink_ir::db::sessions::cleanup_stale_sessions(&db_pool).await?;
    if stale > 0 {
        info!(stale_sessions = stale, "Marked stale scan sessions as cancelled");
    }

    // Create event bus for SSE broadcasting
    let event_bus = EventBus::new(100);
    info!("Event bus initialized");

    // Create application state
    let state = AppState::new(db_pool, event_bus, initializer.images_path());

    // Build router
    let app = imglink_ir::build_router(state);

    // Start server
    let port = imglink_common::config::load_toml_config()
        .ok()
        .and_then(|c| c.port)
        .unwrap_or(5741);
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port)).await?;
    info!("Listening on http://127.0.0.1:{}", port);
    info!("Health check: http://127.0.0.1:{}/health", port);

    axum::serve(listener, app).await?;

    Ok(())
}
