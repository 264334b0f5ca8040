//! Reconciliation scan orchestrator
//!
//! Drives one scan session through its phases:
//! INITIALIZING (catalog load, index build) → SCANNING (image discovery) →
//! PROCESSING (extract, score, persist) → terminal state.
//!
//! Images are processed sequentially in small batches. The session row is
//! saved between batches, cancellation is checked between batches, and a
//! short pause keeps the persistence layer responsive for the review UI.
//! Per-image failures are recorded and skipped; only storage-level failures
//! abort the run.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use imglink_common::events::{EventBus, ScanEvent};

use crate::db;
use crate::models::{
    ExtractedCode, ImageEntry, ScanIssue, ScanReport, ScanSession, ScanState, UnresolvedImage,
};
use crate::services::catalog_index::{score, CatalogIndex, ScoredMatch};
use crate::services::code_extractor::extract_codes;
use crate::services::image_store::ImageStore;
use crate::services::progress::{ProgressBroadcaster, DEFAULT_THROTTLE_MS};

/// What processing one image did to the database
enum ImageOutcome {
    DirectLink,
    Candidate,
    AlreadyLinked,
    DuplicateLinkSkip,
    Unresolved,
    Failed,
}

/// Orchestrates a single scan session end to end
pub struct ScanOrchestrator {
    db: SqlitePool,
    store: Arc<dyn ImageStore>,
    broadcaster: ProgressBroadcaster,
    cancel: CancellationToken,
}

impl ScanOrchestrator {
    pub fn new(
        db: SqlitePool,
        store: Arc<dyn ImageStore>,
        event_bus: EventBus,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            db,
            store,
            broadcaster: ProgressBroadcaster::new(event_bus, DEFAULT_THROTTLE_MS),
            cancel,
        }
    }

    /// Run the session to a terminal state and return it
    ///
    /// Always leaves the session persisted in its final state; callers only
    /// need the return value for logging and tests.
    pub async fn run(mut self, mut session: ScanSession) -> ScanSession {
        info!(
            session_id = %session.session_id,
            root_folder = %session.root_folder,
            "Starting reconciliation scan"
        );

        self.broadcaster.emit_immediate(ScanEvent::ScanSessionStarted {
            session_id: session.session_id,
            root_folder: session.root_folder.clone(),
            timestamp: Utc::now(),
        });

        // Phase 1: catalog load and index build
        session.update_progress(0, 0, "Loading product catalog".to_string());
        if let Err(e) = db::sessions::save_session(&self.db, &session).await {
            return self.fail(session, format!("Failed to persist session: {}", e)).await;
        }

        let products = match db::products::list_active_with_code(&self.db).await {
            Ok(products) => products,
            Err(e) => {
                return self
                    .fail(session, format!("Failed to load product catalog: {}", e))
                    .await;
            }
        };
        let index = CatalogIndex::build(&products);
        info!(
            session_id = %session.session_id,
            products = index.len(),
            "Catalog index built"
        );

        let linked_filenames = match db::links::list_linked_filenames(&self.db).await {
            Ok(set) => set,
            Err(e) => {
                return self
                    .fail(session, format!("Failed to load existing links: {}", e))
                    .await;
            }
        };

        // Phase 2: image discovery
        session.transition_to(ScanState::Scanning);
        session.update_progress(0, 0, "Scanning image store".to_string());
        if let Err(e) = db::sessions::save_session(&self.db, &session).await {
            return self.fail(session, format!("Failed to persist session: {}", e)).await;
        }
        self.emit_progress(&session, 0, 0, 0, &[]);

        let images = match self.discover_images(&session) {
            Ok(images) => images,
            Err(e) => {
                return self
                    .fail(session, format!("Image store listing failed: {}", e))
                    .await;
            }
        };

        let mut report = ScanReport {
            total_images: images.len(),
            total_products: index.len(),
            ..Default::default()
        };
        info!(
            session_id = %session.session_id,
            images = images.len(),
            "Image discovery complete"
        );

        // Phase 3: sequential processing in batches
        session.transition_to(ScanState::Processing);
        session.update_progress(0, images.len(), "Processing images".to_string());
        if let Err(e) = db::sessions::save_session(&self.db, &session).await {
            return self.fail(session, format!("Failed to persist session: {}", e)).await;
        }

        let batch_size = session.policy.batch_size.max(1);
        let mut processed = 0usize;

        for batch in images.chunks(batch_size) {
            if self.cancel.is_cancelled() {
                return self.cancelled(session, processed, report.total_images).await;
            }

            // Each batch gets a time budget; items still unprocessed when it
            // runs out are marked failed and the run moves on.
            let batch_deadline = tokio::time::Instant::now()
                + Duration::from_millis(session.policy.batch_timeout_ms);

            for entry in batch {
                session.progress.current_file = Some(entry.filename.clone());
                let outcome = if tokio::time::Instant::now() >= batch_deadline {
                    report.push_error(
                        ScanIssue {
                            filename: entry.filename.clone(),
                            message: "batch time budget exhausted".to_string(),
                        },
                        session.policy.max_errors,
                    );
                    ImageOutcome::Failed
                } else {
                    match tokio::time::timeout_at(
                        batch_deadline,
                        self.process_image(entry, &index, &linked_filenames, &session, &mut report),
                    )
                    .await
                    {
                        Ok(outcome) => outcome,
                        Err(_) => {
                            warn!(
                                session_id = %session.session_id,
                                filename = %entry.filename,
                                budget_ms = session.policy.batch_timeout_ms,
                                "Batch time budget exhausted"
                            );
                            report.push_error(
                                ScanIssue {
                                    filename: entry.filename.clone(),
                                    message: "batch time budget exhausted".to_string(),
                                },
                                session.policy.max_errors,
                            );
                            ImageOutcome::Failed
                        }
                    }
                };
                match outcome {
                    ImageOutcome::DirectLink => report.direct_links_created += 1,
                    ImageOutcome::Candidate => report.candidates_created += 1,
                    ImageOutcome::AlreadyLinked => report.linked_images += 1,
                    ImageOutcome::DuplicateLinkSkip => report.duplicate_link_skips += 1,
                    ImageOutcome::Unresolved => {}
                    ImageOutcome::Failed => report.failed_images += 1,
                }
                processed += 1;
            }

            session.update_progress(
                processed,
                report.total_images,
                "Processing images".to_string(),
            );
            if let Err(e) = db::sessions::save_session(&self.db, &session).await {
                return self.fail(session, format!("Failed to persist session: {}", e)).await;
            }
            let successful = report.direct_links_created + report.candidates_created;
            let skipped = report.linked_images + report.duplicate_link_skips;
            let errors: Vec<String> = report.errors.iter().map(|e| e.message.clone()).collect();
            self.emit_progress(&session, successful, report.failed_images, skipped, &errors);

            if session.policy.batch_pause_ms > 0 && processed < report.total_images {
                tokio::time::sleep(Duration::from_millis(session.policy.batch_pause_ms)).await;
            }
        }

        // Finalize. Images linked during this run count as linked, so the
        // unlinked remainder is candidates, duplicates, unresolved, failures.
        report.unlinked_images = report
            .total_images
            .saturating_sub(report.linked_images + report.direct_links_created);
        report.processing_time_ms = (Utc::now() - session.started_at).num_milliseconds() as u64;
        let unresolved_count = report.unresolved.len();
        session.report = Some(report.clone());
        session.progress.current_file = None;
        session.update_progress(processed, report.total_images, "Completed".to_string());
        session.transition_to(ScanState::Completed);
        if let Err(e) = db::sessions::save_session(&self.db, &session).await {
            error!(session_id = %session.session_id, "Failed to persist final session: {}", e);
        }

        self.broadcaster.emit_immediate(ScanEvent::ScanSessionCompleted {
            session_id: session.session_id,
            total_images: report.total_images,
            direct_links_created: report.direct_links_created,
            candidates_created: report.candidates_created,
            unresolved: unresolved_count,
            processing_time_ms: report.processing_time_ms,
            timestamp: Utc::now(),
        });

        info!(
            session_id = %session.session_id,
            total_images = report.total_images,
            direct_links = report.direct_links_created,
            candidates = report.candidates_created,
            unresolved = unresolved_count,
            failed = report.failed_images,
            "Scan completed"
        );

        session
    }

    /// Breadth-first listing of image files under the session root
    ///
    /// Pagination per folder uses the policy page size; subfolders join the
    /// queue when recursion is enabled. Non-image files are filtered here so
    /// the report's total reflects images only.
    fn discover_images(
        &self,
        session: &ScanSession,
    ) -> Result<Vec<ImageEntry>, crate::services::image_store::StoreError> {
        let page_size = session.policy.page_size.max(1);
        let mut folders = VecDeque::from([session.root_folder.clone()]);
        let mut images = Vec::new();

        while let Some(folder) = folders.pop_front() {
            let mut offset = 0;
            loop {
                let page = self.store.list_images(&folder, page_size, offset)?;
                let page_len = page.len();
                for entry in page {
                    if entry.is_directory {
                        if session.policy.recurse_subfolders {
                            folders.push_back(entry.storage_path);
                        }
                    } else if session.policy.is_image_filename(&entry.filename) {
                        images.push(entry);
                    }
                }
                if page_len < page_size {
                    break;
                }
                offset += page_len;
            }
        }

        Ok(images)
    }

    /// Extract, score, and persist the result for one image
    async fn process_image(
        &self,
        entry: &ImageEntry,
        index: &CatalogIndex,
        linked_filenames: &std::collections::HashSet<String>,
        session: &ScanSession,
        report: &mut ScanReport,
    ) -> ImageOutcome {
        if linked_filenames.contains(&entry.filename) {
            debug!(filename = %entry.filename, "Skipping already linked image");
            return ImageOutcome::AlreadyLinked;
        }

        let extracted = extract_codes(&entry.filename, Some(&entry.storage_path));
        if extracted.is_empty() {
            report.push_unresolved(
                UnresolvedImage {
                    filename: entry.filename.clone(),
                    extracted_codes: vec![],
                    match_attempts: 0,
                },
                session.policy.max_unresolved,
            );
            return ImageOutcome::Unresolved;
        }

        let (best, attempts) = self.resolve_best_match(index, &extracted, session);
        let Some((product_id, scored)) = best else {
            report.push_unresolved(
                UnresolvedImage {
                    filename: entry.filename.clone(),
                    extracted_codes: extracted.iter().map(|c| c.value.clone()).collect(),
                    match_attempts: attempts,
                },
                session.policy.max_unresolved,
            );
            return ImageOutcome::Unresolved;
        };

        if scored.score < session.policy.candidate_threshold {
            report.push_unresolved(
                UnresolvedImage {
                    filename: entry.filename.clone(),
                    extracted_codes: extracted.iter().map(|c| c.value.clone()).collect(),
                    match_attempts: attempts,
                },
                session.policy.max_unresolved,
            );
            return ImageOutcome::Unresolved;
        }

        // One active link per product; a product linked earlier in this run
        // or in a previous run is not linked again.
        let already_linked = match db::links::has_active_link(&self.db, product_id).await {
            Ok(linked) => linked,
            Err(e) => {
                warn!(filename = %entry.filename, "Link guard query failed: {}", e);
                report.push_error(
                    ScanIssue {
                        filename: entry.filename.clone(),
                        message: e.to_string(),
                    },
                    session.policy.max_errors,
                );
                return ImageOutcome::Failed;
            }
        };
        if already_linked {
            debug!(
                filename = %entry.filename,
                product_id = %product_id,
                "Product already has an active link, skipping"
            );
            return ImageOutcome::DuplicateLinkSkip;
        }

        let image_url = self.store.get_public_url(&entry.storage_path);
        let result = if scored.score >= session.policy.direct_link_threshold {
            db::links::insert(
                &self.db,
                product_id,
                &image_url,
                scored.score,
                true,
                &entry.filename,
            )
            .await
            .map(|_| ImageOutcome::DirectLink)
        } else {
            let metadata = serde_json::json!({
                "match_type": scored.match_type,
                "extracted_codes": extracted.iter().map(|c| &c.value).collect::<Vec<_>>(),
                "storage_path": entry.storage_path,
            });
            db::candidates::insert(
                &self.db,
                product_id,
                &image_url,
                scored.score,
                &scored.extracted_code,
                &entry.filename,
                metadata,
            )
            .await
            .map(|_| ImageOutcome::Candidate)
        };

        match result {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(filename = %entry.filename, "Failed to persist match: {}", e);
                report.push_error(
                    ScanIssue {
                        filename: entry.filename.clone(),
                        message: e.to_string(),
                    },
                    session.policy.max_errors,
                );
                ImageOutcome::Failed
            }
        }
    }

    /// Best-scoring product for a set of extracted codes
    ///
    /// Products reached by an index lookup are scored first; when no lookup
    /// hits, every indexed product is scored so near-miss codes still get a
    /// fuzzy chance. A filename carrying several viable codes commits only
    /// its best match; the others are logged and dropped.
    fn resolve_best_match(
        &self,
        index: &CatalogIndex,
        extracted: &[ExtractedCode],
        session: &ScanSession,
    ) -> (Option<(Uuid, ScoredMatch)>, usize) {
        let mut candidates: Vec<Uuid> = extracted
            .iter()
            .flat_map(|code| index.lookup(&code.value))
            .collect();
        candidates.sort();
        candidates.dedup();

        if candidates.is_empty() {
            candidates = index.product_ids().collect();
            candidates.sort();
        }

        let mut scored: Vec<(Uuid, ScoredMatch)> = Vec::new();
        for product_id in &candidates {
            let Some(code) = index.product_code(*product_id) else {
                continue;
            };
            if let Some(result) = score(code, extracted) {
                scored.push((*product_id, result));
            }
        }
        let attempts = candidates.len();

        // Highest score wins; ties break on product code for determinism
        scored.sort_by(|a, b| {
            b.1.score.cmp(&a.1.score).then_with(|| {
                let code_a = index.product_code(a.0).unwrap_or("");
                let code_b = index.product_code(b.0).unwrap_or("");
                code_a.cmp(code_b)
            })
        });

        let mut iter = scored.into_iter();
        let best = iter.next();
        if let Some((best_id, ref best_match)) = best {
            for (dropped_id, dropped) in iter {
                if dropped.score >= session.policy.candidate_threshold {
                    debug!(
                        session_id = %session.session_id,
                        kept_product = %best_id,
                        kept_score = best_match.score,
                        dropped_product = %dropped_id,
                        dropped_score = dropped.score,
                        "Dropping secondary match, only the best match is committed"
                    );
                }
            }
        }

        (best, attempts)
    }

    async fn cancelled(
        mut self,
        mut session: ScanSession,
        processed: usize,
        total: usize,
    ) -> ScanSession {
        info!(
            session_id = %session.session_id,
            processed = processed,
            total = total,
            "Scan cancelled"
        );
        session.update_progress(processed, total, "Cancelled".to_string());
        session.progress.current_file = None;
        session.transition_to(ScanState::Cancelled);
        if let Err(e) = db::sessions::save_session(&self.db, &session).await {
            error!(session_id = %session.session_id, "Failed to persist cancelled session: {}", e);
        }
        self.broadcaster.emit_immediate(ScanEvent::ScanSessionCancelled {
            session_id: session.session_id,
            processed,
            total,
            timestamp: Utc::now(),
        });
        session
    }

    async fn fail(&mut self, mut session: ScanSession, message: String) -> ScanSession {
        error!(session_id = %session.session_id, "Scan failed: {}", message);
        session.progress.current_operation = message.clone();
        session.progress.current_file = None;
        session.transition_to(ScanState::Failed);
        if let Err(e) = db::sessions::save_session(&self.db, &session).await {
            error!(session_id = %session.session_id, "Failed to persist failed session: {}", e);
        }
        self.broadcaster.emit_immediate(ScanEvent::ScanSessionFailed {
            session_id: session.session_id,
            error: message,
            timestamp: Utc::now(),
        });
        session
    }

    fn emit_progress(
        &mut self,
        session: &ScanSession,
        successful: usize,
        failed: usize,
        skipped: usize,
        errors: &[String],
    ) {
        let status = match serde_json::to_value(session.state) {
            Ok(serde_json::Value::String(s)) => s,
            _ => format!("{:?}", session.state),
        };
        let event = ScanEvent::ScanProgressUpdate {
            session_id: session.session_id,
            status,
            current_step: session.progress.current_operation.clone(),
            processed: session.progress.current,
            successful,
            failed,
            skipped,
            total: session.progress.total,
            current_file: session.progress.current_file.clone(),
            errors: errors.to_vec(),
            timestamp: Utc::now(),
        };
        if session.progress.current >= session.progress.total {
            self.broadcaster.emit_immediate(event);
        } else {
            self.broadcaster.emit(event);
        }
    }
}
