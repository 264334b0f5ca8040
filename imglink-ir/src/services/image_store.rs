//! Image store access
//!
//! The orchestrator consumes storage through the `ImageStore` trait so scans
//! can run against the local filesystem in production and against fixtures
//! in tests. Listing is paginated; recursion into subfolders is the
//! orchestrator's decision, driven by policy.

use crate::models::ImageEntry;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Image store errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// Specified folder does not exist
    #[error("Folder not found: {0}")]
    FolderNotFound(PathBuf),

    /// Path exists but is not a directory
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// Cannot access an entry
    #[error("Storage access error {0}: {1}")]
    AccessError(PathBuf, String),
}

/// Read access to an image store
pub trait ImageStore: Send + Sync {
    /// List one page of entries under a folder
    ///
    /// `folder` is relative to the store root; `""` is the root itself.
    /// Entries are returned in stable (name-sorted) order so pagination is
    /// consistent across calls.
    fn list_images(
        &self,
        folder: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<ImageEntry>, StoreError>;

    /// Public URL for a stored image, as persisted on links and candidates
    fn get_public_url(&self, storage_path: &str) -> String;
}

/// Filesystem-backed image store
pub struct FsImageStore {
    root: PathBuf,
    /// System files never worth listing
    ignore_patterns: Vec<String>,
}

impl FsImageStore {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            ignore_patterns: vec![
                ".DS_Store".to_string(),
                "Thumbs.db".to_string(),
                ".git".to_string(),
            ],
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn should_list(&self, name: &str) -> bool {
        if name.starts_with('.') {
            return false;
        }
        !self.ignore_patterns.iter().any(|p| name.contains(p.as_str()))
    }
}

impl ImageStore for FsImageStore {
    fn list_images(
        &self,
        folder: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<ImageEntry>, StoreError> {
        let dir = if folder.is_empty() {
            self.root.clone()
        } else {
            self.root.join(folder)
        };

        if !dir.exists() {
            return Err(StoreError::FolderNotFound(dir));
        }
        if !dir.is_dir() {
            return Err(StoreError::NotADirectory(dir));
        }

        let read_dir = std::fs::read_dir(&dir)
            .map_err(|e| StoreError::AccessError(dir.clone(), e.to_string()))?;

        let mut entries = Vec::new();
        for entry in read_dir {
            let entry = entry.map_err(|e| StoreError::AccessError(dir.clone(), e.to_string()))?;
            let name = entry.file_name().to_string_lossy().to_string();
            if !self.should_list(&name) {
                continue;
            }
            let is_directory = entry
                .file_type()
                .map_err(|e| StoreError::AccessError(entry.path(), e.to_string()))?
                .is_dir();
            let storage_path = if folder.is_empty() {
                name.clone()
            } else {
                format!("{}/{}", folder.trim_end_matches('/'), name)
            };
            entries.push(ImageEntry {
                filename: name,
                storage_path,
                is_directory,
            });
        }

        // Stable order so limit/offset pagination never skips or repeats
        entries.sort_by(|a, b| a.filename.cmp(&b.filename));

        Ok(entries.into_iter().skip(offset).take(limit).collect())
    }

    fn get_public_url(&self, storage_path: &str) -> String {
        format!("/media/{}", storage_path.trim_start_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn fixture_store() -> (tempfile::TempDir, FsImageStore) {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("445404.jpg"), b"x").unwrap();
        fs::write(dir.path().join("319027.png"), b"x").unwrap();
        fs::write(dir.path().join("notes.txt"), b"x").unwrap();
        fs::write(dir.path().join(".DS_Store"), b"x").unwrap();
        fs::create_dir(dir.path().join("archive")).unwrap();
        fs::write(dir.path().join("archive").join("500123.jpg"), b"x").unwrap();
        let store = FsImageStore::new(dir.path().to_path_buf());
        (dir, store)
    }

    #[test]
    fn test_list_root_sorted_with_directories() {
        let (_dir, store) = fixture_store();
        let entries = store.list_images("", 100, 0).unwrap();

        let names: Vec<&str> = entries.iter().map(|e| e.filename.as_str()).collect();
        assert_eq!(names, vec!["319027.png", "445404.jpg", "archive", "notes.txt"]);
        assert!(entries.iter().find(|e| e.filename == "archive").unwrap().is_directory);
    }

    #[test]
    fn test_hidden_and_system_files_skipped() {
        let (_dir, store) = fixture_store();
        let entries = store.list_images("", 100, 0).unwrap();
        assert!(!entries.iter().any(|e| e.filename == ".DS_Store"));
    }

    #[test]
    fn test_pagination_is_consistent() {
        let (_dir, store) = fixture_store();
        let first = store.list_images("", 2, 0).unwrap();
        let second = store.list_images("", 2, 2).unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(second.len(), 2);
        assert_ne!(first[0].filename, second[0].filename);
    }

    #[test]
    fn test_subfolder_listing_carries_storage_path() {
        let (_dir, store) = fixture_store();
        let entries = store.list_images("archive", 100, 0).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].storage_path, "archive/500123.jpg");
    }

    #[test]
    fn test_missing_folder_errors() {
        let (_dir, store) = fixture_store();
        let result = store.list_images("nope", 10, 0);
        assert!(matches!(result, Err(StoreError::FolderNotFound(_))));
    }

    #[test]
    fn test_public_url() {
        let (_dir, store) = fixture_store();
        assert_eq!(store.get_public_url("archive/500123.jpg"), "/media/archive/500123.jpg");
    }
}
