mod location;

pub use location::resolve_store_path;

use anyhow::{Context, Result};
use atomic_write_file::AtomicWriteFile;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use crate::engine::BookmarkSink;

/// On-disk bookmark document: named folders of URL entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookmarkDocument {
    pub version: u32,
    #[serde(default)]
    pub folders: Vec<BookmarkFolder>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookmarkFolder {
    pub name: String,
    #[serde(default)]
    pub entries: Vec<BookmarkEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookmarkEntry {
    pub url: String,
    pub label: String,
    pub added_at: DateTime<Utc>,
}

impl BookmarkDocument {
    fn new() -> Self {
        BookmarkDocument {
            version: 1,
            folders: Vec::new(),
        }
    }
}

/// File-backed bookmark store. Every mutation persists atomically, so the
/// document on disk always reflects a completed operation.
pub struct BookmarkStore {
    path: PathBuf,
    doc: BookmarkDocument,
}

impl BookmarkStore {
    /// Open the store at `path`, creating an empty document if the file
    /// doesn't exist yet.
    pub fn open(path: &Path) -> Result<Self> {
        let doc = if path.exists() {
            let file = File::open(path)
                .with_context(|| format!("Failed to open bookmark store at {}", path.display()))?;
            let doc: BookmarkDocument =
                serde_json::from_reader(file).context("Failed to load bookmark store")?;
            if doc.version != 1 {
                anyhow::bail!("Unsupported bookmark store version: {}", doc.version);
            }
            doc
        } else {
            BookmarkDocument::new()
        };

        Ok(BookmarkStore {
            path: path.to_path_buf(),
            doc,
        })
    }

    /// Idempotent get-or-create of a named folder.
    pub fn ensure_folder(&mut self, name: &str) -> Result<()> {
        if !self.doc.folders.iter().any(|f| f.name == name) {
            self.doc.folders.push(BookmarkFolder {
                name: name.to_string(),
                entries: Vec::new(),
            });
            self.persist()?;
        }
        Ok(())
    }

    /// Entries in a folder, if the folder exists.
    pub fn entries(&self, folder: &str) -> Option<&[BookmarkEntry]> {
        self.doc
            .folders
            .iter()
            .find(|f| f.name == folder)
            .map(|f| f.entries.as_slice())
    }

    fn folder_mut(&mut self, name: &str) -> &mut BookmarkFolder {
        if let Some(idx) = self.doc.folders.iter().position(|f| f.name == name) {
            return &mut self.doc.folders[idx];
        }
        self.doc.folders.push(BookmarkFolder {
            name: name.to_string(),
            entries: Vec::new(),
        });
        self.doc.folders.last_mut().unwrap()
    }

    fn persist(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory at {}", parent.display()))?;
        }

        let mut file = AtomicWriteFile::open(&self.path).with_context(|| {
            format!("Failed to open atomic write file at {}", self.path.display())
        })?;

        serde_json::to_writer_pretty(&mut file, &self.doc)
            .context("Failed to serialize bookmark store")?;

        file.commit().context("Failed to save bookmark store")?;

        Ok(())
    }
}

impl BookmarkSink for BookmarkStore {
    /// Create-if-absent, keyed by URL within the folder.
    fn ensure(&mut self, folder: &str, url: &str, label: &str) -> Result<()> {
        let folder = self.folder_mut(folder);
        if folder.entries.iter().any(|e| e.url == url) {
            return Ok(());
        }
        folder.entries.push(BookmarkEntry {
            url: url.to_string(),
            label: label.to_string(),
            added_at: Utc::now(),
        });
        self.persist()
    }

    /// Remove-if-present, scoped to `folder`: a matching URL in any other
    /// folder is never touched.
    fn remove_if_present(&mut self, folder: &str, url: &str) -> Result<()> {
        let Some(folder) = self.doc.folders.iter_mut().find(|f| f.name == folder) else {
            return Ok(());
        };
        let before = folder.entries.len();
        folder.entries.retain(|e| e.url != url);
        if folder.entries.len() != before {
            self.persist()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const PR_URL: &str = "https://github.com/acme/widgets/pull/1";

    #[test]
    fn test_open_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let store = BookmarkStore::open(&dir.path().join("bookmarks.json")).unwrap();
        assert!(store.doc.folders.is_empty());
    }

    #[test]
    fn test_ensure_creates_once() {
        let dir = tempdir().unwrap();
        let mut store = BookmarkStore::open(&dir.path().join("bookmarks.json")).unwrap();

        store.ensure("Pull Requests", PR_URL, "[widgets] PR one").unwrap();
        store.ensure("Pull Requests", PR_URL, "[widgets] PR one").unwrap();

        assert_eq!(store.entries("Pull Requests").unwrap().len(), 1);
    }

    #[test]
    fn test_ensure_folder_is_idempotent() {
        let dir = tempdir().unwrap();
        let mut store = BookmarkStore::open(&dir.path().join("bookmarks.json")).unwrap();

        store.ensure_folder("Pull Requests").unwrap();
        store.ensure_folder("Pull Requests").unwrap();

        assert_eq!(store.doc.folders.len(), 1);
    }

    #[test]
    fn test_remove_is_scoped_to_folder() {
        let dir = tempdir().unwrap();
        let mut store = BookmarkStore::open(&dir.path().join("bookmarks.json")).unwrap();

        // Same URL bookmarked in two folders
        store.ensure("Pull Requests", PR_URL, "label").unwrap();
        store.ensure("Reading List", PR_URL, "label").unwrap();

        store.remove_if_present("Pull Requests", PR_URL).unwrap();

        assert!(store.entries("Pull Requests").unwrap().is_empty());
        // The other folder's bookmark survives
        assert_eq!(store.entries("Reading List").unwrap().len(), 1);
    }

    #[test]
    fn test_remove_missing_is_a_noop() {
        let dir = tempdir().unwrap();
        let mut store = BookmarkStore::open(&dir.path().join("bookmarks.json")).unwrap();

        store.remove_if_present("Pull Requests", PR_URL).unwrap();
        store.ensure_folder("Pull Requests").unwrap();
        store.remove_if_present("Pull Requests", PR_URL).unwrap();

        assert!(store.entries("Pull Requests").unwrap().is_empty());
    }

    #[test]
    fn test_mutations_persist_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bookmarks.json");

        let mut store = BookmarkStore::open(&path).unwrap();
        store.ensure("Pull Requests", PR_URL, "[widgets] PR one").unwrap();
        drop(store);

        let reopened = BookmarkStore::open(&path).unwrap();
        let entries = reopened.entries("Pull Requests").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].url, PR_URL);
        assert_eq!(entries[0].label, "[widgets] PR one");
    }
}
