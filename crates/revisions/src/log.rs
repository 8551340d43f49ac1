//! File-backed revision lists.
//!
//! Layout inside the revisions directory:
//! ```text
//! <page-id>.json - full revision list for one page, newest first
//! ```
//!
//! Each page's history is persisted independently of its live content, so a
//! corrupted or reset content file never costs the page its history.

use chrono::{DateTime, Utc};
use copydesk_common::PageId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Default per-page retention cap.
pub const DEFAULT_REVISION_CAP: usize = 50;

/// An immutable snapshot of a page's content at one point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Revision {
    pub id: String,
    pub message: String,
    pub author: String,
    pub timestamp: DateTime<Utc>,
    pub snapshot: Value,
}

/// Errors from revision log operations.
#[derive(Debug, thiserror::Error)]
pub enum RevisionError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("revision {revision_id} not found for page {page_id}")]
    NotFound { page_id: String, revision_id: String },
}

/// Capped, newest-first revision log with one file per page.
pub struct RevisionLog {
    root: PathBuf,
    cap: usize,
}

impl RevisionLog {
    /// Open or create a revision log rooted at the given directory.
    pub fn open(path: impl AsRef<Path>, cap: usize) -> Result<Self, RevisionError> {
        let root = path.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root, cap })
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    /// Append a snapshot as a new revision: generate an id, prepend,
    /// truncate to the cap, persist the page's list.
    pub fn append(
        &self,
        page_id: &PageId,
        snapshot: Value,
        message: &str,
        author: &str,
    ) -> Result<Revision, RevisionError> {
        let mut list = self.load(page_id)?;
        let revision = Revision {
            id: Uuid::new_v4().simple().to_string(),
            message: message.to_string(),
            author: author.to_string(),
            timestamp: Utc::now(),
            snapshot,
        };
        list.insert(0, revision.clone());
        list.truncate(self.cap);
        self.save(page_id, &list)?;
        tracing::debug!(page = %page_id, revision = %revision.id, "revision appended");
        Ok(revision)
    }

    /// The most recent revisions for a page, newest first, bounded by `limit`.
    pub fn list(&self, page_id: &PageId, limit: usize) -> Result<Vec<Revision>, RevisionError> {
        let mut list = self.load(page_id)?;
        list.truncate(limit);
        Ok(list)
    }

    /// Fetch one revision by id.
    pub fn get(&self, page_id: &PageId, revision_id: &str) -> Result<Revision, RevisionError> {
        self.load(page_id)?
            .into_iter()
            .find(|r| r.id == revision_id)
            .ok_or_else(|| RevisionError::NotFound {
                page_id: page_id.to_string(),
                revision_id: revision_id.to_string(),
            })
    }

    fn path(&self, page_id: &PageId) -> PathBuf {
        self.root.join(format!("{page_id}.json"))
    }

    fn load(&self, page_id: &PageId) -> Result<Vec<Revision>, RevisionError> {
        let path = self.path(page_id);
        if path.exists() {
            Ok(serde_json::from_reader(std::fs::File::open(path)?)?)
        } else {
            Ok(Vec::new())
        }
    }

    fn save(&self, page_id: &PageId, list: &[Revision]) -> Result<(), RevisionError> {
        serde_json::to_writer_pretty(std::fs::File::create(self.path(page_id))?, list)?;
        Ok(())
    }
}
