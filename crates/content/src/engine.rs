//! The content engine and its workflow state machine.
//!
//! On-disk layout inside the content root:
//! ```text
//! pages/<id>/schema.json  - field definitions, written once at create
//! pages/<id>/content.json - live document with the reserved _meta block
//! templates/<name>.json   - named schema templates for create
//! revisions/<id>.json     - per-page history, owned by the revision log
//! ```
//!
//! A page with no content file is nonexistent for content operations, even
//! if a schema file survives. Concurrent saves to one page are
//! last-writer-wins; this core is single-process and single-user by design,
//! and a multi-writer port must serialize writes per page.

use chrono::{DateTime, Utc};
use copydesk_audit::AuditEntry;
use copydesk_common::{PageId, PageIdError, PageMeta, PageStatus, WorkflowStatus};
use copydesk_revisions::{Revision, RevisionError, RevisionLog};
use copydesk_store::{RecordStore, StoreError};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::path::PathBuf;

use crate::schema::resolve_schema;

/// Errors from content operations.
#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    #[error("page {0} already exists")]
    Conflict(PageId),
    #[error("Content not found")]
    NotFound,
    #[error("content must be a JSON object")]
    InvalidContent,
    #[error(transparent)]
    Page(#[from] PageIdError),
    #[error(transparent)]
    Revision(#[from] RevisionError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// How a save should affect the page's status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveMode {
    /// Force both statuses back to draft.
    Draft,
    /// Preserve the prior status (first save defaults to draft).
    #[default]
    Live,
}

/// Publish or unpublish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublishAction {
    Publish,
    Unpublish,
}

/// Per-item outcome of a bulk publish.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkResult {
    pub page_id: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BulkResult {
    fn ok(page_id: &str) -> Self {
        Self {
            page_id: page_id.to_string(),
            ok: true,
            error: None,
        }
    }

    fn fail(page_id: &str, error: impl Into<String>) -> Self {
        Self {
            page_id: page_id.to_string(),
            ok: false,
            error: Some(error.into()),
        }
    }
}

/// One page of a listing plus the total count for pagination.
#[derive(Debug, Clone, Serialize)]
pub struct PageList {
    pub total: usize,
    pub pages: Vec<Value>,
}

/// Owns the page tree and all page/revision writes.
pub struct ContentEngine {
    root: PathBuf,
    revisions: RevisionLog,
}

impl ContentEngine {
    /// Open or create the content tree at the given root.
    pub fn open(root: impl Into<PathBuf>, revision_cap: usize) -> Result<Self, ContentError> {
        let root = root.into();
        std::fs::create_dir_all(root.join("pages"))?;
        std::fs::create_dir_all(root.join("templates"))?;
        let revisions = RevisionLog::open(root.join("revisions"), revision_cap)?;
        Ok(Self { root, revisions })
    }

    pub fn templates_dir(&self) -> PathBuf {
        self.root.join("templates")
    }

    /// Whether the page exists for content operations.
    pub fn exists(&self, id: &PageId) -> bool {
        self.content_path(id).exists()
    }

    /// Create a new page: schema written once, fresh draft metadata, one
    /// "created" revision. `Conflict` if the page directory already exists.
    pub fn create(
        &self,
        store: &mut RecordStore,
        id: &PageId,
        schema: Option<Value>,
        template: Option<&str>,
        title: Option<&str>,
        actor: &str,
    ) -> Result<Value, ContentError> {
        let dir = self.page_dir(id);
        if dir.exists() {
            return Err(ContentError::Conflict(id.clone()));
        }

        let schema_doc = resolve_schema(&self.templates_dir(), schema, template, title)?;
        std::fs::create_dir_all(&dir)?;
        serde_json::to_writer_pretty(
            std::fs::File::create(self.schema_path(id))?,
            &schema_doc,
        )?;

        let now = Utc::now();
        let mut doc = json!({});
        if let Some(title) = title {
            doc["title"] = json!(title);
        }
        set_meta(&mut doc, &PageMeta::new(actor, now))?;
        self.write_content(id, &doc)?;

        self.revisions
            .append(id, doc.clone(), "Page created", actor)?;
        self.audit(store, actor, "page.create", json!({ "pageId": id.as_str() }))?;
        tracing::info!(page = %id, "page created");
        Ok(doc)
    }

    /// Replace a page's document, carrying the `_meta` block forward.
    ///
    /// Creator fields are preserved, modification fields restamped. A draft
    /// save forces both statuses to draft; a live save preserves the prior
    /// status (draft on first save). Upserts if the page had no content.
    pub fn save(
        &self,
        store: &mut RecordStore,
        id: &PageId,
        new_content: Value,
        mode: SaveMode,
        message: &str,
        actor: &str,
    ) -> Result<Value, ContentError> {
        let now = Utc::now();
        let mut meta = match self.read_content(id)? {
            Some(existing) => meta_of(&existing).unwrap_or_else(|| PageMeta::new(actor, now)),
            None => PageMeta::new(actor, now),
        };
        meta.touch(actor, now);
        if mode == SaveMode::Draft {
            meta.status = PageStatus::Draft;
            meta.workflow_status = WorkflowStatus::Draft;
        }

        let mut doc = new_content;
        if !doc.is_object() {
            return Err(ContentError::InvalidContent);
        }
        set_meta(&mut doc, &meta)?;
        self.write_content(id, &doc)?;

        self.revisions.append(id, doc.clone(), message, actor)?;
        self.audit(
            store,
            actor,
            "page.save",
            json!({ "pageId": id.as_str(), "saveAs": if mode == SaveMode::Draft { "draft" } else { "live" } }),
        )?;
        tracing::debug!(page = %id, "page saved");
        Ok(doc)
    }

    /// Publish or unpublish: sets both the coarse status and the workflow
    /// stage, restamps metadata, appends a revision.
    pub fn publish(
        &self,
        store: &mut RecordStore,
        id: &PageId,
        action: PublishAction,
        actor: &str,
    ) -> Result<Value, ContentError> {
        let mut doc = self.read_content(id)?.ok_or(ContentError::NotFound)?;
        let now = Utc::now();
        let mut meta = meta_of(&doc).unwrap_or_else(|| PageMeta::new(actor, now));
        meta.touch(actor, now);
        let message = match action {
            PublishAction::Publish => {
                meta.status = PageStatus::Published;
                meta.workflow_status = WorkflowStatus::Published;
                "Published"
            }
            PublishAction::Unpublish => {
                meta.status = PageStatus::Draft;
                meta.workflow_status = WorkflowStatus::Draft;
                "Unpublished"
            }
        };
        set_meta(&mut doc, &meta)?;
        self.write_content(id, &doc)?;

        self.revisions.append(id, doc.clone(), message, actor)?;
        self.audit(
            store,
            actor,
            "page.publish",
            json!({ "pageId": id.as_str(), "action": message.to_lowercase() }),
        )?;
        tracing::info!(page = %id, action = message, "publish state changed");
        Ok(doc)
    }

    /// Override the workflow stage without touching the coarse status.
    ///
    /// `scheduled_for` is stored alongside a `scheduled` stage and cleared
    /// when the page moves to any other stage.
    pub fn set_workflow_status(
        &self,
        store: &mut RecordStore,
        id: &PageId,
        status: WorkflowStatus,
        scheduled_for: Option<DateTime<Utc>>,
        actor: &str,
    ) -> Result<Value, ContentError> {
        let mut doc = self.read_content(id)?.ok_or(ContentError::NotFound)?;
        let now = Utc::now();
        let mut meta = meta_of(&doc).unwrap_or_else(|| PageMeta::new(actor, now));
        meta.touch(actor, now);
        meta.workflow_status = status;
        meta.scheduled_for = match status {
            WorkflowStatus::Scheduled => scheduled_for.or(meta.scheduled_for),
            _ => None,
        };
        set_meta(&mut doc, &meta)?;
        self.write_content(id, &doc)?;

        self.audit(
            store,
            actor,
            "page.workflow",
            json!({ "pageId": id.as_str(), "status": status }),
        )?;
        Ok(doc)
    }

    /// The delete-as-reset: content becomes an empty document with fresh
    /// draft metadata stamped to the acting user. Schema and revision
    /// history are untouched; recovery is only possible via rollback.
    pub fn reset_content(
        &self,
        store: &mut RecordStore,
        id: &PageId,
        actor: &str,
    ) -> Result<Value, ContentError> {
        if !self.exists(id) {
            return Err(ContentError::NotFound);
        }
        let mut doc = json!({});
        set_meta(&mut doc, &PageMeta::new(actor, Utc::now()))?;
        self.write_content(id, &doc)?;

        self.revisions
            .append(id, doc.clone(), "Content reset", actor)?;
        self.audit(store, actor, "page.reset", json!({ "pageId": id.as_str() }))?;
        tracing::info!(page = %id, "content reset");
        Ok(doc)
    }

    /// Restore a revision's snapshot as the live content and append a new
    /// revision recording the rollback. Existing history is never rewritten.
    pub fn rollback(
        &self,
        store: &mut RecordStore,
        id: &PageId,
        revision_id: &str,
        actor: &str,
    ) -> Result<Revision, ContentError> {
        let revision = self.revisions.get(id, revision_id)?;
        self.write_content(id, &revision.snapshot)?;

        let rollback = self.revisions.append(
            id,
            revision.snapshot.clone(),
            &format!("Rolled back to revision {revision_id}"),
            actor,
        )?;
        self.audit(
            store,
            actor,
            "page.rollback",
            json!({ "pageId": id.as_str(), "revisionId": revision_id }),
        )?;
        tracing::info!(page = %id, revision = revision_id, "rolled back");
        Ok(rollback)
    }

    /// Apply publish/unpublish to each id independently. One item's failure
    /// is recorded in its result and never aborts or rolls back siblings.
    /// `dry_run` checks eligibility without writing.
    pub fn bulk_publish(
        &self,
        store: &mut RecordStore,
        page_ids: &[String],
        action: PublishAction,
        dry_run: bool,
        actor: &str,
    ) -> Vec<BulkResult> {
        page_ids
            .iter()
            .map(|raw| {
                let id = match PageId::new(raw) {
                    Ok(id) => id,
                    Err(e) => return BulkResult::fail(raw, e.to_string()),
                };
                if !self.exists(&id) {
                    return BulkResult::fail(raw, "Content not found");
                }
                if dry_run {
                    return BulkResult::ok(raw);
                }
                match self.publish(store, &id, action, actor) {
                    Ok(_) => BulkResult::ok(raw),
                    Err(e) => BulkResult::fail(raw, e.to_string()),
                }
            })
            .collect()
    }

    /// Publish every page whose workflow stage is `scheduled` with a due
    /// `scheduled_for`. Returns the ids that were published.
    pub fn run_scheduled_publish(
        &self,
        store: &mut RecordStore,
        actor: &str,
    ) -> Result<Vec<String>, ContentError> {
        let now = Utc::now();
        let mut published = Vec::new();
        for id in self.page_ids()? {
            let Some(doc) = self.read_content(&id)? else {
                continue;
            };
            let Some(meta) = meta_of(&doc) else {
                continue;
            };
            let due = meta.workflow_status == WorkflowStatus::Scheduled
                && meta.scheduled_for.is_some_and(|t| t <= now);
            if due {
                self.publish(store, &id, PublishAction::Publish, actor)?;
                published.push(id.to_string());
            }
        }
        self.audit(
            store,
            actor,
            "page.scheduled_sweep",
            json!({ "published": published }),
        )?;
        tracing::info!(count = published.len(), "scheduled publish sweep");
        Ok(published)
    }

    /// Current content document, or `NotFound` if the page has no content.
    pub fn get(&self, id: &PageId) -> Result<Value, ContentError> {
        self.read_content(id)?.ok_or(ContentError::NotFound)
    }

    /// Deterministic page listing with pagination. The minimal projection
    /// carries only the id, title, and `_meta`.
    pub fn list(&self, offset: usize, limit: usize, minimal: bool) -> Result<PageList, ContentError> {
        let mut docs = Vec::new();
        for id in self.page_ids()? {
            if let Some(doc) = self.read_content(&id)? {
                docs.push((id, doc));
            }
        }
        let total = docs.len();
        let pages = docs
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|(id, doc)| {
                if minimal {
                    json!({
                        "pageId": id.as_str(),
                        "title": doc.get("title").cloned().unwrap_or(Value::Null),
                        "_meta": doc.get("_meta").cloned().unwrap_or(Value::Null),
                    })
                } else {
                    let mut full = doc;
                    full["pageId"] = json!(id.as_str());
                    full
                }
            })
            .collect();
        Ok(PageList { total, pages })
    }

    /// Revision history, newest first, bounded by `limit`.
    pub fn list_revisions(
        &self,
        id: &PageId,
        limit: usize,
    ) -> Result<Vec<Revision>, ContentError> {
        Ok(self.revisions.list(id, limit)?)
    }

    /// Fetch one revision by id.
    pub fn revision(&self, id: &PageId, revision_id: &str) -> Result<Revision, ContentError> {
        Ok(self.revisions.get(id, revision_id)?)
    }

    fn page_dir(&self, id: &PageId) -> PathBuf {
        self.root.join("pages").join(id.as_str())
    }

    fn content_path(&self, id: &PageId) -> PathBuf {
        self.page_dir(id).join("content.json")
    }

    fn schema_path(&self, id: &PageId) -> PathBuf {
        self.page_dir(id).join("schema.json")
    }

    fn page_ids(&self) -> Result<Vec<PageId>, ContentError> {
        let mut ids = Vec::new();
        for entry in std::fs::read_dir(self.root.join("pages"))? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str()
                && let Ok(id) = PageId::new(name)
            {
                ids.push(id);
            }
        }
        ids.sort();
        Ok(ids)
    }

    fn read_content(&self, id: &PageId) -> Result<Option<Value>, ContentError> {
        let path = self.content_path(id);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_reader(std::fs::File::open(path)?)?))
    }

    fn write_content(&self, id: &PageId, doc: &Value) -> Result<(), ContentError> {
        std::fs::create_dir_all(self.page_dir(id))?;
        serde_json::to_writer_pretty(std::fs::File::create(self.content_path(id))?, doc)?;
        Ok(())
    }

    fn audit(
        &self,
        store: &mut RecordStore,
        actor: &str,
        action: &str,
        details: Value,
    ) -> Result<(), ContentError> {
        store.record(AuditEntry::new(actor, action, details))?;
        Ok(())
    }
}

/// Parse the `_meta` block out of a document, if present and well-formed.
fn meta_of(doc: &Value) -> Option<PageMeta> {
    doc.get("_meta")
        .and_then(|m| serde_json::from_value(m.clone()).ok())
}

fn set_meta(doc: &mut Value, meta: &PageMeta) -> Result<(), ContentError> {
    match doc {
        Value::Object(map) => {
            map.insert("_meta".to_string(), serde_json::to_value(meta)?);
            Ok(())
        }
        _ => Err(ContentError::InvalidContent),
    }
}
