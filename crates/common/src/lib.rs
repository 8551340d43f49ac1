//! Shared types for the copydesk content service: page identifiers, roles,
//! workflow statuses, page metadata, and the persisted user/session records.
//!
//! # Invariants
//! - Page ids and usernames are normalized at construction, never at use sites.
//! - Persisted field names are camelCase to match the service contract.

pub mod types;

pub use types::{
    PageId, PageIdError, PageMeta, PageStatus, Role, Session, User, WorkflowStatus,
    normalize_username,
};

pub fn crate_info() -> &'static str {
    "copydesk-common v0.1.0"
}
