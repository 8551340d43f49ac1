use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Error raised when a page identifier normalizes to nothing.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PageIdError {
    #[error("page id {0:?} is empty after normalization")]
    Empty(String),
}

/// Normalized page identifier: lowercase, restricted to `[a-z0-9_-]`.
///
/// Construction is the only place normalization happens; everything holding
/// a `PageId` can rely on it being a valid map key and file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct PageId(String);

impl PageId {
    /// Normalize a raw identifier. Uppercase folds to lowercase, anything
    /// outside `[a-z0-9_-]` is dropped; an empty result is an error.
    pub fn new(raw: &str) -> Result<Self, PageIdError> {
        let normalized: String = raw
            .to_lowercase()
            .chars()
            .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '_' || *c == '-')
            .collect();
        if normalized.is_empty() {
            return Err(PageIdError::Empty(raw.to_string()));
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for PageId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        PageId::new(&raw).map_err(serde::de::Error::custom)
    }
}

/// Normalize a username for use as a map key: trimmed and lowercased.
pub fn normalize_username(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Account role. Sessions snapshot the role at login; changing a user's role
/// does not retroactively change their live sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Editor,
    Contributor,
}

/// Coarse published/draft projection of a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageStatus {
    Draft,
    Published,
}

/// Editorial stage of a page, finer-grained than [`PageStatus`].
///
/// Normal progression is draft → in_review → approved → scheduled →
/// published, but any stage may drop back to draft or jump straight to
/// published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Draft,
    InReview,
    Approved,
    Scheduled,
    Published,
}

/// The reserved `_meta` block carried by every content document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub created_by: String,
    pub created: DateTime<Utc>,
    pub modified_by: String,
    pub last_modified: DateTime<Utc>,
    pub status: PageStatus,
    pub workflow_status: WorkflowStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_for: Option<DateTime<Utc>>,
}

impl PageMeta {
    /// Fresh metadata for a newly created (or reset) page: both statuses
    /// draft, creator and modifier stamped to the acting user.
    pub fn new(creator: &str, now: DateTime<Utc>) -> Self {
        Self {
            created_by: creator.to_string(),
            created: now,
            modified_by: creator.to_string(),
            last_modified: now,
            status: PageStatus::Draft,
            workflow_status: WorkflowStatus::Draft,
            scheduled_for: None,
        }
    }

    /// Restamp the modification fields, preserving creator and creation time.
    pub fn touch(&mut self, actor: &str, now: DateTime<Utc>) {
        self.modified_by = actor.to_string();
        self.last_modified = now;
    }
}

/// A user account record as persisted in the durable store.
///
/// The password secret is an opaque comparison value; the local core stores
/// it in plaintext and leaves real hashing to the production auth service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub username: String,
    pub role: Role,
    pub password_secret: String,
    pub created_at: DateTime<Utc>,
}

/// A bearer-token session record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub token: String,
    pub username: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// A session is valid iff it has not reached its expiry deadline.
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn page_id_lowercases_and_strips() {
        let id = PageId::new("Lunch Menu!").unwrap();
        assert_eq!(id.as_str(), "lunchmenu");

        let id = PageId::new("faq_2024-v2").unwrap();
        assert_eq!(id.as_str(), "faq_2024-v2");
    }

    #[test]
    fn page_id_empty_after_normalization_is_error() {
        assert!(PageId::new("").is_err());
        assert!(PageId::new("!!!").is_err());
        assert!(PageId::new("   ").is_err());
    }

    #[test]
    fn page_id_serializes_transparently() {
        let id = PageId::new("menu").unwrap();
        assert_eq!(serde_json::to_value(&id).unwrap(), serde_json::json!("menu"));
    }

    #[test]
    fn username_normalization() {
        assert_eq!(normalize_username("  Alice "), "alice");
    }

    #[test]
    fn meta_serializes_camel_case() {
        let meta = PageMeta::new("alice", Utc::now());
        let value = serde_json::to_value(&meta).unwrap();
        assert!(value.get("createdBy").is_some());
        assert!(value.get("lastModified").is_some());
        assert_eq!(value["workflowStatus"], "draft");
        // scheduledFor is omitted when unset
        assert!(value.get("scheduledFor").is_none());
    }

    #[test]
    fn workflow_status_wire_names() {
        let value = serde_json::to_value(WorkflowStatus::InReview).unwrap();
        assert_eq!(value, serde_json::json!("in_review"));
    }

    #[test]
    fn session_validity_is_deadline_based() {
        let now = Utc::now();
        let session = Session {
            token: "t".into(),
            username: "alice".into(),
            role: Role::Editor,
            created_at: now - Duration::hours(13),
            expires_at: now - Duration::hours(1),
        };
        assert!(!session.is_valid(now));
        assert!(session.is_valid(now - Duration::hours(2)));
    }
}
