use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Default retention cap for the audit journal.
pub const DEFAULT_AUDIT_CAP: usize = 5000;

/// One recorded action: who did what, when, and with which parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub username: String,
    pub action: String,
    pub details: Value,
}

impl AuditEntry {
    /// Build an entry stamped with the current time.
    pub fn new(username: &str, action: &str, details: Value) -> Self {
        Self {
            timestamp: Utc::now(),
            username: username.to_string(),
            action: action.to_string(),
            details,
        }
    }
}

/// Append-only journal with a fixed retention cap.
///
/// Entries are kept in insertion order; once the cap is exceeded the oldest
/// entries are dropped. Queries read newest-first.
#[derive(Debug, Clone)]
pub struct AuditLog {
    entries: Vec<AuditEntry>,
    cap: usize,
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::with_cap(DEFAULT_AUDIT_CAP)
    }
}

impl AuditLog {
    /// Create an empty journal with the given cap.
    pub fn with_cap(cap: usize) -> Self {
        Self {
            entries: Vec::new(),
            cap,
        }
    }

    /// Rebuild a journal from persisted entries, applying the cap.
    pub fn from_entries(mut entries: Vec<AuditEntry>, cap: usize) -> Self {
        if entries.len() > cap {
            let excess = entries.len() - cap;
            entries.drain(..excess);
        }
        Self { entries, cap }
    }

    /// Append an entry, evicting the oldest if the cap is exceeded.
    pub fn append(&mut self, entry: AuditEntry) {
        self.entries.push(entry);
        if self.entries.len() > self.cap {
            let excess = self.entries.len() - self.cap;
            self.entries.drain(..excess);
        }
    }

    /// The most recent `limit` entries, newest first.
    pub fn recent(&self, limit: usize) -> Vec<AuditEntry> {
        self.entries.iter().rev().take(limit).cloned().collect()
    }

    /// All entries in insertion order (oldest first).
    pub fn entries(&self) -> &[AuditEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
