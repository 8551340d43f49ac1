//! File-backed persistence for shared records.
//!
//! Layout inside the store directory:
//! ```text
//! users.json      - user accounts keyed by normalized username
//! sessions.json   - bearer-token sessions keyed by token
//! watchlists.json - per-user sets of watched page ids
//! audit.json      - audit journal entries, oldest first
//! ```

use chrono::{DateTime, Utc};
use copydesk_audit::{AuditEntry, AuditLog, DEFAULT_AUDIT_CAP};
use copydesk_common::{Session, User};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// Errors from record store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// The single persisted source of truth for user, session, watchlist, and
/// audit collections.
///
/// Uses `BTreeMap` throughout so iteration order (and the JSON written to
/// disk) is deterministic.
pub struct RecordStore {
    root: PathBuf,
    users: BTreeMap<String, User>,
    sessions: BTreeMap<String, Session>,
    watchlists: BTreeMap<String, BTreeSet<String>>,
    audit: AuditLog,
}

impl RecordStore {
    /// Open or create a record store at the given directory.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::open_with_audit_cap(path, DEFAULT_AUDIT_CAP)
    }

    /// Open with an explicit audit retention cap.
    pub fn open_with_audit_cap(path: impl AsRef<Path>, cap: usize) -> Result<Self, StoreError> {
        let root = path.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;

        let users: BTreeMap<String, User> = load_or_default(&root.join("users.json"))?;
        let sessions: BTreeMap<String, Session> = load_or_default(&root.join("sessions.json"))?;
        let watchlists: BTreeMap<String, BTreeSet<String>> =
            load_or_default(&root.join("watchlists.json"))?;
        let entries: Vec<AuditEntry> = load_or_default(&root.join("audit.json"))?;

        // Expired sessions are dropped at load. Validation filters lazily as
        // well, so a stale file can never yield a valid session.
        let now = Utc::now();
        let live = sessions.len();
        let sessions: BTreeMap<String, Session> = sessions
            .into_iter()
            .filter(|(_, s)| s.is_valid(now))
            .collect();
        if sessions.len() < live {
            tracing::debug!(dropped = live - sessions.len(), "expired sessions dropped at load");
        }

        Ok(Self {
            root,
            users,
            sessions,
            watchlists,
            audit: AuditLog::from_entries(entries, cap),
        })
    }

    /// Rewrite every collection to disk.
    pub fn flush(&self) -> Result<(), StoreError> {
        save(&self.root.join("users.json"), &self.users)?;
        save(&self.root.join("sessions.json"), &self.sessions)?;
        save(&self.root.join("watchlists.json"), &self.watchlists)?;
        save(&self.root.join("audit.json"), self.audit.entries())?;
        tracing::debug!(root = %self.root.display(), "record store flushed");
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    // --- users ---

    pub fn user(&self, username: &str) -> Option<&User> {
        self.users.get(username)
    }

    pub fn upsert_user(&mut self, user: User) {
        self.users.insert(user.username.clone(), user);
    }

    pub fn remove_user(&mut self, username: &str) -> Option<User> {
        self.users.remove(username)
    }

    pub fn users(&self) -> impl Iterator<Item = &User> {
        self.users.values()
    }

    // --- sessions ---

    pub fn session(&self, token: &str) -> Option<&Session> {
        self.sessions.get(token)
    }

    pub fn insert_session(&mut self, session: Session) {
        self.sessions.insert(session.token.clone(), session);
    }

    pub fn remove_session(&mut self, token: &str) -> Option<Session> {
        self.sessions.remove(token)
    }

    /// Remove every session belonging to one user. Returns how many went.
    pub fn remove_sessions_for(&mut self, username: &str) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, s| s.username != username);
        before - self.sessions.len()
    }

    /// Remove sessions past their expiry deadline. Returns how many went.
    pub fn remove_expired_sessions(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, s| s.is_valid(now));
        before - self.sessions.len()
    }

    pub fn sessions(&self) -> impl Iterator<Item = &Session> {
        self.sessions.values()
    }

    // --- watchlists ---

    /// Pages watched by one user, sorted.
    pub fn watchlist(&self, username: &str) -> Vec<String> {
        self.watchlists
            .get(username)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Add a page to a user's watchlist. Returns false if already present.
    pub fn watch(&mut self, username: &str, page_id: &str) -> bool {
        self.watchlists
            .entry(username.to_string())
            .or_default()
            .insert(page_id.to_string())
    }

    /// Remove a page from a user's watchlist. Returns false if absent.
    pub fn unwatch(&mut self, username: &str, page_id: &str) -> bool {
        match self.watchlists.get_mut(username) {
            Some(set) => set.remove(page_id),
            None => false,
        }
    }

    // --- audit ---

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    /// Append an audit entry and flush. Every mutating action in the service
    /// lands here before its call returns.
    pub fn record(&mut self, entry: AuditEntry) -> Result<(), StoreError> {
        self.audit.append(entry);
        self.flush()
    }
}

fn load_or_default<T: DeserializeOwned + Default>(path: &Path) -> Result<T, StoreError> {
    if path.exists() {
        Ok(serde_json::from_reader(std::fs::File::open(path)?)?)
    } else {
        Ok(T::default())
    }
}

fn save<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StoreError> {
    serde_json::to_writer_pretty(std::fs::File::create(path)?, value)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use copydesk_common::Role;
    use serde_json::json;

    fn user(name: &str) -> User {
        User {
            username: name.to_string(),
            role: Role::Editor,
            password_secret: "secret".to_string(),
            created_at: Utc::now(),
        }
    }

    fn session(token: &str, username: &str, expires_at: DateTime<Utc>) -> Session {
        Session {
            token: token.to_string(),
            username: username.to_string(),
            role: Role::Editor,
            created_at: Utc::now(),
            expires_at,
        }
    }

    #[test]
    fn open_creates_directory_and_starts_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let store = RecordStore::open(tmp.path().join("records")).unwrap();
        assert!(store.root().is_dir());
        assert_eq!(store.users().count(), 0);
        assert!(store.audit().is_empty());
    }

    #[test]
    fn flush_and_reopen_round_trips() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("records");

        {
            let mut store = RecordStore::open(&path).unwrap();
            store.upsert_user(user("alice"));
            store.watch("alice", "menu");
            store
                .record(AuditEntry::new("alice", "user.create", json!({})))
                .unwrap();
        }

        let store = RecordStore::open(&path).unwrap();
        assert!(store.user("alice").is_some());
        assert_eq!(store.watchlist("alice"), vec!["menu".to_string()]);
        assert_eq!(store.audit().len(), 1);
    }

    #[test]
    fn expired_sessions_dropped_at_load() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("records");

        {
            let mut store = RecordStore::open(&path).unwrap();
            store.insert_session(session("live", "alice", Utc::now() + Duration::hours(1)));
            store.insert_session(session("stale", "alice", Utc::now() - Duration::hours(1)));
            store.flush().unwrap();
        }

        let store = RecordStore::open(&path).unwrap();
        assert!(store.session("live").is_some());
        assert!(store.session("stale").is_none());
    }

    #[test]
    fn remove_sessions_for_targets_one_user() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = RecordStore::open(tmp.path().join("records")).unwrap();
        let later = Utc::now() + Duration::hours(1);
        store.insert_session(session("t1", "alice", later));
        store.insert_session(session("t2", "alice", later));
        store.insert_session(session("t3", "bob", later));

        assert_eq!(store.remove_sessions_for("alice"), 2);
        assert!(store.session("t3").is_some());
    }

    #[test]
    fn watch_and_unwatch_are_set_semantics() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = RecordStore::open(tmp.path().join("records")).unwrap();
        assert!(store.watch("alice", "menu"));
        assert!(!store.watch("alice", "menu"));
        assert!(store.unwatch("alice", "menu"));
        assert!(!store.unwatch("alice", "menu"));
        assert!(store.watchlist("alice").is_empty());
    }
}
