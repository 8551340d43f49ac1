use chrono::{Duration, Utc};
use copydesk_audit::AuditEntry;
use copydesk_common::{Session, normalize_username};
use copydesk_store::{RecordStore, StoreError};
use serde_json::json;
use uuid::Uuid;

/// Default session lifetime.
pub const SESSION_TTL_HOURS: i64 = 12;

/// Errors from session operations.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("missing or expired session")]
    Unauthenticated,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Issues, validates, and revokes bearer-token sessions against an injected
/// record store.
pub struct SessionManager {
    ttl: Duration,
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new(Duration::hours(SESSION_TTL_HOURS))
    }
}

impl SessionManager {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl }
    }

    /// Check credentials and issue a session.
    ///
    /// Any mismatch, unknown username or wrong secret alike, is reported as
    /// the single `InvalidCredentials` error.
    pub fn authenticate(
        &self,
        store: &mut RecordStore,
        username: &str,
        password: &str,
    ) -> Result<Session, AuthError> {
        let username = normalize_username(username);
        let user = store.user(&username).ok_or(AuthError::InvalidCredentials)?;
        if user.password_secret != password {
            return Err(AuthError::InvalidCredentials);
        }

        let now = Utc::now();
        let session = Session {
            token: new_token(),
            username: username.clone(),
            role: user.role,
            created_at: now,
            expires_at: now + self.ttl,
        };
        store.insert_session(session.clone());
        store.record(AuditEntry::new(&username, "auth.login", json!({})))?;
        tracing::info!(user = %username, "session issued");
        Ok(session)
    }

    /// Look up a token. Absent or expired both mean `Unauthenticated`; an
    /// expired record may still sit in the store until swept, it is just
    /// never returned as valid.
    pub fn validate(&self, store: &RecordStore, token: &str) -> Result<Session, AuthError> {
        let session = store.session(token).ok_or(AuthError::Unauthenticated)?;
        if !session.is_valid(Utc::now()) {
            return Err(AuthError::Unauthenticated);
        }
        Ok(session.clone())
    }

    /// Remove a single session. Returns whether it existed.
    pub fn revoke(&self, store: &mut RecordStore, token: &str) -> Result<bool, AuthError> {
        let removed = store.remove_session(token).is_some();
        store.flush()?;
        Ok(removed)
    }

    /// Remove every session for one user (forced logout / admin removal).
    pub fn revoke_all(&self, store: &mut RecordStore, username: &str) -> Result<usize, AuthError> {
        let removed = store.remove_sessions_for(&normalize_username(username));
        store.flush()?;
        if removed > 0 {
            tracing::info!(user = %username, count = removed, "sessions revoked");
        }
        Ok(removed)
    }

    /// Drop expired sessions from the store. Optional cleanup; lazy filtering
    /// at validation is the correctness story.
    pub fn sweep_expired(&self, store: &mut RecordStore) -> Result<usize, AuthError> {
        let removed = store.remove_expired_sessions(Utc::now());
        if removed > 0 {
            store.flush()?;
        }
        Ok(removed)
    }
}

fn new_token() -> String {
    // Two v4 uuids back to back: 64 hex chars, 244 bits of randomness.
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use super::*;
    use copydesk_common::{Role, User};

    fn store_with_user(dir: &std::path::Path) -> RecordStore {
        let mut store = RecordStore::open(dir.join("records")).unwrap();
        store.upsert_user(User {
            username: "alice".into(),
            role: Role::Editor,
            password_secret: "open sesame".into(),
            created_at: Utc::now(),
        });
        store
    }

    #[test]
    fn authenticate_issues_valid_session() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = store_with_user(tmp.path());
        let manager = SessionManager::default();

        let session = manager
            .authenticate(&mut store, "  Alice ", "open sesame")
            .unwrap();
        assert_eq!(session.username, "alice");
        assert_eq!(session.role, Role::Editor);
        assert!(session.expires_at > Utc::now());

        let validated = manager.validate(&store, &session.token).unwrap();
        assert_eq!(validated.username, "alice");
    }

    #[test]
    fn bad_password_and_unknown_user_are_indistinguishable() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = store_with_user(tmp.path());
        let manager = SessionManager::default();

        let wrong = manager
            .authenticate(&mut store, "alice", "nope")
            .unwrap_err();
        let unknown = manager
            .authenticate(&mut store, "mallory", "nope")
            .unwrap_err();
        assert!(matches!(wrong, AuthError::InvalidCredentials));
        assert!(matches!(unknown, AuthError::InvalidCredentials));
    }

    #[test]
    fn expired_session_never_validates() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = store_with_user(tmp.path());
        let manager = SessionManager::new(Duration::hours(-1));

        // Negative TTL puts the deadline in the past at issuance.
        let session = manager
            .authenticate(&mut store, "alice", "open sesame")
            .unwrap();
        // Still present in the store, just never valid.
        assert!(store.session(&session.token).is_some());
        let err = manager.validate(&store, &session.token).unwrap_err();
        assert!(matches!(err, AuthError::Unauthenticated));
    }

    #[test]
    fn revoke_all_clears_only_that_user() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = store_with_user(tmp.path());
        store.upsert_user(User {
            username: "bob".into(),
            role: Role::Contributor,
            password_secret: "hunter2".into(),
            created_at: Utc::now(),
        });
        let manager = SessionManager::default();

        let a1 = manager
            .authenticate(&mut store, "alice", "open sesame")
            .unwrap();
        let a2 = manager
            .authenticate(&mut store, "alice", "open sesame")
            .unwrap();
        let b = manager.authenticate(&mut store, "bob", "hunter2").unwrap();

        assert_eq!(manager.revoke_all(&mut store, "alice").unwrap(), 2);
        assert!(manager.validate(&store, &a1.token).is_err());
        assert!(manager.validate(&store, &a2.token).is_err());
        assert!(manager.validate(&store, &b.token).is_ok());
    }

    #[test]
    fn sweep_removes_expired_records() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = store_with_user(tmp.path());
        let expired = SessionManager::new(Duration::hours(-1));
        let live = SessionManager::default();

        let stale = expired
            .authenticate(&mut store, "alice", "open sesame")
            .unwrap();
        let fresh = live
            .authenticate(&mut store, "alice", "open sesame")
            .unwrap();

        assert_eq!(live.sweep_expired(&mut store).unwrap(), 1);
        assert!(store.session(&stale.token).is_none());
        assert!(store.session(&fresh.token).is_some());
    }

    #[test]
    fn tokens_are_unique() {
        let a = new_token();
        let b = new_token();
        assert_ne!(a, b);
        assert_eq!(a.len(), 64);
    }
}
