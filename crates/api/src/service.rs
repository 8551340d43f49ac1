//! The service: owns the record store, session manager, and content engine,
//! and dispatches structured requests to them.

use chrono::{DateTime, Duration, Utc};
use copydesk_audit::AuditEntry;
use copydesk_common::{PageId, Role, Session, User, WorkflowStatus, normalize_username};
use copydesk_content::{ContentEngine, ContentError, PublishAction, SaveMode};
use copydesk_sessions::SessionManager;
use copydesk_store::{RecordStore, StoreError};
use serde_json::{Value, json};
use std::collections::BTreeMap;

use crate::config::ServiceConfig;
use crate::error::ApiError;
use crate::request::{Request, Response};

/// Errors while bringing the service up.
#[derive(Debug, thiserror::Error)]
pub enum ServiceInitError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Content(#[from] ContentError),
}

/// The assembled service. One instance per process; all state flows through
/// the injected store and engine rather than ambient globals.
pub struct Service {
    store: RecordStore,
    sessions: SessionManager,
    content: ContentEngine,
    page_size: usize,
}

impl Service {
    /// Open every persistent collection under the configured data directory.
    pub fn open(config: &ServiceConfig) -> Result<Self, ServiceInitError> {
        let store =
            RecordStore::open_with_audit_cap(config.data_dir.join("records"), config.audit_cap)?;
        let content = ContentEngine::open(config.data_dir.join("content"), config.revision_cap)?;
        let sessions = SessionManager::new(Duration::hours(config.session_ttl_hours));
        Ok(Self {
            store,
            sessions,
            content,
            page_size: config.page_size,
        })
    }

    /// Out-of-band account provisioning (first admin, test fixtures).
    /// Upserts without requiring a session and without an audit entry.
    pub fn bootstrap_user(
        &mut self,
        username: &str,
        password: &str,
        role: Role,
    ) -> Result<(), ServiceInitError> {
        self.store.upsert_user(User {
            username: normalize_username(username),
            role,
            password_secret: password.to_string(),
            created_at: Utc::now(),
        });
        self.store.flush()?;
        Ok(())
    }

    /// Run the scheduled-publish sweep outside of a request (cron, CLI).
    pub fn run_sweep(&mut self, actor: &str) -> Result<Vec<String>, ContentError> {
        self.content.run_scheduled_publish(&mut self.store, actor)
    }

    /// Dispatch one request, translating every failure into a structured
    /// error response.
    pub fn dispatch(&mut self, req: &Request) -> Response {
        match self.route(req) {
            Ok(body) => Response::ok(body),
            Err(err) => {
                if let ApiError::Internal(msg) = &err {
                    tracing::error!(error = %msg, method = %req.method, path = %req.path, "request failed");
                }
                Response::error(&err)
            }
        }
    }

    fn route(&mut self, req: &Request) -> Result<Value, ApiError> {
        let (segments, params) = req.route();

        if req.method == "POST" && segments == ["auth", "login"] {
            return self.login(&req.body);
        }

        // Everything else resolves a session first.
        let session = self.require_session(req)?;

        match (req.method.as_str(), segments.as_slice()) {
            ("POST", ["auth", "logout"]) => self.logout(&session),
            ("GET", ["auth", "session"]) => Ok(json!({
                "username": session.username,
                "role": session.role,
                "expiresAt": session.expires_at,
            })),

            ("GET", ["pages"]) => self.list_pages(&params),
            ("POST", ["pages"]) => self.create_page(&session, &req.body),
            ("POST", ["pages", "bulk-publish"]) => self.bulk_publish(&session, &req.body),
            ("POST", ["pages", "scheduled-publish"]) => self.scheduled_publish(&session),
            ("GET", ["pages", id]) => self.get_page(id),
            ("PUT", ["pages", id]) => self.save_page(&session, id, &req.body),
            ("DELETE", ["pages", id]) => self.reset_page(&session, id),
            ("POST", ["pages", id, "publish"]) => self.publish_page(&session, id, &req.body),
            ("POST", ["pages", id, "workflow"]) => self.set_workflow(&session, id, &req.body),
            ("GET", ["pages", id, "revisions"]) => self.list_revisions(id, &params),
            ("GET", ["pages", id, "diff"]) => self.diff_revisions(id, &params),
            ("POST", ["pages", id, "rollback"]) => self.rollback(&session, id, &req.body),

            ("GET", ["watchlist"]) => Ok(json!({
                "pages": self.store.watchlist(&session.username),
            })),
            ("PUT", ["watchlist", id]) => self.watch(&session, id, true),
            ("DELETE", ["watchlist", id]) => self.watch(&session, id, false),

            ("GET", ["audit"]) => self.audit_entries(&session, &params),

            ("GET", ["users"]) => self.list_users(&session),
            ("POST", ["users"]) => self.create_user(&session, &req.body),
            ("PATCH", ["users", name]) => self.patch_user(&session, name, &req.body),
            ("DELETE", ["users", name]) => self.delete_user(&session, name),

            ("GET", ["sessions"]) => self.list_sessions(&session),
            ("DELETE", ["sessions", "user", name]) => self.revoke_user_sessions(&session, name),
            ("DELETE", ["sessions", token]) => self.revoke_session(&session, token),

            (_, ["media", ..]) => Err(ApiError::Unsupported(
                "media upload is not supported by the local service".into(),
            )),
            _ => Err(ApiError::NotFound("no such route".into())),
        }
    }

    // --- auth ---

    fn require_session(&self, req: &Request) -> Result<Session, ApiError> {
        let token = req
            .token
            .as_deref()
            .ok_or_else(|| ApiError::Unauthenticated("missing session token".into()))?;
        Ok(self.sessions.validate(&self.store, token)?)
    }

    fn login(&mut self, body: &Value) -> Result<Value, ApiError> {
        let username = body_str(body, "username")?;
        let password = body_str(body, "password")?;
        let session = self
            .sessions
            .authenticate(&mut self.store, username, password)?;
        to_value(&session)
    }

    fn logout(&mut self, session: &Session) -> Result<Value, ApiError> {
        self.sessions.revoke(&mut self.store, &session.token)?;
        self.store
            .record(AuditEntry::new(&session.username, "auth.logout", json!({})))?;
        Ok(json!({ "ok": true }))
    }

    // --- pages ---

    fn list_pages(&self, params: &BTreeMap<&str, &str>) -> Result<Value, ApiError> {
        let offset = parse_usize(params, "offset")?.unwrap_or(0);
        let limit = parse_usize(params, "limit")?.unwrap_or(self.page_size);
        let minimal = matches!(params.get("minimal").copied(), Some("true") | Some("1"));
        to_value(&self.content.list(offset, limit, minimal)?)
    }

    fn create_page(&mut self, session: &Session, body: &Value) -> Result<Value, ApiError> {
        let id = parse_page_id(body_str(body, "pageId")?)?;
        let schema = match body.get("schema") {
            Some(Value::Null) | None => None,
            Some(schema) => Some(schema.clone()),
        };
        let template = opt_str(body, "template");
        let title = opt_str(body, "title");
        let doc = self.content.create(
            &mut self.store,
            &id,
            schema,
            template,
            title,
            &session.username,
        )?;
        Ok(json!({ "pageId": id.as_str(), "page": doc }))
    }

    fn get_page(&self, raw_id: &str) -> Result<Value, ApiError> {
        let id = parse_page_id(raw_id)?;
        Ok(self.content.get(&id)?)
    }

    /// An id that normalizes to nothing reads as an unknown page here, not a
    /// malformed request; the save contract reports it as not-found.
    fn save_page(&mut self, session: &Session, raw_id: &str, body: &Value) -> Result<Value, ApiError> {
        let id = PageId::new(raw_id)
            .map_err(|_| ApiError::NotFound("Content not found".into()))?;
        let content = body
            .get("content")
            .cloned()
            .ok_or_else(|| ApiError::missing_field("content"))?;
        let mode = match body.get("saveAs") {
            Some(Value::Null) | None => SaveMode::default(),
            Some(v) => serde_json::from_value(v.clone())
                .map_err(|_| ApiError::Validation("saveAs must be \"draft\" or \"live\"".into()))?,
        };
        let message = opt_str(body, "message").unwrap_or("Content updated");
        Ok(self.content.save(
            &mut self.store,
            &id,
            content,
            mode,
            message,
            &session.username,
        )?)
    }

    fn reset_page(&mut self, session: &Session, raw_id: &str) -> Result<Value, ApiError> {
        let id = parse_page_id(raw_id)?;
        Ok(self
            .content
            .reset_content(&mut self.store, &id, &session.username)?)
    }

    fn publish_page(&mut self, session: &Session, raw_id: &str, body: &Value) -> Result<Value, ApiError> {
        require_publisher(session)?;
        let id = parse_page_id(raw_id)?;
        let action = parse_action(body)?;
        Ok(self
            .content
            .publish(&mut self.store, &id, action, &session.username)?)
    }

    fn set_workflow(&mut self, session: &Session, raw_id: &str, body: &Value) -> Result<Value, ApiError> {
        require_publisher(session)?;
        let id = parse_page_id(raw_id)?;
        let status: WorkflowStatus = body
            .get("status")
            .cloned()
            .ok_or_else(|| ApiError::missing_field("status"))
            .and_then(|v| {
                serde_json::from_value(v)
                    .map_err(|_| ApiError::Validation("invalid workflow status".into()))
            })?;
        let scheduled_for: Option<DateTime<Utc>> = match body.get("scheduledFor") {
            Some(Value::Null) | None => None,
            Some(v) => Some(serde_json::from_value(v.clone()).map_err(|_| {
                ApiError::Validation("scheduledFor must be an RFC 3339 timestamp".into())
            })?),
        };
        Ok(self.content.set_workflow_status(
            &mut self.store,
            &id,
            status,
            scheduled_for,
            &session.username,
        )?)
    }

    fn bulk_publish(&mut self, session: &Session, body: &Value) -> Result<Value, ApiError> {
        require_publisher(session)?;
        let page_ids: Vec<String> = body
            .get("pageIds")
            .cloned()
            .ok_or_else(|| ApiError::missing_field("pageIds"))
            .and_then(|v| {
                serde_json::from_value(v)
                    .map_err(|_| ApiError::Validation("pageIds must be an array of strings".into()))
            })?;
        let action = parse_action(body)?;
        let dry_run = body.get("dryRun").and_then(Value::as_bool).unwrap_or(false);
        let results = self.content.bulk_publish(
            &mut self.store,
            &page_ids,
            action,
            dry_run,
            &session.username,
        );
        Ok(json!({ "dryRun": dry_run, "results": results }))
    }

    fn scheduled_publish(&mut self, session: &Session) -> Result<Value, ApiError> {
        require_publisher(session)?;
        let published = self
            .content
            .run_scheduled_publish(&mut self.store, &session.username)?;
        Ok(json!({ "published": published }))
    }

    // --- history ---

    fn list_revisions(&self, raw_id: &str, params: &BTreeMap<&str, &str>) -> Result<Value, ApiError> {
        let id = parse_page_id(raw_id)?;
        let limit = parse_usize(params, "limit")?.unwrap_or(20);
        let revisions = self.content.list_revisions(&id, limit)?;
        Ok(json!({ "revisions": revisions }))
    }

    fn diff_revisions(&self, raw_id: &str, params: &BTreeMap<&str, &str>) -> Result<Value, ApiError> {
        let id = parse_page_id(raw_id)?;
        let from = params
            .get("from")
            .ok_or_else(|| ApiError::missing_field("from"))?;
        let to = params
            .get("to")
            .ok_or_else(|| ApiError::missing_field("to"))?;
        let from_rev = self.content.revision(&id, from)?;
        let to_rev = self.content.revision(&id, to)?;
        let result = copydesk_diff::diff(&render(&from_rev.snapshot)?, &render(&to_rev.snapshot)?);
        to_value(&result)
    }

    fn rollback(&mut self, session: &Session, raw_id: &str, body: &Value) -> Result<Value, ApiError> {
        let id = parse_page_id(raw_id)?;
        let revision_id = body_str(body, "revisionId")?;
        let revision =
            self.content
                .rollback(&mut self.store, &id, revision_id, &session.username)?;
        to_value(&revision)
    }

    // --- watchlist ---

    fn watch(&mut self, session: &Session, raw_id: &str, add: bool) -> Result<Value, ApiError> {
        let id = parse_page_id(raw_id)?;
        let (changed, action) = if add {
            (self.store.watch(&session.username, id.as_str()), "watchlist.add")
        } else {
            (self.store.unwatch(&session.username, id.as_str()), "watchlist.remove")
        };
        self.store.record(AuditEntry::new(
            &session.username,
            action,
            json!({ "pageId": id.as_str() }),
        ))?;
        Ok(json!({ "pageId": id.as_str(), "watched": add, "changed": changed }))
    }

    // --- audit ---

    fn audit_entries(&self, session: &Session, params: &BTreeMap<&str, &str>) -> Result<Value, ApiError> {
        require_admin(session)?;
        let limit = parse_usize(params, "limit")?.unwrap_or(50);
        Ok(json!({ "entries": self.store.audit().recent(limit) }))
    }

    // --- users & sessions (administrative) ---

    fn list_users(&self, session: &Session) -> Result<Value, ApiError> {
        require_admin(session)?;
        let users: Vec<Value> = self
            .store
            .users()
            .map(|u| {
                json!({
                    "username": u.username,
                    "role": u.role,
                    "createdAt": u.created_at,
                })
            })
            .collect();
        Ok(json!({ "users": users }))
    }

    fn create_user(&mut self, session: &Session, body: &Value) -> Result<Value, ApiError> {
        require_admin(session)?;
        let username = normalize_username(body_str(body, "username")?);
        if username.is_empty() {
            return Err(ApiError::Validation("username must not be empty".into()));
        }
        if self.store.user(&username).is_some() {
            return Err(ApiError::Conflict(format!("user {username} already exists")));
        }
        let password = body_str(body, "password")?;
        let role = parse_role(body)?.unwrap_or(Role::Contributor);
        self.store.upsert_user(User {
            username: username.clone(),
            role,
            password_secret: password.to_string(),
            created_at: Utc::now(),
        });
        self.store.record(AuditEntry::new(
            &session.username,
            "user.create",
            json!({ "username": username, "role": role }),
        ))?;
        Ok(json!({ "username": username, "role": role }))
    }

    fn patch_user(&mut self, session: &Session, name: &str, body: &Value) -> Result<Value, ApiError> {
        require_admin(session)?;
        let username = normalize_username(name);
        let mut user = self
            .store
            .user(&username)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("user {username} not found")))?;
        if let Some(role) = parse_role(body)? {
            user.role = role;
        }
        if let Some(password) = opt_str(body, "password") {
            user.password_secret = password.to_string();
        }
        let role = user.role;
        self.store.upsert_user(user);
        self.store.record(AuditEntry::new(
            &session.username,
            "user.update",
            json!({ "username": username }),
        ))?;
        Ok(json!({ "username": username, "role": role }))
    }

    /// Removing a user also invalidates every session they hold.
    fn delete_user(&mut self, session: &Session, name: &str) -> Result<Value, ApiError> {
        require_admin(session)?;
        let username = normalize_username(name);
        self.store
            .remove_user(&username)
            .ok_or_else(|| ApiError::NotFound(format!("user {username} not found")))?;
        let revoked = self.sessions.revoke_all(&mut self.store, &username)?;
        self.store.record(AuditEntry::new(
            &session.username,
            "user.delete",
            json!({ "username": username, "sessionsRevoked": revoked }),
        ))?;
        Ok(json!({ "deleted": username, "sessionsRevoked": revoked }))
    }

    fn list_sessions(&self, session: &Session) -> Result<Value, ApiError> {
        require_admin(session)?;
        let sessions: Vec<&Session> = self.store.sessions().collect();
        Ok(json!({ "sessions": sessions }))
    }

    fn revoke_session(&mut self, session: &Session, token: &str) -> Result<Value, ApiError> {
        require_admin(session)?;
        if !self.sessions.revoke(&mut self.store, token)? {
            return Err(ApiError::NotFound("session not found".into()));
        }
        self.store.record(AuditEntry::new(
            &session.username,
            "session.revoke",
            json!({}),
        ))?;
        Ok(json!({ "revoked": 1 }))
    }

    fn revoke_user_sessions(&mut self, session: &Session, name: &str) -> Result<Value, ApiError> {
        require_admin(session)?;
        let revoked = self.sessions.revoke_all(&mut self.store, name)?;
        self.store.record(AuditEntry::new(
            &session.username,
            "session.revoke_all",
            json!({ "username": normalize_username(name) }),
        ))?;
        Ok(json!({ "revoked": revoked }))
    }
}

// --- helpers ---

fn require_admin(session: &Session) -> Result<(), ApiError> {
    if session.role == Role::Admin {
        Ok(())
    } else {
        Err(ApiError::Unauthorized)
    }
}

fn require_publisher(session: &Session) -> Result<(), ApiError> {
    match session.role {
        Role::Admin | Role::Editor => Ok(()),
        Role::Contributor => Err(ApiError::Unauthorized),
    }
}

fn body_str<'a>(body: &'a Value, key: &str) -> Result<&'a str, ApiError> {
    body.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| ApiError::missing_field(key))
}

fn opt_str<'a>(body: &'a Value, key: &str) -> Option<&'a str> {
    body.get(key).and_then(Value::as_str)
}

fn parse_page_id(raw: &str) -> Result<PageId, ApiError> {
    PageId::new(raw).map_err(|e| ApiError::Validation(e.to_string()))
}

fn parse_usize(params: &BTreeMap<&str, &str>, key: &str) -> Result<Option<usize>, ApiError> {
    match params.get(key) {
        None => Ok(None),
        Some(v) => v
            .parse()
            .map(Some)
            .map_err(|_| ApiError::Validation(format!("invalid {key}"))),
    }
}

fn parse_action(body: &Value) -> Result<PublishAction, ApiError> {
    body.get("action")
        .cloned()
        .ok_or_else(|| ApiError::missing_field("action"))
        .and_then(|v| {
            serde_json::from_value(v).map_err(|_| {
                ApiError::Validation("action must be \"publish\" or \"unpublish\"".into())
            })
        })
}

fn parse_role(body: &Value) -> Result<Option<Role>, ApiError> {
    match body.get("role") {
        Some(Value::Null) | None => Ok(None),
        Some(v) => serde_json::from_value(v.clone())
            .map(Some)
            .map_err(|_| ApiError::Validation("invalid role".into())),
    }
}

fn to_value<T: serde::Serialize>(value: &T) -> Result<Value, ApiError> {
    serde_json::to_value(value).map_err(|e| ApiError::Internal(e.to_string()))
}

/// Text rendering of a snapshot for diffing: pretty-printed JSON.
fn render(snapshot: &Value) -> Result<String, ApiError> {
    serde_json::to_string_pretty(snapshot).map_err(|e| ApiError::Internal(e.to_string()))
}
