//! Session management: bearer-token issuance, validation, and revocation.
//!
//! # Invariants
//! - A session is valid iff its expiry deadline is in the future; expiry is
//!   checked lazily at validation, never assumed swept.
//! - Username-not-found and wrong-password are indistinguishable to callers.
//! - Every state change is flushed to the record store before returning.

pub mod manager;

pub use manager::{AuthError, SESSION_TTL_HOURS, SessionManager};

pub fn crate_info() -> &'static str {
    "copydesk-sessions v0.1.0"
}
