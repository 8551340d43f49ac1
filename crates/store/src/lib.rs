//! Durable record store: users, sessions, watchlists, and the audit journal
//! persisted as JSON files.
//!
//! # Invariants
//! - Collections are loaded once at open; in-memory maps are authoritative
//!   between flushes.
//! - Every flush rewrites the collections wholesale.
//! - Expired sessions are dropped at load and never handed back as valid.

pub mod records;

pub use records::{RecordStore, StoreError};

pub fn crate_info() -> &'static str {
    "copydesk-store v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("store"));
    }
}
