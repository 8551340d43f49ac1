//! Revision history: immutable per-page snapshots, newest first, capped.
//!
//! # Invariants
//! - Revisions are immutable once appended.
//! - Each page's list is newest-first and never exceeds the retention cap;
//!   the oldest revisions are evicted first.
//! - History only grows: rollback appends a new revision, it never rewrites
//!   existing entries.

pub mod log;

pub use log::{DEFAULT_REVISION_CAP, Revision, RevisionError, RevisionLog};

pub fn crate_info() -> &'static str {
    "copydesk-revisions v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("revisions"));
    }
}
