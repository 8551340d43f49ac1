//! Audit journal: a bounded, append-only record of every mutating action.
//!
//! # Invariants
//! - Entries are never modified after append.
//! - The journal never exceeds its cap; the oldest entries are evicted first.

pub mod journal;

pub use journal::{AuditEntry, AuditLog, DEFAULT_AUDIT_CAP};

pub fn crate_info() -> &'static str {
    "copydesk-audit v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("audit"));
    }
}
