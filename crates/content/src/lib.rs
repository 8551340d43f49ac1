//! Content engine: page lifecycle, the workflow state machine, and the
//! operations that feed the revision log and audit journal.
//!
//! # Invariants
//! - The engine exclusively owns page and revision writes.
//! - Every content mutation appends one revision (workflow-stage overrides
//!   excepted) and one audit entry before returning.
//! - "Delete" is a content reset: the page keeps its schema and history.

pub mod engine;
pub mod schema;

pub use engine::{
    BulkResult, ContentEngine, ContentError, PageList, PublishAction, SaveMode,
};
pub use schema::resolve_schema;

pub fn crate_info() -> &'static str {
    "copydesk-content v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("content"));
    }
}
