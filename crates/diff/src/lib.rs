//! Line-level diff between two text renderings of page content.
//!
//! # Invariants
//! - `diff` is a pure function of its inputs; no io, no state.
//! - Comparison is positional (index-aligned), not minimal-edit-distance.
//!   Callers depend on the exact row ordering, so the alignment behavior is
//!   part of the contract.

pub mod engine;

pub use engine::{DiffResult, DiffRow, DiffSummary, RowKind, diff};

pub fn crate_info() -> &'static str {
    "copydesk-diff v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("diff"));
    }
}
