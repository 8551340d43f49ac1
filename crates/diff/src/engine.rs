use serde::{Deserialize, Serialize};

/// What one diff row represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowKind {
    Same,
    Add,
    Remove,
}

/// One output row: a line and how it compares.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffRow {
    #[serde(rename = "type")]
    pub kind: RowKind,
    pub line: String,
}

/// Row counts for a whole diff.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSummary {
    pub added: usize,
    pub removed: usize,
    pub unchanged: usize,
}

/// A full diff: summary counts plus ordered rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffResult {
    pub summary: DiffSummary,
    pub rows: Vec<DiffRow>,
}

/// Compare two texts line by line at matching indices.
///
/// Lines are only ever compared at the same index: equal lines emit one
/// `same` row, differing lines emit a `remove` row for the old line (when
/// present) followed by an `add` row for the new line (when present). An
/// insertion that shifts later lines therefore reports every shifted line as
/// a remove/add pair; this is deliberate and preserved for callers that
/// depend on the row ordering.
pub fn diff(from: &str, to: &str) -> DiffResult {
    let from_lines: Vec<&str> = from.lines().collect();
    let to_lines: Vec<&str> = to.lines().collect();
    let len = from_lines.len().max(to_lines.len());

    let mut summary = DiffSummary::default();
    let mut rows = Vec::with_capacity(len);

    for i in 0..len {
        let old = from_lines.get(i);
        let new = to_lines.get(i);
        match (old, new) {
            (Some(a), Some(b)) if a == b => {
                summary.unchanged += 1;
                rows.push(DiffRow {
                    kind: RowKind::Same,
                    line: (*a).to_string(),
                });
            }
            _ => {
                if let Some(a) = old {
                    summary.removed += 1;
                    rows.push(DiffRow {
                        kind: RowKind::Remove,
                        line: (*a).to_string(),
                    });
                }
                if let Some(b) = new {
                    summary.added += 1;
                    rows.push(DiffRow {
                        kind: RowKind::Add,
                        line: (*b).to_string(),
                    });
                }
            }
        }
    }

    DiffResult { summary, rows }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_texts_yield_only_same_rows() {
        let text = "alpha\nbeta\ngamma";
        let result = diff(text, text);
        assert_eq!(result.summary.added, 0);
        assert_eq!(result.summary.removed, 0);
        assert_eq!(result.summary.unchanged, 3);
        assert!(result.rows.iter().all(|r| r.kind == RowKind::Same));
    }

    #[test]
    fn changed_line_emits_remove_then_add() {
        let result = diff("alpha\nbeta", "alpha\nbravo");
        assert_eq!(result.summary.unchanged, 1);
        assert_eq!(result.summary.removed, 1);
        assert_eq!(result.summary.added, 1);
        assert_eq!(result.rows[1].kind, RowKind::Remove);
        assert_eq!(result.rows[1].line, "beta");
        assert_eq!(result.rows[2].kind, RowKind::Add);
        assert_eq!(result.rows[2].line, "bravo");
    }

    #[test]
    fn reversed_arguments_swap_added_and_removed() {
        let x = "one\ntwo\nthree";
        let y = "one\ntwo\nthree\nfour\nfive";
        let forward = diff(x, y);
        let backward = diff(y, x);
        assert_eq!(forward.summary.added, backward.summary.removed);
        assert_eq!(forward.summary.removed, backward.summary.added);
        assert_eq!(forward.summary.unchanged, backward.summary.unchanged);
    }

    #[test]
    fn empty_to_text_is_all_additions() {
        let result = diff("", "one\ntwo");
        assert_eq!(result.summary.added, 2);
        assert_eq!(result.summary.removed, 0);
        assert_eq!(result.summary.unchanged, 0);
    }

    #[test]
    fn insertion_at_top_shifts_alignment() {
        // Positional comparison: the inserted first line misaligns every
        // following line, so nothing is reported unchanged.
        let result = diff("alpha\nbeta", "intro\nalpha\nbeta");
        assert_eq!(result.summary.unchanged, 0);
        assert_eq!(result.summary.removed, 2);
        assert_eq!(result.summary.added, 3);
    }

    #[test]
    fn row_kind_serializes_as_type_field() {
        let result = diff("a", "b");
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["rows"][0]["type"], "remove");
        assert_eq!(value["rows"][1]["type"], "add");
    }
}
