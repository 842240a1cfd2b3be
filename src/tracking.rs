/// Change Tracking for DynTable
///
/// The ledger keeps, per schema id, the row set as it was when tracking
/// started and the latest row set. Comparing the two yields the change
/// summary handed to review and approval.
///
/// # Diff rules
///
/// Rows are matched by their `id` field:
///
/// - `added`: ids present now but not in the original
/// - `deleted`: ids present in the original but not now
/// - `modified`: ids present in both whose content differs
///
/// Content comparison is structural. Field order never matters and an
/// absent field equals an explicit null. Rows with no usable id cannot be
/// matched; a current row without an id counts as added and an original
/// row without an id counts as deleted, unless an identical id-less row
/// sits at the same position on the other side.

use crate::value::{row_sets_equal, rows_equal, Row, RowId};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Original and current snapshots for one schema
#[derive(Debug, Clone)]
pub struct TrackedChanges {
    original_data: Vec<Row>,
    current_data: Vec<Row>,
    has_changes: bool,
}

impl TrackedChanges {
    fn new(data: &[Row]) -> Self {
        TrackedChanges {
            original_data: data.to_vec(),
            current_data: data.to_vec(),
            has_changes: false,
        }
    }

    pub fn original_data(&self) -> &[Row] {
        &self.original_data
    }

    pub fn current_data(&self) -> &[Row] {
        &self.current_data
    }

    pub fn has_changes(&self) -> bool {
        self.has_changes
    }

    /// Row-level diff between the two snapshots
    pub fn diff(&self) -> TableDiff {
        diff_rows(&self.original_data, &self.current_data)
    }
}

/// A row present in both snapshots with different content
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModifiedRow {
    pub id: RowId,
    pub before: Row,
    pub after: Row,
    /// Keys whose values differ, sorted
    pub changed_columns: Vec<String>,
}

/// Row-level differences between two row sets
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TableDiff {
    pub added: Vec<Row>,
    pub modified: Vec<ModifiedRow>,
    pub deleted: Vec<Row>,
}

impl TableDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.deleted.is_empty()
    }

    pub fn total(&self) -> usize {
        self.added.len() + self.modified.len() + self.deleted.len()
    }
}

/// Per-schema change counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChangeCounts {
    pub added: usize,
    pub modified: usize,
    pub deleted: usize,
    pub total: usize,
}

/// Change counts for one tracked schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeSummary {
    pub schema_id: String,
    pub added: usize,
    pub modified: usize,
    pub deleted: usize,
    pub total: usize,
}

impl ChangeSummary {
    pub fn counts(&self) -> ChangeCounts {
        ChangeCounts {
            added: self.added,
            modified: self.modified,
            deleted: self.deleted,
            total: self.total,
        }
    }
}

/// Computes the row diff between two snapshots
pub fn diff_rows(original: &[Row], current: &[Row]) -> TableDiff {
    let original_by_id: HashMap<RowId, &Row> = original
        .iter()
        .filter_map(|r| r.id().map(|id| (id, r)))
        .collect();
    let current_ids: HashSet<RowId> = current.iter().filter_map(Row::id).collect();

    let mut diff = TableDiff::default();

    for (pos, row) in current.iter().enumerate() {
        match row.id() {
            Some(id) => match original_by_id.get(&id) {
                None => diff.added.push(row.clone()),
                Some(before) => {
                    if !rows_equal(before, row) {
                        diff.modified.push(ModifiedRow {
                            changed_columns: before.changed_keys(row),
                            id,
                            before: (*before).clone(),
                            after: row.clone(),
                        });
                    }
                }
            },
            None => {
                if !same_anonymous_row(original, pos, row) {
                    diff.added.push(row.clone());
                }
            }
        }
    }

    for (pos, row) in original.iter().enumerate() {
        match row.id() {
            Some(id) => {
                if !current_ids.contains(&id) {
                    diff.deleted.push(row.clone());
                }
            }
            None => {
                if !same_anonymous_row(current, pos, row) {
                    diff.deleted.push(row.clone());
                }
            }
        }
    }

    diff
}

fn same_anonymous_row(other: &[Row], pos: usize, row: &Row) -> bool {
    other
        .get(pos)
        .map(|candidate| candidate.id().is_none() && rows_equal(candidate, row))
        .unwrap_or(false)
}

/// Tracks original vs. current rows for every schema being edited
#[derive(Debug, Clone, Default)]
pub struct ChangeTracker {
    tracked: BTreeMap<String, TrackedChanges>,
}

impl ChangeTracker {
    pub fn new() -> Self {
        ChangeTracker {
            tracked: BTreeMap::new(),
        }
    }

    /// Takes a fresh baseline for a schema, discarding any previous one
    pub fn start_tracking(&mut self, schema_id: &str, data: &[Row]) {
        log::debug!("tracking started for '{}' ({} rows)", schema_id, data.len());
        self.tracked
            .insert(schema_id.to_string(), TrackedChanges::new(data));
    }

    /// Replaces the current snapshot. Untracked schemas are ignored.
    pub fn update_tracking(&mut self, schema_id: &str, new_data: &[Row]) {
        match self.tracked.get_mut(schema_id) {
            Some(entry) => {
                entry.current_data = new_data.to_vec();
                entry.has_changes = !row_sets_equal(&entry.original_data, &entry.current_data);
            }
            None => log::debug!("update_tracking ignored: '{}' is not tracked", schema_id),
        }
    }

    pub fn get_table_changes(&self, schema_id: &str) -> Option<&TrackedChanges> {
        self.tracked.get(schema_id)
    }

    pub fn is_tracking(&self, schema_id: &str) -> bool {
        self.tracked.contains_key(schema_id)
    }

    pub fn has_any_changes(&self) -> bool {
        self.tracked.values().any(TrackedChanges::has_changes)
    }

    /// Row-level diff for one schema, if tracked
    pub fn table_diff(&self, schema_id: &str) -> Option<TableDiff> {
        self.tracked.get(schema_id).map(TrackedChanges::diff)
    }

    /// Counts for every schema with changes, ordered by schema id
    pub fn get_changes_summary(&self) -> Vec<ChangeSummary> {
        self.tracked
            .iter()
            .filter(|(_, entry)| entry.has_changes)
            .map(|(schema_id, entry)| {
                let diff = entry.diff();
                ChangeSummary {
                    schema_id: schema_id.clone(),
                    added: diff.added.len(),
                    modified: diff.modified.len(),
                    deleted: diff.deleted.len(),
                    total: diff.total(),
                }
            })
            .collect()
    }

    /// Drops one schema's tracking, or all of it when `schema_id` is None
    pub fn reset_tracking(&mut self, schema_id: Option<&str>) {
        match schema_id {
            Some(id) => {
                self.tracked.remove(id);
            }
            None => self.tracked.clear(),
        }
    }

    pub fn len(&self) -> usize {
        self.tracked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracked.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::CellValue;

    #[test]
    fn test_summary_counts() {
        let mut tracker = ChangeTracker::new();
        tracker.start_tracking("rates", &[Row::new().with("id", 1).with("v", "x")]);
        tracker.update_tracking(
            "rates",
            &[
                Row::new().with("id", 1).with("v", "y"),
                Row::new().with("id", 2).with("v", "z"),
            ],
        );

        let summary = tracker.get_changes_summary();
        assert_eq!(summary.len(), 1);
        assert_eq!(
            summary[0].counts(),
            ChangeCounts {
                added: 1,
                modified: 1,
                deleted: 0,
                total: 2
            }
        );
        assert_eq!(summary[0].schema_id, "rates");
    }

    #[test]
    fn test_key_order_is_not_a_change() {
        let original: Vec<Row> =
            serde_json::from_str(r#"[{"id": 1, "name": "Prime", "rate": 4.5}]"#).unwrap();
        let reordered: Vec<Row> =
            serde_json::from_str(r#"[{"rate": 4.5, "name": "Prime", "id": 1}]"#).unwrap();

        let mut tracker = ChangeTracker::new();
        tracker.start_tracking("rates", &original);
        tracker.update_tracking("rates", &reordered);

        assert!(!tracker.get_table_changes("rates").unwrap().has_changes());
        assert!(tracker.get_changes_summary().is_empty());
    }

    #[test]
    fn test_explicit_null_is_not_a_change() {
        let mut tracker = ChangeTracker::new();
        tracker.start_tracking("rates", &[Row::new().with("id", 1)]);
        tracker.update_tracking("rates", &[Row::new().with("id", 1).with("note", CellValue::Null)]);
        assert!(!tracker.has_any_changes());
    }

    #[test]
    fn test_deleted_rows() {
        let mut tracker = ChangeTracker::new();
        tracker.start_tracking(
            "rates",
            &[Row::new().with("id", 1), Row::new().with("id", 2)],
        );
        tracker.update_tracking("rates", &[Row::new().with("id", 2)]);

        let diff = tracker.table_diff("rates").unwrap();
        assert_eq!(diff.deleted.len(), 1);
        assert_eq!(diff.deleted[0].id(), Some(RowId::Int(1)));
        assert_eq!(diff.total(), 1);
    }

    #[test]
    fn test_modified_row_details() {
        let diff = diff_rows(
            &[Row::new().with("id", 1).with("rate", 4.5).with("tier", "A")],
            &[Row::new().with("id", 1).with("rate", 4.75).with("tier", "A")],
        );
        assert_eq!(diff.modified.len(), 1);
        assert_eq!(diff.modified[0].changed_columns, vec!["rate".to_string()]);
        assert_eq!(diff.modified[0].before.get("rate").as_f64(), Some(4.5));
    }

    #[test]
    fn test_reordering_rows_changes_set_but_not_diff() {
        let a = Row::new().with("id", 1);
        let b = Row::new().with("id", 2);
        let mut tracker = ChangeTracker::new();
        tracker.start_tracking("rates", &[a.clone(), b.clone()]);
        tracker.update_tracking("rates", &[b, a]);

        // Position matters for has_changes; the id-based diff sees nothing
        let entry = tracker.get_table_changes("rates").unwrap();
        assert!(entry.has_changes());
        assert!(entry.diff().is_empty());
        assert_eq!(tracker.get_changes_summary()[0].total, 0);
    }

    #[test]
    fn test_rows_without_ids() {
        let anon = Row::new().with("tier", "A");
        let diff = diff_rows(&[anon.clone()], &[anon.clone(), Row::new().with("tier", "B")]);
        assert_eq!(diff.added.len(), 1);
        assert_eq!(diff.added[0].get("tier").as_str(), Some("B"));
        assert!(diff.deleted.is_empty());
    }

    #[test]
    fn test_untracked_update_is_noop() {
        let mut tracker = ChangeTracker::new();
        tracker.update_tracking("ghost", &[Row::new().with("id", 1)]);
        assert!(tracker.get_table_changes("ghost").is_none());
        assert!(tracker.table_diff("ghost").is_none());
    }

    #[test]
    fn test_restart_overwrites_baseline() {
        let mut tracker = ChangeTracker::new();
        tracker.start_tracking("rates", &[Row::new().with("id", 1)]);
        tracker.update_tracking("rates", &[Row::new().with("id", 2)]);
        assert!(tracker.has_any_changes());

        tracker.start_tracking("rates", &[Row::new().with("id", 2)]);
        assert!(!tracker.has_any_changes());
        assert_eq!(tracker.get_table_changes("rates").unwrap().original_data().len(), 1);
    }

    #[test]
    fn test_reset_tracking() {
        let mut tracker = ChangeTracker::new();
        tracker.start_tracking("a", &[]);
        tracker.start_tracking("b", &[]);

        tracker.reset_tracking(Some("a"));
        assert!(!tracker.is_tracking("a"));
        assert!(tracker.is_tracking("b"));

        tracker.reset_tracking(None);
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_snapshots_are_independent() {
        let mut rows = vec![Row::new().with("id", 1).with("v", "x")];
        let mut tracker = ChangeTracker::new();
        tracker.start_tracking("rates", &rows);

        rows[0].set("v", CellValue::from("mutated"));
        let entry = tracker.get_table_changes("rates").unwrap();
        assert_eq!(entry.original_data()[0].get("v").as_str(), Some("x"));
        assert_eq!(entry.current_data()[0].get("v").as_str(), Some("x"));
    }
}
