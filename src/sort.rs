/// DynTable Sort Engine
///
/// Keeps the list of active sort keys for a grid and orders rows by them.
///
/// # Ordering rules
///
/// For two cells under one key:
///
/// 1. Null sorts after every defined value, in both directions
/// 2. Two numbers (or numeric strings) compare numerically
/// 3. Two dates compare as timestamps
/// 4. Anything else compares as case-insensitive text
///
/// Each defined cell falls into exactly one of the classes above. On a
/// column that mixes classes, numbers come before dates and dates before
/// text, so the order stays total.
///
/// Keys are applied in priority order and the sort is stable, so rows that
/// tie on every key keep their original relative order.
///
/// # Examples
///
/// ```
/// use dyntable::{sort_rows, Row, SortDirection, SortState};
///
/// let rows = vec![
///     Row::new().with("id", 1).with("rate", 4.5),
///     Row::new().with("id", 2).with("rate", 3.9),
/// ];
///
/// let mut state = SortState::new();
/// state.add_sort("rate", SortDirection::Asc);
///
/// let sorted = sort_rows(&rows, state.keys());
/// assert_eq!(sorted[0].get("id").as_f64(), Some(2.0));
/// ```

use crate::value::{CellValue, Row};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    /// Smallest first
    Asc,
    /// Largest first
    Desc,
}

/// An active sort key: column plus direction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSort {
    pub column_key: String,
    pub direction: SortDirection,
}

impl TableSort {
    pub fn asc(column_key: impl Into<String>) -> Self {
        TableSort {
            column_key: column_key.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(column_key: impl Into<String>) -> Self {
        TableSort {
            column_key: column_key.into(),
            direction: SortDirection::Desc,
        }
    }
}

/// Ordered set of active sort keys, highest priority first
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SortState {
    keys: Vec<TableSort>,
}

impl SortState {
    pub fn new() -> Self {
        SortState { keys: Vec::new() }
    }

    pub fn from_keys(keys: Vec<TableSort>) -> Self {
        let mut state = SortState::new();
        for key in keys {
            state.add_sort(key.column_key, key.direction);
        }
        state
    }

    pub fn keys(&self) -> &[TableSort] {
        &self.keys
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Cycles a column through unsorted → asc → desc → unsorted.
    ///
    /// A column already in the list keeps its priority; a new one is
    /// appended. Returns the column's direction after the toggle.
    pub fn toggle_sort(&mut self, column_key: &str) -> Option<SortDirection> {
        match self.keys.iter().position(|k| k.column_key == column_key) {
            None => {
                self.keys.push(TableSort::asc(column_key));
                Some(SortDirection::Asc)
            }
            Some(pos) => match self.keys[pos].direction {
                SortDirection::Asc => {
                    self.keys[pos].direction = SortDirection::Desc;
                    Some(SortDirection::Desc)
                }
                SortDirection::Desc => {
                    self.keys.remove(pos);
                    None
                }
            },
        }
    }

    /// Sets the direction for a column, appending it if not yet active
    pub fn add_sort(&mut self, column_key: impl Into<String>, direction: SortDirection) {
        let column_key = column_key.into();
        match self.keys.iter_mut().find(|k| k.column_key == column_key) {
            Some(existing) => existing.direction = direction,
            None => self.keys.push(TableSort {
                column_key,
                direction,
            }),
        }
    }

    /// Drops a column from the active keys. Returns true if it was present.
    pub fn remove_sort(&mut self, column_key: &str) -> bool {
        let before = self.keys.len();
        self.keys.retain(|k| k.column_key != column_key);
        self.keys.len() != before
    }

    pub fn clear_all_sorts(&mut self) {
        self.keys.clear();
    }

    pub fn direction_of(&self, column_key: &str) -> Option<SortDirection> {
        self.keys
            .iter()
            .find(|k| k.column_key == column_key)
            .map(|k| k.direction)
    }

    /// Zero-based priority of a column among the active keys
    pub fn priority_of(&self, column_key: &str) -> Option<usize> {
        self.keys.iter().position(|k| k.column_key == column_key)
    }
}

/// Comparison class of a defined cell, ranked in declaration order
enum SortClass {
    Number(f64),
    Date(i64),
    Text(String),
}

impl SortClass {
    fn of(value: &CellValue) -> Self {
        if let Some(n) = value.as_number() {
            SortClass::Number(n)
        } else if let Some(ts) = value.as_timestamp() {
            SortClass::Date(ts)
        } else {
            SortClass::Text(value.display_text().to_lowercase())
        }
    }

    fn rank(&self) -> u8 {
        match self {
            SortClass::Number(_) => 0,
            SortClass::Date(_) => 1,
            SortClass::Text(_) => 2,
        }
    }
}

/// Compare two defined cells ascending
fn compare_non_null(a: &CellValue, b: &CellValue) -> Ordering {
    match (SortClass::of(a), SortClass::of(b)) {
        (SortClass::Number(x), SortClass::Number(y)) => x.total_cmp(&y),
        (SortClass::Date(x), SortClass::Date(y)) => x.cmp(&y),
        (SortClass::Text(x), SortClass::Text(y)) => x.cmp(&y),
        (x, y) => x.rank().cmp(&y.rank()),
    }
}

/// Compare two cells under one direction.
///
/// Null handling happens before the direction is applied, which keeps
/// nulls at the end for both ascending and descending keys.
pub fn compare_cells(a: &CellValue, b: &CellValue, direction: SortDirection) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => return Ordering::Equal,
        (true, false) => return Ordering::Greater,
        (false, true) => return Ordering::Less,
        (false, false) => {}
    }

    let base_cmp = compare_non_null(a, b);
    match direction {
        SortDirection::Asc => base_cmp,
        SortDirection::Desc => base_cmp.reverse(),
    }
}

/// Compare two rows using all keys in priority order
pub fn compare_rows(a: &Row, b: &Row, keys: &[TableSort]) -> Ordering {
    for key in keys {
        let cmp = compare_cells(a.get(&key.column_key), b.get(&key.column_key), key.direction);
        if cmp != Ordering::Equal {
            return cmp;
        }
    }
    Ordering::Equal
}

/// Returns a sorted copy of `rows`; the input is left untouched
pub fn sort_rows(rows: &[Row], keys: &[TableSort]) -> Vec<Row> {
    let mut sorted = rows.to_vec();
    if !keys.is_empty() {
        // slice::sort_by is stable
        sorted.sort_by(|a, b| compare_rows(a, b, keys));
    }
    sorted
}

/// Sorted index permutation: `result[view_pos] = input_index`
pub fn sorted_indices(rows: &[Row], keys: &[TableSort]) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..rows.len()).collect();
    if !keys.is_empty() {
        indices.sort_by(|&a, &b| compare_rows(&rows[a], &rows[b], keys));
    }
    indices
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(rows: &[Row]) -> Vec<f64> {
        rows.iter().map(|r| r.get("id").as_f64().unwrap()).collect()
    }

    #[test]
    fn test_toggle_cycle() {
        let mut state = SortState::new();
        assert_eq!(state.toggle_sort("rate"), Some(SortDirection::Asc));
        assert_eq!(state.toggle_sort("rate"), Some(SortDirection::Desc));
        assert_eq!(state.toggle_sort("rate"), None);
        assert!(state.is_empty());
    }

    #[test]
    fn test_toggle_keeps_priority() {
        let mut state = SortState::new();
        state.toggle_sort("a");
        state.toggle_sort("b");
        state.toggle_sort("a");

        assert_eq!(state.priority_of("a"), Some(0));
        assert_eq!(state.direction_of("a"), Some(SortDirection::Desc));
        assert_eq!(state.priority_of("b"), Some(1));
    }

    #[test]
    fn test_add_remove_clear() {
        let mut state = SortState::new();
        state.add_sort("a", SortDirection::Asc);
        state.add_sort("b", SortDirection::Asc);
        state.add_sort("a", SortDirection::Desc);
        assert_eq!(state.keys(), &[TableSort::desc("a"), TableSort::asc("b")]);

        assert!(state.remove_sort("a"));
        assert!(!state.remove_sort("a"));
        assert_eq!(state.keys(), &[TableSort::asc("b")]);

        state.clear_all_sorts();
        assert!(state.is_empty());
    }

    #[test]
    fn test_multi_key_tie_break() {
        let rows = vec![
            Row::new().with("id", 1).with("a", 1).with("b", 2),
            Row::new().with("id", 2).with("a", 1).with("b", 1),
        ];
        let sorted = sort_rows(&rows, &[TableSort::asc("a"), TableSort::asc("b")]);
        assert_eq!(ids(&sorted), vec![2.0, 1.0]);
    }

    #[test]
    fn test_stable_for_equal_keys() {
        let rows: Vec<Row> = (0..6)
            .map(|i| Row::new().with("id", i).with("group", i % 2))
            .collect();
        let sorted = sort_rows(&rows, &[TableSort::asc("group")]);
        assert_eq!(ids(&sorted), vec![0.0, 2.0, 4.0, 1.0, 3.0, 5.0]);

        let again = sort_rows(&rows, &[TableSort::asc("group")]);
        assert_eq!(ids(&sorted), ids(&again));
    }

    #[test]
    fn test_nulls_last_both_directions() {
        let rows = vec![
            Row::new().with("id", 1).with("v", CellValue::Null),
            Row::new().with("id", 2).with("v", 5),
            Row::new().with("id", 3),
            Row::new().with("id", 4).with("v", 9),
        ];
        let asc = sort_rows(&rows, &[TableSort::asc("v")]);
        assert_eq!(ids(&asc), vec![2.0, 4.0, 1.0, 3.0]);

        let desc = sort_rows(&rows, &[TableSort::desc("v")]);
        assert_eq!(ids(&desc), vec![4.0, 2.0, 1.0, 3.0]);
    }

    #[test]
    fn test_numeric_strings_compare_numerically() {
        let rows = vec![
            Row::new().with("id", 1).with("v", "10"),
            Row::new().with("id", 2).with("v", "9"),
        ];
        let sorted = sort_rows(&rows, &[TableSort::asc("v")]);
        assert_eq!(ids(&sorted), vec![2.0, 1.0]);
    }

    #[test]
    fn test_dates_and_case_insensitive_text() {
        let rows = vec![
            Row::new().with("id", 1).with("d", "12/31/2023").with("s", "beta"),
            Row::new().with("id", 2).with("d", "2023-01-15").with("s", "Alpha"),
        ];
        assert_eq!(ids(&sort_rows(&rows, &[TableSort::asc("d")])), vec![2.0, 1.0]);
        assert_eq!(ids(&sort_rows(&rows, &[TableSort::asc("s")])), vec![2.0, 1.0]);
    }

    #[test]
    fn test_sort_does_not_mutate_input() {
        let rows = vec![
            Row::new().with("id", 2),
            Row::new().with("id", 1),
        ];
        let _ = sort_rows(&rows, &[TableSort::asc("id")]);
        assert_eq!(ids(&rows), vec![2.0, 1.0]);
        assert_eq!(sorted_indices(&rows, &[TableSort::asc("id")]), vec![1, 0]);
    }

    fn mixed_values() -> Vec<CellValue> {
        vec![
            "10".into(),
            "9".into(),
            "5x".into(),
            "abc".into(),
            "1x".into(),
            "2023-01-15".into(),
            "12/31/2023".into(),
            "Beta".into(),
            CellValue::from(7),
            CellValue::from(-2.5),
            CellValue::from(true),
            CellValue::Array(vec!["b".into(), 1.into()]),
            CellValue::Null,
        ]
    }

    #[test]
    fn test_mixed_column_class_order() {
        let rows: Vec<Row> = ["abc", "10", "2023-01-15", "9"]
            .iter()
            .enumerate()
            .map(|(i, v)| Row::new().with("id", i as i64).with("v", *v))
            .chain(std::iter::once(Row::new().with("id", 4)))
            .collect();

        assert_eq!(ids(&sort_rows(&rows, &[TableSort::asc("v")])), vec![3.0, 1.0, 2.0, 0.0, 4.0]);
        assert_eq!(ids(&sort_rows(&rows, &[TableSort::desc("v")])), vec![0.0, 2.0, 1.0, 3.0, 4.0]);
    }

    #[test]
    fn test_numeric_and_text_strings_do_not_cycle() {
        let ten = CellValue::from("10");
        let nine = CellValue::from("9");
        let five_x = CellValue::from("5x");
        let asc = SortDirection::Asc;

        assert_eq!(compare_cells(&nine, &ten, asc), Ordering::Less);
        assert_eq!(compare_cells(&ten, &five_x, asc), Ordering::Less);
        assert_eq!(compare_cells(&nine, &five_x, asc), Ordering::Less);
        assert_eq!(compare_cells(&five_x, &nine, asc), Ordering::Greater);
    }

    #[test]
    fn test_mixed_column_order_is_total() {
        let values = mixed_values();
        for direction in [SortDirection::Asc, SortDirection::Desc] {
            for a in &values {
                for b in &values {
                    let ab = compare_cells(a, b, direction);
                    assert_eq!(ab, compare_cells(b, a, direction).reverse(), "{:?} vs {:?}", a, b);
                    for c in &values {
                        if ab != Ordering::Greater && compare_cells(b, c, direction) != Ordering::Greater {
                            assert_ne!(
                                compare_cells(a, c, direction),
                                Ordering::Greater,
                                "{:?} <= {:?} <= {:?}",
                                a,
                                b,
                                c
                            );
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_shuffled_mixed_column_sorts_the_same() {
        let values = mixed_values();
        let rows: Vec<Row> = (0..60)
            .map(|i| Row::new().with("id", i).with("v", values[i as usize % values.len()].clone()))
            .collect();
        let keys = [TableSort::desc("v")];
        let column = |rows: &[Row]| -> Vec<CellValue> { rows.iter().map(|r| r.get("v").clone()).collect() };
        let expected = column(&sort_rows(&rows, &keys));

        let mut state: u64 = 0x2545_f491_4f6c_dd1d;
        for _ in 0..25 {
            let mut shuffled = rows.clone();
            for i in (1..shuffled.len()).rev() {
                state = state
                    .wrapping_mul(6364136223846793005)
                    .wrapping_add(1442695040888963407);
                let j = (state >> 33) as usize % (i + 1);
                shuffled.swap(i, j);
            }

            let sorted = sort_rows(&shuffled, &keys);
            assert_eq!(column(&sorted), expected);
            for pair in sorted.windows(2) {
                assert_ne!(compare_rows(&pair[0], &pair[1], &keys), Ordering::Greater);
            }
        }
    }
}
