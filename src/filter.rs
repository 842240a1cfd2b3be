/// DynTable Filter Engine
///
/// Each filterable column may carry at most one `TableFilter`. A row is
/// kept only when every active filter accepts it.
///
/// Filters fail closed: a filter whose operand is missing (including the
/// second bound of `Between`) rejects every row rather than being skipped.
/// Null cells never match. Array cells (multi-select columns) match when
/// any element matches.

use crate::error::{GridError, Result};
use crate::schema::DynamicTableSchema;
use crate::value::{CellValue, ColumnType, Row};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Filter operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterOperator {
    Contains,
    Equals,
    StartsWith,
    EndsWith,
    Gt,
    Lt,
    Gte,
    Lte,
    Between,
    Is,
    IsNot,
}

impl FilterOperator {
    /// Returns true if this operator needs a second operand
    pub fn requires_two_values(&self) -> bool {
        matches!(self, FilterOperator::Between)
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FilterOperator::Contains => "contains",
            FilterOperator::Equals => "equals",
            FilterOperator::StartsWith => "startsWith",
            FilterOperator::EndsWith => "endsWith",
            FilterOperator::Gt => "gt",
            FilterOperator::Lt => "lt",
            FilterOperator::Gte => "gte",
            FilterOperator::Lte => "lte",
            FilterOperator::Between => "between",
            FilterOperator::Is => "is",
            FilterOperator::IsNot => "isNot",
        };
        f.write_str(label)
    }
}

/// How a filter interprets cell values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterKind {
    Text,
    Number,
    Boolean,
    Date,
}

impl FilterKind {
    /// Operators valid for this kind, in display order
    pub fn operators(&self) -> &'static [FilterOperator] {
        use FilterOperator::*;
        match self {
            FilterKind::Text => &[Contains, Equals, StartsWith, EndsWith],
            FilterKind::Number | FilterKind::Date => &[Equals, Gt, Lt, Gte, Lte, Between],
            FilterKind::Boolean => &[Is, IsNot],
        }
    }

    pub fn supports(&self, operator: FilterOperator) -> bool {
        self.operators().contains(&operator)
    }

    /// Date filters apply to string columns holding dates
    pub fn applies_to(&self, column_type: ColumnType) -> bool {
        matches!(
            (self, column_type),
            (FilterKind::Text, ColumnType::String)
                | (FilterKind::Date, ColumnType::String)
                | (FilterKind::Number, ColumnType::Number)
                | (FilterKind::Boolean, ColumnType::Boolean)
        )
    }

    /// Default kind for a column type
    pub fn for_column_type(column_type: ColumnType) -> Self {
        match column_type {
            ColumnType::String => FilterKind::Text,
            ColumnType::Number => FilterKind::Number,
            ColumnType::Boolean => FilterKind::Boolean,
        }
    }
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FilterKind::Text => "text",
            FilterKind::Number => "number",
            FilterKind::Boolean => "boolean",
            FilterKind::Date => "date",
        };
        f.write_str(label)
    }
}

/// A predicate on one column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableFilter {
    pub column_key: String,
    pub kind: FilterKind,
    pub operator: FilterOperator,
    #[serde(default)]
    pub value: Option<CellValue>,
    #[serde(default)]
    pub value2: Option<CellValue>,
}

impl TableFilter {
    pub fn new(
        column_key: impl Into<String>,
        kind: FilterKind,
        operator: FilterOperator,
        value: impl Into<CellValue>,
    ) -> Self {
        TableFilter {
            column_key: column_key.into(),
            kind,
            operator,
            value: Some(value.into()),
            value2: None,
        }
    }

    pub fn between(
        column_key: impl Into<String>,
        kind: FilterKind,
        low: impl Into<CellValue>,
        high: impl Into<CellValue>,
    ) -> Self {
        TableFilter {
            column_key: column_key.into(),
            kind,
            operator: FilterOperator::Between,
            value: Some(low.into()),
            value2: Some(high.into()),
        }
    }

    /// Evaluates the filter against a row
    pub fn matches(&self, row: &Row) -> bool {
        let value = match operand(&self.value) {
            Some(v) => v,
            None => return false,
        };
        let value2 = operand(&self.value2);
        if self.operator.requires_two_values() && value2.is_none() {
            return false;
        }

        match row.get(&self.column_key) {
            CellValue::Array(items) => items
                .iter()
                .any(|item| self.matches_cell(item, value, value2)),
            cell => self.matches_cell(cell, value, value2),
        }
    }

    fn matches_cell(&self, cell: &CellValue, value: &CellValue, value2: Option<&CellValue>) -> bool {
        if cell.is_null() {
            return false;
        }
        match self.kind {
            FilterKind::Text => match_text(self.operator, cell, value),
            FilterKind::Number => match (cell.as_number(), value.as_number()) {
                (Some(c), Some(v)) => {
                    let v2 = value2.and_then(CellValue::as_number);
                    match_ordered(self.operator, c, v, v2)
                }
                _ => false,
            },
            FilterKind::Date => match (cell.as_timestamp(), value.as_timestamp()) {
                (Some(c), Some(v)) => {
                    let v2 = value2.and_then(CellValue::as_timestamp);
                    match_ordered(self.operator, c, v, v2)
                }
                _ => false,
            },
            FilterKind::Boolean => match (as_flag(cell), as_flag(value)) {
                (Some(c), Some(v)) => match self.operator {
                    FilterOperator::Is => c == v,
                    FilterOperator::IsNot => c != v,
                    _ => false,
                },
                _ => false,
            },
        }
    }
}

/// Operands that are absent or null count as missing
fn operand(value: &Option<CellValue>) -> Option<&CellValue> {
    value.as_ref().filter(|v| !v.is_null())
}

fn as_flag(value: &CellValue) -> Option<bool> {
    match value {
        CellValue::Bool(b) => Some(*b),
        CellValue::Text(s) if s.eq_ignore_ascii_case("true") => Some(true),
        CellValue::Text(s) if s.eq_ignore_ascii_case("false") => Some(false),
        _ => None,
    }
}

fn match_text(operator: FilterOperator, cell: &CellValue, value: &CellValue) -> bool {
    let haystack = cell.display_text().to_lowercase();
    let needle = value.display_text().to_lowercase();
    match operator {
        FilterOperator::Contains => haystack.contains(&needle),
        FilterOperator::Equals => haystack == needle,
        FilterOperator::StartsWith => haystack.starts_with(&needle),
        FilterOperator::EndsWith => haystack.ends_with(&needle),
        _ => false,
    }
}

/// Bounds of `Between` are inclusive and may be given in either order
fn match_ordered<T: PartialOrd + Copy>(operator: FilterOperator, cell: T, value: T, value2: Option<T>) -> bool {
    match operator {
        FilterOperator::Equals => cell == value,
        FilterOperator::Gt => cell > value,
        FilterOperator::Lt => cell < value,
        FilterOperator::Gte => cell >= value,
        FilterOperator::Lte => cell <= value,
        FilterOperator::Between => match value2 {
            Some(high) => {
                let (lo, hi) = if value <= high { (value, high) } else { (high, value) };
                cell >= lo && cell <= hi
            }
            None => false,
        },
        _ => false,
    }
}

/// Active filters for one grid, at most one per column
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterSet {
    filters: Vec<TableFilter>,
}

impl FilterSet {
    pub fn new() -> Self {
        FilterSet {
            filters: Vec::new(),
        }
    }

    /// Installs a filter, replacing any existing filter on the same column.
    ///
    /// The column must exist and be filterable, the filter kind must suit
    /// the column type, and the operator must belong to the kind.
    pub fn set_filter(&mut self, schema: &DynamicTableSchema, filter: TableFilter) -> Result<()> {
        let column = schema.require_column(&filter.column_key)?;
        if !column.filterable {
            return Err(GridError::ColumnNotFilterable(column.key.clone()));
        }
        if !filter.kind.applies_to(column.column_type) || !filter.kind.supports(filter.operator) {
            return Err(GridError::InvalidOperator {
                operator: filter.operator.to_string(),
                kind: filter.kind.to_string(),
            });
        }

        match self
            .filters
            .iter_mut()
            .find(|f| f.column_key == filter.column_key)
        {
            Some(existing) => *existing = filter,
            None => self.filters.push(filter),
        }
        Ok(())
    }

    pub fn remove_filter(&mut self, column_key: &str) -> bool {
        let before = self.filters.len();
        self.filters.retain(|f| f.column_key != column_key);
        self.filters.len() != before
    }

    pub fn clear(&mut self) {
        self.filters.clear();
    }

    pub fn filters(&self) -> &[TableFilter] {
        &self.filters
    }

    pub fn filter_for(&self, column_key: &str) -> Option<&TableFilter> {
        self.filters.iter().find(|f| f.column_key == column_key)
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    /// AND across every active filter
    pub fn matches(&self, row: &Row) -> bool {
        self.filters.iter().all(|f| f.matches(row))
    }

    /// Returns the rows that pass, in their original order
    pub fn apply(&self, rows: &[Row]) -> Vec<Row> {
        rows.iter().filter(|r| self.matches(r)).cloned().collect()
    }

    /// Input positions of the rows that pass
    pub fn matching_indices(&self, rows: &[Row]) -> Vec<usize> {
        rows.iter()
            .enumerate()
            .filter(|(_, r)| self.matches(r))
            .map(|(i, _)| i)
            .collect()
    }
}
