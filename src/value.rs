/// DynTable Cell Values and Rows
///
/// A `Row` is an open mapping from column key to `CellValue`. Rows carry a
/// stable `id` field that identifies them across snapshots.
///
/// # Equality
///
/// Row equality is structural and independent of field insertion order.
/// A key that is absent from one row compares equal to an explicit `Null`
/// in the other, so `{id: 1}` and `{id: 1, note: null}` are the same row.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// Scalar column types a schema can declare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    String,
    Boolean,
    Number,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnType::String => "string",
            ColumnType::Boolean => "boolean",
            ColumnType::Number => "number",
        };
        f.write_str(name)
    }
}

/// A single cell: a scalar, an array of scalars, or null
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    Array(Vec<CellValue>),
}

static NULL: CellValue = CellValue::Null;

impl CellValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            CellValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Number(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            CellValue::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[CellValue]> {
        match self {
            CellValue::Array(v) => Some(v),
            _ => None,
        }
    }

    /// Numeric reading used by sorting and filtering.
    ///
    /// Numbers and numeric strings qualify; the result is always finite.
    pub fn as_number(&self) -> Option<f64> {
        let n = match self {
            CellValue::Number(v) => *v,
            CellValue::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return None;
                }
                trimmed.parse::<f64>().ok()?
            }
            _ => return None,
        };
        n.is_finite().then_some(n)
    }

    /// Millisecond timestamp for text cells holding a recognizable date.
    ///
    /// Accepts RFC 3339, `YYYY-MM-DD`, `YYYY-MM-DD HH:MM:SS`,
    /// `YYYY-MM-DDTHH:MM:SS` and `MM/DD/YYYY`.
    pub fn as_timestamp(&self) -> Option<i64> {
        let s = self.as_str()?.trim();
        if s.is_empty() {
            return None;
        }
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Some(dt.timestamp_millis());
        }
        for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"] {
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
                return Some(dt.and_utc().timestamp_millis());
            }
        }
        for fmt in ["%Y-%m-%d", "%m/%d/%Y"] {
            if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
                return d
                    .and_hms_opt(0, 0, 0)
                    .map(|dt| dt.and_utc().timestamp_millis());
            }
        }
        None
    }

    /// Text used for display and for case-insensitive comparisons
    pub fn display_text(&self) -> String {
        match self {
            CellValue::Null => String::new(),
            CellValue::Bool(b) => b.to_string(),
            CellValue::Number(n) => format_number(*n),
            CellValue::Text(s) => s.clone(),
            CellValue::Array(items) => items
                .iter()
                .map(CellValue::display_text)
                .collect::<Vec<_>>()
                .join(", "),
        }
    }

    /// Short type label used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            CellValue::Null => "null",
            CellValue::Bool(_) => "boolean",
            CellValue::Number(_) => "number",
            CellValue::Text(_) => "string",
            CellValue::Array(_) => "array",
        }
    }

    /// Returns true if this value may be stored in a column of the given type.
    ///
    /// Null is always accepted. Arrays are accepted only for array or
    /// multi-select columns, and every element must match the scalar type.
    pub fn conforms_to(&self, column_type: ColumnType, allows_array: bool) -> bool {
        match (self, column_type) {
            (CellValue::Null, _) => true,
            (CellValue::Bool(_), ColumnType::Boolean) => true,
            (CellValue::Number(_), ColumnType::Number) => true,
            (CellValue::Text(_), ColumnType::String) => true,
            (CellValue::Array(items), _) => {
                allows_array
                    && items
                        .iter()
                        .all(|item| !matches!(item, CellValue::Array(_)) && item.conforms_to(column_type, false))
            }
            _ => false,
        }
    }
}

fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// Order-independent recursive equality for cells.
///
/// `NaN` equals `NaN` so that comparisons are deterministic.
pub fn deep_equal(a: &CellValue, b: &CellValue) -> bool {
    match (a, b) {
        (CellValue::Null, CellValue::Null) => true,
        (CellValue::Bool(x), CellValue::Bool(y)) => x == y,
        (CellValue::Number(x), CellValue::Number(y)) => x == y || (x.is_nan() && y.is_nan()),
        (CellValue::Text(x), CellValue::Text(y)) => x == y,
        (CellValue::Array(xs), CellValue::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| deep_equal(x, y))
        }
        _ => false,
    }
}

impl PartialEq for CellValue {
    fn eq(&self, other: &Self) -> bool {
        deep_equal(self, other)
    }
}

impl From<bool> for CellValue {
    fn from(v: bool) -> Self {
        CellValue::Bool(v)
    }
}

impl From<f64> for CellValue {
    fn from(v: f64) -> Self {
        CellValue::Number(v)
    }
}

impl From<i64> for CellValue {
    fn from(v: i64) -> Self {
        CellValue::Number(v as f64)
    }
}

impl From<i32> for CellValue {
    fn from(v: i32) -> Self {
        CellValue::Number(v as f64)
    }
}

impl From<&str> for CellValue {
    fn from(v: &str) -> Self {
        CellValue::Text(v.to_string())
    }
}

impl From<String> for CellValue {
    fn from(v: String) -> Self {
        CellValue::Text(v)
    }
}

impl From<Vec<CellValue>> for CellValue {
    fn from(v: Vec<CellValue>) -> Self {
        CellValue::Array(v)
    }
}

impl<T: Into<CellValue>> From<Option<T>> for CellValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(CellValue::Null)
    }
}

/// Stable row identity taken from a row's `id` field
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RowId {
    Int(i64),
    Text(String),
}

impl RowId {
    /// Reads an identity out of a cell. Integral numbers in `i64` range
    /// become `Int`, non-empty text becomes `Text`; anything else has no
    /// identity. Fractional or out-of-range numbers are not ids, so they
    /// never collide with a text id spelled the same way.
    pub fn from_cell(value: &CellValue) -> Option<RowId> {
        match value {
            CellValue::Number(n)
                if n.fract() == 0.0 && *n >= i64::MIN as f64 && *n < i64::MAX as f64 =>
            {
                Some(RowId::Int(*n as i64))
            }
            CellValue::Text(s) if !s.is_empty() => Some(RowId::Text(s.clone())),
            _ => None,
        }
    }

    pub fn to_cell(&self) -> CellValue {
        match self {
            RowId::Int(n) => CellValue::Number(*n as f64),
            RowId::Text(s) => CellValue::Text(s.clone()),
        }
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowId::Int(n) => write!(f, "{}", n),
            RowId::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for RowId {
    fn from(v: i64) -> Self {
        RowId::Int(v)
    }
}

impl From<&str> for RowId {
    fn from(v: &str) -> Self {
        RowId::Text(v.to_string())
    }
}

/// Name of the identity field every row carries
pub const ID_FIELD: &str = "id";

/// One row of table data
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row {
    fields: HashMap<String, CellValue>,
}

impl Row {
    pub fn new() -> Self {
        Row {
            fields: HashMap::new(),
        }
    }

    /// Builder-style setter
    pub fn with(mut self, key: impl Into<String>, value: impl Into<CellValue>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Value for a column; absent keys read as `Null`
    pub fn get(&self, key: &str) -> &CellValue {
        self.fields.get(key).unwrap_or(&NULL)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: CellValue) -> Option<CellValue> {
        self.fields.insert(key.into(), value)
    }

    pub fn remove(&mut self, key: &str) -> Option<CellValue> {
        self.fields.remove(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn fields(&self) -> &HashMap<String, CellValue> {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn id(&self) -> Option<RowId> {
        RowId::from_cell(self.get(ID_FIELD))
    }

    /// Keys whose values differ between two rows, sorted
    pub fn changed_keys(&self, other: &Row) -> Vec<String> {
        let keys: BTreeSet<&str> = self.keys().chain(other.keys()).collect();
        keys.into_iter()
            .filter(|k| !deep_equal(self.get(k), other.get(k)))
            .map(str::to_string)
            .collect()
    }
}

impl From<HashMap<String, CellValue>> for Row {
    fn from(fields: HashMap<String, CellValue>) -> Self {
        Row { fields }
    }
}

impl FromIterator<(String, CellValue)> for Row {
    fn from_iter<I: IntoIterator<Item = (String, CellValue)>>(iter: I) -> Self {
        Row {
            fields: iter.into_iter().collect(),
        }
    }
}

/// Structural row equality over the union of both rows' keys
pub fn rows_equal(a: &Row, b: &Row) -> bool {
    a.keys()
        .chain(b.keys())
        .all(|k| deep_equal(a.get(k), b.get(k)))
}

impl PartialEq for Row {
    fn eq(&self, other: &Self) -> bool {
        rows_equal(self, other)
    }
}

/// Position-by-position equality of two row sequences
pub fn row_sets_equal(a: &[Row], b: &[Row]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| rows_equal(x, y))
}
