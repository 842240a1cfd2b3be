/// DynTable Schema Definitions
///
/// A `DynamicTableSchema` is the ordered list of column definitions that
/// describes one logical table. Column order is display order.
///
/// # Examples
///
/// ```
/// use dyntable::{ColumnDefinition, ColumnType, DynamicTableSchema};
///
/// let mut schema = DynamicTableSchema::new("pricing-tiers", "Pricing Tiers");
/// schema.add_column(ColumnDefinition::new("tier", "Tier", ColumnType::String)).unwrap();
/// schema.add_column(ColumnDefinition::new("rate", "Rate", ColumnType::Number)).unwrap();
///
/// assert_eq!(schema.len(), 2);
/// assert_eq!(schema.get_column_index("rate"), Some(1));
/// ```

use crate::error::{GridError, Result};
use crate::value::ColumnType;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

/// Backend tables the grid may reference.
///
/// Foreign-key columns and persistence requests name their table through
/// this enumeration rather than through free-form strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendTable {
    Applications,
    PricingRules,
    PricingTables,
    VehicleConfigurations,
    ReportDefinitions,
    Dashboards,
    ApprovalRequests,
    Dealers,
    Lenders,
    Products,
}

impl BackendTable {
    pub const ALL: [BackendTable; 10] = [
        BackendTable::Applications,
        BackendTable::PricingRules,
        BackendTable::PricingTables,
        BackendTable::VehicleConfigurations,
        BackendTable::ReportDefinitions,
        BackendTable::Dashboards,
        BackendTable::ApprovalRequests,
        BackendTable::Dealers,
        BackendTable::Lenders,
        BackendTable::Products,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BackendTable::Applications => "applications",
            BackendTable::PricingRules => "pricing_rules",
            BackendTable::PricingTables => "pricing_tables",
            BackendTable::VehicleConfigurations => "vehicle_configurations",
            BackendTable::ReportDefinitions => "report_definitions",
            BackendTable::Dashboards => "dashboards",
            BackendTable::ApprovalRequests => "approval_requests",
            BackendTable::Dealers => "dealers",
            BackendTable::Lenders => "lenders",
            BackendTable::Products => "products",
        }
    }
}

impl FromStr for BackendTable {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        BackendTable::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("Unknown backend table: '{}'", s))
    }
}

impl fmt::Display for BackendTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a column is edited by the user or derived
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InputType {
    #[default]
    Input,
    Output,
}

/// Reference from a column to a row in another backend table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForeignKey {
    pub source_table: BackendTable,
    pub source_column: String,
    /// Column of the source table shown instead of the raw key
    pub display_column: String,
}

/// One column of a dynamic table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDefinition {
    pub id: String,
    pub key: String,
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    #[serde(default)]
    pub input_type: InputType,
    #[serde(default)]
    pub is_required: bool,
    #[serde(default = "default_true")]
    pub sortable: bool,
    #[serde(default = "default_true")]
    pub filterable: bool,
    #[serde(default = "default_true")]
    pub editable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreign_key: Option<ForeignKey>,
    #[serde(default)]
    pub is_multi_select: bool,
    #[serde(default)]
    pub is_array: bool,
}

fn default_true() -> bool {
    true
}

impl ColumnDefinition {
    /// Create an editable, sortable, filterable input column.
    /// The column id defaults to its key.
    pub fn new(key: impl Into<String>, name: impl Into<String>, column_type: ColumnType) -> Self {
        let key = key.into();
        ColumnDefinition {
            id: key.clone(),
            key,
            name: name.into(),
            column_type,
            input_type: InputType::Input,
            is_required: false,
            sortable: true,
            filterable: true,
            editable: true,
            width: None,
            foreign_key: None,
            is_multi_select: false,
            is_array: false,
        }
    }

    /// Derived column; never editable
    pub fn output(mut self) -> Self {
        self.input_type = InputType::Output;
        self.editable = false;
        self
    }

    pub fn required(mut self) -> Self {
        self.is_required = true;
        self
    }

    pub fn with_width(mut self, width: u32) -> Self {
        self.width = Some(width);
        self
    }

    pub fn with_sortable(mut self, sortable: bool) -> Self {
        self.sortable = sortable;
        self
    }

    pub fn with_filterable(mut self, filterable: bool) -> Self {
        self.filterable = filterable;
        self
    }

    pub fn with_editable(mut self, editable: bool) -> Self {
        self.editable = editable;
        self
    }

    pub fn multi_select(mut self) -> Self {
        self.is_multi_select = true;
        self
    }

    pub fn array(mut self) -> Self {
        self.is_array = true;
        self
    }

    pub fn with_foreign_key(
        mut self,
        source_table: BackendTable,
        source_column: impl Into<String>,
        display_column: impl Into<String>,
    ) -> Self {
        self.foreign_key = Some(ForeignKey {
            source_table,
            source_column: source_column.into(),
            display_column: display_column.into(),
        });
        self
    }

    pub fn is_foreign_key(&self) -> bool {
        self.foreign_key.is_some()
    }

    /// True when cells of this column may hold arrays
    pub fn allows_array(&self) -> bool {
        self.is_array || self.is_multi_select
    }

    /// True when users may write to this column
    pub fn accepts_input(&self) -> bool {
        self.editable && self.input_type == InputType::Input
    }
}

/// Ordered column set describing one logical table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicTableSchema {
    pub id: String,
    pub name: String,
    pub columns: Vec<ColumnDefinition>,
}

impl DynamicTableSchema {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        DynamicTableSchema {
            id: id.into(),
            name: name.into(),
            columns: Vec::new(),
        }
    }

    pub fn with_columns(
        id: impl Into<String>,
        name: impl Into<String>,
        columns: Vec<ColumnDefinition>,
    ) -> Self {
        DynamicTableSchema {
            id: id.into(),
            name: name.into(),
            columns,
        }
    }

    /// Returns the number of columns in the schema.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Returns true if the schema has no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Returns all column keys in display order.
    pub fn get_column_keys(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.key.as_str()).collect()
    }

    /// Returns the display position of a column, or None if not found.
    pub fn get_column_index(&self, key: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.key == key)
    }

    pub fn column(&self, key: &str) -> Option<&ColumnDefinition> {
        self.columns.iter().find(|c| c.key == key)
    }

    /// Like `column`, but a missing key is an error
    pub fn require_column(&self, key: &str) -> Result<&ColumnDefinition> {
        self.column(key)
            .ok_or_else(|| GridError::ColumnNotFound(key.to_string()))
    }

    /// Appends a column. Keys must stay unique within the schema.
    pub fn add_column(&mut self, column: ColumnDefinition) -> Result<()> {
        if self.get_column_index(&column.key).is_some() {
            return Err(GridError::DuplicateColumn(column.key));
        }
        self.columns.push(column);
        Ok(())
    }

    /// Inserts a column at a display position (clamped to the end).
    pub fn insert_column(&mut self, index: usize, column: ColumnDefinition) -> Result<()> {
        if self.get_column_index(&column.key).is_some() {
            return Err(GridError::DuplicateColumn(column.key));
        }
        let index = index.min(self.columns.len());
        self.columns.insert(index, column);
        Ok(())
    }

    pub fn remove_column(&mut self, key: &str) -> Result<ColumnDefinition> {
        let index = self
            .get_column_index(key)
            .ok_or_else(|| GridError::ColumnNotFound(key.to_string()))?;
        Ok(self.columns.remove(index))
    }

    /// Moves the column at `from` so that it ends up at position `to`.
    pub fn move_column(&mut self, from: usize, to: usize) -> Result<()> {
        let len = self.columns.len();
        if from >= len {
            return Err(GridError::ColumnIndexOutOfRange { index: from, len });
        }
        if to >= len {
            return Err(GridError::ColumnIndexOutOfRange { index: to, len });
        }
        let column = self.columns.remove(from);
        self.columns.insert(to, column);
        Ok(())
    }

    /// Applies an in-place edit to one column.
    ///
    /// Renaming the key to one already in use is rejected and the column is
    /// left untouched.
    pub fn update_column<F>(&mut self, key: &str, edit: F) -> Result<()>
    where
        F: FnOnce(&mut ColumnDefinition),
    {
        let index = self
            .get_column_index(key)
            .ok_or_else(|| GridError::ColumnNotFound(key.to_string()))?;

        let mut updated = self.columns[index].clone();
        edit(&mut updated);

        if updated.key != key && self.get_column_index(&updated.key).is_some() {
            return Err(GridError::DuplicateColumn(updated.key));
        }
        self.columns[index] = updated;
        Ok(())
    }

    /// Reports the first duplicated column key, if any.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for column in &self.columns {
            if !seen.insert(column.key.as_str()) {
                return Err(GridError::DuplicateColumn(column.key.clone()));
            }
        }
        Ok(())
    }
}

/// Holds the schema for each table identity in the session.
///
/// The registry stores what it is given; it does not check column keys.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: BTreeMap<String, DynamicTableSchema>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        SchemaRegistry {
            schemas: BTreeMap::new(),
        }
    }

    /// Registers a schema under its own id, replacing any previous one
    pub fn register(&mut self, schema: DynamicTableSchema) {
        self.schemas.insert(schema.id.clone(), schema);
    }

    pub fn get_schema(&self, id: &str) -> Option<&DynamicTableSchema> {
        self.schemas.get(id)
    }

    /// Fetches a schema for callers that cannot proceed without one
    pub fn require_schema(&self, id: &str) -> Result<&DynamicTableSchema> {
        self.get_schema(id)
            .ok_or_else(|| GridError::SchemaNotFound(id.to_string()))
    }

    pub fn update_schema(&mut self, id: &str, schema: DynamicTableSchema) {
        log::debug!("schema '{}' updated ({} columns)", id, schema.len());
        self.schemas.insert(id.to_string(), schema);
    }

    pub fn contains(&self, id: &str) -> bool {
        self.schemas.contains_key(id)
    }

    pub fn schema_ids(&self) -> Vec<&str> {
        self.schemas.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}
