/// Error types for DynTable
///
/// Only caller mistakes surface as errors. Conditions the grid absorbs
/// (undo past the first state, updating an untracked schema) are reported
/// through `Option` or ignored, never through `GridError`.

use thiserror::Error;

/// Errors raised by schema, filter, grid and configuration operations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GridError {
    #[error("Schema '{0}' not found")]
    SchemaNotFound(String),

    #[error("Column '{0}' not found")]
    ColumnNotFound(String),

    #[error("Column '{0}' already exists in schema")]
    DuplicateColumn(String),

    #[error("Row '{0}' not found")]
    RowNotFound(String),

    #[error("Row is missing an 'id' value")]
    MissingRowId,

    #[error("Row '{0}' already exists")]
    DuplicateRowId(String),

    #[error("Column '{0}' is not editable")]
    ColumnNotEditable(String),

    #[error("Type mismatch for column '{column}': expected {expected}, got {found}")]
    TypeMismatch {
        column: String,
        expected: String,
        found: String,
    },

    #[error("Column '{0}' is not sortable")]
    ColumnNotSortable(String),

    #[error("Column '{0}' is not filterable")]
    ColumnNotFilterable(String),

    #[error("Operator {operator} is not valid for a {kind} filter")]
    InvalidOperator { operator: String, kind: String },

    #[error("Column index {index} out of range [0, {len})")]
    ColumnIndexOutOfRange { index: usize, len: usize },

    #[error("Page size must be greater than zero")]
    InvalidPageSize,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, GridError>;
