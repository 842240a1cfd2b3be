/// Grid Sessions
///
/// A `GridSession` owns one table being edited: its schema, the working
/// rows, the sort/filter/page state and the undo history. It reads rows
/// through filter → sort → page, and records every edit in the history
/// and in the shared change ledger.
///
/// Sessions never perform I/O. Anything that must reach storage or other
/// components leaves through `GridEvent`s delivered to subscribed
/// observers, and foreign-key labels come from a `ForeignKeyResolver`
/// supplied by the caller.
///
/// # Examples
///
/// ```
/// use dyntable::{
///     ChangeTracker, ColumnDefinition, ColumnType, DynamicTableSchema, GridConfig,
///     GridSession, Row, RowId, SchemaRegistry,
/// };
/// use std::cell::RefCell;
/// use std::rc::Rc;
///
/// let mut registry = SchemaRegistry::new();
/// registry.register(DynamicTableSchema::with_columns(
///     "rates",
///     "Rates",
///     vec![ColumnDefinition::new("rate", "Rate", ColumnType::Number)],
/// ));
///
/// let tracker = Rc::new(RefCell::new(ChangeTracker::new()));
/// let rows = vec![Row::new().with("id", 1).with("rate", 4.5)];
/// let mut grid = GridSession::load(&registry, "rates", rows, tracker.clone(), &GridConfig::default()).unwrap();
///
/// grid.update_cell(&RowId::Int(1), "rate", 4.75.into()).unwrap();
/// assert_eq!(tracker.borrow().get_changes_summary()[0].modified, 1);
///
/// grid.undo();
/// assert!(tracker.borrow().get_changes_summary().is_empty());
/// ```

use crate::config::GridConfig;
use crate::error::{GridError, Result};
use crate::filter::{FilterSet, TableFilter};
use crate::history::UndoRedoHistory;
use crate::pagination::Paginator;
use crate::schema::{ColumnDefinition, DynamicTableSchema, ForeignKey, SchemaRegistry};
use crate::sort::{sort_rows, SortDirection, SortState};
use crate::tracking::{ChangeSummary, ChangeTracker, TableDiff};
use crate::value::{CellValue, Row, RowId, ID_FIELD};
use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

/// Looks up display labels for foreign-key cells
pub trait ForeignKeyResolver {
    /// Label for `value` in `foreign_key.source_table`, or None if unknown
    fn resolve_label(&self, foreign_key: &ForeignKey, value: &CellValue) -> Option<String>;
}

/// Notifications emitted by a session
#[derive(Debug, Clone, PartialEq)]
pub enum GridEvent {
    /// One cell changed; the tuple a persistence layer writes back
    CellEdited {
        schema_id: String,
        row_id: RowId,
        column_key: String,
        value: CellValue,
    },
    /// The row set changed shape (rows added, deleted, restored by undo)
    RowsReplaced { schema_id: String, rows: Vec<Row> },
    /// Columns were added, removed, reordered or restored
    SchemaChanged { schema: DynamicTableSchema },
    /// Undo/redo availability after any history movement
    HistoryChanged { can_undo: bool, can_redo: bool },
    PageChanged { page: usize, page_size: usize },
}

pub type GridObserver = Box<dyn FnMut(&GridEvent)>;

type Observers = Rc<RefCell<Vec<GridObserver>>>;

fn notify(observers: &RefCell<Vec<GridObserver>>, event: &GridEvent) {
    for observer in observers.borrow_mut().iter_mut() {
        observer(event);
    }
}

/// A required cell that is still empty
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingValue {
    pub row_id: Option<RowId>,
    pub column_key: String,
}

pub struct GridSession {
    schema: DynamicTableSchema,
    /// Schema the tracking baseline was taken against
    baseline_schema: DynamicTableSchema,
    rows: Vec<Row>,
    sort: SortState,
    filters: FilterSet,
    paginator: Paginator,
    history: UndoRedoHistory,
    tracker: Rc<RefCell<ChangeTracker>>,
    observers: Observers,
}

impl GridSession {
    /// Opens a session on a registered schema.
    ///
    /// Fails with `SchemaNotFound` when the registry has no such schema;
    /// no default schema is ever substituted. Loading starts a fresh
    /// tracking baseline and seeds the history with the loaded rows.
    pub fn load(
        registry: &SchemaRegistry,
        schema_id: &str,
        rows: Vec<Row>,
        tracker: Rc<RefCell<ChangeTracker>>,
        config: &GridConfig,
    ) -> Result<Self> {
        config.validate()?;
        let schema = registry.require_schema(schema_id)?.clone();

        let mut seen = HashSet::new();
        for row in &rows {
            match row.id() {
                Some(id) if !seen.insert(id.clone()) => {
                    log::warn!("schema '{}': duplicate row id {}", schema_id, id);
                }
                None => log::warn!("schema '{}': row without id", schema_id),
                _ => {}
            }
        }

        tracker.borrow_mut().start_tracking(schema_id, &rows);
        let history = UndoRedoHistory::with_limit(rows.clone(), schema.clone(), config.history_limit);

        // Page movement reaches observers through the paginator's own callback
        let observers: Observers = Rc::new(RefCell::new(Vec::new()));
        let mut paginator = Paginator::new(rows.len(), config.page_size)?;
        let sink = observers.clone();
        paginator.on_page_change(move |page, page_size| {
            notify(&sink, &GridEvent::PageChanged { page, page_size });
        });

        log::debug!("grid '{}' loaded with {} rows", schema_id, rows.len());
        Ok(GridSession {
            baseline_schema: schema.clone(),
            schema,
            rows,
            sort: SortState::new(),
            filters: FilterSet::new(),
            paginator,
            history,
            tracker,
            observers,
        })
    }

    pub fn schema_id(&self) -> &str {
        &self.schema.id
    }

    pub fn schema(&self) -> &DynamicTableSchema {
        &self.schema
    }

    /// Working rows in storage order
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn sort_state(&self) -> &SortState {
        &self.sort
    }

    pub fn filters(&self) -> &FilterSet {
        &self.filters
    }

    pub fn paginator(&self) -> &Paginator {
        &self.paginator
    }

    pub fn history(&self) -> &UndoRedoHistory {
        &self.history
    }

    pub fn subscribe<F>(&mut self, observer: F)
    where
        F: FnMut(&GridEvent) + 'static,
    {
        self.observers.borrow_mut().push(Box::new(observer));
    }

    fn emit(&self, event: GridEvent) {
        notify(&self.observers, &event);
    }

    // ==================== Read path ====================

    /// Rows passing every active filter, in storage order
    pub fn filtered_rows(&self) -> Vec<Row> {
        self.filters.apply(&self.rows)
    }

    pub fn filtered_count(&self) -> usize {
        self.rows.iter().filter(|r| self.filters.matches(r)).count()
    }

    /// Filtered and sorted rows, all pages
    pub fn sorted_rows(&self) -> Vec<Row> {
        sort_rows(&self.filtered_rows(), self.sort.keys())
    }

    /// The rows on the current page
    pub fn visible_rows(&self) -> Vec<Row> {
        let sorted = self.sorted_rows();
        let range = self.paginator.page_range();
        let end = range.end.min(sorted.len());
        let start = range.start.min(end);
        sorted[start..end].to_vec()
    }

    pub fn row(&self, row_id: &RowId) -> Option<&Row> {
        self.rows.iter().find(|r| r.id().as_ref() == Some(row_id))
    }

    /// Text to show for a cell. Foreign-key columns use the resolver's
    /// label when one is available and fall back to the raw value.
    pub fn display_value(
        &self,
        row: &Row,
        column_key: &str,
        resolver: Option<&dyn ForeignKeyResolver>,
    ) -> String {
        let value = row.get(column_key);
        let foreign_key = self
            .schema
            .column(column_key)
            .and_then(|c| c.foreign_key.as_ref());

        if let (Some(fk), Some(resolver)) = (foreign_key, resolver) {
            if !value.is_null() {
                if let Some(label) = resolver.resolve_label(fk, value) {
                    return label;
                }
            }
        }
        value.display_text()
    }

    /// Required cells that are null, in storage order
    pub fn missing_required_values(&self) -> Vec<MissingValue> {
        let required: Vec<&ColumnDefinition> =
            self.schema.columns.iter().filter(|c| c.is_required).collect();

        let mut missing = Vec::new();
        for row in &self.rows {
            for column in &required {
                if row.get(&column.key).is_null() {
                    missing.push(MissingValue {
                        row_id: row.id(),
                        column_key: column.key.clone(),
                    });
                }
            }
        }
        missing
    }

    // ==================== Sorting ====================

    fn sortable_column(&self, column_key: &str) -> Result<()> {
        let column = self.schema.require_column(column_key)?;
        if !column.sortable {
            return Err(GridError::ColumnNotSortable(column_key.to_string()));
        }
        Ok(())
    }

    pub fn toggle_sort(&mut self, column_key: &str) -> Result<Option<SortDirection>> {
        self.sortable_column(column_key)?;
        Ok(self.sort.toggle_sort(column_key))
    }

    pub fn add_sort(&mut self, column_key: &str, direction: SortDirection) -> Result<()> {
        self.sortable_column(column_key)?;
        self.sort.add_sort(column_key, direction);
        Ok(())
    }

    pub fn remove_sort(&mut self, column_key: &str) -> bool {
        self.sort.remove_sort(column_key)
    }

    pub fn clear_all_sorts(&mut self) {
        self.sort.clear_all_sorts();
    }

    // ==================== Filtering ====================

    /// Installs a filter and returns to the first page
    pub fn set_filter(&mut self, filter: TableFilter) -> Result<()> {
        self.filters.set_filter(&self.schema, filter)?;
        self.refilter();
        Ok(())
    }

    pub fn remove_filter(&mut self, column_key: &str) -> bool {
        let removed = self.filters.remove_filter(column_key);
        if removed {
            self.refilter();
        }
        removed
    }

    pub fn clear_filters(&mut self) {
        if !self.filters.is_empty() {
            self.filters.clear();
            self.refilter();
        }
    }

    fn refilter(&mut self) {
        self.paginator.set_total_count(self.filtered_count());
        self.go_to_page(1);
    }

    // ==================== Pagination ====================

    pub fn go_to_page(&mut self, page: usize) -> usize {
        self.paginator.go_to_page(page)
    }

    pub fn next_page(&mut self) -> usize {
        self.paginator.next_page()
    }

    pub fn previous_page(&mut self) -> usize {
        self.paginator.previous_page()
    }

    pub fn change_page_size(&mut self, page_size: usize) -> Result<()> {
        self.paginator.change_page_size(page_size)
    }

    // ==================== Row edits ====================

    fn row_position(&self, row_id: &RowId) -> Result<usize> {
        self.rows
            .iter()
            .position(|r| r.id().as_ref() == Some(row_id))
            .ok_or_else(|| GridError::RowNotFound(row_id.to_string()))
    }

    fn check_value(column: &ColumnDefinition, value: &CellValue) -> Result<()> {
        if value.conforms_to(column.column_type, column.allows_array()) {
            Ok(())
        } else {
            Err(GridError::TypeMismatch {
                column: column.key.clone(),
                expected: column.column_type.to_string(),
                found: value.type_name().to_string(),
            })
        }
    }

    /// Writes one cell.
    ///
    /// Derived (`Output`) and non-editable columns are rejected, as is the
    /// row's `id`. Writing the value a cell already holds is a no-op and
    /// records nothing.
    pub fn update_cell(&mut self, row_id: &RowId, column_key: &str, value: CellValue) -> Result<()> {
        let column = self.schema.require_column(column_key)?;
        if column_key == ID_FIELD || !column.accepts_input() {
            log::warn!("rejected edit of read-only column '{}'", column_key);
            return Err(GridError::ColumnNotEditable(column_key.to_string()));
        }
        Self::check_value(column, &value)?;
        let action = format!("Edit {}", column.name);

        let pos = self.row_position(row_id)?;
        if self.rows[pos].get(column_key) == &value {
            return Ok(());
        }
        self.rows[pos].set(column_key, value.clone());

        self.commit(&action);
        self.emit(GridEvent::CellEdited {
            schema_id: self.schema.id.clone(),
            row_id: row_id.clone(),
            column_key: column_key.to_string(),
            value,
        });
        Ok(())
    }

    /// Appends a row. The row needs a fresh id and values that fit the
    /// schema's column types; unknown keys are kept as-is.
    pub fn add_row(&mut self, row: Row) -> Result<RowId> {
        let id = row.id().ok_or(GridError::MissingRowId)?;
        if self.row_position(&id).is_ok() {
            return Err(GridError::DuplicateRowId(id.to_string()));
        }
        for column in &self.schema.columns {
            if column.key != ID_FIELD {
                Self::check_value(column, row.get(&column.key))?;
            }
        }

        self.rows.push(row);
        self.commit("Add row");
        self.emit_rows();
        Ok(id)
    }

    pub fn delete_row(&mut self, row_id: &RowId) -> Result<Row> {
        let pos = self.row_position(row_id)?;
        let removed = self.rows.remove(pos);
        self.commit("Delete row");
        self.emit_rows();
        Ok(removed)
    }

    // ==================== Column edits ====================

    pub fn add_column(&mut self, column: ColumnDefinition) -> Result<()> {
        let action = format!("Add column {}", column.name);
        self.schema.add_column(column)?;
        self.commit(&action);
        self.emit_schema();
        Ok(())
    }

    /// Removes a column, its values in every row, and any sort or filter on it
    pub fn remove_column(&mut self, column_key: &str) -> Result<ColumnDefinition> {
        let removed = self.schema.remove_column(column_key)?;
        for row in self.rows.iter_mut() {
            row.remove(column_key);
        }
        self.sort.remove_sort(column_key);
        self.filters.remove_filter(column_key);

        self.commit(&format!("Remove column {}", removed.name));
        self.emit_schema();
        self.emit_rows();
        Ok(removed)
    }

    pub fn move_column(&mut self, from: usize, to: usize) -> Result<()> {
        if from == to {
            return Ok(());
        }
        self.schema.move_column(from, to)?;
        self.commit("Move column");
        self.emit_schema();
        Ok(())
    }

    /// Writes the session's schema back to the registry
    pub fn commit_schema(&self, registry: &mut SchemaRegistry) {
        registry.update_schema(&self.schema.id, self.schema.clone());
    }

    // ==================== History ====================

    fn commit(&mut self, action: &str) {
        self.history.save_state(&self.rows, &self.schema, action);
        self.tracker
            .borrow_mut()
            .update_tracking(&self.schema.id, &self.rows);
        self.paginator.set_total_count(self.filtered_count());
        self.emit_history();
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Restores the previous snapshot. Returns false, changing nothing,
    /// when there is nothing to undo.
    pub fn undo(&mut self) -> bool {
        let restored = match self.history.undo() {
            Some(state) => (state.data.clone(), state.schema.clone()),
            None => return false,
        };
        self.restore(restored);
        true
    }

    /// Re-applies the next snapshot. Returns false when there is none.
    pub fn redo(&mut self) -> bool {
        let restored = match self.history.redo() {
            Some(state) => (state.data.clone(), state.schema.clone()),
            None => return false,
        };
        self.restore(restored);
        true
    }

    fn restore(&mut self, (rows, schema): (Vec<Row>, DynamicTableSchema)) {
        let schema_changed = schema != self.schema;
        self.rows = rows;
        self.schema = schema;

        self.drop_stale_keys();

        self.tracker
            .borrow_mut()
            .update_tracking(&self.schema.id, &self.rows);
        self.paginator.set_total_count(self.filtered_count());

        if schema_changed {
            self.emit_schema();
        }
        self.emit_rows();
        self.emit_history();
    }

    /// Drops sort keys and filters whose column no longer exists
    fn drop_stale_keys(&mut self) {
        let stale_sorts: Vec<String> = self
            .sort
            .keys()
            .iter()
            .filter(|k| self.schema.column(&k.column_key).is_none())
            .map(|k| k.column_key.clone())
            .collect();
        for key in stale_sorts {
            self.sort.remove_sort(&key);
        }
        let stale_filters: Vec<String> = self
            .filters
            .filters()
            .iter()
            .filter(|f| self.schema.column(&f.column_key).is_none())
            .map(|f| f.column_key.clone())
            .collect();
        for key in stale_filters {
            self.filters.remove_filter(&key);
        }
    }

    // ==================== Change tracking ====================

    /// Change counts for every schema in the shared ledger
    pub fn changes_summary(&self) -> Vec<ChangeSummary> {
        self.tracker.borrow().get_changes_summary()
    }

    pub fn has_changes(&self) -> bool {
        self.tracker
            .borrow()
            .get_table_changes(&self.schema.id)
            .map(|t| t.has_changes())
            .unwrap_or(false)
    }

    /// Row-level diff against the tracking baseline
    pub fn table_diff(&self) -> Option<TableDiff> {
        self.tracker.borrow().table_diff(&self.schema.id)
    }

    /// Makes the current rows the new baseline, typically after they were
    /// persisted. History restarts from here.
    pub fn accept_changes(&mut self) {
        self.baseline_schema = self.schema.clone();
        self.tracker
            .borrow_mut()
            .start_tracking(&self.schema.id, &self.rows);
        self.history.reset(self.rows.clone(), self.schema.clone());
        self.emit_history();
    }

    /// Throws away every edit since the baseline, restoring the rows and
    /// the schema as they were when the baseline was taken.
    pub fn discard_changes(&mut self) {
        let original = match self.tracker.borrow().get_table_changes(&self.schema.id) {
            Some(entry) => entry.original_data().to_vec(),
            None => return,
        };
        self.schema = self.baseline_schema.clone();
        self.drop_stale_keys();

        self.rows = original;
        self.tracker
            .borrow_mut()
            .start_tracking(&self.schema.id, &self.rows);
        self.history.reset(self.rows.clone(), self.schema.clone());
        self.paginator.set_total_count(self.filtered_count());

        self.emit_schema();
        self.emit_rows();
        self.emit_history();
    }

    // ==================== Events ====================

    fn emit_rows(&mut self) {
        let event = GridEvent::RowsReplaced {
            schema_id: self.schema.id.clone(),
            rows: self.rows.clone(),
        };
        self.emit(event);
    }

    fn emit_schema(&mut self) {
        let event = GridEvent::SchemaChanged {
            schema: self.schema.clone(),
        };
        self.emit(event);
    }

    fn emit_history(&mut self) {
        let event = GridEvent::HistoryChanged {
            can_undo: self.history.can_undo(),
            can_redo: self.history.can_redo(),
        };
        self.emit(event);
    }
}

impl fmt::Debug for GridSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GridSession")
            .field("schema_id", &self.schema.id)
            .field("rows", &self.rows.len())
            .field("sort", &self.sort)
            .field("filters", &self.filters.len())
            .field("paginator", &self.paginator)
            .field("history", &self.history.len())
            .field("observers", &self.observers.borrow().len())
            .finish()
    }
}
