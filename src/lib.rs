/// DynTable - Schema-Driven Data Grid Engine
///
/// An in-memory engine for editable tables whose shape is described at
/// runtime by a schema: multi-key sorting, per-column filters, pagination,
/// change tracking against a baseline, and undo/redo history.
///
/// The engine performs no I/O. Rows come in already loaded, and edits go
/// out as events for a persistence layer to write back.

pub mod error;
pub mod value;
pub mod schema;
pub mod sort;
pub mod filter;
pub mod tracking;
pub mod history;
pub mod pagination;
pub mod config;
pub mod grid;

pub use error::{GridError, Result};
pub use value::{deep_equal, row_sets_equal, rows_equal, CellValue, ColumnType, Row, RowId, ID_FIELD};
pub use schema::{BackendTable, ColumnDefinition, DynamicTableSchema, ForeignKey, InputType, SchemaRegistry};
pub use sort::{compare_cells, compare_rows, sort_rows, sorted_indices, SortDirection, SortState, TableSort};
pub use filter::{FilterKind, FilterOperator, FilterSet, TableFilter};
pub use tracking::{diff_rows, ChangeCounts, ChangeSummary, ChangeTracker, ModifiedRow, TableDiff, TrackedChanges};
pub use history::{UndoRedoHistory, UndoRedoState, DEFAULT_HISTORY_LIMIT, INITIAL_ACTION};
pub use pagination::{PageChangeCallback, Paginator};
pub use config::{GridConfig, DEFAULT_PAGE_SIZE};
pub use grid::{ForeignKeyResolver, GridEvent, GridObserver, GridSession, MissingValue};

#[cfg(test)]
mod integration_tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn vehicle_schema() -> DynamicTableSchema {
        DynamicTableSchema::with_columns(
            "vehicle-config",
            "Vehicle Configuration",
            vec![
                ColumnDefinition::new("id", "ID", ColumnType::Number).with_editable(false),
                ColumnDefinition::new("make", "Make", ColumnType::String).required(),
                ColumnDefinition::new("model", "Model", ColumnType::String),
                ColumnDefinition::new("msrp", "MSRP", ColumnType::Number),
                ColumnDefinition::new("eligible", "Eligible", ColumnType::Boolean),
                ColumnDefinition::new("trims", "Trims", ColumnType::String).array(),
            ],
        )
    }

    fn load_rows() -> Vec<Row> {
        serde_json::from_str(
            r#"[
                {"id": 1, "make": "Toyota", "model": "Camry", "msrp": 28000, "eligible": true, "trims": ["LE", "SE"]},
                {"id": 2, "make": "honda", "model": "Civic", "msrp": 24000, "eligible": true},
                {"id": 3, "make": "Ford", "model": "F-150", "msrp": null, "eligible": false},
                {"id": 4, "make": "Toyota", "model": "RAV4", "msrp": 31000, "eligible": true, "trims": ["XLE"]},
                {"id": 5, "make": "Ford", "model": "Escape", "msrp": 29000, "eligible": true}
            ]"#,
        )
        .unwrap()
    }

    #[test]
    fn test_complete_workflow() {
        let mut registry = SchemaRegistry::new();
        registry.register(vehicle_schema());
        let tracker = Rc::new(RefCell::new(ChangeTracker::new()));
        let config = GridConfig {
            page_size: 2,
            ..GridConfig::default()
        };

        let mut grid =
            GridSession::load(&registry, "vehicle-config", load_rows(), tracker.clone(), &config).unwrap();

        let persisted = Rc::new(RefCell::new(Vec::new()));
        let sink = persisted.clone();
        grid.subscribe(move |event| {
            if let GridEvent::CellEdited { row_id, column_key, value, .. } = event {
                sink.borrow_mut().push((row_id.clone(), column_key.clone(), value.clone()));
            }
        });

        // make asc (case-insensitive), then msrp desc with nulls last
        grid.toggle_sort("make").unwrap();
        grid.add_sort("msrp", SortDirection::Desc).unwrap();
        let order: Vec<RowId> = grid.sorted_rows().iter().filter_map(Row::id).collect();
        assert_eq!(
            order,
            vec![RowId::Int(5), RowId::Int(3), RowId::Int(2), RowId::Int(4), RowId::Int(1)]
        );

        grid.set_filter(TableFilter::new("eligible", FilterKind::Boolean, FilterOperator::Is, true))
            .unwrap();
        assert_eq!(grid.filtered_count(), 4);
        assert_eq!(grid.paginator().total_pages(), 2);
        grid.go_to_page(2);
        let page: Vec<RowId> = grid.visible_rows().iter().filter_map(Row::id).collect();
        assert_eq!(page, vec![RowId::Int(4), RowId::Int(1)]);

        // Edits
        grid.update_cell(&RowId::Int(2), "msrp", 25500.into()).unwrap();
        grid.add_row(Row::new().with("id", 6).with("make", "Kia").with("msrp", 21000))
            .unwrap();
        grid.delete_row(&RowId::Int(3)).unwrap();

        assert_eq!(
            *persisted.borrow(),
            vec![(RowId::Int(2), "msrp".to_string(), CellValue::from(25500))]
        );

        let summary = grid.changes_summary();
        assert_eq!(summary.len(), 1);
        assert_eq!(summary[0].schema_id, "vehicle-config");
        assert_eq!(
            (summary[0].added, summary[0].modified, summary[0].deleted, summary[0].total),
            (1, 1, 1, 3)
        );

        // Undo everything, then redo it all
        assert!(grid.undo());
        assert!(grid.undo());
        assert!(grid.undo());
        assert!(!grid.can_undo());
        assert!(!grid.has_changes());

        assert!(grid.redo());
        assert!(grid.redo());
        assert!(grid.redo());
        assert_eq!(grid.changes_summary()[0].total, 3);

        // A new edit after undo wipes the redo future
        assert!(grid.undo());
        grid.update_cell(&RowId::Int(1), "model", "Camry Hybrid".into()).unwrap();
        assert!(!grid.can_redo());
        assert!(!grid.redo());
    }

    #[test]
    fn test_two_sessions_share_one_ledger() {
        let mut registry = SchemaRegistry::new();
        registry.register(vehicle_schema());
        registry.register(DynamicTableSchema::with_columns(
            "lenders",
            "Lenders",
            vec![ColumnDefinition::new("name", "Name", ColumnType::String)],
        ));
        let tracker = Rc::new(RefCell::new(ChangeTracker::new()));
        let config = GridConfig::default();

        let mut vehicles =
            GridSession::load(&registry, "vehicle-config", load_rows(), tracker.clone(), &config).unwrap();
        let mut lenders = GridSession::load(
            &registry,
            "lenders",
            vec![Row::new().with("id", "L1").with("name", "First Capital")],
            tracker.clone(),
            &config,
        )
        .unwrap();

        vehicles.delete_row(&RowId::Int(5)).unwrap();
        lenders.update_cell(&RowId::from("L1"), "name", "First Capital Bank".into()).unwrap();

        let summary = tracker.borrow().get_changes_summary();
        let ids: Vec<&str> = summary.iter().map(|s| s.schema_id.as_str()).collect();
        assert_eq!(ids, vec!["lenders", "vehicle-config"]);
        assert_eq!(summary[0].modified, 1);
        assert_eq!(summary[1].deleted, 1);

        tracker.borrow_mut().reset_tracking(Some("lenders"));
        assert_eq!(vehicles.changes_summary().len(), 1);
    }

    #[test]
    fn test_array_column_edit_and_filter() {
        let mut registry = SchemaRegistry::new();
        registry.register(vehicle_schema());
        let tracker = Rc::new(RefCell::new(ChangeTracker::new()));
        let mut grid =
            GridSession::load(&registry, "vehicle-config", load_rows(), tracker, &GridConfig::default())
                .unwrap();

        let trims = CellValue::Array(vec!["EX".into(), "Sport".into()]);
        grid.update_cell(&RowId::Int(2), "trims", trims).unwrap();

        grid.set_filter(TableFilter::new("trims", FilterKind::Text, FilterOperator::StartsWith, "sp"))
            .unwrap();
        let ids: Vec<RowId> = grid.visible_rows().iter().filter_map(Row::id).collect();
        assert_eq!(ids, vec![RowId::Int(2)]);

        let diff = grid.table_diff().unwrap();
        assert_eq!(diff.modified[0].changed_columns, vec!["trims".to_string()]);
    }
}
