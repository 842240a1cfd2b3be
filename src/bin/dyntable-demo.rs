/// DynTable demo
///
/// Loads a JSON fixture of the form `{"schema": {...}, "rows": [...]}`,
/// applies the sort and page given in the environment, and prints the
/// visible page followed by the change summary.
///
/// Environment:
/// - `DYNTABLE_SORT`: comma-separated `column:asc|desc` keys
/// - `DYNTABLE_PAGE`: 1-based page number
/// - `DYNTABLE_PAGE_SIZE`, `DYNTABLE_HISTORY_LIMIT`: see `GridConfig`

use dyntable::{
    ChangeTracker, DynamicTableSchema, GridConfig, GridSession, Row, SchemaRegistry, SortDirection,
};
use serde::Deserialize;
use std::cell::RefCell;
use std::error::Error;
use std::rc::Rc;

#[derive(Deserialize)]
struct Fixture {
    schema: DynamicTableSchema,
    #[serde(default)]
    rows: Vec<Row>,
}

fn parse_sort(raw: &str) -> Vec<(String, SortDirection)> {
    raw.split(',')
        .filter(|part| !part.trim().is_empty())
        .map(|part| {
            let (column, direction) = part.trim().split_once(':').unwrap_or((part.trim(), "asc"));
            let direction = if direction.eq_ignore_ascii_case("desc") {
                SortDirection::Desc
            } else {
                SortDirection::Asc
            };
            (column.to_string(), direction)
        })
        .collect()
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let path = std::env::args()
        .nth(1)
        .ok_or("usage: dyntable-demo <fixture.json>")?;
    let fixture: Fixture = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
    let config = GridConfig::from_env()?;

    let schema_id = fixture.schema.id.clone();
    let mut registry = SchemaRegistry::new();
    registry.register(fixture.schema);

    let tracker = Rc::new(RefCell::new(ChangeTracker::new()));
    let mut grid = GridSession::load(&registry, &schema_id, fixture.rows, tracker, &config)?;

    if let Ok(raw) = std::env::var("DYNTABLE_SORT") {
        for (column, direction) in parse_sort(&raw) {
            grid.add_sort(&column, direction)?;
        }
    }
    if let Ok(page) = std::env::var("DYNTABLE_PAGE") {
        grid.go_to_page(page.trim().parse()?);
    }

    let pager = grid.paginator();
    log::info!(
        "'{}': rows {}-{} of {} (page {}/{})",
        schema_id,
        pager.start_index(),
        pager.end_index(),
        pager.total_count(),
        pager.current_page(),
        pager.total_pages()
    );

    for row in grid.visible_rows() {
        let cells: Vec<String> = grid
            .schema()
            .columns
            .iter()
            .map(|c| format!("{}={}", c.key, grid.display_value(&row, &c.key, None)))
            .collect();
        println!("{}", cells.join("  "));
    }

    println!("{}", serde_json::to_string_pretty(&grid.changes_summary())?);
    Ok(())
}
