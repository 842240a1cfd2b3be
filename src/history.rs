/// Undo/Redo History for DynTable
///
/// A linear stack of `(data, schema, action, timestamp)` snapshots with a
/// cursor. Saving after an undo discards everything past the cursor, so
/// there is never more than one future to redo into.
///
/// The stack is capped (`DEFAULT_HISTORY_LIMIT` unless configured). When
/// a save would exceed the cap the oldest snapshot is evicted.
///
/// # Examples
///
/// ```
/// use dyntable::{DynamicTableSchema, Row, UndoRedoHistory};
///
/// let schema = DynamicTableSchema::new("rates", "Rates");
/// let mut history = UndoRedoHistory::new(vec![], schema.clone());
///
/// history.save_state(&[Row::new().with("id", 1)], &schema, "add row");
/// assert!(history.can_undo());
///
/// let previous = history.undo().unwrap();
/// assert!(previous.data.is_empty());
/// assert_eq!(previous.action, "initial");
/// ```

use crate::schema::DynamicTableSchema;
use crate::value::Row;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;

/// Snapshots kept when no limit is configured
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

/// Label of the snapshot every history starts with
pub const INITIAL_ACTION: &str = "initial";

/// One point in the edit history
#[derive(Debug, Clone)]
pub struct UndoRedoState {
    pub data: Vec<Row>,
    pub schema: DynamicTableSchema,
    pub action: String,
    pub timestamp: DateTime<Utc>,
}

impl UndoRedoState {
    fn new(data: &[Row], schema: &DynamicTableSchema, action: &str) -> Self {
        UndoRedoState {
            data: data.to_vec(),
            schema: schema.clone(),
            action: action.to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// Linear undo/redo stack for one editing session
#[derive(Debug, Clone)]
pub struct UndoRedoHistory {
    states: VecDeque<UndoRedoState>,
    current_index: usize,
    limit: usize,
}

impl UndoRedoHistory {
    pub fn new(data: Vec<Row>, schema: DynamicTableSchema) -> Self {
        Self::with_limit(data, schema, DEFAULT_HISTORY_LIMIT)
    }

    /// A limit below 1 is raised to 1; the current state is always kept.
    pub fn with_limit(data: Vec<Row>, schema: DynamicTableSchema, limit: usize) -> Self {
        let mut states = VecDeque::new();
        states.push_back(UndoRedoState {
            data,
            schema,
            action: INITIAL_ACTION.to_string(),
            timestamp: Utc::now(),
        });
        UndoRedoHistory {
            states,
            current_index: 0,
            limit: limit.max(1),
        }
    }

    /// Records a new snapshot after the cursor, dropping any redo future
    pub fn save_state(&mut self, data: &[Row], schema: &DynamicTableSchema, action: &str) {
        self.states.truncate(self.current_index + 1);
        self.states.push_back(UndoRedoState::new(data, schema, action));

        while self.states.len() > self.limit {
            self.states.pop_front();
        }
        self.current_index = self.states.len() - 1;
        log::debug!(
            "history: saved '{}' ({}/{})",
            action,
            self.current_index + 1,
            self.states.len()
        );
    }

    /// Steps back one snapshot. Returns None at the oldest state.
    pub fn undo(&mut self) -> Option<&UndoRedoState> {
        if !self.can_undo() {
            return None;
        }
        self.current_index -= 1;
        self.states.get(self.current_index)
    }

    /// Steps forward one snapshot. Returns None at the newest state.
    pub fn redo(&mut self) -> Option<&UndoRedoState> {
        if !self.can_redo() {
            return None;
        }
        self.current_index += 1;
        self.states.get(self.current_index)
    }

    pub fn can_undo(&self) -> bool {
        self.current_index > 0
    }

    pub fn can_redo(&self) -> bool {
        self.current_index + 1 < self.states.len()
    }

    pub fn current(&self) -> Option<&UndoRedoState> {
        self.states.get(self.current_index)
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Action labels from oldest to newest
    pub fn actions(&self) -> Vec<&str> {
        self.states.iter().map(|s| s.action.as_str()).collect()
    }

    /// Starts over from a fresh snapshot
    pub fn reset(&mut self, data: Vec<Row>, schema: DynamicTableSchema) {
        *self = Self::with_limit(data, schema, self.limit);
    }
}
