//! Bounded linear undo/redo history.
//!
//! Each entry is a full PNG snapshot of the canvas after an operation. The
//! list is linear: adding an entry after an undo discards everything that
//! could have been redone.
//!
//! ```text
//!  entries:  [load] [resize] [crop] [rotate]
//!                            ^ index
//!  undo  → index moves left, returns [resize]
//!  redo  → index moves right, returns [rotate]
//!  add   → [rotate] is dropped, new entry appended, index at the end
//! ```

use crate::imaging::Dimensions;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HistoryError {
    #[error("Nothing to undo")]
    NothingToUndo,
    #[error("Nothing to redo")]
    NothingToRedo,
}

/// One history entry. Never modified after creation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationState {
    /// `op-N`, unique within one history.
    pub id: String,
    /// Unix epoch milliseconds.
    pub timestamp: i64,
    pub operation: String,
    /// `data:image/png;base64,...`
    #[serde(skip)]
    pub snapshot: String,
    pub dimensions: Dimensions,
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct OperationHistory {
    entries: Vec<OperationState>,
    current: Option<usize>,
    max_entries: usize,
    next_id: u64,
}

impl Default for OperationHistory {
    fn default() -> Self {
        Self::new(20)
    }
}

impl OperationHistory {
    /// A cap of zero is treated as one.
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Vec::new(),
            current: None,
            max_entries: max_entries.max(1),
            next_id: 1,
        }
    }

    pub fn add_operation(
        &mut self,
        operation: impl Into<String>,
        snapshot: String,
        dimensions: Dimensions,
        description: impl Into<String>,
    ) -> &OperationState {
        if let Some(index) = self.current {
            self.entries.truncate(index + 1);
        } else {
            self.entries.clear();
        }

        let state = OperationState {
            id: format!("op-{}", self.next_id),
            timestamp: chrono::Utc::now().timestamp_millis(),
            operation: operation.into(),
            snapshot,
            dimensions,
            description: description.into(),
        };
        self.next_id += 1;
        self.entries.push(state);

        if self.entries.len() > self.max_entries {
            self.entries.remove(0);
        }
        let newest = self.entries.len() - 1;
        self.current = Some(newest);
        &self.entries[newest]
    }

    /// Step back; returns the state that is now current.
    pub fn undo(&mut self) -> Option<&OperationState> {
        let index = self.current.filter(|&i| i > 0)? - 1;
        self.current = Some(index);
        self.entries.get(index)
    }

    /// Step forward; returns the state that is now current.
    pub fn redo(&mut self) -> Option<&OperationState> {
        let index = self.current? + 1;
        if index >= self.entries.len() {
            return None;
        }
        self.current = Some(index);
        self.entries.get(index)
    }

    pub fn current(&self) -> Option<&OperationState> {
        self.current.and_then(|i| self.entries.get(i))
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn can_undo(&self) -> bool {
        self.current.is_some_and(|i| i > 0)
    }

    pub fn can_redo(&self) -> bool {
        self.current.is_some_and(|i| i + 1 < self.entries.len())
    }

    pub fn entries(&self) -> &[OperationState] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.current = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add(history: &mut OperationHistory, name: &str) {
        history.add_operation(
            name,
            format!("data:image/png;base64,{name}"),
            Dimensions::new(10, 10),
            name,
        );
    }

    fn names(history: &OperationHistory) -> Vec<&str> {
        history
            .entries()
            .iter()
            .map(|e| e.operation.as_str())
            .collect()
    }

    #[test]
    fn empty_history_cannot_move() {
        let mut history = OperationHistory::new(5);
        assert!(history.undo().is_none());
        assert!(history.redo().is_none());
        assert!(history.current().is_none());
        assert!(!history.can_undo());
        assert!(!history.can_redo());
    }

    #[test]
    fn ids_are_sequential() {
        let mut history = OperationHistory::new(5);
        add(&mut history, "a");
        add(&mut history, "b");
        let ids: Vec<_> = history.entries().iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["op-1", "op-2"]);
        assert!(history.entries()[0].timestamp > 0);
    }

    #[test]
    fn undo_returns_previous_and_redo_returns_undone() {
        let mut history = OperationHistory::new(5);
        add(&mut history, "load");
        add(&mut history, "resize");

        assert_eq!(history.undo().unwrap().operation, "load");
        assert!(history.can_redo());
        assert_eq!(history.redo().unwrap().operation, "resize");
        assert!(history.redo().is_none());
    }

    #[test]
    fn undo_stops_at_first_entry() {
        let mut history = OperationHistory::new(5);
        add(&mut history, "load");
        assert!(history.undo().is_none());
        assert_eq!(history.current_index(), Some(0));
    }

    #[test]
    fn add_after_undo_discards_redo_branch() {
        let mut history = OperationHistory::new(5);
        add(&mut history, "load");
        add(&mut history, "resize");
        add(&mut history, "crop");
        history.undo();
        history.undo();

        add(&mut history, "rotate");
        assert_eq!(names(&history), vec!["load", "rotate"]);
        assert!(!history.can_redo());
        assert_eq!(history.current().unwrap().operation, "rotate");
    }

    #[test]
    fn cap_evicts_oldest_and_points_at_newest() {
        let mut history = OperationHistory::new(20);
        for i in 0..21 {
            add(&mut history, &format!("op{i}"));
        }

        assert_eq!(history.len(), 20);
        assert_eq!(history.entries()[0].operation, "op1");
        assert_eq!(history.current_index(), Some(19));
        assert_eq!(history.current().unwrap().operation, "op20");
    }

    #[test]
    fn zero_cap_keeps_one_entry() {
        let mut history = OperationHistory::new(0);
        add(&mut history, "a");
        add(&mut history, "b");
        assert_eq!(names(&history), vec!["b"]);
        assert!(!history.can_undo());
    }

    #[test]
    fn clear_resets_everything() {
        let mut history = OperationHistory::new(5);
        add(&mut history, "a");
        history.clear();
        assert!(history.is_empty());
        assert!(history.current().is_none());
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone)]
        enum Step {
            Add,
            Undo,
            Redo,
        }

        fn step() -> impl Strategy<Value = Step> {
            prop_oneof![Just(Step::Add), Just(Step::Undo), Just(Step::Redo)]
        }

        proptest! {
            #[test]
            fn never_exceeds_cap_and_index_stays_valid(
                cap in 1usize..8,
                steps in prop::collection::vec(step(), 0..60),
            ) {
                let mut history = OperationHistory::new(cap);
                for s in steps {
                    match s {
                        Step::Add => add(&mut history, "x"),
                        Step::Undo => { history.undo(); }
                        Step::Redo => { history.redo(); }
                    }
                    prop_assert!(history.len() <= cap);
                    match history.current_index() {
                        Some(i) => prop_assert!(i < history.len()),
                        None => prop_assert!(history.is_empty()),
                    }
                }
            }
        }
    }
}
