//! Undo/redo over whole-document snapshots.
//!
//! Provides:
//! - `UndoManager` trait for abstracting undo implementations
//! - `HistoryManager` - the bounded undo/redo stacks
//! - `UndoableDocument` - a `DocumentStore` with history attached

use std::collections::VecDeque;

use tracing::debug;

use crate::document::DocumentStore;

/// Trait for managing undo/redo operations.
///
/// Implementations must actually perform the undo/redo, not just track state.
pub trait UndoManager {
    /// Check if undo is available.
    fn can_undo(&self) -> bool;

    /// Check if redo is available.
    fn can_redo(&self) -> bool;

    /// Perform undo. Returns true if successful.
    fn undo(&mut self) -> bool;

    /// Perform redo. Returns true if successful.
    fn redo(&mut self) -> bool;

    /// Clear all undo/redo history.
    fn clear_history(&mut self);
}

/// Bounded undo and redo stacks of serialized documents.
#[derive(Debug, Clone)]
pub struct HistoryManager {
    undo_stack: VecDeque<String>,
    redo_stack: Vec<String>,
    capacity: usize,
}

impl HistoryManager {
    pub fn new(capacity: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: Vec::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.redo_stack.len()
    }

    /// Record a snapshot taken at an edit boundary.
    ///
    /// Evicts the oldest snapshot past capacity and invalidates redo. The
    /// current document is not touched; that is the caller's job.
    pub fn commit(&mut self, snapshot: String) {
        self.redo_stack.clear();
        self.undo_stack.push_back(snapshot);
        while self.undo_stack.len() > self.capacity {
            self.undo_stack.pop_front();
        }
    }

    /// Step back: `current` moves to redo and the newest snapshot replaces it.
    pub fn undo(&mut self, current: &mut String) -> bool {
        let Some(previous) = self.undo_stack.pop_back() else {
            return false;
        };
        self.redo_stack.push(std::mem::replace(current, previous));
        true
    }

    /// Step forward again after an undo.
    pub fn redo(&mut self, current: &mut String) -> bool {
        let Some(next) = self.redo_stack.pop() else {
            return false;
        };
        self.undo_stack.push_back(std::mem::replace(current, next));
        true
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}

/// A document store whose content changes are recorded for undo.
///
/// All mutations go through this wrapper, which records them for undo.
#[derive(Debug, Clone)]
pub struct UndoableDocument {
    store: DocumentStore,
    history: HistoryManager,
}

impl UndoableDocument {
    pub fn new(store: DocumentStore, capacity: usize) -> Self {
        Self {
            store,
            history: HistoryManager::new(capacity),
        }
    }

    /// Get a reference to the inner store.
    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    /// Get a mutable reference to the inner store.
    /// WARNING: content changes made directly bypass undo tracking!
    pub fn store_mut(&mut self) -> &mut DocumentStore {
        &mut self.store
    }

    pub fn content(&self) -> &str {
        self.store.content()
    }

    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    /// Replace the content, committing the previous content as a snapshot.
    pub fn record_edit(&mut self, content: String) {
        let previous = self.store.replace(content);
        self.history.commit(previous);
        debug!(
            undo = self.history.undo_depth(),
            "recorded history snapshot"
        );
    }

    fn swap<F>(&mut self, step: F) -> bool
    where
        F: FnOnce(&mut HistoryManager, &mut String) -> bool,
    {
        let mut current = self.store.content().to_string();
        if !step(&mut self.history, &mut current) {
            return false;
        }
        self.store.replace(current);
        true
    }
}

impl UndoManager for UndoableDocument {
    fn can_undo(&self) -> bool {
        self.history.undo_depth() > 0
    }

    fn can_redo(&self) -> bool {
        self.history.redo_depth() > 0
    }

    fn undo(&mut self) -> bool {
        self.swap(HistoryManager::undo)
    }

    fn redo(&mut self) -> bool {
        self.swap(HistoryManager::redo)
    }

    fn clear_history(&mut self) {
        self.history.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(content: &str) -> UndoableDocument {
        UndoableDocument::new(DocumentStore::new(content), 50)
    }

    #[test]
    fn test_undo_redo_cycle() {
        let mut doc = doc("a");
        assert!(!doc.can_undo());

        doc.record_edit("b".into());
        doc.record_edit("c".into());
        assert_eq!(doc.content(), "c");

        assert!(doc.undo());
        assert_eq!(doc.content(), "b");
        assert!(doc.can_redo());

        assert!(doc.undo());
        assert_eq!(doc.content(), "a");
        assert!(!doc.undo());

        assert!(doc.redo());
        assert_eq!(doc.content(), "b");
        assert!(doc.redo());
        assert_eq!(doc.content(), "c");
        assert!(!doc.redo());
    }

    #[test]
    fn test_commit_clears_redo() {
        let mut doc = doc("a");
        doc.record_edit("b".into());
        doc.undo();
        assert!(doc.can_redo());
        doc.record_edit("x".into());
        assert!(!doc.can_redo());
        assert!(!doc.redo());
        assert_eq!(doc.content(), "x");
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let mut history = HistoryManager::new(3);
        for i in 0..5 {
            history.commit(i.to_string());
        }
        assert_eq!(history.undo_depth(), 3);
        let mut current = "now".to_string();
        while history.undo(&mut current) {}
        assert_eq!(current, "2");
    }

    #[test]
    fn test_clear_history() {
        let mut doc = doc("a");
        doc.record_edit("b".into());
        doc.clear_history();
        assert!(!doc.can_undo());
        assert_eq!(doc.content(), "b");
    }
}
