/*
 * position.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Insertion cursor tracking.
//!
//! The cursor is the index at which the next insertion goes. After a plain
//! text insertion it can be advanced locally, because every insertion ends
//! with a newline and so moves the cursor by `len + 1`. After a structural
//! operation (table, cell content, image swap) the resulting length is only
//! known to the remote service, and the cursor must be resynchronized from
//! a freshly fetched document.

/// Cursor owned by one assembly or substitution session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionTracker {
    cursor: usize,
}

impl Default for PositionTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl PositionTracker {
    /// A cursor at the start of a fresh document.
    pub fn new() -> Self {
        Self { cursor: 1 }
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Advance past `len` units of inserted text and the newline that
    /// terminates it.
    pub fn after_text_insert(&mut self, len: usize) {
        self.cursor += len + 1;
        tracing::debug!(cursor = self.cursor, "Cursor advanced after text insert");
    }

    /// Move to an index reported by the remote document after a
    /// structural operation. Structural operations only grow the document
    /// ahead of the cursor, so this never moves backwards.
    pub fn resync(&mut self, index: usize) {
        if index < self.cursor {
            tracing::warn!(
                cursor = self.cursor,
                reported = index,
                "Ignoring resync that would move the cursor backwards"
            );
            return;
        }
        self.cursor = index;
        tracing::debug!(cursor = self.cursor, "Cursor resynchronized");
    }

    /// Move to an index reported after a deletion, which may lie before
    /// the current cursor.
    pub fn resync_after_deletion(&mut self, index: usize) {
        self.cursor = index.max(1);
        tracing::debug!(cursor = self.cursor, "Cursor resynchronized after deletion");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_insert_advances_by_len_plus_one() {
        let mut tracker = PositionTracker::new();
        tracker.after_text_insert(5);
        assert_eq!(tracker.cursor(), 7);
    }

    #[test]
    fn test_text_inserts_compose() {
        let mut twice = PositionTracker::new();
        twice.after_text_insert(3);
        twice.after_text_insert(8);

        let mut once = PositionTracker::new();
        once.after_text_insert(3 + 8 + 1);

        assert_eq!(twice.cursor(), 1 + 3 + 8 + 2);
        assert_eq!(twice, once);
    }

    #[test]
    fn test_resync_never_moves_backwards() {
        let mut tracker = PositionTracker::new();
        tracker.resync(14);
        assert_eq!(tracker.cursor(), 14);
        tracker.resync(3);
        assert_eq!(tracker.cursor(), 14);
    }

    #[test]
    fn test_resync_after_deletion_may_move_backwards() {
        let mut tracker = PositionTracker::new();
        tracker.resync(20);
        tracker.resync_after_deletion(9);
        assert_eq!(tracker.cursor(), 9);
        tracker.resync_after_deletion(0);
        assert_eq!(tracker.cursor(), 1);
    }
}
