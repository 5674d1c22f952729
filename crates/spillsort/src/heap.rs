//! Min-heap of run cursors keyed by their head row.
//!
//! `std::collections::BinaryHeap` forbids fallible comparators, which is how
//! the typed comparison fails, so this is a plain binary heap whose sift
//! operations unwind on the first comparator error instead of smuggling it
//! through a side channel.

use spillsort_types::CompareError;

use crate::compare::KeyComparator;
use crate::row::Row;

/// One heap element: a run index and that run's current head row.
#[derive(Debug)]
pub(crate) struct HeapEntry {
    pub run: usize,
    pub row: Row,
}

#[derive(Debug)]
pub(crate) struct MergeHeap {
    entries: Vec<HeapEntry>,
}

impl MergeHeap {
    pub fn with_capacity(n: usize) -> Self {
        Self {
            entries: Vec::with_capacity(n),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Insert an entry, restoring the heap property.
    pub fn push(&mut self, entry: HeapEntry, cmp: &KeyComparator) -> Result<(), CompareError> {
        self.entries.push(entry);
        self.sift_up(self.len() - 1, cmp)
    }

    /// Remove and return the minimum entry, or `None` when empty.
    pub fn pop(&mut self, cmp: &KeyComparator) -> Result<Option<HeapEntry>, CompareError> {
        if self.is_empty() {
            return Ok(None);
        }
        let min = self.entries.swap_remove(0);
        if !self.is_empty() {
            self.sift_down(0, cmp)?;
        }
        Ok(Some(min))
    }

    fn less(&self, i: usize, j: usize, cmp: &KeyComparator) -> Result<bool, CompareError> {
        cmp.less(&self.entries[i].row.key, &self.entries[j].row.key)
    }

    fn sift_up(&mut self, mut pos: usize, cmp: &KeyComparator) -> Result<(), CompareError> {
        while pos > 0 {
            let parent = (pos - 1) / 2;
            if !self.less(pos, parent, cmp)? {
                break;
            }
            self.entries.swap(pos, parent);
            pos = parent;
        }
        Ok(())
    }

    fn sift_down(&mut self, mut pos: usize, cmp: &KeyComparator) -> Result<(), CompareError> {
        let len = self.entries.len();
        loop {
            let left = 2 * pos + 1;
            if left >= len {
                break;
            }
            let right = left + 1;
            let mut child = left;
            if right < len && self.less(right, left, cmp)? {
                child = right;
            }
            if !self.less(child, pos, cmp)? {
                break;
            }
            self.entries.swap(pos, child);
            pos = child;
        }
        Ok(())
    }
}
