//! Key ordering under a per-column direction vector.

use std::cmp::Ordering;

use spillsort_types::{CompareError, Datum, StatementContext};

/// Total order over key tuples.
///
/// Owned by the sorter and borrowed by workers during spill and by the merge
/// heap during output; no ambient state. Columns compare left to right, a
/// descending column negates its three-way result, and the first non-equal
/// column decides.
#[derive(Debug)]
pub(crate) struct KeyComparator {
    cx: StatementContext,
    descending: Vec<bool>,
}

impl KeyComparator {
    pub fn new(cx: StatementContext, descending: Vec<bool>) -> Self {
        Self { cx, descending }
    }

    /// Three-way comparison of two key tuples.
    pub fn ordering(&self, a: &[Datum], b: &[Datum]) -> Result<Ordering, CompareError> {
        for (k, &desc) in self.descending.iter().enumerate() {
            let mut ord = a[k].compare(&self.cx, &b[k])?;
            if desc {
                ord = ord.reverse();
            }
            if ord != Ordering::Equal {
                return Ok(ord);
            }
        }
        Ok(Ordering::Equal)
    }

    /// True iff `a` strictly precedes `b`.
    pub fn less(&self, a: &[Datum], b: &[Datum]) -> Result<bool, CompareError> {
        Ok(self.ordering(a, b)? == Ordering::Less)
    }
}
