use spillsort_types::Datum;

/// One sortable row: the key columns that define its position, the value
/// columns carried alongside, and a 64-bit handle identifying it.
#[derive(Debug, Clone)]
pub struct Row {
    /// Ordered key columns; arity fixed at sorter construction.
    pub key: Vec<Datum>,
    /// Ordered value columns; arity fixed at sorter construction.
    pub val: Vec<Datum>,
    /// Row identity.
    pub handle: i64,
}

/// Fixed column arities of every row flowing through one sorter.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RowSchema {
    pub key_len: usize,
    pub val_len: usize,
}

impl RowSchema {
    /// Number of encoded values per row block: key columns, value columns,
    /// and the handle.
    pub fn datums_per_row(self) -> usize {
        self.key_len + self.val_len + 1
    }
}
