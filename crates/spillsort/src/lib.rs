//! Two-phase external merge sort with bounded memory and concurrent spill.
//!
//! Rows of typed tuples are fed through [`FileSorter::input`], partitioned
//! round-robin over a pool of workers that sort full batches and spill them
//! to self-delimiting run files. The first [`FileSorter::output`] call
//! merges every run through a min-heap of file cursors and hands rows back
//! in total order under a per-column ascending/descending specification.
//!
//! ```
//! use spillsort::{Builder, Datum, StatementContext};
//!
//! let dir = tempfile::tempdir()?;
//! let mut sorter = Builder::new()
//!     .statement_context(StatementContext::new())
//!     .schema(1, 1)
//!     .buffer(64)
//!     .descending(vec![false])
//!     .tmp_dir(dir.path())
//!     .build()?;
//!
//! for (k, h) in [(3_i64, 1_i64), (1, 2), (2, 3)] {
//!     sorter.input(vec![Datum::Integer(k)], vec![Datum::Null], h)?;
//! }
//!
//! let first = sorter.output()?.expect("at least one row");
//! assert_eq!(first.key[0].as_integer(), Some(1));
//! sorter.close()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod block;
mod compare;
mod heap;
mod row;
mod run;
mod sorter;
mod worker;

pub use row::Row;
pub use sorter::{Builder, FileSorter, DEFAULT_WORKERS};
pub use spillsort_error::{Result, SortError};
pub use spillsort_types::{Collation, CrossTypePolicy, Datum, StatementContext};
