//! Spill workers: bounded in-memory batches that sort and flush themselves
//! into on-disk runs.

use std::cmp::Ordering;
use std::fs::File;
use std::io::Write;
use std::mem;
use std::sync::atomic::{self, AtomicBool, AtomicUsize};

use parking_lot::Mutex;
use spillsort_error::{Result, SortError};
use spillsort_types::CompareError;
use tracing::debug;

use crate::block;
use crate::row::Row;
use crate::sorter::Shared;

/// One member of the spill pool.
///
/// The batch is only ever filled by the producer thread and only ever
/// drained by this worker's own flush task; `busy` gates the two. A worker
/// that records an error stays busy forever, which halts further writes to
/// it until the facade surfaces the error.
#[derive(Debug)]
pub(crate) struct Worker {
    capacity: usize,
    batch: Mutex<Vec<Row>>,
    busy: AtomicBool,
    err: Mutex<Option<SortError>>,
    row_size_max: AtomicUsize,
}

impl Worker {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            batch: Mutex::new(Vec::with_capacity(capacity)),
            busy: AtomicBool::new(false),
            err: Mutex::new(None),
            row_size_max: AtomicUsize::new(0),
        }
    }

    /// Observed without a lock by the dispatcher; a stale `true` only delays
    /// assignment, never corrupts it.
    pub fn is_busy(&self) -> bool {
        self.busy.load(atomic::Ordering::Acquire)
    }

    /// Append a row; returns true when the batch has reached capacity and a
    /// flush should be scheduled.
    pub fn push_row(&self, row: Row) -> bool {
        let mut batch = self.batch.lock();
        batch.push(row);
        batch.len() >= self.capacity
    }

    /// Transition idle -> busy. Returns true iff this call won the
    /// transition, so a flush can never be scheduled twice for one batch.
    pub fn begin_flush(&self) -> bool {
        !self.busy.swap(true, atomic::Ordering::AcqRel)
    }

    pub fn has_pending_rows(&self) -> bool {
        !self.batch.lock().is_empty()
    }

    /// Take the first recorded error, if any.
    pub fn take_error(&self) -> Option<SortError> {
        self.err.lock().take()
    }

    /// Largest encoded payload this worker has written.
    pub fn row_size_max(&self) -> usize {
        self.row_size_max.load(atomic::Ordering::Acquire)
    }

    pub fn clear_batch(&self) {
        self.batch.lock().clear();
    }

    /// Body of one flush task. Sorts the batch, writes it as a run file with
    /// a single physical write, and registers the file name. On error the
    /// worker records it and stays busy; the file may be partial or absent
    /// and is swept away with the temp directory at close.
    pub fn flush(&self, shared: &Shared) {
        match self.write_run(shared) {
            Ok(()) => {
                self.busy.store(false, atomic::Ordering::Release);
            }
            Err(err) => {
                debug!(target: "spillsort.spill", error = %err, "spill failed");
                self.err.lock().get_or_insert(err);
            }
        }
        // Wake a producer blocked on all-busy backpressure either way: on
        // failure it must observe the error rather than spin.
        shared.notify_flush_done();
    }

    fn write_run(&self, shared: &Shared) -> Result<()> {
        let mut rows = mem::take(&mut *self.batch.lock());
        if rows.is_empty() {
            return Ok(());
        }

        let mut cmp_err: Option<CompareError> = None;
        rows.sort_unstable_by(|a, b| {
            match shared.comparator().ordering(&a.key, &b.key) {
                Ok(ord) => ord,
                Err(e) => {
                    cmp_err.get_or_insert(e);
                    Ordering::Equal
                }
            }
        });
        if let Some(e) = cmp_err {
            return Err(e.into());
        }

        let path = shared.next_run_path();
        let mut buf = Vec::new();
        let mut max_payload = 0;
        for row in &rows {
            max_payload = max_payload.max(block::encode_row(&mut buf, row));
        }

        let mut file = File::create(&path)?;
        file.write_all(&buf)?;

        self.row_size_max
            .fetch_max(max_payload, atomic::Ordering::AcqRel);
        // Register only after the write succeeded: every registered run
        // holds at least one complete block.
        shared.register_run(path.clone());
        debug!(
            target: "spillsort.spill",
            rows = rows.len(),
            bytes = buf.len(),
            file = %path.display(),
            "spilled run"
        );
        Ok(())
    }
}
