//! Sorter facade: builder-configured lifecycle over the spill pool and the
//! k-way merge.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use spillsort_error::{Result, SortError};
use spillsort_types::{Datum, StatementContext};
use tracing::debug;

use crate::compare::KeyComparator;
use crate::heap::{HeapEntry, MergeHeap};
use crate::row::{Row, RowSchema};
use crate::run::RunCursor;
use crate::worker::Worker;

/// Workers in the spill pool unless overridden by [`Builder::workers`].
pub const DEFAULT_WORKERS: usize = 8;

/// How long a producer parks when every worker is busy before re-scanning.
const BACKPRESSURE_WAIT: Duration = Duration::from_millis(100);

/// State shared between the facade and its flush tasks.
#[derive(Debug)]
pub(crate) struct Shared {
    comparator: KeyComparator,
    schema: RowSchema,
    tmp_dir: PathBuf,
    registry: Mutex<RunRegistry>,
    gate: Mutex<()>,
    flush_done: Condvar,
}

/// Run-file name generation and registration, guarded by one mutex.
#[derive(Debug, Default)]
struct RunRegistry {
    files: Vec<PathBuf>,
    next_file_id: u64,
}

impl Shared {
    pub fn new(comparator: KeyComparator, schema: RowSchema, tmp_dir: PathBuf) -> Self {
        Self {
            comparator,
            schema,
            tmp_dir,
            registry: Mutex::new(RunRegistry::default()),
            gate: Mutex::new(()),
            flush_done: Condvar::new(),
        }
    }

    pub fn comparator(&self) -> &KeyComparator {
        &self.comparator
    }

    /// Allocate the next unique run file path.
    pub fn next_run_path(&self) -> PathBuf {
        let mut registry = self.registry.lock();
        let path = self.tmp_dir.join(registry.next_file_id.to_string());
        registry.next_file_id += 1;
        path
    }

    /// Record a fully written run file.
    pub fn register_run(&self, path: PathBuf) {
        self.registry.lock().files.push(path);
    }

    /// Snapshot of all registered run files.
    pub fn registered_runs(&self) -> Vec<PathBuf> {
        self.registry.lock().files.clone()
    }

    /// Wake producers parked on all-workers-busy backpressure.
    pub fn notify_flush_done(&self) {
        let _guard = self.gate.lock();
        self.flush_done.notify_all();
    }
}

/// Builds a [`FileSorter`], validating every option.
#[derive(Debug, Default)]
pub struct Builder {
    cx: Option<StatementContext>,
    key_len: Option<usize>,
    val_len: Option<usize>,
    buffer: Option<usize>,
    descending: Option<Vec<bool>>,
    tmp_dir: Option<PathBuf>,
    workers: Option<usize>,
}

impl Builder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context handed to the typed comparator on every comparison. Required.
    #[must_use]
    pub fn statement_context(mut self, cx: StatementContext) -> Self {
        self.cx = Some(cx);
        self
    }

    /// Key and value arities of every row. Both must be positive. Required.
    #[must_use]
    pub fn schema(mut self, key_len: usize, val_len: usize) -> Self {
        self.key_len = Some(key_len);
        self.val_len = Some(val_len);
        self
    }

    /// Total in-memory row capacity across the pool; each worker holds
    /// `capacity / workers` rows. Required, must be positive.
    #[must_use]
    pub fn buffer(mut self, capacity: usize) -> Self {
        self.buffer = Some(capacity);
        self
    }

    /// Per-key-column direction: entry `k` is true iff column `k` sorts
    /// descending. Length must equal the key arity. Required.
    #[must_use]
    pub fn descending(mut self, descending: Vec<bool>) -> Self {
        self.descending = Some(descending);
        self
    }

    /// Directory run files are written to. Must already exist. Required.
    #[must_use]
    pub fn tmp_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.tmp_dir = Some(path.into());
        self
    }

    /// Size of the spill pool. Defaults to [`DEFAULT_WORKERS`].
    #[must_use]
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    /// Validate the configuration and produce a sorter.
    pub fn build(self) -> Result<FileSorter> {
        let cx = self
            .cx
            .ok_or_else(|| SortError::config("statement context is missing"))?;
        let key_len = self
            .key_len
            .ok_or_else(|| SortError::config("schema is missing"))?;
        let val_len = self
            .val_len
            .ok_or_else(|| SortError::config("schema is missing"))?;
        let buffer = self
            .buffer
            .ok_or_else(|| SortError::config("buffer capacity is missing"))?;
        let descending = self
            .descending
            .ok_or_else(|| SortError::config("direction vector is missing"))?;
        let tmp_dir = self
            .tmp_dir
            .ok_or_else(|| SortError::config("tmp dir is missing"))?;
        let workers = self.workers.unwrap_or(DEFAULT_WORKERS);

        if key_len == 0 {
            return Err(SortError::config("key arity is not positive"));
        }
        if val_len == 0 {
            return Err(SortError::config("value arity is not positive"));
        }
        if descending.len() != key_len {
            return Err(SortError::config(format!(
                "direction vector has {} entries for {key_len} key columns",
                descending.len(),
            )));
        }
        if buffer == 0 {
            return Err(SortError::config("buffer capacity is not positive"));
        }
        if workers == 0 {
            return Err(SortError::config("worker count is not positive"));
        }
        if buffer < workers {
            return Err(SortError::config(format!(
                "buffer capacity {buffer} is smaller than the worker count {workers}",
            )));
        }
        if !tmp_dir.is_dir() {
            return Err(SortError::config(format!(
                "tmp dir does not exist: '{}'",
                tmp_dir.display(),
            )));
        }

        let schema = RowSchema { key_len, val_len };
        let shared = Arc::new(Shared::new(
            KeyComparator::new(cx, descending),
            schema,
            tmp_dir,
        ));
        let batch_capacity = buffer / workers;
        let pool = (0..workers)
            .map(|_| Arc::new(Worker::new(batch_capacity)))
            .collect();

        Ok(FileSorter {
            shared,
            workers: pool,
            next_worker: 0,
            flush_handles: Vec::new(),
            phase: Phase::Input,
            closed: false,
            failed: false,
            merge: None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Input,
    Output,
}

/// Single-threaded merge state, built on the first `output` call.
#[derive(Debug)]
struct MergeState {
    cursors: Vec<RunCursor>,
    heap: MergeHeap,
    scratch: Vec<u8>,
}

/// External file sorter.
///
/// Rows fed through [`input`](Self::input) are partitioned over a pool of
/// workers that sort and spill full batches to run files concurrently.
/// The first [`output`](Self::output) call flushes what remains, then merges
/// all runs through a min-heap of per-file cursors; every later call pops
/// the next row in order. [`close`](Self::close) releases the file handles
/// and removes the temp directory.
#[derive(Debug)]
pub struct FileSorter {
    shared: Arc<Shared>,
    workers: Vec<Arc<Worker>>,
    next_worker: usize,
    flush_handles: Vec<JoinHandle<()>>,
    phase: Phase,
    closed: bool,
    failed: bool,
    merge: Option<MergeState>,
}

impl FileSorter {
    /// Feed one row into the sorter.
    ///
    /// May block for bounded intervals while every worker is flushing, which
    /// caps buffered rows at `workers * batch_capacity`. Must not be called
    /// once `output` has begun.
    pub fn input(&mut self, key: Vec<Datum>, val: Vec<Datum>, handle: i64) -> Result<()> {
        if self.closed {
            return Err(SortError::AlreadyClosed);
        }
        if self.phase == Phase::Output {
            return Err(SortError::WrongPhase);
        }
        if self.failed {
            return Err(SortError::internal("sorter is in a failed state"));
        }
        let schema = self.shared.schema;
        if key.len() != schema.key_len || val.len() != schema.val_len {
            return Err(SortError::internal(format!(
                "row arity {}+{} does not match schema {}+{}",
                key.len(),
                val.len(),
                schema.key_len,
                schema.val_len,
            )));
        }
        self.dispatch(Row { key, val, handle })
    }

    /// Round-robin assignment: starting at the cursor, the first non-busy
    /// worker takes the row and becomes the new cursor position.
    fn dispatch(&mut self, row: Row) -> Result<()> {
        let pool_size = self.workers.len();
        loop {
            self.surface_worker_error()?;
            for i in 0..pool_size {
                let wid = (self.next_worker + i) % pool_size;
                let worker = &self.workers[wid];
                if worker.is_busy() {
                    continue;
                }
                let full = worker.push_row(row);
                let start_flush = full && worker.begin_flush();
                self.next_worker = wid;
                if start_flush {
                    self.spawn_flush(wid);
                }
                return Ok(());
            }
            // Every worker is mid-flush: park until one finishes, bounded so
            // a lost wakeup only costs one interval.
            let mut gate = self.shared.gate.lock();
            self.shared
                .flush_done
                .wait_for(&mut gate, BACKPRESSURE_WAIT);
        }
    }

    /// Produce the next row in order, or `None` once every run is exhausted
    /// (idempotent). The first call transitions the sorter into the output
    /// phase: it drains residual batches, waits for all spills to land, and
    /// primes the merge heap.
    pub fn output(&mut self) -> Result<Option<Row>> {
        if self.closed {
            return Err(SortError::AlreadyClosed);
        }
        if self.failed {
            return Err(SortError::internal("sorter is in a failed state"));
        }
        if self.phase == Phase::Input {
            match self.begin_merge() {
                Ok(state) => {
                    self.merge = Some(state);
                    self.phase = Phase::Output;
                }
                Err(err) => {
                    self.failed = true;
                    return Err(err);
                }
            }
        }
        match self.pop_next() {
            Ok(row) => Ok(row),
            Err(err) => {
                self.failed = true;
                Err(err)
            }
        }
    }

    /// Terminate either phase: wait for outstanding spills, release run file
    /// handles, and remove the temp directory regardless of prior errors.
    /// A second call fails with [`SortError::AlreadyClosed`].
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Err(SortError::AlreadyClosed);
        }
        self.closed = true;

        let mut first_err: Option<SortError> = None;
        if let Err(err) = self.join_flushes() {
            first_err.get_or_insert(err);
        }
        // Dropping the merge state closes every run file descriptor.
        self.merge = None;
        for worker in &self.workers {
            worker.clear_batch();
        }
        if let Err(err) = fs::remove_dir_all(&self.shared.tmp_dir) {
            first_err.get_or_insert(err.into());
        }
        debug!(
            target: "spillsort.sorter",
            tmp_dir = %self.shared.tmp_dir.display(),
            "sorter closed"
        );
        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn spawn_flush(&mut self, wid: usize) {
        let worker = Arc::clone(&self.workers[wid]);
        let shared = Arc::clone(&self.shared);
        self.flush_handles
            .push(thread::spawn(move || worker.flush(&shared)));
    }

    /// Propagate the first error any worker has recorded.
    fn surface_worker_error(&mut self) -> Result<()> {
        for worker in &self.workers {
            if let Some(err) = worker.take_error() {
                self.failed = true;
                return Err(err);
            }
        }
        Ok(())
    }

    fn join_flushes(&mut self) -> Result<()> {
        let mut panicked = false;
        for handle in self.flush_handles.drain(..) {
            panicked |= handle.join().is_err();
        }
        if panicked {
            return Err(SortError::internal("a spill task panicked"));
        }
        Ok(())
    }

    /// Flush what the workers still hold, wait for every run to land, then
    /// open all runs and prime the heap with one head row per cursor.
    fn begin_merge(&mut self) -> Result<MergeState> {
        for wid in 0..self.workers.len() {
            let start = {
                let worker = &self.workers[wid];
                !worker.is_busy() && worker.has_pending_rows() && worker.begin_flush()
            };
            if start {
                self.spawn_flush(wid);
            }
        }
        self.join_flushes()?;
        self.surface_worker_error()?;

        // All runs exist from here on, so the largest payload any worker
        // observed bounds every block the merge will read.
        let row_size_max = self
            .workers
            .iter()
            .map(|w| w.row_size_max())
            .max()
            .unwrap_or(0);
        let files = self.shared.registered_runs();
        let schema = self.shared.schema;

        let mut cursors = Vec::with_capacity(files.len());
        let mut heap = MergeHeap::with_capacity(files.len());
        let mut scratch = vec![0u8; row_size_max];
        for path in files {
            let mut cursor = RunCursor::open(path)?;
            match cursor.next_row(&mut scratch, schema)? {
                Some(row) => {
                    let entry = HeapEntry {
                        run: cursors.len(),
                        row,
                    };
                    heap.push(entry, self.shared.comparator())?;
                }
                None => {
                    return Err(SortError::EmptyRun {
                        file: cursor.into_path(),
                    });
                }
            }
            cursors.push(cursor);
        }
        debug!(
            target: "spillsort.merge",
            runs = cursors.len(),
            row_size_max,
            "merge initialized"
        );
        Ok(MergeState {
            cursors,
            heap,
            scratch,
        })
    }

    /// One pop-refill step of the k-way merge.
    fn pop_next(&mut self) -> Result<Option<Row>> {
        let schema = self.shared.schema;
        let cmp = self.shared.comparator();
        let Some(merge) = self.merge.as_mut() else {
            return Err(SortError::internal("merge state missing in output phase"));
        };
        let Some(entry) = merge.heap.pop(cmp)? else {
            return Ok(None);
        };
        if let Some(next) = merge.cursors[entry.run].next_row(&mut merge.scratch, schema)? {
            merge.heap.push(
                HeapEntry {
                    run: entry.run,
                    row: next,
                },
                cmp,
            )?;
        }
        Ok(Some(entry.row))
    }
}

impl Drop for FileSorter {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(err) = self.close() {
                debug!(target: "spillsort.sorter", error = %err, "cleanup on drop failed");
            }
        }
    }
}
