//! # Open-File Pool
//!
//! Purpose: Reuse open file descriptors for one path so hot files don't
//! pay repeated `open()` cost, while refusing to hand out or accept a
//! handle for an inode that has since been replaced.
//!
//! ## Design Principles
//! 1. **Object Pool Pattern**: Keep a bounded FIFO of reusable handles.
//! 2. **Minimal Locking**: Hold the mutex only while moving handles.
//! 3. **Version Guard**: A handle stamped with a stale version is closed
//!    instead of accepted, so a replaced file never gets cached under the
//!    new inode's pool.
//! 4. **Fail Fast**: A full or closing pool closes the handle immediately
//!    rather than blocking the caller.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::open_file::OpenFile;

/// Default bound on the number of idle handles kept per path.
pub const DEFAULT_POOL_CAPACITY: usize = 8;

/// Per-path ring of reusable [`OpenFile`] handles.
#[derive(Debug)]
pub struct OpenFilePool {
    filename: String,
    version: u64,
    capacity: usize,
    closing: AtomicBool,
    queue: Mutex<VecDeque<OpenFile>>,
}

impl OpenFilePool {
    /// Creates an empty pool for `filename`, stamped with `version` (taken
    /// from the first handle ever inserted for this path).
    pub fn new(filename: impl Into<String>, version: u64) -> Self {
        Self::with_capacity(filename, version, DEFAULT_POOL_CAPACITY)
    }

    pub fn with_capacity(filename: impl Into<String>, version: u64, capacity: usize) -> Self {
        OpenFilePool {
            filename: filename.into(),
            version,
            capacity: capacity.max(1),
            closing: AtomicBool::new(false),
            queue: Mutex::new(VecDeque::new()),
        }
    }

    /// Enqueues `handle`, or closes it and returns `false` if the pool is
    /// closing, the handle's version doesn't match this pool's, or the
    /// queue is already at capacity.
    pub fn put(&self, handle: OpenFile) -> bool {
        if self.closing.load(Ordering::Acquire) {
            drop(handle);
            return false;
        }
        if handle.version() != self.version {
            drop(handle);
            return false;
        }

        let mut queue = self.queue.lock();
        if queue.len() >= self.capacity {
            drop(queue);
            drop(handle);
            return false;
        }
        queue.push_back(handle);
        true
    }

    /// Dequeues one handle if the pool isn't closing.
    ///
    /// The bool is `true` iff a handle was actually removed from the
    /// queue; this is what callers use to keep an outer item count honest
    /// without re-checking `len()` under a second lock.
    pub fn get(&self) -> (Option<OpenFile>, bool) {
        if self.closing.load(Ordering::Acquire) {
            return (None, false);
        }
        let mut queue = self.queue.lock();
        match queue.pop_front() {
            Some(handle) => (Some(handle), true),
            None => (None, false),
        }
    }

    /// Marks the pool closing; after this, `get` returns nothing and `put`
    /// refuses and closes the handle instead of enqueuing.
    pub fn set_closing(&self) {
        self.closing.store(true, Ordering::Release);
    }

    /// Closes every enqueued handle, emptying the queue. Idempotent.
    pub fn close(&self) {
        self.queue.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn version(&self) -> u64 {
        self.version
    }
}
