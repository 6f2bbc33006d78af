//! # Open-File Pool / Open-File Cache
//!
//! A bounded LRU of per-path reusable file handles with filesystem-change
//! invalidation, so hot files stay open across requests without ever
//! handing a stale handle back out from under a concurrent eviction.
//!
//! ## Design Principles
//!
//! 1. **Object Pool Pattern**: each path gets its own bounded FIFO of
//!    already-open handles (teacher: `hkv-client`'s connection pool).
//! 2. **Version Guard**: a handle's version is stamped once at pool
//!    creation; `put`s from a since-replaced inode are refused and closed.
//! 3. **Index-Based Intrusive LRU**: pools link to each other by arena
//!    index rather than pointer, avoiding unsafe code.
//! 4. **Lock-Released Close**: releasing file descriptors never happens
//!    while the cache lock is held.
//!
//! ## Structure Overview
//!
//! ```text
//! OpenFileCache
//!   ├── map: path -> slot index
//!   ├── slots: arena of Slot { pool, prev, next }  (LRU list)
//!   └── watcher: notify::RecommendedWatcher
//!         └── background thread -> cache.close(path) on change
//! ```

mod cache;
mod open_file;
mod pool;

pub use cache::{OpenFileCache, DEFAULT_MAX_SIZE};
pub use open_file::OpenFile;
pub use pool::{OpenFilePool, DEFAULT_POOL_CAPACITY};
