//! # Sharded TTL Cache
//!
//! A fixed, hash-partitioned in-memory key/value store with per-shard
//! locking, bounded item counts, expiry sweeping, and an atomic
//! increment-with-expiry operation (spec.md §4.A).
//!
//! ## Design Principles
//!
//! 1. **Sharded Locks**: each piece is locked independently so unrelated
//!    keys never contend (teacher: `hkv-engine`'s per-shard `RwLock`).
//! 2. **Expire-on-Access**: reads treat past-expiry entries as absent and
//!    opportunistically remove them, keeping memory bounded without a
//!    dedicated sweep on every call.
//! 3. **Clamped TTLs**: no entry may outlive 30 days from the time it was
//!    written, regardless of the caller-requested expiry.
//! 4. **Rotating GC**: a persisted cursor lets the background sweep touch a
//!    few shards per tick instead of scanning the whole cache at once.
//!
//! ## Structure Overview
//!
//! ```text
//! Cache
//!   └── pieces: Vec<Piece>
//!         └── Piece
//!               └── inner: RwLock<HashMap<u64, Item>>
//!                     └── Item { value, expires_at }
//! ```

mod cache;
mod hash;
mod manager;
mod piece;

pub use cache::Cache;
pub use manager::{spawn_gc_loop, GcHandle, Manager};
pub use piece::{Item, Value};

/// Maximum effective TTL: entries may not outlive 30 days from write time
/// (spec.md §3, Data Model invariants).
pub const MAX_TTL_SECS: i64 = 30 * 86_400;

/// Default shard count when the caller does not specify one.
pub const DEFAULT_PIECES: usize = 256;

/// Default cap on total items across all shards.
pub const DEFAULT_MAX_ITEMS: usize = 1_000_000;
