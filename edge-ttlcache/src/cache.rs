//! The sharded cache itself: hashes keys to pieces and fans operations out.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use edge_common::date::now_unix;

use crate::hash::hash_key;
use crate::manager::Manager;
use crate::piece::{Item, Piece, Value};
use crate::{DEFAULT_MAX_ITEMS, DEFAULT_PIECES, MAX_TTL_SECS};

/// Shards processed per `gc()` call before the rotating cursor advances.
const GC_BATCH: usize = 4;

/// A fixed, hash-partitioned TTL cache.
///
/// Construct with [`Cache::new`] for the defaults, or [`Cache::with_pieces`]
/// to size the shard count and per-shard capacity explicitly (the
/// `edge-waf` CC2 counter and `edge-cache`'s cache-metadata store each keep
/// their own instance).
#[derive(Debug)]
pub struct Cache {
    pieces: Vec<Piece>,
    count_pieces: u64,
    destroyed: AtomicBool,
    gc_cursor: AtomicUsize,
}

impl Cache {
    /// Creates a cache with [`DEFAULT_PIECES`] shards and
    /// [`DEFAULT_MAX_ITEMS`] total capacity.
    pub fn new() -> Self {
        Self::with_pieces(DEFAULT_PIECES, DEFAULT_MAX_ITEMS)
    }

    /// Creates a cache with `count_pieces` shards, each capped at
    /// `max_items / count_pieces` entries.
    pub fn with_pieces(count_pieces: usize, max_items: usize) -> Self {
        let count_pieces = count_pieces.max(1);
        let per_piece = (max_items / count_pieces).max(1);
        let pieces = (0..count_pieces).map(|_| Piece::new(per_piece)).collect();
        Cache {
            pieces,
            count_pieces: count_pieces as u64,
            destroyed: AtomicBool::new(false),
            gc_cursor: AtomicUsize::new(0),
        }
    }

    /// Creates a cache and registers it with the process-wide [`Manager`]
    /// so a background [`crate::spawn_gc_loop`] sweeps it automatically.
    pub fn new_shared() -> Arc<Self> {
        Self::with_pieces_shared(DEFAULT_PIECES, DEFAULT_MAX_ITEMS)
    }

    /// Like [`Cache::new_shared`], sized explicitly.
    pub fn with_pieces_shared(count_pieces: usize, max_items: usize) -> Arc<Self> {
        let cache = Arc::new(Self::with_pieces(count_pieces, max_items));
        Manager::add(&cache);
        cache
    }

    fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    fn piece_for(&self, hashed: u64) -> &Piece {
        &self.pieces[(hashed % self.count_pieces) as usize]
    }

    /// Clamps `expires_at` so no entry ever outlives [`MAX_TTL_SECS`] from
    /// `now`.
    fn clamp_expiry(now: i64, expires_at: i64) -> i64 {
        let max_expires_at = now + MAX_TTL_SECS;
        expires_at.min(max_expires_at)
    }

    /// Stores `value` under `key`, expiring at `expires_at` (unix seconds).
    ///
    /// Returns `false` without writing when the cache is destroyed or
    /// `expires_at` is already in the past.
    pub fn write(&self, key: &str, value: Value, expires_at: i64) -> bool {
        if self.is_destroyed() {
            return false;
        }
        let now = now_unix();
        if expires_at <= now {
            return false;
        }
        let expires_at = Self::clamp_expiry(now, expires_at);
        let hashed = hash_key(key.as_bytes());
        self.piece_for(hashed).write(hashed, Item { value, expires_at });
        true
    }

    /// Atomically adds `delta` to the integer stored under `key`.
    ///
    /// A live entry is updated in place; expiry is only extended when
    /// `extend` is true. A missing or expired entry is replaced with a
    /// fresh one holding just `delta`. Returns 0 when the cache is
    /// destroyed or `expires_at` has already passed.
    pub fn increase_int64(&self, key: &str, delta: i64, expires_at: i64, extend: bool) -> i64 {
        if self.is_destroyed() {
            return 0;
        }
        let now = now_unix();
        if expires_at <= now {
            return 0;
        }
        let expires_at = Self::clamp_expiry(now, expires_at);
        let hashed = hash_key(key.as_bytes());
        self.piece_for(hashed).increase_int64(hashed, delta, expires_at, extend, now)
    }

    /// Returns the item stored under `key`, if present and not expired.
    pub fn read(&self, key: &str) -> Option<Item> {
        let hashed = hash_key(key.as_bytes());
        self.piece_for(hashed).read(hashed, now_unix())
    }

    /// Removes the entry stored under `key`, if any.
    pub fn delete(&self, key: &str) {
        let hashed = hash_key(key.as_bytes());
        self.piece_for(hashed).delete(hashed);
    }

    /// Sums populations across all shards. Best-effort under concurrent
    /// mutation: no cross-shard lock is held while counting.
    pub fn count(&self) -> usize {
        self.pieces.iter().map(|p| p.count()).sum()
    }

    /// Sweeps at most [`GC_BATCH`] consecutive shards starting from the
    /// persisted cursor, removing expired entries. The cursor wraps back to
    /// 0 once it reaches the end rather than wrapping mid-sweep.
    pub fn gc(&self) {
        let now = now_unix();
        let start = self.gc_cursor.load(Ordering::Relaxed);
        let end = (start + GC_BATCH).min(self.pieces.len());
        for piece in &self.pieces[start..end] {
            piece.gc(now);
        }

        let next = if end >= self.pieces.len() { 0 } else { end };
        self.gc_cursor.store(next, Ordering::Relaxed);
    }

    /// Drops every entry across every shard.
    pub fn clean(&self) {
        for piece in &self.pieces {
            piece.clean();
        }
    }

    /// Marks the cache terminal and drops all entries. Callers holding an
    /// `Arc<Cache>` registered with a [`crate::Manager`] should drop it
    /// afterwards; the manager prunes dead weak references on its own.
    pub fn destroy(&self) {
        self.destroyed.store(true, Ordering::Release);
        self.clean();
    }
}

impl Default for Cache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_roundtrips() {
        let cache = Cache::with_pieces(4, 100);
        let now = now_unix();
        assert!(cache.write("a", Value::Bytes(b"hi".to_vec()), now + 60));
        let item = cache.read("a").expect("present");
        assert_eq!(item.value, Value::Bytes(b"hi".to_vec()));
    }

    #[test]
    fn write_rejects_already_expired() {
        let cache = Cache::with_pieces(4, 100);
        let now = now_unix();
        assert!(!cache.write("a", Value::Bytes(vec![]), now - 1));
        assert!(cache.read("a").is_none());
    }

    #[test]
    fn write_clamps_to_max_ttl() {
        let cache = Cache::with_pieces(1, 100);
        let now = now_unix();
        assert!(cache.write("a", Value::Int(1), now + MAX_TTL_SECS * 10));
        let item = cache.read("a").unwrap();
        assert!(item.expires_at <= now + MAX_TTL_SECS + 1);
    }

    #[test]
    fn increase_int64_accumulates_and_extends_only_when_asked() {
        let cache = Cache::with_pieces(4, 100);
        let now = now_unix();
        assert_eq!(cache.increase_int64("hits", 1, now + 5, false), 1);
        assert_eq!(cache.increase_int64("hits", 2, now + 50, true), 3);
        let item = cache.read("hits").unwrap();
        assert_eq!(item.value.as_int64(), Some(3));
        assert_eq!(item.expires_at, now + 50);
    }

    #[test]
    fn increase_int64_resets_after_expiry() {
        let cache = Cache::with_pieces(4, 100);
        let now = now_unix();
        assert_eq!(cache.increase_int64("k", 5, now + 1, false), 5);
        // Simulate expiry by writing directly with a past deadline via delete+reinsert.
        cache.delete("k");
        assert_eq!(cache.increase_int64("k", 7, now + 10, false), 7);
    }

    #[test]
    fn delete_and_count_reflect_mutations() {
        let cache = Cache::with_pieces(8, 100);
        let now = now_unix();
        cache.write("a", Value::Int(1), now + 60);
        cache.write("b", Value::Int(2), now + 60);
        assert_eq!(cache.count(), 2);
        cache.delete("a");
        assert_eq!(cache.count(), 1);
    }

    #[test]
    fn gc_sweeps_every_shard_once_the_cursor_wraps() {
        let cache = Cache::with_pieces(8, 100);
        let now = now_unix();
        for i in 0..8u64 {
            cache.write(&format!("k{i}"), Value::Int(i as i64), now + 1);
        }
        assert_eq!(cache.count(), 8);

        std::thread::sleep(std::time::Duration::from_millis(1100));
        // GC_BATCH is 4, so two calls are needed to cover all 8 shards.
        cache.gc();
        cache.gc();
        assert_eq!(cache.count(), 0);
    }

    #[test]
    fn clean_empties_all_shards() {
        let cache = Cache::with_pieces(4, 100);
        let now = now_unix();
        cache.write("a", Value::Int(1), now + 60);
        cache.clean();
        assert_eq!(cache.count(), 0);
    }

    #[test]
    fn destroy_rejects_further_writes() {
        let cache = Cache::with_pieces(4, 100);
        let now = now_unix();
        cache.write("a", Value::Int(1), now + 60);
        cache.destroy();
        assert_eq!(cache.count(), 0);
        assert!(!cache.write("b", Value::Int(1), now + 60));
    }
}
