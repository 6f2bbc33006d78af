//! A single shard ("piece") of the TTL cache.

use std::collections::HashMap;

use parking_lot::RwLock;

/// Value stored in a TTL cache entry.
///
/// The original cache stores an arbitrary value; this workspace only ever
/// needs opaque bytes (cache metadata blobs) or a signed counter (the CC2
/// rate-limit counter), so the generic `any` is narrowed to a two-variant
/// enum instead of boxing a trait object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Int(i64),
    Bytes(Vec<u8>),
}

impl Value {
    /// Returns the integer value, or `None` if this entry holds bytes.
    pub fn as_int64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Bytes(_) => None,
        }
    }
}

/// A TTL cache entry: a value and its absolute expiry (unix seconds).
#[derive(Debug, Clone)]
pub struct Item {
    pub value: Value,
    pub expires_at: i64,
}

impl Item {
    fn is_expired(&self, now: i64) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug, Default)]
pub(crate) struct PieceInner {
    items: HashMap<u64, Item>,
}

/// One partition of the TTL cache, serialized by its own lock.
#[derive(Debug)]
pub(crate) struct Piece {
    inner: RwLock<PieceInner>,
    #[allow(dead_code)]
    max_items: usize,
}

impl Piece {
    pub fn new(max_items: usize) -> Self {
        Piece {
            inner: RwLock::new(PieceInner::default()),
            max_items,
        }
    }

    pub fn write(&self, key: u64, item: Item) {
        let mut inner = self.inner.write();
        inner.items.insert(key, item);
    }

    /// Atomically increments (or creates) an integer entry.
    ///
    /// Mirrors `Piece.IncreaseInt64` in the original: a live entry has
    /// `delta` added and its expiry extended only when `extend` is true; a
    /// missing or expired entry is replaced with a fresh one.
    pub fn increase_int64(&self, key: u64, delta: i64, expires_at: i64, extend: bool, now: i64) -> i64 {
        let mut inner = self.inner.write();
        match inner.items.get_mut(&key) {
            Some(existing) if !existing.is_expired(now) => {
                let current = existing.value.as_int64().unwrap_or(0);
                let updated = current.wrapping_add(delta);
                existing.value = Value::Int(updated);
                if extend {
                    existing.expires_at = expires_at;
                }
                updated
            }
            _ => {
                inner.items.insert(
                    key,
                    Item {
                        value: Value::Int(delta),
                        expires_at,
                    },
                );
                delta
            }
        }
    }

    pub fn read(&self, key: u64, now: i64) -> Option<Item> {
        let expired = {
            let inner = self.inner.read();
            match inner.items.get(&key) {
                Some(item) if item.is_expired(now) => true,
                Some(item) => return Some(item.clone()),
                None => return None,
            }
        };
        if expired {
            self.inner.write().items.remove(&key);
        }
        None
    }

    pub fn delete(&self, key: u64) {
        self.inner.write().items.remove(&key);
    }

    pub fn count(&self) -> usize {
        self.inner.read().items.len()
    }

    /// Removes every entry that has expired as of `now`.
    pub fn gc(&self, now: i64) {
        let mut inner = self.inner.write();
        inner.items.retain(|_, item| !item.is_expired(now));
    }

    pub fn clean(&self) {
        self.inner.write().items.clear();
    }
}
