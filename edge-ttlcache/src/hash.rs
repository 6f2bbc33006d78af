//! Stable 64-bit hash used for shard selection.
//!
//! Any non-cryptographic, stable-across-calls hash works here (spec.md
//! §3 only requires "a stable 64-bit non-cryptographic hash"); `ahash`'s
//! fixed `RandomState` seed gives us that without pulling in a bespoke
//! hasher, matching the teacher's `hkv-engine` shard-selection approach.

use std::hash::{BuildHasher, Hasher};

use ahash::RandomState;

/// Fixed seed so repeated runs (and repeated construction of a `Cache`)
/// hash identical keys to identical shards.
fn build_hasher() -> RandomState {
    RandomState::with_seeds(0x5bd1_e995, 0x27d4_eb2f, 0x1656_67b1, 0x9e37_79b9)
}

/// Hashes `key` to a stable 64-bit value used to pick a shard.
pub fn hash_key(key: &[u8]) -> u64 {
    let mut hasher = build_hasher().build_hasher();
    hasher.write(key);
    hasher.finish()
}
