//! Process-wide registry that sweeps every live [`Cache`] on a timer.
//!
//! Mirrors the teacher's `ExpirationHandle`/`start_expirer` pattern, but
//! generalized to track every `Cache` instance in the process rather than a
//! single engine: `edge-cache`'s metadata store and `edge-waf`'s CC2 counter
//! each register themselves and get GC'd from the same background loop.

use std::sync::{LazyLock, Mutex, Weak};
use std::time::Duration;

use tracing::debug;

use crate::Cache;

/// The process-wide set of caches awaiting periodic `gc()`.
///
/// Held as weak references so registering with the manager never keeps a
/// `Cache` alive past its owner dropping it.
static REGISTRY: LazyLock<Mutex<Vec<Weak<Cache>>>> = LazyLock::new(|| Mutex::new(Vec::new()));

/// Registers and sweeps [`Cache`] instances.
///
/// There is exactly one logical manager per process (the static
/// [`REGISTRY`]); this type is a thin, zero-sized handle onto it so call
/// sites can still write `Manager::add(&cache)` / `Manager::sweep_all()`.
pub struct Manager;

impl Manager {
    /// Adds `cache` to the process-wide registry.
    pub fn add(cache: &std::sync::Arc<Cache>) {
        let mut registry = REGISTRY.lock().expect("manager registry poisoned");
        registry.push(std::sync::Arc::downgrade(cache));
    }

    /// Calls `gc()` on every still-live registered cache, pruning weak
    /// references whose cache has already been dropped.
    pub fn sweep_all() {
        let mut registry = REGISTRY.lock().expect("manager registry poisoned");
        registry.retain(|weak| {
            if let Some(cache) = weak.upgrade() {
                cache.gc();
                true
            } else {
                false
            }
        });
    }

    /// Number of caches currently registered (including any that have since
    /// been dropped but not yet pruned by a sweep).
    pub fn len() -> usize {
        REGISTRY.lock().expect("manager registry poisoned").len()
    }
}

/// Handle returned by [`spawn_gc_loop`]; dropping or calling [`GcHandle::stop`]
/// cancels the background sweep task.
pub struct GcHandle {
    task: tokio::task::JoinHandle<()>,
}

impl GcHandle {
    /// Cancels the background sweep task.
    pub fn stop(self) {
        self.task.abort();
    }
}

/// Spawns a tokio task that calls [`Manager::sweep_all`] every `interval`.
///
/// Requires a tokio runtime to already be running (the caller's `#[tokio::main]`
/// or an equivalent `Runtime::enter`).
pub fn spawn_gc_loop(interval: Duration) -> GcHandle {
    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            debug!(registered = Manager::len(), "sweeping ttl caches");
            Manager::sweep_all();
        }
    });
    GcHandle { task }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::piece::Value;

    #[test]
    fn sweep_all_gcs_registered_caches_and_prunes_dropped_ones() {
        let before = Manager::len();
        let cache = Cache::with_pieces_shared(2, 10);
        assert_eq!(Manager::len(), before + 1);

        let now = edge_common::date::now_unix();
        cache.write("k", Value::Int(1), now + 60);
        Manager::sweep_all();
        assert_eq!(cache.count(), 1);

        drop(cache);
        Manager::sweep_all();
        assert_eq!(Manager::len(), before);
    }
}
