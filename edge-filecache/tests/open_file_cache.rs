use std::fs::File;
use std::io::Write;
use std::thread;
use std::time::Duration;

use edge_filecache::{OpenFile, OpenFileCache};
use tempfile::NamedTempFile;

fn open(path: &std::path::Path) -> OpenFile {
    let file = File::open(path).expect("open temp file");
    OpenFile::new(file, 1)
}

#[test]
fn put_then_get_roundtrips_a_handle() {
    let cache = OpenFileCache::new(16_384).expect("watcher available");
    let tmp = NamedTempFile::new().expect("create temp file");
    let path = tmp.path().to_str().unwrap().to_string();

    cache.put(&path, open(tmp.path()));
    assert_eq!(cache.count(), 1);

    let handle = cache.get(&path).expect("handle present");
    assert_eq!(handle.version(), 1);
    assert_eq!(cache.count(), 0);

    cache.close_all();
}

#[test]
fn cache_count_matches_put_and_close() {
    let cache = OpenFileCache::new(16_384).expect("watcher available");
    let tmp = NamedTempFile::new().expect("create temp file");
    let path = tmp.path().to_str().unwrap().to_string();

    cache.put(&path, open(tmp.path()));
    cache.put(&path, open(tmp.path()));
    assert_eq!(cache.count(), 2);

    cache.close(&path);
    assert_eq!(cache.count(), 0);
    assert!(cache.get(&path).is_none());

    cache.close_all();
}

#[test]
fn lru_eviction_drops_oldest_paths_over_capacity() {
    let cache = OpenFileCache::new(2).expect("watcher available");
    let mut temps = Vec::new();
    for _ in 0..3 {
        let tmp = NamedTempFile::new().expect("create temp file");
        let path = tmp.path().to_str().unwrap().to_string();
        cache.put(&path, open(tmp.path()));
        temps.push((tmp, path));
    }

    // max_size=2 means eviction kicks in once count exceeds 2; the batch
    // size is max(1, max_size/100) = 1, so the single oldest path's
    // handle is closed, dropping count back under the bound.
    assert!(cache.count() <= 2);
    assert!(cache.get(&temps[0].1).is_none());

    cache.close_all();
}

#[test]
fn watcher_invalidates_pool_on_content_change() {
    let cache = OpenFileCache::new(16_384).expect("watcher available");
    let mut tmp = NamedTempFile::new().expect("create temp file");
    let path = tmp.path().to_str().unwrap().to_string();

    cache.put(&path, open(tmp.path()));
    assert_eq!(cache.count(), 1);

    tmp.write_all(b"changed").expect("write triggers a modify event");
    tmp.flush().expect("flush");

    let mut removed = false;
    for _ in 0..50 {
        if cache.get(&path).is_none() && cache.count() == 0 {
            removed = true;
            break;
        }
        thread::sleep(Duration::from_millis(20));
    }
    assert!(removed, "expected watcher to close the pool after a content change");

    cache.close_all();
}
