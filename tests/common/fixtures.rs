use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use tempfile::TempDir;

use learning_sync::config::StorageConfig;
use learning_sync::services::Clock;
use learning_sync::store::Store;

/// On-disk store that lives as long as the returned guard.
pub struct TestStore {
    pub store: Arc<Store>,
    _temp_dir: TempDir,
}

pub fn open_store() -> TestStore {
    open_store_with(StorageConfig::default())
}

pub fn open_store_with(storage: StorageConfig) -> TestStore {
    let temp_dir = tempfile::tempdir().expect("tempdir");
    let sled_path = temp_dir.path().join("learning-sync-test.sled");
    let store = Store::open(sled_path.to_str().expect("utf8 path"), &storage).expect("open store");
    store.run_migrations().expect("migrations");
    TestStore {
        store: Arc::new(store),
        _temp_dir: temp_dir,
    }
}

pub fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
}

pub fn fixed_clock(y: i32, m: u32, d: u32) -> Clock {
    Clock::fixed(at(y, m, d, 9))
}
