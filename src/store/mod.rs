pub mod keys;
pub mod migrate;
pub mod trees;
pub mod usage;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::Db;
use thiserror::Error;
use tokio::sync::broadcast;

use crate::config::StorageConfig;
use crate::events::{AlertLevel, EventBus, StoreEvent};

/// Local Store Accessor: a sled-backed key → JSON document store that
/// enforces an estimated capacity and reports every write on the event bus.
#[derive(Debug)]
pub struct Store {
    db: Db,
    documents: sled::Tree,
    meta: sled::Tree,
    events: EventBus,
    capacity_bytes: u64,
    used_bytes: AtomicU64,
    write_lock: Mutex<()>,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("migration error at version {version}: {message}")]
    Migration { version: u32, message: String },
}

/// Failure of [`Store::write`]. The previously stored document is untouched.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WriteError {
    #[error("storage capacity exceeded writing {key}: {required} of {capacity} bytes")]
    CapacityExceeded {
        key: String,
        required: u64,
        capacity: u64,
    },
    #[error("storage write failed: {0}")]
    Unknown(String),
}

impl From<StoreError> for WriteError {
    fn from(err: StoreError) -> Self {
        WriteError::Unknown(err.to_string())
    }
}

impl Store {
    pub fn open(sled_path: &str, storage: &StorageConfig) -> Result<Self, StoreError> {
        let db = sled::open(sled_path)?;
        Self::from_db(db, storage)
    }

    /// Opens a throwaway store that lives only as long as the handle.
    pub fn temporary(storage: &StorageConfig) -> Result<Self, StoreError> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db, storage)
    }

    fn from_db(db: Db, storage: &StorageConfig) -> Result<Self, StoreError> {
        let documents = db.open_tree(trees::DOCUMENTS)?;
        let meta = db.open_tree(trees::META)?;

        let mut used = 0u64;
        for item in documents.iter() {
            let (_, value) = item?;
            used += value.len() as u64;
        }
        tracing::debug!(used_bytes = used, "Opened document store");

        Ok(Self {
            db,
            documents,
            meta,
            events: EventBus::new(),
            capacity_bytes: storage.capacity_bytes,
            used_bytes: AtomicU64::new(used),
            write_lock: Mutex::new(()),
        })
    }

    pub fn run_migrations(&self) -> Result<(), StoreError> {
        migrate::run(self)
    }

    pub fn flush(&self) -> Result<(), StoreError> {
        self.db.flush()?;
        Ok(())
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    pub fn capacity_bytes(&self) -> u64 {
        self.capacity_bytes
    }

    pub fn used_bytes(&self) -> u64 {
        self.used_bytes.load(Ordering::Relaxed)
    }

    /// Reads and decodes a document. Missing keys, storage errors and decode
    /// failures all read as `None`; the latter two are logged.
    pub fn read<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.read_raw(key)?;
        match serde_json::from_slice(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(key, error = %e, "Failed to decode stored document, treating as absent");
                None
            }
        }
    }

    pub fn read_raw(&self, key: &str) -> Option<Vec<u8>> {
        match self.documents.get(key.as_bytes()) {
            Ok(value) => value.map(|v| v.to_vec()),
            Err(e) => {
                tracing::warn!(key, error = %e, "Failed to read stored document");
                None
            }
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        matches!(self.documents.contains_key(key.as_bytes()), Ok(true))
    }

    /// Serialized size of the document at `key`, 0 when absent.
    pub fn byte_size(&self, key: &str) -> u64 {
        match self.documents.get(key.as_bytes()) {
            Ok(Some(value)) => value.len() as u64,
            _ => 0,
        }
    }

    /// Writes a complete document and publishes a change notification.
    pub fn write<T: Serialize>(&self, key: &str, value: &T) -> Result<(), WriteError> {
        self.put(key, value, true)
    }

    /// Writes without a change notification. Used when applying merged sync
    /// results, which must not re-arm the push debounce.
    pub fn write_quiet<T: Serialize>(&self, key: &str, value: &T) -> Result<(), WriteError> {
        self.put(key, value, false)
    }

    fn put<T: Serialize>(&self, key: &str, value: &T, notify: bool) -> Result<(), WriteError> {
        let bytes = match serde_json::to_vec(value) {
            Ok(bytes) => bytes,
            Err(e) => return Err(self.report_failure(key, WriteError::Unknown(e.to_string()))),
        };

        // 单写者：容量计算与写入必须在同一临界区内完成
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let old_len = self.byte_size(key);
        let used = self.used_bytes.load(Ordering::Relaxed);
        let required = used.saturating_sub(old_len) + bytes.len() as u64;
        if required > self.capacity_bytes {
            return Err(self.report_failure(
                key,
                WriteError::CapacityExceeded {
                    key: key.to_string(),
                    required,
                    capacity: self.capacity_bytes,
                },
            ));
        }

        if let Err(e) = self.documents.insert(key.as_bytes(), bytes) {
            return Err(self.report_failure(key, WriteError::Unknown(e.to_string())));
        }
        self.used_bytes.store(required, Ordering::Relaxed);

        if notify {
            self.events.changed(key);
        }
        Ok(())
    }

    fn report_failure(&self, key: &str, err: WriteError) -> WriteError {
        let message = match &err {
            WriteError::CapacityExceeded { .. } => {
                tracing::error!(key, error = %err, "Storage capacity exceeded");
                "Storage is full. Export a backup and clear old data to keep saving progress.".to_string()
            }
            WriteError::Unknown(detail) => {
                tracing::error!(key, error = %detail, "Storage write failed");
                format!("Failed to save data: {detail}")
            }
        };
        self.events.alert(AlertLevel::Error, message);
        err
    }

    /// Removes a document. Removal is not a sync-relevant change.
    pub fn remove(&self, key: &str) -> Result<bool, StoreError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        match self.documents.remove(key.as_bytes())? {
            Some(old) => {
                let used = self.used_bytes.load(Ordering::Relaxed);
                self.used_bytes
                    .store(used.saturating_sub(old.len() as u64), Ordering::Relaxed);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// All stored keys starting with `prefix`, in key order.
    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        let mut out = Vec::new();
        for item in self.documents.scan_prefix(prefix.as_bytes()) {
            match item {
                Ok((key, _)) => out.push(String::from_utf8_lossy(&key).into_owned()),
                Err(e) => {
                    tracing::warn!(prefix, error = %e, "Prefix scan interrupted");
                    break;
                }
            }
        }
        out
    }

    pub fn get_meta(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.meta.get(key.as_bytes())?.map(|v| v.to_vec()))
    }

    pub fn set_meta(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.meta.insert(key.as_bytes(), value)?;
        Ok(())
    }
}
