//! Storage Usage Monitor: read-only byte accounting over tracked keys.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::store::keys;
use crate::store::Store;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageUsage {
    pub total_bytes: u64,
    pub per_key_bytes: BTreeMap<String, u64>,
    pub capacity_bytes: u64,
    pub usage_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageWarning {
    pub warning: bool,
    pub usage_percent: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl StorageUsage {
    pub fn total_kb(&self) -> f64 {
        round2(self.total_bytes as f64 / 1024.0)
    }
}

impl Store {
    /// Sums serialized sizes of every fixed domain key and every dynamic
    /// per-book key. Absent fixed keys are reported as 0 bytes.
    pub fn usage(&self) -> StorageUsage {
        let mut per_key_bytes = BTreeMap::new();

        for key in keys::FIXED_KEYS {
            per_key_bytes.insert((*key).to_string(), self.byte_size(key));
        }
        for prefix in keys::DYNAMIC_PREFIXES {
            for key in self.keys_with_prefix(prefix) {
                let size = self.byte_size(&key);
                per_key_bytes.insert(key, size);
            }
        }

        let total_bytes: u64 = per_key_bytes.values().sum();
        let capacity_bytes = self.capacity_bytes();
        let usage_percent = if capacity_bytes == 0 {
            100.0
        } else {
            round2(total_bytes as f64 * 100.0 / capacity_bytes as f64)
        };

        StorageUsage {
            total_bytes,
            per_key_bytes,
            capacity_bytes,
            usage_percent,
        }
    }

    pub fn check_warning(&self, threshold_percent: u8) -> StorageWarning {
        let usage = self.usage();
        if usage.usage_percent >= f64::from(threshold_percent) {
            StorageWarning {
                warning: true,
                usage_percent: usage.usage_percent,
                message: Some(format!(
                    "Storage is {:.1}% full ({} KB). Consider exporting a backup.",
                    usage.usage_percent,
                    usage.total_kb()
                )),
            }
        } else {
            StorageWarning {
                warning: false,
                usage_percent: usage.usage_percent,
                message: None,
            }
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
