use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::constants::{
    DEFAULT_DEBOUNCE_MS, DEFAULT_STORAGE_CAPACITY_BYTES, DEFAULT_STORAGE_WARNING_PERCENT,
    DEFAULT_SYNC_TIMEOUT_SECS,
};

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub enable_file_logs: bool,
    pub log_dir: String,
    pub sled_path: String,
    pub sync: SyncConfig,
    pub storage: StorageConfig,
}

#[derive(Clone)]
pub struct SyncConfig {
    pub api_url: String,
    pub auth_token: Option<String>,
    pub debounce_ms: u64,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub capacity_bytes: u64,
    pub warning_percent: u8,
}

impl fmt::Debug for SyncConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncConfig")
            .field("api_url", &self.api_url)
            .field(
                "auth_token",
                &self.auth_token.as_ref().map(|_| "***REDACTED***"),
            )
            .field("debounce_ms", &self.debounce_ms)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl SyncConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            capacity_bytes: DEFAULT_STORAGE_CAPACITY_BYTES,
            warning_percent: DEFAULT_STORAGE_WARNING_PERCENT,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            log_level: env_or("RUST_LOG", "info"),
            enable_file_logs: env_or_bool("ENABLE_FILE_LOGS", false),
            log_dir: env_or("LOG_DIR", "./logs"),
            sled_path: env_or("SLED_PATH", "./data/progress.sled"),
            sync: SyncConfig {
                api_url: env_or("SYNC_API_URL", "http://localhost:8000/api"),
                auth_token: env_opt("SYNC_AUTH_TOKEN"),
                debounce_ms: env_or_parse("SYNC_DEBOUNCE_MS", DEFAULT_DEBOUNCE_MS),
                timeout_secs: env_or_parse("SYNC_TIMEOUT_SECS", DEFAULT_SYNC_TIMEOUT_SECS),
            },
            storage: StorageConfig {
                capacity_bytes: env_or_parse(
                    "STORAGE_CAPACITY_BYTES",
                    DEFAULT_STORAGE_CAPACITY_BYTES,
                ),
                warning_percent: env_or_parse(
                    "STORAGE_WARNING_PERCENT",
                    DEFAULT_STORAGE_WARNING_PERCENT,
                )
                .min(100),
            },
        }
    }
}

pub fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

/// 空字符串视为未设置
pub fn env_opt(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|raw| raw.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn env_or_parse<T>(key: &str, default: T) -> T
where
    T: FromStr + Copy,
{
    match env::var(key) {
        Ok(raw) => match raw.parse::<T>() {
            Ok(v) => v,
            Err(_) => {
                tracing::warn!(
                    key,
                    value = %raw,
                    "Failed to parse env var, using default"
                );
                default
            }
        },
        Err(_) => default,
    }
}

pub fn env_or_bool(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => default,
        },
        Err(_) => default,
    }
}
