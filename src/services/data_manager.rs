//! Backup export/import and full reset.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{APP_NAME, APP_VERSION};
use crate::domain::merge::Merge;
use crate::events::StoreEvent;
use crate::services::books::BookRecords;
use crate::services::Clock;
use crate::store::keys;
use crate::store::{Store, StoreError, WriteError};
use crate::sync::snapshot::SyncSnapshot;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupDocument {
    pub version: String,
    pub export_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_name: Option<String>,
    #[serde(flatten)]
    pub data: SyncSnapshot,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportMode {
    /// Replace each present section wholesale.
    #[default]
    Overwrite,
    /// Merge each present section into local data with the sync merge rules.
    Merge,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub mode: ImportMode,
    pub written_keys: usize,
    pub imported_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("backup is not valid JSON: {0}")]
    Parse(String),
    #[error("invalid backup: {0}")]
    Validation(String),
    #[error(transparent)]
    Write(#[from] WriteError),
}

/// Sections a backup must carry at least one of.
const DATA_SECTIONS: &[&str] = &[
    "progress",
    "badges",
    "statistics",
    "streakData",
    "todayQuestData",
    "learningProgress",
    "readingProgress",
    "bookmarks",
];

#[derive(Debug, Clone)]
pub struct DataManager {
    store: Arc<Store>,
    clock: Clock,
}

impl DataManager {
    pub fn new(store: Arc<Store>) -> Self {
        Self::with_clock(store, Clock::system())
    }

    pub fn with_clock(store: Arc<Store>, clock: Clock) -> Self {
        Self { store, clock }
    }

    pub fn export(&self) -> BackupDocument {
        BackupDocument {
            version: APP_VERSION.to_string(),
            export_date: self.clock.now(),
            app_name: Some(APP_NAME.to_string()),
            data: SyncSnapshot::collect(&self.store),
        }
    }

    pub fn export_json(&self) -> Result<String, StoreError> {
        Ok(serde_json::to_string_pretty(&self.export())?)
    }

    /// `classichero_backup_YYYYMMDD.json`
    pub fn backup_file_name(date: NaiveDate) -> String {
        format!("classichero_backup_{}.json", date.format("%Y%m%d"))
    }

    /// Validates and imports a backup. Nothing is written unless the whole
    /// document passes validation.
    pub fn import_json(&self, text: &str, mode: ImportMode) -> Result<ImportReport, ImportError> {
        let value: serde_json::Value =
            serde_json::from_str(text).map_err(|e| ImportError::Parse(e.to_string()))?;
        let backup = validate_backup(&value)?;

        let data = match mode {
            ImportMode::Overwrite => backup.data,
            ImportMode::Merge => {
                let local = SyncSnapshot::collect(&self.store);
                restrict_to(&local.merge(&backup.data), &backup.data)
            }
        };

        let written_keys = data.apply(&self.store)?;
        let imported_at = self.clock.now();
        if written_keys > 0 {
            self.store
                .events()
                .publish(StoreEvent::DataImported { at: imported_at });
        }
        tracing::info!(?mode, written_keys, "Backup imported");
        Ok(ImportReport {
            mode,
            written_keys,
            imported_at,
        })
    }

    /// Removes every domain document, legacy key and per-book record, then
    /// publishes [`StoreEvent::DataReset`] so live trackers drop their copies.
    pub fn reset_all(&self) -> Result<usize, StoreError> {
        let mut removed = 0;
        for key in keys::FIXED_KEYS.iter().chain([keys::LEGACY_MOTIVATION].iter()) {
            if self.store.remove(key)? {
                removed += 1;
            }
        }
        removed += BookRecords::new(self.store.clone()).remove_all()?;
        self.store.events().publish(StoreEvent::DataReset {
            at: self.clock.now(),
        });
        tracing::info!(removed, "All local learning data cleared");
        Ok(removed)
    }

    pub fn has_data(&self) -> bool {
        [keys::PROGRESS, keys::BADGES, keys::STATISTICS, keys::STREAK]
            .iter()
            .any(|key| self.store.contains(key))
    }
}

/// Checks the backup envelope and decodes it.
pub fn validate_backup(value: &serde_json::Value) -> Result<BackupDocument, ImportError> {
    let Some(object) = value.as_object() else {
        return Err(ImportError::Validation("backup is empty".into()));
    };

    match object.get("version") {
        Some(serde_json::Value::String(v)) if !v.is_empty() => {}
        _ => return Err(ImportError::Validation("missing version".into())),
    }

    // 旧版本备份没有 appName，允许缺省
    if let Some(name) = object.get("appName") {
        if name.as_str() != Some(APP_NAME) {
            return Err(ImportError::Validation(
                "backup belongs to a different app".into(),
            ));
        }
    }

    let has_section = DATA_SECTIONS
        .iter()
        .any(|section| object.get(*section).is_some_and(|v| !v.is_null()));
    if !has_section {
        return Err(ImportError::Validation("no data sections found".into()));
    }

    let mut object = object.clone();
    // 早期备份没有 exportDate
    object
        .entry("exportDate")
        .or_insert_with(|| serde_json::Value::String(DateTime::<Utc>::UNIX_EPOCH.to_rfc3339()));

    serde_json::from_value(serde_json::Value::Object(object))
        .map_err(|e| ImportError::Validation(format!("malformed section: {e}")))
}

/// Keeps only the sections that are present in `filter`, so a merge import
/// never rewrites domains the backup did not mention.
fn restrict_to(merged: &SyncSnapshot, filter: &SyncSnapshot) -> SyncSnapshot {
    SyncSnapshot {
        progress: filter.progress.as_ref().and(merged.progress.clone()),
        statistics: filter.statistics.as_ref().and(merged.statistics.clone()),
        streak_data: filter.streak_data.as_ref().and(merged.streak_data.clone()),
        badges: filter.badges.as_ref().and(merged.badges.clone()),
        today_quest_data: filter
            .today_quest_data
            .as_ref()
            .and(merged.today_quest_data.clone()),
        learning_progress: filter
            .learning_progress
            .as_ref()
            .and(merged.learning_progress.clone()),
        reading_progress: merged
            .reading_progress
            .iter()
            .filter(|(id, _)| filter.reading_progress.contains_key(*id))
            .map(|(id, p)| (id.clone(), p.clone()))
            .collect(),
        bookmarks: merged
            .bookmarks
            .iter()
            .filter(|(id, _)| filter.bookmarks.contains_key(*id))
            .map(|(id, b)| (id.clone(), b.clone()))
            .collect(),
    }
}
