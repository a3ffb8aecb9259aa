//! Multi-domain snapshot exchanged with the remote store and embedded in
//! backup files.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::merge::{merge_optional, Merge};
use crate::domain::{
    BadgesDoc, Bookmarks, LearningProgress, ProgressDoc, QuestDoc, ReadingPosition, StatisticsDoc,
    StreakDoc,
};
use crate::store::keys;
use crate::store::{Store, WriteError};

/// Every section is optional; an absent section means "no data yet" on that
/// side and merges as the other side's value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<ProgressDoc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statistics: Option<StatisticsDoc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub streak_data: Option<StreakDoc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub badges: Option<BadgesDoc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub today_quest_data: Option<QuestDoc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub learning_progress: Option<LearningProgress>,
    /// bookId → reading position
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub reading_progress: BTreeMap<String, ReadingPosition>,
    /// bookId → bookmarked chapter ids
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub bookmarks: BTreeMap<String, Bookmarks>,
}

impl SyncSnapshot {
    /// Reads the current local state of every tracked key. Malformed
    /// documents read as absent.
    pub fn collect(store: &Store) -> Self {
        let mut snapshot = Self {
            progress: store.read(keys::PROGRESS),
            statistics: store.read(keys::STATISTICS),
            streak_data: store.read(keys::STREAK),
            badges: store.read(keys::BADGES),
            today_quest_data: store.read(keys::TODAY_QUEST),
            learning_progress: store.read(keys::LEARNING_PROGRESS),
            ..Self::default()
        };

        for key in store.keys_with_prefix(keys::READING_POSITION_PREFIX) {
            if let Some(book_id) = keys::book_id_from_key(&key, keys::READING_POSITION_PREFIX) {
                if let Some(position) = store.read(&key) {
                    snapshot.reading_progress.insert(book_id.to_string(), position);
                }
            }
        }
        for key in store.keys_with_prefix(keys::BOOKMARKS_PREFIX) {
            if let Some(book_id) = keys::book_id_from_key(&key, keys::BOOKMARKS_PREFIX) {
                if let Some(marks) = store.read(&key) {
                    snapshot.bookmarks.insert(book_id.to_string(), marks);
                }
            }
        }

        snapshot
    }

    pub fn is_empty(&self) -> bool {
        self.section_count() == 0
    }

    /// Number of present fixed sections plus per-book records.
    pub fn section_count(&self) -> usize {
        [
            self.progress.is_some(),
            self.statistics.is_some(),
            self.streak_data.is_some(),
            self.badges.is_some(),
            self.today_quest_data.is_some(),
            self.learning_progress.is_some(),
        ]
        .into_iter()
        .filter(|present| *present)
        .count()
            + self.reading_progress.len()
            + self.bookmarks.len()
    }

    /// Writes every present section with change notifications. Returns the
    /// number of keys whose stored bytes changed.
    pub fn apply(&self, store: &Store) -> Result<usize, WriteError> {
        self.apply_with(store, true)
    }

    /// Like [`apply`](Self::apply) but silent, so that writing merged sync
    /// results does not re-arm the push debounce.
    pub fn apply_quiet(&self, store: &Store) -> Result<usize, WriteError> {
        self.apply_with(store, false)
    }

    fn apply_with(&self, store: &Store, notify: bool) -> Result<usize, WriteError> {
        let mut writer = Writer {
            store,
            notify,
            written: 0,
        };

        writer.put_opt(keys::PROGRESS, self.progress.as_ref())?;
        writer.put_opt(keys::STATISTICS, self.statistics.as_ref())?;
        writer.put_opt(keys::STREAK, self.streak_data.as_ref())?;
        writer.put_opt(keys::BADGES, self.badges.as_ref())?;
        writer.put_opt(keys::TODAY_QUEST, self.today_quest_data.as_ref())?;
        writer.put_opt(keys::LEARNING_PROGRESS, self.learning_progress.as_ref())?;
        for (book_id, position) in &self.reading_progress {
            writer.put(&keys::reading_position_key(book_id), position)?;
        }
        for (book_id, marks) in &self.bookmarks {
            writer.put(&keys::bookmarks_key(book_id), marks)?;
        }

        Ok(writer.written)
    }
}

struct Writer<'a> {
    store: &'a Store,
    notify: bool,
    written: usize,
}

impl Writer<'_> {
    fn put_opt<T: Serialize>(&mut self, key: &str, value: Option<&T>) -> Result<(), WriteError> {
        match value {
            Some(value) => self.put(key, value),
            None => Ok(()),
        }
    }

    /// Skips the write when the stored bytes are already identical.
    fn put<T: Serialize>(&mut self, key: &str, value: &T) -> Result<(), WriteError> {
        let bytes = serde_json::to_vec(value).map_err(|e| WriteError::Unknown(e.to_string()))?;
        if self.store.read_raw(key).as_deref() == Some(bytes.as_slice()) {
            return Ok(());
        }
        if self.notify {
            self.store.write(key, value)?;
        } else {
            self.store.write_quiet(key, value)?;
        }
        self.written += 1;
        Ok(())
    }
}

impl Merge for SyncSnapshot {
    fn merge(&self, other: &Self) -> Self {
        Self {
            progress: merge_optional(self.progress.as_ref(), other.progress.as_ref()),
            statistics: merge_optional(self.statistics.as_ref(), other.statistics.as_ref()),
            // 单侧存在时同样要保证 longest >= current
            streak_data: merge_optional(self.streak_data.as_ref(), other.streak_data.as_ref())
                .map(StreakDoc::normalized),
            badges: merge_optional(self.badges.as_ref(), other.badges.as_ref()),
            today_quest_data: merge_optional(
                self.today_quest_data.as_ref(),
                other.today_quest_data.as_ref(),
            ),
            learning_progress: merge_optional(
                self.learning_progress.as_ref(),
                other.learning_progress.as_ref(),
            ),
            reading_progress: self.reading_progress.merge(&other.reading_progress),
            bookmarks: self.bookmarks.merge(&other.bookmarks),
        }
    }
}
