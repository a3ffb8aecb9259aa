use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{QUEST_RETENTION_DAYS, QUEST_VERSION};
use crate::domain::merge::{earliest, max_f64, max_version, Merge};
use crate::domain::statistics::date_key;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestKind {
    Reading,
    Speaking,
    Chat,
}

impl QuestKind {
    pub const ALL: [QuestKind; 3] = [QuestKind::Reading, QuestKind::Speaking, QuestKind::Chat];
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QuestState {
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    /// Speaking quest: pronunciation accuracy in percent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    /// Chat quest: messages exchanged so far.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_count: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DayQuests {
    pub reading: QuestState,
    pub speaking: QuestState,
    pub chat: QuestState,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestDoc {
    #[serde(default = "default_version")]
    pub version: String,
    /// `YYYY-MM-DD` → that day's quests.
    #[serde(default)]
    pub quests: BTreeMap<String, DayQuests>,
}

fn default_version() -> String {
    QUEST_VERSION.to_string()
}

impl Default for QuestDoc {
    fn default() -> Self {
        Self {
            version: default_version(),
            quests: BTreeMap::new(),
        }
    }
}

impl DayQuests {
    pub fn get(&self, kind: QuestKind) -> &QuestState {
        match kind {
            QuestKind::Reading => &self.reading,
            QuestKind::Speaking => &self.speaking,
            QuestKind::Chat => &self.chat,
        }
    }

    pub fn get_mut(&mut self, kind: QuestKind) -> &mut QuestState {
        match kind {
            QuestKind::Reading => &mut self.reading,
            QuestKind::Speaking => &mut self.speaking,
            QuestKind::Chat => &mut self.chat,
        }
    }

    pub fn completion_count(&self) -> usize {
        QuestKind::ALL
            .into_iter()
            .filter(|k| self.get(*k).completed)
            .count()
    }

    pub fn is_perfect(&self) -> bool {
        self.completion_count() == QuestKind::ALL.len()
    }
}

impl QuestDoc {
    /// Drops entries dated before `today - QUEST_RETENTION_DAYS`. Returns the
    /// number of removed days.
    pub fn prune(&mut self, today: NaiveDate) -> usize {
        let cutoff = date_key(today - chrono::Duration::days(QUEST_RETENTION_DAYS));
        let before = self.quests.len();
        self.quests.retain(|date, _| date.as_str() >= cutoff.as_str());
        before - self.quests.len()
    }

    pub fn day(&self, date: NaiveDate) -> DayQuests {
        self.quests.get(&date_key(date)).cloned().unwrap_or_default()
    }
}

/// Deterministic per-day pick of an index into a list of `len` items.
/// Different `offset`s give independent picks for the same day.
pub fn select_by_date(len: usize, date: NaiveDate, offset: u64) -> Option<usize> {
    if len == 0 {
        return None;
    }
    let seed = date.year() as u64 * 10_000 + u64::from(date.month()) * 100 + u64::from(date.day());
    let mut rng = SeededRandom::new(seed + offset);
    let index = (rng.next_f64() * len as f64) as usize;
    Some(index.min(len - 1))
}

/// Linear congruential generator over 31 bits.
#[derive(Debug, Clone)]
pub struct SeededRandom {
    state: u64,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    pub fn next_f64(&mut self) -> f64 {
        self.state = self
            .state
            .wrapping_mul(1_103_515_245)
            .wrapping_add(12_345)
            & 0x7fff_ffff;
        self.state as f64 / 0x7fff_ffff as f64
    }
}

impl Merge for QuestState {
    fn merge(&self, other: &Self) -> Self {
        if self.completed != other.completed {
            return if self.completed {
                self.clone()
            } else {
                other.clone()
            };
        }
        Self {
            completed: self.completed,
            completed_at: earliest(&self.completed_at, &other.completed_at),
            accuracy: max_f64(self.accuracy, other.accuracy),
            message_count: self.message_count.max(other.message_count),
        }
    }
}

impl Merge for DayQuests {
    fn merge(&self, other: &Self) -> Self {
        Self {
            reading: self.reading.merge(&other.reading),
            speaking: self.speaking.merge(&other.speaking),
            chat: self.chat.merge(&other.chat),
        }
    }
}

impl Merge for QuestDoc {
    fn merge(&self, other: &Self) -> Self {
        Self {
            version: max_version(&self.version, &other.version),
            quests: self.quests.merge(&other.quests),
        }
    }
}
