use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::APP_VERSION;
use crate::domain::merge::{earliest, latest, max_version, Merge};

/// Reading and speaking progress per book and chapter, plus hero chat counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressDoc {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub books: BTreeMap<String, BookProgress>,
    #[serde(default)]
    pub heroes: BTreeMap<String, HeroProgress>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookProgress {
    #[serde(default)]
    pub chapters: BTreeMap<String, ChapterProgress>,
    #[serde(default)]
    pub last_chapter_index: u32,
    #[serde(default)]
    pub last_accessed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChapterProgress {
    pub reading_completed: bool,
    pub speaking_completed: bool,
    pub reading_completed_at: Option<DateTime<Utc>>,
    pub speaking_completed_at: Option<DateTime<Utc>>,
    pub word_count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HeroProgress {
    pub conversation_count: u32,
    pub first_talk_date: Option<DateTime<Utc>>,
    pub last_talk_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StudyMode {
    Reading,
    Speaking,
}

/// Map written under `learning-progress` by older releases: book id → book.
pub type LearningProgress = BTreeMap<String, BookProgress>;

fn default_version() -> String {
    APP_VERSION.to_string()
}

impl Default for ProgressDoc {
    fn default() -> Self {
        Self {
            version: default_version(),
            books: BTreeMap::new(),
            heroes: BTreeMap::new(),
        }
    }
}

impl ProgressDoc {
    /// Converts the legacy per-book map into the current document shape.
    pub fn from_legacy(legacy: &LearningProgress) -> Self {
        Self {
            books: legacy.clone(),
            ..Self::default()
        }
    }
}

impl ChapterProgress {
    pub fn is_completed(&self, mode: Option<StudyMode>) -> bool {
        match mode {
            Some(StudyMode::Reading) => self.reading_completed,
            Some(StudyMode::Speaking) => self.speaking_completed,
            None => self.reading_completed && self.speaking_completed,
        }
    }
}

impl Merge for ChapterProgress {
    fn merge(&self, other: &Self) -> Self {
        Self {
            reading_completed: self.reading_completed || other.reading_completed,
            speaking_completed: self.speaking_completed || other.speaking_completed,
            reading_completed_at: earliest(&self.reading_completed_at, &other.reading_completed_at),
            speaking_completed_at: earliest(
                &self.speaking_completed_at,
                &other.speaking_completed_at,
            ),
            word_count: self.word_count.max(other.word_count),
        }
    }
}

impl Merge for BookProgress {
    fn merge(&self, other: &Self) -> Self {
        Self {
            chapters: self.chapters.merge(&other.chapters),
            last_chapter_index: self.last_chapter_index.max(other.last_chapter_index),
            last_accessed_at: latest(&self.last_accessed_at, &other.last_accessed_at),
        }
    }
}

impl Merge for HeroProgress {
    fn merge(&self, other: &Self) -> Self {
        Self {
            conversation_count: self.conversation_count.max(other.conversation_count),
            first_talk_date: earliest(&self.first_talk_date, &other.first_talk_date),
            last_talk_date: latest(&self.last_talk_date, &other.last_talk_date),
        }
    }
}

impl Merge for ProgressDoc {
    fn merge(&self, other: &Self) -> Self {
        Self {
            version: max_version(&self.version, &other.version),
            books: self.books.merge(&other.books),
            heroes: self.heroes.merge(&other.heroes),
        }
    }
}
