use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{APP_VERSION, TOTAL_HEROES};
use crate::domain::merge::{earliest, max_version, Merge};

/// The closed set of achievement badges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BadgeId {
    #[serde(rename = "first_chapter")]
    FirstChapter,
    #[serde(rename = "chapter_10")]
    Chapter10,
    #[serde(rename = "chapter_50")]
    Chapter50,
    #[serde(rename = "all_heroes")]
    AllHeroes,
    #[serde(rename = "first_book")]
    FirstBook,
    #[serde(rename = "streak_7")]
    Streak7,
    #[serde(rename = "streak_30")]
    Streak30,
    #[serde(rename = "words_1000")]
    Words1000,
    #[serde(rename = "speaking_10")]
    Speaking10,
}

/// Inputs for unlock conditions, collected from statistics, streak and progress.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AchievementStats {
    pub completed_chapters: u64,
    pub completed_books: u64,
    pub talked_heroes: u64,
    pub current_streak: u64,
    pub longest_streak: u64,
    pub total_words: u64,
    pub speaking_sessions: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BadgeDefinition {
    pub id: BadgeId,
    pub name: &'static str,
    pub icon: &'static str,
    pub description: &'static str,
    pub target: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BadgeProgress {
    pub current: u64,
    pub target: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BadgeState {
    pub unlocked: bool,
    pub unlocked_at: Option<DateTime<Utc>>,
    pub shown_modal: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BadgesDoc {
    #[serde(default = "default_version")]
    pub version: String,
    /// Keyed by [`BadgeId::as_str`]; unknown ids from other releases are
    /// tolerated on decode and dropped by [`BadgesDoc::normalized`].
    #[serde(default)]
    pub badges: BTreeMap<String, BadgeState>,
}

impl BadgeId {
    pub const ALL: [BadgeId; 9] = [
        BadgeId::FirstChapter,
        BadgeId::Chapter10,
        BadgeId::Chapter50,
        BadgeId::AllHeroes,
        BadgeId::FirstBook,
        BadgeId::Streak7,
        BadgeId::Streak30,
        BadgeId::Words1000,
        BadgeId::Speaking10,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::FirstChapter => "first_chapter",
            Self::Chapter10 => "chapter_10",
            Self::Chapter50 => "chapter_50",
            Self::AllHeroes => "all_heroes",
            Self::FirstBook => "first_book",
            Self::Streak7 => "streak_7",
            Self::Streak30 => "streak_30",
            Self::Words1000 => "words_1000",
            Self::Speaking10 => "speaking_10",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|id| id.as_str() == raw)
    }

    pub fn definition(self) -> BadgeDefinition {
        let (name, icon, description, target) = match self {
            Self::FirstChapter => ("First Step", "🎯", "Complete your first chapter", 1),
            Self::Chapter10 => ("Bookworm", "📚", "Complete 10 chapters", 10),
            Self::Chapter50 => ("Master Reader", "🏆", "Complete 50 chapters", 50),
            Self::AllHeroes => (
                "Hero Collector",
                "🎭",
                "Talk with all 6 heroes",
                u64::from(TOTAL_HEROES),
            ),
            Self::FirstBook => ("Finisher", "📖", "Complete your first book", 1),
            Self::Streak7 => ("Weekly Learner", "🔥", "Study for 7 consecutive days", 7),
            Self::Streak30 => (
                "Monthly Challenger",
                "⭐",
                "Study for 30 consecutive days",
                30,
            ),
            Self::Words1000 => ("Word Master", "📝", "Read 1,000 words", 1000),
            Self::Speaking10 => (
                "Pronunciation Trainee",
                "🎤",
                "Complete Speaking mode 10 times",
                10,
            ),
        };
        BadgeDefinition {
            id: self,
            name,
            icon,
            description,
            target,
        }
    }

    fn metric(self, stats: &AchievementStats) -> u64 {
        match self {
            Self::FirstChapter | Self::Chapter10 | Self::Chapter50 => stats.completed_chapters,
            Self::AllHeroes => stats.talked_heroes,
            Self::FirstBook => stats.completed_books,
            Self::Streak7 | Self::Streak30 => stats.current_streak.max(stats.longest_streak),
            Self::Words1000 => stats.total_words,
            Self::Speaking10 => stats.speaking_sessions,
        }
    }

    pub fn is_earned(self, stats: &AchievementStats) -> bool {
        self.metric(stats) >= self.definition().target
    }

    pub fn progress(self, stats: &AchievementStats) -> BadgeProgress {
        let target = self.definition().target;
        BadgeProgress {
            current: self.metric(stats).min(target),
            target,
        }
    }
}

impl BadgeProgress {
    pub fn percent(&self) -> u8 {
        if self.target == 0 {
            return 100;
        }
        ((self.current as f64 / self.target as f64) * 100.0).round() as u8
    }
}

fn default_version() -> String {
    APP_VERSION.to_string()
}

impl Default for BadgesDoc {
    fn default() -> Self {
        Self {
            version: default_version(),
            badges: BadgeId::ALL
                .into_iter()
                .map(|id| (id.as_str().to_string(), BadgeState::default()))
                .collect(),
        }
    }
}

impl BadgesDoc {
    /// Fills catalog entries missing from a stored document and drops ids
    /// that are not in the catalog.
    pub fn normalized(mut self) -> Self {
        self.badges.retain(|id, _| BadgeId::parse(id).is_some());
        for id in BadgeId::ALL {
            self.badges.entry(id.as_str().to_string()).or_default();
        }
        self
    }

    pub fn state(&self, id: BadgeId) -> Option<&BadgeState> {
        self.badges.get(id.as_str())
    }

    pub fn is_unlocked(&self, id: BadgeId) -> bool {
        self.state(id).is_some_and(|s| s.unlocked)
    }
}

impl Merge for BadgeState {
    /// One-way latch: only sides that are unlocked (or every side, when none
    /// is) contribute the unlock timestamp and modal flag.
    fn merge(&self, other: &Self) -> Self {
        if self.unlocked != other.unlocked {
            return if self.unlocked {
                self.clone()
            } else {
                other.clone()
            };
        }
        Self {
            unlocked: self.unlocked,
            unlocked_at: earliest(&self.unlocked_at, &other.unlocked_at),
            shown_modal: self.shown_modal || other.shown_modal,
        }
    }
}

impl Merge for BadgesDoc {
    fn merge(&self, other: &Self) -> Self {
        Self {
            version: max_version(&self.version, &other.version),
            badges: self.badges.merge(&other.badges),
        }
    }
}
