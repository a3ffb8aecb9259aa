use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::constants::{APP_VERSION, MAX_STUDY_DATES};
use crate::domain::merge::{max_version, Merge};

/// Decoding goes through [`StoredStreak`] so every loaded or pulled
/// document already satisfies `longest_streak >= current_streak`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "StoredStreak")]
pub struct StreakDoc {
    pub version: String,
    pub last_study_date: Option<NaiveDate>,
    pub study_dates: BTreeSet<NaiveDate>,
    pub current_streak: u32,
    pub longest_streak: u32,
}

/// Wire shape as written by any client version.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredStreak {
    #[serde(default = "default_version")]
    version: String,
    #[serde(default)]
    last_study_date: Option<NaiveDate>,
    #[serde(default)]
    study_dates: BTreeSet<NaiveDate>,
    #[serde(default)]
    current_streak: u32,
    #[serde(default)]
    longest_streak: u32,
}

impl From<StoredStreak> for StreakDoc {
    fn from(raw: StoredStreak) -> Self {
        Self {
            version: raw.version,
            last_study_date: raw.last_study_date,
            study_dates: raw.study_dates,
            current_streak: raw.current_streak,
            longest_streak: raw.longest_streak,
        }
        .normalized()
    }
}

fn default_version() -> String {
    APP_VERSION.to_string()
}

impl Default for StreakDoc {
    fn default() -> Self {
        Self {
            version: default_version(),
            last_study_date: None,
            study_dates: BTreeSet::new(),
            current_streak: 0,
            longest_streak: 0,
        }
    }
}

/// Keeps only the most recent [`MAX_STUDY_DATES`] dates.
pub fn cap_study_dates(dates: &mut BTreeSet<NaiveDate>) {
    while dates.len() > MAX_STUDY_DATES {
        dates.pop_first();
    }
}

impl StreakDoc {
    /// Restores `longest_streak >= current_streak` and the date cap on
    /// documents written by older clients.
    pub fn normalized(mut self) -> Self {
        self.longest_streak = self.longest_streak.max(self.current_streak);
        cap_study_dates(&mut self.study_dates);
        self
    }

    /// Breaks the current streak when more than one calendar day has passed
    /// since the last study date. Applied on load.
    pub fn validated(mut self, today: NaiveDate) -> Self {
        if let Some(last) = self.last_study_date {
            if (today - last).num_days() > 1 {
                self.current_streak = 0;
            }
        }
        self.normalized()
    }

    /// Records `today` as a study day. Returns `None` when today is already
    /// recorded (or the last study date lies in the future).
    pub fn register_study_day(&self, today: NaiveDate) -> Option<Self> {
        let current = match self.last_study_date {
            None => 1,
            Some(last) => match (today - last).num_days() {
                1 => self.current_streak + 1,
                d if d > 1 => 1,
                _ => return None,
            },
        };

        let mut next = self.clone();
        next.last_study_date = Some(today);
        next.study_dates.insert(today);
        cap_study_dates(&mut next.study_dates);
        next.current_streak = current;
        next.longest_streak = self.longest_streak.max(current);
        Some(next)
    }
}

impl Merge for StreakDoc {
    /// Continuity comes from whichever side studied most recently; the
    /// longest streak covers every current and longest value seen.
    fn merge(&self, other: &Self) -> Self {
        let key = |s: &Self| (s.last_study_date, s.current_streak);
        let newer = if key(other) > key(self) { other } else { self };

        let mut study_dates = self.study_dates.merge(&other.study_dates);
        cap_study_dates(&mut study_dates);

        Self {
            version: max_version(&self.version, &other.version),
            last_study_date: newer.last_study_date,
            study_dates,
            current_streak: newer.current_streak,
            longest_streak: self
                .longest_streak
                .max(other.longest_streak)
                .max(self.current_streak)
                .max(other.current_streak),
        }
    }
}
