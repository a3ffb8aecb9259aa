use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::constants::APP_VERSION;
use crate::domain::merge::{max_version, Merge};

/// `weekKey` → day-of-week (`mon`..`sun`) → study time in ms.
pub type WeeklyActivity = BTreeMap<String, BTreeMap<String, u64>>;

/// `YYYY-MM-DD` → activity totals for that day.
pub type DailyActivityMap = BTreeMap<String, DailyActivity>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsDoc {
    #[serde(default = "default_version")]
    pub version: String,
    /// 总学习时间（毫秒）
    #[serde(default)]
    pub total_study_time: u64,
    #[serde(default)]
    pub total_words: u64,
    #[serde(default)]
    pub completed_chapters: u64,
    #[serde(default)]
    pub completed_books: u64,
    #[serde(default)]
    pub hero_conversations: u64,
    #[serde(default)]
    pub speaking_sessions: u64,
    #[serde(default)]
    pub weekly_activity: WeeklyActivity,
    #[serde(default)]
    pub daily_activity: DailyActivityMap,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DailyActivity {
    pub study_time: u64,
    pub words_read: u64,
    pub chapters_completed: u64,
}

fn default_version() -> String {
    APP_VERSION.to_string()
}

impl Default for StatisticsDoc {
    fn default() -> Self {
        Self {
            version: default_version(),
            total_study_time: 0,
            total_words: 0,
            completed_chapters: 0,
            completed_books: 0,
            hero_conversations: 0,
            speaking_sessions: 0,
            weekly_activity: BTreeMap::new(),
            daily_activity: BTreeMap::new(),
        }
    }
}

/// ISO week key, e.g. `2026-W05`.
pub fn week_key(date: NaiveDate) -> String {
    let week = date.iso_week();
    format!("{}-W{:02}", week.year(), week.week())
}

pub fn day_of_week(date: NaiveDate) -> &'static str {
    match date.weekday() {
        Weekday::Mon => "mon",
        Weekday::Tue => "tue",
        Weekday::Wed => "wed",
        Weekday::Thu => "thu",
        Weekday::Fri => "fri",
        Weekday::Sat => "sat",
        Weekday::Sun => "sun",
    }
}

pub fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

impl StatisticsDoc {
    /// Adds a finished study session to the total and both time series.
    pub fn with_study_time(&self, date: NaiveDate, duration_ms: u64) -> Self {
        let mut next = self.clone();
        next.total_study_time += duration_ms;
        *next
            .weekly_activity
            .entry(week_key(date))
            .or_default()
            .entry(day_of_week(date).to_string())
            .or_default() += duration_ms;
        next.daily_activity
            .entry(date_key(date))
            .or_default()
            .study_time += duration_ms;
        next
    }

    pub fn with_chapter_complete(&self, date: NaiveDate, word_count: u64) -> Self {
        let mut next = self.clone();
        next.completed_chapters += 1;
        next.total_words += word_count;
        let day = next.daily_activity.entry(date_key(date)).or_default();
        day.words_read += word_count;
        day.chapters_completed += 1;
        next
    }

    pub fn daily(&self, date: NaiveDate) -> DailyActivity {
        self.daily_activity
            .get(&date_key(date))
            .copied()
            .unwrap_or_default()
    }

    /// Study time for the week containing `date`, with every weekday present.
    pub fn weekly(&self, date: NaiveDate) -> BTreeMap<&'static str, u64> {
        let activity = self.weekly_activity.get(&week_key(date));
        ["mon", "tue", "wed", "thu", "fri", "sat", "sun"]
            .into_iter()
            .map(|day| {
                let ms = activity.and_then(|a| a.get(day)).copied().unwrap_or(0);
                (day, ms)
            })
            .collect()
    }
}

/// Whole-side replacement: the series whose most recent bucket is newer
/// supersedes the other; buckets are never summed across sides.
fn newer_series<V: Ord + Clone>(
    a: &BTreeMap<String, V>,
    b: &BTreeMap<String, V>,
) -> BTreeMap<String, V> {
    match a
        .keys()
        .next_back()
        .cmp(&b.keys().next_back())
        .then_with(|| a.cmp(b))
    {
        Ordering::Less => b.clone(),
        _ => a.clone(),
    }
}

impl Merge for StatisticsDoc {
    fn merge(&self, other: &Self) -> Self {
        Self {
            version: max_version(&self.version, &other.version),
            total_study_time: self.total_study_time.max(other.total_study_time),
            total_words: self.total_words.max(other.total_words),
            completed_chapters: self.completed_chapters.max(other.completed_chapters),
            completed_books: self.completed_books.max(other.completed_books),
            hero_conversations: self.hero_conversations.max(other.hero_conversations),
            speaking_sessions: self.speaking_sessions.max(other.speaking_sessions),
            weekly_activity: newer_series(&self.weekly_activity, &other.weekly_activity),
            daily_activity: newer_series(&self.daily_activity, &other.daily_activity),
        }
    }
}
