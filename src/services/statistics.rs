use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::constants::MIN_SESSION_MS;
use crate::domain::statistics::{DailyActivity, StatisticsDoc};
use crate::domain::streak::StreakDoc;
use crate::services::{commit, Clock};
use crate::store::keys;
use crate::store::{Store, WriteError};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSummary {
    pub total_study_time: u64,
    pub total_study_time_formatted: String,
    pub total_words: u64,
    pub completed_chapters: u64,
    pub completed_books: u64,
    pub hero_conversations: u64,
    pub speaking_sessions: u64,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub last_study_date: Option<NaiveDate>,
}

/// Statistics hook: owns both `user_statistics` and `streak_data`.
#[derive(Debug)]
pub struct StatisticsTracker {
    store: Arc<Store>,
    clock: Clock,
    stats: StatisticsDoc,
    streak: StreakDoc,
    session_start: Option<DateTime<Utc>>,
}

impl StatisticsTracker {
    pub fn new(store: Arc<Store>) -> Self {
        Self::with_clock(store, Clock::system())
    }

    pub fn with_clock(store: Arc<Store>, clock: Clock) -> Self {
        Self {
            store,
            clock,
            stats: StatisticsDoc::default(),
            streak: StreakDoc::default(),
            session_start: None,
        }
    }

    /// Loads both documents and, on first load, starts a study session.
    /// Reloading keeps the running session. A streak whose last study day is
    /// more than one day old is broken in memory only.
    pub fn load(&mut self) {
        self.stats = self.store.read(keys::STATISTICS).unwrap_or_default();
        self.streak = self
            .store
            .read::<StreakDoc>(keys::STREAK)
            .map(|s| s.validated(self.clock.today()))
            .unwrap_or_default();
        if self.session_start.is_none() {
            self.session_start = Some(self.clock.now());
        }
    }

    pub fn stats(&self) -> &StatisticsDoc {
        &self.stats
    }

    pub fn streak(&self) -> &StreakDoc {
        &self.streak
    }

    pub fn start_session(&mut self) {
        self.session_start = Some(self.clock.now());
    }

    /// Closes the running session and starts a new one. Returns the counted
    /// duration in ms; sessions under a second count as 0 and are not saved.
    pub fn end_session(&mut self) -> Result<u64, WriteError> {
        let Some(started) = self.session_start else {
            return Ok(0);
        };
        let now = self.clock.now();
        self.session_start = Some(now);

        let duration = (now - started).num_milliseconds().max(0) as u64;
        if duration < MIN_SESSION_MS {
            return Ok(0);
        }

        let next = self.stats.with_study_time(now.date_naive(), duration);
        commit(&self.store, keys::STATISTICS, &mut self.stats, next)?;
        Ok(duration)
    }

    pub fn record_chapter_complete(&mut self, word_count: u64) -> Result<(), WriteError> {
        let next = self
            .stats
            .with_chapter_complete(self.clock.today(), word_count);
        commit(&self.store, keys::STATISTICS, &mut self.stats, next)?;
        self.update_streak()?;
        Ok(())
    }

    pub fn record_book_complete(&mut self) -> Result<(), WriteError> {
        let mut next = self.stats.clone();
        next.completed_books += 1;
        commit(&self.store, keys::STATISTICS, &mut self.stats, next)
    }

    pub fn record_hero_conversation(&mut self) -> Result<(), WriteError> {
        let mut next = self.stats.clone();
        next.hero_conversations += 1;
        commit(&self.store, keys::STATISTICS, &mut self.stats, next)?;
        self.update_streak()?;
        Ok(())
    }

    pub fn record_speaking_session(&mut self) -> Result<(), WriteError> {
        let mut next = self.stats.clone();
        next.speaking_sessions += 1;
        commit(&self.store, keys::STATISTICS, &mut self.stats, next)?;
        self.update_streak()?;
        Ok(())
    }

    /// Counts today as a study day. No write when today is already counted.
    pub fn update_streak(&mut self) -> Result<&StreakDoc, WriteError> {
        if let Some(next) = self.streak.register_study_day(self.clock.today()) {
            commit(&self.store, keys::STREAK, &mut self.streak, next)?;
        }
        Ok(&self.streak)
    }

    pub fn current_streak(&self) -> u32 {
        self.streak.current_streak
    }

    pub fn longest_streak(&self) -> u32 {
        self.streak.longest_streak
    }

    pub fn weekly_activity(&self, date: Option<NaiveDate>) -> BTreeMap<&'static str, u64> {
        self.stats.weekly(date.unwrap_or_else(|| self.clock.today()))
    }

    pub fn daily_activity(&self, date: Option<NaiveDate>) -> DailyActivity {
        self.stats.daily(date.unwrap_or_else(|| self.clock.today()))
    }

    pub fn summary(&self) -> StatsSummary {
        StatsSummary {
            total_study_time: self.stats.total_study_time,
            total_study_time_formatted: format_duration(self.stats.total_study_time),
            total_words: self.stats.total_words,
            completed_chapters: self.stats.completed_chapters,
            completed_books: self.stats.completed_books,
            hero_conversations: self.stats.hero_conversations,
            speaking_sessions: self.stats.speaking_sessions,
            current_streak: self.streak.current_streak,
            longest_streak: self.streak.longest_streak,
            last_study_date: self.streak.last_study_date,
        }
    }

    pub fn reset_stats(&mut self) -> Result<(), WriteError> {
        commit(&self.store, keys::STATISTICS, &mut self.stats, StatisticsDoc::default())
    }

    pub fn reset_streak(&mut self) -> Result<(), WriteError> {
        commit(&self.store, keys::STREAK, &mut self.streak, StreakDoc::default())
    }

    pub fn reset(&mut self) -> Result<(), WriteError> {
        self.reset_stats()?;
        self.reset_streak()
    }
}

/// `1h 5m` or `12m`.
pub fn format_duration(ms: u64) -> String {
    let hours = ms / 3_600_000;
    let minutes = (ms % 3_600_000) / 60_000;
    if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}
