use std::sync::Arc;

use crate::constants::QUEST_RETENTION_DAYS;
use crate::domain::quest::{select_by_date, DayQuests, QuestDoc, QuestKind, QuestState};
use crate::domain::statistics::date_key;
use crate::services::{commit, Clock};
use crate::store::keys;
use crate::store::{Store, WriteError};

/// Daily quest hook: three quests per day (reading, speaking, chat).
#[derive(Debug)]
pub struct QuestTracker {
    store: Arc<Store>,
    clock: Clock,
    doc: QuestDoc,
}

impl QuestTracker {
    pub fn new(store: Arc<Store>) -> Self {
        Self::with_clock(store, Clock::system())
    }

    pub fn with_clock(store: Arc<Store>, clock: Clock) -> Self {
        Self {
            store,
            clock,
            doc: QuestDoc::default(),
        }
    }

    /// Loads the document and prunes days outside the retention window,
    /// persisting the pruned document when anything was removed.
    pub fn load(&mut self) {
        let mut doc: QuestDoc = self.store.read(keys::TODAY_QUEST).unwrap_or_default();
        let removed = doc.prune(self.clock.today());
        if removed > 0 {
            tracing::debug!(removed, "Pruned old daily quest entries");
            if let Err(e) = self.store.write(keys::TODAY_QUEST, &doc) {
                tracing::warn!(error = %e, "Failed to persist pruned quest data");
            }
        }
        self.doc = doc;
    }

    pub fn doc(&self) -> &QuestDoc {
        &self.doc
    }

    pub fn today_quests(&self) -> DayQuests {
        self.doc.day(self.clock.today())
    }

    /// Today's deterministic pick among `len` candidates (hero, quote,
    /// passage...). Each content slot uses its own `offset`.
    pub fn pick_for_today(&self, len: usize, offset: u64) -> Option<usize> {
        select_by_date(len, self.clock.today(), offset)
    }

    fn complete(
        &mut self,
        kind: QuestKind,
        apply: impl FnOnce(&mut QuestState),
    ) -> Result<bool, WriteError> {
        let today = date_key(self.clock.today());
        let mut day = self.doc.quests.get(&today).cloned().unwrap_or_default();
        if day.get(kind).completed {
            return Ok(false);
        }

        let state = day.get_mut(kind);
        state.completed = true;
        state.completed_at = Some(self.clock.now());
        apply(state);

        let mut next = self.doc.clone();
        next.quests.insert(today, day);
        commit(&self.store, keys::TODAY_QUEST, &mut self.doc, next)?;
        tracing::debug!(quest = ?kind, "Daily quest completed");
        Ok(true)
    }

    /// Returns `false` when the quest was already done today.
    pub fn complete_reading(&mut self) -> Result<bool, WriteError> {
        self.complete(QuestKind::Reading, |_| {})
    }

    pub fn complete_speaking(&mut self, accuracy: f64) -> Result<bool, WriteError> {
        self.complete(QuestKind::Speaking, |s| s.accuracy = Some(accuracy))
    }

    pub fn complete_chat(&mut self, message_count: u32) -> Result<bool, WriteError> {
        self.complete(QuestKind::Chat, |s| s.message_count = Some(message_count))
    }

    /// Records chat progress before the quest completes.
    pub fn update_chat_progress(&mut self, message_count: u32) -> Result<(), WriteError> {
        let today = date_key(self.clock.today());
        let mut day = self.doc.quests.get(&today).cloned().unwrap_or_default();
        if day.chat.completed {
            return Ok(());
        }
        day.chat.message_count = Some(message_count);

        let mut next = self.doc.clone();
        next.quests.insert(today, day);
        commit(&self.store, keys::TODAY_QUEST, &mut self.doc, next)
    }

    pub fn is_completed(&self, kind: QuestKind) -> bool {
        self.today_quests().get(kind).completed
    }

    pub fn completion_count(&self) -> usize {
        self.today_quests().completion_count()
    }

    pub fn is_all_completed(&self) -> bool {
        self.today_quests().is_perfect()
    }

    pub fn perfect_day_count(&self) -> usize {
        self.doc.quests.values().filter(|d| d.is_perfect()).count()
    }

    /// Perfect days in a row ending today.
    pub fn consecutive_perfect_days(&self) -> usize {
        let today = self.clock.today();
        (0..QUEST_RETENTION_DAYS)
            .map(|i| today - chrono::Duration::days(i))
            .take_while(|d| self.doc.day(*d).is_perfect())
            .count()
    }

    pub fn total_completed(&self) -> usize {
        self.doc.quests.values().map(DayQuests::completion_count).sum()
    }

    pub fn reset(&mut self) -> Result<(), WriteError> {
        commit(&self.store, keys::TODAY_QUEST, &mut self.doc, QuestDoc::default())
    }
}
