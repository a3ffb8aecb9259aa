use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::badges::{
    AchievementStats, BadgeDefinition, BadgeId, BadgeProgress, BadgeState, BadgesDoc,
};
use crate::services::{commit, Clock};
use crate::store::keys;
use crate::store::{Store, WriteError};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnlockedBadge {
    #[serde(flatten)]
    pub definition: BadgeDefinition,
    pub unlocked_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LockedBadge {
    #[serde(flatten)]
    pub definition: BadgeDefinition,
    pub progress: BadgeProgress,
    pub progress_percent: u8,
}

/// Badge hook. Unlocking is a one-way latch; the only other mutation is
/// marking the unlock modal as shown.
#[derive(Debug)]
pub struct BadgeTracker {
    store: Arc<Store>,
    clock: Clock,
    doc: BadgesDoc,
    /// 最近一次 check 中第一个新解锁的徽章，等待弹窗确认
    new_badge: Option<BadgeId>,
}

impl BadgeTracker {
    pub fn new(store: Arc<Store>) -> Self {
        Self::with_clock(store, Clock::system())
    }

    pub fn with_clock(store: Arc<Store>, clock: Clock) -> Self {
        Self {
            store,
            clock,
            doc: BadgesDoc::default(),
            new_badge: None,
        }
    }

    pub fn load(&mut self) {
        self.doc = self
            .store
            .read::<BadgesDoc>(keys::BADGES)
            .map(BadgesDoc::normalized)
            .unwrap_or_default();
    }

    pub fn doc(&self) -> &BadgesDoc {
        &self.doc
    }

    pub fn new_badge(&self) -> Option<BadgeId> {
        self.new_badge
    }

    /// Unlocks every locked badge whose condition holds and returns them in
    /// catalog order. Nothing is written when no badge unlocks.
    pub fn check_achievements(
        &mut self,
        stats: &AchievementStats,
    ) -> Result<Vec<BadgeDefinition>, WriteError> {
        let now = self.clock.now();
        let mut next = self.doc.clone();
        let mut newly_unlocked = Vec::new();

        for id in BadgeId::ALL {
            if self.doc.is_unlocked(id) || !id.is_earned(stats) {
                continue;
            }
            next.badges.insert(
                id.as_str().to_string(),
                BadgeState {
                    unlocked: true,
                    unlocked_at: Some(now),
                    shown_modal: false,
                },
            );
            newly_unlocked.push(id.definition());
        }

        if let Some(first) = newly_unlocked.first() {
            commit(&self.store, keys::BADGES, &mut self.doc, next)?;
            self.new_badge = Some(first.id);
            tracing::info!(count = newly_unlocked.len(), first = first.id.as_str(), "Badges unlocked");
        }
        Ok(newly_unlocked)
    }

    /// Marks the pending new badge's modal as shown.
    pub fn dismiss_new_badge(&mut self) -> Result<(), WriteError> {
        let Some(id) = self.new_badge else {
            return Ok(());
        };
        let mut next = self.doc.clone();
        next.badges.entry(id.as_str().to_string()).or_default().shown_modal = true;
        commit(&self.store, keys::BADGES, &mut self.doc, next)?;
        self.new_badge = None;
        Ok(())
    }

    pub fn unlocked(&self) -> Vec<UnlockedBadge> {
        BadgeId::ALL
            .into_iter()
            .filter_map(|id| {
                let state = self.doc.state(id).filter(|s| s.unlocked)?;
                Some(UnlockedBadge {
                    definition: id.definition(),
                    unlocked_at: state.unlocked_at,
                })
            })
            .collect()
    }

    pub fn locked_with_progress(&self, stats: &AchievementStats) -> Vec<LockedBadge> {
        BadgeId::ALL
            .into_iter()
            .filter(|id| !self.doc.is_unlocked(*id))
            .map(|id| {
                let progress = id.progress(stats);
                LockedBadge {
                    definition: id.definition(),
                    progress,
                    progress_percent: progress.percent(),
                }
            })
            .collect()
    }

    /// Unlocked badges whose modal has not been shown, e.g. unlocked on
    /// another device and pulled in by sync.
    pub fn unshown(&self) -> Vec<BadgeDefinition> {
        BadgeId::ALL
            .into_iter()
            .filter(|id| {
                self.doc
                    .state(*id)
                    .is_some_and(|s| s.unlocked && !s.shown_modal)
            })
            .map(BadgeId::definition)
            .collect()
    }

    pub fn is_unlocked(&self, id: BadgeId) -> bool {
        self.doc.is_unlocked(id)
    }

    pub fn unlocked_count(&self) -> usize {
        BadgeId::ALL
            .into_iter()
            .filter(|id| self.doc.is_unlocked(*id))
            .count()
    }

    pub fn total_count(&self) -> usize {
        BadgeId::ALL.len()
    }

    pub fn reset(&mut self) -> Result<(), WriteError> {
        commit(&self.store, keys::BADGES, &mut self.doc, BadgesDoc::default())?;
        self.new_badge = None;
        Ok(())
    }
}
