use std::sync::Arc;

use crate::events::StoreEvent;
use crate::services::{BadgeTracker, Clock, ProgressTracker, QuestTracker, StatisticsTracker};
use crate::store::Store;

/// The four long-lived trackers of one process, reloaded together whenever
/// their documents are replaced in bulk.
#[derive(Debug)]
pub struct Trackers {
    pub progress: ProgressTracker,
    pub badges: BadgeTracker,
    pub statistics: StatisticsTracker,
    pub quests: QuestTracker,
}

impl Trackers {
    pub fn new(store: Arc<Store>) -> Self {
        Self::with_clock(store, Clock::system())
    }

    pub fn with_clock(store: Arc<Store>, clock: Clock) -> Self {
        Self {
            progress: ProgressTracker::with_clock(store.clone(), clock.clone()),
            badges: BadgeTracker::with_clock(store.clone(), clock.clone()),
            statistics: StatisticsTracker::with_clock(store.clone(), clock.clone()),
            quests: QuestTracker::with_clock(store, clock),
        }
    }

    pub fn load(&mut self) {
        self.progress.load();
        self.badges.load();
        self.statistics.load();
        self.quests.load();
    }

    /// Reloads on sync, reset and import events. Returns whether it did.
    pub fn handle_event(&mut self, event: &StoreEvent) -> bool {
        if !event.invalidates_trackers() {
            return false;
        }
        self.load();
        true
    }
}
