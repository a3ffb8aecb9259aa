//! Domain trackers. Each owns the in-memory copy of one or two documents and
//! is the only writer of its keys; every mutation computes a complete new
//! document and persists it through [`Store::write`].

pub mod badges;
pub mod books;
pub mod data_manager;
pub mod progress;
pub mod quest;
pub mod statistics;
pub mod trackers;

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::store::{Store, WriteError};

pub use badges::BadgeTracker;
pub use books::BookRecords;
pub use data_manager::{DataManager, ImportError, ImportMode};
pub use progress::ProgressTracker;
pub use quest::QuestTracker;
pub use statistics::{StatisticsTracker, StatsSummary};
pub use trackers::Trackers;

/// Source of "now". Trackers default to the system clock; tests pin it.
#[derive(Clone)]
pub struct Clock(Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>);

impl Clock {
    pub fn system() -> Self {
        Self(Arc::new(Utc::now))
    }

    pub fn fixed(at: DateTime<Utc>) -> Self {
        Self(Arc::new(move || at))
    }

    pub fn from_fn(f: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.0)()
    }

    pub fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::system()
    }
}

impl std::fmt::Debug for Clock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Clock").field(&self.now()).finish()
    }
}

/// Persists `next` and, only on success, replaces the in-memory copy.
/// A failed write leaves both the stored and in-memory document unchanged.
pub(crate) fn commit<T: Serialize>(
    store: &Store,
    key: &str,
    current: &mut T,
    next: T,
) -> Result<(), WriteError> {
    store.write(key, &next)?;
    *current = next;
    Ok(())
}
