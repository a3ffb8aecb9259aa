use std::collections::BTreeSet;
use std::sync::Arc;

use crate::domain::books::{Bookmarks, ReadingPosition};
use crate::services::Clock;
use crate::store::keys;
use crate::store::{Store, StoreError, WriteError};

/// Per-book bookmarks and reading positions. Unlike the other trackers
/// nothing is cached: every book has its own key and is read on demand.
#[derive(Debug, Clone)]
pub struct BookRecords {
    store: Arc<Store>,
    clock: Clock,
}

impl BookRecords {
    pub fn new(store: Arc<Store>) -> Self {
        Self::with_clock(store, Clock::system())
    }

    pub fn with_clock(store: Arc<Store>, clock: Clock) -> Self {
        Self { store, clock }
    }

    pub fn reading_position(&self, book_id: &str) -> ReadingPosition {
        self.store
            .read(&keys::reading_position_key(book_id))
            .unwrap_or_default()
    }

    pub fn update_position(
        &self,
        book_id: &str,
        current_chapter: u32,
        total_chapters: u32,
    ) -> Result<ReadingPosition, WriteError> {
        let position = ReadingPosition::at(current_chapter, total_chapters, self.clock.now());
        self.store
            .write(&keys::reading_position_key(book_id), &position)?;
        Ok(position)
    }

    pub fn reset_position(&self, book_id: &str) -> Result<(), WriteError> {
        self.store
            .write(&keys::reading_position_key(book_id), &ReadingPosition::default())
    }

    pub fn bookmarks(&self, book_id: &str) -> Bookmarks {
        self.store
            .read(&keys::bookmarks_key(book_id))
            .unwrap_or_default()
    }

    /// Returns whether the chapter is bookmarked afterwards.
    pub fn toggle_bookmark(&self, book_id: &str, chapter_id: &str) -> Result<bool, WriteError> {
        let mut marks = self.bookmarks(book_id);
        let bookmarked = marks.toggle(chapter_id);
        self.store.write(&keys::bookmarks_key(book_id), &marks)?;
        Ok(bookmarked)
    }

    pub fn is_bookmarked(&self, book_id: &str, chapter_id: &str) -> bool {
        self.bookmarks(book_id).contains(chapter_id)
    }

    /// Every book that has a bookmark or position record.
    pub fn book_ids(&self) -> BTreeSet<String> {
        keys::DYNAMIC_PREFIXES
            .iter()
            .flat_map(|prefix| {
                self.store
                    .keys_with_prefix(prefix)
                    .into_iter()
                    .filter_map(move |key| {
                        keys::book_id_from_key(&key, prefix).map(str::to_string)
                    })
            })
            .collect()
    }

    /// Removes every per-book record. Returns the number of removed keys.
    pub fn remove_all(&self) -> Result<usize, StoreError> {
        let mut removed = 0;
        for prefix in keys::DYNAMIC_PREFIXES {
            for key in self.store.keys_with_prefix(prefix) {
                if self.store.remove(&key)? {
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }
}
