use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::progress::{
    BookProgress, ChapterProgress, HeroProgress, LearningProgress, ProgressDoc, StudyMode,
};
use crate::services::{commit, Clock};
use crate::store::keys;
use crate::store::{Store, WriteError};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookStats {
    pub reading_completed: u32,
    pub speaking_completed: u32,
    pub fully_completed: u32,
    pub total_chapters: u32,
    pub total_words: u64,
    pub reading_percentage: u8,
    pub speaking_percentage: u8,
    pub overall_percentage: u8,
    pub last_accessed_at: Option<DateTime<Utc>>,
    pub last_chapter_index: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentActivity {
    pub book_id: String,
    pub last_accessed_at: DateTime<Utc>,
    pub last_chapter_index: u32,
}

/// Progress hook: chapter completion per book and hero conversations.
#[derive(Debug)]
pub struct ProgressTracker {
    store: Arc<Store>,
    clock: Clock,
    doc: ProgressDoc,
}

impl ProgressTracker {
    pub fn new(store: Arc<Store>) -> Self {
        Self::with_clock(store, Clock::system())
    }

    pub fn with_clock(store: Arc<Store>, clock: Clock) -> Self {
        Self {
            store,
            clock,
            doc: ProgressDoc::default(),
        }
    }

    /// Reads `user_progress`, falling back to the legacy `learning-progress`
    /// map (migrated and persisted) and then to an empty document.
    pub fn load(&mut self) {
        if let Some(doc) = self.store.read::<ProgressDoc>(keys::PROGRESS) {
            self.doc = doc;
            return;
        }

        if let Some(legacy) = self.store.read::<LearningProgress>(keys::LEARNING_PROGRESS) {
            let migrated = ProgressDoc::from_legacy(&legacy);
            tracing::info!(books = migrated.books.len(), "Migrated legacy learning progress");
            if let Err(e) = self.store.write(keys::PROGRESS, &migrated) {
                tracing::warn!(error = %e, "Failed to persist migrated progress");
            }
            self.doc = migrated;
            return;
        }

        self.doc = ProgressDoc::default();
    }

    pub fn doc(&self) -> &ProgressDoc {
        &self.doc
    }

    pub fn book_progress(&self, book_id: &str) -> BookProgress {
        self.doc.books.get(book_id).cloned().unwrap_or_default()
    }

    /// Marks a chapter done in `mode`. The word count is recorded only the
    /// first time reading completes.
    pub fn mark_chapter_completed(
        &mut self,
        book_id: &str,
        chapter_id: &str,
        mode: StudyMode,
        word_count: u64,
    ) -> Result<ChapterProgress, WriteError> {
        let now = self.clock.now();
        let mut next = self.doc.clone();
        let book = next.books.entry(book_id.to_string()).or_default();
        let chapter = book.chapters.entry(chapter_id.to_string()).or_default();

        match mode {
            StudyMode::Reading => {
                chapter.reading_completed = true;
                chapter.reading_completed_at.get_or_insert(now);
                if word_count > 0 && chapter.word_count == 0 {
                    chapter.word_count = word_count;
                }
            }
            StudyMode::Speaking => {
                chapter.speaking_completed = true;
                chapter.speaking_completed_at.get_or_insert(now);
            }
        }
        let updated = chapter.clone();
        book.last_accessed_at = Some(now);

        commit(&self.store, keys::PROGRESS, &mut self.doc, next)?;
        Ok(updated)
    }

    pub fn is_chapter_completed(
        &self,
        book_id: &str,
        chapter_id: &str,
        mode: Option<StudyMode>,
    ) -> bool {
        self.doc
            .books
            .get(book_id)
            .and_then(|b| b.chapters.get(chapter_id))
            .is_some_and(|c| c.is_completed(mode))
    }

    pub fn update_last_chapter_index(
        &mut self,
        book_id: &str,
        chapter_index: u32,
    ) -> Result<(), WriteError> {
        let mut next = self.doc.clone();
        let book = next.books.entry(book_id.to_string()).or_default();
        book.last_chapter_index = chapter_index;
        book.last_accessed_at = Some(self.clock.now());
        commit(&self.store, keys::PROGRESS, &mut self.doc, next)
    }

    pub fn book_stats(&self, book_id: &str, total_chapters: u32) -> BookStats {
        let book = self.book_progress(book_id);
        let count = |pred: fn(&ChapterProgress) -> bool| {
            book.chapters.values().filter(|c| pred(c)).count() as u32
        };
        let reading_completed = count(|c| c.reading_completed);
        let speaking_completed = count(|c| c.speaking_completed);
        let fully_completed = count(|c| c.reading_completed && c.speaking_completed);

        BookStats {
            reading_completed,
            speaking_completed,
            fully_completed,
            total_chapters,
            total_words: book.chapters.values().map(|c| c.word_count).sum(),
            reading_percentage: percent(reading_completed, total_chapters),
            speaking_percentage: percent(speaking_completed, total_chapters),
            overall_percentage: percent(fully_completed, total_chapters),
            last_accessed_at: book.last_accessed_at,
            last_chapter_index: book.last_chapter_index,
        }
    }

    pub fn mark_hero_conversation(&mut self, hero_id: &str) -> Result<HeroProgress, WriteError> {
        let now = self.clock.now();
        let mut next = self.doc.clone();
        let hero = next.heroes.entry(hero_id.to_string()).or_default();
        hero.conversation_count += 1;
        hero.first_talk_date.get_or_insert(now);
        hero.last_talk_date = Some(now);
        let updated = hero.clone();

        commit(&self.store, keys::PROGRESS, &mut self.doc, next)?;
        Ok(updated)
    }

    pub fn hero_stats(&self, hero_id: &str) -> HeroProgress {
        self.doc.heroes.get(hero_id).cloned().unwrap_or_default()
    }

    pub fn talked_heroes_count(&self) -> u64 {
        self.doc
            .heroes
            .values()
            .filter(|h| h.conversation_count > 0)
            .count() as u64
    }

    /// Total chapters whose reading is complete, across all books.
    pub fn completed_chapters(&self) -> u64 {
        self.doc
            .books
            .values()
            .flat_map(|b| b.chapters.values())
            .filter(|c| c.reading_completed)
            .count() as u64
    }

    /// The most recently accessed book.
    pub fn recent_activity(&self) -> Option<RecentActivity> {
        self.doc
            .books
            .iter()
            .filter_map(|(id, b)| b.last_accessed_at.map(|at| (id, b, at)))
            .max_by_key(|(_, _, at)| *at)
            .map(|(id, b, at)| RecentActivity {
                book_id: id.clone(),
                last_accessed_at: at,
                last_chapter_index: b.last_chapter_index,
            })
    }

    pub fn reset_book(&mut self, book_id: &str) -> Result<(), WriteError> {
        let mut next = self.doc.clone();
        next.books.remove(book_id);
        commit(&self.store, keys::PROGRESS, &mut self.doc, next)
    }

    pub fn reset_hero(&mut self, hero_id: &str) -> Result<(), WriteError> {
        let mut next = self.doc.clone();
        next.heroes.remove(hero_id);
        commit(&self.store, keys::PROGRESS, &mut self.doc, next)
    }

    pub fn reset_all(&mut self) -> Result<(), WriteError> {
        commit(&self.store, keys::PROGRESS, &mut self.doc, ProgressDoc::default())
    }
}

fn percent(part: u32, total: u32) -> u8 {
    if total == 0 {
        return 0;
    }
    (f64::from(part) * 100.0 / f64::from(total)).round().min(100.0) as u8
}
