// Fixed domain keys
pub const PROGRESS: &str = "user_progress";
pub const BADGES: &str = "user_badges";
pub const STATISTICS: &str = "user_statistics";
pub const STREAK: &str = "streak_data";
pub const TODAY_QUEST: &str = "today_quest_data";
/// Per-book learning map written by older app versions; still synced.
pub const LEARNING_PROGRESS: &str = "learning-progress";

// Legacy keys that are only ever removed
pub const LEGACY_MOTIVATION: &str = "learning-motivation";

// Dynamic per-book prefixes
pub const READING_POSITION_PREFIX: &str = "progress-";
pub const BOOKMARKS_PREFIX: &str = "bookmarks-";

// Meta tree keys
pub const SCHEMA_VERSION: &str = "_meta:version";
pub const LAST_SYNC_TIME: &str = "_meta:last_sync_time";

pub const FIXED_KEYS: &[&str] = &[
    PROGRESS,
    BADGES,
    STATISTICS,
    STREAK,
    TODAY_QUEST,
    LEARNING_PROGRESS,
];

pub const DYNAMIC_PREFIXES: &[&str] = &[READING_POSITION_PREFIX, BOOKMARKS_PREFIX];

pub fn reading_position_key(book_id: &str) -> String {
    format!("{}{}", READING_POSITION_PREFIX, book_id)
}

pub fn bookmarks_key(book_id: &str) -> String {
    format!("{}{}", BOOKMARKS_PREFIX, book_id)
}

/// Strips `prefix` and returns the book id, rejecting empty ids.
pub fn book_id_from_key<'a>(key: &'a str, prefix: &str) -> Option<&'a str> {
    key.strip_prefix(prefix).filter(|id| !id.is_empty())
}

/// Whether a write to `key` must eventually reach the remote store.
pub fn is_sync_target(key: &str) -> bool {
    FIXED_KEYS.contains(&key)
        || DYNAMIC_PREFIXES
            .iter()
            .any(|prefix| book_id_from_key(key, prefix).is_some())
}
