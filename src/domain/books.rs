//! Per-book auxiliary records, each stored under its own dynamic key.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::{self, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

use crate::domain::merge::Merge;

/// Stored under `progress-{bookId}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReadingPosition {
    pub current_chapter: u32,
    pub last_read_date: Option<DateTime<Utc>>,
    pub completion_percentage: u8,
}

impl ReadingPosition {
    pub fn at(current_chapter: u32, total_chapters: u32, now: DateTime<Utc>) -> Self {
        let completion_percentage = if total_chapters == 0 {
            0
        } else {
            let pct = (f64::from(current_chapter + 1) / f64::from(total_chapters) * 100.0).round();
            pct.min(100.0) as u8
        };
        Self {
            current_chapter,
            last_read_date: Some(now),
            completion_percentage,
        }
    }

    fn rank(&self) -> (u8, u32, Option<DateTime<Utc>>) {
        (
            self.completion_percentage,
            self.current_chapter,
            self.last_read_date,
        )
    }
}

impl Merge for ReadingPosition {
    /// The most advanced position wins.
    fn merge(&self, other: &Self) -> Self {
        if other.rank() > self.rank() {
            other.clone()
        } else {
            self.clone()
        }
    }
}

/// Bookmarked chapter ids, stored under `bookmarks-{bookId}` as a JSON array.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Bookmarks(pub BTreeSet<String>);

impl Bookmarks {
    /// Returns whether the chapter is bookmarked after the toggle.
    pub fn toggle(&mut self, chapter_id: &str) -> bool {
        if self.0.remove(chapter_id) {
            false
        } else {
            self.0.insert(chapter_id.to_string());
            true
        }
    }

    pub fn contains(&self, chapter_id: &str) -> bool {
        self.0.contains(chapter_id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Merge for Bookmarks {
    fn merge(&self, other: &Self) -> Self {
        Bookmarks(self.0.merge(&other.0))
    }
}

// Older clients stored numeric chapter ids.
impl<'de> Deserialize<'de> for Bookmarks {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct IdsVisitor;

        impl<'de> Visitor<'de> for IdsVisitor {
            type Value = Bookmarks;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an array of chapter ids")
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
                let mut ids = BTreeSet::new();
                while let Some(value) = seq.next_element::<serde_json::Value>()? {
                    match value {
                        serde_json::Value::String(s) => {
                            ids.insert(s);
                        }
                        serde_json::Value::Number(n) => {
                            ids.insert(n.to_string());
                        }
                        other => {
                            return Err(de::Error::custom(format!(
                                "invalid chapter id: {other}"
                            )))
                        }
                    }
                }
                Ok(Bookmarks(ids))
            }
        }

        deserializer.deserialize_seq(IdsVisitor)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn position_percentage_is_rounded_and_capped() {
        let now = Utc.with_ymd_and_hms(2026, 1, 5, 8, 0, 0).unwrap();
        assert_eq!(ReadingPosition::at(0, 3, now).completion_percentage, 33);
        assert_eq!(ReadingPosition::at(2, 3, now).completion_percentage, 100);
        assert_eq!(ReadingPosition::at(9, 3, now).completion_percentage, 100);
        assert_eq!(ReadingPosition::at(0, 0, now).completion_percentage, 0);
    }

    #[test]
    fn most_advanced_position_wins() {
        let now = Utc.with_ymd_and_hms(2026, 1, 5, 8, 0, 0).unwrap();
        let later = now + chrono::Duration::hours(3);
        let ahead = ReadingPosition::at(5, 10, now);
        let behind = ReadingPosition::at(2, 10, later);
        assert_eq!(ahead.merge(&behind), ahead);
        assert_eq!(behind.merge(&ahead), ahead);
    }

    #[test]
    fn bookmarks_accept_numeric_and_string_ids() {
        let marks: Bookmarks = serde_json::from_str(r#"[3, "ch-7", 3]"#).unwrap();
        assert_eq!(marks.len(), 2);
        assert!(marks.contains("3"));
        assert!(serde_json::from_str::<Bookmarks>(r#"[true]"#).is_err());
    }

    #[test]
    fn toggle_adds_then_removes() {
        let mut marks = Bookmarks::default();
        assert!(marks.toggle("c1"));
        assert!(!marks.toggle("c1"));
        assert!(marks.is_empty());
    }

    #[test]
    fn bookmark_merge_is_union() {
        let a = Bookmarks(["c1".to_string()].into());
        let b = Bookmarks(["c2".to_string()].into());
        assert_eq!(a.merge(&b).len(), 2);
    }
}
