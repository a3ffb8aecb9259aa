use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Debug;

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use proptest::prelude::*;

use learning_sync::constants::MAX_STUDY_DATES;
use learning_sync::domain::merge::Merge;
use learning_sync::domain::{
    BadgeState, BadgesDoc, BookProgress, Bookmarks, ChapterProgress, DayQuests, ProgressDoc,
    QuestDoc, QuestState, ReadingPosition, StatisticsDoc, StreakDoc,
};
use learning_sync::sync::snapshot::SyncSnapshot;

fn base() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
}

fn arb_ts() -> impl Strategy<Value = Option<DateTime<Utc>>> {
    prop::option::of((0_i64..500).prop_map(|h| base() + Duration::hours(h)))
}

fn arb_date() -> impl Strategy<Value = NaiveDate> {
    (0_i64..800).prop_map(|d| base().date_naive() + Duration::days(d))
}

fn arb_chapter() -> impl Strategy<Value = ChapterProgress> {
    (any::<bool>(), any::<bool>(), arb_ts(), arb_ts(), 0_u64..5_000).prop_map(
        |(reading, speaking, reading_at, speaking_at, word_count)| ChapterProgress {
            reading_completed: reading,
            speaking_completed: speaking,
            reading_completed_at: reading_at,
            speaking_completed_at: speaking_at,
            word_count,
        },
    )
}

fn arb_progress() -> impl Strategy<Value = ProgressDoc> {
    let chapters = prop::collection::btree_map("c[0-4]", arb_chapter(), 0..4);
    let book = (chapters, 0_u32..20, arb_ts()).prop_map(|(chapters, last, at)| BookProgress {
        chapters,
        last_chapter_index: last,
        last_accessed_at: at,
    });
    prop::collection::btree_map("b[0-2]", book, 0..3).prop_map(|books| ProgressDoc {
        books,
        ..Default::default()
    })
}

fn arb_badge() -> impl Strategy<Value = BadgeState> {
    (any::<bool>(), arb_ts(), any::<bool>()).prop_map(|(unlocked, unlocked_at, shown_modal)| {
        BadgeState {
            unlocked,
            unlocked_at,
            shown_modal,
        }
    })
}

fn arb_badges() -> impl Strategy<Value = BadgesDoc> {
    let ids = prop::sample::select(vec!["first_chapter", "first_book", "streak_7", "words_1000"]);
    prop::collection::btree_map(ids.prop_map(str::to_string), arb_badge(), 0..4).prop_map(
        |badges| BadgesDoc {
            badges,
            ..Default::default()
        },
    )
}

fn arb_statistics() -> impl Strategy<Value = StatisticsDoc> {
    let series = prop::collection::btree_map(
        "2026-W0[1-5]",
        prop::collection::btree_map("(mon|tue|sun)", 0_u64..10_000, 0..3),
        0..3,
    );
    (
        prop::collection::vec(0_u64..1_000, 6),
        series,
    )
        .prop_map(|(c, weekly_activity)| StatisticsDoc {
            total_study_time: c[0],
            total_words: c[1],
            completed_chapters: c[2],
            completed_books: c[3],
            hero_conversations: c[4],
            speaking_sessions: c[5],
            weekly_activity,
            ..Default::default()
        })
}

/// Any combination of counters, including documents from clients that
/// never wrote `longestStreak`.
fn arb_raw_streak() -> impl Strategy<Value = StreakDoc> {
    (
        prop::option::of(arb_date()),
        prop::collection::btree_set(arb_date(), 0..40),
        0_u32..50,
        0_u32..80,
    )
        .prop_map(|(last, study_dates, current, longest)| StreakDoc {
            last_study_date: last,
            study_dates,
            current_streak: current,
            longest_streak: longest,
            ..Default::default()
        })
}

fn arb_streak() -> impl Strategy<Value = StreakDoc> {
    arb_raw_streak().prop_map(StreakDoc::normalized)
}

fn arb_quest_state() -> impl Strategy<Value = QuestState> {
    (
        any::<bool>(),
        arb_ts(),
        prop::option::of(0.0_f64..100.0),
        prop::option::of(0_u32..30),
    )
        .prop_map(|(completed, completed_at, accuracy, message_count)| QuestState {
            completed,
            completed_at,
            accuracy,
            message_count,
        })
}

fn arb_quests() -> impl Strategy<Value = QuestDoc> {
    let day = (arb_quest_state(), arb_quest_state(), arb_quest_state()).prop_map(
        |(reading, speaking, chat)| DayQuests {
            reading,
            speaking,
            chat,
        },
    );
    prop::collection::btree_map("2026-02-0[1-4]", day, 0..3).prop_map(|quests| QuestDoc {
        quests,
        ..Default::default()
    })
}

fn arb_position() -> impl Strategy<Value = ReadingPosition> {
    (0_u32..30, arb_ts(), 0_u8..=100).prop_map(|(current_chapter, last_read_date, pct)| {
        ReadingPosition {
            current_chapter,
            last_read_date,
            completion_percentage: pct,
        }
    })
}

fn arb_snapshot() -> impl Strategy<Value = SyncSnapshot> {
    (
        prop::option::of(arb_progress()),
        prop::option::of(arb_statistics()),
        prop::option::of(arb_streak()),
        prop::option::of(arb_badges()),
        prop::option::of(arb_quests()),
        prop::collection::btree_map("b[0-2]", arb_position(), 0..3),
        prop::collection::btree_map(
            "b[0-2]",
            prop::collection::btree_set("c[0-5]", 0..4).prop_map(Bookmarks),
            0..3,
        ),
    )
        .prop_map(
            |(progress, statistics, streak_data, badges, today_quest_data, reading, marks)| {
                SyncSnapshot {
                    progress,
                    statistics,
                    streak_data,
                    badges,
                    today_quest_data,
                    learning_progress: None,
                    reading_progress: reading,
                    bookmarks: marks,
                }
            },
        )
}

fn check_laws<T: Merge + PartialEq + Debug>(a: &T, b: &T, c: &T) -> Result<(), TestCaseError> {
    prop_assert_eq!(&a.merge(a), a);
    prop_assert_eq!(&a.merge(b), &b.merge(a));
    prop_assert_eq!(a.merge(b).merge(c), a.merge(&b.merge(c)));
    let ab = a.merge(b);
    prop_assert_eq!(&ab.merge(&ab), &ab);
    Ok(())
}

proptest! {
    #[test]
    fn pt_progress_merge_laws(a in arb_progress(), b in arb_progress(), c in arb_progress()) {
        check_laws(&a, &b, &c)?;
    }

    #[test]
    fn pt_badges_merge_laws(a in arb_badges(), b in arb_badges(), c in arb_badges()) {
        check_laws(&a, &b, &c)?;
    }

    #[test]
    fn pt_statistics_merge_laws(a in arb_statistics(), b in arb_statistics(), c in arb_statistics()) {
        check_laws(&a, &b, &c)?;
    }

    #[test]
    fn pt_streak_merge_laws(a in arb_streak(), b in arb_streak(), c in arb_streak()) {
        check_laws(&a, &b, &c)?;
    }

    #[test]
    fn pt_quest_merge_laws(a in arb_quests(), b in arb_quests(), c in arb_quests()) {
        check_laws(&a, &b, &c)?;
    }

    #[test]
    fn pt_snapshot_merge_laws(a in arb_snapshot(), b in arb_snapshot(), c in arb_snapshot()) {
        check_laws(&a, &b, &c)?;
    }

    #[test]
    fn pt_completion_flags_never_regress(a in arb_progress(), b in arb_progress()) {
        let merged = a.merge(&b);
        for side in [&a, &b] {
            for (book_id, book) in &side.books {
                for (chapter_id, chapter) in &book.chapters {
                    let m = &merged.books[book_id].chapters[chapter_id];
                    prop_assert!(m.reading_completed || !chapter.reading_completed);
                    prop_assert!(m.speaking_completed || !chapter.speaking_completed);
                    prop_assert!(m.word_count >= chapter.word_count);
                }
            }
        }
    }

    #[test]
    fn pt_unlocked_badges_stay_unlocked(a in arb_badges(), b in arb_badges()) {
        let merged = a.merge(&b);
        for side in [&a, &b] {
            for (id, state) in &side.badges {
                if state.unlocked {
                    prop_assert!(merged.badges[id].unlocked);
                    prop_assert!(merged.badges[id].unlocked_at.is_some() || state.unlocked_at.is_none());
                }
            }
        }
    }

    #[test]
    fn pt_counters_take_max_never_sum(a in arb_statistics(), b in arb_statistics()) {
        let merged = a.merge(&b);
        prop_assert_eq!(merged.total_words, a.total_words.max(b.total_words));
        prop_assert_eq!(merged.total_study_time, a.total_study_time.max(b.total_study_time));
        prop_assert!(merged.weekly_activity == a.weekly_activity || merged.weekly_activity == b.weekly_activity);
    }

    #[test]
    fn pt_streak_dates_union_is_capped(
        a in prop::collection::btree_set(arb_date(), 200..300),
        b in prop::collection::btree_set(arb_date(), 200..300),
    ) {
        let left = StreakDoc { study_dates: a.clone(), ..Default::default() };
        let right = StreakDoc { study_dates: b.clone(), ..Default::default() };
        let merged = left.merge(&right);

        let union: BTreeSet<NaiveDate> = a.union(&b).copied().collect();
        prop_assert_eq!(merged.study_dates.len(), union.len().min(MAX_STUDY_DATES));
        // 只保留最近的日期
        let newest: Vec<_> = union.iter().rev().take(MAX_STUDY_DATES).copied().collect();
        prop_assert!(newest.iter().all(|d| merged.study_dates.contains(d)));
        prop_assert!(merged.longest_streak >= left.longest_streak.max(right.longest_streak));
    }

    #[test]
    fn pt_streak_bound_holds_after_any_merge(a in arb_raw_streak(), b in arb_raw_streak()) {
        let merged = a.merge(&b);
        prop_assert!(merged.longest_streak >= merged.current_streak);
        prop_assert!(merged.longest_streak >= a.current_streak.max(b.current_streak));

        // 只有一侧有连续学习数据时也成立
        for side in [a, b] {
            let one_sided = SyncSnapshot { streak_data: Some(side), ..Default::default() };
            let merged = one_sided.merge(&SyncSnapshot::default());
            let streak = merged.streak_data.as_ref().unwrap();
            prop_assert!(streak.longest_streak >= streak.current_streak);
            prop_assert_eq!(&merged.merge(&merged), &merged);
        }
    }

    #[test]
    fn pt_decoded_streak_satisfies_bound(current in 0_u32..500, longest in prop::option::of(0_u32..500)) {
        let mut value = serde_json::json!({"currentStreak": current, "lastStudyDate": "2026-05-01"});
        if let Some(longest) = longest {
            value["longestStreak"] = longest.into();
        }
        let doc: StreakDoc = serde_json::from_value(value).unwrap();
        prop_assert_eq!(doc.longest_streak, current.max(longest.unwrap_or(0)));
        prop_assert_eq!(&doc.merge(&doc), &doc);
    }

    #[test]
    fn pt_bookmarks_union(a in prop::collection::btree_set("c[0-9]", 0..6), b in prop::collection::btree_set("c[0-9]", 0..6)) {
        let merged = Bookmarks(a.clone()).merge(&Bookmarks(b.clone()));
        prop_assert_eq!(merged.0, a.union(&b).cloned().collect::<BTreeSet<_>>());
    }
}

#[test]
fn chapter_present_on_one_side_is_taken_verbatim() {
    let mut local = ProgressDoc::default();
    let chapter = ChapterProgress {
        reading_completed: true,
        word_count: 42,
        ..Default::default()
    };
    local
        .books
        .entry("b1".into())
        .or_default()
        .chapters
        .insert("c1".into(), chapter.clone());

    let merged = local.merge(&ProgressDoc {
        books: BTreeMap::from([("b2".to_string(), BookProgress::default())]),
        ..Default::default()
    });
    assert_eq!(merged.books["b1"].chapters["c1"], chapter);
    assert!(merged.books.contains_key("b2"));
}
