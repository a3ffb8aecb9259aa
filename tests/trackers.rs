mod common;

use chrono::{Duration, NaiveDate};
use serde_json::json;

use learning_sync::config::StorageConfig;
use learning_sync::domain::statistics::date_key;
use learning_sync::domain::{DayQuests, QuestDoc, QuestKind, QuestState, StudyMode};
use learning_sync::events::{AlertLevel, StoreEvent};
use learning_sync::services::{
    BadgeTracker, BookRecords, ProgressTracker, QuestTracker, StatisticsTracker,
};
use learning_sync::store::keys;
use learning_sync::store::WriteError;

use common::fixtures::{fixed_clock, open_store, open_store_with};

fn completed_day() -> DayQuests {
    DayQuests {
        reading: QuestState {
            completed: true,
            ..Default::default()
        },
        ..Default::default()
    }
}

#[test]
fn it_quest_load_prunes_entries_older_than_thirty_days() {
    let ts = open_store();
    let today = NaiveDate::from_ymd_opt(2026, 6, 20).unwrap();
    let old = date_key(today - Duration::days(40));
    let recent = date_key(today - Duration::days(10));

    let mut doc = QuestDoc::default();
    doc.quests.insert(old.clone(), completed_day());
    doc.quests.insert(recent.clone(), completed_day());
    ts.store.write(keys::TODAY_QUEST, &doc).unwrap();

    let mut quests = QuestTracker::with_clock(ts.store.clone(), fixed_clock(2026, 6, 20));
    quests.load();

    assert!(!quests.doc().quests.contains_key(&old));
    assert!(quests.doc().quests.contains_key(&recent));
    // 裁剪结果已持久化
    let stored: QuestDoc = ts.store.read(keys::TODAY_QUEST).unwrap();
    assert_eq!(stored.quests.len(), 1);
    assert_eq!(quests.total_completed(), 1);
}

#[test]
fn it_daily_quests_complete_once_per_day() {
    let ts = open_store();
    let mut quests = QuestTracker::with_clock(ts.store.clone(), fixed_clock(2026, 6, 20));
    quests.load();

    assert!(quests.complete_reading().unwrap());
    assert!(!quests.complete_reading().unwrap());
    assert!(quests.complete_speaking(87.5).unwrap());
    assert!(quests.complete_chat(5).unwrap());

    assert!(quests.is_all_completed());
    assert!(quests.is_completed(QuestKind::Speaking));
    assert_eq!(quests.today_quests().speaking.accuracy, Some(87.5));
    assert_eq!(quests.perfect_day_count(), 1);
}

#[test]
fn it_capacity_exceeded_keeps_previous_document_and_alerts_once() {
    let ts = open_store_with(StorageConfig {
        capacity_bytes: 400,
        warning_percent: 80,
    });
    let mut progress = ProgressTracker::with_clock(ts.store.clone(), fixed_clock(2026, 6, 20));
    progress.load();
    progress
        .mark_chapter_completed("b1", "c1", StudyMode::Reading, 10)
        .unwrap();
    let mut rx = ts.store.subscribe();

    let mut failure = None;
    for i in 0..20 {
        let before = ts.store.read_raw(keys::PROGRESS).unwrap();
        let chapter = format!("s{i}");
        if let Err(e) = progress.mark_chapter_completed("b1", &chapter, StudyMode::Speaking, 0) {
            failure = Some((chapter, before, e));
            break;
        }
    }
    let (chapter, before, err) = failure.expect("capacity should be exhausted");
    assert!(matches!(err, WriteError::CapacityExceeded { .. }));
    assert_eq!(ts.store.read_raw(keys::PROGRESS).unwrap(), before);

    let mut alerts = 0;
    while let Ok(event) = rx.try_recv() {
        if let StoreEvent::StorageAlert { level, .. } = event {
            assert_eq!(level, AlertLevel::Error);
            alerts += 1;
        }
    }
    assert_eq!(alerts, 1);

    // 失败的写入不会更新内存副本
    assert!(!progress.doc().books["b1"].chapters.contains_key(&chapter));
    let mut reloaded = ProgressTracker::new(ts.store.clone());
    reloaded.load();
    assert_eq!(reloaded.doc(), progress.doc());
}

#[test]
fn it_legacy_learning_progress_is_migrated_on_load() {
    let ts = open_store();
    ts.store
        .write(
            keys::LEARNING_PROGRESS,
            &json!({"b7": {"chapters": {"c2": {"readingCompleted": true}}, "lastChapterIndex": 2}}),
        )
        .unwrap();

    let mut progress = ProgressTracker::with_clock(ts.store.clone(), fixed_clock(2026, 6, 20));
    progress.load();

    assert!(ts.store.contains(keys::PROGRESS));
    assert!(progress.is_chapter_completed("b7", "c2", Some(StudyMode::Reading)));
}

#[test]
fn it_statistics_and_badges_work_together() {
    let ts = open_store();
    let clock = fixed_clock(2026, 6, 20);
    let mut stats = StatisticsTracker::with_clock(ts.store.clone(), clock.clone());
    let mut badges = BadgeTracker::with_clock(ts.store.clone(), clock);
    stats.load();
    badges.load();

    stats.record_chapter_complete(600).unwrap();
    stats.record_chapter_complete(500).unwrap();
    let summary = stats.summary();
    assert_eq!(summary.total_words, 1_100);
    assert_eq!(summary.current_streak, 1);

    let unlocked = badges
        .check_achievements(&learning_sync::domain::AchievementStats {
            completed_chapters: summary.completed_chapters,
            total_words: summary.total_words,
            current_streak: u64::from(summary.current_streak),
            ..Default::default()
        })
        .unwrap();
    let ids: Vec<_> = unlocked.iter().map(|b| b.id.as_str()).collect();
    assert_eq!(ids, ["first_chapter", "words_1000"]);
    assert!(badges.check_achievements(&Default::default()).unwrap().is_empty());
}

#[test]
fn it_book_records_track_bookmarks_and_positions() {
    let ts = open_store();
    let books = BookRecords::with_clock(ts.store.clone(), fixed_clock(2026, 6, 20));

    assert!(books.toggle_bookmark("b1", "c3").unwrap());
    books.update_position("b2", 3, 12).unwrap();

    assert_eq!(
        books.book_ids().into_iter().collect::<Vec<_>>(),
        vec!["b1".to_string(), "b2".to_string()]
    );
    assert_eq!(books.reading_position("b2").completion_percentage, 33);
    assert!(books.is_bookmarked("b1", "c3"));
    assert!(!books.toggle_bookmark("b1", "c3").unwrap());
}

#[test]
fn it_hero_conversations_and_sessions_are_recorded() {
    let ts = open_store();
    let now = std::sync::Arc::new(std::sync::Mutex::new(common::fixtures::at(2026, 6, 20, 9)));
    let clock = {
        let now = now.clone();
        learning_sync::services::Clock::from_fn(move || *now.lock().unwrap())
    };

    let mut progress = ProgressTracker::with_clock(ts.store.clone(), clock.clone());
    progress.load();
    progress.mark_hero_conversation("achilles").unwrap();
    let hero = progress.mark_hero_conversation("achilles").unwrap();
    assert_eq!(hero.conversation_count, 2);
    assert_eq!(progress.hero_stats("achilles"), hero);
    assert_eq!(progress.talked_heroes_count(), 1);
    progress.reset_hero("achilles").unwrap();
    assert_eq!(progress.hero_stats("achilles").conversation_count, 0);

    let mut stats = StatisticsTracker::with_clock(ts.store.clone(), clock);
    stats.load();
    *now.lock().unwrap() += Duration::minutes(25);
    assert_eq!(stats.end_session().unwrap(), 25 * 60 * 1_000);

    stats.start_session();
    *now.lock().unwrap() += Duration::milliseconds(400);
    assert_eq!(stats.end_session().unwrap(), 0);
    assert_eq!(stats.summary().total_study_time, 25 * 60 * 1_000);
    assert_eq!(stats.summary().total_study_time_formatted, "25m");
}
