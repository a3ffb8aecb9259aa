//! Domain documents and their merge functions. Everything here is pure:
//! persistence lives in `store`, mutation flows in `services`.

pub mod badges;
pub mod books;
pub mod merge;
pub mod progress;
pub mod quest;
pub mod statistics;
pub mod streak;

pub use badges::{AchievementStats, BadgeId, BadgeState, BadgesDoc};
pub use books::{Bookmarks, ReadingPosition};
pub use merge::Merge;
pub use progress::{BookProgress, ChapterProgress, HeroProgress, LearningProgress, ProgressDoc, StudyMode};
pub use quest::{DayQuests, QuestDoc, QuestKind, QuestState};
pub use statistics::{DailyActivity, StatisticsDoc};
pub use streak::StreakDoc;
