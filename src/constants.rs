/// 备份文件与文档中写入的应用版本
pub const APP_VERSION: &str = "1.1.0";

/// 备份文件中的应用标识，导入时用于识别其他应用的文件
pub const APP_NAME: &str = "Classic Hero";

/// Daily quest document version (tracked separately from the app version).
pub const QUEST_VERSION: &str = "1.0.0";

/// 本地写入后触发推送的防抖间隔（毫秒）
pub const DEFAULT_DEBOUNCE_MS: u64 = 2_000;

/// 远程请求超时（秒）
pub const DEFAULT_SYNC_TIMEOUT_SECS: u64 = 15;

/// 本地存储估算容量（字节），与浏览器 localStorage 的 5MB 下限一致
pub const DEFAULT_STORAGE_CAPACITY_BYTES: u64 = 5 * 1024 * 1024;

/// 使用率达到此百分比时发出存储警告
pub const DEFAULT_STORAGE_WARNING_PERCENT: u8 = 80;

/// Streak study dates are capped to this many most-recent entries.
pub const MAX_STUDY_DATES: usize = 365;

/// Daily quest entries older than this many days are pruned on load.
pub const QUEST_RETENTION_DAYS: i64 = 30;

/// Study sessions shorter than this are not accumulated.
pub const MIN_SESSION_MS: u64 = 1_000;

/// Number of heroes a user can talk to (all_heroes badge target).
pub const TOTAL_HEROES: u32 = 6;
