/// Domain documents and per-book records, one sled entry per store key.
pub const DOCUMENTS: &str = "documents";

/// Bookkeeping that is never synced or counted towards storage usage.
pub const META: &str = "meta";
