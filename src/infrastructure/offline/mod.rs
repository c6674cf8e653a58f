mod sqlite_cache;
mod sqlite_outbox;
mod sqlite_sync_log;

pub use sqlite_cache::SqliteCacheStore;
pub use sqlite_outbox::SqliteOutboxStore;
pub use sqlite_sync_log::SqliteSyncLogStore;
