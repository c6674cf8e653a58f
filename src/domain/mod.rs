pub mod cache;
pub mod outbox;
pub mod sync_log;
