pub mod cache_store;
pub mod outbox_store;
pub mod remote_gateway;
pub mod sync_log_store;
