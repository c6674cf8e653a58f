use crate::shared::error::AppError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    pub sync: SyncConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    /// Request timeout in seconds. A timed-out request is treated the same
    /// as a dropped connection by the upload engine.
    pub request_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Number of outbox items submitted per upload request.
    pub chunk_size: usize,
    /// When true, failed outbox items are requeued to `pending` at the start
    /// of the next upload run. When false (default), failed items stay put
    /// until the user retries them explicitly.
    pub requeue_failed: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite:data/gradesync.db".to_string(),
                max_connections: 5,
            },
            api: ApiConfig {
                base_url: "http://localhost:8000/api".to_string(),
                request_timeout: 30,
            },
            sync: SyncConfig {
                chunk_size: 50,
                requeue_failed: false,
            },
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(v) = std::env::var("GRADESYNC_DATABASE_URL") {
            if !v.trim().is_empty() {
                cfg.database.url = v;
            }
        }
        if let Ok(v) = std::env::var("GRADESYNC_DATABASE_MAX_CONNECTIONS") {
            if let Some(value) = parse_u32(&v) {
                cfg.database.max_connections = value.max(1);
            }
        }
        if let Ok(v) = std::env::var("GRADESYNC_API_URL") {
            if !v.trim().is_empty() {
                cfg.api.base_url = v.trim_end_matches('/').to_string();
            }
        }
        if let Ok(v) = std::env::var("GRADESYNC_REQUEST_TIMEOUT") {
            if let Some(value) = parse_u64(&v) {
                cfg.api.request_timeout = value.max(1);
            }
        }
        if let Ok(v) = std::env::var("GRADESYNC_CHUNK_SIZE") {
            if let Some(value) = parse_u64(&v) {
                cfg.sync.chunk_size = (value as usize).max(1);
            }
        }
        if let Ok(v) = std::env::var("GRADESYNC_REQUEUE_FAILED") {
            cfg.sync.requeue_failed = parse_bool(&v, cfg.sync.requeue_failed);
        }

        cfg
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.database.max_connections == 0 {
            return Err(AppError::Configuration(
                "Database max_connections must be greater than 0".to_string(),
            ));
        }
        if self.api.base_url.trim().is_empty() {
            return Err(AppError::Configuration(
                "Api base_url must not be empty".to_string(),
            ));
        }
        if self.api.request_timeout == 0 {
            return Err(AppError::Configuration(
                "Api request_timeout must be greater than 0".to_string(),
            ));
        }
        if self.sync.chunk_size == 0 {
            return Err(AppError::Configuration(
                "Sync chunk_size must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_bool(s: &str, default: bool) -> bool {
    match s.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}

fn parse_u64(value: &str) -> Option<u64> {
    value.trim().parse::<u64>().ok()
}

fn parse_u32(value: &str) -> Option<u32> {
    value.trim().parse::<u32>().ok()
}
