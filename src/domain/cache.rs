use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Entity type keys used by the cache, the outbox and the seed pipeline.
pub mod entity_types {
    pub const INSTITUTION: &str = "institution";
    pub const CLASS_SECTION: &str = "class_section";
    pub const SUBJECT: &str = "subject";
    pub const USER: &str = "user";
    pub const STUDENT: &str = "student";
    pub const GRADABLE_ITEM: &str = "gradable_item";
    pub const STUDENT_RUNNING_GRADE: &str = "student_running_grade";
}

/// A locally mirrored remote record. Payload is the denormalized JSON body
/// exactly as the server sent it.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CacheEntry {
    pub entity_type: String,
    pub entity_id: String,
    pub payload: String,
    pub updated_at: i64,
}

impl CacheEntry {
    pub fn payload_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::from_str(&self.payload)
    }
}

/// A record fetched from the remote system, ready to be upserted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteRecord {
    pub id: String,
    pub payload: serde_json::Value,
}

impl RemoteRecord {
    pub fn from_value(value: serde_json::Value) -> Option<Self> {
        let id = record_id(&value)?;
        Some(Self { id, payload: value })
    }
}

/// Extracts the record identifier from a raw server object. Accepts both
/// string and integer `id` fields since the remote API is inconsistent
/// across resources.
pub fn record_id(value: &serde_json::Value) -> Option<String> {
    match value.get("id") {
        Some(serde_json::Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn remote_record_accepts_string_and_numeric_ids() {
        let rec = RemoteRecord::from_value(json!({"id": "s-1", "name": "A"})).unwrap();
        assert_eq!(rec.id, "s-1");

        let rec = RemoteRecord::from_value(json!({"id": 42, "name": "B"})).unwrap();
        assert_eq!(rec.id, "42");
    }

    #[test]
    fn remote_record_rejects_missing_id() {
        assert!(RemoteRecord::from_value(json!({"name": "C"})).is_none());
        assert!(RemoteRecord::from_value(json!({"id": ""})).is_none());
    }
}
