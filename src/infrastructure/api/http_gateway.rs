use crate::application::ports::remote_gateway::{RemoteGateway, UploadChunkResponse};
use crate::domain::cache::RemoteRecord;
use crate::shared::config::ApiConfig;
use crate::shared::error::AppError;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

/// Envelope of every download endpoint.
#[derive(Debug, Deserialize)]
struct DownloadBody {
    success: bool,
    #[serde(default)]
    data: Vec<serde_json::Value>,
    #[allow(dead_code)]
    timestamp: Option<i64>,
}

/// Envelope of the upload endpoint. The three subsets are disjoint and
/// together cover the submitted chunk.
#[derive(Debug, Deserialize)]
struct UploadBody {
    #[allow(dead_code)]
    success: bool,
    #[serde(flatten)]
    response: UploadChunkResponse,
}

/// `RemoteGateway` over the school server's REST sync endpoints. The
/// bearer token and base URL come from the authentication collaborator;
/// this client never refreshes the token itself.
pub struct HttpRemoteGateway {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl HttpRemoteGateway {
    pub fn new(config: &ApiConfig, token: impl Into<String>) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    async fn download(
        &self,
        resource: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<RemoteRecord>, AppError> {
        let url = format!("{}/sync/download/{}", self.base_url, resource);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .query(query)
            .send()
            .await?
            .error_for_status()?;

        let body: DownloadBody = response
            .json()
            .await
            .map_err(|e| AppError::Network(format!("malformed download response: {e}")))?;

        if !body.success {
            return Err(AppError::Network(format!(
                "server reported failure downloading {resource}"
            )));
        }

        let total = body.data.len();
        let records: Vec<RemoteRecord> = body
            .data
            .into_iter()
            .filter_map(RemoteRecord::from_value)
            .collect();
        if records.len() < total {
            tracing::warn!(
                target: "sync::api",
                resource,
                skipped = total - records.len(),
                "dropped downloaded records without an id"
            );
        }

        Ok(records)
    }
}

#[async_trait]
impl RemoteGateway for HttpRemoteGateway {
    async fn upload_grades(
        &self,
        grades: &[serde_json::Value],
    ) -> Result<UploadChunkResponse, AppError> {
        let url = format!("{}/sync/upload", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&json!({ "grades": grades }))
            .send()
            .await?
            .error_for_status()?;

        let body: UploadBody = response
            .json()
            .await
            .map_err(|e| AppError::Network(format!("malformed upload response: {e}")))?;

        Ok(body.response)
    }

    async fn fetch_institution(&self) -> Result<Vec<RemoteRecord>, AppError> {
        self.download("institution", &[]).await
    }

    async fn fetch_class_sections(&self) -> Result<Vec<RemoteRecord>, AppError> {
        self.download("class-sections", &[]).await
    }

    async fn fetch_assigned_subjects(&self) -> Result<Vec<RemoteRecord>, AppError> {
        self.download("assigned-subjects", &[]).await
    }

    async fn fetch_students(
        &self,
        class_section_ids: &[String],
    ) -> Result<Vec<RemoteRecord>, AppError> {
        self.download(
            "students",
            &[("class_section_id", class_section_ids.join(","))],
        )
        .await
    }

    async fn fetch_gradable_items(
        &self,
        subject_ids: &[String],
    ) -> Result<Vec<RemoteRecord>, AppError> {
        self.download("gradable-items", &[("subject_id", subject_ids.join(","))])
            .await
    }

    async fn fetch_running_grades(
        &self,
        class_section_ids: &[String],
    ) -> Result<Vec<RemoteRecord>, AppError> {
        self.download(
            "running-grades",
            &[("class_section_id", class_section_ids.join(","))],
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_body_parses_all_three_subsets() {
        let raw = r#"{
            "success": true,
            "synced": ["g-1"],
            "failed": [{"data": {"id": "g-2"}, "error": "score out of range"}],
            "conflicts": [{"data": {"id": "g-3"}, "message": "modified upstream"}]
        }"#;

        let body: UploadBody = serde_json::from_str(raw).unwrap();
        assert_eq!(body.response.synced, vec!["g-1"]);
        assert_eq!(body.response.failed.len(), 1);
        assert_eq!(body.response.failed[0].error, "score out of range");
        assert_eq!(body.response.conflicts.len(), 1);
        assert_eq!(body.response.conflicts[0].message, "modified upstream");
    }

    #[test]
    fn upload_body_tolerates_missing_subsets() {
        let body: UploadBody = serde_json::from_str(r#"{"success": true}"#).unwrap();
        assert!(body.response.synced.is_empty());
        assert!(body.response.failed.is_empty());
        assert!(body.response.conflicts.is_empty());
    }

    #[test]
    fn download_body_defaults_to_empty_data() {
        let body: DownloadBody =
            serde_json::from_str(r#"{"success": true, "timestamp": 1725000000}"#).unwrap();
        assert!(body.success);
        assert!(body.data.is_empty());
    }

    #[test]
    fn gateway_normalizes_trailing_slash() {
        let config = ApiConfig {
            base_url: "https://example.test/api/".to_string(),
            request_timeout: 5,
        };
        let gateway = HttpRemoteGateway::new(&config, "token").unwrap();
        assert_eq!(gateway.base_url, "https://example.test/api");
    }
}
