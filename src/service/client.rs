use std::collections::HashMap;
use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response};

use super::error::ServiceError;
use super::types::{
    ArtifactListResponse, ArtifactStatus, ArtifactSummary, CreateArtifactRequest,
    CreateArtifactResponse, QueryRequest, QueryResponse, RenameRequest,
};
use super::{GenerationService, QueryService};
use crate::state_machine::ArtifactKind;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8750/api";

/// HTTP/JSON adapter for the notebook studio service.
pub struct StudioClient {
    api_key: String,
    client: Client,
    base_url: String,
}

impl StudioClient {
    pub fn new(api_key: String, base_url: String, timeout: Duration) -> Result<Self, ServiceError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            api_key,
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn authorized(&self, req: RequestBuilder) -> RequestBuilder {
        if self.api_key.is_empty() {
            req
        } else {
            req.bearer_auth(&self.api_key)
        }
    }

    async fn send(&self, req: RequestBuilder) -> Result<Response, ServiceError> {
        let response = self.authorized(req).send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after_ms = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(|secs| secs.saturating_mul(1000))
                .unwrap_or(1000);
            let message = response.text().await.unwrap_or_default();
            return Err(ServiceError::RateLimited {
                retry_after_ms,
                message,
            });
        }

        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(ServiceError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response)
    }

    /// Every artifact in the notebook with its current title.
    pub async fn list_artifacts(&self, target_id: &str) -> Result<Vec<ArtifactSummary>, ServiceError> {
        let url = format!("{}/notebooks/{target_id}/artifacts", self.base_url);
        let body = self
            .send(self.client.get(url))
            .await?
            .json::<ArtifactListResponse>()
            .await?;
        Ok(body.artifacts)
    }
}

impl QueryService for StudioClient {
    async fn query(&self, target_id: &str, prompt: &str) -> Result<String, ServiceError> {
        let url = format!("{}/notebooks/{target_id}/query", self.base_url);
        let req = QueryRequest {
            prompt: prompt.to_string(),
        };
        let body = self
            .send(self.client.post(url).json(&req))
            .await?
            .json::<QueryResponse>()
            .await?;
        Ok(body.answer)
    }
}

impl GenerationService for StudioClient {
    async fn create(
        &self,
        target_id: &str,
        kind: ArtifactKind,
        focus_label: &str,
    ) -> Result<String, ServiceError> {
        let url = format!("{}/notebooks/{target_id}/artifacts", self.base_url);
        let req = CreateArtifactRequest {
            kind: kind.service_kind().to_string(),
            focus: focus_label.to_string(),
        };
        let body = self
            .send(self.client.post(url).json(&req))
            .await?
            .json::<CreateArtifactResponse>()
            .await?;
        Ok(body.artifact_id)
    }

    async fn status_of(&self, target_id: &str) -> Result<HashMap<String, ArtifactStatus>, ServiceError> {
        let artifacts = self.list_artifacts(target_id).await?;
        Ok(artifacts.into_iter().map(|a| (a.id, a.status)).collect())
    }

    async fn rename(&self, artifact_id: &str, new_title: &str) -> Result<(), ServiceError> {
        let url = format!("{}/artifacts/{artifact_id}", self.base_url);
        let req = RenameRequest {
            title: new_title.to_string(),
        };
        self.send(self.client.patch(url).json(&req)).await?;
        Ok(())
    }
}
