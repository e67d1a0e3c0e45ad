//! HTTP client for the analysis service
//!
//! Routes are resolved against `service.base_url`:
//! - `POST /api/process-media` (multipart, field `mediaFiles`)
//! - `POST /api/process-media?action=chat`
//! - `POST /api/openai-questions`
//! - `POST /api/openai-format`
//! - `POST /api/process-media?action=cleanup`

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::ServiceConfig;
use crate::error::{Error, Result};
use crate::types::{MediaAsset, MimeCategory, QaPair};

use super::wire::{
    ChatRequest, ChatResponse, CleanupRequest, FormatRequest, FormatResponse, QuestionsRequest,
    QuestionsResponse, UploadResponse,
};
use super::MediaService;

const MEDIA_FIELD: &str = "mediaFiles";

/// reqwest-backed [`MediaService`]
pub struct HttpMediaService {
    http_client: reqwest::Client,
    base_url: String,
}

impl HttpMediaService {
    /// Create a new client from configuration
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: &ServiceConfig) -> Result<Self> {
        config.validate()?;

        let base_url = config.base_url.trim().trim_end_matches('/').to_string();

        let mut headers = HeaderMap::new();
        if let Some(api_key) = &config.api_key {
            let auth_value = format!("Bearer {}", api_key);
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&auth_value)
                    .map_err(|e| Error::Config(format!("invalid api_key: {}", e)))?,
            );
        }

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url,
        })
    }

    fn url(&self, route: &str) -> String {
        format!("{}{}", self.base_url, route)
    }

    /// POST a JSON body and decode a JSON response, mapping non-2xx to a
    /// transport error.
    async fn post_json<B, R>(&self, route: &str, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        let response = self
            .http_client
            .post(self.url(route))
            .json(body)
            .send()
            .await?;

        decode(response).await
    }
}

async fn decode<R: DeserializeOwned>(response: reqwest::Response) -> Result<R> {
    let status = response.status();

    if status.is_success() {
        response.json().await.map_err(|e| Error::Transport {
            status: Some(status.as_u16()),
            message: format!("failed to parse response: {}", e),
        })
    } else {
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "unknown".to_string());
        Err(Error::http(status, error_text))
    }
}

#[async_trait]
impl MediaService for HttpMediaService {
    async fn upload(&self, asset: &MediaAsset) -> Result<UploadResponse> {
        let part = Part::bytes(asset.payload.to_vec())
            .file_name(asset.display_name.clone())
            .mime_str(&asset.mime_type)
            .map_err(|e| Error::Upload(format!("invalid media type: {}", e)))?;
        let form = Form::new().part(MEDIA_FIELD, part);

        tracing::debug!(
            file = %asset.display_name,
            size_bytes = asset.size_bytes,
            "Uploading media"
        );

        let response = self
            .http_client
            .post(self.url("/api/process-media"))
            .multipart(form)
            .send()
            .await?;

        decode(response).await
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse> {
        self.post_json("/api/process-media?action=chat", request)
            .await
    }

    async fn generate_questions(
        &self,
        summary: &str,
        media_type: MimeCategory,
    ) -> Result<Vec<String>> {
        let body = QuestionsRequest {
            summary,
            media_type,
        };
        let response: QuestionsResponse = self.post_json("/api/openai-questions", &body).await?;
        Ok(response.questions)
    }

    async fn format_results(&self, qa_data: &[QaPair]) -> Result<String> {
        let body = FormatRequest { qa_data };
        let response: FormatResponse = self.post_json("/api/openai-format", &body).await?;
        Ok(response.result.unwrap_or_default())
    }

    async fn cleanup(&self, session_id: &str) -> Result<()> {
        let response = self
            .http_client
            .post(self.url("/api/process-media?action=cleanup"))
            .json(&CleanupRequest { session_id })
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown".to_string());
            Err(Error::http(status, error_text))
        }
    }
}
