//! HTTP client for the analysis backend.

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::{Client, Method, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::Instrument;

use super::error::{loggable_url, ApiError, Result};
use super::models::{
    HealthResponse, JobStatusResponse, StartAnalysisRequest, StartAnalysisResponse,
    UpdateJobStatusRequest, UpdateJobStatusResponse,
};
use super::JobBackend;
use crate::config::ApiConfig;
use crate::sanitize::mask_token;

/// Client for the analysis backend's JSON API.
pub struct AnalysisClient {
    client: Client,
    base_url: Url,
    token: Option<SecretString>,
    request_retries: u32,
    retry_backoff: Duration,
}

impl std::fmt::Debug for AnalysisClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisClient")
            .field("base_url", &loggable_url(&self.base_url))
            .field(
                "token",
                &self.token.as_ref().map(|t| mask_token(t.expose_secret())),
            )
            .field("request_retries", &self.request_retries)
            .finish()
    }
}

impl AnalysisClient {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| ApiError::InvalidUrl(format!("{}: {}", config.base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl(config.base_url.clone()));
        }

        let client = Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| ApiError::Client(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            token: config
                .api_token
                .as_ref()
                .map(|t| SecretString::from(t.clone())),
            request_retries: config.request_retries,
            retry_backoff: config.retry_backoff(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| ApiError::InvalidUrl(loggable_url(&self.base_url)))?;
            path.pop_if_empty().extend(segments);
        }
        Ok(url)
    }

    /// Sends one request and decodes a JSON response.
    async fn send_once<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        body: Option<&serde_json::Value>,
    ) -> Result<T> {
        let mut request = self.client.request(method, url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token.expose_secret());
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::status(status.as_u16(), &body));
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode(e.to_string()))
    }

    /// Sends a request, retrying transport failures up to `retries` times.
    async fn execute<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        body: Option<serde_json::Value>,
        retries: u32,
    ) -> Result<T> {
        let mut attempt = 0u32;
        loop {
            debug!("{} {}", method, loggable_url(&url));
            match self.send_once(method.clone(), url.clone(), body.as_ref()).await {
                Err(e) if e.is_retryable() && attempt < retries => {
                    attempt += 1;
                    let delay = self.retry_backoff * attempt;
                    warn!(
                        "{} {} failed ({}), retry {}/{} in {:?}",
                        method,
                        loggable_url(&url),
                        e,
                        attempt,
                        retries,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                result => return result,
            }
        }
    }

    fn to_body<B: serde::Serialize>(body: &B) -> Result<serde_json::Value> {
        serde_json::to_value(body).map_err(|e| ApiError::Decode(e.to_string()))
    }

    /// `POST /start-analysis`
    pub async fn start_analysis(
        &self,
        request: &StartAnalysisRequest,
    ) -> Result<StartAnalysisResponse> {
        let span = tracing::info_span!(
            "api.start_analysis",
            repo = %request.repo_name,
            analysis_type = %request.analysis_type
        );
        async {
            let url = self.endpoint(&["start-analysis"])?;
            let response: StartAnalysisResponse = self
                .execute(
                    Method::POST,
                    url,
                    Some(Self::to_body(request)?),
                    self.request_retries,
                )
                .await?;
            info!(
                "Analysis started for {}: backend job {}",
                request.repo_name, response.job_id
            );
            Ok::<_, ApiError>(response)
        }
        .instrument(span)
        .await
    }

    /// `GET /status/{job_id}`. Never retried here; the poller owns retries.
    pub async fn job_status(&self, job_id: &str) -> Result<JobStatusResponse> {
        let span = tracing::debug_span!("api.job_status", job_id = %job_id);
        async {
            let url = self.endpoint(&["status", job_id])?;
            self.execute(Method::GET, url, None, 0).await
        }
        .instrument(span)
        .await
    }

    /// `POST /update-job-status`
    pub async fn update_job_status(
        &self,
        request: &UpdateJobStatusRequest,
    ) -> Result<UpdateJobStatusResponse> {
        let span = tracing::info_span!(
            "api.update_job_status",
            job_id = %request.job_id,
            action = %request.action
        );
        async {
            let url = self.endpoint(&["update-job-status"])?;
            let response: UpdateJobStatusResponse = self
                .execute(
                    Method::POST,
                    url,
                    Some(Self::to_body(request)?),
                    self.request_retries,
                )
                .await?;
            info!("Sent '{}' for backend job {}", request.action, request.job_id);
            Ok::<_, ApiError>(response)
        }
        .instrument(span)
        .await
    }

    /// `GET /health`
    pub async fn health(&self) -> Result<HealthResponse> {
        let url = self.endpoint(&["health"])?;
        self.execute(Method::GET, url, None, self.request_retries)
            .instrument(tracing::debug_span!("api.health"))
            .await
    }
}

#[async_trait]
impl JobBackend for AnalysisClient {
    async fn start_analysis(&self, request: &StartAnalysisRequest) -> Result<StartAnalysisResponse> {
        AnalysisClient::start_analysis(self, request).await
    }

    async fn job_status(&self, job_id: &str) -> Result<JobStatusResponse> {
        AnalysisClient::job_status(self, job_id).await
    }

    async fn update_job_status(
        &self,
        request: &UpdateJobStatusRequest,
    ) -> Result<UpdateJobStatusResponse> {
        AnalysisClient::update_job_status(self, request).await
    }

    async fn health(&self) -> Result<HealthResponse> {
        AnalysisClient::health(self).await
    }
}
