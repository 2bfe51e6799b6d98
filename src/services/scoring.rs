use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::core::config::{Settings, UpstreamSettings};
use crate::schemas::upstream::{ScoredResultDto, SubmissionPayload};
use crate::services::UpstreamError;

/// Grading backend. Exactly one call per successful submission; the caller
/// owns the retry policy.
#[async_trait]
pub(crate) trait ScoringBackend: Send + Sync {
    async fn submit(&self, payload: &SubmissionPayload) -> Result<ScoredResultDto, UpstreamError>;
}

#[derive(Debug, Clone)]
pub(crate) struct HttpScoringClient {
    client: Client,
    upstream: UpstreamSettings,
}

impl HttpScoringClient {
    pub(crate) fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let upstream = settings.upstream().clone();
        // Scoring gets its own, longer deadline; grading a large submission
        // can outlast a plain fetch.
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(upstream.connect_timeout_seconds))
            .timeout(Duration::from_secs(upstream.scoring_timeout_seconds))
            .build()?;

        Ok(Self { client, upstream })
    }
}

#[async_trait]
impl ScoringBackend for HttpScoringClient {
    async fn submit(&self, payload: &SubmissionPayload) -> Result<ScoredResultDto, UpstreamError> {
        let url = self.upstream.endpoint("api/exam-results/submit-and-score");

        let mut request = self.client.post(&url).json(payload);
        if !self.upstream.api_key.is_empty() {
            request = request.bearer_auth(&self.upstream.api_key);
        }

        let response =
            request.send().await.map_err(|err| UpstreamError::Transport(err.to_string()))?;

        if !response.status().is_success() {
            return Err(UpstreamError::Status(response.status().as_u16()));
        }

        response
            .json::<ScoredResultDto>()
            .await
            .map_err(|err| UpstreamError::Payload(err.to_string()))
    }
}
