use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};

use crate::core::config::{Settings, UpstreamSettings};
use crate::schemas::upstream::TestDto;
use crate::services::UpstreamError;

/// Source of test definitions. The HTTP implementation talks to the exam
/// bank; tests swap in a scripted one.
#[async_trait]
pub(crate) trait TestSource: Send + Sync {
    async fn fetch_test(&self, test_id: &str) -> Result<TestDto, UpstreamError>;
}

#[derive(Debug, Clone)]
pub(crate) struct HttpTestBank {
    client: Client,
    upstream: UpstreamSettings,
}

impl HttpTestBank {
    pub(crate) fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let upstream = settings.upstream().clone();
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(upstream.connect_timeout_seconds))
            .timeout(Duration::from_secs(upstream.request_timeout_seconds))
            .build()?;

        Ok(Self { client, upstream })
    }
}

#[async_trait]
impl TestSource for HttpTestBank {
    async fn fetch_test(&self, test_id: &str) -> Result<TestDto, UpstreamError> {
        let url = self.upstream.endpoint(&format!("api/tests/{test_id}"));

        let mut request = self.client.get(&url);
        if !self.upstream.api_key.is_empty() {
            request = request.bearer_auth(&self.upstream.api_key);
        }

        let response =
            request.send().await.map_err(|err| UpstreamError::Transport(err.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(UpstreamError::TestNotFound(test_id.to_string()));
        }
        if !response.status().is_success() {
            return Err(UpstreamError::Status(response.status().as_u16()));
        }

        response.json::<TestDto>().await.map_err(|err| UpstreamError::Payload(err.to_string()))
    }
}
