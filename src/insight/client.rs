use crate::error::{GardenReportError, Result};
use crate::insight::types::{InsightRequest, InsightResponse};
use crate::insight::NarrativeInsightService;
use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use std::time::Duration;

/// JSON-over-HTTP narrative service.
///
/// Posts the [`InsightRequest`] to `endpoint` and expects
/// `{"analysis": "..."}` back.
#[derive(Clone)]
pub struct HttpInsightService {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpInsightService {
    pub fn new(endpoint: impl Into<String>, request_timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key: None,
        })
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }
}

#[async_trait]
impl NarrativeInsightService for HttpInsightService {
    async fn analyze(&self, request: &InsightRequest) -> Result<InsightResponse> {
        debug!(
            "Posting narrative request '{}' with {} sections to {}",
            request.title,
            request.sections.len(),
            self.endpoint
        );

        let mut builder = self.client.post(&self.endpoint).json(request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let res = builder.send().await?;
        let status = res.status();

        if !status.is_success() {
            let err_text = res.text().await?;
            return Err(GardenReportError::Insight(format!(
                "service returned status {}: {}",
                status, err_text
            )));
        }

        let body = res.text().await?;
        serde_json::from_str::<InsightResponse>(&body).map_err(|e| {
            GardenReportError::Insight(format!("malformed response: {}", e))
        })
    }
}
