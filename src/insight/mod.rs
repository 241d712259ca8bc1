#[cfg(feature = "insight-http")]
pub mod client;
pub mod sanitize;
pub mod types;

#[cfg(feature = "insight-http")]
pub use client::*;
pub use sanitize::*;
pub use types::*;

use crate::config::InsightConfig;
use crate::error::{GardenReportError, Result};
use async_trait::async_trait;
use log::{info, warn};
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_FALLBACK_TEXT: &str = "Automatic analysis is not available right now. \
The tables and charts in this report summarize the recorded activity.";

#[async_trait]
pub trait NarrativeInsightService: Send + Sync {
    async fn analyze(&self, request: &InsightRequest) -> Result<InsightResponse>;
}

/// Service used when no endpoint is configured. Every call fails, so reports
/// carry the fallback text.
#[derive(Debug, Clone, Default)]
pub struct DisabledInsightService;

#[async_trait]
impl NarrativeInsightService for DisabledInsightService {
    async fn analyze(&self, _request: &InsightRequest) -> Result<InsightResponse> {
        Err(GardenReportError::Insight(
            "no narrative service configured".to_string(),
        ))
    }
}

/// Picks the service described by `config`: the HTTP transport when an
/// endpoint is set and the `insight-http` feature is on, otherwise
/// [`DisabledInsightService`].
pub fn service_from_config(config: &InsightConfig) -> Result<Arc<dyn NarrativeInsightService>> {
    match config.endpoint.as_deref() {
        #[cfg(feature = "insight-http")]
        Some(endpoint) => {
            let mut service = HttpInsightService::new(endpoint, config.full_report_timeout())?;
            if let Some(key) = &config.api_key {
                service = service.with_api_key(key.clone());
            }
            info!("Narrative insight service at {}", endpoint);
            Ok(Arc::new(service))
        }
        #[cfg(not(feature = "insight-http"))]
        Some(endpoint) => {
            warn!(
                "Narrative endpoint {} ignored: built without the insight-http feature",
                endpoint
            );
            Ok(Arc::new(DisabledInsightService))
        }
        None => Ok(Arc::new(DisabledInsightService)),
    }
}

#[derive(Clone)]
pub struct NarrativeInsightClient {
    service: Arc<dyn NarrativeInsightService>,
    fallback_text: String,
}

impl NarrativeInsightClient {
    pub fn new(service: Arc<dyn NarrativeInsightService>) -> Self {
        Self {
            service,
            fallback_text: DEFAULT_FALLBACK_TEXT.to_string(),
        }
    }

    pub fn with_fallback_text(mut self, text: impl Into<String>) -> Self {
        self.fallback_text = text.into();
        self
    }

    pub fn fallback_text(&self) -> &str {
        &self.fallback_text
    }

    /// Asks the service for an analysis, giving up after `limit`.
    ///
    /// Always resolves: timeouts, transport errors and empty answers yield
    /// the fallback text.
    pub async fn narrative(&self, request: &InsightRequest, limit: Duration) -> Narrative {
        let outcome = tokio::time::timeout(limit, self.service.analyze(request)).await;

        let failure = match outcome {
            Ok(Ok(response)) => {
                let text = sanitize_narrative(&response.analysis);
                if !text.is_empty() {
                    info!(
                        "Narrative for '{}' received ({} chars)",
                        request.title,
                        text.len()
                    );
                    return Narrative {
                        text,
                        fallback_reason: None,
                    };
                }
                "empty analysis".to_string()
            }
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!("timed out after {}s", limit.as_secs_f64()),
        };

        warn!(
            "Narrative for '{}' unavailable, using fallback: {}",
            request.title, failure
        );
        Narrative {
            text: self.fallback_text.clone(),
            fallback_reason: Some(failure),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(&'static str);

    #[async_trait]
    impl NarrativeInsightService for Fixed {
        async fn analyze(&self, _request: &InsightRequest) -> Result<InsightResponse> {
            Ok(InsightResponse {
                analysis: self.0.to_string(),
            })
        }
    }

    struct Hanging;

    #[async_trait]
    impl NarrativeInsightService for Hanging {
        async fn analyze(&self, _request: &InsightRequest) -> Result<InsightResponse> {
            std::future::pending::<Result<InsightResponse>>().await
        }
    }

    fn request() -> InsightRequest {
        InsightRequest {
            title: "Irrigation".to_string(),
            summary: "12 records".to_string(),
            sections: vec![InsightSection::new("Irrigation").with_metric("records", 12)],
        }
    }

    #[tokio::test]
    async fn test_successful_answer_is_sanitized() {
        let client = NarrativeInsightClient::new(Arc::new(Fixed("Consumo  de agua  estable ✅")));
        let narrative = client.narrative(&request(), Duration::from_secs(30)).await;
        assert_eq!(narrative.text, "Consumo de agua estable");
        assert!(!narrative.is_fallback());
    }

    #[tokio::test]
    async fn test_error_uses_fallback() {
        let client = NarrativeInsightClient::new(Arc::new(DisabledInsightService));
        let narrative = client.narrative(&request(), Duration::from_secs(30)).await;
        assert_eq!(narrative.text, DEFAULT_FALLBACK_TEXT);
        assert!(narrative.is_fallback());
    }

    #[tokio::test]
    async fn test_blank_answer_uses_fallback() {
        let client = NarrativeInsightClient::new(Arc::new(Fixed(" 🌧️ ")))
            .with_fallback_text("sin analisis");
        let narrative = client.narrative(&request(), Duration::from_secs(30)).await;
        assert_eq!(narrative.text, "sin analisis");
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_uses_fallback_within_bound() {
        let client = NarrativeInsightClient::new(Arc::new(Hanging));
        let started = tokio::time::Instant::now();
        let narrative = client.narrative(&request(), Duration::from_secs(30)).await;

        assert!(narrative.is_fallback());
        assert_eq!(narrative.text, DEFAULT_FALLBACK_TEXT);
        assert!(started.elapsed() <= Duration::from_secs(31));
    }

    #[tokio::test]
    async fn test_unconfigured_service_is_disabled() {
        let service = service_from_config(&InsightConfig::default()).unwrap();
        let narrative = NarrativeInsightClient::new(service)
            .narrative(&request(), Duration::from_secs(1))
            .await;
        assert!(narrative.is_fallback());
    }

    #[test]
    fn test_sample_rows_are_capped() {
        let columns = vec!["Date".to_string()];
        let rows: Vec<Vec<String>> = (0..80).map(|i| vec![i.to_string()]).collect();
        let section = InsightSection::new("Pest").with_sample(&columns, &rows, 20);
        assert_eq!(section.sample_rows.unwrap().len(), 20);

        let json = serde_json::to_value(InsightSection::new("General")).unwrap();
        assert!(json.get("columns").is_none());
    }
}
