use crate::error::{GardenReportError, Result};
use crate::insight::DEFAULT_FALLBACK_TEXT;
use crate::layout::PageGeometry;
use crate::schema::ActivityCategory;
use crate::trends::TrendConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InsightConfig {
    /// Narrative service URL. Without one, reports use the fallback text.
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub single_category_timeout_secs: u64,
    pub full_report_timeout_secs: u64,
    pub single_category_sample_rows: usize,
    /// Rows sent per category in the full report.
    pub full_report_sample_rows: usize,
    pub fallback_text: String,
}

impl Default for InsightConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            single_category_timeout_secs: 30,
            full_report_timeout_secs: 60,
            single_category_sample_rows: 50,
            full_report_sample_rows: 20,
            fallback_text: DEFAULT_FALLBACK_TEXT.to_string(),
        }
    }
}

impl InsightConfig {
    pub fn single_category_timeout(&self) -> Duration {
        Duration::from_secs(self.single_category_timeout_secs)
    }

    pub fn full_report_timeout(&self) -> Duration {
        Duration::from_secs(self.full_report_timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartConfig {
    pub width: u32,
    pub height: u32,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 320,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressConfig {
    pub tick_ms: u64,
    /// Pause before the first synthesis step so the host can show its
    /// loading state.
    pub start_delay_ms: u64,
    /// Highest simulated value before completion is confirmed.
    pub cap_percent: f64,
    pub single_category_base_ms: u64,
    pub full_report_base_ms: u64,
    pub per_category_ms: u64,
    pub per_record_ms: u64,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            tick_ms: 250,
            start_delay_ms: 100,
            cap_percent: 95.0,
            single_category_base_ms: 4_000,
            full_report_base_ms: 8_000,
            per_category_ms: 1_500,
            per_record_ms: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub trends: TrendConfig,
    pub layout: PageGeometry,
    pub insight: InsightConfig,
    pub charts: ChartConfig,
    pub progress: ProgressConfig,
    pub category_order: Vec<ActivityCategory>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            trends: TrendConfig::default(),
            layout: PageGeometry::default(),
            insight: InsightConfig::default(),
            charts: ChartConfig::default(),
            progress: ProgressConfig::default(),
            category_order: ActivityCategory::DECLARED_ORDER.to_vec(),
        }
    }
}

impl ReportConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: ReportConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        validate_trend_config(&self.trends)?;
        self.layout.validate()?;
        validate_insight_config(&self.insight)?;
        validate_progress_config(&self.progress)?;

        if self.charts.width == 0 || self.charts.height == 0 {
            return Err(GardenReportError::InvalidConfig(
                "charts.width and charts.height must be > 0".to_string(),
            ));
        }

        if self.category_order.is_empty() {
            return Err(GardenReportError::InvalidConfig(
                "category_order must list at least one category".to_string(),
            ));
        }
        let mut seen = self.category_order.clone();
        seen.sort();
        seen.dedup();
        if seen.len() != self.category_order.len() {
            return Err(GardenReportError::InvalidConfig(
                "category_order contains duplicates".to_string(),
            ));
        }

        Ok(())
    }
}

fn validate_trend_config(trends: &TrendConfig) -> Result<()> {
    let thresholds = std::iter::once(trends.default_threshold_pct)
        .chain(trends.category_thresholds.values().copied());
    for threshold in thresholds {
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(GardenReportError::InvalidConfig(format!(
                "trend threshold must be >= 0, got {}",
                threshold
            )));
        }
    }

    let rules = &trends.alerts;
    if !rules.irrigation_increase_pct.is_finite() || rules.irrigation_increase_pct < 0.0 {
        return Err(GardenReportError::InvalidConfig(format!(
            "alerts.irrigation_increase_pct must be >= 0, got {}",
            rules.irrigation_increase_pct
        )));
    }
    for (name, ratio) in [
        ("pest_surge_ratio", rules.pest_surge_ratio),
        ("pest_drop_ratio", rules.pest_drop_ratio),
    ] {
        if !ratio.is_finite() || ratio <= 0.0 {
            return Err(GardenReportError::InvalidConfig(format!(
                "alerts.{} must be > 0, got {}",
                name, ratio
            )));
        }
    }
    if rules.pest_drop_ratio >= rules.pest_surge_ratio {
        return Err(GardenReportError::InvalidConfig(
            "alerts.pest_drop_ratio must be below alerts.pest_surge_ratio".to_string(),
        ));
    }

    Ok(())
}

fn validate_insight_config(insight: &InsightConfig) -> Result<()> {
    if insight.single_category_timeout_secs == 0 || insight.full_report_timeout_secs == 0 {
        return Err(GardenReportError::InvalidConfig(
            "insight timeouts must be > 0".to_string(),
        ));
    }
    if insight.fallback_text.trim().is_empty() {
        return Err(GardenReportError::InvalidConfig(
            "insight.fallback_text must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_progress_config(progress: &ProgressConfig) -> Result<()> {
    if progress.tick_ms == 0 {
        return Err(GardenReportError::InvalidConfig(
            "progress.tick_ms must be > 0".to_string(),
        ));
    }
    if !(0.0..100.0).contains(&progress.cap_percent) {
        return Err(GardenReportError::InvalidConfig(format!(
            "progress.cap_percent must be in [0, 100), got {}",
            progress.cap_percent
        )));
    }
    Ok(())
}
