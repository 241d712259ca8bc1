//! # Garden Activity Reports
//!
//! Analytics and report synthesis for garden activity logs.
//!
//! ## Core Concepts
//!
//! - **Activity records**: timestamped, categorized log entries (irrigation, planting,
//!   harvest, fertilization, pest control, maintenance, general) with free-form units
//! - **Normalization**: quantities are converted to one base unit per dimension
//!   (mL, kg, minutes) before any aggregation
//! - **Trends**: month-over-month comparison of each category's aggregate, tagged as
//!   ascending, descending, stable or no-comparison, plus threshold alerts
//! - **Documents**: paginated, illustrated reports (cover, narrative, charts, tables)
//!   laid out on fixed-size pages and serialized as JSON
//!
//! ## Example
//!
//! ```rust,ignore
//! use garden_activity_reports::*;
//! use chrono::NaiveDate;
//! use std::sync::Arc;
//!
//! let records = load_records_json(&std::fs::read_to_string("records.json")?)?;
//! let orchestrator = ReportOrchestrator::from_config(
//!     ReportConfig::default(),
//!     Arc::new(InMemorySource::new(records)),
//! )?;
//!
//! let artifact = orchestrator
//!     .generate(&ReportRequest {
//!         garden_id: "g-42".to_string(),
//!         garden_name: "Huerto Comunitario".to_string(),
//!         reference_date: NaiveDate::from_ymd_opt(2024, 6, 30).unwrap(),
//!         start: None,
//!         end: None,
//!         kind: ReportKind::Full,
//!     })
//!     .await?;
//! artifact.write_to("reports").await?;
//! ```

pub mod chart;
pub mod config;
pub mod error;
pub mod filter;
pub mod ingestion;
pub mod insight;
pub mod layout;
pub mod orchestrator;
pub mod progress;
pub mod schema;
pub mod sections;
pub mod trends;
pub mod units;
pub mod utils;

pub use chart::{
    synthesize, ChartImage, ChartKind, ChartRenderer, ChartRequest, ChartSeries,
    RasterChartRenderer,
};
pub use config::{ChartConfig, InsightConfig, ProgressConfig, ReportConfig};
pub use error::{GardenReportError, Result};
pub use filter::{filter_records, group_by_category, RecordFilter};
pub use ingestion::{load_records_json, JsonFileSource};
pub use insight::{
    sanitize_narrative, service_from_config, DisabledInsightService, InsightRequest,
    InsightResponse, InsightSection, Narrative, NarrativeInsightClient, NarrativeInsightService,
    DEFAULT_FALLBACK_TEXT,
};
#[cfg(feature = "insight-http")]
pub use insight::HttpInsightService;
pub use layout::{
    stamp_footers, Document, DocumentBuilder, Element, Page, PageGeometry, PaginatedDocument,
};
pub use orchestrator::{
    ActivitySource, InMemorySource, LogNotifier, Notification, NotificationLevel, ReportArtifact,
    ReportKind, ReportNotifier, ReportOrchestrator, ReportRequest,
};
pub use progress::{ProgressSnapshot, ProgressTracker};
pub use schema::*;
pub use trends::{
    monthly_aggregates, summarize, Alert, AlertRules, AlertSeverity, CategorySummary,
    TrendAnalyzer, TrendConfig, TrendResult, TrendTag,
};
pub use units::{normalize, Dimension, Unit};
pub use utils::{slugify, MonthKey};

use chrono::NaiveDate;
use log::debug;

/// Trend of every category in `config.category_order`, skipping categories
/// without records up to `reference`.
pub fn analyze_garden(
    config: &ReportConfig,
    records: &[ActivityRecord],
    reference: Option<NaiveDate>,
) -> Result<Vec<TrendResult>> {
    config.validate()?;
    let analyzer = TrendAnalyzer::new(config.trends.clone());

    let trends: Vec<TrendResult> = config
        .category_order
        .iter()
        .filter_map(|c| analyzer.analyze(*c, records, reference))
        .collect();

    debug!(
        "Analyzed {} records: {} categories with data",
        records.len(),
        trends.len()
    );
    Ok(trends)
}
