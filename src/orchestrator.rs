use crate::chart::{ChartRenderer, RasterChartRenderer};
use crate::config::ReportConfig;
use crate::error::Result;
use crate::filter::{filter_records, group_by_category, RecordFilter};
use crate::insight::{
    service_from_config, InsightRequest, NarrativeInsightClient, NarrativeInsightService,
};
use crate::layout::{stamp_footers, Document, DocumentBuilder, PaginatedDocument};
use crate::progress::ProgressTracker;
use crate::schema::{ActivityCategory, ActivityRecord};
use crate::sections::{
    build_category_section, executive_summary, format_change, format_number, insight_section,
    render_section,
};
use crate::trends::{TrendAnalyzer, TrendResult};
use crate::utils::slugify;
use async_trait::async_trait;
use chrono::NaiveDate;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Read access to a garden's activity log.
#[async_trait]
pub trait ActivitySource: Send + Sync {
    async fn records_for_garden(&self, garden_id: &str) -> Result<Vec<ActivityRecord>>;
}

#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    records: Vec<ActivityRecord>,
}

impl InMemorySource {
    pub fn new(records: Vec<ActivityRecord>) -> Self {
        Self { records }
    }
}

#[async_trait]
impl ActivitySource for InMemorySource {
    async fn records_for_garden(&self, garden_id: &str) -> Result<Vec<ActivityRecord>> {
        Ok(self
            .records
            .iter()
            .filter(|r| r.garden_id == garden_id)
            .cloned()
            .collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Info,
    Success,
    Error,
}

/// Transient message for the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
}

pub trait ReportNotifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Writes notifications to the log.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

impl ReportNotifier for LogNotifier {
    fn notify(&self, notification: Notification) {
        match notification.level {
            NotificationLevel::Error => error!("{}", notification.message),
            _ => info!("{}", notification.message),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "category")]
pub enum ReportKind {
    Category(ActivityCategory),
    Full,
}

impl ReportKind {
    fn action(&self) -> String {
        match self {
            ReportKind::Category(c) => format!("{} report", c.label().to_lowercase()),
            ReportKind::Full => "full garden report".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRequest {
    pub garden_id: String,
    pub garden_name: String,
    /// Anchors the current month of every trend and the file name.
    pub reference_date: NaiveDate,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub kind: ReportKind,
}

impl ReportRequest {
    pub fn document_name(&self) -> String {
        let garden = slugify(&self.garden_name);
        let date = self.reference_date.format("%Y-%m-%d");
        match self.kind {
            ReportKind::Category(c) => format!("{}_{}_{}", c.slug(), garden, date),
            ReportKind::Full => format!("reporte_completo_huerto_{}_{}", garden, date),
        }
    }

    fn period_label(&self) -> String {
        match (self.start, self.end) {
            (Some(s), Some(e)) => format!("{} to {}", s, e),
            (Some(s), None) => format!("from {}", s),
            (None, Some(e)) => format!("up to {}", e),
            (None, None) => "all records".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportArtifact {
    pub file_name: String,
    pub document: Document,
    pub bytes: Vec<u8>,
}

impl ReportArtifact {
    /// Writes the serialized document into `dir`, creating it if needed.
    pub async fn write_to(&self, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let dir = dir.as_ref();
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(&self.file_name);
        tokio::fs::write(&path, &self.bytes).await?;
        info!("Report written to {}", path.display());
        Ok(path)
    }
}

pub struct ReportOrchestrator {
    config: ReportConfig,
    source: Arc<dyn ActivitySource>,
    insight: NarrativeInsightClient,
    renderer: Arc<dyn ChartRenderer>,
    notifier: Arc<dyn ReportNotifier>,
    analyzer: TrendAnalyzer,
    progress: ProgressTracker,
}

impl ReportOrchestrator {
    pub fn new(
        config: ReportConfig,
        source: Arc<dyn ActivitySource>,
        insight_service: Arc<dyn NarrativeInsightService>,
    ) -> Result<Self> {
        config.validate()?;
        let insight = NarrativeInsightClient::new(insight_service)
            .with_fallback_text(config.insight.fallback_text.clone());

        Ok(Self {
            analyzer: TrendAnalyzer::new(config.trends.clone()),
            progress: ProgressTracker::new(config.progress.clone()),
            insight,
            source,
            renderer: Arc::new(RasterChartRenderer::default()),
            notifier: Arc::new(LogNotifier),
            config,
        })
    }

    /// Builds the narrative service from `config.insight`.
    pub fn from_config(config: ReportConfig, source: Arc<dyn ActivitySource>) -> Result<Self> {
        let service = service_from_config(&config.insight)?;
        Self::new(config, source, service)
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn ChartRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn ReportNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn config(&self) -> &ReportConfig {
        &self.config
    }

    pub fn progress(&self) -> &ProgressTracker {
        &self.progress
    }

    /// Host teardown: stops the progress timer.
    pub fn shutdown(&self) {
        self.progress.shutdown();
    }

    pub async fn generate(&self, request: &ReportRequest) -> Result<ReportArtifact> {
        match self.run(request).await {
            Ok(artifact) => {
                self.progress.complete();
                self.notifier.notify(Notification {
                    level: NotificationLevel::Success,
                    message: format!("Report ready: {}", artifact.file_name),
                });
                Ok(artifact)
            }
            Err(e) => {
                error!(
                    "Generating {} for garden {} failed: {}",
                    request.kind.action(),
                    request.garden_id,
                    e
                );
                self.progress.fail();
                self.notifier.notify(Notification {
                    level: NotificationLevel::Error,
                    message: format!(
                        "Could not generate the {}. Please try again.",
                        request.kind.action()
                    ),
                });
                Err(e)
            }
        }
    }

    async fn run(&self, request: &ReportRequest) -> Result<ReportArtifact> {
        if let (Some(start), Some(end)) = (request.start, request.end) {
            if start > end {
                warn!(
                    "Start date {} is after end date {}, no records will match",
                    start, end
                );
            }
        }

        let all = self.source.records_for_garden(&request.garden_id).await?;
        let mut filter = RecordFilter::default().between(request.start, request.end);
        if let ReportKind::Category(c) = request.kind {
            filter.category = Some(c);
        }
        let records = filter_records(&all, &filter);

        let categories = match request.kind {
            ReportKind::Category(_) => 1,
            ReportKind::Full => self.config.category_order.len(),
        };
        let full = request.kind == ReportKind::Full;
        self.progress
            .start(self.progress.estimate(full, categories, records.len()));
        info!(
            "Generating {} for garden {} ({} records, {})",
            request.kind.action(),
            request.garden_id,
            records.len(),
            request.period_label()
        );

        tokio::time::sleep(Duration::from_millis(self.config.progress.start_delay_ms)).await;

        let name = request.document_name();
        let content = match request.kind {
            ReportKind::Category(c) => self.compose_category(request, c, &records).await?,
            ReportKind::Full => self.compose_full(request, &records).await?,
        };
        let document = stamp_footers(content, name.clone());
        let bytes = document.to_json_bytes()?;

        info!(
            "Report {} composed: {} pages, {} bytes",
            name,
            document.page_count(),
            bytes.len()
        );

        Ok(ReportArtifact {
            file_name: format!("{}.json", name),
            document,
            bytes,
        })
    }

    fn cover(
        &self,
        builder: &mut DocumentBuilder,
        title: &str,
        request: &ReportRequest,
        count: usize,
    ) -> Result<()> {
        builder.title(title)?;
        builder.text_line(&format!("Garden: {}", request.garden_name))?;
        builder.text_line(&format!("Period: {}", request.period_label()))?;
        builder.text_line(&format!("Reference date: {}", request.reference_date))?;
        builder.text_line(&format!("Records: {}", count))?;
        builder.spacer(builder.geometry().line_height);
        Ok(())
    }

    fn trend(
        &self,
        category: ActivityCategory,
        records: &[ActivityRecord],
        reference: NaiveDate,
    ) -> Option<TrendResult> {
        self.analyzer.analyze(category, records, Some(reference))
    }

    async fn narrative_block(
        &self,
        builder: &mut DocumentBuilder,
        request: InsightRequest,
        limit: Duration,
    ) -> Result<()> {
        let narrative = self.insight.narrative(&request, limit).await;
        let geometry = builder.geometry().clone();
        builder.heading("Analysis", [21, 128, 61], geometry.line_height)?;
        builder.paragraph(&narrative.text)
    }

    async fn compose_category(
        &self,
        request: &ReportRequest,
        category: ActivityCategory,
        records: &[ActivityRecord],
    ) -> Result<PaginatedDocument> {
        let title = format!("{} report", category.label());
        let mut builder = DocumentBuilder::new(
            self.config.layout.clone(),
            Some(format!("{} | {}", request.garden_name, title)),
        );
        self.cover(&mut builder, &title, request, records.len())?;

        let trend = self.trend(category, records, request.reference_date);
        let insight_request = InsightRequest {
            title: format!("{} activity in {}", category.label(), request.garden_name),
            summary: trend_summary(category, records.len(), trend.as_ref()),
            sections: vec![insight_section(
                records,
                category,
                trend.as_ref(),
                self.config.insight.single_category_sample_rows,
            )],
        };
        self.narrative_block(
            &mut builder,
            insight_request,
            self.config.insight.single_category_timeout(),
        )
        .await?;

        builder.page_break();
        let section = build_category_section(
            records,
            category,
            trend.as_ref(),
            self.renderer.as_ref(),
            &self.config.charts,
        );
        render_section(&mut builder, &section)?;
        self.progress_note(category);

        Ok(builder.finish())
    }

    async fn compose_full(
        &self,
        request: &ReportRequest,
        records: &[ActivityRecord],
    ) -> Result<PaginatedDocument> {
        let title = "Full garden report";
        let mut builder = DocumentBuilder::new(
            self.config.layout.clone(),
            Some(format!("{} | {}", request.garden_name, title)),
        );
        self.cover(&mut builder, title, request, records.len())?;

        let order = &self.config.category_order;
        let groups = group_by_category(records, order);
        let trends: Vec<(ActivityCategory, Option<TrendResult>)> = groups
            .iter()
            .map(|(c, group)| (*c, self.trend(*c, group, request.reference_date)))
            .collect();

        render_section(&mut builder, &executive_summary(records, order, &trends))?;
        builder.spacer(builder.geometry().line_height);

        let summary = groups
            .iter()
            .zip(&trends)
            .map(|((c, group), (_, t))| trend_summary(*c, group.len(), t.as_ref()))
            .collect::<Vec<_>>()
            .join(" ");
        let insight_request = InsightRequest {
            title: format!("Activity overview for {}", request.garden_name),
            summary,
            sections: groups
                .iter()
                .zip(&trends)
                .map(|((c, group), (_, t))| {
                    insight_section(
                        group,
                        *c,
                        t.as_ref(),
                        self.config.insight.full_report_sample_rows,
                    )
                })
                .collect(),
        };
        self.narrative_block(
            &mut builder,
            insight_request,
            self.config.insight.full_report_timeout(),
        )
        .await?;

        for ((category, group), (_, trend)) in groups.iter().zip(&trends) {
            builder.page_break();
            let section = build_category_section(
                group,
                *category,
                trend.as_ref(),
                self.renderer.as_ref(),
                &self.config.charts,
            );
            render_section(&mut builder, &section)?;
            self.progress_note(*category);
            tokio::task::yield_now().await;
        }

        Ok(builder.finish())
    }

    fn progress_note(&self, category: ActivityCategory) {
        debug!(
            "Section {} laid out, progress at {:.0}%",
            category.slug(),
            self.progress.value()
        );
    }
}

fn trend_summary(category: ActivityCategory, count: usize, trend: Option<&TrendResult>) -> String {
    match trend {
        None => format!("{}: {} records.", category.label(), count),
        Some(t) => match t.previous_month_avg {
            Some(previous) => format!(
                "{}: {} records, {} {} in {} against {} in {} ({}).",
                category.label(),
                count,
                category.metric_label(),
                format_number(t.current_month_avg),
                t.current_month,
                format_number(previous),
                t.previous_month.map(|m| m.label()).unwrap_or_default(),
                format_change(t.percent_change)
            ),
            None => format!(
                "{}: {} records, {} {} in {}, no earlier month to compare.",
                category.label(),
                count,
                category.metric_label(),
                format_number(t.current_month_avg),
                t.current_month
            ),
        },
    }
}
