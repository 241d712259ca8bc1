use crate::chart::{
    synthesize, ChartImage, ChartKind, ChartRenderer, ChartRequest, ChartSeries,
};
use crate::config::ChartConfig;
use crate::error::Result;
use crate::insight::InsightSection;
use crate::layout::DocumentBuilder;
use crate::schema::{ActivityCategory, ActivityRecord, ColorTheme, PestLevel};
use crate::trends::{
    monthly_aggregates, monthly_pest_levels, summarize, Alert, AlertSeverity, TrendResult,
};
use crate::units::{Dimension, Unit};

pub const NO_RECORDS_TEXT: &str = "No records for this period";
pub const CHART_UNAVAILABLE_TEXT: &str = "Chart unavailable for this section.";

#[derive(Debug, Clone, PartialEq)]
pub enum ChartSlot {
    NotApplicable,
    Rendered(ChartImage),
    Unavailable,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportSection {
    pub title: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub chart: ChartSlot,
    pub color_theme: ColorTheme,
    /// Short lines shown between the chart and the table.
    pub notes: Vec<String>,
}

pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{:.0}", value)
    } else {
        let text = format!("{:.2}", value);
        text.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

pub fn format_change(percent: Option<f64>) -> String {
    match percent {
        Some(p) => format!("{:+.1}%", p),
        None => "n/a".to_string(),
    }
}

fn base_unit_label(unit: Option<&str>) -> String {
    match unit.and_then(Unit::parse).map(|u| u.dimension()) {
        Some(Dimension::Volume) => "mL".to_string(),
        Some(Dimension::Mass) => "kg".to_string(),
        Some(Dimension::Duration) => "min".to_string(),
        None => unit.unwrap_or("").trim().to_string(),
    }
}

fn text_or_dash(value: Option<&String>) -> String {
    match value {
        Some(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => "-".to_string(),
    }
}

pub fn category_columns(category: ActivityCategory) -> Vec<String> {
    let columns: &[&str] = match category {
        ActivityCategory::Irrigation => &["Date", "Author", "Volume (mL)", "Method", "Notes"],
        ActivityCategory::Planting => &["Date", "Author", "Crop", "Quantity", "Notes"],
        ActivityCategory::Harvest => &["Date", "Author", "Crop", "Quantity", "Notes"],
        ActivityCategory::Fertilization => &["Date", "Author", "Product", "Dose (kg)", "Notes"],
        ActivityCategory::Pest => &["Date", "Author", "Species", "Level", "Treatment"],
        ActivityCategory::Maintenance => &["Date", "Author", "Task", "Duration (min)", "Notes"],
        ActivityCategory::General => &["Date", "Author", "Role", "Notes"],
    };
    columns.iter().map(|c| c.to_string()).collect()
}

fn category_row(record: &ActivityRecord) -> Vec<String> {
    let d = &record.details;
    let date = record.created_on().format("%Y-%m-%d").to_string();
    let author = record.author_display().to_string();
    let notes = record.content.trim().to_string();
    let value = format_number(record.normalized_value());

    match record.category {
        ActivityCategory::Irrigation => {
            vec![date, author, value, text_or_dash(d.method.as_ref()), notes]
        }
        ActivityCategory::Planting | ActivityCategory::Harvest => {
            let unit = base_unit_label(d.unit.as_deref());
            let quantity = if unit.is_empty() {
                value
            } else {
                format!("{} {}", value, unit)
            };
            vec![date, author, text_or_dash(d.crop.as_ref()), quantity, notes]
        }
        ActivityCategory::Fertilization => {
            vec![date, author, text_or_dash(d.product.as_ref()), value, notes]
        }
        ActivityCategory::Pest => vec![
            date,
            author,
            text_or_dash(d.pest_species.as_ref()),
            d.pest_level.map_or("-".to_string(), |l| l.label().to_string()),
            text_or_dash(d.treatment.as_ref()),
        ],
        ActivityCategory::Maintenance => {
            vec![date, author, text_or_dash(d.task.as_ref()), value, notes]
        }
        ActivityCategory::General => vec![
            date,
            author,
            format!("{:?}", record.author_role).to_lowercase(),
            notes,
        ],
    }
}

/// One row per record of `category`, oldest first.
pub fn category_rows(records: &[ActivityRecord], category: ActivityCategory) -> Vec<Vec<String>> {
    let mut selected: Vec<&ActivityRecord> =
        records.iter().filter(|r| r.category == category).collect();
    selected.sort_by_key(|r| r.created_at);
    selected.into_iter().map(category_row).collect()
}

pub fn chart_request(
    records: &[ActivityRecord],
    category: ActivityCategory,
    config: &ChartConfig,
) -> Option<ChartRequest> {
    if !category.has_chart() || !records.iter().any(|r| r.category == category) {
        return None;
    }
    let theme = category.color_theme();

    let (kind, labels, series) = if category == ActivityCategory::Pest {
        let levels = monthly_pest_levels(records);
        let labels = levels.iter().map(|(k, _)| k.label()).collect();
        let shades = [[250, 204, 21], [249, 115, 22], theme.primary];
        let series = PestLevel::ALL
            .iter()
            .enumerate()
            .map(|(i, level)| ChartSeries {
                name: level.label().to_string(),
                values: levels.iter().map(|(_, counts)| counts[i]).collect(),
                color: shades[i],
            })
            .collect();
        (ChartKind::StackedBar, labels, series)
    } else {
        let monthly = monthly_aggregates(records, category);
        let kind = match category {
            ActivityCategory::Planting | ActivityCategory::Harvest => ChartKind::Bar,
            _ => ChartKind::Line,
        };
        let labels = monthly.iter().map(|(k, _)| k.label()).collect();
        let series = vec![ChartSeries {
            name: category.metric_label().to_string(),
            values: monthly.iter().map(|(_, v)| *v).collect(),
            color: theme.primary,
        }];
        (kind, labels, series)
    };

    Some(ChartRequest {
        title: format!("{} by month", category.label()),
        labels,
        series,
        kind,
        width: config.width,
        height: config.height,
    })
}

fn trend_note(category: ActivityCategory, trend: &TrendResult) -> String {
    let current = format!(
        "{} ({}): {}",
        category.metric_label(),
        trend.current_month,
        format_number(trend.current_month_avg)
    );
    match (trend.previous_month, trend.previous_month_avg) {
        (Some(month), Some(value)) => format!(
            "{} | Previous ({}): {} | Change: {} | Trend: {}",
            current,
            month,
            format_number(value),
            format_change(trend.percent_change),
            trend.trend_tag.label()
        ),
        _ => format!("{} | Trend: {}", current, trend.trend_tag.label()),
    }
}

fn alert_note(alert: &Alert) -> String {
    let tag = match alert.severity {
        AlertSeverity::Success => "OK",
        AlertSeverity::Warning => "WARNING",
        AlertSeverity::Danger => "ALERT",
    };
    format!("[{}] {}", tag, alert.message)
}

/// Builds the section for one category. The chart, if any, is rendered here.
pub fn build_category_section(
    records: &[ActivityRecord],
    category: ActivityCategory,
    trend: Option<&TrendResult>,
    renderer: &dyn ChartRenderer,
    charts: &ChartConfig,
) -> ReportSection {
    let columns = category_columns(category);
    let mut rows = category_rows(records, category);
    if rows.is_empty() {
        let mut placeholder = vec![String::new(); columns.len()];
        placeholder[0] = NO_RECORDS_TEXT.to_string();
        rows.push(placeholder);
    }

    let chart = match chart_request(records, category, charts) {
        None => ChartSlot::NotApplicable,
        Some(request) => match synthesize(renderer, &request) {
            Some(image) => ChartSlot::Rendered(image),
            None => ChartSlot::Unavailable,
        },
    };

    let mut notes = Vec::new();
    if let Some(trend) = trend {
        notes.push(trend_note(category, trend));
        notes.extend(trend.alerts.iter().map(alert_note));
    }

    ReportSection {
        title: category.label().to_string(),
        columns,
        rows,
        chart,
        color_theme: category.color_theme(),
        notes,
    }
}

pub fn executive_summary(
    records: &[ActivityRecord],
    order: &[ActivityCategory],
    trends: &[(ActivityCategory, Option<TrendResult>)],
) -> ReportSection {
    let columns = [
        "Category", "Records", "Current", "Previous", "Change", "Trend", "Alerts",
    ]
    .iter()
    .map(|c| c.to_string())
    .collect();

    let rows = order
        .iter()
        .map(|category| {
            let summary = summarize(records, *category);
            let trend = trends
                .iter()
                .find(|(c, _)| c == category)
                .and_then(|(_, t)| t.as_ref());
            match trend {
                Some(t) => vec![
                    category.label().to_string(),
                    summary.count.to_string(),
                    format_number(t.current_month_avg),
                    t.previous_month_avg.map_or("-".to_string(), format_number),
                    format_change(t.percent_change),
                    t.trend_tag.label().to_string(),
                    t.alerts.len().to_string(),
                ],
                None => vec![
                    category.label().to_string(),
                    summary.count.to_string(),
                    "-".to_string(),
                    "-".to_string(),
                    "-".to_string(),
                    "-".to_string(),
                    "0".to_string(),
                ],
            }
        })
        .collect();

    ReportSection {
        title: "Executive summary".to_string(),
        columns,
        rows,
        chart: ChartSlot::NotApplicable,
        color_theme: ColorTheme {
            primary: [21, 128, 61],
            light: [240, 253, 244],
        },
        notes: Vec::new(),
    }
}

/// Metrics and sample rows for the narrative service.
pub fn insight_section(
    records: &[ActivityRecord],
    category: ActivityCategory,
    trend: Option<&TrendResult>,
    sample_rows: usize,
) -> InsightSection {
    let summary = summarize(records, category);
    let rows = category_rows(records, category);

    let mut section = InsightSection::new(category.label())
        .with_sample(&category_columns(category), &rows, sample_rows)
        .with_metric("records", summary.count)
        .with_metric("total", summary.total)
        .with_metric("average", summary.average);

    if let Some(t) = trend {
        section = section
            .with_metric("current_month", t.current_month.label())
            .with_metric("current_value", t.current_month_avg)
            .with_metric("trend", t.trend_tag.label());
        if let Some(previous) = t.previous_month_avg {
            section = section.with_metric("previous_value", previous);
        }
        if let Some(pct) = t.percent_change {
            section = section.with_metric("percent_change", pct);
        }
        if !t.alerts.is_empty() {
            let messages: Vec<String> = t.alerts.iter().map(|a| a.message.clone()).collect();
            section = section.with_metric("alerts", messages);
        }
    }

    section
}

/// Lays out heading, chart (or its placeholder), notes and table.
pub fn render_section(builder: &mut DocumentBuilder, section: &ReportSection) -> Result<()> {
    let geometry = builder.geometry().clone();
    let first_height = match section.chart {
        ChartSlot::Rendered(_) => geometry.chart_height,
        ChartSlot::Unavailable => geometry.line_height,
        ChartSlot::NotApplicable if !section.notes.is_empty() => geometry.line_height,
        ChartSlot::NotApplicable => geometry.row_height * 2.0,
    };
    builder.heading(&section.title, section.color_theme.primary, first_height)?;

    match &section.chart {
        ChartSlot::Rendered(image) => builder.chart(image.clone())?,
        ChartSlot::Unavailable => builder.chart_placeholder(CHART_UNAVAILABLE_TEXT)?,
        ChartSlot::NotApplicable => {}
    }

    for note in &section.notes {
        builder.paragraph(note)?;
    }
    if !section.notes.is_empty() {
        builder.spacer(geometry.line_height / 2.0);
    }

    builder.table(&section.columns, &section.rows, section.color_theme)
}
