use crate::schema::{ActivityCategory, ActivityRecord, Aggregation, PestLevel};
use crate::utils::{months_between, MonthKey};
use chrono::{NaiveDate, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DEFAULT_TREND_THRESHOLD_PCT: f64 = 10.0;
pub const DEFAULT_IRRIGATION_INCREASE_PCT: f64 = 50.0;
pub const DEFAULT_PEST_SURGE_RATIO: f64 = 2.0;
pub const DEFAULT_PEST_DROP_RATIO: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrendTag {
    Ascending,
    Descending,
    Stable,
    NoComparison,
}

impl TrendTag {
    pub fn label(&self) -> &'static str {
        match self {
            TrendTag::Ascending => "Ascending",
            TrendTag::Descending => "Descending",
            TrendTag::Stable => "Stable",
            TrendTag::NoComparison => "No comparison",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Success,
    Warning,
    Danger,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub category: ActivityCategory,
    pub severity: AlertSeverity,
    pub message: String,
}

/// Thresholds behind the category alerts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertRules {
    /// Irrigation volume increase (percent) above which a warning is raised.
    pub irrigation_increase_pct: f64,
    /// Pest incidents above `previous * ratio` raise a danger alert.
    pub pest_surge_ratio: f64,
    /// Pest incidents below `previous * ratio` raise a success alert.
    pub pest_drop_ratio: f64,
}

impl Default for AlertRules {
    fn default() -> Self {
        Self {
            irrigation_increase_pct: DEFAULT_IRRIGATION_INCREASE_PCT,
            pest_surge_ratio: DEFAULT_PEST_SURGE_RATIO,
            pest_drop_ratio: DEFAULT_PEST_DROP_RATIO,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendConfig {
    /// Percent change beyond which a category is tagged ascending/descending.
    pub default_threshold_pct: f64,
    pub category_thresholds: BTreeMap<ActivityCategory, f64>,
    pub alerts: AlertRules,
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            default_threshold_pct: DEFAULT_TREND_THRESHOLD_PCT,
            category_thresholds: BTreeMap::new(),
            alerts: AlertRules::default(),
        }
    }
}

impl TrendConfig {
    pub fn threshold_for(&self, category: ActivityCategory) -> f64 {
        self.category_thresholds
            .get(&category)
            .copied()
            .unwrap_or(self.default_threshold_pct)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MonthBucket {
    pub key: MonthKey,
    pub records: Vec<ActivityRecord>,
}

impl MonthBucket {
    pub fn aggregate(&self, aggregation: Aggregation) -> f64 {
        let values = self.records.iter().map(|r| r.normalized_value());
        match aggregation {
            Aggregation::Count => self.records.len() as f64,
            Aggregation::Sum => values.sum(),
            Aggregation::Average => {
                if self.records.is_empty() {
                    0.0
                } else {
                    values.sum::<f64>() / self.records.len() as f64
                }
            }
        }
    }
}

/// Groups records into calendar months, oldest first. Order inside a bucket
/// follows the input order.
pub fn bucket_by_month(records: &[ActivityRecord]) -> Vec<MonthBucket> {
    let mut grouped: BTreeMap<MonthKey, Vec<ActivityRecord>> = BTreeMap::new();
    for record in records {
        grouped
            .entry(MonthKey::of(record.created_on()))
            .or_default()
            .push(record.clone());
    }

    grouped
        .into_iter()
        .map(|(key, records)| MonthBucket { key, records })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub enum BucketState {
    NoData,
    SingleMonth(MonthBucket),
    MultiMonth {
        previous: MonthBucket,
        current: MonthBucket,
    },
}

impl BucketState {
    /// Advances the state with the next (newer) bucket.
    pub fn push(self, bucket: MonthBucket) -> Self {
        match self {
            BucketState::NoData => BucketState::SingleMonth(bucket),
            BucketState::SingleMonth(previous) => BucketState::MultiMonth {
                previous,
                current: bucket,
            },
            BucketState::MultiMonth { current, .. } => BucketState::MultiMonth {
                previous: current,
                current: bucket,
            },
        }
    }

    pub fn from_buckets(buckets: Vec<MonthBucket>) -> Self {
        buckets
            .into_iter()
            .fold(BucketState::NoData, BucketState::push)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendResult {
    pub category: ActivityCategory,
    pub aggregation: Aggregation,
    pub current_month: MonthKey,
    pub previous_month: Option<MonthKey>,
    /// Category aggregate for the current month (average, count or sum).
    pub current_month_avg: f64,
    pub previous_month_avg: Option<f64>,
    /// `None` when the previous month aggregates to zero.
    pub percent_change: Option<f64>,
    pub trend_tag: TrendTag,
    pub alerts: Vec<Alert>,
    pub current_count: usize,
    pub previous_count: Option<usize>,
}

pub struct TrendAnalyzer {
    config: TrendConfig,
}

impl TrendAnalyzer {
    pub fn new(config: TrendConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrendConfig {
        &self.config
    }

    /// Computes the month-over-month trend of `category`.
    ///
    /// `reference` defaults to the latest record date. Months after the
    /// reference month are ignored. Returns `None` when nothing is left.
    pub fn analyze(
        &self,
        category: ActivityCategory,
        records: &[ActivityRecord],
        reference: Option<NaiveDate>,
    ) -> Option<TrendResult> {
        let reference = reference
            .or_else(|| records.iter().map(|r| r.created_on()).max())
            .unwrap_or_else(|| Utc::now().date_naive());
        let reference_month = MonthKey::of(reference);

        let relevant: Vec<ActivityRecord> = records
            .iter()
            .filter(|r| r.category == category && MonthKey::of(r.created_on()) <= reference_month)
            .cloned()
            .collect();

        let aggregation = category.aggregation();
        let state = BucketState::from_buckets(bucket_by_month(&relevant));

        match state {
            BucketState::NoData => {
                debug!("No {} records up to {}", category.slug(), reference_month);
                None
            }
            BucketState::SingleMonth(bucket) => Some(TrendResult {
                category,
                aggregation,
                current_month: bucket.key,
                previous_month: None,
                current_month_avg: bucket.aggregate(aggregation),
                previous_month_avg: None,
                percent_change: Some(0.0),
                trend_tag: TrendTag::NoComparison,
                alerts: Vec::new(),
                current_count: bucket.records.len(),
                previous_count: None,
            }),
            BucketState::MultiMonth { previous, current } => {
                let gap = months_between(previous.key.first_day(), current.key.first_day());
                if gap > 1 {
                    debug!(
                        "{}: comparing {} with {}, {} months apart",
                        category.slug(),
                        current.key,
                        previous.key,
                        gap
                    );
                }
                let previous_value = previous.aggregate(aggregation);
                let current_value = current.aggregate(aggregation);

                let percent_change = if previous_value == 0.0 {
                    None
                } else {
                    Some((current_value - previous_value) / previous_value * 100.0)
                };

                let trend_tag = match percent_change {
                    None => TrendTag::NoComparison,
                    Some(pct) => {
                        let threshold = self.config.threshold_for(category);
                        if pct > threshold {
                            TrendTag::Ascending
                        } else if pct < -threshold {
                            TrendTag::Descending
                        } else {
                            TrendTag::Stable
                        }
                    }
                };

                let alerts = self.evaluate_alerts(
                    category,
                    previous.key,
                    previous_value,
                    current_value,
                    percent_change,
                );

                debug!(
                    "{} trend {} -> {}: {:.2} -> {:.2} ({:?})",
                    category.slug(),
                    previous.key,
                    current.key,
                    previous_value,
                    current_value,
                    trend_tag
                );

                Some(TrendResult {
                    category,
                    aggregation,
                    current_month: current.key,
                    previous_month: Some(previous.key),
                    current_month_avg: current_value,
                    previous_month_avg: Some(previous_value),
                    percent_change,
                    trend_tag,
                    alerts,
                    current_count: current.records.len(),
                    previous_count: Some(previous.records.len()),
                })
            }
        }
    }

    fn evaluate_alerts(
        &self,
        category: ActivityCategory,
        previous_month: MonthKey,
        previous: f64,
        current: f64,
        percent_change: Option<f64>,
    ) -> Vec<Alert> {
        let rules = &self.config.alerts;
        let mut alerts = Vec::new();

        match category {
            ActivityCategory::Irrigation => {
                if let Some(pct) = percent_change {
                    if pct > rules.irrigation_increase_pct {
                        alerts.push(Alert {
                            category,
                            severity: AlertSeverity::Warning,
                            message: format!(
                                "Irrigation volume rose {:.0}% compared with {}. \
                                 Check for leaks or overwatering.",
                                pct, previous_month
                            ),
                        });
                    }
                }
            }
            ActivityCategory::Pest => {
                if current > previous * rules.pest_surge_ratio {
                    alerts.push(Alert {
                        category,
                        severity: AlertSeverity::Danger,
                        message: format!(
                            "Pest incidents went from {} to {}. Consider a treatment plan.",
                            previous, current
                        ),
                    });
                } else if previous > 0.0 && current < previous * rules.pest_drop_ratio {
                    alerts.push(Alert {
                        category,
                        severity: AlertSeverity::Success,
                        message: format!(
                            "Pest incidents dropped from {} to {}. \
                             Current control measures are working.",
                            previous, current
                        ),
                    });
                }
            }
            _ => {}
        }

        alerts
    }
}

/// Ordered (date, normalized value) pairs for one category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryMetricSeries {
    pub category: ActivityCategory,
    pub points: Vec<(NaiveDate, f64)>,
}

pub fn metric_series(
    records: &[ActivityRecord],
    category: ActivityCategory,
) -> CategoryMetricSeries {
    let mut selected: Vec<&ActivityRecord> =
        records.iter().filter(|r| r.category == category).collect();
    selected.sort_by_key(|r| r.created_at);

    CategoryMetricSeries {
        category,
        points: selected
            .into_iter()
            .map(|r| (r.created_on(), r.normalized_value()))
            .collect(),
    }
}

/// Category aggregate for every month that has records, oldest first.
pub fn monthly_aggregates(
    records: &[ActivityRecord],
    category: ActivityCategory,
) -> Vec<(MonthKey, f64)> {
    let selected: Vec<ActivityRecord> = records
        .iter()
        .filter(|r| r.category == category)
        .cloned()
        .collect();

    bucket_by_month(&selected)
        .into_iter()
        .map(|b| (b.key, b.aggregate(category.aggregation())))
        .collect()
}

/// Pest incidents per month split by severity level (low, medium, high).
/// Records without a level count as low.
pub fn monthly_pest_levels(records: &[ActivityRecord]) -> Vec<(MonthKey, [f64; 3])> {
    let pests: Vec<ActivityRecord> = records
        .iter()
        .filter(|r| r.category == ActivityCategory::Pest)
        .cloned()
        .collect();

    bucket_by_month(&pests)
        .into_iter()
        .map(|bucket| {
            let mut counts = [0.0; 3];
            for record in &bucket.records {
                let level = record.details.pest_level.unwrap_or(PestLevel::Low);
                let idx = PestLevel::ALL.iter().position(|l| *l == level).unwrap_or(0);
                counts[idx] += 1.0;
            }
            (bucket.key, counts)
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySummary {
    pub category: ActivityCategory,
    pub count: usize,
    pub total: f64,
    pub average: f64,
    pub min: f64,
    pub max: f64,
    pub first: Option<NaiveDate>,
    pub last: Option<NaiveDate>,
}

pub fn summarize(records: &[ActivityRecord], category: ActivityCategory) -> CategorySummary {
    let series = metric_series(records, category);
    let values: Vec<f64> = series.points.iter().map(|(_, v)| *v).collect();
    let count = values.len();
    let total: f64 = values.iter().sum();

    CategorySummary {
        category,
        count,
        total,
        average: if count == 0 { 0.0 } else { total / count as f64 },
        min: if count == 0 {
            0.0
        } else {
            values.iter().copied().fold(f64::INFINITY, f64::min)
        },
        max: values.iter().copied().fold(0.0, f64::max),
        first: series.points.first().map(|(d, _)| *d),
        last: series.points.last().map(|(d, _)| *d),
    }
}
