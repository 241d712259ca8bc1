use crate::error::Result;
use crate::schema::{ActivityCategory, ActivityRecord};
use crate::utils::parse_period_string;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Selection criteria. Every bound is optional and inclusive.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordFilter {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub category: Option<ActivityCategory>,
}

impl RecordFilter {
    pub fn for_category(category: ActivityCategory) -> Self {
        Self {
            category: Some(category),
            ..Self::default()
        }
    }

    /// Whole months given as "YYYY-MM" or "YYYY-MM:YYYY-MM".
    pub fn for_period(period: &str) -> Result<Self> {
        let (start, end) = parse_period_string(period)?;
        Ok(Self::default().between(Some(start), Some(end)))
    }

    pub fn between(mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        self.start = start;
        self.end = end;
        self
    }

    pub fn matches(&self, record: &ActivityRecord) -> bool {
        let day = record.created_on();

        if let Some(start) = self.start {
            if day < start {
                return false;
            }
        }
        if let Some(end) = self.end {
            if day > end {
                return false;
            }
        }

        self.category.map_or(true, |c| record.category == c)
    }
}

/// Returns the records that satisfy `filter`, in their original order.
pub fn filter_records(records: &[ActivityRecord], filter: &RecordFilter) -> Vec<ActivityRecord> {
    records
        .iter()
        .filter(|r| filter.matches(r))
        .cloned()
        .collect()
}

/// Splits records by category following `order`. Categories without records
/// are still listed, with an empty vector.
pub fn group_by_category(
    records: &[ActivityRecord],
    order: &[ActivityCategory],
) -> Vec<(ActivityCategory, Vec<ActivityRecord>)> {
    order
        .iter()
        .map(|category| {
            let selected = records
                .iter()
                .filter(|r| r.category == *category)
                .cloned()
                .collect();
            (*category, selected)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ActivityDetails, AuthorRole};
    use chrono::{TimeZone, Utc};

    fn record(id: &str, category: ActivityCategory, y: i32, m: u32, d: u32) -> ActivityRecord {
        ActivityRecord {
            id: id.to_string(),
            garden_id: "g".to_string(),
            author_id: "u".to_string(),
            author_name: None,
            author_role: AuthorRole::Owner,
            category,
            created_at: Utc.with_ymd_and_hms(y, m, d, 18, 45, 0).unwrap(),
            content: String::new(),
            details: ActivityDetails::default(),
        }
    }

    fn sample() -> Vec<ActivityRecord> {
        vec![
            record("a", ActivityCategory::Irrigation, 2024, 1, 10),
            record("b", ActivityCategory::Pest, 2024, 1, 31),
            record("c", ActivityCategory::Irrigation, 2024, 2, 1),
            record("d", ActivityCategory::Harvest, 2024, 3, 15),
            record("e", ActivityCategory::Irrigation, 2024, 3, 31),
        ]
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_no_criteria_keeps_everything_in_order() {
        let records = sample();
        let result = filter_records(&records, &RecordFilter::default());
        assert_eq!(result, records);
    }

    #[test]
    fn test_inclusive_bounds_use_whole_days() {
        let records = sample();
        let filter =
            RecordFilter::default().between(Some(date(2024, 1, 31)), Some(date(2024, 3, 31)));
        let ids: Vec<_> = filter_records(&records, &filter)
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["b", "c", "d", "e"]);
    }

    #[test]
    fn test_category_and_range_combined() {
        let records = sample();
        let filter = RecordFilter::for_category(ActivityCategory::Irrigation)
            .between(Some(date(2024, 2, 1)), None);
        let ids: Vec<_> = filter_records(&records, &filter)
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["c", "e"]);
    }

    #[test]
    fn test_result_is_subset_within_bounds() {
        let records = sample();
        let (a, b) = (date(2024, 1, 15), date(2024, 3, 20));
        let filter = RecordFilter::default().between(Some(a), Some(b));

        for r in filter_records(&records, &filter) {
            assert!(records.contains(&r));
            assert!(a <= r.created_on() && r.created_on() <= b);
        }
    }

    #[test]
    fn test_period_filter_spans_whole_months() {
        let filter = RecordFilter::for_period("2024-01:2024-02").unwrap();
        let ids: Vec<_> = filter_records(&sample(), &filter)
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert!(RecordFilter::for_period("january").is_err());
    }

    #[test]
    fn test_empty_and_inverted_ranges_are_not_errors() {
        let filter =
            RecordFilter::default().between(Some(date(2024, 5, 1)), Some(date(2024, 4, 1)));
        assert!(filter_records(&sample(), &filter).is_empty());
        assert!(filter_records(&[], &RecordFilter::default()).is_empty());
    }

    #[test]
    fn test_group_by_category_follows_order() {
        let groups = group_by_category(&sample(), &ActivityCategory::DECLARED_ORDER);
        assert_eq!(groups.len(), 7);
        assert_eq!(groups[0].0, ActivityCategory::Irrigation);
        assert_eq!(groups[0].1.len(), 3);
        let planting = groups
            .iter()
            .find(|(c, _)| *c == ActivityCategory::Planting)
            .unwrap();
        assert!(planting.1.is_empty());
    }
}
