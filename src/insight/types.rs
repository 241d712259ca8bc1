use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightRequest {
    pub title: String,
    pub summary: String,
    pub sections: Vec<InsightSection>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InsightSection {
    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_rows: Option<Vec<Vec<String>>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<BTreeMap<String, serde_json::Value>>,
}

impl InsightSection {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Attaches the table columns and at most `limit` rows from the top.
    pub fn with_sample(mut self, columns: &[String], rows: &[Vec<String>], limit: usize) -> Self {
        self.columns = Some(columns.to_vec());
        self.sample_rows = Some(rows.iter().take(limit).cloned().collect());
        self
    }

    pub fn with_metric(
        mut self,
        name: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.metrics
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightResponse {
    pub analysis: String,
}

/// Text ready to be embedded in a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Narrative {
    pub text: String,
    /// Why the fallback text was used, if it was.
    pub fallback_reason: Option<String>,
}

impl Narrative {
    pub fn is_fallback(&self) -> bool {
        self.fallback_reason.is_some()
    }
}
