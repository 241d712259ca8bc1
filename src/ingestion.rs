use crate::error::{GardenReportError, Result};
use crate::orchestrator::ActivitySource;
use crate::schema::ActivityRecord;
use async_trait::async_trait;
use log::{debug, warn};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Parses a JSON array of activity records and validates each one.
///
/// Duplicate ids are rejected. Records are returned sorted by creation time.
pub fn load_records_json(json: &str) -> Result<Vec<ActivityRecord>> {
    let mut records: Vec<ActivityRecord> = serde_json::from_str(json)?;

    let mut seen = HashSet::new();
    for record in &records {
        record.validate()?;
        if !seen.insert(record.id.as_str()) {
            return Err(GardenReportError::InvalidRecord {
                id: record.id.clone(),
                details: "duplicate id".to_string(),
            });
        }
    }

    records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
    debug!("Loaded {} activity records", records.len());
    Ok(records)
}

/// Activity source backed by a JSON file holding every garden's records.
/// The file is read again on each request.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ActivitySource for JsonFileSource {
    async fn records_for_garden(&self, garden_id: &str) -> Result<Vec<ActivityRecord>> {
        let raw = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            GardenReportError::Source(format!("cannot read {}: {}", self.path.display(), e))
        })?;
        let records: Vec<ActivityRecord> = load_records_json(&raw)?
            .into_iter()
            .filter(|r| r.garden_id == garden_id)
            .collect();

        if records.is_empty() {
            warn!("No records for garden {} in {}", garden_id, self.path.display());
        }
        Ok(records)
    }
}
