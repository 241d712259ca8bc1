use crate::error::{GardenReportError, Result};
use chrono::{DateTime, NaiveDate, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum ActivityCategory {
    #[schemars(description = "Free-form note that does not belong to a specific activity kind")]
    General,

    #[schemars(description = "Watering. Quantity is a volume (ml, l, gal...)")]
    Irrigation,

    #[schemars(description = "Sowing or transplanting. Quantity is usually a plant count")]
    Planting,

    #[schemars(description = "Harvest. Quantity is a mass (g, kg...) or a unit count")]
    Harvest,

    #[schemars(description = "Fertilizer application. Quantity is a mass (g, kg...)")]
    Fertilization,

    #[schemars(description = "Pest sighting or treatment. Each record counts as one incident")]
    Pest,

    #[schemars(description = "Maintenance work. Duration is a time span (min, h...)")]
    Maintenance,
}

/// How a category's monthly values are folded into one number.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    Average,
    Count,
    Sum,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ColorTheme {
    pub primary: [u8; 3],
    pub light: [u8; 3],
}

impl ActivityCategory {
    /// Order in which categories appear in a full report.
    pub const DECLARED_ORDER: [ActivityCategory; 7] = [
        ActivityCategory::Irrigation,
        ActivityCategory::Planting,
        ActivityCategory::Harvest,
        ActivityCategory::Fertilization,
        ActivityCategory::Pest,
        ActivityCategory::Maintenance,
        ActivityCategory::General,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::General => "General",
            Self::Irrigation => "Irrigation",
            Self::Planting => "Planting",
            Self::Harvest => "Harvest",
            Self::Fertilization => "Fertilization",
            Self::Pest => "Pest control",
            Self::Maintenance => "Maintenance",
        }
    }

    pub fn slug(&self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Irrigation => "irrigation",
            Self::Planting => "planting",
            Self::Harvest => "harvest",
            Self::Fertilization => "fertilization",
            Self::Pest => "pest",
            Self::Maintenance => "maintenance",
        }
    }

    pub fn aggregation(&self) -> Aggregation {
        match self {
            Self::Irrigation | Self::Fertilization | Self::Maintenance => Aggregation::Average,
            Self::Pest | Self::General => Aggregation::Count,
            Self::Planting | Self::Harvest => Aggregation::Sum,
        }
    }

    /// Label of the monthly aggregate, including the canonical unit.
    pub fn metric_label(&self) -> &'static str {
        match self {
            Self::General => "Entries",
            Self::Irrigation => "Average volume (mL)",
            Self::Planting => "Total planted",
            Self::Harvest => "Total harvested",
            Self::Fertilization => "Average dose (kg)",
            Self::Pest => "Incidents",
            Self::Maintenance => "Average duration (min)",
        }
    }

    /// General notes carry no numeric series worth plotting.
    pub fn has_chart(&self) -> bool {
        !matches!(self, Self::General)
    }

    pub fn color_theme(&self) -> ColorTheme {
        match self {
            Self::General => ColorTheme {
                primary: [71, 85, 105],
                light: [226, 232, 240],
            },
            Self::Irrigation => ColorTheme {
                primary: [37, 99, 235],
                light: [219, 234, 254],
            },
            Self::Planting => ColorTheme {
                primary: [22, 163, 74],
                light: [220, 252, 231],
            },
            Self::Harvest => ColorTheme {
                primary: [234, 88, 12],
                light: [255, 237, 213],
            },
            Self::Fertilization => ColorTheme {
                primary: [146, 64, 14],
                light: [254, 243, 199],
            },
            Self::Pest => ColorTheme {
                primary: [220, 38, 38],
                light: [254, 226, 226],
            },
            Self::Maintenance => ColorTheme {
                primary: [107, 114, 128],
                light: [243, 244, 246],
            },
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum AuthorRole {
    Owner,
    Admin,
    Collaborator,
    Visitor,
}

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum PestLevel {
    Low,
    Medium,
    High,
}

impl PestLevel {
    pub const ALL: [PestLevel; 3] = [PestLevel::Low, PestLevel::Medium, PestLevel::High];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        }
    }
}

/// Category-specific fields. Which ones are filled depends on the category.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct ActivityDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Amount applied or collected. Must be >= 0")]
    pub quantity: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Unit of `quantity` (ml, l, g, kg, units...)")]
    pub unit: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crop: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Fertilizer or treatment product name")]
    pub product: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Irrigation method (drip, sprinkler, manual...)")]
    pub method: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pest_species: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pest_level: Option<PestLevel>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub treatment: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Time spent. Must be >= 0")]
    pub duration: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Unit of `duration` (s, min, h...)")]
    pub duration_unit: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct ActivityRecord {
    pub id: String,

    pub garden_id: String,

    pub author_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Display name of the author, if known")]
    pub author_name: Option<String>,

    pub author_role: AuthorRole,

    pub category: ActivityCategory,

    #[schemars(description = "RFC 3339 timestamp of when the activity was logged")]
    pub created_at: DateTime<Utc>,

    #[serde(default)]
    pub content: String,

    #[serde(flatten, default)]
    pub details: ActivityDetails,
}

impl ActivityRecord {
    pub fn created_on(&self) -> NaiveDate {
        self.created_at.date_naive()
    }

    pub fn author_display(&self) -> &str {
        self.author_name.as_deref().unwrap_or(&self.author_id)
    }

    pub fn validate(&self) -> Result<()> {
        let numeric = [
            ("quantity", self.details.quantity),
            ("duration", self.details.duration),
        ];

        for (field, value) in numeric {
            if let Some(v) = value {
                if !v.is_finite() || v < 0.0 {
                    return Err(GardenReportError::InvalidRecord {
                        id: self.id.clone(),
                        details: format!("{} must be a finite value >= 0, got {}", field, v),
                    });
                }
            }
        }

        Ok(())
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(ActivityRecord)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}
