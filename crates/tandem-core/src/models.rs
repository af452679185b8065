//! Data models for Tandem
//!
//! A [`Dataset`] is the unified result of uploading two tabular files
//! ("group A" and "group B") and tagging their columns. Every [`DataRow`]
//! remembers which upload it came from through its [`SourceGroup`].

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Which of the two uploads a row originated from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SourceGroup {
    #[serde(rename = "groupA")]
    GroupA,
    #[serde(rename = "groupB")]
    GroupB,
}

impl SourceGroup {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceGroup::GroupA => "groupA",
            SourceGroup::GroupB => "groupB",
        }
    }
}

impl fmt::Display for SourceGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SourceGroup {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "groupA" | "A" | "a" => Ok(SourceGroup::GroupA),
            "groupB" | "B" | "b" => Ok(SourceGroup::GroupB),
            _ => Err(format!("Unknown source group: {}", s)),
        }
    }
}

/// A single row of the unified dataset
///
/// Cells are kept as raw JSON scalars; the discriminator is serialized
/// under `_sourceGroup` next to the cell values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataRow {
    #[serde(rename = "_sourceGroup")]
    pub source_group: SourceGroup,
    #[serde(flatten)]
    pub values: serde_json::Map<String, Value>,
}

impl DataRow {
    /// Create an empty row for a source group
    pub fn new(source_group: SourceGroup) -> Self {
        Self {
            source_group,
            values: serde_json::Map::new(),
        }
    }

    /// Builder-style cell setter (mostly used by tests and the loader)
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(field.into(), value.into());
        self
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    /// Cell value as a string, the way filters and grouping see it
    ///
    /// Missing and null cells become the empty string.
    pub fn text(&self, field: &str) -> String {
        match self.values.get(field) {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(Value::Bool(b)) => b.to_string(),
            Some(Value::Number(n)) => n.to_string(),
            Some(other) => other.to_string(),
        }
    }

    /// Cell value as a number; anything that isn't a finite number is 0
    pub fn number(&self, field: &str) -> f64 {
        let n = match self.values.get(field) {
            Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
            Some(Value::String(s)) => s.trim().replace(',', "").parse::<f64>().unwrap_or(0.0),
            _ => 0.0,
        };
        if n.is_finite() {
            n
        } else {
            0.0
        }
    }
}

/// Lifecycle status of a dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetStatus {
    Draft,
    Processing,
    #[default]
    Ready,
    Error,
    Archived,
}

impl DatasetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetStatus::Draft => "draft",
            DatasetStatus::Processing => "processing",
            DatasetStatus::Ready => "ready",
            DatasetStatus::Error => "error",
            DatasetStatus::Archived => "archived",
        }
    }
}

impl fmt::Display for DatasetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DatasetStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(DatasetStatus::Draft),
            "processing" => Ok(DatasetStatus::Processing),
            "ready" => Ok(DatasetStatus::Ready),
            "error" => Ok(DatasetStatus::Error),
            "archived" => Ok(DatasetStatus::Archived),
            _ => Err(format!("Unknown dataset status: {}", s)),
        }
    }
}

/// Display metadata for one uploaded file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSource {
    pub label: String,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub original_file_name: Option<String>,
    #[serde(default)]
    pub row_count: usize,
}

impl GroupSource {
    pub fn labeled(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            color: None,
            original_file_name: None,
            row_count: 0,
        }
    }
}

/// Per-group display metadata for both uploads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceConfig {
    pub group_a: GroupSource,
    pub group_b: GroupSource,
}

impl SourceConfig {
    pub fn label(&self, group: SourceGroup) -> &str {
        match group {
            SourceGroup::GroupA => &self.group_a.label,
            SourceGroup::GroupB => &self.group_b.label,
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            group_a: GroupSource::labeled("Group A"),
            group_b: GroupSource::labeled("Group B"),
        }
    }
}

/// How a KPI value should be displayed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KpiFormat {
    #[default]
    Number,
    Currency,
    Percentage,
}

/// A numeric column that is aggregated and compared across groups
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KpiField {
    pub id: String,
    pub column: String,
    pub label: String,
    #[serde(default)]
    pub format: KpiFormat,
}

impl KpiField {
    /// KPI whose id, column and label are all the same name
    pub fn simple(column: impl Into<String>) -> Self {
        let column = column.into();
        Self {
            id: column.clone(),
            label: column.clone(),
            column,
            format: KpiFormat::Number,
        }
    }
}

/// Column tagging produced by the upload wizard
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaMapping {
    pub dimension: String,
    #[serde(default)]
    pub date_field: Option<String>,
    #[serde(default)]
    pub kpis: Vec<KpiField>,
    #[serde(default)]
    pub categorical_fields: Vec<String>,
}

/// Feature key that gates AI insight generation per dataset
pub const AI_FEATURE_INSIGHTS: &str = "insights";

/// Per-dataset AI switches
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub features: BTreeMap<String, bool>,
    #[serde(default)]
    pub user_context: Option<String>,
}

impl AiConfig {
    /// Whether this dataset allows AI-written insights
    pub fn allows_insights(&self) -> bool {
        self.enabled
            || self
                .features
                .get(AI_FEATURE_INSIGHTS)
                .copied()
                .unwrap_or(false)
    }
}

/// A comparison dataset as loaded from the dataset store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: DatasetStatus,
    #[serde(default)]
    pub source_config: SourceConfig,
    #[serde(default)]
    pub schema_mapping: Option<SchemaMapping>,
    #[serde(default)]
    pub ai_config: AiConfig,
    #[serde(default)]
    pub rows: Vec<DataRow>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Dataset {
    /// Create an empty, ready dataset
    pub fn new(id: impl Into<String>, owner_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            owner_id: owner_id.into(),
            name: name.into(),
            description: None,
            status: DatasetStatus::Ready,
            source_config: SourceConfig::default(),
            schema_mapping: None,
            ai_config: AiConfig::default(),
            rows: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.owner_id == user_id
    }
}

/// Lightweight listing entry (no rows)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetSummary {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub status: DatasetStatus,
    pub row_count: usize,
    pub created_at: DateTime<Utc>,
}
