//! Core types for insight generation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Kind of insight shown on the dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsightType {
    /// Overall comparison summary
    Summary,
    /// A KPI moved significantly in the wrong direction
    Warning,
    /// Something worth acting on (top performers, rankings)
    Suggestion,
    /// A KPI moved significantly in the right direction
    Trend,
    /// A dimension value stands out from its peers
    Anomaly,
}

impl InsightType {
    pub const ALL: [InsightType; 5] = [
        InsightType::Summary,
        InsightType::Warning,
        InsightType::Suggestion,
        InsightType::Trend,
        InsightType::Anomaly,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InsightType::Summary => "summary",
            InsightType::Warning => "warning",
            InsightType::Suggestion => "suggestion",
            InsightType::Trend => "trend",
            InsightType::Anomaly => "anomaly",
        }
    }

    /// Display glyph for this type
    pub fn icon(&self) -> &'static str {
        match self {
            InsightType::Summary => "📊",
            InsightType::Warning => "📉",
            InsightType::Suggestion => "💡",
            InsightType::Trend => "📈",
            InsightType::Anomaly => "🔍",
        }
    }
}

impl fmt::Display for InsightType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for InsightType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "summary" => Ok(InsightType::Summary),
            "warning" => Ok(InsightType::Warning),
            "suggestion" => Ok(InsightType::Suggestion),
            "trend" => Ok(InsightType::Trend),
            "anomaly" => Ok(InsightType::Anomaly),
            _ => Err(format!("Unknown insight type: {}", s)),
        }
    }
}

/// Which generator produced an insight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GeneratedBy {
    #[serde(rename = "rule-engine")]
    RuleEngine,
    #[serde(rename = "ai-model")]
    AiModel,
}

impl GeneratedBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            GeneratedBy::RuleEngine => "rule-engine",
            GeneratedBy::AiModel => "ai-model",
        }
    }
}

impl fmt::Display for GeneratedBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Structured details behind an insight message
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kpi: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimension: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
    /// Signed percent change
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period: Option<String>,
}

impl InsightMetadata {
    pub fn kpi(kpi: impl Into<String>) -> Self {
        Self {
            kpi: Some(kpi.into()),
            ..Default::default()
        }
    }

    pub fn with_dimension(mut self, dimension: impl Into<String>) -> Self {
        self.dimension = Some(dimension.into());
        self
    }

    pub fn with_value(mut self, value: impl Into<serde_json::Value>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_change(mut self, change: f64) -> Self {
        self.change = Some(change);
        self
    }

    pub fn with_period(mut self, period: impl Into<String>) -> Self {
        self.period = Some(period.into());
        self
    }
}

pub const MIN_SEVERITY: u8 = 1;
pub const MAX_SEVERITY: u8 = 5;

/// Round and clamp a raw severity into 1..=5
pub fn clamp_severity(raw: f64) -> u8 {
    if raw.is_nan() {
        return MIN_SEVERITY;
    }
    raw.round().clamp(MIN_SEVERITY as f64, MAX_SEVERITY as f64) as u8
}

/// Clamp a raw confidence into 0..=1
pub fn clamp_confidence(raw: f64) -> f64 {
    if raw.is_nan() {
        return 0.0;
    }
    raw.clamp(0.0, 1.0)
}

/// One generated insight about a dataset comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetInsight {
    pub id: String,
    pub dataset_id: String,
    #[serde(rename = "type")]
    pub insight_type: InsightType,
    pub severity: u8,
    pub icon: String,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub metadata: InsightMetadata,
    pub generated_by: GeneratedBy,
    pub confidence: f64,
    pub generated_at: DateTime<Utc>,
}

impl DatasetInsight {
    /// Create an insight with a fresh id, the type's icon and the current timestamp
    ///
    /// Severity starts at 2 and confidence at 1.
    pub fn new(
        dataset_id: impl Into<String>,
        insight_type: InsightType,
        generated_by: GeneratedBy,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            dataset_id: dataset_id.into(),
            insight_type,
            severity: 2,
            icon: insight_type.icon().to_string(),
            title: title.into(),
            message: message.into(),
            metadata: InsightMetadata::default(),
            generated_by,
            confidence: 1.0,
            generated_at: Utc::now(),
        }
    }

    pub fn with_severity(mut self, severity: u8) -> Self {
        self.severity = clamp_severity(severity as f64);
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = clamp_confidence(confidence);
        self
    }

    pub fn with_metadata(mut self, metadata: InsightMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Sort by severity, highest first, keeping the relative order of ties
pub fn sort_by_severity(insights: &mut [DatasetInsight]) {
    insights.sort_by(|a, b| b.severity.cmp(&a.severity));
}
