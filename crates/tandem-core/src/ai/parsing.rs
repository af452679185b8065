//! JSON parsing helpers for AI backend responses
//!
//! Model output is never trusted: the payload is parsed into a loose
//! `serde_json::Value` and every field is checked and normalized before it
//! becomes a [`DatasetInsight`]. Identifiers, timestamps, icons and provenance
//! always come from this side.

use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::insights::types::{
    clamp_confidence, clamp_severity, DatasetInsight, GeneratedBy, InsightMetadata, InsightType,
};

use super::openai_compatible::truncate;

pub const DEFAULT_AI_SEVERITY: u8 = 2;
pub const DEFAULT_AI_CONFIDENCE: f64 = 0.8;

/// Find and parse the outermost JSON object in a model response
///
/// Models sometimes wrap the object in prose or code fences.
pub fn extract_json_object(response: &str) -> Result<Value> {
    let response = response.trim();
    if response.is_empty() {
        return Err(Error::AiResponse("Empty AI response".into()));
    }

    let start = response.find('{');
    let end = response.rfind('}');

    match (start, end) {
        (Some(s), Some(e)) if s < e => {
            let json_str = &response[s..=e];
            serde_json::from_str(json_str).map_err(|e| {
                Error::AiResponse(format!(
                    "Invalid JSON from AI: {} | Raw: {}",
                    e,
                    truncate(json_str, 200)
                ))
            })
        }
        _ => Err(Error::AiResponse(format!(
            "No JSON found in AI response | Raw: {}",
            truncate(response, 200)
        ))),
    }
}

/// Parse an `{"insights": [...]}` payload into normalized insights
///
/// Items that are not objects, or carry neither a title nor a message, are
/// dropped. A payload that yields no usable insight is an error.
pub fn parse_insights(response: &str, dataset_id: &str) -> Result<Vec<DatasetInsight>> {
    let value = extract_json_object(response)?;

    let items = value
        .get("insights")
        .and_then(Value::as_array)
        .ok_or_else(|| Error::AiResponse("AI response has no \"insights\" array".into()))?;

    let insights: Vec<DatasetInsight> = items
        .iter()
        .filter_map(Value::as_object)
        .filter_map(|item| normalize_insight(item, dataset_id))
        .collect();

    if insights.is_empty() {
        return Err(Error::AiResponse(format!(
            "AI returned no usable insights ({} items)",
            items.len()
        )));
    }

    Ok(insights)
}

/// Keep exactly one summary in a normalized AI insight list
///
/// The first summary stays; later ones become suggestions. A list without
/// any summary is rejected so the caller can fall back to the rule engine.
pub fn enforce_single_summary(insights: &mut [DatasetInsight]) -> Result<()> {
    let mut seen_summary = false;
    for insight in insights.iter_mut() {
        if insight.insight_type != InsightType::Summary {
            continue;
        }
        if seen_summary {
            insight.insight_type = InsightType::Suggestion;
            insight.icon = InsightType::Suggestion.icon().to_string();
        }
        seen_summary = true;
    }

    if !seen_summary {
        return Err(Error::AiResponse(format!(
            "AI returned {} insights but no summary",
            insights.len()
        )));
    }
    Ok(())
}

/// Turn one loosely-typed item into a validated insight
pub fn normalize_insight(item: &Map<String, Value>, dataset_id: &str) -> Option<DatasetInsight> {
    let title = string_field(item, "title");
    let message = string_field(item, "message")
        .or_else(|| string_field(item, "description"));
    if title.is_none() && message.is_none() {
        return None;
    }

    let insight_type = item
        .get("type")
        .and_then(Value::as_str)
        .and_then(|t| t.trim().to_lowercase().parse::<InsightType>().ok())
        .unwrap_or(InsightType::Summary);

    let severity = number_field(item, "severity")
        .map(clamp_severity)
        .unwrap_or(DEFAULT_AI_SEVERITY);
    let confidence = number_field(item, "confidence")
        .map(clamp_confidence)
        .unwrap_or(DEFAULT_AI_CONFIDENCE);

    let metadata = item
        .get("metadata")
        .and_then(Value::as_object)
        .map(normalize_metadata)
        .unwrap_or_default();

    let title = title.unwrap_or_else(|| default_title(insight_type).to_string());
    let message = message.unwrap_or_default();

    Some(
        DatasetInsight::new(dataset_id, insight_type, GeneratedBy::AiModel, title, message)
            .with_severity(severity)
            .with_confidence(confidence)
            .with_metadata(metadata),
    )
}

fn normalize_metadata(raw: &Map<String, Value>) -> InsightMetadata {
    InsightMetadata {
        kpi: string_field(raw, "kpi"),
        dimension: string_field(raw, "dimension"),
        value: raw.get("value").filter(|v| is_scalar(v)).cloned(),
        change: number_field(raw, "change"),
        period: string_field(raw, "period"),
    }
}

fn default_title(insight_type: InsightType) -> &'static str {
    match insight_type {
        InsightType::Summary => "Summary",
        InsightType::Warning => "Warning",
        InsightType::Suggestion => "Suggestion",
        InsightType::Trend => "Trend",
        InsightType::Anomaly => "Anomaly",
    }
}

fn string_field(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Finite number, accepting numeric strings
fn number_field(map: &Map<String, Value>, key: &str) -> Option<f64> {
    let n = match map.get(key)? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

fn is_scalar(value: &Value) -> bool {
    matches!(value, Value::String(_) | Value::Number(_) | Value::Bool(_))
}
