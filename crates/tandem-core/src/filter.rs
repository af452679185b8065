//! Dashboard filters and the tabular filter
//!
//! Filters are a flat allow-list per categorical field. A field that is
//! absent, or present with an empty list, does not constrain anything.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::models::DataRow;

/// Active dashboard filter state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardFilters {
    #[serde(default)]
    pub categorical: BTreeMap<String, Vec<String>>,
}

impl DashboardFilters {
    /// No restrictions at all
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the allow-list for a field
    pub fn with_values<I, S>(mut self, field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categorical
            .insert(field.into(), values.into_iter().map(Into::into).collect());
        self
    }

    /// Parse the JSON form sent by the dashboard (`{"categorical": {...}}`)
    ///
    /// Absent or unparseable input means "no filters".
    pub fn from_query(raw: Option<&str>) -> Self {
        let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
            return Self::default();
        };
        match serde_json::from_str::<DashboardFilters>(raw) {
            Ok(filters) => filters,
            Err(e) => {
                tracing::debug!(error = %e, "Ignoring unparseable filters");
                Self::default()
            }
        }
    }

    /// Fields that actually restrict rows, with their allowed values
    pub fn active(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.categorical
            .iter()
            .filter(|(_, values)| !values.is_empty())
            .map(|(field, values)| (field.as_str(), values.as_slice()))
    }

    /// True when no field restricts anything
    pub fn is_empty(&self) -> bool {
        self.active().next().is_none()
    }

    /// Whether a single row passes every active allow-list
    pub fn matches(&self, row: &DataRow) -> bool {
        self.active().all(|(field, allowed)| {
            let value = row.text(field);
            allowed.iter().any(|a| *a == value)
        })
    }

    /// Canonical serialization of the constraints
    ///
    /// Fields are sorted, values sorted and de-duplicated, and unconstrained
    /// fields dropped, so equal constraints always produce equal strings.
    pub fn canonical_key(&self) -> String {
        let canonical: BTreeMap<&str, BTreeSet<&str>> = self
            .active()
            .map(|(field, values)| (field, values.iter().map(String::as_str).collect()))
            .collect();
        // A map of string sets always serializes
        serde_json::to_string(&canonical).unwrap_or_default()
    }

    /// Short stable digest of the canonical form
    pub fn digest(&self) -> String {
        let hash = Sha256::digest(self.canonical_key().as_bytes());
        hex::encode(hash)
    }

    /// Insight cache key for a dataset under this filter state
    pub fn cache_key(&self, dataset_id: &str) -> String {
        format!("insights:{}:{}", dataset_id, self.digest())
    }
}

/// Return the rows that pass every active allow-list
pub fn apply_filters<'a>(rows: &'a [DataRow], filters: &DashboardFilters) -> Vec<&'a DataRow> {
    if filters.is_empty() {
        return rows.iter().collect();
    }
    rows.iter().filter(|row| filters.matches(row)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceGroup;

    fn rows() -> Vec<DataRow> {
        vec![
            DataRow::new(SourceGroup::GroupA)
                .with("region", "North")
                .with("store", 1),
            DataRow::new(SourceGroup::GroupA)
                .with("region", "South")
                .with("store", 2),
            DataRow::new(SourceGroup::GroupB)
                .with("region", "North")
                .with("store", 2),
        ]
    }

    #[test]
    fn test_no_filters_keeps_everything() {
        let rows = rows();
        assert_eq!(apply_filters(&rows, &DashboardFilters::new()).len(), 3);
    }

    #[test]
    fn test_empty_list_is_no_restriction() {
        let rows = rows();
        let filters = DashboardFilters::new().with_values("region", Vec::<String>::new());
        assert_eq!(apply_filters(&rows, &filters).len(), 3);
        assert!(filters.is_empty());
    }

    #[test]
    fn test_allow_list_membership() {
        let rows = rows();
        let filters = DashboardFilters::new().with_values("region", ["North"]);
        let kept = apply_filters(&rows, &filters);
        assert_eq!(kept.len(), 2);
        assert!(kept.iter().all(|r| r.text("region") == "North"));
    }

    #[test]
    fn test_numeric_cells_are_stringified() {
        let rows = rows();
        let filters = DashboardFilters::new()
            .with_values("region", ["North", "South"])
            .with_values("store", ["2"]);
        let kept = apply_filters(&rows, &filters);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn test_missing_field_excludes_row() {
        let rows = rows();
        let filters = DashboardFilters::new().with_values("channel", ["web"]);
        assert!(apply_filters(&rows, &filters).is_empty());
    }

    #[test]
    fn test_canonical_ignores_order_and_empty_fields() {
        let a = DashboardFilters::new()
            .with_values("region", ["South", "North"])
            .with_values("channel", Vec::<String>::new());
        let b = DashboardFilters::new().with_values("region", ["North", "South", "North"]);
        assert_eq!(a.canonical_key(), b.canonical_key());
        assert_eq!(a.digest(), b.digest());
    }

    #[test]
    fn test_canonical_differs_for_different_constraints() {
        let a = DashboardFilters::new().with_values("region", ["North"]);
        let b = DashboardFilters::new().with_values("region", ["South"]);
        assert_ne!(a.canonical_key(), b.canonical_key());
        assert_ne!(a.canonical_key(), DashboardFilters::new().canonical_key());
    }

    #[test]
    fn test_cache_key_scoped_by_dataset() {
        let filters = DashboardFilters::new().with_values("region", ["North"]);
        let key = filters.cache_key("ds-1");
        assert!(key.starts_with("insights:ds-1:"));
        assert_ne!(key, filters.cache_key("ds-2"));
        assert_eq!(key.len(), "insights:ds-1:".len() + 64);
    }

    #[test]
    fn test_from_query() {
        let parsed = DashboardFilters::from_query(Some(r#"{"categorical":{"region":["North"]}}"#));
        assert_eq!(parsed.categorical["region"], vec!["North".to_string()]);

        assert!(DashboardFilters::from_query(None).is_empty());
        assert!(DashboardFilters::from_query(Some("not json")).is_empty());
        assert!(DashboardFilters::from_query(Some("  ")).is_empty());
    }
}
