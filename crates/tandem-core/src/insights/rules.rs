//! Rule Engine
//!
//! Deterministic statistical analysis of a dataset comparison. Works purely
//! on the filtered rows in memory and never touches the network, which makes
//! it the fallback whenever the AI generator is unavailable.
//!
//! Produces, in order before the final severity sort:
//! - KPI trends (group B vs group A totals)
//! - one overall summary
//! - statistical outliers per categorical field and KPI (z-score)
//! - comparative anomalies per field value and per observed value combination
//! - a top performer suggestion and up to two ranking suggestions

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::Result;
use crate::filter::{apply_filters, DashboardFilters};
use crate::models::{DataRow, Dataset, KpiField, KpiFormat, SchemaMapping, SourceGroup};

use super::engine::InsightGenerator;
use super::types::{sort_by_severity, DatasetInsight, GeneratedBy, InsightMetadata, InsightType};

/// Dimension marker for anomalies over several categorical fields at once
pub const COMBINED_DIMENSION: &str = "combined";

/// Tunable limits for the rule engine
#[derive(Debug, Clone, PartialEq)]
pub struct RuleThresholds {
    /// KPI change (percent, exclusive) that produces a trend or warning
    pub trend_percent: f64,
    /// KPI change (percent, inclusive) that raises a trend to severity 4
    pub trend_high_percent: f64,
    /// |z-score| (exclusive) that marks a dimension value as an outlier
    pub outlier_z_score: f64,
    /// Group A vs group B change (percent, inclusive) for comparative anomalies
    pub comparative_percent: f64,
    /// Distinct values the first categorical field needs before ranking it
    pub ranking_min_values: usize,
    /// KPIs with negative change needed before ranking them
    pub ranking_min_declining_kpis: usize,
    /// Names listed in a ranking message
    pub ranking_size: usize,
}

impl Default for RuleThresholds {
    fn default() -> Self {
        Self {
            trend_percent: 30.0,
            trend_high_percent: 50.0,
            outlier_z_score: 2.0,
            comparative_percent: 40.0,
            ranking_min_values: 3,
            ranking_min_declining_kpis: 2,
            ranking_size: 3,
        }
    }
}

/// The statistical insight generator
#[derive(Debug, Clone, Default)]
pub struct RuleEngine {
    thresholds: RuleThresholds,
}

impl RuleEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_thresholds(thresholds: RuleThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &RuleThresholds {
        &self.thresholds
    }

    /// Run every rule over the filtered rows
    ///
    /// Always returns exactly one summary insight.
    pub fn analyze(&self, dataset: &Dataset, filters: &DashboardFilters) -> Vec<DatasetInsight> {
        let rows = apply_filters(&dataset.rows, filters);

        let Some(mapping) = dataset.schema_mapping.as_ref() else {
            return vec![insight(
                dataset,
                InsightType::Summary,
                "Dataset overview",
                format!(
                    "{} rows loaded. Map a dimension and at least one KPI to unlock comparison insights.",
                    rows.len()
                ),
            )
            .with_severity(1)
            .with_confidence(1.0)];
        };

        let ctx = RuleContext {
            dataset,
            mapping,
            rows: &rows,
            label_a: dataset.source_config.label(SourceGroup::GroupA),
            label_b: dataset.source_config.label(SourceGroup::GroupB),
        };

        let mut insights = Vec::new();

        let kpi_changes = self.kpi_trends(&ctx, &mut insights);
        insights.push(summary(&ctx, &kpi_changes));
        self.outliers(&ctx, &mut insights);
        self.comparative_anomalies(&ctx, &mut insights);
        self.combined_anomalies(&ctx, &mut insights);
        top_performer(&ctx, &mut insights);
        self.rankings(&ctx, &kpi_changes, &mut insights);

        sort_by_severity(&mut insights);

        tracing::debug!(
            dataset_id = %dataset.id,
            rows = rows.len(),
            count = insights.len(),
            "Rule engine analysis complete"
        );

        insights
    }

    /// Per-KPI totals per group. Returns every KPI's change for the summary.
    fn kpi_trends(&self, ctx: &RuleContext<'_>, out: &mut Vec<DatasetInsight>) -> Vec<KpiChange> {
        let mut changes = Vec::with_capacity(ctx.mapping.kpis.len());

        for kpi in &ctx.mapping.kpis {
            let (sum_a, sum_b) = group_sums(ctx.rows, &kpi.column);
            let change = percent_change(sum_a, sum_b);
            changes.push(KpiChange {
                label: kpi.label.clone(),
                change,
            });

            if change.abs() <= self.thresholds.trend_percent {
                continue;
            }

            let rising = change > 0.0;
            let severity = if change.abs() >= self.thresholds.trend_high_percent {
                4
            } else {
                3
            };
            let (insight_type, direction) = if rising {
                (InsightType::Trend, "up")
            } else {
                (InsightType::Warning, "down")
            };

            out.push(
                insight(
                    ctx.dataset,
                    insight_type,
                    format!("{} {} {:.0}%", kpi.label, direction, change.abs()),
                    format!(
                        "{} went from {} in {} to {} in {} ({:+.1}%).",
                        kpi.label,
                        format_value(sum_a, kpi.format),
                        ctx.label_a,
                        format_value(sum_b, kpi.format),
                        ctx.label_b,
                        change
                    ),
                )
                .with_severity(severity)
                .with_confidence(0.9)
                .with_metadata(
                    InsightMetadata::kpi(&kpi.label)
                        .with_value(sum_b)
                        .with_change(round1(change))
                        .with_period(ctx.period()),
                ),
            );
        }

        changes
    }

    /// Z-score outliers over both groups combined
    fn outliers(&self, ctx: &RuleContext<'_>, out: &mut Vec<DatasetInsight>) {
        for field in &ctx.mapping.categorical_fields {
            for kpi in &ctx.mapping.kpis {
                let totals = totals_by(ctx.rows, &kpi.column, |row| row.text(field));
                if totals.len() < 2 {
                    continue;
                }

                let values: Vec<f64> = totals.iter().map(|(_, v)| *v).collect();
                let (mean, stddev) = mean_and_stddev(&values);
                if stddev == 0.0 || mean == 0.0 {
                    continue;
                }

                for (value, total) in totals.iter() {
                    let z = (total - mean) / stddev;
                    if z.abs() <= self.thresholds.outlier_z_score {
                        continue;
                    }
                    let change = (total - mean) / mean * 100.0;
                    let direction = if z > 0.0 { "above" } else { "below" };

                    out.push(
                        insight(
                            ctx.dataset,
                            InsightType::Anomaly,
                            format!("{} {} is an outlier", field, display_key(value)),
                            format!(
                                "{} for {} is {}, {:.0}% {} the average of {} across {} values (z = {:.1}).",
                                kpi.label,
                                display_key(value),
                                format_value(*total, kpi.format),
                                change.abs(),
                                direction,
                                format_value(mean, kpi.format),
                                totals.len(),
                                z
                            ),
                        )
                        .with_severity(4)
                        .with_confidence(0.85)
                        .with_metadata(
                            InsightMetadata::kpi(&kpi.label)
                                .with_dimension(field.as_str())
                                .with_value(value.as_str())
                                .with_change(round1(change)),
                        ),
                    );
                }
            }
        }
    }

    /// Group A vs group B per value of each categorical field
    fn comparative_anomalies(&self, ctx: &RuleContext<'_>, out: &mut Vec<DatasetInsight>) {
        let Some(kpi) = ctx.mapping.kpis.first() else {
            return;
        };

        for field in &ctx.mapping.categorical_fields {
            let cells = compare_groups(ctx.rows, &kpi.column, |row| row.text(field));
            for cell in cells.iter().filter(|c| self.is_comparative_anomaly(c)) {
                let shown = display_key(&cell.key);
                out.push(self.comparative_insight(ctx, kpi, field, &cell.key, shown, cell));
            }
        }
    }

    /// Same comparison over value combinations that actually co-occur
    fn combined_anomalies(&self, ctx: &RuleContext<'_>, out: &mut Vec<DatasetInsight>) {
        let fields = &ctx.mapping.categorical_fields;
        if fields.len() < 2 {
            return;
        }
        let Some(kpi) = ctx.mapping.kpis.first() else {
            return;
        };

        let cells = compare_groups(ctx.rows, &kpi.column, |row| {
            fields
                .iter()
                .map(|field| format!("{}={}", field, row.text(field)))
                .collect::<Vec<_>>()
                .join(", ")
        });

        for cell in cells.iter().filter(|c| self.is_comparative_anomaly(c)) {
            out.push(self.comparative_insight(
                ctx,
                kpi,
                COMBINED_DIMENSION,
                &cell.key,
                cell.key.clone(),
                cell,
            ));
        }
    }

    fn is_comparative_anomaly(&self, cell: &GroupCell) -> bool {
        if !(cell.in_a && cell.in_b) || cell.a == 0.0 {
            return false;
        }
        percent_change(cell.a, cell.b).abs() >= self.thresholds.comparative_percent
    }

    fn comparative_insight(
        &self,
        ctx: &RuleContext<'_>,
        kpi: &KpiField,
        dimension: &str,
        value: &str,
        shown: String,
        cell: &GroupCell,
    ) -> DatasetInsight {
        let change = percent_change(cell.a, cell.b);

        insight(
            ctx.dataset,
            InsightType::Anomaly,
            format!("{} shifted {:+.0}% in {}", shown, change, kpi.label),
            format!(
                "{}: {} vs {}, Δ{:+.1}% ({} → {}).",
                shown,
                ctx.label_a,
                ctx.label_b,
                change,
                format_value(cell.a, kpi.format),
                format_value(cell.b, kpi.format)
            ),
        )
        .with_severity(3)
        .with_confidence(0.8)
        .with_metadata(
            InsightMetadata::kpi(&kpi.label)
                .with_dimension(dimension)
                .with_value(value)
                .with_change(round1(change))
                .with_period(ctx.period()),
        )
    }

    /// Growth ranking for the first field, decline ranking for KPIs
    fn rankings(&self, ctx: &RuleContext<'_>, kpi_changes: &[KpiChange], out: &mut Vec<DatasetInsight>) {
        let size = self.thresholds.ranking_size;

        if let (Some(field), Some(kpi)) = (
            ctx.mapping.categorical_fields.first(),
            ctx.mapping.kpis.first(),
        ) {
            let mut cells = compare_groups(ctx.rows, &kpi.column, |row| row.text(field));
            if cells.len() >= self.thresholds.ranking_min_values {
                // Stable sort keeps first-seen order among equal growth
                cells.sort_by(|x, y| {
                    let gx = percent_change(x.a, x.b);
                    let gy = percent_change(y.a, y.b);
                    gy.total_cmp(&gx)
                });
                let top: Vec<String> = cells
                    .iter()
                    .take(size)
                    .map(|c| format!("{} ({:+.1}%)", display_key(&c.key), percent_change(c.a, c.b)))
                    .collect();

                out.push(
                    insight(
                        ctx.dataset,
                        InsightType::Suggestion,
                        format!("Fastest growing {} values", field),
                        format!(
                            "Top {} by {} growth from {} to {}: {}.",
                            field,
                            kpi.label,
                            ctx.label_a,
                            ctx.label_b,
                            top.join(", ")
                        ),
                    )
                    .with_severity(2)
                    .with_confidence(0.9)
                    .with_metadata(
                        InsightMetadata::kpi(&kpi.label)
                            .with_dimension(field.as_str())
                            .with_period(ctx.period()),
                    ),
                );
            }
        }

        let mut declining: Vec<&KpiChange> = kpi_changes.iter().filter(|k| k.change < 0.0).collect();
        if declining.len() >= self.thresholds.ranking_min_declining_kpis {
            declining.sort_by(|x, y| x.change.total_cmp(&y.change));
            let worst: Vec<String> = declining
                .iter()
                .take(size)
                .map(|k| format!("{} ({:+.1}%)", k.label, k.change))
                .collect();

            out.push(
                insight(
                    ctx.dataset,
                    InsightType::Suggestion,
                    "KPIs needing attention",
                    format!(
                        "Largest declines from {} to {}: {}.",
                        ctx.label_a,
                        ctx.label_b,
                        worst.join(", ")
                    ),
                )
                .with_severity(2)
                .with_confidence(0.9)
                .with_metadata(InsightMetadata::default().with_period(ctx.period())),
            );
        }
    }
}

#[async_trait]
impl InsightGenerator for RuleEngine {
    fn generated_by(&self) -> GeneratedBy {
        GeneratedBy::RuleEngine
    }

    fn name(&self) -> &'static str {
        "Rule Engine"
    }

    async fn generate(
        &self,
        dataset: &Dataset,
        filters: &DashboardFilters,
    ) -> Result<Vec<DatasetInsight>> {
        Ok(self.analyze(dataset, filters))
    }
}

struct RuleContext<'a> {
    dataset: &'a Dataset,
    mapping: &'a SchemaMapping,
    rows: &'a [&'a DataRow],
    label_a: &'a str,
    label_b: &'a str,
}

impl RuleContext<'_> {
    fn period(&self) -> String {
        format!("{} vs {}", self.label_a, self.label_b)
    }
}

struct KpiChange {
    label: String,
    change: f64,
}

/// The one summary every run produces
fn summary(ctx: &RuleContext<'_>, kpi_changes: &[KpiChange]) -> DatasetInsight {
    let average = if kpi_changes.is_empty() {
        0.0
    } else {
        kpi_changes.iter().map(|k| k.change).sum::<f64>() / kpi_changes.len() as f64
    };

    insight(
        ctx.dataset,
        InsightType::Summary,
        format!("{} vs {}", ctx.label_b, ctx.label_a),
        format!(
            "Across {} KPIs and {} rows, {} averages {:+.1}% against {}.",
            kpi_changes.len(),
            ctx.rows.len(),
            ctx.label_b,
            average,
            ctx.label_a
        ),
    )
    .with_severity(1)
    .with_confidence(1.0)
    .with_metadata(
        InsightMetadata::default()
            .with_change(round1(average))
            .with_period(ctx.period()),
    )
}

/// Largest total for the first field and first KPI
fn top_performer(ctx: &RuleContext<'_>, out: &mut Vec<DatasetInsight>) {
    let (Some(field), Some(kpi)) = (
        ctx.mapping.categorical_fields.first(),
        ctx.mapping.kpis.first(),
    ) else {
        return;
    };

    let totals = totals_by(ctx.rows, &kpi.column, |row| row.text(field));
    let Some((value, total)) = totals
        .iter()
        .fold(None::<(&String, f64)>, |best, (k, v)| match best {
            Some((_, b)) if b >= *v => best,
            _ => Some((k, *v)),
        })
    else {
        return;
    };

    out.push(
        insight(
            ctx.dataset,
            InsightType::Suggestion,
            format!("Top {}: {}", field, display_key(value)),
            format!(
                "{} leads {} with {} {} across both groups.",
                display_key(value),
                field,
                format_value(total, kpi.format),
                kpi.label
            ),
        )
        .with_severity(2)
        .with_confidence(1.0)
        .with_metadata(
            InsightMetadata::kpi(&kpi.label)
                .with_dimension(field.as_str())
                .with_value(value.as_str()),
        ),
    );
}

fn insight(
    dataset: &Dataset,
    insight_type: InsightType,
    title: impl Into<String>,
    message: impl Into<String>,
) -> DatasetInsight {
    DatasetInsight::new(&dataset.id, insight_type, GeneratedBy::RuleEngine, title, message)
}

/// `(b - a) / a * 100`, or 0 when there is no base to compare against
pub fn percent_change(a: f64, b: f64) -> f64 {
    if a == 0.0 {
        0.0
    } else {
        (b - a) / a * 100.0
    }
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

/// Population mean and standard deviation
fn mean_and_stddev(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

fn group_sums(rows: &[&DataRow], column: &str) -> (f64, f64) {
    rows.iter().fold((0.0, 0.0), |(a, b), row| match row.source_group {
        SourceGroup::GroupA => (a + row.number(column), b),
        SourceGroup::GroupB => (a, b + row.number(column)),
    })
}

fn display_key(value: &str) -> String {
    if value.is_empty() {
        "(blank)".to_string()
    } else {
        value.to_string()
    }
}

fn format_value(value: f64, format: KpiFormat) -> String {
    match format {
        KpiFormat::Currency => format!("${:.2}", value),
        KpiFormat::Percentage => format!("{:.1}%", value),
        KpiFormat::Number if value.fract() == 0.0 => format!("{:.0}", value),
        KpiFormat::Number => format!("{:.2}", value),
    }
}

/// Totals per key, in first-seen order
struct Totals {
    index: HashMap<String, usize>,
    entries: Vec<(String, f64)>,
}

impl Totals {
    fn len(&self) -> usize {
        self.entries.len()
    }

    fn iter(&self) -> impl Iterator<Item = &(String, f64)> {
        self.entries.iter()
    }
}

fn totals_by<F>(rows: &[&DataRow], column: &str, key_of: F) -> Totals
where
    F: Fn(&DataRow) -> String,
{
    let mut totals = Totals {
        index: HashMap::new(),
        entries: Vec::new(),
    };
    for &row in rows {
        let key = key_of(row);
        let amount = row.number(column);
        match totals.index.get(&key) {
            Some(&i) => totals.entries[i].1 += amount,
            None => {
                totals.index.insert(key.clone(), totals.entries.len());
                totals.entries.push((key, amount));
            }
        }
    }
    totals
}

/// Per-key totals split by source group
pub(crate) struct GroupCell {
    pub(crate) key: String,
    pub(crate) a: f64,
    pub(crate) b: f64,
    in_a: bool,
    in_b: bool,
}

/// Sum `column` per key and source group in one pass, keys in first-seen order
pub(crate) fn compare_groups<F>(rows: &[&DataRow], column: &str, key_of: F) -> Vec<GroupCell>
where
    F: Fn(&DataRow) -> String,
{
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut cells: Vec<GroupCell> = Vec::new();

    for &row in rows {
        let key = key_of(row);
        let i = *index.entry(key.clone()).or_insert_with(|| {
            cells.push(GroupCell {
                key,
                a: 0.0,
                b: 0.0,
                in_a: false,
                in_b: false,
            });
            cells.len() - 1
        });
        let amount = row.number(column);
        let cell = &mut cells[i];
        match row.source_group {
            SourceGroup::GroupA => {
                cell.a += amount;
                cell.in_a = true;
            }
            SourceGroup::GroupB => {
                cell.b += amount;
                cell.in_b = true;
            }
        }
    }

    cells
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset_with(rows: Vec<DataRow>, kpis: &[&str], fields: &[&str]) -> Dataset {
        let mut dataset = Dataset::new("ds-1", "user-1", "Test");
        dataset.schema_mapping = Some(SchemaMapping {
            dimension: fields.first().map(|f| f.to_string()).unwrap_or_default(),
            date_field: None,
            kpis: kpis.iter().map(|k| KpiField::simple(*k)).collect(),
            categorical_fields: fields.iter().map(|f| f.to_string()).collect(),
        });
        dataset.rows = rows;
        dataset
    }

    fn row(group: SourceGroup, region: &str, revenue: f64) -> DataRow {
        DataRow::new(group).with("region", region).with("revenue", revenue)
    }

    fn count(insights: &[DatasetInsight], t: InsightType) -> usize {
        insights.iter().filter(|i| i.insight_type == t).count()
    }

    #[test]
    fn test_no_mapping_gives_single_summary() {
        let mut dataset = Dataset::new("ds-1", "user-1", "Unmapped");
        dataset.rows = vec![row(SourceGroup::GroupA, "North", 10.0)];

        let insights = RuleEngine::new().analyze(&dataset, &DashboardFilters::new());
        assert_eq!(insights.len(), 1);
        assert_eq!(insights[0].insight_type, InsightType::Summary);
        assert_eq!(insights[0].generated_by, GeneratedBy::RuleEngine);
    }

    #[test]
    fn test_trend_warning_at_minus_fifty() {
        let dataset = dataset_with(
            vec![
                row(SourceGroup::GroupA, "North", 200.0),
                row(SourceGroup::GroupB, "North", 100.0),
            ],
            &["revenue"],
            &[],
        );

        let insights = RuleEngine::new().analyze(&dataset, &DashboardFilters::new());
        let warning = insights
            .iter()
            .find(|i| i.insight_type == InsightType::Warning)
            .expect("warning present");
        assert_eq!(warning.severity, 4);
        assert_eq!(warning.icon, "📉");
        assert_eq!(warning.metadata.change, Some(-50.0));
    }

    #[test]
    fn test_moderate_rise_is_severity_three_trend() {
        let dataset = dataset_with(
            vec![
                row(SourceGroup::GroupA, "North", 100.0),
                row(SourceGroup::GroupB, "North", 140.0),
            ],
            &["revenue"],
            &[],
        );

        let insights = RuleEngine::new().analyze(&dataset, &DashboardFilters::new());
        let trend = insights
            .iter()
            .find(|i| i.insight_type == InsightType::Trend)
            .expect("trend present");
        assert_eq!(trend.severity, 3);
        assert_eq!(trend.icon, "📈");
    }

    #[test]
    fn test_raised_threshold_suppresses_trend() {
        let dataset = dataset_with(
            vec![
                row(SourceGroup::GroupA, "North", 100.0),
                row(SourceGroup::GroupB, "North", 140.0),
            ],
            &["revenue"],
            &[],
        );
        let engine = RuleEngine::with_thresholds(RuleThresholds {
            trend_percent: 45.0,
            ..RuleThresholds::default()
        });
        assert_eq!(engine.thresholds().trend_percent, 45.0);
        assert_eq!(engine.thresholds().ranking_size, 3);

        let insights = engine.analyze(&dataset, &DashboardFilters::new());
        assert_eq!(count(&insights, InsightType::Trend), 0);
        assert_eq!(count(&insights, InsightType::Summary), 1);
    }

    #[test]
    fn test_small_change_has_no_trend() {
        let dataset = dataset_with(
            vec![
                row(SourceGroup::GroupA, "North", 100.0),
                row(SourceGroup::GroupB, "North", 125.0),
            ],
            &["revenue"],
            &[],
        );

        let insights = RuleEngine::new().analyze(&dataset, &DashboardFilters::new());
        assert_eq!(count(&insights, InsightType::Trend), 0);
        assert_eq!(count(&insights, InsightType::Warning), 0);
    }

    #[test]
    fn test_zero_base_never_trends() {
        let dataset = dataset_with(
            vec![
                row(SourceGroup::GroupA, "North", 0.0),
                row(SourceGroup::GroupB, "North", 500.0),
            ],
            &["revenue"],
            &["region"],
        );

        let insights = RuleEngine::new().analyze(&dataset, &DashboardFilters::new());
        assert_eq!(count(&insights, InsightType::Trend), 0);
        assert_eq!(count(&insights, InsightType::Warning), 0);
        assert_eq!(count(&insights, InsightType::Anomaly), 0);
        assert!(insights.iter().all(|i| i.message.find("inf").is_none()));
    }

    #[test]
    fn test_exactly_one_summary_across_filters() {
        let dataset = dataset_with(
            vec![
                row(SourceGroup::GroupA, "North", 100.0),
                row(SourceGroup::GroupA, "South", 50.0),
                row(SourceGroup::GroupB, "North", 20.0),
                row(SourceGroup::GroupB, "South", 90.0),
            ],
            &["revenue"],
            &["region"],
        );
        let engine = RuleEngine::new();

        for filters in [
            DashboardFilters::new(),
            DashboardFilters::new().with_values("region", ["North"]),
            DashboardFilters::new().with_values("region", ["South"]),
            DashboardFilters::new().with_values("region", ["Nowhere"]),
        ] {
            let insights = engine.analyze(&dataset, &filters);
            assert_eq!(count(&insights, InsightType::Summary), 1);
            assert_eq!(insights.last().unwrap().insight_type, InsightType::Summary);
        }
    }

    #[test]
    fn test_summary_averages_kpi_changes() {
        let dataset = dataset_with(
            vec![
                DataRow::new(SourceGroup::GroupA).with("revenue", 100).with("units", 10),
                DataRow::new(SourceGroup::GroupB).with("revenue", 120).with("units", 5),
            ],
            &["revenue", "units"],
            &[],
        );

        let insights = RuleEngine::new().analyze(&dataset, &DashboardFilters::new());
        let summary = insights
            .iter()
            .find(|i| i.insight_type == InsightType::Summary)
            .unwrap();
        // (+20 + -50) / 2
        assert_eq!(summary.metadata.change, Some(-15.0));
        assert_eq!(summary.severity, 1);
        assert_eq!(summary.confidence, 1.0);
    }

    #[test]
    fn test_statistical_outlier() {
        let mut rows = Vec::new();
        for store in ["s1", "s2", "s3", "s4", "s5", "s6", "s7"] {
            rows.push(DataRow::new(SourceGroup::GroupA).with("store", store).with("revenue", 10));
        }
        rows.push(DataRow::new(SourceGroup::GroupB).with("store", "s8").with("revenue", 500));
        let dataset = dataset_with(rows, &["revenue"], &["store"]);

        let insights = RuleEngine::new().analyze(&dataset, &DashboardFilters::new());
        let outliers: Vec<_> = insights
            .iter()
            .filter(|i| {
                i.insight_type == InsightType::Anomaly
                    && i.metadata.dimension.as_deref() == Some("store")
            })
            .collect();
        assert_eq!(outliers.len(), 1);
        assert_eq!(outliers[0].metadata.value, Some(serde_json::json!("s8")));
        assert_eq!(outliers[0].severity, 4);
        assert_eq!(outliers[0].confidence, 0.85);
    }

    #[test]
    fn test_uniform_values_have_no_outliers() {
        let rows = ["a", "b", "c", "d"]
            .iter()
            .map(|s| DataRow::new(SourceGroup::GroupA).with("store", *s).with("revenue", 10))
            .collect();
        let dataset = dataset_with(rows, &["revenue"], &["store"]);

        let insights = RuleEngine::new().analyze(&dataset, &DashboardFilters::new());
        assert_eq!(count(&insights, InsightType::Anomaly), 0);
    }

    #[test]
    fn test_comparative_anomaly_names_both_groups() {
        let mut dataset = dataset_with(
            vec![
                row(SourceGroup::GroupA, "North", 100.0),
                row(SourceGroup::GroupB, "North", 150.0),
                row(SourceGroup::GroupA, "South", 100.0),
                row(SourceGroup::GroupB, "South", 105.0),
            ],
            &["revenue"],
            &["region"],
        );
        dataset.source_config.group_a.label = "2023".into();
        dataset.source_config.group_b.label = "2024".into();

        let insights = RuleEngine::new().analyze(&dataset, &DashboardFilters::new());
        let anomalies: Vec<_> = insights
            .iter()
            .filter(|i| i.insight_type == InsightType::Anomaly)
            .collect();
        assert_eq!(anomalies.len(), 1);
        let north = anomalies[0];
        assert!(north.message.contains("North"));
        assert!(north.message.contains("2023 vs 2024"));
        assert_eq!(north.metadata.change, Some(50.0));
        assert_eq!(north.metadata.dimension.as_deref(), Some("region"));
    }

    #[test]
    fn test_comparative_skips_zero_base() {
        let dataset = dataset_with(
            vec![
                row(SourceGroup::GroupA, "North", 0.0),
                row(SourceGroup::GroupB, "North", 80.0),
                row(SourceGroup::GroupA, "South", 100.0),
                row(SourceGroup::GroupB, "South", 100.0),
            ],
            &["revenue"],
            &["region"],
        );

        let insights = RuleEngine::new().analyze(&dataset, &DashboardFilters::new());
        assert!(insights
            .iter()
            .filter(|i| i.insight_type == InsightType::Anomaly)
            .all(|i| i.metadata.value != Some(serde_json::json!("North"))));
    }

    #[test]
    fn test_combined_dimension_uses_observed_tuples() {
        let rows = vec![
            DataRow::new(SourceGroup::GroupA).with("region", "North").with("channel", "web").with("revenue", 100),
            DataRow::new(SourceGroup::GroupB).with("region", "North").with("channel", "web").with("revenue", 300),
            DataRow::new(SourceGroup::GroupA).with("region", "North").with("channel", "store").with("revenue", 300),
            DataRow::new(SourceGroup::GroupB).with("region", "North").with("channel", "store").with("revenue", 100),
        ];
        let dataset = dataset_with(rows, &["revenue"], &["region", "channel"]);

        let insights = RuleEngine::new().analyze(&dataset, &DashboardFilters::new());
        let combined: Vec<_> = insights
            .iter()
            .filter(|i| i.metadata.dimension.as_deref() == Some(COMBINED_DIMENSION))
            .collect();
        assert_eq!(combined.len(), 2);
        assert!(combined
            .iter()
            .any(|i| i.message.contains("region=North, channel=web")));
        // North alone is flat (400 vs 400), so no single-field anomaly for it
        assert!(!insights.iter().any(|i| {
            i.metadata.dimension.as_deref() == Some("region") && i.insight_type == InsightType::Anomaly
        }));
    }

    #[test]
    fn test_top_performer_and_rankings() {
        let dataset = dataset_with(
            vec![
                DataRow::new(SourceGroup::GroupA).with("region", "North").with("revenue", 100).with("units", 50),
                DataRow::new(SourceGroup::GroupB).with("region", "North").with("revenue", 110).with("units", 40),
                DataRow::new(SourceGroup::GroupA).with("region", "South").with("revenue", 50).with("units", 20),
                DataRow::new(SourceGroup::GroupB).with("region", "South").with("revenue", 60).with("units", 10),
                DataRow::new(SourceGroup::GroupA).with("region", "East").with("revenue", 10).with("units", 5),
                DataRow::new(SourceGroup::GroupB).with("region", "East").with("revenue", 11).with("units", 4),
            ],
            &["revenue", "units"],
            &["region"],
        );

        let insights = RuleEngine::new().analyze(&dataset, &DashboardFilters::new());
        let suggestions: Vec<_> = insights
            .iter()
            .filter(|i| i.insight_type == InsightType::Suggestion)
            .collect();

        let top = suggestions
            .iter()
            .find(|i| i.title.starts_with("Top region"))
            .unwrap();
        assert!(top.title.contains("North"));
        assert_eq!(top.severity, 2);

        let growth = suggestions
            .iter()
            .find(|i| i.title.starts_with("Fastest growing"))
            .unwrap();
        // South +20% ranks ahead of North and East (+10%)
        let south = growth.message.find("South").unwrap();
        let north = growth.message.find("North").unwrap();
        assert!(south < north);

        // Only one KPI declines, so no KPI ranking
        assert!(!suggestions.iter().any(|i| i.title == "KPIs needing attention"));
    }

    #[test]
    fn test_declining_kpi_ranking() {
        let dataset = dataset_with(
            vec![
                DataRow::new(SourceGroup::GroupA).with("revenue", 100).with("units", 100).with("visits", 100),
                DataRow::new(SourceGroup::GroupB).with("revenue", 90).with("units", 60).with("visits", 120),
            ],
            &["revenue", "units", "visits"],
            &[],
        );

        let insights = RuleEngine::new().analyze(&dataset, &DashboardFilters::new());
        let ranking = insights
            .iter()
            .find(|i| i.title == "KPIs needing attention")
            .expect("ranking present");
        let units = ranking.message.find("units").unwrap();
        let revenue = ranking.message.find("revenue").unwrap();
        assert!(units < revenue);
        assert!(!ranking.message.contains("visits"));
    }

    #[test]
    fn test_malformed_cells_coerce_to_zero() {
        let dataset = dataset_with(
            vec![
                DataRow::new(SourceGroup::GroupA).with("region", "North").with("revenue", "n/a"),
                DataRow::new(SourceGroup::GroupB).with("region", "North").with("revenue", serde_json::Value::Null),
                DataRow::new(SourceGroup::GroupB).with("region", serde_json::json!(["odd"])),
            ],
            &["revenue"],
            &["region"],
        );

        let insights = RuleEngine::new().analyze(&dataset, &DashboardFilters::new());
        assert_eq!(count(&insights, InsightType::Summary), 1);
        assert!(insights
            .iter()
            .all(|i| i.metadata.change.map(f64::is_finite).unwrap_or(true)));
    }

    #[test]
    fn test_sorted_by_severity() {
        let dataset = dataset_with(
            vec![
                row(SourceGroup::GroupA, "North", 200.0),
                row(SourceGroup::GroupB, "North", 100.0),
                row(SourceGroup::GroupA, "South", 100.0),
                row(SourceGroup::GroupB, "South", 100.0),
                row(SourceGroup::GroupA, "East", 100.0),
                row(SourceGroup::GroupB, "East", 100.0),
            ],
            &["revenue"],
            &["region"],
        );

        let insights = RuleEngine::new().analyze(&dataset, &DashboardFilters::new());
        assert!(insights.windows(2).all(|w| w[0].severity >= w[1].severity));
    }

    #[tokio::test]
    async fn test_generator_trait() {
        let dataset = dataset_with(vec![], &["revenue"], &["region"]);
        let engine = RuleEngine::new();

        assert_eq!(engine.generated_by(), GeneratedBy::RuleEngine);
        let insights = engine.generate(&dataset, &DashboardFilters::new()).await.unwrap();
        assert_eq!(insights.len(), 1);
    }
}
