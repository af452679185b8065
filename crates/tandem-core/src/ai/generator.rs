//! AI Insight Generator
//!
//! Builds a prompt from aggregates of the filtered rows (never raw records),
//! redacts every dynamic value, sends it to the configured backend under the
//! task deadline from the model router, and normalizes the reply.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;

use crate::error::{Error, Result};
use crate::filter::{apply_filters, DashboardFilters};
use crate::insights::engine::InsightGenerator;
use crate::insights::rules::{compare_groups, percent_change};
use crate::insights::types::{sort_by_severity, DatasetInsight, GeneratedBy};
use crate::model_router::{ModelRouter, TaskType};
use crate::models::{DataRow, Dataset, SourceGroup};
use crate::prompts::{PromptId, PromptLibrary};

use super::openai_compatible::truncate;
use super::parsing::{enforce_single_summary, parse_insights};
use super::redact::redacted;
use super::types::{ChatRequest, ChatResponse, NarrativeSummary};
use super::{AIBackend, AIClient};

/// Dimension values listed in the prompt breakdown
const MAX_DIMENSION_LINES: usize = 10;

/// Insight generator backed by a chat completion model
#[derive(Clone)]
pub struct AiInsightGenerator {
    client: AIClient,
    router: Arc<ModelRouter>,
    prompts: Arc<RwLock<PromptLibrary>>,
}

impl AiInsightGenerator {
    /// Generator with the default model config and prompt library
    pub fn new(client: AIClient) -> Self {
        Self {
            client,
            router: Arc::new(ModelRouter::default()),
            prompts: Arc::new(RwLock::new(PromptLibrary::new())),
        }
    }

    pub fn with_router(mut self, router: ModelRouter) -> Self {
        self.router = Arc::new(router);
        self
    }

    pub fn with_prompts(mut self, prompts: PromptLibrary) -> Self {
        self.prompts = Arc::new(RwLock::new(prompts));
        self
    }

    pub fn client(&self) -> &AIClient {
        &self.client
    }

    pub fn router(&self) -> &ModelRouter {
        &self.router
    }

    /// Render the redacted request for a prompt without sending it
    pub fn build_request(
        &self,
        prompt_id: PromptId,
        task: TaskType,
        dataset: &Dataset,
        filters: &DashboardFilters,
    ) -> Result<ChatRequest> {
        let vars = prompt_vars(dataset, filters);

        let (system, user) = {
            let mut prompts = self
                .prompts
                .write()
                .map_err(|_| Error::Config("Failed to acquire prompt library lock".into()))?;
            let template = prompts.get(prompt_id)?;
            (template.render_system(&vars), template.render_user(&vars))
        };

        let task_config = self.router.config_for_task(task);
        let mut request = ChatRequest::new(task, user)
            .with_model(task_config.model)
            .with_temperature(task_config.temperature);
        if let Some(system) = system {
            request = request.with_system(system);
        }
        Ok(request)
    }

    /// Send a request, bounded by the task's deadline
    async fn call(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let deadline = self.router.timeout_for_task(request.task);
        match tokio::time::timeout(deadline, self.client.complete(request)).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout(deadline)),
        }
    }

    /// Write a free-text comparison of the filtered rows
    pub async fn summarize(
        &self,
        dataset: &Dataset,
        filters: &DashboardFilters,
    ) -> Result<NarrativeSummary> {
        let request = self.build_request(
            PromptId::SummarizeDataset,
            TaskType::Narrative,
            dataset,
            filters,
        )?;
        let response = self.call(&request).await?;

        let text = response.content.trim();
        if text.is_empty() {
            return Err(Error::AiResponse("Empty narrative summary".into()));
        }

        Ok(NarrativeSummary {
            dataset_id: dataset.id.clone(),
            text: text.to_string(),
            model: response.model,
            generated_at: Utc::now(),
        })
    }
}

#[async_trait]
impl InsightGenerator for AiInsightGenerator {
    fn generated_by(&self) -> GeneratedBy {
        GeneratedBy::AiModel
    }

    fn name(&self) -> &'static str {
        "AI Insight Generator"
    }

    async fn generate(
        &self,
        dataset: &Dataset,
        filters: &DashboardFilters,
    ) -> Result<Vec<DatasetInsight>> {
        let request = self
            .build_request(
                PromptId::GenerateInsights,
                TaskType::InsightExtraction,
                dataset,
                filters,
            )?
            .json();

        let response = self.call(&request).await?;
        debug!(
            dataset_id = %dataset.id,
            model = %response.model,
            "AI insight response: {}",
            truncate(&response.content, 500)
        );

        let mut insights = parse_insights(&response.content, &dataset.id)?;
        enforce_single_summary(&mut insights)?;
        sort_by_severity(&mut insights);
        Ok(insights)
    }
}

/// Redacted template variables describing the filtered comparison
pub fn prompt_vars(dataset: &Dataset, filters: &DashboardFilters) -> HashMap<&'static str, String> {
    let rows = apply_filters(&dataset.rows, filters);
    let count = |group: SourceGroup| rows.iter().filter(|r| r.source_group == group).count();

    let mut vars = HashMap::new();
    vars.insert("dataset_name", redacted(&dataset.name));
    vars.insert(
        "dataset_description",
        redacted(dataset.description.as_deref().unwrap_or_default()),
    );
    vars.insert(
        "label_a",
        redacted(dataset.source_config.label(SourceGroup::GroupA)),
    );
    vars.insert(
        "label_b",
        redacted(dataset.source_config.label(SourceGroup::GroupB)),
    );
    vars.insert("rows_a", count(SourceGroup::GroupA).to_string());
    vars.insert("rows_b", count(SourceGroup::GroupB).to_string());
    vars.insert("sample_size", rows.len().to_string());
    vars.insert("filters", redacted(&describe_filters(filters)));
    vars.insert("kpis", redacted(&describe_kpis(dataset, &rows)));
    vars.insert("dimensions", redacted(&describe_dimension(dataset, &rows)));
    vars.insert(
        "user_context",
        redacted(dataset.ai_config.user_context.as_deref().unwrap_or_default()),
    );
    vars
}

fn describe_filters(filters: &DashboardFilters) -> String {
    filters
        .active()
        .map(|(field, values)| format!("- {}: {}", field, values.join(", ")))
        .collect::<Vec<_>>()
        .join("\n")
}

fn describe_kpis(dataset: &Dataset, rows: &[&DataRow]) -> String {
    let Some(mapping) = dataset.schema_mapping.as_ref().filter(|m| !m.kpis.is_empty()) else {
        return "- (no KPIs mapped)".to_string();
    };

    mapping
        .kpis
        .iter()
        .map(|kpi| {
            let (a, b) = sums(rows, &kpi.column);
            format!(
                "- {}: {} -> {} ({:+.1}%)",
                kpi.label,
                format_amount(a),
                format_amount(b),
                percent_change(a, b)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn describe_dimension(dataset: &Dataset, rows: &[&DataRow]) -> String {
    let Some(mapping) = dataset.schema_mapping.as_ref() else {
        return String::new();
    };
    let (Some(field), Some(kpi)) = (mapping.categorical_fields.first(), mapping.kpis.first())
    else {
        return String::new();
    };

    let mut lines: Vec<(f64, String)> = compare_groups(rows, &kpi.column, |row| row.text(field))
        .into_iter()
        .map(|cell| {
            let line = format!(
                "- {}={}: {} -> {} ({:+.1}%)",
                field,
                cell.key,
                format_amount(cell.a),
                format_amount(cell.b),
                percent_change(cell.a, cell.b)
            );
            (cell.a + cell.b, line)
        })
        .collect();
    lines.sort_by(|x, y| y.0.total_cmp(&x.0));

    lines
        .into_iter()
        .take(MAX_DIMENSION_LINES)
        .map(|(_, line)| line)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Group A and group B totals of a column
fn sums(rows: &[&DataRow], column: &str) -> (f64, f64) {
    let mut a = 0.0;
    let mut b = 0.0;
    for &row in rows {
        match row.source_group {
            SourceGroup::GroupA => a += row.number(column),
            SourceGroup::GroupB => b += row.number(column),
        }
    }
    (a, b)
}

/// Two decimals with thousands separators (`1,234,567.89`)
fn format_amount(value: f64) -> String {
    let formatted = format!("{:.2}", value.abs());
    let (int_part, frac_part) = formatted.split_once('.').unwrap_or((&formatted, "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if value < 0.0 { "-" } else { "" };
    format!("{}{}.{}", sign, grouped, frac_part)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::MockBackend;
    use crate::models::{KpiField, SchemaMapping};
    use std::time::Duration;

    fn dataset() -> Dataset {
        let mut dataset = Dataset::new("ds-1", "user-1", "Sales 2023 vs 2024");
        dataset.schema_mapping = Some(SchemaMapping {
            dimension: "region".into(),
            date_field: None,
            kpis: vec![KpiField::simple("revenue")],
            categorical_fields: vec!["region".into()],
        });
        dataset.rows = vec![
            DataRow::new(SourceGroup::GroupA).with("region", "North").with("revenue", 1000),
            DataRow::new(SourceGroup::GroupB).with("region", "North").with("revenue", 1500),
            DataRow::new(SourceGroup::GroupA).with("region", "South").with("revenue", 400),
        ];
        dataset
    }

    fn generator(mock: MockBackend) -> AiInsightGenerator {
        AiInsightGenerator::new(AIClient::Mock(mock))
            .with_router(ModelRouter::with_config(Default::default()))
            .with_prompts(PromptLibrary::embedded_only())
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(0.0), "0.00");
        assert_eq!(format_amount(999.5), "999.50");
        assert_eq!(format_amount(1234567.891), "1,234,567.89");
        assert_eq!(format_amount(-1000.0), "-1,000.00");
    }

    #[test]
    fn test_prompt_contains_aggregates() {
        let gen = generator(MockBackend::new());
        let request = gen
            .build_request(
                PromptId::GenerateInsights,
                TaskType::InsightExtraction,
                &dataset(),
                &DashboardFilters::new(),
            )
            .unwrap();

        assert!(request.system.as_deref().unwrap().contains("\"insights\""));
        assert!(request.user.contains("Sales 2023 vs 2024"));
        assert!(request.user.contains("- revenue: 1,400.00 -> 1,500.00 (+7.1%)"));
        assert!(request.user.contains("region=North"));
        assert!(request.user.contains("Rows analysed after filtering: 3"));
        assert!(!request.user.contains("Active filters"));
    }

    #[test]
    fn test_dimension_breakdown_keeps_largest_values() {
        let mut dataset = dataset();
        dataset.rows = (0i64..500)
            .flat_map(|i| {
                let region = format!("r{}", i % 50);
                [
                    DataRow::new(SourceGroup::GroupA)
                        .with("region", region.as_str())
                        .with("revenue", i % 50),
                    DataRow::new(SourceGroup::GroupB)
                        .with("region", region.as_str())
                        .with("revenue", 1),
                ]
            })
            .collect();

        let vars = prompt_vars(&dataset, &DashboardFilters::new());
        let lines: Vec<&str> = vars["dimensions"].lines().collect();
        assert_eq!(lines.len(), MAX_DIMENSION_LINES);
        assert_eq!(lines[0], "- region=r49: 490.00 -> 10.00 (-98.0%)");
        assert!(lines[9].starts_with("- region=r40:"));
        assert!(!vars["dimensions"].contains("region=r39:"));
    }

    #[test]
    fn test_prompt_redacts_filters_and_context() {
        let mut dataset = dataset();
        dataset.ai_config.user_context = Some("Escalate to ops@example.com".into());
        dataset.description = Some("Account 4111111111111111".into());
        let filters = DashboardFilters::new()
            .with_values("owner", ["jane@example.com"])
            .with_values("ref", ["123456789"]);

        let gen = generator(MockBackend::new());
        let request = gen
            .build_request(
                PromptId::GenerateInsights,
                TaskType::InsightExtraction,
                &dataset,
                &filters,
            )
            .unwrap();

        assert!(request.user.contains("[REDACTED_EMAIL]"));
        assert!(request.user.contains("[REDACTED_NUMBER]"));
        assert!(!request.user.contains("jane@example.com"));
        assert!(!request.user.contains("123456789"));
        assert!(!request.user.contains("ops@example.com"));
        assert!(!request.user.contains("4111111111111111"));
    }

    #[tokio::test]
    async fn test_generate_stamps_ai_provenance() {
        let mock = MockBackend::new();
        let gen = generator(mock.clone());

        let insights = gen.generate(&dataset(), &DashboardFilters::new()).await.unwrap();
        assert!(!insights.is_empty());
        assert!(insights.iter().all(|i| i.generated_by == GeneratedBy::AiModel));
        assert!(insights.iter().all(|i| i.dataset_id == "ds-1"));
        assert!(insights.windows(2).all(|w| w[0].severity >= w[1].severity));

        let sent = &mock.requests()[0];
        assert!(sent.json_response);
        assert_eq!(sent.task, TaskType::InsightExtraction);
    }

    #[tokio::test]
    async fn test_garbage_response_is_error() {
        let gen = generator(MockBackend::responding("I cannot help with that"));
        let err = gen
            .generate(&dataset(), &DashboardFilters::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AiResponse(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_enforced() {
        let gen = generator(MockBackend::new().with_delay(Duration::from_secs(60)));
        let err = gen
            .generate(&dataset(), &DashboardFilters::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout(d) if d == Duration::from_secs(5)));
    }

    #[tokio::test]
    async fn test_summarize() {
        let mock = MockBackend::new();
        let gen = generator(mock.clone());

        let summary = gen.summarize(&dataset(), &DashboardFilters::new()).await.unwrap();
        assert_eq!(summary.dataset_id, "ds-1");
        assert!(!summary.text.is_empty());
        assert_eq!(mock.requests()[0].task, TaskType::Narrative);
        assert!(!mock.requests()[0].json_response);
    }
}
