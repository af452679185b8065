//! Insight command implementations

use anyhow::{bail, Result};
use tandem_core::db::Database;
use tandem_core::{DashboardFilters, InsightOrchestrator};

use super::truncate;

/// Parse repeated `--filter field=v1,v2` arguments
pub fn parse_filter_args(args: &[String]) -> Result<DashboardFilters> {
    let mut filters = DashboardFilters::new();

    for arg in args {
        let Some((field, values)) = arg.split_once('=') else {
            bail!("Invalid filter '{}' (expected field=value1,value2)", arg);
        };
        let field = field.trim();
        if field.is_empty() {
            bail!("Invalid filter '{}' (empty field name)", arg);
        }

        let values: Vec<String> = values
            .split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .collect();
        filters
            .categorical
            .entry(field.to_string())
            .or_default()
            .extend(values);
    }

    Ok(filters)
}

fn orchestrator(db: &Database) -> InsightOrchestrator {
    tandem_server::orchestrator_from_env(db)
}

pub async fn cmd_insights(
    db: &Database,
    dataset_id: &str,
    user: &str,
    filters: &DashboardFilters,
    json: bool,
) -> Result<()> {
    let orchestrator = orchestrator(db);
    let result = orchestrator
        .generate(dataset_id, user, filters, false)
        .await?;

    db.log_audit(
        user,
        "insights",
        Some("dataset"),
        Some(dataset_id),
        Some(&format!("count={}, source=cli", result.insights.len())),
    )?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    println!(
        "💡 {} insights for {} (by {}, {} ms)",
        result.insights.len(),
        dataset_id,
        result.generated_by,
        result.elapsed_ms
    );
    if !filters.is_empty() {
        for (field, values) in filters.active() {
            println!("   filter {}: {}", field, values.join(", "));
        }
    }
    println!();

    for insight in &result.insights {
        println!(
            "{} [{}] {} (severity {})",
            insight.icon,
            insight.insight_type.as_str(),
            insight.title,
            insight.severity
        );
        println!("   {}", truncate(&insight.message, 160));
    }

    Ok(())
}

pub async fn cmd_summary(
    db: &Database,
    dataset_id: &str,
    user: &str,
    filters: &DashboardFilters,
) -> Result<()> {
    let orchestrator = orchestrator(db);
    if orchestrator.ai().is_none() {
        println!("   💡 Tip: Set OPENAI_COMPATIBLE_HOST and TANDEM_AI_ENABLED=true for AI summaries");
    }

    let summary = orchestrator.summarize(dataset_id, user, filters).await?;

    db.log_audit(user, "summary", Some("dataset"), Some(dataset_id), None)?;

    println!("📝 Summary of {} ({})", dataset_id, summary.model);
    println!();
    println!("{}", summary.text);

    Ok(())
}
