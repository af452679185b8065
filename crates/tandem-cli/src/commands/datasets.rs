//! Dataset command implementations (load, list)

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde_json::Value;
use tandem_core::db::Database;
use tandem_core::models::{Dataset, SourceGroup};

use super::truncate;

/// Read a dataset file, applying `--owner` / `--id` overrides
pub fn read_dataset_file(file: &Path, owner: Option<&str>, id: Option<&str>) -> Result<Dataset> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let mut value: Value = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not valid JSON", file.display()))?;

    let Some(object) = value.as_object_mut() else {
        bail!("{} must contain a single dataset object", file.display());
    };
    if let Some(owner) = owner {
        object.insert("ownerId".into(), Value::String(owner.to_string()));
    }
    if let Some(id) = id {
        object.insert("id".into(), Value::String(id.to_string()));
    }

    let dataset: Dataset = serde_json::from_value(value).context("Invalid dataset file")?;
    if dataset.id.trim().is_empty() {
        bail!("Dataset id must not be empty (set \"id\" or pass --id)");
    }
    if dataset.owner_id.trim().is_empty() {
        bail!("Dataset owner must not be empty (set \"ownerId\" or pass --owner)");
    }

    Ok(dataset)
}

pub fn cmd_load(db: &Database, file: &Path, owner: Option<&str>, id: Option<&str>) -> Result<()> {
    println!("📥 Loading {}...", file.display());

    let dataset = read_dataset_file(file, owner, id)?;
    let group_a = dataset
        .rows
        .iter()
        .filter(|r| r.source_group == SourceGroup::GroupA)
        .count();
    let group_b = dataset.rows.len() - group_a;

    if dataset.schema_mapping.is_none() {
        println!("   ⚠️  No schemaMapping: only a summary insight can be generated");
    }

    db.upsert_dataset(&dataset).context("Failed to save dataset")?;
    db.log_audit(
        &dataset.owner_id,
        "load",
        Some("dataset"),
        Some(&dataset.id),
        Some(&format!("rows={}", dataset.rows.len())),
    )?;

    println!("✅ Loaded dataset '{}' ({})", dataset.name, dataset.id);
    println!(
        "   {}: {} rows",
        dataset.source_config.label(SourceGroup::GroupA),
        group_a
    );
    println!(
        "   {}: {} rows",
        dataset.source_config.label(SourceGroup::GroupB),
        group_b
    );
    println!(
        "   AI insights: {}",
        if dataset.ai_config.allows_insights() {
            "allowed"
        } else {
            "off"
        }
    );

    Ok(())
}

pub fn cmd_datasets(db: &Database, user: &str) -> Result<()> {
    let datasets = db.list_datasets(user)?;

    if datasets.is_empty() {
        println!("No datasets for {}. Load one with: tandem load --file dataset.json", user);
        return Ok(());
    }

    println!("{:<24} {:<32} {:<10} {:>8}", "ID", "NAME", "STATUS", "ROWS");
    println!("{}", "-".repeat(77));
    for d in &datasets {
        println!(
            "{:<24} {:<32} {:<10} {:>8}",
            truncate(&d.id, 24),
            truncate(&d.name, 32),
            d.status.as_str(),
            d.row_count
        );
    }

    Ok(())
}
