//! Dataset operations

use rusqlite::{params, OptionalExtension, Row};

use super::{parse_datetime, Database, DATETIME_FORMAT};
use crate::error::{Error, Result};
use crate::models::{Dataset, DatasetStatus, DatasetSummary};

impl Database {
    /// Insert or replace a dataset with all of its rows
    pub fn upsert_dataset(&self, dataset: &Dataset) -> Result<()> {
        let conn = self.conn()?;

        let source_config = serde_json::to_string(&dataset.source_config)?;
        let schema_mapping = dataset
            .schema_mapping
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let ai_config = serde_json::to_string(&dataset.ai_config)?;
        let rows = serde_json::to_string(&dataset.rows)?;
        let created_at = dataset.created_at.format(DATETIME_FORMAT).to_string();

        conn.execute(
            r#"
            INSERT INTO datasets (
                id, owner_id, name, description, status, source_config,
                schema_mapping, ai_config, rows, row_count, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                owner_id = excluded.owner_id,
                name = excluded.name,
                description = excluded.description,
                status = excluded.status,
                source_config = excluded.source_config,
                schema_mapping = excluded.schema_mapping,
                ai_config = excluded.ai_config,
                rows = excluded.rows,
                row_count = excluded.row_count,
                updated_at = CURRENT_TIMESTAMP
            "#,
            params![
                dataset.id,
                dataset.owner_id,
                dataset.name,
                dataset.description,
                dataset.status.as_str(),
                source_config,
                schema_mapping,
                ai_config,
                rows,
                dataset.rows.len() as i64,
                created_at
            ],
        )?;

        Ok(())
    }

    /// Get a dataset with its rows
    pub fn get_dataset(&self, id: &str) -> Result<Option<Dataset>> {
        let conn = self.conn()?;

        let raw = conn
            .query_row(
                r#"
                SELECT id, owner_id, name, description, status, source_config,
                       schema_mapping, ai_config, rows, created_at
                FROM datasets WHERE id = ?
                "#,
                params![id],
                RawDataset::from_row,
            )
            .optional()?;

        raw.map(RawDataset::into_dataset).transpose()
    }

    /// List datasets owned by a user, newest first (rows not loaded)
    pub fn list_datasets(&self, owner_id: &str) -> Result<Vec<DatasetSummary>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, owner_id, name, status, row_count, created_at
            FROM datasets
            WHERE owner_id = ?
            ORDER BY created_at DESC, name
            "#,
        )?;

        let datasets = stmt
            .query_map(params![owner_id], |row| {
                let status_str: String = row.get(3)?;
                let row_count: i64 = row.get(4)?;
                let created_at_str: String = row.get(5)?;

                Ok(DatasetSummary {
                    id: row.get(0)?,
                    owner_id: row.get(1)?,
                    name: row.get(2)?,
                    status: status_str.parse().unwrap_or(DatasetStatus::Error),
                    row_count: usize::try_from(row_count).unwrap_or(0),
                    created_at: parse_datetime(&created_at_str),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(datasets)
    }

    /// Delete a dataset owned by `owner_id`; returns whether a row was removed
    pub fn delete_dataset(&self, id: &str, owner_id: &str) -> Result<bool> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM datasets WHERE id = ? AND owner_id = ?",
            params![id, owner_id],
        )?;
        Ok(deleted > 0)
    }
}

/// Column values before JSON decoding
struct RawDataset {
    id: String,
    owner_id: String,
    name: String,
    description: Option<String>,
    status: String,
    source_config: String,
    schema_mapping: Option<String>,
    ai_config: String,
    rows: String,
    created_at: String,
}

impl RawDataset {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            owner_id: row.get(1)?,
            name: row.get(2)?,
            description: row.get(3)?,
            status: row.get(4)?,
            source_config: row.get(5)?,
            schema_mapping: row.get(6)?,
            ai_config: row.get(7)?,
            rows: row.get(8)?,
            created_at: row.get(9)?,
        })
    }

    fn into_dataset(self) -> Result<Dataset> {
        let id = self.id.clone();
        let corrupt = |field: &str, e: serde_json::Error| {
            Error::InvalidData(format!("Dataset {} has invalid {}: {}", id, field, e))
        };

        Ok(Dataset {
            source_config: serde_json::from_str(&self.source_config)
                .map_err(|e| corrupt("source_config", e))?,
            schema_mapping: self
                .schema_mapping
                .as_deref()
                .map(serde_json::from_str)
                .transpose()
                .map_err(|e| corrupt("schema_mapping", e))?,
            ai_config: serde_json::from_str(&self.ai_config).map_err(|e| corrupt("ai_config", e))?,
            rows: serde_json::from_str(&self.rows).map_err(|e| corrupt("rows", e))?,
            status: self.status.parse().unwrap_or(DatasetStatus::Error),
            created_at: parse_datetime(&self.created_at),
            id: self.id,
            owner_id: self.owner_id,
            name: self.name,
            description: self.description,
        })
    }
}
