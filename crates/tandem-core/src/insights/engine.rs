//! Generator capability shared by the rule engine and the AI generator

use async_trait::async_trait;

use crate::filter::DashboardFilters;
use crate::models::Dataset;
use crate::Result;

use super::types::{DatasetInsight, GeneratedBy};

/// Something that can turn a dataset snapshot into insights
#[async_trait]
pub trait InsightGenerator: Send + Sync {
    /// Provenance stamped on every insight this generator returns
    fn generated_by(&self) -> GeneratedBy;

    /// Human-readable name for logs
    fn name(&self) -> &'static str;

    /// Produce insights for the rows that pass `filters`
    async fn generate(
        &self,
        dataset: &Dataset,
        filters: &DashboardFilters,
    ) -> Result<Vec<DatasetInsight>>;
}
