//! Insight Orchestrator
//!
//! Cache-aside insight generation for one dataset and filter state:
//! ownership check, cache lookup, AI-or-rules selection, silent fallback to
//! the rule engine, cache write.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::ai::{AiInsightGenerator, NarrativeSummary};
use crate::config::InsightSettings;
use crate::error::{Error, Result};
use crate::filter::DashboardFilters;
use crate::models::Dataset;
use crate::store::DatasetStore;

use super::cache::InsightCache;
use super::engine::InsightGenerator;
use super::rules::RuleEngine;
use super::types::{DatasetInsight, GeneratedBy};

/// Outcome of one `generate` call
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResult {
    pub insights: Vec<DatasetInsight>,
    pub from_cache: bool,
    pub generated_by: GeneratedBy,
    pub elapsed_ms: u64,
}

/// Coordinates the dataset store, cache and generators
pub struct InsightOrchestrator {
    store: Arc<dyn DatasetStore>,
    cache: Arc<InsightCache>,
    rules: RuleEngine,
    ai: Option<AiInsightGenerator>,
    settings: InsightSettings,
}

impl InsightOrchestrator {
    /// Orchestrator with a fresh cache sized by `settings`
    pub fn new(store: Arc<dyn DatasetStore>, settings: InsightSettings) -> Self {
        Self {
            store,
            cache: Arc::new(InsightCache::with_capacity(
                settings.cache_ttl,
                settings.cache_capacity,
            )),
            rules: RuleEngine::new(),
            ai: None,
            settings,
        }
    }

    pub fn with_ai(mut self, generator: AiInsightGenerator) -> Self {
        self.ai = Some(generator);
        self
    }

    pub fn with_rules(mut self, rules: RuleEngine) -> Self {
        self.rules = rules;
        self
    }

    /// Share a cache with other orchestrators
    pub fn with_cache(mut self, cache: Arc<InsightCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn cache(&self) -> &Arc<InsightCache> {
        &self.cache
    }

    pub fn settings(&self) -> &InsightSettings {
        &self.settings
    }

    pub fn ai(&self) -> Option<&AiInsightGenerator> {
        self.ai.as_ref()
    }

    /// Insights for `dataset_id` as seen through `filters`
    ///
    /// A dataset that does not exist and one owned by someone else produce
    /// the same `NotFound` error, before the cache is touched. AI failures are
    /// logged and answered by the rule engine.
    pub async fn generate(
        &self,
        dataset_id: &str,
        user_id: &str,
        filters: &DashboardFilters,
        force_refresh: bool,
    ) -> Result<GenerationResult> {
        let started = Instant::now();
        let dataset = self.load_owned(dataset_id, user_id).await?;
        let key = filters.cache_key(dataset_id);

        if !force_refresh {
            if let Some(insights) = self.cache.find_cached(&key).await {
                debug!(dataset_id, key = %key, count = insights.len(), "Insight cache hit");
                let generated_by = insights
                    .first()
                    .map(|i| i.generated_by)
                    .unwrap_or(GeneratedBy::RuleEngine);
                return Ok(GenerationResult {
                    insights,
                    from_cache: true,
                    generated_by,
                    elapsed_ms: elapsed_ms(started),
                });
            }
            debug!(dataset_id, key = %key, "Insight cache miss");
        }

        let (insights, generated_by) = self.run_generators(&dataset, filters).await;
        self.cache.save_to_cache(&key, insights.clone()).await;

        let elapsed_ms = elapsed_ms(started);
        info!(
            dataset_id,
            count = insights.len(),
            generator = %generated_by,
            elapsed_ms,
            "Insight generation complete"
        );

        Ok(GenerationResult {
            insights,
            from_cache: false,
            generated_by,
            elapsed_ms,
        })
    }

    /// Narrative comparison written by the AI backend
    ///
    /// Same ownership check and AI policy as `generate`, but there is no
    /// fallback: without AI this fails with `AiUnavailable`.
    pub async fn summarize(
        &self,
        dataset_id: &str,
        user_id: &str,
        filters: &DashboardFilters,
    ) -> Result<NarrativeSummary> {
        let dataset = self.load_owned(dataset_id, user_id).await?;
        let ai = self.ai_for(&dataset).ok_or_else(|| {
            Error::AiUnavailable("AI is disabled for this dataset".into())
        })?;
        ai.summarize(&dataset, filters).await
    }

    /// Drop every cached insight list for a dataset
    pub async fn invalidate(&self, dataset_id: &str, user_id: &str) -> Result<usize> {
        self.load_owned(dataset_id, user_id).await?;
        let removed = self.cache.invalidate_dataset(dataset_id).await;
        debug!(dataset_id, removed, "Invalidated insight cache");
        Ok(removed)
    }

    /// Whether AI generation is configured and allowed for this dataset
    pub fn uses_ai(&self, dataset: &Dataset) -> bool {
        self.ai_for(dataset).is_some()
    }

    fn ai_for(&self, dataset: &Dataset) -> Option<&AiInsightGenerator> {
        if !self.settings.ai_enabled || !dataset.ai_config.allows_insights() {
            return None;
        }
        self.ai.as_ref()
    }

    async fn load_owned(&self, dataset_id: &str, user_id: &str) -> Result<Dataset> {
        match self.store.find_by_id(dataset_id).await? {
            Some(dataset) if dataset.is_owned_by(user_id) => Ok(dataset),
            _ => Err(Error::NotFound(format!("Dataset {} not found", dataset_id))),
        }
    }

    async fn run_generators(
        &self,
        dataset: &Dataset,
        filters: &DashboardFilters,
    ) -> (Vec<DatasetInsight>, GeneratedBy) {
        if let Some(ai) = self.ai_for(dataset) {
            match ai.generate(dataset, filters).await {
                Ok(insights) => return (insights, ai.generated_by()),
                Err(e) => warn!(
                    dataset_id = %dataset.id,
                    generator = ai.name(),
                    error = %e,
                    "AI insight generation failed, falling back to rule engine"
                ),
            }
        }

        (self.rules.analyze(dataset, filters), self.rules.generated_by())
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
