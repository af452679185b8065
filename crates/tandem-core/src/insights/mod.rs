//! Insight Engine - comparison insights for two-group datasets
//!
//! Turns the filtered rows of a dataset into a short, severity-ordered list
//! of observations about how group B differs from group A.
//!
//! ## Generators
//!
//! - **Rule Engine** - deterministic statistics: KPI trends, outliers,
//!   comparative and combined-dimension anomalies, rankings
//! - **AI Insight Generator** - chat-completion model, see [`crate::ai`]
//!
//! The [`InsightOrchestrator`] picks a generator per dataset, falls back to
//! the rule engine whenever the AI path fails, and caches results per filter
//! state in an [`InsightCache`].
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tandem_core::insights::InsightOrchestrator;
//!
//! let orchestrator = InsightOrchestrator::new(store, InsightSettings::from_env());
//! let result = orchestrator.generate("ds-1", "user-1", &filters, false).await?;
//! ```

pub mod cache;
pub mod engine;
pub mod orchestrator;
pub mod rules;
pub mod types;

pub use cache::{CacheStats, InsightCache, DEFAULT_CACHE_TTL};
pub use engine::InsightGenerator;
pub use orchestrator::{GenerationResult, InsightOrchestrator};
pub use rules::{RuleEngine, RuleThresholds};
pub use types::{
    clamp_confidence, clamp_severity, sort_by_severity, DatasetInsight, GeneratedBy,
    InsightMetadata, InsightType,
};
