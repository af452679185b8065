//! Tandem Core Library
//!
//! Shared functionality for the Tandem dual-dataset insight engine:
//! - Dataset model with two source groups compared side by side
//! - Tabular filtering with canonical, cacheable filter keys
//! - Statistical rule engine (trends, outliers, anomalies, rankings)
//! - Pluggable AI backends with prompt redaction and per-task deadlines
//! - TTL insight cache and the orchestrator that ties it all together
//! - Model router and prompt library for customizable AI behaviour
//! - SQLite dataset store with optional SQLCipher encryption

pub mod ai;
pub mod config;
pub mod db;
pub mod error;
pub mod filter;
pub mod insights;
pub mod model_router;
pub mod models;
pub mod prompts;
pub mod store;

/// Test utilities including mock chat completion server
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use ai::{
    AIBackend, AIClient, AiInsightGenerator, BackendInfo, MockBackend, NarrativeSummary,
    OpenAICompatibleBackend,
};
pub use config::InsightSettings;
pub use db::{AuditEntry, Database};
pub use error::{Error, Result};
pub use filter::{apply_filters, DashboardFilters};
pub use insights::{
    DatasetInsight, GeneratedBy, GenerationResult, InsightCache, InsightGenerator,
    InsightOrchestrator, InsightType, RuleEngine,
};
pub use model_router::{ModelRouter, RouterConfig, TaskConfig, TaskType};
pub use prompts::{Prompt, PromptId, PromptLibrary};
pub use store::{DatasetStore, MemoryStore};
