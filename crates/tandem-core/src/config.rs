//! Process-level settings for insight generation
//!
//! Environment variables:
//! - `TANDEM_AI_ENABLED`: allow AI generation at all (default: false)
//! - `TANDEM_CACHE_TTL_SECS`: insight cache lifetime, 0 disables caching (default: 300)
//! - `TANDEM_CACHE_CAPACITY`: most insight lists kept in memory (default: 1000)

use std::time::Duration;

use tracing::warn;

use crate::insights::cache::{DEFAULT_CACHE_CAPACITY, DEFAULT_CACHE_TTL};

/// Feature switches passed explicitly to the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsightSettings {
    /// Global AI switch; per-dataset settings only apply when this is on
    pub ai_enabled: bool,
    pub cache_ttl: Duration,
    pub cache_capacity: usize,
}

impl Default for InsightSettings {
    fn default() -> Self {
        Self {
            ai_enabled: false,
            cache_ttl: DEFAULT_CACHE_TTL,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

impl InsightSettings {
    pub fn new(ai_enabled: bool) -> Self {
        Self {
            ai_enabled,
            ..Self::default()
        }
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    /// Read settings from the environment, falling back to defaults
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Self::default();

        if let Some(raw) = lookup("TANDEM_AI_ENABLED") {
            match parse_bool(&raw) {
                Some(enabled) => settings.ai_enabled = enabled,
                None => warn!(value = %raw, "Ignoring invalid TANDEM_AI_ENABLED"),
            }
        }

        if let Some(raw) = lookup("TANDEM_CACHE_TTL_SECS") {
            match raw.trim().parse::<u64>() {
                Ok(secs) => settings.cache_ttl = Duration::from_secs(secs),
                Err(_) => warn!(value = %raw, "Ignoring invalid TANDEM_CACHE_TTL_SECS"),
            }
        }

        if let Some(raw) = lookup("TANDEM_CACHE_CAPACITY") {
            match raw.trim().parse::<usize>() {
                Ok(capacity) if capacity > 0 => settings.cache_capacity = capacity,
                _ => warn!(value = %raw, "Ignoring invalid TANDEM_CACHE_CAPACITY"),
            }
        }

        settings
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}
