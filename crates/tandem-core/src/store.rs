//! Dataset lookup used by the orchestrator
//!
//! [`Database`](crate::db::Database) is the persistent implementation;
//! [`MemoryStore`] backs tests and one-off runs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use crate::error::Result;
use crate::models::Dataset;

/// Read access to stored datasets
#[async_trait]
pub trait DatasetStore: Send + Sync {
    /// Load a dataset with its rows, `None` if it does not exist
    async fn find_by_id(&self, id: &str) -> Result<Option<Dataset>>;
}

/// In-memory dataset store
#[derive(Default)]
pub struct MemoryStore {
    datasets: RwLock<HashMap<String, Dataset>>,
    lookups: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dataset(self, dataset: Dataset) -> Self {
        self.insert(dataset);
        self
    }

    /// Add or replace a dataset
    ///
    /// The map only holds whole datasets, so a lock poisoned by a panicking
    /// writer is still consistent and is used as is.
    pub fn insert(&self, dataset: Dataset) {
        self.datasets
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(dataset.id.clone(), dataset);
    }

    /// Number of `find_by_id` calls served
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DatasetStore for MemoryStore {
    async fn find_by_id(&self, id: &str) -> Result<Option<Dataset>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        let datasets = self.datasets.read().unwrap_or_else(PoisonError::into_inner);
        Ok(datasets.get(id).cloned())
    }
}
