//! Engine settings.

use std::num::NonZeroUsize;

use crate::{Result, ViewError};

/// Default number of items per cached page.
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Default collection holding page and summary documents.
pub const DEFAULT_CACHE_COLLECTION: &str = "viewCache";

/// Settings shared by every view of an engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    page_size: NonZeroUsize,
    cache_collection: String,
}

impl EngineConfig {
    /// Creates a configuration, rejecting a zero page size or an empty collection name.
    pub fn new(page_size: usize, cache_collection: impl Into<String>) -> Result<Self> {
        let page_size = NonZeroUsize::new(page_size)
            .ok_or_else(|| ViewError::InvalidEngineConfig("page size must be at least 1".into()))?;
        let cache_collection = cache_collection.into();
        if cache_collection.trim().is_empty() {
            return Err(ViewError::InvalidEngineConfig(
                "cache collection name must not be empty".into(),
            ));
        }
        Ok(Self {
            page_size,
            cache_collection,
        })
    }

    /// Items per page.
    pub fn page_size(&self) -> NonZeroUsize {
        self.page_size
    }

    /// Collection holding page and summary documents.
    pub fn cache_collection(&self) -> &str {
        &self.cache_collection
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            page_size: NonZeroUsize::new(DEFAULT_PAGE_SIZE).unwrap_or(NonZeroUsize::MIN),
            cache_collection: DEFAULT_CACHE_COLLECTION.to_string(),
        }
    }
}
