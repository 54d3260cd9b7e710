//! File-seeded content catalog.

use std::path::Path;

use async_trait::async_trait;
use engine_core::{ContentItem, Error, Result};
use parking_lot::RwLock;
use tracing::{info, warn};

use crate::ContentCatalog;

/// Content items held in memory, in catalog order.
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    items: RwLock<Vec<ContentItem>>,
}

impl MemoryCatalog {
    pub fn new(items: Vec<ContentItem>) -> Self {
        Self {
            items: RwLock::new(items),
        }
    }

    /// Loads a JSON array of content items.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read(path).map_err(|e| {
            Error::storage(format!("Failed to read catalog {}: {}", path.display(), e))
        })?;
        let items: Vec<ContentItem> = serde_json::from_slice(&raw)?;

        info!(
            path = %path.display(),
            items = items.len(),
            with_embeddings = items.iter().filter(|i| i.embedding.is_some()).count(),
            "Loaded content catalog"
        );

        let non_finite: Vec<&str> = items
            .iter()
            .filter(|i| i.embedding.as_ref().is_some_and(|e| !e.is_finite()))
            .map(|i| i.id.as_str())
            .collect();
        if !non_finite.is_empty() {
            warn!(
                items = ?non_finite,
                "Embeddings with non-finite components are excluded from ranking"
            );
        }

        Ok(Self::new(items))
    }

    /// Replaces an item with the same ID, or appends it.
    pub fn upsert(&self, item: ContentItem) {
        let mut items = self.items.write();
        match items.iter_mut().find(|existing| existing.id == item.id) {
            Some(existing) => *existing = item,
            None => items.push(item),
        }
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }
}

#[async_trait]
impl ContentCatalog for MemoryCatalog {
    async fn items(&self) -> Result<Vec<ContentItem>> {
        Ok(self.items.read().clone())
    }
}
