//! Two-tier memory store
//!
//! Defines the `MemoryStore` trait that abstracts memory persistence for
//! callers (agents, the archival pipeline, tests) and the tiered
//! implementation backed by a vector index. Entries live in exactly one of
//! two collections, Tier 1 active or Tier 2 persistent, and move between
//! them as whole records.

use async_trait::async_trait;

use crate::error::Result;
use crate::memory::types::MemoryEntry;

mod codec;
pub mod tiered;

pub use tiered::TieredSemanticStore;

/// Similarity floor applied by `MemoryStore::retrieve`
pub const DEFAULT_MIN_SIMILARITY: f32 = 0.5;

/// A search result paired with its similarity to the query, in (0, 1].
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub entry: MemoryEntry,
    /// `1 / (1 + distance)` for the backing index distance
    pub similarity: f32,
}

/// Per-tier entry counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryStats {
    pub tier1_count: usize,
    pub tier2_count: usize,
    pub total_count: usize,
}

/// Partial metadata update applied to a stored entry.
///
/// Unset fields are left untouched. The tier is deliberately absent: tier
/// changes go through `move_to_tier` so an entry's recorded tier always
/// matches the collection holding it.
#[derive(Debug, Clone, Default)]
pub struct MetadataPatch {
    pub importance_score: Option<f32>,
    pub last_accessed: Option<chrono::DateTime<chrono::Utc>>,
    pub access_count: Option<u32>,
    pub topics: Option<Vec<String>>,
    pub tags: Option<Vec<String>>,
    pub source: Option<String>,
    pub related_memories: Option<Vec<String>>,
    pub summary: Option<String>,
}

impl MetadataPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_importance_score(mut self, score: f32) -> Self {
        self.importance_score = Some(score);
        self
    }

    pub fn with_last_accessed(mut self, at: chrono::DateTime<chrono::Utc>) -> Self {
        self.last_accessed = Some(at);
        self
    }

    pub fn with_access_count(mut self, count: u32) -> Self {
        self.access_count = Some(count);
        self
    }

    pub fn with_topics(mut self, topics: Vec<String>) -> Self {
        self.topics = Some(topics);
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = Some(tags);
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_related_memories(mut self, related: Vec<String>) -> Self {
        self.related_memories = Some(related);
        self
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    /// Apply this patch to an entry in place.
    pub fn apply_to(self, entry: &mut MemoryEntry) {
        if let Some(score) = self.importance_score {
            entry.set_importance(score);
        }
        if let Some(at) = self.last_accessed {
            entry.metadata.last_accessed = at;
        }
        if let Some(count) = self.access_count {
            entry.metadata.access_count = count;
        }
        if let Some(topics) = self.topics {
            entry.metadata.topics = topics;
        }
        if let Some(tags) = self.tags {
            entry.metadata.tags = tags;
        }
        if let Some(source) = self.source {
            entry.metadata.source = source;
        }
        if let Some(related) = self.related_memories {
            entry.metadata.related_memories = related;
        }
        if let Some(summary) = self.summary {
            entry.summary = Some(summary);
        }
    }
}

/// Trait for memory stores (tiered, single-tier, test doubles)
///
/// Operations that target an id return `false` when no entry has that id;
/// errors are reserved for backend failures.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// Persist an entry, embedding it first if needed. Returns the id.
    async fn store(&self, entry: MemoryEntry) -> Result<String>;

    /// Semantic search across both tiers, best matches first
    async fn retrieve(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>>;

    /// Apply a metadata patch to the entry with this id
    async fn update(&self, id: &str, patch: MetadataPatch) -> Result<bool>;

    /// Remove the entry with this id from whichever tier holds it
    async fn delete(&self, id: &str) -> Result<bool>;

    /// Move the entry with this id to Tier 2
    async fn archive(&self, id: &str) -> Result<bool>;
}
