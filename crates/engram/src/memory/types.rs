//! Core memory types for the Engram system
//!
//! Defines the entry and metadata structures persisted across both memory
//! tiers, plus the derived health snapshot used to drive archival decisions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default token budget the pressure signal is measured against
pub const DEFAULT_TOKEN_LIMIT: u32 = 190_000;

/// Which of the two memory tiers an entry lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemoryTier {
    /// Active working memory, consumed directly by the agent
    Tier1Active,
    /// Long-term memory, reached only through semantic search
    Tier2Persistent,
}

impl MemoryTier {
    /// Stable string form used in persisted records
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryTier::Tier1Active => "tier1_active",
            MemoryTier::Tier2Persistent => "tier2_persistent",
        }
    }

    /// Parse the persisted string form; unknown values yield `None`
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "tier1_active" => Some(MemoryTier::Tier1Active),
            "tier2_persistent" => Some(MemoryTier::Tier2Persistent),
            _ => None,
        }
    }

    /// Name of the index collection backing this tier
    pub fn collection_name(&self) -> &'static str {
        match self {
            MemoryTier::Tier1Active => "tier1_active_memory",
            MemoryTier::Tier2Persistent => "tier2_persistent_memory",
        }
    }

    /// The tier on the other side of a move
    pub fn other(&self) -> Self {
        match self {
            MemoryTier::Tier1Active => MemoryTier::Tier2Persistent,
            MemoryTier::Tier2Persistent => MemoryTier::Tier1Active,
        }
    }
}

/// Metadata carried by every memory entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryMetadata {
    /// When the entry was created
    pub created_at: DateTime<Utc>,
    /// When the entry was last read
    pub last_accessed: DateTime<Utc>,
    /// How many times the entry has been read
    pub access_count: u32,
    /// Heuristic usefulness estimate, always in [0, 1]
    pub importance_score: f32,
    /// Topic labels attached to the entry
    pub topics: Vec<String>,
    /// Free-form tags
    pub tags: Vec<String>,
    /// Provenance label for where the entry came from
    pub source: String,
    /// Tier the entry currently resides in; must match the collection
    /// that physically holds it
    pub tier: MemoryTier,
    /// Ids of related entries; no referential integrity is enforced
    pub related_memories: Vec<String>,
}

impl Default for MemoryMetadata {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            created_at: now,
            last_accessed: now,
            access_count: 0,
            importance_score: 0.5,
            topics: Vec::new(),
            tags: Vec::new(),
            source: "user_conversation".to_string(),
            tier: MemoryTier::Tier1Active,
            related_memories: Vec::new(),
        }
    }
}

/// A single memory entry stored in the Engram system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryEntry {
    /// Unique identifier, generated at creation and never changed
    pub id: String,
    /// The original text content
    pub content: String,
    /// Extractive summary, present only after compression
    pub summary: Option<String>,
    /// Embedding vector; dimension is fixed by the active provider
    pub embedding: Option<Vec<f32>>,
    /// Entry metadata
    pub metadata: MemoryMetadata,
}

impl MemoryEntry {
    /// Create a new Tier-1 entry with default metadata
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            content: content.into(),
            summary: None,
            embedding: None,
            metadata: MemoryMetadata::default(),
        }
    }

    /// Create a new entry with explicit metadata
    pub fn with_metadata(content: impl Into<String>, metadata: MemoryMetadata) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            content: content.into(),
            summary: None,
            embedding: None,
            metadata,
        }
    }

    /// Mark this entry as accessed, updating access count and timestamp
    pub fn mark_accessed(&mut self) {
        self.metadata.access_count += 1;
        self.metadata.last_accessed = Utc::now();
    }

    /// Update the importance score, clamped to [0, 1]
    pub fn set_importance(&mut self, score: f32) {
        self.metadata.importance_score = score.clamp(0.0, 1.0);
    }

    /// Age of this entry in hours
    pub fn age_hours(&self) -> f32 {
        let elapsed = Utc::now() - self.metadata.created_at;
        elapsed.num_seconds() as f32 / 3600.0
    }

    /// The text an embedding should be computed from: the summary when one
    /// exists, otherwise the full content
    pub fn embedding_text(&self) -> &str {
        self.summary.as_deref().unwrap_or(&self.content)
    }
}

/// Point-in-time snapshot of memory system health.
///
/// Recomputed on demand by the archival pipeline; never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryHealth {
    /// Number of entries in Tier 1
    pub tier1_count: usize,
    /// Number of entries in Tier 2
    pub tier2_count: usize,
    /// Normalized token pressure at snapshot time, 0 to 1
    pub token_usage: f32,
    /// Token budget the pressure was measured against
    pub token_limit: u32,
    /// Mean importance across Tier 1, 0 when the tier is empty
    pub avg_importance_tier1: f32,
    /// Mean importance across Tier 2, 0 when the tier is empty
    pub avg_importance_tier2: f32,
    /// Age in hours of the oldest Tier-1 entry, 0 when the tier is empty
    pub oldest_entry_age_hours: f32,
    /// Number of entries currently eligible for archival
    pub archival_candidates: usize,
    /// Placeholder metric, always 0; fragmentation is not computed
    pub fragmentation_score: f32,
}

impl Default for MemoryHealth {
    fn default() -> Self {
        Self {
            tier1_count: 0,
            tier2_count: 0,
            token_usage: 0.0,
            token_limit: DEFAULT_TOKEN_LIMIT,
            avg_importance_tier1: 0.0,
            avg_importance_tier2: 0.0,
            oldest_entry_age_hours: 0.0,
            archival_candidates: 0,
            fragmentation_score: 0.0,
        }
    }
}

impl MemoryHealth {
    /// Whether the memory system would benefit from an archival pass:
    /// token pressure above 0.8, more than 10 pending candidates, or
    /// fragmentation above 0.6
    pub fn needs_optimization(&self) -> bool {
        self.token_usage > 0.8 || self.archival_candidates > 10 || self.fragmentation_score > 0.6
    }
}
