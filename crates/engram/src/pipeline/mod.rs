//! Archival pipeline
//!
//! Drives the Tier 1 to Tier 2 transition: rescore every active entry,
//! filter through the trigger policy, compress and re-embed what qualifies,
//! then relocate it. Also derives the on-demand health snapshot callers use
//! to decide when a pass is worth running.

use std::sync::Arc;

use tracing::info;

use crate::embedding::EmbeddingProvider;
use crate::error::Result;
use crate::memory::compression::compress;
use crate::memory::scoring::calculate_importance;
use crate::memory::trigger::ArchivalTrigger;
use crate::memory::types::{DEFAULT_TOKEN_LIMIT, MemoryEntry, MemoryHealth, MemoryTier};
use crate::store::TieredSemanticStore;

pub mod scheduler;

pub use scheduler::ArchivalScheduler;

/// Entries at or below this many words are archived without compression
const COMPRESSION_MIN_WORDS: usize = 50;

/// Archival workflow for the Tier 1 to Tier 2 transition.
pub struct ArchivalPipeline {
    store: Arc<TieredSemanticStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    trigger: ArchivalTrigger,
    token_limit: u32,
}

impl ArchivalPipeline {
    pub fn new(
        store: Arc<TieredSemanticStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        trigger: ArchivalTrigger,
    ) -> Self {
        Self {
            store,
            embedder,
            trigger,
            token_limit: DEFAULT_TOKEN_LIMIT,
        }
    }

    /// Set the token budget reported in health snapshots.
    pub fn with_token_limit(mut self, token_limit: u32) -> Self {
        self.token_limit = token_limit;
        self
    }

    /// Determine which Tier 1 entries should be archived.
    ///
    /// Every entry's importance is rescored before the trigger runs, and
    /// the returned candidates carry the refreshed scores. Order follows
    /// the store's enumeration order, which is not guaranteed.
    pub async fn evaluate_candidates(&self, token_usage: f32) -> Result<Vec<MemoryEntry>> {
        let entries = self
            .store
            .list_tier_entries(MemoryTier::Tier1Active)
            .await?;

        let mut candidates = Vec::new();
        for mut entry in entries {
            entry.set_importance(calculate_importance(&entry));
            if self.trigger.should_archive(&entry, token_usage) {
                candidates.push(entry);
            }
        }

        Ok(candidates)
    }

    /// Archive eligible Tier 1 entries; returns the archived ids.
    ///
    /// Candidates over fifty words without a summary are compressed at
    /// `target_ratio` first. Any candidate carrying a summary, old or just
    /// generated, gets its embedding regenerated from that summary. Each
    /// entry is added to Tier 2 before its Tier 1 original is deleted, so a
    /// failure in between duplicates rather than loses it.
    pub async fn archive_candidates(
        &self,
        token_usage: f32,
        target_ratio: f32,
    ) -> Result<Vec<String>> {
        let candidates = self.evaluate_candidates(token_usage).await?;
        let mut archived_ids = Vec::new();

        for mut entry in candidates {
            let word_count = entry.content.split_whitespace().count();
            if entry.summary.is_none() && word_count > COMPRESSION_MIN_WORDS {
                entry.summary = Some(compress(&entry.content, target_ratio));
            }

            if let Some(summary) = &entry.summary {
                entry.embedding = Some(self.embedder.embed(summary)?);
            }

            entry.metadata.tier = MemoryTier::Tier2Persistent;
            let id = self.store.add(entry).await?;
            self.store.delete(&id).await?;
            archived_ids.push(id);
        }

        if !archived_ids.is_empty() {
            info!("Archived {} entries to Tier 2", archived_ids.len());
        }

        Ok(archived_ids)
    }

    /// Build health metrics for the memory tiers.
    pub async fn get_health(&self, token_usage: f32) -> Result<MemoryHealth> {
        let tier1_entries = self
            .store
            .list_tier_entries(MemoryTier::Tier1Active)
            .await?;
        let tier2_entries = self
            .store
            .list_tier_entries(MemoryTier::Tier2Persistent)
            .await?;

        let oldest_entry_age_hours = tier1_entries
            .iter()
            .map(MemoryEntry::age_hours)
            .fold(0.0f32, f32::max);

        let archival_candidates = self.evaluate_candidates(token_usage).await?.len();

        Ok(MemoryHealth {
            tier1_count: tier1_entries.len(),
            tier2_count: tier2_entries.len(),
            token_usage,
            token_limit: self.token_limit,
            avg_importance_tier1: average_importance(&tier1_entries),
            avg_importance_tier2: average_importance(&tier2_entries),
            oldest_entry_age_hours,
            archival_candidates,
            // Fragmentation is not computed; the placeholder stays at zero.
            fragmentation_score: 0.0,
        })
    }
}

fn average_importance(entries: &[MemoryEntry]) -> f32 {
    if entries.is_empty() {
        return 0.0;
    }
    let total: f32 = entries.iter().map(|e| e.metadata.importance_score).sum();
    total / entries.len() as f32
}
