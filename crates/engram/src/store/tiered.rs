//! Tiered semantic store
//!
//! Routes entries into the two index collections by tier and answers
//! semantic queries across them. Raw index distances are converted to
//! similarities with `1 / (1 + distance)` so callers always see scores in
//! (0, 1] regardless of backend.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::embedding::EmbeddingProvider;
use crate::error::Result;
use crate::index::{StoredRecord, VectorIndex};
use crate::memory::types::{MemoryEntry, MemoryTier};
use crate::store::codec;
use crate::store::{DEFAULT_MIN_SIMILARITY, MemoryStats, MemoryStore, MetadataPatch, SearchHit};

/// Two-tier memory store over a vector index.
///
/// Tier 1 holds active working memory, Tier 2 the archived remainder. Both
/// live in the same index under separate collections; every operation that
/// takes an id probes Tier 1 first.
pub struct TieredSemanticStore {
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl TieredSemanticStore {
    pub fn new(index: Arc<dyn VectorIndex>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self { index, embedder }
    }

    /// Persist an entry into the collection matching its tier.
    ///
    /// An entry arriving without an embedding gets one computed from its
    /// summary when present, otherwise its content. An existing embedding
    /// is trusted as-is.
    pub async fn add(&self, mut entry: MemoryEntry) -> Result<String> {
        if entry.embedding.is_none() {
            entry.embedding = Some(self.embedder.embed(entry.embedding_text())?);
        }

        let collection = entry.metadata.tier.collection_name();
        let record = codec::entry_to_record(&entry)?;
        self.index.upsert(collection, record).await?;

        debug!("Stored entry {} in {}", entry.id, collection);
        Ok(entry.id)
    }

    /// Semantic search over one or both tiers.
    ///
    /// Queries each selected collection, converts distances to
    /// similarities, drops results below `min_score`, then merges into one
    /// list sorted by descending similarity and truncated to `limit`.
    /// Equal-similarity ordering is unspecified; the current sort is stable,
    /// which keeps Tier 1 ahead of Tier 2 on exact ties.
    pub async fn search(
        &self,
        query: &str,
        tier: Option<MemoryTier>,
        limit: usize,
        min_score: f32,
    ) -> Result<Vec<SearchHit>> {
        let query_vector = self.embedder.embed(query)?;

        let tiers = match tier {
            Some(t) => vec![t],
            None => vec![MemoryTier::Tier1Active, MemoryTier::Tier2Persistent],
        };

        let mut hits = Vec::new();
        for t in tiers {
            let matches = self
                .index
                .query(t.collection_name(), &query_vector, limit)
                .await?;

            for m in matches {
                let similarity = 1.0 / (1.0 + m.distance);
                if similarity < min_score {
                    continue;
                }
                hits.push(SearchHit {
                    entry: codec::record_to_entry(&m.record)?,
                    similarity,
                });
            }
        }

        hits.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(limit);

        debug!("Search matched {} entries", hits.len());
        Ok(hits)
    }

    /// Every entry in one tier, materialized.
    ///
    /// Enumeration order is whatever the index yields; cost is linear in
    /// the collection size.
    pub async fn list_tier_entries(&self, tier: MemoryTier) -> Result<Vec<MemoryEntry>> {
        let records = self.index.list(tier.collection_name()).await?;
        records.iter().map(codec::record_to_entry).collect()
    }

    /// Fetch one entry by id, probing Tier 1 then Tier 2.
    pub async fn get_by_id(&self, id: &str) -> Result<Option<MemoryEntry>> {
        match self.find_record(id).await? {
            Some((_, record)) => Ok(Some(codec::record_to_entry(&record)?)),
            None => Ok(None),
        }
    }

    /// Move an entry into `target`, rewriting its recorded tier.
    ///
    /// Two steps, add to the target collection then delete from the source.
    /// A crash between them leaves the entry in both collections under the
    /// same id; Tier-1-first probing keeps reads deterministic until a
    /// later move succeeds. Returns false when the source has no such id.
    pub async fn move_to_tier(&self, id: &str, target: MemoryTier) -> Result<bool> {
        let source = target.other();

        let Some(record) = self.index.get(source.collection_name(), id).await? else {
            return Ok(false);
        };

        let mut entry = codec::record_to_entry(&record)?;
        entry.metadata.tier = target;
        let rewritten = codec::entry_to_record(&entry)?;

        self.index.upsert(target.collection_name(), rewritten).await?;
        self.index.delete(source.collection_name(), id).await?;

        debug!(
            "Moved entry {} from {} to {}",
            id,
            source.collection_name(),
            target.collection_name()
        );
        Ok(true)
    }

    /// Apply a metadata patch to the entry with this id.
    pub async fn update(&self, id: &str, patch: MetadataPatch) -> Result<bool> {
        let Some((tier, record)) = self.find_record(id).await? else {
            return Ok(false);
        };

        let mut entry = codec::record_to_entry(&record)?;
        patch.apply_to(&mut entry);
        // The collection holding the record is authoritative for the tier.
        entry.metadata.tier = tier;

        let rewritten = codec::entry_to_record(&entry)?;
        self.index.upsert(tier.collection_name(), rewritten).await?;
        Ok(true)
    }

    /// Remove the entry with this id from whichever tier holds it.
    pub async fn delete(&self, id: &str) -> Result<bool> {
        for tier in [MemoryTier::Tier1Active, MemoryTier::Tier2Persistent] {
            if self.index.delete(tier.collection_name(), id).await? {
                debug!("Deleted entry {} from {}", id, tier.collection_name());
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Per-tier entry counts.
    pub async fn stats(&self) -> Result<MemoryStats> {
        let tier1_count = self
            .index
            .count(MemoryTier::Tier1Active.collection_name())
            .await?;
        let tier2_count = self
            .index
            .count(MemoryTier::Tier2Persistent.collection_name())
            .await?;

        Ok(MemoryStats {
            tier1_count,
            tier2_count,
            total_count: tier1_count + tier2_count,
        })
    }

    async fn find_record(&self, id: &str) -> Result<Option<(MemoryTier, StoredRecord)>> {
        for tier in [MemoryTier::Tier1Active, MemoryTier::Tier2Persistent] {
            if let Some(record) = self.index.get(tier.collection_name(), id).await? {
                return Ok(Some((tier, record)));
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl MemoryStore for TieredSemanticStore {
    async fn store(&self, entry: MemoryEntry) -> Result<String> {
        self.add(entry).await
    }

    async fn retrieve(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        self.search(query, None, limit, DEFAULT_MIN_SIMILARITY).await
    }

    async fn update(&self, id: &str, patch: MetadataPatch) -> Result<bool> {
        TieredSemanticStore::update(self, id, patch).await
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        TieredSemanticStore::delete(self, id).await
    }

    async fn archive(&self, id: &str) -> Result<bool> {
        self.move_to_tier(id, MemoryTier::Tier2Persistent).await
    }
}
