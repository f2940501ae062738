//! Importance scoring for memory entries
//!
//! Provides the heuristic that estimates how useful an entry will be in the
//! future. Scores drift as access counts and ages change, so the archival
//! pipeline recomputes them before every trigger evaluation.

use crate::memory::types::MemoryEntry;

/// Access-count bonus saturates here
const ACCESS_BONUS_CAP: f32 = 0.2;
/// Flat bonus for entries younger than a day
const RECENCY_BONUS: f32 = 0.1;
/// Topic and tag bonuses saturate here
const LABEL_BONUS_CAP: f32 = 0.1;
/// Per-topic and per-tag increment
const LABEL_BONUS_STEP: f32 = 0.02;

/// Calculate the importance of an entry from its metadata.
///
/// Formula: base + min(0.2, access_count / 50) + recency + topic + tag,
/// clamped to [0, 1], where:
/// - base is the entry's current importance score
/// - recency is a flat 0.1 for entries younger than 24 hours
/// - topic and tag bonuses grow 0.02 per label, each capped at 0.1
///
/// Idempotent for unchanged inputs; the result is suitable to write back
/// into `importance_score` before a trigger evaluation.
pub fn calculate_importance(entry: &MemoryEntry) -> f32 {
    let meta = &entry.metadata;

    let base = meta.importance_score;
    let access_bonus = (meta.access_count as f32 / 50.0).min(ACCESS_BONUS_CAP);
    let recency_bonus = if entry.age_hours() < 24.0 {
        RECENCY_BONUS
    } else {
        0.0
    };
    let topic_bonus = (LABEL_BONUS_STEP * meta.topics.len() as f32).min(LABEL_BONUS_CAP);
    let tag_bonus = (LABEL_BONUS_STEP * meta.tags.len() as f32).min(LABEL_BONUS_CAP);

    (base + access_bonus + recency_bonus + topic_bonus + tag_bonus).clamp(0.0, 1.0)
}
