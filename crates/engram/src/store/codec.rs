//! Conversion between memory entries and index records
//!
//! Composite metadata (topic, tag and relation lists) is flattened to JSON
//! strings on write and parsed back on read. Reads are lenient: unparseable
//! metadata falls back to documented defaults instead of failing, so one
//! corrupt field never makes an entry unreachable. The only hard failure is
//! a record written by a newer schema version, where no column can be
//! trusted.

use chrono::{DateTime, TimeZone, Utc};

use crate::error::{EngramError, Result};
use crate::index::{RecordFields, SCHEMA_VERSION, StoredRecord};
use crate::memory::types::{MemoryEntry, MemoryMetadata, MemoryTier};

/// Flatten an entry into an index record.
///
/// The entry must already carry an embedding; the store computes one before
/// persisting.
pub fn entry_to_record(entry: &MemoryEntry) -> Result<StoredRecord> {
    let vector = entry
        .embedding
        .clone()
        .ok_or_else(|| EngramError::Memory(format!("Entry {} has no embedding", entry.id)))?;

    Ok(StoredRecord {
        id: entry.id.clone(),
        document: entry.content.clone(),
        vector,
        fields: RecordFields {
            version: SCHEMA_VERSION,
            summary: entry.summary.clone(),
            created_at: entry.metadata.created_at.timestamp_micros(),
            last_accessed: entry.metadata.last_accessed.timestamp_micros(),
            access_count: i64::from(entry.metadata.access_count),
            importance_score: entry.metadata.importance_score,
            topics: encode_labels(&entry.metadata.topics)?,
            tags: encode_labels(&entry.metadata.tags)?,
            source: entry.metadata.source.clone(),
            tier: entry.metadata.tier.as_str().to_string(),
            related_memories: encode_labels(&entry.metadata.related_memories)?,
        },
    })
}

/// Rebuild an entry from an index record.
///
/// Fallbacks on malformed fields: unknown tier reads as Tier 1, unparseable
/// label lists read as empty, out-of-range timestamps read as now.
pub fn record_to_entry(record: &StoredRecord) -> Result<MemoryEntry> {
    if record.fields.version > SCHEMA_VERSION {
        return Err(EngramError::Storage(format!(
            "Record {} uses schema version {} (supported: {})",
            record.id, record.fields.version, SCHEMA_VERSION
        )));
    }

    let tier = MemoryTier::parse(&record.fields.tier).unwrap_or(MemoryTier::Tier1Active);

    Ok(MemoryEntry {
        id: record.id.clone(),
        content: record.document.clone(),
        summary: record.fields.summary.clone(),
        embedding: Some(record.vector.clone()),
        metadata: MemoryMetadata {
            created_at: decode_timestamp(record.fields.created_at),
            last_accessed: decode_timestamp(record.fields.last_accessed),
            access_count: record.fields.access_count.clamp(0, i64::from(u32::MAX)) as u32,
            importance_score: record.fields.importance_score.clamp(0.0, 1.0),
            topics: decode_labels(&record.fields.topics),
            tags: decode_labels(&record.fields.tags),
            source: record.fields.source.clone(),
            tier,
            related_memories: decode_labels(&record.fields.related_memories),
        },
    })
}

fn encode_labels(labels: &[String]) -> Result<String> {
    serde_json::to_string(labels)
        .map_err(|e| EngramError::Serialization(format!("Failed to encode labels: {e}")))
}

fn decode_labels(raw: &str) -> Vec<String> {
    serde_json::from_str(raw).unwrap_or_default()
}

fn decode_timestamp(micros: i64) -> DateTime<Utc> {
    Utc.timestamp_micros(micros).single().unwrap_or_else(Utc::now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn micros_precise_now() -> DateTime<Utc> {
        let now = Utc::now();
        Utc.timestamp_micros(now.timestamp_micros()).single().unwrap()
    }

    fn full_entry() -> MemoryEntry {
        let now = micros_precise_now();
        let mut entry = MemoryEntry::new("The quick brown fox jumps over the lazy dog");
        entry.summary = Some("Fox jumps dog".to_string());
        entry.embedding = Some(vec![0.1, 0.2, 0.3, 0.4]);
        entry.metadata.created_at = now - Duration::hours(3);
        entry.metadata.last_accessed = now;
        entry.metadata.access_count = 7;
        entry.metadata.importance_score = 0.8;
        entry.metadata.topics = vec!["foxes".to_string(), "dogs".to_string()];
        entry.metadata.tags = vec!["animals".to_string()];
        entry.metadata.source = "user_conversation".to_string();
        entry.metadata.tier = MemoryTier::Tier2Persistent;
        entry.metadata.related_memories = vec!["other-id".to_string()];
        entry
    }

    #[test]
    fn test_round_trip_preserves_all_fields() {
        let entry = full_entry();
        let record = entry_to_record(&entry).unwrap();
        let restored = record_to_entry(&record).unwrap();

        assert_eq!(restored.id, entry.id);
        assert_eq!(restored.content, entry.content);
        assert_eq!(restored.summary, entry.summary);
        assert_eq!(restored.embedding, entry.embedding);
        assert_eq!(restored.metadata.created_at, entry.metadata.created_at);
        assert_eq!(restored.metadata.last_accessed, entry.metadata.last_accessed);
        assert_eq!(restored.metadata.access_count, entry.metadata.access_count);
        assert_eq!(
            restored.metadata.importance_score,
            entry.metadata.importance_score
        );
        assert_eq!(restored.metadata.topics, entry.metadata.topics);
        assert_eq!(restored.metadata.tags, entry.metadata.tags);
        assert_eq!(restored.metadata.source, entry.metadata.source);
        assert_eq!(restored.metadata.tier, entry.metadata.tier);
        assert_eq!(
            restored.metadata.related_memories,
            entry.metadata.related_memories
        );
    }

    #[test]
    fn test_round_trip_empty_label_sets() {
        let mut entry = full_entry();
        entry.metadata.topics = Vec::new();
        entry.metadata.tags = Vec::new();
        entry.metadata.related_memories = Vec::new();

        let record = entry_to_record(&entry).unwrap();
        assert_eq!(record.fields.topics, "[]");
        assert_eq!(record.fields.tags, "[]");

        let restored = record_to_entry(&record).unwrap();
        assert!(restored.metadata.topics.is_empty());
        assert!(restored.metadata.tags.is_empty());
        assert!(restored.metadata.related_memories.is_empty());
    }

    #[test]
    fn test_encode_requires_embedding() {
        let entry = MemoryEntry::new("No embedding yet");
        let result = entry_to_record(&entry);
        assert!(result.is_err());
    }

    #[test]
    fn test_encode_stamps_current_schema_version() {
        let record = entry_to_record(&full_entry()).unwrap();
        assert_eq!(record.fields.version, SCHEMA_VERSION);
        assert_eq!(record.fields.tier, "tier2_persistent");
    }

    #[test]
    fn test_decode_rejects_newer_schema_version() {
        let mut record = entry_to_record(&full_entry()).unwrap();
        record.fields.version = SCHEMA_VERSION + 1;
        assert!(record_to_entry(&record).is_err());
    }

    #[test]
    fn test_decode_falls_back_on_malformed_metadata() {
        let mut record = entry_to_record(&full_entry()).unwrap();
        record.fields.tier = "tier9_imaginary".to_string();
        record.fields.topics = "not json".to_string();
        record.fields.importance_score = 7.5;
        record.fields.access_count = -3;

        let restored = record_to_entry(&record).unwrap();
        assert_eq!(restored.metadata.tier, MemoryTier::Tier1Active);
        assert!(restored.metadata.topics.is_empty());
        assert_eq!(restored.metadata.importance_score, 1.0);
        assert_eq!(restored.metadata.access_count, 0);
    }

    #[test]
    fn test_decode_survives_out_of_range_timestamp() {
        let mut record = entry_to_record(&full_entry()).unwrap();
        record.fields.created_at = i64::MAX;

        let restored = record_to_entry(&record).unwrap();
        // The entry reads as freshly created rather than failing.
        assert!(restored.metadata.created_at <= Utc::now());
        assert!(restored.age_hours() < 1.0);
    }
}
