//! Vector index abstraction
//!
//! The store persists entries through this seam: named collections of
//! (id, document, vector, scalar fields) records answering nearest-neighbor
//! queries. Two backends ship with the crate: `LanceIndex` on disk and
//! `MemIndex` for tests and ephemeral use. Composite entry fields never
//! reach the index directly; the store's codec flattens them to scalar
//! encodings first.

use async_trait::async_trait;

use crate::error::Result;

pub mod lance;
pub mod mem;

pub use lance::LanceIndex;
pub use mem::MemIndex;

/// Current version of the persisted record field layout
pub const SCHEMA_VERSION: i64 = 1;

/// Scalar metadata columns persisted with every record.
///
/// Timestamps are microseconds since the Unix epoch. `topics`, `tags` and
/// `related_memories` hold JSON-encoded string lists; `tier` holds the
/// stable tier string. The store's codec owns those encodings and their
/// fallbacks, the index treats them as opaque scalars.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordFields {
    /// Layout version this record was written with
    pub version: i64,
    /// Compressed form of the document, if one was generated
    pub summary: Option<String>,
    pub created_at: i64,
    pub last_accessed: i64,
    pub access_count: i64,
    pub importance_score: f32,
    pub topics: String,
    pub tags: String,
    pub source: String,
    pub tier: String,
    pub related_memories: String,
}

/// A record as stored in one collection of the index.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    /// Primary key within the collection
    pub id: String,
    /// Original document text
    pub document: String,
    /// Embedding vector; length must match the index dimension
    pub vector: Vec<f32>,
    /// Scalar metadata columns
    pub fields: RecordFields,
}

/// A query hit paired with its raw distance from the query vector.
#[derive(Debug, Clone)]
pub struct QueryMatch {
    pub record: StoredRecord,
    /// Euclidean distance to the query vector; smaller is closer
    pub distance: f32,
}

/// Euclidean (L2) distance between two vectors.
///
/// Both backends score matches with this so distances stay comparable no
/// matter which index produced them.
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

/// Storage backend holding named collections of vector records.
///
/// Each collection is an independent keyspace; nothing relates ids across
/// collections. Implementations must be safe to share behind an `Arc`.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert a record, replacing any existing record with the same id
    async fn upsert(&self, collection: &str, record: StoredRecord) -> Result<()>;

    /// Fetch one record by id
    async fn get(&self, collection: &str, id: &str) -> Result<Option<StoredRecord>>;

    /// Remove a record; returns false when the id was absent
    async fn delete(&self, collection: &str, id: &str) -> Result<bool>;

    /// The `k` records nearest to `vector`, closest first
    async fn query(&self, collection: &str, vector: &[f32], k: usize) -> Result<Vec<QueryMatch>>;

    /// Number of records in the collection
    async fn count(&self, collection: &str) -> Result<usize>;

    /// Every record in the collection; enumeration order is backend-defined
    async fn list(&self, collection: &str) -> Result<Vec<StoredRecord>>;
}
