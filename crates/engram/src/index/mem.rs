//! In-memory vector index
//!
//! Deterministic backend used by tests and ephemeral stores. Records keep
//! insertion order within a collection, so enumeration and equal-distance
//! query results are reproducible. Distance is Euclidean, matching the
//! disk-backed index.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use super::{QueryMatch, StoredRecord, VectorIndex, euclidean_distance};
use crate::error::{EngramError, Result};

/// Vector index held entirely in process memory.
#[derive(Default)]
pub struct MemIndex {
    collections: RwLock<HashMap<String, Vec<StoredRecord>>>,
}

impl MemIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, HashMap<String, Vec<StoredRecord>>>> {
        self.collections
            .read()
            .map_err(|_| EngramError::Storage("Index lock poisoned".to_string()))
    }

    fn write(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<String, Vec<StoredRecord>>>> {
        self.collections
            .write()
            .map_err(|_| EngramError::Storage("Index lock poisoned".to_string()))
    }
}

#[async_trait]
impl VectorIndex for MemIndex {
    async fn upsert(&self, collection: &str, record: StoredRecord) -> Result<()> {
        let mut collections = self.write()?;
        let records = collections.entry(collection.to_string()).or_default();

        match records.iter().position(|r| r.id == record.id) {
            Some(pos) => records[pos] = record,
            None => records.push(record),
        }
        Ok(())
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<StoredRecord>> {
        let collections = self.read()?;
        Ok(collections
            .get(collection)
            .and_then(|records| records.iter().find(|r| r.id == id).cloned()))
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool> {
        let mut collections = self.write()?;
        if let Some(records) = collections.get_mut(collection) {
            if let Some(pos) = records.iter().position(|r| r.id == id) {
                records.remove(pos);
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn query(&self, collection: &str, vector: &[f32], k: usize) -> Result<Vec<QueryMatch>> {
        let collections = self.read()?;
        let Some(records) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        let mut matches: Vec<QueryMatch> = records
            .iter()
            .map(|record| QueryMatch {
                distance: euclidean_distance(&record.vector, vector),
                record: record.clone(),
            })
            .collect();

        // Stable sort keeps insertion order among equidistant records.
        matches.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        matches.truncate(k);

        Ok(matches)
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let collections = self.read()?;
        Ok(collections.get(collection).map_or(0, Vec::len))
    }

    async fn list(&self, collection: &str) -> Result<Vec<StoredRecord>> {
        let collections = self.read()?;
        Ok(collections.get(collection).cloned().unwrap_or_default())
    }
}
