use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use arrow_array::{
    Array, FixedSizeListArray, Float32Array, Int64Array, RecordBatch, RecordBatchIterator,
    StringArray, TimestampMicrosecondArray,
};
use arrow_schema::{DataType, Field, Schema, TimeUnit};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::Table;
use lancedb::connection::Connection;
use lancedb::query::{ExecutableQuery, QueryBase};
use tokio::sync::RwLock;

use super::{QueryMatch, RecordFields, StoredRecord, VectorIndex, euclidean_distance};
use crate::error::{EngramError, Result};

/// Vector index persisted on disk through LanceDB.
///
/// Collections map to Lance tables, created lazily on first touch. All
/// tables share one record schema whose vector column is sized at
/// connection time.
pub struct LanceIndex {
    connection: Connection,
    dimension: i32,
    tables: RwLock<HashMap<String, Table>>,
}

impl LanceIndex {
    pub async fn connect(path: &Path, dimension: usize) -> Result<Self> {
        let uri = path
            .to_str()
            .ok_or_else(|| EngramError::Storage("Invalid path encoding".to_string()))?;

        let connection = lancedb::connect(uri)
            .execute()
            .await
            .map_err(|e| EngramError::Storage(format!("Failed to connect to LanceDB: {e}")))?;

        Ok(Self {
            connection,
            dimension: dimension as i32,
            tables: RwLock::new(HashMap::new()),
        })
    }

    pub fn dimension(&self) -> usize {
        self.dimension as usize
    }

    fn record_schema(&self) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new("document", DataType::Utf8, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    self.dimension,
                ),
                false,
            ),
            Field::new("summary", DataType::Utf8, true),
            Field::new(
                "created_at",
                DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into())),
                false,
            ),
            Field::new(
                "last_accessed",
                DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into())),
                false,
            ),
            Field::new("access_count", DataType::Int64, false),
            Field::new("importance_score", DataType::Float32, false),
            Field::new("topics", DataType::Utf8, false),
            Field::new("tags", DataType::Utf8, false),
            Field::new("source", DataType::Utf8, false),
            Field::new("tier", DataType::Utf8, false),
            Field::new("related_memories", DataType::Utf8, false),
            Field::new("schema_version", DataType::Int64, false),
        ]))
    }

    fn create_empty_batch(schema: Arc<Schema>, dimension: i32) -> RecordBatch {
        let empty_strings: Vec<Option<&str>> = vec![];
        let empty_floats: Vec<f32> = vec![];
        let empty_timestamps: Vec<i64> = vec![];
        let empty_ints: Vec<i64> = vec![];
        let empty_vectors: Vec<Option<Vec<Option<f32>>>> = vec![];

        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(empty_strings.clone())),
                Arc::new(StringArray::from(empty_strings.clone())),
                Arc::new(FixedSizeListArray::from_iter_primitive::<
                    arrow_array::types::Float32Type,
                    _,
                    _,
                >(empty_vectors, dimension)),
                Arc::new(StringArray::from(empty_strings.clone())),
                Arc::new(
                    TimestampMicrosecondArray::from(empty_timestamps.clone()).with_timezone("UTC"),
                ),
                Arc::new(TimestampMicrosecondArray::from(empty_timestamps).with_timezone("UTC")),
                Arc::new(Int64Array::from(empty_ints.clone())),
                Arc::new(Float32Array::from(empty_floats)),
                Arc::new(StringArray::from(empty_strings.clone())),
                Arc::new(StringArray::from(empty_strings.clone())),
                Arc::new(StringArray::from(empty_strings.clone())),
                Arc::new(StringArray::from(empty_strings.clone())),
                Arc::new(StringArray::from(empty_strings)),
                Arc::new(Int64Array::from(empty_ints)),
            ],
        )
        .expect("Schema matches columns")
    }

    /// Open the table behind a collection, creating it when absent.
    async fn ensure_table(&self, collection: &str) -> Result<Table> {
        {
            let tables = self.tables.read().await;
            if let Some(table) = tables.get(collection) {
                return Ok(table.clone());
            }
        }

        let mut tables = self.tables.write().await;
        // A concurrent caller may have opened it while we waited.
        if let Some(table) = tables.get(collection) {
            return Ok(table.clone());
        }

        let names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| EngramError::Storage(format!("Failed to list tables: {e}")))?;

        let table = if names.contains(&collection.to_string()) {
            self.connection
                .open_table(collection)
                .execute()
                .await
                .map_err(|e| EngramError::Storage(format!("Failed to open table: {e}")))?
        } else {
            let schema = self.record_schema();
            let batch = Self::create_empty_batch(schema.clone(), self.dimension);
            let batches = RecordBatchIterator::new(vec![Ok(batch)], schema);

            self.connection
                .create_table(collection, Box::new(batches))
                .execute()
                .await
                .map_err(|e| EngramError::Storage(format!("Failed to create table: {e}")))?
        };

        tables.insert(collection.to_string(), table.clone());
        Ok(table)
    }

    /// Convert a record to a single-row Arrow RecordBatch
    fn record_to_batch(&self, record: &StoredRecord, schema: Arc<Schema>) -> Result<RecordBatch> {
        if record.vector.len() != self.dimension as usize {
            return Err(EngramError::Storage(format!(
                "Vector length {} does not match index dimension {}",
                record.vector.len(),
                self.dimension
            )));
        }

        let vectors: Vec<Option<Vec<Option<f32>>>> =
            vec![Some(record.vector.iter().map(|&v| Some(v)).collect())];

        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(vec![record.id.as_str()])),
                Arc::new(StringArray::from(vec![record.document.as_str()])),
                Arc::new(FixedSizeListArray::from_iter_primitive::<
                    arrow_array::types::Float32Type,
                    _,
                    _,
                >(vectors, self.dimension)),
                Arc::new(StringArray::from(vec![record.fields.summary.as_deref()])),
                Arc::new(
                    TimestampMicrosecondArray::from(vec![record.fields.created_at])
                        .with_timezone("UTC"),
                ),
                Arc::new(
                    TimestampMicrosecondArray::from(vec![record.fields.last_accessed])
                        .with_timezone("UTC"),
                ),
                Arc::new(Int64Array::from(vec![record.fields.access_count])),
                Arc::new(Float32Array::from(vec![record.fields.importance_score])),
                Arc::new(StringArray::from(vec![record.fields.topics.as_str()])),
                Arc::new(StringArray::from(vec![record.fields.tags.as_str()])),
                Arc::new(StringArray::from(vec![record.fields.source.as_str()])),
                Arc::new(StringArray::from(vec![record.fields.tier.as_str()])),
                Arc::new(StringArray::from(vec![
                    record.fields.related_memories.as_str(),
                ])),
                Arc::new(Int64Array::from(vec![record.fields.version])),
            ],
        )
        .map_err(|e| EngramError::Storage(format!("Failed to create record batch: {e}")))
    }

    /// Convert an Arrow RecordBatch row back to a record
    fn batch_to_record(batch: &RecordBatch, row: usize) -> Result<StoredRecord> {
        let id_array = batch
            .column(0)
            .as_any()
            .downcast_ref::<StringArray>()
            .ok_or_else(|| EngramError::Storage("Failed to get id column".to_string()))?;

        let document_array = batch
            .column(1)
            .as_any()
            .downcast_ref::<StringArray>()
            .ok_or_else(|| EngramError::Storage("Failed to get document column".to_string()))?;

        let vector_array = batch
            .column(2)
            .as_any()
            .downcast_ref::<FixedSizeListArray>()
            .ok_or_else(|| EngramError::Storage("Failed to get vector column".to_string()))?;

        let summary_array = batch
            .column(3)
            .as_any()
            .downcast_ref::<StringArray>()
            .ok_or_else(|| EngramError::Storage("Failed to get summary column".to_string()))?;

        let created_at_array = batch
            .column(4)
            .as_any()
            .downcast_ref::<TimestampMicrosecondArray>()
            .ok_or_else(|| EngramError::Storage("Failed to get created_at column".to_string()))?;

        let last_accessed_array = batch
            .column(5)
            .as_any()
            .downcast_ref::<TimestampMicrosecondArray>()
            .ok_or_else(|| {
                EngramError::Storage("Failed to get last_accessed column".to_string())
            })?;

        let access_count_array = batch
            .column(6)
            .as_any()
            .downcast_ref::<Int64Array>()
            .ok_or_else(|| EngramError::Storage("Failed to get access_count column".to_string()))?;

        let importance_array = batch
            .column(7)
            .as_any()
            .downcast_ref::<Float32Array>()
            .ok_or_else(|| {
                EngramError::Storage("Failed to get importance_score column".to_string())
            })?;

        let topics_array = batch
            .column(8)
            .as_any()
            .downcast_ref::<StringArray>()
            .ok_or_else(|| EngramError::Storage("Failed to get topics column".to_string()))?;

        let tags_array = batch
            .column(9)
            .as_any()
            .downcast_ref::<StringArray>()
            .ok_or_else(|| EngramError::Storage("Failed to get tags column".to_string()))?;

        let source_array = batch
            .column(10)
            .as_any()
            .downcast_ref::<StringArray>()
            .ok_or_else(|| EngramError::Storage("Failed to get source column".to_string()))?;

        let tier_array = batch
            .column(11)
            .as_any()
            .downcast_ref::<StringArray>()
            .ok_or_else(|| EngramError::Storage("Failed to get tier column".to_string()))?;

        let related_array = batch
            .column(12)
            .as_any()
            .downcast_ref::<StringArray>()
            .ok_or_else(|| {
                EngramError::Storage("Failed to get related_memories column".to_string())
            })?;

        let version_array = batch
            .column(13)
            .as_any()
            .downcast_ref::<Int64Array>()
            .ok_or_else(|| {
                EngramError::Storage("Failed to get schema_version column".to_string())
            })?;

        let vector_list = vector_array.value(row);
        let vector_values = vector_list
            .as_any()
            .downcast_ref::<Float32Array>()
            .ok_or_else(|| EngramError::Storage("Failed to get vector values".to_string()))?;
        let vector: Vec<f32> = (0..vector_values.len())
            .map(|i| vector_values.value(i))
            .collect();

        let summary = if summary_array.is_null(row) {
            None
        } else {
            let value = summary_array.value(row);
            if value.is_empty() {
                None
            } else {
                Some(value.to_string())
            }
        };

        Ok(StoredRecord {
            id: id_array.value(row).to_string(),
            document: document_array.value(row).to_string(),
            vector,
            fields: RecordFields {
                version: version_array.value(row),
                summary,
                created_at: created_at_array.value(row),
                last_accessed: last_accessed_array.value(row),
                access_count: access_count_array.value(row),
                importance_score: importance_array.value(row),
                topics: topics_array.value(row).to_string(),
                tags: tags_array.value(row).to_string(),
                source: source_array.value(row).to_string(),
                tier: tier_array.value(row).to_string(),
                related_memories: related_array.value(row).to_string(),
            },
        })
    }

    fn id_predicate(id: &str) -> String {
        let escaped = id.replace('\'', "''");
        format!("id = '{escaped}'")
    }
}

#[async_trait]
impl VectorIndex for LanceIndex {
    async fn upsert(&self, collection: &str, record: StoredRecord) -> Result<()> {
        let table = self.ensure_table(collection).await?;

        let schema = self.record_schema();
        let batch = self.record_to_batch(&record, schema.clone())?;
        let batches = RecordBatchIterator::new(vec![Ok(batch)], schema);

        // Replace rather than duplicate when the id already exists.
        table
            .delete(&Self::id_predicate(&record.id))
            .await
            .map_err(|e| EngramError::Storage(format!("Failed to replace record: {e}")))?;

        table
            .add(Box::new(batches))
            .execute()
            .await
            .map_err(|e| EngramError::Storage(format!("Failed to insert record: {e}")))?;

        Ok(())
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<StoredRecord>> {
        let table = self.ensure_table(collection).await?;

        let stream = table
            .query()
            .only_if(Self::id_predicate(id))
            .execute()
            .await
            .map_err(|e| EngramError::Storage(format!("Failed to query record: {e}")))?;

        let batches: Vec<RecordBatch> = stream
            .try_collect()
            .await
            .map_err(|e| EngramError::Storage(format!("Failed to collect query results: {e}")))?;

        for batch in &batches {
            if batch.num_rows() > 0 {
                return Ok(Some(Self::batch_to_record(batch, 0)?));
            }
        }

        Ok(None)
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool> {
        let table = self.ensure_table(collection).await?;

        let exists = self.get(collection, id).await?.is_some();

        if exists {
            table
                .delete(&Self::id_predicate(id))
                .await
                .map_err(|e| EngramError::Storage(format!("Failed to delete record: {e}")))?;
        }

        Ok(exists)
    }

    async fn query(&self, collection: &str, vector: &[f32], k: usize) -> Result<Vec<QueryMatch>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let table = self.ensure_table(collection).await?;

        let stream = table
            .query()
            .nearest_to(vector)
            .map_err(|e| EngramError::Storage(format!("Failed to create vector query: {e}")))?
            .limit(k)
            .execute()
            .await
            .map_err(|e| EngramError::Storage(format!("Failed to execute search: {e}")))?;

        let batches: Vec<RecordBatch> = stream
            .try_collect()
            .await
            .map_err(|e| EngramError::Storage(format!("Failed to collect search results: {e}")))?;

        let mut matches = Vec::new();
        for batch in &batches {
            for row in 0..batch.num_rows() {
                let record = Self::batch_to_record(batch, row)?;
                matches.push(QueryMatch {
                    distance: euclidean_distance(&record.vector, vector),
                    record,
                });
            }
        }

        // Recomputed client-side, so re-sort rather than trust stream order.
        matches.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        Ok(matches)
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let table = self.ensure_table(collection).await?;

        table
            .count_rows(None)
            .await
            .map_err(|e| EngramError::Storage(format!("Failed to count records: {e}")))
    }

    async fn list(&self, collection: &str) -> Result<Vec<StoredRecord>> {
        let table = self.ensure_table(collection).await?;

        let stream = table
            .query()
            .execute()
            .await
            .map_err(|e| EngramError::Storage(format!("Failed to list records: {e}")))?;

        let batches: Vec<RecordBatch> = stream
            .try_collect()
            .await
            .map_err(|e| EngramError::Storage(format!("Failed to collect records: {e}")))?;

        let mut records = Vec::new();
        for batch in &batches {
            for row in 0..batch.num_rows() {
                records.push(Self::batch_to_record(batch, row)?);
            }
        }

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::SCHEMA_VERSION;

    const TEST_DIMENSION: usize = 4;

    async fn create_test_index() -> (LanceIndex, tempfile::TempDir) {
        let temp_dir = tempfile::tempdir().unwrap();
        let index = LanceIndex::connect(temp_dir.path(), TEST_DIMENSION)
            .await
            .unwrap();
        (index, temp_dir)
    }

    fn test_record(id: &str, vector: Vec<f32>) -> StoredRecord {
        StoredRecord {
            id: id.to_string(),
            document: format!("document for {id}"),
            vector,
            fields: RecordFields {
                version: SCHEMA_VERSION,
                summary: None,
                created_at: 1_700_000_000_000_000,
                last_accessed: 1_700_000_000_000_000,
                access_count: 2,
                importance_score: 0.5,
                topics: r#"["testing"]"#.to_string(),
                tags: "[]".to_string(),
                source: "user_conversation".to_string(),
                tier: "tier1_active".to_string(),
                related_memories: "[]".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn test_schema_has_correct_fields() {
        let (index, _dir) = create_test_index().await;
        let schema = index.record_schema();

        assert_eq!(schema.fields().len(), 14);

        let field_names: Vec<&str> = schema.fields().iter().map(|f| f.name().as_str()).collect();
        assert!(field_names.contains(&"id"));
        assert!(field_names.contains(&"document"));
        assert!(field_names.contains(&"vector"));
        assert!(field_names.contains(&"summary"));
        assert!(field_names.contains(&"created_at"));
        assert!(field_names.contains(&"last_accessed"));
        assert!(field_names.contains(&"access_count"));
        assert!(field_names.contains(&"importance_score"));
        assert!(field_names.contains(&"topics"));
        assert!(field_names.contains(&"tags"));
        assert!(field_names.contains(&"source"));
        assert!(field_names.contains(&"tier"));
        assert!(field_names.contains(&"related_memories"));
        assert!(field_names.contains(&"schema_version"));
    }

    #[tokio::test]
    async fn test_vector_field_dimensions() {
        let (index, _dir) = create_test_index().await;
        let schema = index.record_schema();
        let vector_field = schema.field_with_name("vector").unwrap();

        match vector_field.data_type() {
            DataType::FixedSizeList(_, size) => {
                assert_eq!(*size, TEST_DIMENSION as i32);
            }
            _ => panic!("Expected FixedSizeList type for vector field"),
        }
    }

    #[tokio::test]
    async fn test_upsert_and_get() {
        let (index, _dir) = create_test_index().await;

        let record = test_record("a", vec![0.1, 0.2, 0.3, 0.4]);
        index.upsert("memories", record.clone()).await.unwrap();

        let fetched = index.get("memories", "a").await.unwrap();
        assert_eq!(fetched, Some(record));
    }

    #[tokio::test]
    async fn test_get_nonexistent_returns_none() {
        let (index, _dir) = create_test_index().await;

        let fetched = index.get("memories", "missing").await.unwrap();
        assert!(fetched.is_none());
    }

    #[tokio::test]
    async fn test_upsert_replaces_same_id() {
        let (index, _dir) = create_test_index().await;

        index
            .upsert("memories", test_record("a", vec![0.1, 0.2, 0.3, 0.4]))
            .await
            .unwrap();

        let mut replacement = test_record("a", vec![0.9, 0.8, 0.7, 0.6]);
        replacement.document = "updated".to_string();
        index.upsert("memories", replacement).await.unwrap();

        assert_eq!(index.count("memories").await.unwrap(), 1);
        let fetched = index.get("memories", "a").await.unwrap().unwrap();
        assert_eq!(fetched.document, "updated");
        assert_eq!(fetched.vector, vec![0.9, 0.8, 0.7, 0.6]);
    }

    #[tokio::test]
    async fn test_summary_round_trip() {
        let (index, _dir) = create_test_index().await;

        let mut record = test_record("summarized", vec![0.1, 0.2, 0.3, 0.4]);
        record.fields.summary = Some("A short summary".to_string());
        index.upsert("memories", record).await.unwrap();

        let fetched = index.get("memories", "summarized").await.unwrap().unwrap();
        assert_eq!(fetched.fields.summary.as_deref(), Some("A short summary"));
    }

    #[tokio::test]
    async fn test_rejects_wrong_dimension() {
        let (index, _dir) = create_test_index().await;

        let record = test_record("bad", vec![0.1, 0.2]);
        let result = index.upsert("memories", record).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_delete_reports_presence() {
        let (index, _dir) = create_test_index().await;

        index
            .upsert("memories", test_record("a", vec![0.1, 0.2, 0.3, 0.4]))
            .await
            .unwrap();

        assert!(index.delete("memories", "a").await.unwrap());
        assert!(!index.delete("memories", "a").await.unwrap());
        assert!(index.get("memories", "a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_query_orders_by_distance() {
        let (index, _dir) = create_test_index().await;

        index
            .upsert("memories", test_record("far", vec![10.0, 0.0, 0.0, 0.0]))
            .await
            .unwrap();
        index
            .upsert("memories", test_record("near", vec![1.0, 0.0, 0.0, 0.0]))
            .await
            .unwrap();
        index
            .upsert("memories", test_record("middle", vec![5.0, 0.0, 0.0, 0.0]))
            .await
            .unwrap();

        let matches = index
            .query("memories", &[0.0, 0.0, 0.0, 0.0], 10)
            .await
            .unwrap();

        let ids: Vec<&str> = matches.iter().map(|m| m.record.id.as_str()).collect();
        assert_eq!(ids, vec!["near", "middle", "far"]);
        assert!((matches[0].distance - 1.0).abs() < 1e-5);
        assert!((matches[2].distance - 10.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_query_respects_limit() {
        let (index, _dir) = create_test_index().await;

        for i in 0..5 {
            index
                .upsert(
                    "memories",
                    test_record(&format!("r{i}"), vec![i as f32, 0.0, 0.0, 0.0]),
                )
                .await
                .unwrap();
        }

        let matches = index
            .query("memories", &[0.0, 0.0, 0.0, 0.0], 2)
            .await
            .unwrap();
        assert_eq!(matches.len(), 2);
    }

    #[tokio::test]
    async fn test_list_and_count() {
        let (index, _dir) = create_test_index().await;

        assert_eq!(index.count("memories").await.unwrap(), 0);

        for id in ["a", "b", "c"] {
            index
                .upsert("memories", test_record(id, vec![0.1, 0.2, 0.3, 0.4]))
                .await
                .unwrap();
        }

        assert_eq!(index.count("memories").await.unwrap(), 3);
        assert_eq!(index.list("memories").await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_collections_are_independent() {
        let (index, _dir) = create_test_index().await;

        index
            .upsert("tier1", test_record("a", vec![0.1, 0.2, 0.3, 0.4]))
            .await
            .unwrap();
        index
            .upsert("tier2", test_record("a", vec![0.5, 0.6, 0.7, 0.8]))
            .await
            .unwrap();

        assert!(index.delete("tier1", "a").await.unwrap());
        assert_eq!(index.count("tier1").await.unwrap(), 0);
        assert_eq!(index.count("tier2").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_reopens_existing_table() {
        let temp_dir = tempfile::tempdir().unwrap();

        {
            let index = LanceIndex::connect(temp_dir.path(), TEST_DIMENSION)
                .await
                .unwrap();
            index
                .upsert("memories", test_record("persisted", vec![0.1, 0.2, 0.3, 0.4]))
                .await
                .unwrap();
        }

        let index = LanceIndex::connect(temp_dir.path(), TEST_DIMENSION)
            .await
            .unwrap();
        let fetched = index.get("memories", "persisted").await.unwrap();
        assert!(fetched.is_some());
        assert_eq!(fetched.unwrap().document, "document for persisted");
    }
}
