//! Embedding provider abstraction
//!
//! Text-to-vector generation behind a trait so the store and pipeline can be
//! constructed with any provider: the bundled fastembed model in production,
//! a deterministic stand-in under test. Vector dimension is fixed per
//! provider instance and must match across everything stored and queried.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;
use std::sync::Mutex;

use fastembed::{EmbeddingModel as FastEmbedModel, InitOptions, TextEmbedding};
use lru::LruCache;

use crate::error::{EngramError, Result};

/// Vector dimension of the bundled MiniLM model
pub const EMBEDDING_DIMENSION: usize = 384;

/// Default capacity of the text-to-vector cache
pub const DEFAULT_CACHE_SIZE: usize = 1024;

/// Maps text to fixed-dimension vectors and compares them.
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed a batch of texts; output order matches input order
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Dimension of the vectors this provider produces
    fn dimension(&self) -> usize;

    /// Cosine similarity between two vectors; 0 for zero-norm input
    fn similarity(&self, a: &[f32], b: &[f32]) -> f32 {
        cosine_similarity(a, b)
    }
}

/// Calculate cosine similarity between two vectors.
///
/// Returns 0 for mismatched lengths or zero-norm inputs rather than failing,
/// and clamps the result against floating-point drift.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    (dot_product / (norm_a * norm_b)).clamp(-1.0, 1.0)
}

/// Embedding provider backed by a local fastembed model.
///
/// Keeps an LRU cache of previously embedded texts so repeated archival and
/// search work does not hit the model twice for the same input.
pub struct FastEmbedProvider {
    // TextEmbedding wants exclusive access while encoding; serialize it.
    model: Mutex<TextEmbedding>,
    cache: Mutex<LruCache<u64, Vec<f32>>>,
}

impl FastEmbedProvider {
    /// Load the model with the default cache capacity
    pub fn new() -> Result<Self> {
        Self::with_cache_size(DEFAULT_CACHE_SIZE)
    }

    /// Load the model with an explicit cache capacity (minimum 1)
    pub fn with_cache_size(cache_size: usize) -> Result<Self> {
        let model = TextEmbedding::try_new(InitOptions::new(FastEmbedModel::AllMiniLML6V2))
            .map_err(|e| EngramError::Embedding(format!("Failed to load embedding model: {e}")))?;
        let capacity = NonZeroUsize::new(cache_size).unwrap_or(NonZeroUsize::MIN);

        Ok(Self {
            model: Mutex::new(model),
            cache: Mutex::new(LruCache::new(capacity)),
        })
    }

    fn cache_key(text: &str) -> u64 {
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        hasher.finish()
    }
}

impl EmbeddingProvider for FastEmbedProvider {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let key = Self::cache_key(text);

        if let Some(hit) = self
            .cache
            .lock()
            .map_err(|_| EngramError::Embedding("Embedding cache lock poisoned".to_string()))?
            .get(&key)
        {
            return Ok(hit.clone());
        }

        let embeddings = self
            .model
            .lock()
            .map_err(|_| EngramError::Embedding("Embedding model lock poisoned".to_string()))?
            .embed(vec![text.to_string()], None)
            .map_err(|e| EngramError::Embedding(format!("Failed to embed text: {e}")))?;
        let embedding = embeddings
            .into_iter()
            .next()
            .ok_or_else(|| EngramError::Embedding("No embedding returned".to_string()))?;

        self.cache
            .lock()
            .map_err(|_| EngramError::Embedding("Embedding cache lock poisoned".to_string()))?
            .put(key, embedding.clone());

        Ok(embedding)
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let keys: Vec<u64> = texts.iter().map(|t| Self::cache_key(t)).collect();
        let mut results: Vec<Option<Vec<f32>>> = vec![None; texts.len()];

        {
            let mut cache = self
                .cache
                .lock()
                .map_err(|_| EngramError::Embedding("Embedding cache lock poisoned".to_string()))?;
            for (i, key) in keys.iter().enumerate() {
                if let Some(hit) = cache.get(key) {
                    results[i] = Some(hit.clone());
                }
            }
        }

        let missing: Vec<usize> = results
            .iter()
            .enumerate()
            .filter(|(_, r)| r.is_none())
            .map(|(i, _)| i)
            .collect();

        if !missing.is_empty() {
            let batch: Vec<String> = missing.iter().map(|&i| texts[i].clone()).collect();
            let fresh = self
                .model
                .lock()
                .map_err(|_| EngramError::Embedding("Embedding model lock poisoned".to_string()))?
                .embed(batch, None)
                .map_err(|e| EngramError::Embedding(format!("Failed to embed batch: {e}")))?;

            if fresh.len() != missing.len() {
                return Err(EngramError::Embedding(format!(
                    "Expected {} embeddings, got {}",
                    missing.len(),
                    fresh.len()
                )));
            }

            let mut cache = self
                .cache
                .lock()
                .map_err(|_| EngramError::Embedding("Embedding cache lock poisoned".to_string()))?;
            for (&i, embedding) in missing.iter().zip(fresh) {
                cache.put(keys[i], embedding.clone());
                results[i] = Some(embedding);
            }
        }

        results
            .into_iter()
            .map(|r| {
                r.ok_or_else(|| EngramError::Embedding("Missing embedding in batch".to_string()))
            })
            .collect()
    }

    fn dimension(&self) -> usize {
        EMBEDDING_DIMENSION
    }
}
