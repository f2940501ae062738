//! Test utilities for engram - shared models and mocks
//!
//! This module provides utilities to speed up test execution:
//! - A deterministic mock embedding provider for fast unit tests
//! - A shared real-model provider (loaded once per test binary) for the
//!   model-backed integration tests

use std::collections::HashMap;
use std::sync::{LazyLock, Mutex};

use crate::embedding::{EMBEDDING_DIMENSION, EmbeddingProvider, FastEmbedProvider};
use crate::error::Result;

/// Shared fastembed provider instance - loaded once per test binary.
/// Use this instead of `FastEmbedProvider::new()` in tests to avoid repeated
/// model loading.
pub static SHARED_EMBEDDING_PROVIDER: LazyLock<FastEmbedProvider> =
    LazyLock::new(|| FastEmbedProvider::new().expect("Failed to load embedding model for tests"));

/// Mock embedding provider for fast unit tests that don't need real ML.
///
/// Produces deterministic vectors based on input text hash, so the same
/// text always lands at the same point. Individual texts can be pinned to
/// exact vectors when a test needs controlled distances.
pub struct MockEmbedder {
    dimension: usize,
    pinned: Mutex<HashMap<String, Vec<f32>>>,
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEmbedder {
    pub fn new() -> Self {
        Self::with_dimension(EMBEDDING_DIMENSION)
    }

    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            dimension,
            pinned: Mutex::new(HashMap::new()),
        }
    }

    /// Pin `text` to an exact vector, overriding the hash-derived one.
    pub fn pin(&self, text: &str, vector: Vec<f32>) {
        assert_eq!(
            vector.len(),
            self.dimension,
            "Pinned vector must match the mock dimension"
        );
        self.pinned
            .lock()
            .expect("Mock embedder lock poisoned")
            .insert(text.to_string(), vector);
    }

    /// Generate a deterministic "embedding" from text using hashing.
    /// Values fall in [-1, 1].
    fn hash_vector(&self, text: &str) -> Vec<f32> {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        let seed = hasher.finish();

        (0..self.dimension)
            .map(|i| {
                let x = seed
                    .wrapping_mul(i as u64 + 1)
                    .wrapping_add(0x9e3779b97f4a7c15);
                let normalized = (x as f32) / (u64::MAX as f32);
                (normalized * 2.0) - 1.0
            })
            .collect()
    }
}

impl EmbeddingProvider for MockEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if let Some(vector) = self
            .pinned
            .lock()
            .expect("Mock embedder lock poisoned")
            .get(text)
        {
            return Ok(vector.clone());
        }
        Ok(self.hash_vector(text))
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
