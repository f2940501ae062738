//! Error types for Engram

use thiserror::Error;

/// Main error type for Engram operations
#[derive(Error, Debug)]
pub enum EngramError {
    /// Storage-related errors (vector index, file system, etc.)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Embedding generation errors
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Memory operation errors
    #[error("Memory error: {0}")]
    Memory(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type alias for Engram operations
pub type Result<T> = std::result::Result<T, EngramError>;
