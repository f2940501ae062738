//! Engram - Tiered semantic memory for AI agents
//!
//! This crate manages agent memory across two tiers backed by a vector
//! database: an active tier for recent context and a persistent tier for
//! compressed archives, with semantic search spanning both and a background
//! pipeline that migrates entries between them.

pub mod config;
pub mod embedding;
pub mod error;
pub mod index;
pub mod memory;
pub mod pipeline;
pub mod store;
pub mod testing;

pub use error::EngramError;
