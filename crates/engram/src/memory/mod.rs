//! Memory types and archival policy
//!
//! Defines the core entry structures shared by both tiers, plus the pure
//! policy functions the archival pipeline is built from: trigger decisions,
//! importance scoring, and extractive compression.

pub mod compression;
pub mod scoring;
pub mod trigger;
pub mod types;

pub use compression::compress;
pub use scoring::calculate_importance;
pub use trigger::ArchivalTrigger;
pub use types::{
    DEFAULT_TOKEN_LIMIT, MemoryEntry, MemoryHealth, MemoryMetadata, MemoryTier,
};
