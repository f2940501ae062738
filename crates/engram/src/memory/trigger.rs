//! Archival trigger policy
//!
//! Pure decision logic for whether a Tier-1 entry should move to Tier 2,
//! based on entry age, token pressure, and an explicit operator override.

use serde::{Deserialize, Serialize};

use crate::memory::types::MemoryEntry;

/// Policy thresholds for archival decisions.
///
/// Immutable per evaluation; build a new value to change policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchivalTrigger {
    /// Entries older than this many hours are archived unconditionally
    pub age_threshold_hours: f32,
    /// Pressure above this enables importance-based archival, in [0, 1]
    pub token_pressure_threshold: f32,
    /// Under pressure, entries below this importance are archived, in [0, 1]
    pub min_importance_score: f32,
    /// Operator override; archives every evaluated entry when set
    pub explicit_user_request: bool,
}

impl Default for ArchivalTrigger {
    fn default() -> Self {
        Self {
            age_threshold_hours: 24.0,
            token_pressure_threshold: 0.7,
            min_importance_score: 0.3,
            explicit_user_request: false,
        }
    }
}

impl ArchivalTrigger {
    /// Whether `entry` should move to Tier 2 given the current pressure.
    ///
    /// The override short-circuits everything else. Age-based archival is
    /// unconditional (stale content always moves); pressure-based archival
    /// only sheds entries below the importance floor.
    pub fn should_archive(&self, entry: &MemoryEntry, token_usage: f32) -> bool {
        if self.explicit_user_request {
            return true;
        }

        if entry.age_hours() > self.age_threshold_hours {
            return true;
        }

        token_usage > self.token_pressure_threshold
            && entry.metadata.importance_score < self.min_importance_score
    }
}
