//! Per-node evaluation output

use serde::{Deserialize, Serialize};

/// Scores below this classify as Broken
pub const BROKEN_BELOW: f64 = 0.4;
/// Scores at or above this classify as Stable
pub const STABLE_FROM: f64 = 0.8;

/// Absorbs floating-point drift at the thresholds: (1 + 0.2) / 3 evaluates
/// to 0.39999999999999997 and must still classify as Weak.
const THRESHOLD_EPSILON: f64 = 1e-9;

/// Tri-level label derived from a node's score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Classification {
    Stable,
    Weak,
    Broken,
}

impl Classification {
    /// `< 0.4` → Broken, `< 0.8` → Weak, otherwise Stable
    pub fn from_score(score: f64) -> Self {
        if score < BROKEN_BELOW - THRESHOLD_EPSILON {
            Classification::Broken
        } else if score < STABLE_FROM - THRESHOLD_EPSILON {
            Classification::Weak
        } else {
            Classification::Stable
        }
    }
}

/// Evaluator output for one node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeResult {
    pub node_id: String,
    pub node_name: String,
    /// Weighted coverage in [0, 1]
    pub score: f64,
    pub classification: Classification,
    /// Prerequisite concepts judged not understood
    #[serde(default)]
    pub missing_concepts: Vec<String>,
}
