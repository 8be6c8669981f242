use std::fmt;

use serde::{Deserialize, Serialize};

/// Review severity of a frame's weakest-link confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Band {
    High,
    Medium,
    Low,
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Band::High => "high",
            Band::Medium => "medium",
            Band::Low => "low",
        })
    }
}

/// Thresholds for [`Band`] classification.
///
/// `high` is inclusive, `low` is inclusive, anything strictly between is medium.
/// These are diagnostic only and never decide whether a coordinate is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceBands {
    pub high: f32,
    pub low: f32,
}

impl Default for ConfidenceBands {
    fn default() -> Self {
        Self {
            high: 0.90,
            low: 0.39,
        }
    }
}

impl ConfidenceBands {
    pub fn classify(&self, confidence: f32) -> Band {
        if confidence >= self.high {
            Band::High
        } else if confidence > self.low {
            Band::Medium
        } else {
            Band::Low
        }
    }

    pub fn is_valid(&self) -> bool {
        (0.0..=1.0).contains(&self.low) && (0.0..=1.0).contains(&self.high) && self.low < self.high
    }
}
