//! Risk level classification.
//!
//! The level is derived from the regional score alone. The local score is
//! reported alongside it but never changes the level.

use crate::model::RiskLevel;

/// Lower bounds (inclusive) of each non-`none` level on the regional score.
///
/// Levels in ascending order:
///   low < medium < high
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskThresholds {
    pub low: f64,
    pub medium: f64,
    pub high: f64,
}

/// Calibrated on the extrapolated population at σ = 50 km: ten particles
/// sitting 50 km out with a unit ratio land just above `low`.
pub const RISK_THRESHOLDS: RiskThresholds = RiskThresholds {
    low: 5.0,
    medium: 25.0,
    high: 75.0,
};

/// Maps a regional score onto a risk level using `RISK_THRESHOLDS`.
pub fn classify(regional_score: f64) -> RiskLevel {
    classify_with(regional_score, &RISK_THRESHOLDS)
}

/// Picks the highest threshold satisfied by `regional_score`. NaN satisfies
/// none of them and classifies as `None`.
pub fn classify_with(regional_score: f64, thresholds: &RiskThresholds) -> RiskLevel {
    if regional_score >= thresholds.high {
        RiskLevel::High
    } else if regional_score >= thresholds.medium {
        RiskLevel::Medium
    } else if regional_score >= thresholds.low {
        RiskLevel::Low
    } else {
        RiskLevel::None
    }
}
