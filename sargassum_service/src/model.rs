/// Core data types for the sargassum beach risk service.
///
/// This module defines the shared domain model imported by all other modules.
/// It contains no I/O and no database code, only types, a handful of
/// derived quantities, and the error enums each stage reports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// Forecast horizon
// ---------------------------------------------------------------------------

/// Last forecast day produced by the drift simulation (j+0 … j+5).
pub const MAX_DAY_OFFSET: u8 = 5;

/// Storage cap on particle positions per (run, day) snapshot.
pub const MAX_STORED_PARTICLES: usize = 500;

// ---------------------------------------------------------------------------
// Beach geometry
// ---------------------------------------------------------------------------

/// A monitored beach: WGS84 center and influence radius.
///
/// Instances are only handed out by `beaches::BeachRegistry`, which
/// guarantees `radius_km > 0` and in-range coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Beach {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    pub radius_km: f64,
}

// ---------------------------------------------------------------------------
// Drift snapshots
// ---------------------------------------------------------------------------

/// One simulated drift particle at a given forecast day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParticlePosition {
    pub lat: f64,
    pub lon: f64,
}

/// The stored particle cloud for one simulation run and one day offset.
///
/// `particles` is a storage-capped subsample (at most
/// `MAX_STORED_PARTICLES`). `n_sample` is the number of particles released
/// for this run/day and `n_active` the simulator's estimate of how many still
/// represent floating biomass. Their ratio rescales the stored sample back to
/// the estimated true population and may exceed 1.
#[derive(Debug, Clone, PartialEq)]
pub struct DriftSnapshot {
    pub run_id: String,
    pub day_offset: u8,
    pub particles: Vec<ParticlePosition>,
    pub n_sample: u32,
    pub n_active: u32,
    pub captured_at: DateTime<Utc>,
}

impl DriftSnapshot {
    /// `n_active / n_sample` in double precision. Opaque non-negative
    /// multiplier, not bounded by 1. Zero when `n_sample` is zero.
    pub fn population_ratio(&self) -> f64 {
        if self.n_sample == 0 {
            return 0.0;
        }
        f64::from(self.n_active) / f64::from(self.n_sample)
    }
}

// ---------------------------------------------------------------------------
// Risk levels and score records
// ---------------------------------------------------------------------------

/// Discrete sargassum risk levels, in ascending order of severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    None,
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::None => "none",
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(RiskLevel::None),
            "low" => Ok(RiskLevel::Low),
            "medium" => Ok(RiskLevel::Medium),
            "high" => Ok(RiskLevel::High),
            other => Err(format!("unknown risk level '{}'", other)),
        }
    }
}

/// One persisted score, keyed by `(beach_name, day_offset, run_id)`.
///
/// The diagnostic fields after `risk_level` are informational and do not
/// participate in classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeachRiskScore {
    pub beach_name: String,
    pub day_offset: u8,
    pub run_id: String,
    pub local_score: f64,
    pub regional_score: f64,
    pub risk_level: RiskLevel,
    pub sample_count: u32,
    pub est_count: f64,
    pub closest_km: Option<f64>,
    pub density_km2: f64,
    /// Sampling metadata of the snapshot that produced this score.
    pub n_sample: u32,
    pub n_active: u32,
    pub computed_at: DateTime<Utc>,
}

impl BeachRiskScore {
    /// Storage key. Two records with the same key are the same logical record.
    pub fn key(&self) -> (String, u8, String) {
        (self.beach_name.clone(), self.day_offset, self.run_id.clone())
    }

    /// `n_active / n_sample` of the source snapshot, 0 when unknown.
    pub fn population_ratio(&self) -> f64 {
        if self.n_sample == 0 {
            return 0.0;
        }
        f64::from(self.n_active) / f64::from(self.n_sample)
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Fatal configuration problems. Any of these aborts the run.
#[derive(Debug, PartialEq)]
pub enum ConfigError {
    /// The beach list is absent or empty.
    MissingBeaches,
    /// A beach radius is zero, negative, or not finite.
    InvalidRadius { beach: String, radius_km: f64 },
    /// A beach center lies outside WGS84 bounds.
    InvalidCoordinates { beach: String, lat: f64, lon: f64 },
    /// Two registry entries share a name.
    DuplicateBeach(String),
    /// A required setting is absent (e.g. `DATABASE_URL`).
    MissingSetting(&'static str),
    /// A setting is present but unusable.
    InvalidSetting { key: &'static str, reason: String },
    /// A configuration file could not be read.
    Io { path: String, reason: String },
    /// A configuration file could not be parsed.
    Parse(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingBeaches => write!(f, "Configuration error: beach list is empty"),
            ConfigError::InvalidRadius { beach, radius_km } => write!(
                f,
                "Configuration error: beach '{}' has non-positive radius {} km",
                beach, radius_km
            ),
            ConfigError::InvalidCoordinates { beach, lat, lon } => write!(
                f,
                "Configuration error: beach '{}' has out-of-range coordinates ({}, {})",
                beach, lat, lon
            ),
            ConfigError::DuplicateBeach(name) => {
                write!(f, "Configuration error: duplicate beach '{}'", name)
            }
            ConfigError::MissingSetting(key) => {
                write!(f, "Configuration error: {} is not set", key)
            }
            ConfigError::InvalidSetting { key, reason } => {
                write!(f, "Configuration error: invalid {}: {}", key, reason)
            }
            ConfigError::Io { path, reason } => {
                write!(f, "Configuration error: cannot read {}: {}", path, reason)
            }
            ConfigError::Parse(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Errors reading drift snapshots.
#[derive(Debug, PartialEq)]
pub enum SnapshotError {
    /// The requested run or day is absent. Recoverable: the day is skipped.
    NotFound { run_id: String, day_offset: u8 },
    /// The snapshot store holds no simulation runs at all.
    NoRuns,
    /// Snapshot metadata violates its invariants (e.g. `n_sample == 0`).
    Invalid { run_id: String, day_offset: u8, reason: String },
    /// Underlying storage failure.
    Database(String),
}

impl fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotError::NotFound { run_id, day_offset } => {
                write!(f, "No snapshot for run {} day j+{}", run_id, day_offset)
            }
            SnapshotError::NoRuns => write!(f, "No drift simulation runs in the snapshot store"),
            SnapshotError::Invalid { run_id, day_offset, reason } => write!(
                f,
                "Invalid snapshot for run {} day j+{}: {}",
                run_id, day_offset, reason
            ),
            SnapshotError::Database(msg) => write!(f, "Snapshot store error: {}", msg),
        }
    }
}

impl std::error::Error for SnapshotError {}

/// Failure to write or read score records.
#[derive(Debug, PartialEq)]
pub enum PersistenceError {
    Database(String),
    /// A stored row could not be mapped back into a `BeachRiskScore`.
    Corrupt(String),
}

impl fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersistenceError::Database(msg) => write!(f, "Score store error: {}", msg),
            PersistenceError::Corrupt(msg) => write!(f, "Corrupt score record: {}", msg),
        }
    }
}

impl std::error::Error for PersistenceError {}

/// Why a particle was excluded from a summation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MalformedParticle {
    NonFinite,
    LatitudeOutOfRange(f64),
    LongitudeOutOfRange(f64),
}

impl fmt::Display for MalformedParticle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MalformedParticle::NonFinite => write!(f, "non-finite coordinate"),
            MalformedParticle::LatitudeOutOfRange(lat) => write!(f, "latitude {} out of range", lat),
            MalformedParticle::LongitudeOutOfRange(lon) => {
                write!(f, "longitude {} out of range", lon)
            }
        }
    }
}

impl std::error::Error for MalformedParticle {}

impl ParticlePosition {
    /// Checks WGS84 bounds and finiteness.
    pub fn validate(&self) -> Result<(), MalformedParticle> {
        if !self.lat.is_finite() || !self.lon.is_finite() {
            return Err(MalformedParticle::NonFinite);
        }
        if !(-90.0..=90.0).contains(&self.lat) {
            return Err(MalformedParticle::LatitudeOutOfRange(self.lat));
        }
        if !(-180.0..=180.0).contains(&self.lon) {
            return Err(MalformedParticle::LongitudeOutOfRange(self.lon));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
