/// Repository interfaces for drift snapshots and beach risk scores.
///
/// The scorer and pipeline never hold a database handle directly; they are
/// handed one of these repositories. Each repository takes `&mut self`
/// because the blocking postgres client does.
///
/// Submodules:
/// - `memory` — in-process implementations for tests and dry runs.
/// - `postgres` — implementations over the `sargassum` schema.

pub mod memory;
pub mod postgres;

use crate::model::{BeachRiskScore, DriftSnapshot, PersistenceError, SnapshotError};

pub use self::memory::{MemoryScoreStore, MemorySnapshotStore};
pub use self::postgres::{PgScoreStore, PgSnapshotStore};

/// Read access to simulated particle clouds. Written by the external
/// simulation adapter, read-only here.
pub trait DriftSnapshotStore {
    /// Most recently captured run, if any.
    fn latest_run_id(&mut self) -> Result<Option<String>, SnapshotError>;

    /// Snapshot for one run and forecast day. `SnapshotError::NotFound` when
    /// the run or the day is absent.
    fn get_snapshot(&mut self, run_id: &str, day_offset: u8) -> Result<DriftSnapshot, SnapshotError>;
}

/// Sole writer of `BeachRiskScore` records.
pub trait ScoreStore {
    /// Inserts or replaces the record keyed `(beach_name, day_offset, run_id)`.
    /// Either the whole record is written or nothing is.
    fn upsert(&mut self, score: &BeachRiskScore) -> Result<(), PersistenceError>;

    /// All records for a forecast day, newest run first, then by beach.
    fn list_by_day(&mut self, day_offset: u8) -> Result<Vec<BeachRiskScore>, PersistenceError>;

    /// All records for a beach, newest run first, then by day.
    fn list_by_beach(&mut self, beach_name: &str) -> Result<Vec<BeachRiskScore>, PersistenceError>;

    /// Run id of the most recently computed record.
    fn latest_run_id(&mut self) -> Result<Option<String>, PersistenceError>;

    /// All records for one run, by beach then day.
    fn list_by_run(&mut self, run_id: &str) -> Result<Vec<BeachRiskScore>, PersistenceError>;
}

/// Checks the invariants a stored snapshot must satisfy before scoring.
pub fn check_snapshot(snapshot: &DriftSnapshot) -> Result<(), SnapshotError> {
    let invalid = |reason: String| SnapshotError::Invalid {
        run_id: snapshot.run_id.clone(),
        day_offset: snapshot.day_offset,
        reason,
    };

    if snapshot.day_offset > crate::model::MAX_DAY_OFFSET {
        return Err(invalid(format!("day offset {} beyond j+5", snapshot.day_offset)));
    }
    if snapshot.n_sample == 0 {
        return Err(invalid("n_sample is 0".to_string()));
    }
    if snapshot.particles.len() > crate::model::MAX_STORED_PARTICLES {
        return Err(invalid(format!(
            "{} particles stored, cap is {}",
            snapshot.particles.len(),
            crate::model::MAX_STORED_PARTICLES
        )));
    }
    Ok(())
}

/// Orders records newest run first, then by beach name and day.
pub(crate) fn sort_newest_first(records: &mut [BeachRiskScore]) {
    records.sort_by(|a, b| {
        b.computed_at
            .cmp(&a.computed_at)
            .then_with(|| b.run_id.cmp(&a.run_id))
            .then_with(|| a.beach_name.cmp(&b.beach_name))
            .then_with(|| a.day_offset.cmp(&b.day_offset))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ParticlePosition;
    use chrono::{TimeZone, Utc};

    fn snapshot(day_offset: u8, n_sample: u32, particles: usize) -> DriftSnapshot {
        DriftSnapshot {
            run_id: "run-a".to_string(),
            day_offset,
            particles: vec![ParticlePosition { lat: 17.9, lon: -62.8 }; particles],
            n_sample,
            n_active: n_sample,
            captured_at: Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_check_snapshot_accepts_capped_sample() {
        assert_eq!(check_snapshot(&snapshot(5, 4000, 500)), Ok(()));
    }

    #[test]
    fn test_check_snapshot_rejects_zero_sample() {
        assert!(matches!(
            check_snapshot(&snapshot(0, 0, 0)),
            Err(SnapshotError::Invalid { .. })
        ));
    }

    #[test]
    fn test_check_snapshot_rejects_day_beyond_horizon() {
        assert!(matches!(
            check_snapshot(&snapshot(6, 10, 1)),
            Err(SnapshotError::Invalid { day_offset: 6, .. })
        ));
    }

    #[test]
    fn test_check_snapshot_rejects_uncapped_sample() {
        assert!(check_snapshot(&snapshot(1, 1000, 501)).is_err());
    }
}
