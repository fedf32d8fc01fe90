//! Scoring pipeline controller.
//!
//! One invocation scores one drift run: for every configured forecast day it
//! fetches the snapshot, scores every beach against it, classifies the
//! regional score, and upserts the record. Failures are isolated per unit:
//!
//! - a missing or invalid snapshot skips that day only,
//! - a failed upsert fails that record only,
//! - a failed external simulation stage falls back to the latest stored run.
//!
//! Nothing below `run_compute` returns a unit-level error; outcomes are
//! aggregated into a `PipelineSummary`.

use crate::beaches::BeachRegistry;
use crate::logging::{self, Component};
use crate::model::{Beach, BeachRiskScore, DriftSnapshot, SnapshotError};
use crate::risk::{classify, score};
use crate::staleness::{is_run_stale_at, run_age_minutes};
use crate::store::{DriftSnapshotStore, ScoreStore};
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::Serialize;
use std::error::Error;
use std::process::Command;

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

/// Outcome counts for one scoring run.
///
/// `expected = beaches × configured days`, and
/// `expected == succeeded + failed + skipped`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineSummary {
    pub run_id: String,
    pub expected: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Units not attempted because their day's snapshot was unavailable.
    pub skipped: usize,
    pub scored_days: Vec<u8>,
    pub skipped_days: Vec<u8>,
}

impl PipelineSummary {
    /// A run succeeds when every attempted record was persisted. Skipped
    /// days do not fail the run.
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

/// Per-invocation settings. `now` is stamped on every record as
/// `computed_at` and drives the staleness warning.
#[derive(Debug, Clone)]
pub struct PipelineOptions<'a> {
    pub day_offsets: &'a [u8],
    pub max_run_age_hours: u64,
    pub now: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// External simulation stage
// ---------------------------------------------------------------------------

/// The stage that writes fresh drift snapshots before scoring.
pub trait SnapshotProducer {
    fn name(&self) -> &str;
    fn produce(&mut self) -> Result<(), Box<dyn Error>>;
}

/// Runs an external simulation command and waits for it.
pub struct CommandProducer {
    program: String,
    args: Vec<String>,
}

impl CommandProducer {
    /// `command[0]` is the program, the rest its arguments. `None` if empty.
    pub fn from_command(command: &[String]) -> Option<Self> {
        let (program, args) = command.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }
}

impl SnapshotProducer for CommandProducer {
    fn name(&self) -> &str {
        &self.program
    }

    fn produce(&mut self) -> Result<(), Box<dyn Error>> {
        let status = Command::new(&self.program).args(&self.args).status()?;
        if !status.success() {
            return Err(format!("{} exited with {}", self.program, status).into());
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// Explicit run id, or the latest run in the snapshot store.
pub fn resolve_run(
    snapshots: &mut dyn DriftSnapshotStore,
    requested: Option<&str>,
) -> Result<String, SnapshotError> {
    match requested {
        Some(run_id) => Ok(run_id.to_string()),
        None => snapshots.latest_run_id()?.ok_or(SnapshotError::NoRuns),
    }
}

/// Scores and classifies one (beach, snapshot) unit. Pure.
pub fn score_unit(beach: &Beach, snapshot: &DriftSnapshot, computed_at: DateTime<Utc>) -> (BeachRiskScore, u32) {
    let s = score(beach, snapshot);
    let record = BeachRiskScore {
        beach_name: beach.name.clone(),
        day_offset: snapshot.day_offset,
        run_id: snapshot.run_id.clone(),
        local_score: s.local_score,
        regional_score: s.regional_score,
        risk_level: classify(s.regional_score),
        sample_count: s.sample_count,
        est_count: s.est_count,
        closest_km: s.closest_km,
        density_km2: s.density_km2,
        n_sample: snapshot.n_sample,
        n_active: snapshot.n_active,
        computed_at,
    };
    (record, s.dropped_particles)
}

/// Runs the optional simulation stage, resolves the run, and scores it.
///
/// Only a missing run (nothing to score at all) or a storage failure while
/// resolving it is returned as an error.
pub fn run_compute(
    registry: &BeachRegistry,
    snapshots: &mut dyn DriftSnapshotStore,
    scores: &mut dyn ScoreStore,
    producer: Option<&mut dyn SnapshotProducer>,
    requested_run: Option<&str>,
    options: &PipelineOptions,
) -> Result<PipelineSummary, SnapshotError> {
    if let Some(producer) = producer {
        logging::info(Component::Pipeline, None, &format!("Running drift simulation: {}", producer.name()));
        if let Err(e) = producer.produce() {
            logging::error(
                Component::Pipeline,
                None,
                &format!("Drift simulation failed, scoring latest stored run: {}", e),
            );
        }
    }

    let run_id = resolve_run(snapshots, requested_run)?;
    Ok(run_pipeline(registry, snapshots, scores, &run_id, options))
}

/// Scores every (beach, day) unit of `run_id` and persists the results.
pub fn run_pipeline(
    registry: &BeachRegistry,
    snapshots: &mut dyn DriftSnapshotStore,
    scores: &mut dyn ScoreStore,
    run_id: &str,
    options: &PipelineOptions,
) -> PipelineSummary {
    let beaches = registry.list();
    let mut summary = PipelineSummary {
        run_id: run_id.to_string(),
        expected: beaches.len() * options.day_offsets.len(),
        succeeded: 0,
        failed: 0,
        skipped: 0,
        scored_days: Vec::new(),
        skipped_days: Vec::new(),
    };

    logging::info(
        Component::Pipeline,
        None,
        &format!(
            "Scoring run {}: {} beaches x {} days",
            run_id,
            beaches.len(),
            options.day_offsets.len()
        ),
    );

    // Stage 1: fetch snapshots. A missing day only removes that day.
    let mut loaded: Vec<DriftSnapshot> = Vec::with_capacity(options.day_offsets.len());
    for &day in options.day_offsets {
        match snapshots.get_snapshot(run_id, day) {
            Ok(snapshot) => {
                logging::debug(
                    Component::Snapshots,
                    None,
                    &format!(
                        "j+{}: {} stored particles, ratio {:.3}",
                        day,
                        snapshot.particles.len(),
                        snapshot.population_ratio()
                    ),
                );
                summary.scored_days.push(day);
                loaded.push(snapshot);
            }
            Err(e) => {
                logging::log_snapshot_failure(run_id, day, &e);
                summary.skipped_days.push(day);
                summary.skipped += beaches.len();
            }
        }
    }

    if let Some(captured_at) = loaded.iter().map(|s| s.captured_at).max() {
        if is_run_stale_at(captured_at, options.max_run_age_hours, options.now) {
            logging::warn(
                Component::Pipeline,
                None,
                &format!(
                    "Run {} is {} h old (limit {} h); is the drift simulation still running?",
                    run_id,
                    run_age_minutes(captured_at, options.now) / 60,
                    options.max_run_age_hours
                ),
            );
        }
    }

    // Stage 2: score. Units are independent and read-only.
    let units: Vec<(&Beach, &DriftSnapshot)> = loaded
        .iter()
        .flat_map(|snapshot| beaches.iter().map(move |beach| (beach, snapshot)))
        .collect();
    let results: Vec<(BeachRiskScore, u32)> = units
        .par_iter()
        .map(|(beach, snapshot)| score_unit(beach, snapshot, options.now))
        .collect();

    // Stage 3: persist, one record at a time.
    for (record, dropped) in &results {
        if *dropped > 0 {
            logging::warn(
                Component::Scorer,
                Some(&record.beach_name),
                &format!("j+{}: {} malformed particles dropped", record.day_offset, dropped),
            );
        }
        match scores.upsert(record) {
            Ok(()) => {
                summary.succeeded += 1;
                logging::debug(
                    Component::Scores,
                    Some(&record.beach_name),
                    &format!(
                        "j+{} regional {:.3} local {:.3} -> {}",
                        record.day_offset, record.regional_score, record.local_score, record.risk_level
                    ),
                );
            }
            Err(e) => {
                summary.failed += 1;
                logging::log_persistence_failure(&record.beach_name, record.day_offset, &e);
            }
        }
    }

    logging::log_pipeline_summary(&summary);
    summary
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ParticlePosition, PersistenceError, RiskLevel};
    use crate::store::{MemoryScoreStore, MemorySnapshotStore};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn registry() -> BeachRegistry {
        BeachRegistry::new(vec![
            Beach { name: "Toiny".to_string(), lat: 17.8933, lon: -62.7817, radius_km: 2.0 },
            Beach { name: "Flamands".to_string(), lat: 17.9067, lon: -62.8467, radius_km: 3.0 },
        ])
        .unwrap()
    }

    fn snapshot(day_offset: u8, particles: Vec<ParticlePosition>) -> DriftSnapshot {
        DriftSnapshot {
            run_id: "run-a".to_string(),
            day_offset,
            particles,
            n_sample: 100,
            n_active: 100,
            captured_at: now() - chrono::Duration::hours(3),
        }
    }

    /// Rejects every write for one beach.
    struct FailingFor(&'static str, MemoryScoreStore);

    impl ScoreStore for FailingFor {
        fn upsert(&mut self, score: &BeachRiskScore) -> Result<(), PersistenceError> {
            if score.beach_name == self.0 {
                return Err(PersistenceError::Database("disk full".to_string()));
            }
            self.1.upsert(score)
        }
        fn list_by_day(&mut self, day: u8) -> Result<Vec<BeachRiskScore>, PersistenceError> {
            self.1.list_by_day(day)
        }
        fn list_by_beach(&mut self, name: &str) -> Result<Vec<BeachRiskScore>, PersistenceError> {
            self.1.list_by_beach(name)
        }
        fn latest_run_id(&mut self) -> Result<Option<String>, PersistenceError> {
            self.1.latest_run_id()
        }
        fn list_by_run(&mut self, run_id: &str) -> Result<Vec<BeachRiskScore>, PersistenceError> {
            self.1.list_by_run(run_id)
        }
    }

    struct BrokenSimulation;

    impl SnapshotProducer for BrokenSimulation {
        fn name(&self) -> &str {
            "broken"
        }
        fn produce(&mut self) -> Result<(), Box<dyn Error>> {
            Err("no AFAI imagery".into())
        }
    }

    #[test]
    fn test_missing_day_is_skipped_and_others_scored() {
        let mut snaps = MemorySnapshotStore::new();
        snaps.insert(snapshot(0, vec![ParticlePosition { lat: 17.9, lon: -62.8 }]));
        snaps.insert(snapshot(2, Vec::new()));
        let mut scores = MemoryScoreStore::new();
        let options = PipelineOptions { day_offsets: &[0, 1, 2], max_run_age_hours: 24, now: now() };

        let summary = run_pipeline(&registry(), &mut snaps, &mut scores, "run-a", &options);

        assert_eq!(summary.expected, 6);
        assert_eq!(summary.succeeded, 4);
        assert_eq!(summary.skipped, 2);
        assert_eq!(summary.failed, 0);
        assert_eq!(summary.scored_days, vec![0, 2]);
        assert_eq!(summary.skipped_days, vec![1]);
        assert!(summary.is_success());
        assert!(scores.get("Toiny", 1, "run-a").is_none());
        assert!(scores.get("Toiny", 2, "run-a").is_some());
    }

    #[test]
    fn test_persistence_failure_is_counted_not_fatal() {
        let mut snaps = MemorySnapshotStore::new();
        snaps.insert(snapshot(0, Vec::new()));
        snaps.insert(snapshot(1, Vec::new()));
        let mut scores = FailingFor("Toiny", MemoryScoreStore::new());
        let options = PipelineOptions { day_offsets: &[0, 1], max_run_age_hours: 24, now: now() };

        let summary = run_pipeline(&registry(), &mut snaps, &mut scores, "run-a", &options);

        assert_eq!(summary.failed, 2);
        assert_eq!(summary.succeeded, 2);
        assert!(!summary.is_success());
        assert_eq!(scores.1.len(), 2, "Flamands records still written");
    }

    #[test]
    fn test_empty_snapshot_yields_none_level() {
        let beach = registry().list()[0].clone();
        let (record, dropped) = score_unit(&beach, &snapshot(0, Vec::new()), now());
        assert_eq!(record.local_score, 0.0);
        assert_eq!(record.regional_score, 0.0);
        assert_eq!(record.risk_level, RiskLevel::None);
        assert_eq!(dropped, 0);
    }

    #[test]
    fn test_rerun_overwrites_with_identical_values() {
        let mut snaps = MemorySnapshotStore::new();
        snaps.insert(snapshot(0, vec![ParticlePosition { lat: 17.95, lon: -62.75 }; 40]));
        let mut scores = MemoryScoreStore::new();
        let options = PipelineOptions { day_offsets: &[0], max_run_age_hours: 24, now: now() };

        run_pipeline(&registry(), &mut snaps, &mut scores, "run-a", &options);
        let first = scores.get("Toiny", 0, "run-a").cloned().unwrap();
        run_pipeline(&registry(), &mut snaps, &mut scores, "run-a", &options);

        assert_eq!(scores.len(), 2);
        assert_eq!(scores.get("Toiny", 0, "run-a"), Some(&first));
    }

    #[test]
    fn test_failed_simulation_falls_back_to_latest_run() {
        let mut snaps = MemorySnapshotStore::new();
        snaps.insert(snapshot(0, Vec::new()));
        let mut scores = MemoryScoreStore::new();
        let mut producer = BrokenSimulation;
        let options = PipelineOptions { day_offsets: &[0], max_run_age_hours: 24, now: now() };

        let summary = run_compute(&registry(), &mut snaps, &mut scores, Some(&mut producer), None, &options)
            .expect("latest stored run should be scored");
        assert_eq!(summary.run_id, "run-a");
        assert_eq!(summary.succeeded, 2);
    }

    #[test]
    fn test_no_runs_is_reported() {
        let mut snaps = MemorySnapshotStore::new();
        let mut scores = MemoryScoreStore::new();
        let options = PipelineOptions { day_offsets: &[0], max_run_age_hours: 24, now: now() };
        let result = run_compute(&registry(), &mut snaps, &mut scores, None, None, &options);
        assert_eq!(result, Err(SnapshotError::NoRuns));
    }

    #[test]
    fn test_command_producer_requires_a_program() {
        assert!(CommandProducer::from_command(&[]).is_none());
        let producer = CommandProducer::from_command(&["python3".to_string(), "sim.py".to_string()]).unwrap();
        assert_eq!(producer.name(), "python3");
    }
}
