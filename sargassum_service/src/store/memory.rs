//! In-memory repositories.

use super::{check_snapshot, sort_newest_first, DriftSnapshotStore, ScoreStore};
use crate::model::{BeachRiskScore, DriftSnapshot, PersistenceError, SnapshotError};
use std::collections::BTreeMap;

/// Snapshots keyed by `(run_id, day_offset)`.
#[derive(Debug, Default, Clone)]
pub struct MemorySnapshotStore {
    snapshots: BTreeMap<(String, u8), DriftSnapshot>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a snapshot, as the simulation adapter would.
    pub fn insert(&mut self, snapshot: DriftSnapshot) {
        let key = (snapshot.run_id.clone(), snapshot.day_offset);
        self.snapshots.insert(key, snapshot);
    }
}

impl DriftSnapshotStore for MemorySnapshotStore {
    fn latest_run_id(&mut self) -> Result<Option<String>, SnapshotError> {
        Ok(self
            .snapshots
            .values()
            .max_by(|a, b| a.captured_at.cmp(&b.captured_at).then_with(|| a.run_id.cmp(&b.run_id)))
            .map(|s| s.run_id.clone()))
    }

    fn get_snapshot(&mut self, run_id: &str, day_offset: u8) -> Result<DriftSnapshot, SnapshotError> {
        let snapshot = self
            .snapshots
            .get(&(run_id.to_string(), day_offset))
            .cloned()
            .ok_or_else(|| SnapshotError::NotFound { run_id: run_id.to_string(), day_offset })?;
        check_snapshot(&snapshot)?;
        Ok(snapshot)
    }
}

/// Score records keyed by `(beach_name, day_offset, run_id)`.
#[derive(Debug, Default, Clone)]
pub struct MemoryScoreStore {
    records: BTreeMap<(String, u8, String), BeachRiskScore>,
}

impl MemoryScoreStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, beach_name: &str, day_offset: u8, run_id: &str) -> Option<&BeachRiskScore> {
        self.records
            .get(&(beach_name.to_string(), day_offset, run_id.to_string()))
    }

    fn filtered<F>(&self, keep: F) -> Vec<BeachRiskScore>
    where
        F: Fn(&BeachRiskScore) -> bool,
    {
        let mut records: Vec<_> = self.records.values().filter(|r| keep(*r)).cloned().collect();
        sort_newest_first(&mut records);
        records
    }
}

impl ScoreStore for MemoryScoreStore {
    fn upsert(&mut self, score: &BeachRiskScore) -> Result<(), PersistenceError> {
        self.records.insert(score.key(), score.clone());
        Ok(())
    }

    fn list_by_day(&mut self, day_offset: u8) -> Result<Vec<BeachRiskScore>, PersistenceError> {
        Ok(self.filtered(|r| r.day_offset == day_offset))
    }

    fn list_by_beach(&mut self, beach_name: &str) -> Result<Vec<BeachRiskScore>, PersistenceError> {
        Ok(self.filtered(|r| r.beach_name == beach_name))
    }

    fn latest_run_id(&mut self) -> Result<Option<String>, PersistenceError> {
        Ok(self
            .records
            .values()
            .max_by(|a, b| a.computed_at.cmp(&b.computed_at).then_with(|| a.run_id.cmp(&b.run_id)))
            .map(|r| r.run_id.clone()))
    }

    fn list_by_run(&mut self, run_id: &str) -> Result<Vec<BeachRiskScore>, PersistenceError> {
        Ok(self.filtered(|r| r.run_id == run_id))
    }
}
