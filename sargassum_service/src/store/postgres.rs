//! PostgreSQL repositories over the `sargassum` schema
//! (see `sql/001_sargassum_schema.sql`).
//!
//! Snapshot sampling metadata (`n_sample`, `n_active`) lives in
//! `drift_runs`, one row per (run, day); raw positions live in
//! `drift_predictions`, at most 500 rows per (run, day).

use super::{check_snapshot, DriftSnapshotStore, ScoreStore};
use crate::model::{
    BeachRiskScore, DriftSnapshot, ParticlePosition, PersistenceError, RiskLevel, SnapshotError,
};
use chrono::{DateTime, Utc};
use postgres::{Client, NoTls, Row};

impl From<postgres::Error> for SnapshotError {
    fn from(err: postgres::Error) -> Self {
        SnapshotError::Database(err.to_string())
    }
}

impl From<postgres::Error> for PersistenceError {
    fn from(err: postgres::Error) -> Self {
        PersistenceError::Database(err.to_string())
    }
}

// ---------------------------------------------------------------------------
// Drift snapshots
// ---------------------------------------------------------------------------

pub struct PgSnapshotStore {
    client: Client,
}

impl PgSnapshotStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn connect(database_url: &str) -> Result<Self, postgres::Error> {
        Ok(Self::new(Client::connect(database_url, NoTls)?))
    }

    /// Writes one snapshot (metadata and positions) in a single transaction,
    /// replacing any previous content for the same (run, day).
    ///
    /// The drift simulation adapter is the production writer; the scoring
    /// pipeline never calls this.
    pub fn write_snapshot(&mut self, snapshot: &DriftSnapshot) -> Result<(), SnapshotError> {
        check_snapshot(snapshot)?;
        let day = i32::from(snapshot.day_offset);
        let n_sample = to_i32(snapshot.n_sample, snapshot, "n_sample")?;
        let n_active = to_i32(snapshot.n_active, snapshot, "n_active")?;

        let mut tx = self.client.transaction()?;
        tx.execute(
            "DELETE FROM sargassum.drift_predictions WHERE run_id = $1 AND day_offset = $2",
            &[&snapshot.run_id, &day],
        )?;
        tx.execute(
            "INSERT INTO sargassum.drift_runs (run_id, day_offset, n_sample, n_active, captured_at)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (run_id, day_offset) DO UPDATE SET
                n_sample = EXCLUDED.n_sample,
                n_active = EXCLUDED.n_active,
                captured_at = EXCLUDED.captured_at",
            &[&snapshot.run_id, &day, &n_sample, &n_active, &snapshot.captured_at],
        )?;
        let insert = tx.prepare(
            "INSERT INTO sargassum.drift_predictions (run_id, day_offset, lat, lon, captured_at)
             VALUES ($1, $2, $3, $4, $5)",
        )?;
        for particle in &snapshot.particles {
            tx.execute(
                &insert,
                &[&snapshot.run_id, &day, &particle.lat, &particle.lon, &snapshot.captured_at],
            )?;
        }
        tx.commit()?;
        Ok(())
    }
}

fn to_i32(value: u32, snapshot: &DriftSnapshot, field: &str) -> Result<i32, SnapshotError> {
    i32::try_from(value).map_err(|_| SnapshotError::Invalid {
        run_id: snapshot.run_id.clone(),
        day_offset: snapshot.day_offset,
        reason: format!("{} {} does not fit the schema", field, value),
    })
}

impl DriftSnapshotStore for PgSnapshotStore {
    fn latest_run_id(&mut self) -> Result<Option<String>, SnapshotError> {
        let row = self.client.query_opt(
            "SELECT run_id FROM sargassum.drift_runs
             ORDER BY captured_at DESC, run_id DESC
             LIMIT 1",
            &[],
        )?;
        Ok(row.map(|r| r.get(0)))
    }

    fn get_snapshot(&mut self, run_id: &str, day_offset: u8) -> Result<DriftSnapshot, SnapshotError> {
        let day = i32::from(day_offset);
        let meta = self
            .client
            .query_opt(
                "SELECT n_sample, n_active, captured_at
                 FROM sargassum.drift_runs
                 WHERE run_id = $1 AND day_offset = $2",
                &[&run_id, &day],
            )?
            .ok_or_else(|| SnapshotError::NotFound { run_id: run_id.to_string(), day_offset })?;

        let invalid = |reason: String| SnapshotError::Invalid {
            run_id: run_id.to_string(),
            day_offset,
            reason,
        };
        let n_sample: i32 = meta.get(0);
        let n_active: i32 = meta.get(1);
        let captured_at: DateTime<Utc> = meta.get(2);
        let n_sample = u32::try_from(n_sample).map_err(|_| invalid(format!("n_sample {} is negative", n_sample)))?;
        let n_active = u32::try_from(n_active).map_err(|_| invalid(format!("n_active {} is negative", n_active)))?;

        let rows = self.client.query(
            "SELECT lat, lon FROM sargassum.drift_predictions
             WHERE run_id = $1 AND day_offset = $2
             ORDER BY lat, lon",
            &[&run_id, &day],
        )?;
        let particles = rows
            .iter()
            .map(|row| ParticlePosition { lat: row.get(0), lon: row.get(1) })
            .collect();

        let snapshot = DriftSnapshot {
            run_id: run_id.to_string(),
            day_offset,
            particles,
            n_sample,
            n_active,
            captured_at,
        };
        check_snapshot(&snapshot)?;
        Ok(snapshot)
    }
}

// ---------------------------------------------------------------------------
// Beach risk scores
// ---------------------------------------------------------------------------

const SCORE_COLUMNS: &str = "beach_name, day_offset, run_id, local_score, regional_score, \
     risk_level, sample_count, est_count, closest_km, density_km2, n_sample, n_active, computed_at";

pub struct PgScoreStore {
    client: Client,
}

impl PgScoreStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn connect(database_url: &str) -> Result<Self, postgres::Error> {
        Ok(Self::new(Client::connect(database_url, NoTls)?))
    }

    fn select(
        &mut self,
        filter: &str,
        order: &str,
        param: &(dyn postgres::types::ToSql + Sync),
    ) -> Result<Vec<BeachRiskScore>, PersistenceError> {
        let query = format!(
            "SELECT {} FROM sargassum.beach_risk_scores WHERE {} = $1 ORDER BY {}",
            SCORE_COLUMNS, filter, order
        );
        let rows = self.client.query(query.as_str(), &[param])?;
        rows.iter().map(row_to_score).collect()
    }
}

fn row_to_score(row: &Row) -> Result<BeachRiskScore, PersistenceError> {
    let day: i32 = row.get(1);
    let level: String = row.get(5);
    let sample_count: i32 = row.get(6);
    let n_sample: i32 = row.get(10);
    let n_active: i32 = row.get(11);

    Ok(BeachRiskScore {
        beach_name: row.get(0),
        day_offset: u8::try_from(day)
            .map_err(|_| PersistenceError::Corrupt(format!("day_offset {}", day)))?,
        run_id: row.get(2),
        local_score: row.get(3),
        regional_score: row.get(4),
        risk_level: level.parse::<RiskLevel>().map_err(PersistenceError::Corrupt)?,
        sample_count: u32::try_from(sample_count)
            .map_err(|_| PersistenceError::Corrupt(format!("sample_count {}", sample_count)))?,
        est_count: row.get(7),
        closest_km: row.get(8),
        density_km2: row.get(9),
        n_sample: u32::try_from(n_sample)
            .map_err(|_| PersistenceError::Corrupt(format!("n_sample {}", n_sample)))?,
        n_active: u32::try_from(n_active)
            .map_err(|_| PersistenceError::Corrupt(format!("n_active {}", n_active)))?,
        computed_at: row.get(12),
    })
}

impl ScoreStore for PgScoreStore {
    fn upsert(&mut self, score: &BeachRiskScore) -> Result<(), PersistenceError> {
        let day = i32::from(score.day_offset);
        let sample_count = i32::try_from(score.sample_count)
            .map_err(|_| PersistenceError::Corrupt(format!("sample_count {}", score.sample_count)))?;
        let n_sample = i32::try_from(score.n_sample)
            .map_err(|_| PersistenceError::Corrupt(format!("n_sample {}", score.n_sample)))?;
        let n_active = i32::try_from(score.n_active)
            .map_err(|_| PersistenceError::Corrupt(format!("n_active {}", score.n_active)))?;

        // Single statement: the record is replaced whole or not at all.
        self.client.execute(
            "INSERT INTO sargassum.beach_risk_scores
             (beach_name, day_offset, run_id, local_score, regional_score,
              risk_level, sample_count, est_count, closest_km, density_km2,
              n_sample, n_active, computed_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
             ON CONFLICT (beach_name, day_offset, run_id) DO UPDATE SET
                local_score = EXCLUDED.local_score,
                regional_score = EXCLUDED.regional_score,
                risk_level = EXCLUDED.risk_level,
                sample_count = EXCLUDED.sample_count,
                est_count = EXCLUDED.est_count,
                closest_km = EXCLUDED.closest_km,
                density_km2 = EXCLUDED.density_km2,
                n_sample = EXCLUDED.n_sample,
                n_active = EXCLUDED.n_active,
                computed_at = EXCLUDED.computed_at",
            &[
                &score.beach_name,
                &day,
                &score.run_id,
                &score.local_score,
                &score.regional_score,
                &score.risk_level.as_str(),
                &sample_count,
                &score.est_count,
                &score.closest_km,
                &score.density_km2,
                &n_sample,
                &n_active,
                &score.computed_at,
            ],
        )?;
        Ok(())
    }

    fn list_by_day(&mut self, day_offset: u8) -> Result<Vec<BeachRiskScore>, PersistenceError> {
        let day = i32::from(day_offset);
        self.select(
            "day_offset",
            "computed_at DESC, run_id DESC, beach_name, day_offset",
            &day,
        )
    }

    fn list_by_beach(&mut self, beach_name: &str) -> Result<Vec<BeachRiskScore>, PersistenceError> {
        self.select(
            "beach_name",
            "computed_at DESC, run_id DESC, beach_name, day_offset",
            &beach_name,
        )
    }

    fn latest_run_id(&mut self) -> Result<Option<String>, PersistenceError> {
        let row = self.client.query_opt(
            "SELECT run_id FROM sargassum.beach_risk_scores
             ORDER BY computed_at DESC, run_id DESC
             LIMIT 1",
            &[],
        )?;
        Ok(row.map(|r| r.get(0)))
    }

    fn list_by_run(&mut self, run_id: &str) -> Result<Vec<BeachRiskScore>, PersistenceError> {
        self.select("run_id", "beach_name, day_offset", &run_id)
    }
}
