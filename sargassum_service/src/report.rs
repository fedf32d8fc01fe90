//! Score reporting.
//!
//! Report mode reads stored `beach_risk_scores` rows and never triggers a
//! recomputation. Output is either a beach × day table for operators or a
//! JSON document for the dashboard.

use crate::model::{BeachRiskScore, PersistenceError, RiskLevel};
use crate::risk::{RISK_THRESHOLDS, REGIONAL_SIGMA_KM};
use crate::store::ScoreStore;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write;

// ============================================================================
// Report Selection
// ============================================================================

/// Which stored records to report on.
#[derive(Debug, Clone, PartialEq)]
pub enum ReportQuery {
    /// Every record of the most recently computed run.
    LatestRun,
    /// Every record for one forecast day, all runs.
    Day(u8),
    /// Every record for one beach, all runs.
    Beach(String),
}

impl ReportQuery {
    fn describe(&self) -> String {
        match self {
            ReportQuery::LatestRun => "latest run".to_string(),
            ReportQuery::Day(day) => format!("day j+{}", day),
            ReportQuery::Beach(name) => format!("beach {}", name),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoreReport {
    pub generated_at: String,
    pub selection: String,
    /// Run id when every record belongs to the same run.
    pub run_id: Option<String>,
    pub records: Vec<BeachRiskScore>,
}

impl ScoreReport {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Reads the records selected by `query`.
pub fn build_report(
    store: &mut dyn ScoreStore,
    query: &ReportQuery,
    now: DateTime<Utc>,
) -> Result<ScoreReport, PersistenceError> {
    let records = match query {
        ReportQuery::LatestRun => match store.latest_run_id()? {
            Some(run_id) => store.list_by_run(&run_id)?,
            None => Vec::new(),
        },
        ReportQuery::Day(day) => store.list_by_day(*day)?,
        ReportQuery::Beach(name) => store.list_by_beach(name)?,
    };

    let runs: BTreeSet<&str> = records.iter().map(|r| r.run_id.as_str()).collect();
    let run_id = if runs.len() == 1 {
        runs.iter().next().map(|r| r.to_string())
    } else {
        None
    };

    Ok(ScoreReport {
        generated_at: now.to_rfc3339(),
        selection: query.describe(),
        run_id,
        records,
    })
}

// ============================================================================
// Table Rendering
// ============================================================================

pub fn risk_icon(level: RiskLevel) -> &'static str {
    match level {
        RiskLevel::None => "🟢",
        RiskLevel::Low => "🟡",
        RiskLevel::Medium => "🟠",
        RiskLevel::High => "🔴",
    }
}

fn format_cell(record: &BeachRiskScore) -> String {
    let closest = record
        .closest_km
        .map(|d| format!("{:.0}km", d))
        .unwrap_or_else(|| "—".to_string());
    format!(
        "{} {:5.1} /{:5.1} /{:>5}",
        risk_icon(record.risk_level),
        record.regional_score,
        record.local_score,
        closest
    )
}

/// Renders a beach × day grid. When several runs are present, each cell
/// shows the first record encountered, i.e. the newest run given the store
/// ordering.
pub fn render_table(report: &ScoreReport) -> String {
    let mut out = String::new();
    let rule = "═".repeat(72);

    let _ = writeln!(out, "\n{}", rule);
    let _ = writeln!(
        out,
        "  🏖️  Sargassum risk — {}{}  (generated {})",
        report.selection,
        report
            .run_id
            .as_ref()
            .map(|r| format!(", run {}", r))
            .unwrap_or_default(),
        report.generated_at
    );
    let _ = writeln!(out, "{}", rule);

    if report.records.is_empty() {
        let _ = writeln!(out, "No scores stored. Run: sargassum_service compute");
        return out;
    }

    let days: BTreeSet<u8> = report.records.iter().map(|r| r.day_offset).collect();
    let mut cells: BTreeMap<(&str, u8), &BeachRiskScore> = BTreeMap::new();
    let mut beaches: Vec<&str> = Vec::new();
    for record in &report.records {
        let name = record.beach_name.as_str();
        if !beaches.contains(&name) {
            beaches.push(name);
        }
        cells.entry((name, record.day_offset)).or_insert(record);
    }
    beaches.sort_unstable();

    let mut header = format!("{:<20}", "Beach");
    let mut sub = format!("{:<20}", "");
    for day in &days {
        let _ = write!(header, "  {:<21}", format!("j+{}", day));
        let _ = write!(sub, "  {:<21}", "reg / loc / closest");
    }
    let _ = writeln!(out, "{}", header);
    let _ = writeln!(out, "{}", sub);
    let _ = writeln!(out, "{}", "─".repeat(header.chars().count()));

    for beach in &beaches {
        let mut line = format!("{:<20}", beach);
        for day in &days {
            match cells.get(&(*beach, *day)) {
                Some(record) => {
                    let _ = write!(line, "  {}", format_cell(record));
                }
                None => {
                    let _ = write!(line, "  {:<21}", "—");
                }
            }
        }
        let _ = writeln!(out, "{}", line);
    }

    let _ = writeln!(out);
    let _ = write!(out, "{}", render_sampling(&report.records));
    let _ = writeln!(out, "{}", render_legend());
    out
}

/// One line per (run, day) naming the snapshot sampling behind the scores.
fn render_sampling(records: &[BeachRiskScore]) -> String {
    let mut seen: BTreeMap<(&str, u8), (u32, u32, f64)> = BTreeMap::new();
    for record in records {
        seen.entry((record.run_id.as_str(), record.day_offset))
            .or_insert((record.n_active, record.n_sample, record.population_ratio()));
    }

    let mut out = String::new();
    for ((run_id, day), (n_active, n_sample, ratio)) in &seen {
        let _ = writeln!(
            out,
            "  Simulation {} j+{}: {} active | sample {} pts (×{:.1})",
            run_id, day, n_active, n_sample, ratio
        );
    }
    out
}

/// Threshold legend printed under the table.
pub fn render_legend() -> String {
    format!(
        "  Columns: risk | regional_score (σ={}km) | local_score (σ=radius) | closest particle\n  \
         Risk levels on regional_score: {} < {}   {} ≥ {}   {} ≥ {}   {} ≥ {}",
        REGIONAL_SIGMA_KM,
        risk_icon(RiskLevel::None),
        RISK_THRESHOLDS.low,
        risk_icon(RiskLevel::Low),
        RISK_THRESHOLDS.low,
        risk_icon(RiskLevel::Medium),
        RISK_THRESHOLDS.medium,
        risk_icon(RiskLevel::High),
        RISK_THRESHOLDS.high
    )
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryScoreStore;
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, hour, 0, 0).unwrap()
    }

    fn record(beach: &str, day: u8, run: &str, regional: f64, level: RiskLevel, hour: u32) -> BeachRiskScore {
        BeachRiskScore {
            beach_name: beach.to_string(),
            day_offset: day,
            run_id: run.to_string(),
            local_score: 0.5,
            regional_score: regional,
            risk_level: level,
            sample_count: 1,
            est_count: 1.0,
            closest_km: Some(2.4),
            density_km2: 0.03,
            n_sample: 500,
            n_active: 1250,
            computed_at: at(hour),
        }
    }

    fn store() -> MemoryScoreStore {
        let mut store = MemoryScoreStore::new();
        store.upsert(&record("Toiny", 0, "run-a", 6.1, RiskLevel::Low, 6)).unwrap();
        store.upsert(&record("Toiny", 1, "run-a", 30.0, RiskLevel::Medium, 6)).unwrap();
        store.upsert(&record("Lorient", 0, "run-a", 1.0, RiskLevel::None, 6)).unwrap();
        store.upsert(&record("Toiny", 0, "run-b", 80.0, RiskLevel::High, 12)).unwrap();
        store
    }

    #[test]
    fn test_latest_run_report_contains_only_that_run() {
        let mut store = store();
        let report = build_report(&mut store, &ReportQuery::LatestRun, at(13)).unwrap();
        assert_eq!(report.run_id.as_deref(), Some("run-b"));
        assert_eq!(report.records.len(), 1);
        assert_eq!(report.records[0].risk_level, RiskLevel::High);
    }

    #[test]
    fn test_day_report_spans_runs() {
        let mut store = store();
        let report = build_report(&mut store, &ReportQuery::Day(0), at(13)).unwrap();
        assert_eq!(report.records.len(), 3);
        assert_eq!(report.run_id, None);
        assert_eq!(report.selection, "day j+0");
    }

    #[test]
    fn test_beach_report() {
        let mut store = store();
        let report = build_report(&mut store, &ReportQuery::Beach("Lorient".to_string()), at(13)).unwrap();
        assert_eq!(report.records.len(), 1);
        assert_eq!(report.run_id.as_deref(), Some("run-a"));
    }

    #[test]
    fn test_empty_store_renders_hint() {
        let mut store = MemoryScoreStore::new();
        let report = build_report(&mut store, &ReportQuery::LatestRun, at(13)).unwrap();
        assert!(report.records.is_empty());
        assert!(render_table(&report).contains("No scores stored"));
    }

    #[test]
    fn test_table_shows_newest_record_and_gaps() {
        let mut store = store();
        let report = build_report(&mut store, &ReportQuery::Day(0), at(13)).unwrap();
        let table = render_table(&report);
        assert!(table.contains("Lorient"));
        assert!(table.contains("Toiny"));
        // run-b (80.0) is newer than run-a (6.1) for Toiny j+0.
        assert!(table.contains(" 80.0"));
        assert!(!table.contains("  6.1"));

        let mut store = self::store();
        let report = build_report(&mut store, &ReportQuery::Beach("Toiny".to_string()), at(13)).unwrap();
        let table = render_table(&report);
        assert!(table.contains("j+1"));
        assert!(table.contains("🟠"));
    }

    #[test]
    fn test_table_footer_names_sampling_per_run_and_day() {
        let mut store = store();
        let report = build_report(&mut store, &ReportQuery::Beach("Toiny".to_string()), at(13)).unwrap();
        let table = render_table(&report);
        assert!(table.contains("Simulation run-a j+0: 1250 active | sample 500 pts (×2.5)"), "{}", table);
        assert!(table.contains("Simulation run-a j+1:"));
        assert!(table.contains("Simulation run-b j+0:"));
        assert_eq!(table.matches("Simulation ").count(), 3);
    }

    #[test]
    fn test_json_report_uses_lowercase_levels() {
        let mut store = store();
        let report = build_report(&mut store, &ReportQuery::LatestRun, at(13)).unwrap();
        let json = report.to_json().unwrap();
        assert!(json.contains("\"risk_level\": \"high\""), "{}", json);
        assert!(json.contains("\"run_id\": \"run-b\""));
    }

    #[test]
    fn test_legend_lists_thresholds() {
        let legend = render_legend();
        assert!(legend.contains("σ=50km"));
        assert!(legend.contains("≥ 25"));
        assert!(legend.contains("≥ 75"));
    }
}
