/// Drift run staleness detection.
///
/// The simulation adapter normally produces a fresh run every few hours.
/// When it stops (expired credentials, missing AFAI imagery), the scorer
/// keeps re-scoring the last stored run and the reports look current when
/// they are not. The pipeline uses this check to warn about it.
///
/// # Clock injection
/// All functions accept a `now: DateTime<Utc>` parameter rather than calling
/// `Utc::now()` internally, so staleness is deterministic in tests.

use chrono::{DateTime, Utc};

/// Default maximum run age before the pipeline warns, in hours.
pub const DEFAULT_MAX_RUN_AGE_HOURS: u64 = 24;

/// Age of a run in whole minutes, clamped at zero for runs stamped in the
/// future (clock skew between hosts).
pub fn run_age_minutes(captured_at: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    u64::try_from((now - captured_at).num_minutes()).unwrap_or(0)
}

/// Returns `true` if the run captured at `captured_at` is older than
/// `max_age_hours` relative to `now`.
///
/// Staleness is defined as strictly greater than the threshold:
///   age > max_age  →  stale
///   age == max_age →  not stale
pub fn is_run_stale_at(captured_at: DateTime<Utc>, max_age_hours: u64, now: DateTime<Utc>) -> bool {
    run_age_minutes(captured_at, now) > max_age_hours.saturating_mul(60)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
