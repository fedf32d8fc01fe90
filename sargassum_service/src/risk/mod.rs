/// Beach risk computation.
///
/// Submodules:
/// - `scorer` — gaussian kernel scores of a drift snapshot around a beach.
/// - `classify` — maps the regional score onto a discrete risk level.

pub mod classify;
pub mod scorer;

pub use classify::{classify, RiskThresholds, RISK_THRESHOLDS};
pub use scorer::{score, BeachScore, REGIONAL_SIGMA_KM};
