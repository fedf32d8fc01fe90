//! Gaussian kernel scoring of a drift snapshot around a beach.
//!
//! Each stored particle contributes `exp(-d² / (2σ²))` to two sums, where
//! `d` is its great-circle distance to the beach center:
//!
//! - `local_score` uses σ = the beach's `radius_km` (imminent arrival),
//! - `regional_score` uses σ = `REGIONAL_SIGMA_KM` (an approaching mass).
//!
//! Both sums are then multiplied by the snapshot's population ratio so that
//! the capped, subsampled particle cloud stands for the estimated true
//! population. A particle on top of the beach weighs exactly 1 under either
//! bandwidth; far particles underflow to 0, which is the intended behavior.
//!
//! All arithmetic is `f64`. Nothing is rounded, so scoring the same inputs
//! twice is bit-identical.

use crate::model::{Beach, DriftSnapshot, ParticlePosition};
use serde::Serialize;
use std::f64::consts::PI;

/// Bandwidth of the regional score, in km.
pub const REGIONAL_SIGMA_KM: f64 = 50.0;

/// Mean Earth radius used by the haversine formula, in km.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Scores of one snapshot around one beach, plus the diagnostics computed
/// in the same pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BeachScore {
    pub local_score: f64,
    pub regional_score: f64,
    /// Valid particles within `radius_km` (inclusive) of the beach.
    pub sample_count: u32,
    /// `sample_count` extrapolated by the population ratio.
    pub est_count: f64,
    /// Distance to the nearest valid particle.
    pub closest_km: Option<f64>,
    /// Estimated particles per km² of the beach's catchment disc.
    pub density_km2: f64,
    /// Particles excluded for non-finite or out-of-range coordinates.
    pub dropped_particles: u32,
}

/// Great-circle distance in km between two WGS84 points.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let dphi = (lat2 - lat1).to_radians();
    let dlam = (lon2 - lon1).to_radians();
    let a = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlam / 2.0).sin().powi(2);
    // Rounding can push `a` a hair above 1 for antipodal points.
    2.0 * EARTH_RADIUS_KM * a.sqrt().min(1.0).asin()
}

/// Gaussian kernel weight `exp(-d² / (2σ²))`. Equals 1 at `d = 0` and is
/// strictly decreasing in `d²` until it underflows to 0.
pub fn kernel_weight(distance_km: f64, sigma_km: f64) -> f64 {
    (-(distance_km * distance_km) / (2.0 * sigma_km * sigma_km)).exp()
}

/// Scores `snapshot` around `beach`.
///
/// The result does not depend on the order of `snapshot.particles`.
/// Malformed particles are dropped from every sum and counted in
/// `dropped_particles`. An empty (or entirely malformed) snapshot scores
/// exactly 0 on both bandwidths.
pub fn score(beach: &Beach, snapshot: &DriftSnapshot) -> BeachScore {
    let mut distances: Vec<f64> = Vec::with_capacity(snapshot.particles.len());
    let mut dropped_particles = 0_u32;
    for particle in &snapshot.particles {
        match particle_distance(beach, particle) {
            Some(d) => distances.push(d),
            None => dropped_particles += 1,
        }
    }

    // Summation order is fixed by distance, so the stored order of the
    // particles cannot change the last bits of either sum.
    distances.sort_unstable_by(f64::total_cmp);

    let mut local_sum = 0.0_f64;
    let mut regional_sum = 0.0_f64;
    let mut sample_count = 0_u32;
    for &d in &distances {
        if d <= beach.radius_km {
            sample_count += 1;
        }
        local_sum += kernel_weight(d, beach.radius_km);
        regional_sum += kernel_weight(d, REGIONAL_SIGMA_KM);
    }
    let closest_km = distances.first().copied();

    let ratio = snapshot.population_ratio();
    let est_count = f64::from(sample_count) * ratio;
    let catchment_km2 = PI * beach.radius_km * beach.radius_km;

    BeachScore {
        local_score: local_sum * ratio,
        regional_score: regional_sum * ratio,
        sample_count,
        est_count,
        closest_km,
        density_km2: est_count / catchment_km2,
        dropped_particles,
    }
}

fn particle_distance(beach: &Beach, particle: &ParticlePosition) -> Option<f64> {
    particle.validate().ok()?;
    Some(haversine_km(beach.lat, beach.lon, particle.lat, particle.lon))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    const KM_PER_DEGREE: f64 = EARTH_RADIUS_KM * PI / 180.0;

    fn beach(radius_km: f64) -> Beach {
        Beach { name: "Flamands".to_string(), lat: 17.9067, lon: -62.8467, radius_km }
    }

    /// A particle due north of `beach` at `distance_km`.
    fn north_of(beach: &Beach, distance_km: f64) -> ParticlePosition {
        ParticlePosition { lat: beach.lat + distance_km / KM_PER_DEGREE, lon: beach.lon }
    }

    fn snapshot(particles: Vec<ParticlePosition>, n_sample: u32, n_active: u32) -> DriftSnapshot {
        DriftSnapshot {
            run_id: "run-test".to_string(),
            day_offset: 1,
            particles,
            n_sample,
            n_active,
            captured_at: Utc.with_ymd_and_hms(2026, 3, 1, 6, 0, 0).unwrap(),
        }
    }

    // --- Distance -----------------------------------------------------------

    #[test]
    fn test_haversine_zero_for_identical_points() {
        assert_eq!(haversine_km(17.9, -62.8, 17.9, -62.8), 0.0);
    }

    #[test]
    fn test_haversine_one_degree_of_latitude() {
        let d = haversine_km(17.0, -62.8, 18.0, -62.8);
        assert!((d - KM_PER_DEGREE).abs() < 1e-9, "got {}", d);
    }

    #[test]
    fn test_haversine_antipodal_points_are_finite() {
        let d = haversine_km(0.0, 0.0, 0.0, 180.0);
        assert!((d - PI * EARTH_RADIUS_KM).abs() < 1e-6, "got {}", d);
    }

    // --- Kernel -------------------------------------------------------------

    #[test]
    fn test_kernel_is_one_at_zero_distance_for_any_bandwidth() {
        assert_eq!(kernel_weight(0.0, 3.0), 1.0);
        assert_eq!(kernel_weight(0.0, REGIONAL_SIGMA_KM), 1.0);
    }

    #[test]
    fn test_kernel_strictly_decreases_with_distance() {
        for sigma in [2.0, 3.0, 4.0, REGIONAL_SIGMA_KM] {
            let mut previous = kernel_weight(0.0, sigma);
            for step in 1..=40 {
                let d = step as f64 * 0.25;
                let w = kernel_weight(d, sigma);
                assert!(w < previous, "kernel not decreasing at d={} sigma={}", d, sigma);
                previous = w;
            }
        }
    }

    #[test]
    fn test_kernel_underflows_gracefully_for_huge_distances() {
        let w = kernel_weight(20_000.0, 2.0);
        assert!(w.is_finite());
        assert_eq!(w, 0.0);
    }

    // --- Scores -------------------------------------------------------------

    #[test]
    fn test_empty_snapshot_scores_zero() {
        let s = score(&beach(3.0), &snapshot(Vec::new(), 500, 1200));
        assert_eq!(s.local_score, 0.0);
        assert_eq!(s.regional_score, 0.0);
        assert_eq!(s.sample_count, 0);
        assert_eq!(s.closest_km, None);
        assert_eq!(s.density_km2, 0.0);
    }

    #[test]
    fn test_particle_on_beach_with_small_ratio() {
        // radius 3 km, one particle at 0 km, ratio 0.01.
        let b = beach(3.0);
        let s = score(&b, &snapshot(vec![north_of(&b, 0.0)], 100, 1));
        assert_eq!(s.local_score, 0.01);
        assert_eq!(s.regional_score, 0.01);
        assert_eq!(s.closest_km, Some(0.0));
        assert_eq!(s.sample_count, 1);
    }

    #[test]
    fn test_ten_particles_at_fifty_km() {
        let b = beach(3.0);
        let particles = (0..10).map(|_| north_of(&b, 50.0)).collect();
        let s = score(&b, &snapshot(particles, 10, 10));

        let expected = 10.0 * (-0.5_f64).exp();
        assert!((s.regional_score - expected).abs() < 1e-6, "regional {}", s.regional_score);
        assert!((s.regional_score - 6.065).abs() < 1e-3);

        // Tight bandwidth: exp(-2500 / 18) per particle.
        assert!(s.local_score < 1e-50, "local {}", s.local_score);
        assert_eq!(s.sample_count, 0);
    }

    #[test]
    fn test_closer_particle_contributes_more_to_both_scores() {
        let b = beach(3.0);
        let mut previous: Option<BeachScore> = None;
        for d in [40.0, 20.0, 10.0, 5.0, 2.0, 1.0, 0.5] {
            let s = score(&b, &snapshot(vec![north_of(&b, d)], 1, 1));
            if let Some(p) = &previous {
                assert!(s.local_score > p.local_score, "local not increasing at {} km", d);
                assert!(s.regional_score > p.regional_score, "regional not increasing at {} km", d);
            }
            previous = Some(s);
        }
    }

    #[test]
    fn test_wide_bandwidth_exceeds_tight_beyond_radius() {
        let b = beach(3.0);
        let s = score(&b, &snapshot(vec![north_of(&b, 10.0)], 1, 1));
        assert!(s.regional_score > s.local_score);
    }

    #[test]
    fn test_population_ratio_above_one_scales_up() {
        let b = beach(2.0);
        let particles = vec![north_of(&b, 1.0), north_of(&b, 30.0)];
        let base = score(&b, &snapshot(particles.clone(), 2, 2));
        let scaled = score(&b, &snapshot(particles, 2, 8));
        assert!((scaled.local_score - 4.0 * base.local_score).abs() < 1e-12);
        assert!((scaled.regional_score - 4.0 * base.regional_score).abs() < 1e-12);
        assert_eq!(scaled.est_count, 4.0);
    }

    #[test]
    fn test_malformed_particles_are_dropped_not_fatal() {
        let b = beach(3.0);
        let good = north_of(&b, 0.0);
        let particles = vec![
            good,
            ParticlePosition { lat: f64::NAN, lon: b.lon },
            ParticlePosition { lat: 123.0, lon: b.lon },
            ParticlePosition { lat: b.lat, lon: f64::NEG_INFINITY },
        ];
        let s = score(&b, &snapshot(particles, 1, 1));
        assert_eq!(s.dropped_particles, 3);
        assert_eq!(s.local_score, 1.0);
        assert_eq!(s.regional_score, 1.0);
        assert!(s.local_score.is_finite() && s.regional_score.is_finite());
    }

    #[test]
    fn test_diagnostics_follow_catchment_radius() {
        let b = beach(2.0);
        let particles = vec![north_of(&b, 0.5), north_of(&b, 1.5), north_of(&b, 6.0)];
        let s = score(&b, &snapshot(particles, 3, 6));
        assert_eq!(s.sample_count, 2);
        assert_eq!(s.est_count, 4.0);
        assert!((s.closest_km.unwrap() - 0.5).abs() < 1e-9);
        assert!((s.density_km2 - 4.0 / (PI * 4.0)).abs() < 1e-12);
    }

    #[test]
    fn test_scoring_twice_is_bit_identical() {
        let b = beach(4.0);
        let particles = (0..500)
            .map(|i| ParticlePosition {
                lat: 17.5 + (i as f64) * 0.0017,
                lon: -63.2 + (i as f64) * 0.0011,
            })
            .collect();
        let snap = snapshot(particles, 500, 1730);
        let first = score(&b, &snap);
        let second = score(&b, &snap);
        assert_eq!(first.local_score.to_bits(), second.local_score.to_bits());
        assert_eq!(first.regional_score.to_bits(), second.regional_score.to_bits());
    }

    #[test]
    fn test_particle_order_does_not_change_scores() {
        let b = beach(4.0);
        let particles: Vec<ParticlePosition> = (0..500)
            .map(|i| ParticlePosition {
                lat: 17.5 + (i as f64) * 0.0017,
                lon: -63.2 + (i as f64) * 0.0011,
            })
            .collect();
        let mut reversed = particles.clone();
        reversed.reverse();

        let forward = score(&b, &snapshot(particles, 500, 1730));
        let backward = score(&b, &snapshot(reversed, 500, 1730));
        assert_eq!(forward.local_score.to_bits(), backward.local_score.to_bits());
        assert_eq!(forward.regional_score.to_bits(), backward.regional_score.to_bits());
        assert_eq!(forward.closest_km, backward.closest_km);
        assert_eq!(forward.sample_count, backward.sample_count);
    }
}
