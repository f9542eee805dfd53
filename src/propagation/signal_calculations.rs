//! Closed-form path loss models and signal helpers.
//!
//! Contains helpers for:
//! - Free-space path loss (km/MHz form and wavelength form)
//! - Log-distance path loss with optional log-normal shadowing
//! - Okumura-Hata and COST-231 Hata macro-cell models
//! - Box–Muller shadowing over an injected random source
//!
//! Units:
//! - Power: dBm
//! - Loss: dB, `+inf` meaning "no link"
//! - Distance: meters (floored at `MIN_DISTANCE_M` before any logarithm)

use rand::Rng;
use rand_distr::{Distribution, Open01};
use serde::Deserialize;
use std::f64::consts::PI;

use crate::common::units::{MIN_DISTANCE_M, meters_to_km, wavelength_m};

/// Default clamp applied to shadowing samples (dB).
pub const DEFAULT_SHADOWING_BOUND_DB: f64 = 15.0;

/// Uniform draws are kept at least this far from 0 and 1 so `ln` stays finite.
const UNIFORM_EPSILON: f64 = 1e-12;

/// Parameters of the log-distance model.
///
/// ```text
/// PL(d) = PL(d₀) + 10 × n × log₁₀(d/d₀) + X_σ
/// ```
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct PathLossParameters {
    /// Path loss exponent (n).
    ///
    /// - n = 2.0: Free space
    /// - n = 2.7 to 3.5: Urban areas
    /// - n = 3.0 to 5.0: Indoor obstructed environments
    pub path_loss_exponent: f64,

    /// Path loss at the reference distance in dB. `None` uses FSPL at d₀ for
    /// the transmitter's carrier frequency.
    pub path_loss_at_reference_distance: Option<f64>,

    /// Reference distance d₀ in meters.
    pub reference_distance: f64,

    /// Standard deviation for log-normal shadowing (σ) in dB. Only the
    /// shadowed variant samples it; 0.0 disables shadowing.
    pub shadowing_sigma: f64,

    /// Shadowing samples are clamped to ±this value (dB).
    pub shadowing_bound: f64,
}

impl Default for PathLossParameters {
    fn default() -> Self {
        Self {
            path_loss_exponent: 3.0,
            path_loss_at_reference_distance: None,
            reference_distance: 1.0,
            shadowing_sigma: 6.0,
            shadowing_bound: DEFAULT_SHADOWING_BOUND_DB,
        }
    }
}

fn floor_distance(distance_m: f64) -> f64 {
    if distance_m.is_nan() { MIN_DISTANCE_M } else { distance_m.max(MIN_DISTANCE_M) }
}

/// Free-space path loss in dB.
///
/// # Formula
///
/// ```text
/// FSPL = 20 × log₁₀(d_km) + 20 × log₁₀(f_MHz) + 32.45
/// ```
///
/// Distance is floored at 1 m. A non-positive or non-finite frequency has no
/// physical meaning and yields `+inf` (no link).
pub fn free_space_path_loss(distance_m: f64, frequency_mhz: f64) -> f64 {
    if !(frequency_mhz > 0.0) || !frequency_mhz.is_finite() {
        return f64::INFINITY;
    }
    let d_km = meters_to_km(floor_distance(distance_m));
    20.0 * d_km.log10() + 20.0 * frequency_mhz.log10() + 32.45
}

/// Linear free-space path loss `(4πd/λ)²`.
pub fn free_space_path_loss_linear(distance_m: f64, wavelength: f64) -> f64 {
    let ratio = 4.0 * PI * distance_m / wavelength;
    ratio * ratio
}

/// Received signal (dBm) using the wavelength form of FSPL.
///
/// Returns `-inf` whenever the linear path loss is non-positive, infinite or
/// NaN (degenerate geometry or frequency), never NaN itself.
pub fn free_space_signal_dbm(eirp_dbm: f64, distance_m: f64, frequency_mhz: f64) -> f64 {
    let linear = free_space_path_loss_linear(floor_distance(distance_m), wavelength_m(frequency_mhz));
    if !(linear > 0.0) || !linear.is_finite() {
        return f64::NEG_INFINITY;
    }
    received_signal_dbm(eirp_dbm, 10.0 * linear.log10())
}

/// Log-distance path loss (deterministic part) in dB.
///
/// For distances below the reference distance the reference loss is returned.
pub fn log_distance_path_loss(distance_m: f64, frequency_mhz: f64, params: &PathLossParameters) -> f64 {
    let d0 = floor_distance(params.reference_distance);
    let pl0 = params.path_loss_at_reference_distance.unwrap_or_else(|| free_space_path_loss(d0, frequency_mhz));
    if !pl0.is_finite() {
        return f64::INFINITY;
    }
    let d = floor_distance(distance_m).max(d0);
    pl0 + 10.0 * params.path_loss_exponent * (d / d0).log10()
}

/// Mobile antenna correction a(h_m) for small/medium cities.
fn mobile_antenna_correction(frequency_mhz: f64, mobile_height_m: f64) -> f64 {
    let lf = frequency_mhz.log10();
    (1.1 * lf - 0.7) * mobile_height_m - (1.56 * lf - 0.8)
}

/// Okumura-Hata urban path loss in dB.
///
/// ```text
/// PL = 69.55 + 26.16 log f − 13.82 log h_b − a(h_m) + (44.9 − 6.55 log h_b) log d_km
/// ```
///
/// Heights are floored at 1 m, distance at 1 m.
pub fn hata_path_loss(distance_m: f64, frequency_mhz: f64, base_height_m: f64, mobile_height_m: f64) -> f64 {
    if !(frequency_mhz > 0.0) || !frequency_mhz.is_finite() {
        return f64::INFINITY;
    }
    let hb = floor_distance(base_height_m);
    let hm = floor_distance(mobile_height_m);
    let d_km = meters_to_km(floor_distance(distance_m));
    69.55 + 26.16 * frequency_mhz.log10() - 13.82 * hb.log10() - mobile_antenna_correction(frequency_mhz, hm)
        + (44.9 - 6.55 * hb.log10()) * d_km.log10()
}

/// COST-231 Hata path loss in dB (medium city, C_m = 0).
///
/// ```text
/// PL = 46.3 + 33.9 log f − 13.82 log h_b − a(h_m) + (44.9 − 6.55 log h_b) log d_km + C_m
/// ```
pub fn cost231_path_loss(distance_m: f64, frequency_mhz: f64, base_height_m: f64, mobile_height_m: f64) -> f64 {
    if !(frequency_mhz > 0.0) || !frequency_mhz.is_finite() {
        return f64::INFINITY;
    }
    let hb = floor_distance(base_height_m);
    let hm = floor_distance(mobile_height_m);
    let d_km = meters_to_km(floor_distance(distance_m));
    46.3 + 33.9 * frequency_mhz.log10() - 13.82 * hb.log10() - mobile_antenna_correction(frequency_mhz, hm)
        + (44.9 - 6.55 * hb.log10()) * d_km.log10()
}

/// Draw a zero-mean Gaussian shadowing term in dB via the Box–Muller transform.
///
/// Both uniform draws are clamped away from {0, 1}; the result is clamped to
/// `±bound_db`. A non-positive sigma disables shadowing and returns 0.
pub fn sample_shadowing<R: Rng + ?Sized>(rng: &mut R, sigma_db: f64, bound_db: f64) -> f64 {
    if !(sigma_db > 0.0) || !sigma_db.is_finite() {
        return 0.0;
    }
    let u1: f64 = Open01.sample(rng);
    let u2: f64 = Open01.sample(rng);
    let u1 = u1.clamp(UNIFORM_EPSILON, 1.0 - UNIFORM_EPSILON);
    let u2 = u2.clamp(UNIFORM_EPSILON, 1.0 - UNIFORM_EPSILON);
    let z = (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos();
    let bound = bound_db.abs();
    (z * sigma_db).clamp(-bound, bound)
}

/// RSSI (dBm) from EIRP and path loss. Any non-finite input gives `-inf`.
pub fn received_signal_dbm(eirp_dbm: f64, path_loss_db: f64) -> f64 {
    if eirp_dbm.is_finite() && path_loss_db.is_finite() { eirp_dbm - path_loss_db } else { f64::NEG_INFINITY }
}

/// Distance at which free-space propagation drops the signal to `threshold_dbm`.
///
/// Inverts the FSPL formula. Logged per transmitter at startup.
pub fn free_space_range_m(eirp_dbm: f64, threshold_dbm: f64, frequency_mhz: f64) -> f64 {
    if !(frequency_mhz > 0.0) {
        return 0.0;
    }
    let budget = eirp_dbm - threshold_dbm - 32.45 - 20.0 * frequency_mhz.log10();
    1_000.0 * 10f64.powf(budget / 20.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn fspl_at_3500_mhz_and_1_km() {
        let pl = free_space_path_loss(1000.0, 3500.0);
        assert!((pl - 103.33).abs() < 0.1, "got {pl}");
    }

    #[test]
    fn fspl_forms_agree() {
        let pl = free_space_path_loss(250.0, 700.0);
        let signal = free_space_signal_dbm(0.0, 250.0, 700.0);
        assert!((pl + signal).abs() < 0.05);
    }

    #[test]
    fn fspl_and_log_distance_increase_with_distance() {
        let params = PathLossParameters::default();
        let mut last_fspl = f64::NEG_INFINITY;
        let mut last_logd = f64::NEG_INFINITY;
        for d in [1.5, 10.0, 100.0, 1_000.0, 10_000.0] {
            let fspl = free_space_path_loss(d, 1800.0);
            let logd = log_distance_path_loss(d, 1800.0, &params);
            assert!(fspl > last_fspl);
            assert!(logd > last_logd);
            last_fspl = fspl;
            last_logd = logd;
        }
    }

    #[test]
    fn distance_is_floored() {
        assert_eq!(free_space_path_loss(0.0, 700.0), free_space_path_loss(1.0, 700.0));
        assert_eq!(free_space_path_loss(-5.0, 700.0), free_space_path_loss(1.0, 700.0));
        assert!(free_space_path_loss(f64::NAN, 700.0).is_finite());
    }

    #[test]
    fn degenerate_frequency_means_no_link() {
        assert_eq!(free_space_path_loss(100.0, 0.0), f64::INFINITY);
        assert_eq!(free_space_signal_dbm(20.0, 100.0, 0.0), f64::NEG_INFINITY);
        assert_eq!(free_space_signal_dbm(20.0, 100.0, -3.0), f64::NEG_INFINITY);
        assert_eq!(received_signal_dbm(20.0, f64::INFINITY), f64::NEG_INFINITY);
        assert_eq!(hata_path_loss(100.0, 0.0, 30.0, 1.5), f64::INFINITY);
    }

    #[test]
    fn log_distance_uses_reference_loss() {
        let params = PathLossParameters {
            path_loss_exponent: 2.0,
            path_loss_at_reference_distance: Some(40.0),
            ..PathLossParameters::default()
        };
        assert!((log_distance_path_loss(1.0, 900.0, &params) - 40.0).abs() < 1e-12);
        assert!((log_distance_path_loss(100.0, 900.0, &params) - 80.0).abs() < 1e-9);
    }

    #[test]
    fn cost231_exceeds_hata_at_higher_frequency() {
        let hata = hata_path_loss(2000.0, 1800.0, 30.0, 1.5);
        let cost = cost231_path_loss(2000.0, 1800.0, 30.0, 1.5);
        assert!(hata.is_finite() && cost.is_finite());
        assert!(cost > hata);
        // Larger distance, larger loss
        assert!(hata_path_loss(5000.0, 900.0, 30.0, 1.5) > hata_path_loss(1000.0, 900.0, 30.0, 1.5));
    }

    #[test]
    fn shadowing_is_reproducible_and_bounded() {
        let mut a = StdRng::seed_from_u64(42);
        let mut b = StdRng::seed_from_u64(42);
        for _ in 0..1000 {
            let sa = sample_shadowing(&mut a, 8.0, DEFAULT_SHADOWING_BOUND_DB);
            let sb = sample_shadowing(&mut b, 8.0, DEFAULT_SHADOWING_BOUND_DB);
            assert_eq!(sa, sb);
            assert!(sa.abs() <= DEFAULT_SHADOWING_BOUND_DB);
            assert!(!sa.is_nan());
        }
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(sample_shadowing(&mut rng, 0.0, 15.0), 0.0);
        for _ in 0..100 {
            assert!(sample_shadowing(&mut rng, 50.0, 3.0).abs() <= 3.0);
        }
    }

    #[test]
    fn free_space_range_inverts_fspl() {
        let range = free_space_range_m(40.0, -90.0, 3500.0);
        let pl = free_space_path_loss(range, 3500.0);
        assert!((40.0 - pl - (-90.0)).abs() < 1e-6);
    }
}
