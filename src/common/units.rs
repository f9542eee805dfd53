//! Unit conversions and physical constants shared by the propagation code.
//!
//! Units:
//! - Frequency: MHz at the API surface, GHz for material tables, Hz for wave math
//! - Distance: meters everywhere except the FSPL formula, which takes km
//! - Power: dBm, mW (conversion provided)

/// Speed of light in vacuum (m/s).
pub const SPEED_OF_LIGHT: f64 = 299_792_458.0;

/// Vacuum permittivity ε₀ (F/m).
pub const VACUUM_PERMITTIVITY: f64 = 8.854_187_812_8e-12;

/// Distances below this are floored before taking logarithms (meters).
pub const MIN_DISTANCE_M: f64 = 1.0;

pub fn mhz_to_ghz(mhz: f64) -> f64 {
    mhz / 1_000.0
}

pub fn mhz_to_hz(mhz: f64) -> f64 {
    mhz * 1_000_000.0
}

pub fn ghz_to_mhz(ghz: f64) -> f64 {
    ghz * 1_000.0
}

pub fn meters_to_km(meters: f64) -> f64 {
    meters / 1_000.0
}

pub fn km_to_meters(km: f64) -> f64 {
    km * 1_000.0
}

/// Wavelength in meters for a carrier frequency in MHz.
///
/// Returns `f64::INFINITY` for non-positive frequencies so callers that divide
/// by the wavelength end up with a zero term rather than a NaN.
pub fn wavelength_m(frequency_mhz: f64) -> f64 {
    if frequency_mhz <= 0.0 || !frequency_mhz.is_finite() {
        return f64::INFINITY;
    }
    SPEED_OF_LIGHT / mhz_to_hz(frequency_mhz)
}

/// Free-space wavenumber k₀ = 2π/λ (rad/m).
pub fn wavenumber(frequency_mhz: f64) -> f64 {
    2.0 * std::f64::consts::PI / wavelength_m(frequency_mhz)
}

/// Convert power from dBm to milliwatts.
///
/// ```text
/// 0 dBm   → 1 mW
/// 10 dBm  → 10 mW
/// -10 dBm → 0.1 mW
/// ```
///
/// `-inf` dBm maps to exactly 0 mW, which is what interference sums need.
pub fn dbm_to_mw(dbm: f64) -> f64 {
    10f64.powf(dbm / 10.0)
}

/// Convert power from milliwatts to dBm.
///
/// Non-positive (or NaN) inputs return `-inf`, the "no usable signal" sentinel.
pub fn mw_to_dbm(mw: f64) -> f64 {
    if mw > 0.0 && mw.is_finite() {
        10.0 * mw.log10()
    } else if mw == f64::INFINITY {
        f64::INFINITY
    } else {
        f64::NEG_INFINITY
    }
}
