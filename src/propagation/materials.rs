//! RF material properties of building surfaces.
//!
//! The canonical values are table driven; nothing here computes anything beyond
//! the conductivity power law σ(f) = σ₀ · f_GHz ⁿ (ITU-R P.2040 style).

use serde::{Deserialize, Serialize};

use crate::common::units::mhz_to_ghz;

/// Reflection coefficient used for materials without a band table.
pub const DEFAULT_REFLECTION_COEFFICIENT: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MaterialType {
    Concrete,
    Brick,
    Metal,
    Glass,
    Wood,
    /// Anything the scene could not classify. Uses default coefficients.
    Unknown,
}

/// Physical description of a building surface. Immutable once built and
/// shared between buildings through `Arc`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildingMaterial {
    pub material_type: MaterialType,
    /// Real part of the relative permittivity ε_r.
    pub relative_permittivity: f64,
    /// σ₀ in S/m at 1 GHz.
    pub conductivity_coefficient: f64,
    /// Frequency exponent n of the conductivity law.
    pub conductivity_exponent: f64,
    /// RMS surface height deviation σ_h in meters.
    pub surface_roughness_m: f64,
    /// Fraction of incident power re-radiated diffusely, 0..=1.
    pub scatter_albedo: f64,
    /// Bulk attenuation in dB per meter of material.
    pub penetration_loss_db_per_m: f64,
    /// Wall thickness in meters; 0 means "estimate from the building size".
    pub wall_thickness_m: f64,
}

/// Canonical physical defaults per material type.
pub fn material_for(material_type: MaterialType) -> BuildingMaterial {
    let (eps, sigma0, n, rough, albedo, db_per_m, thickness) = match material_type {
        MaterialType::Concrete => (5.31, 0.0326, 0.8095, 0.003, 0.4, 40.0, 0.3),
        MaterialType::Brick => (3.75, 0.038, 0.0, 0.005, 0.45, 30.0, 0.25),
        MaterialType::Metal => (1.0, 1.0e7, 0.0, 0.0005, 0.1, 200.0, 0.01),
        MaterialType::Glass => (6.27, 0.0043, 1.1925, 0.0001, 0.05, 60.0, 0.01),
        MaterialType::Wood => (1.99, 0.0047, 1.0718, 0.002, 0.5, 20.0, 0.05),
        MaterialType::Unknown => (4.0, 0.02, 0.5, 0.002, 0.3, 25.0, 0.0),
    };
    BuildingMaterial {
        material_type,
        relative_permittivity: eps,
        conductivity_coefficient: sigma0,
        conductivity_exponent: n,
        surface_roughness_m: rough,
        scatter_albedo: albedo,
        penetration_loss_db_per_m: db_per_m,
        wall_thickness_m: thickness,
    }
}

/// Frequency bands used by the empirical reflection table.
fn band_index(frequency_ghz: f64) -> usize {
    if frequency_ghz < 1.0 {
        0
    } else if frequency_ghz < 6.0 {
        1
    } else if frequency_ghz <= 30.0 {
        2
    } else {
        3
    }
}

/// Empirical reflection magnitude for a material at a carrier frequency.
///
/// Values increase with frequency and with material density, metal being the
/// best reflector. Always within `[0, 1]`.
pub fn reflection_coefficient(material_type: MaterialType, frequency_ghz: f64) -> f64 {
    let table: [f64; 4] = match material_type {
        MaterialType::Wood => [0.20, 0.25, 0.30, 0.35],
        MaterialType::Glass => [0.30, 0.35, 0.40, 0.45],
        MaterialType::Brick => [0.40, 0.45, 0.50, 0.55],
        MaterialType::Concrete => [0.50, 0.55, 0.60, 0.65],
        MaterialType::Metal => [0.90, 0.92, 0.95, 0.98],
        MaterialType::Unknown => [DEFAULT_REFLECTION_COEFFICIENT; 4],
    };
    if frequency_ghz.is_nan() {
        return table[0];
    }
    table[band_index(frequency_ghz)].clamp(0.0, 1.0)
}

/// Conductivity σ(f) in S/m for a carrier frequency in MHz.
pub fn conductivity(material: &BuildingMaterial, frequency_mhz: f64) -> f64 {
    let f_ghz = mhz_to_ghz(frequency_mhz);
    if f_ghz <= 0.0 || !f_ghz.is_finite() {
        return material.conductivity_coefficient.max(0.0);
    }
    (material.conductivity_coefficient * f_ghz.powf(material.conductivity_exponent)).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [MaterialType; 6] = [
        MaterialType::Concrete,
        MaterialType::Brick,
        MaterialType::Metal,
        MaterialType::Glass,
        MaterialType::Wood,
        MaterialType::Unknown,
    ];

    #[test]
    fn reflection_is_monotonic_in_frequency_and_bounded() {
        for m in ALL {
            let mut last = 0.0;
            for f in [0.7, 3.5, 28.0, 60.0] {
                let r = reflection_coefficient(m, f);
                assert!((0.0..=1.0).contains(&r));
                assert!(r >= last);
                last = r;
            }
        }
    }

    #[test]
    fn denser_materials_reflect_more() {
        let f = 3.5;
        assert!(reflection_coefficient(MaterialType::Wood, f) < reflection_coefficient(MaterialType::Glass, f));
        assert!(reflection_coefficient(MaterialType::Brick, f) < reflection_coefficient(MaterialType::Concrete, f));
        assert!(reflection_coefficient(MaterialType::Concrete, f) < reflection_coefficient(MaterialType::Metal, f));
        assert_eq!(reflection_coefficient(MaterialType::Unknown, 100.0), DEFAULT_REFLECTION_COEFFICIENT);
    }

    #[test]
    fn conductivity_follows_power_law() {
        let concrete = material_for(MaterialType::Concrete);
        let at_1ghz = conductivity(&concrete, 1000.0);
        assert!((at_1ghz - 0.0326).abs() < 1e-12);
        let at_10ghz = conductivity(&concrete, 10_000.0);
        assert!((at_10ghz - 0.0326 * 10f64.powf(0.8095)).abs() < 1e-9);

        let brick = material_for(MaterialType::Brick);
        assert_eq!(conductivity(&brick, 700.0), conductivity(&brick, 28_000.0));
    }

    #[test]
    fn canonical_values_stay_in_range() {
        for m in ALL {
            let mat = material_for(m);
            assert_eq!(mat.material_type, m);
            assert!((0.0..=1.0).contains(&mat.scatter_albedo));
            assert!(mat.relative_permittivity >= 1.0);
            assert!(mat.penetration_loss_db_per_m >= 0.0);
        }
    }
}
