//! Environment classification for the empirical macro-cell models.
//!
//! Building density is estimated by sampling a disk around the link midpoint
//! on a regular grid and counting samples that fall inside a building footprint.

use super::obstacles::ObstacleService;
use super::types::Vec3;

/// Density above which a link is classified as urban.
pub const URBAN_DENSITY_THRESHOLD: f64 = 0.3;
/// Upper bound on the sampling disk radius (m).
pub const MAX_SAMPLING_RADIUS_M: f64 = 500.0;
/// Grid samples per disk diameter.
const GRID_RESOLUTION: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Urban,
    FreeSpace,
}

/// Fraction (0..=1) of the disk at `center` with radius `radius` covered by
/// building footprints.
pub fn building_density(obstacles: &dyn ObstacleService, center: &Vec3, radius: f64) -> f64 {
    if !(radius > 0.0) || !radius.is_finite() {
        return 0.0;
    }
    let nearby = obstacles.buildings_near(center, radius);
    if nearby.is_empty() {
        return 0.0;
    }

    let step = 2.0 * radius / GRID_RESOLUTION as f64;
    let mut inside_disk = 0usize;
    let mut covered = 0usize;
    for i in 0..GRID_RESOLUTION {
        for j in 0..GRID_RESOLUTION {
            let x = center.x - radius + (i as f64 + 0.5) * step;
            let z = center.z - radius + (j as f64 + 0.5) * step;
            let dx = x - center.x;
            let dz = z - center.z;
            if dx * dx + dz * dz > radius * radius {
                continue;
            }
            inside_disk += 1;
            if nearby.iter().any(|b| b.footprint_contains(x, z)) {
                covered += 1;
            }
        }
    }
    if inside_disk == 0 { 0.0 } else { covered as f64 / inside_disk as f64 }
}

/// Classify the link `tx → rx`. No obstacle service means free space.
pub fn classify_link(obstacles: Option<&dyn ObstacleService>, tx: &Vec3, rx: &Vec3) -> Environment {
    let Some(service) = obstacles else {
        return Environment::FreeSpace;
    };
    let radius = (tx.horizontal_distance(rx) / 2.0).min(MAX_SAMPLING_RADIUS_M);
    if building_density(service, &tx.midpoint(rx), radius) > URBAN_DENSITY_THRESHOLD {
        Environment::Urban
    } else {
        Environment::FreeSpace
    }
}

/// Multiplicative path loss factor for an environment at a carrier frequency.
pub fn environment_factor(environment: Environment, frequency_mhz: f64) -> f64 {
    match environment {
        Environment::FreeSpace => 1.0,
        Environment::Urban if frequency_mhz > 2000.0 => 1.15,
        Environment::Urban if frequency_mhz >= 1000.0 => 1.10,
        Environment::Urban => 1.05,
    }
}
