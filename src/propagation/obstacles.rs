//! Obstacle service contract and building-penetration accumulation.
//!
//! The environment collaborator supplies an [`ObstacleService`]; this module
//! turns its answers into a line-of-sight flag and an additive dB loss. A
//! missing service is the permissive default: clear LOS, zero loss.

use log::trace;
use std::sync::Arc;

use super::geometry::Building;
use super::materials::BuildingMaterial;
use super::types::Vec3;

/// Buildings beyond this count along one path do not add loss; the signal is
/// assumed to find another way around dense obstruction.
pub const MAX_BUILDINGS_PENETRATED: usize = 2;
/// Upper bound on the loss charged for a single building (dB).
pub const MAX_BUILDING_LOSS: f64 = 20.0;
/// Upper bound on the accumulated penetration loss of one path (dB).
pub const MAX_TOTAL_LOSS: f64 = 35.0;
/// Realism factor applied uniformly to the bulk dB/m figure.
pub const PENETRATION_REALISM_FACTOR: f64 = 0.5;

const MIN_ESTIMATED_WALL_M: f64 = 0.2;
const MAX_ESTIMATED_WALL_M: f64 = 1.0;

/// One solid span crossed by a straight segment.
#[derive(Debug, Clone)]
pub struct Intersection {
    pub building_id: u32,
    /// Distance from the segment start to the entry point (m).
    pub distance: f64,
    pub entry: Vec3,
    pub exit: Vec3,
    /// `None` for solids that carry no material (ignored by penetration).
    pub material: Option<Arc<BuildingMaterial>>,
    /// Size of the intersected solid's bounds.
    pub bounds: Vec3,
}

/// Line/geometry query capability required from the environment.
///
/// Implementations must be safe to query concurrently; the engine evaluates
/// transmitter/receiver pairs on worker threads against the same service.
pub trait ObstacleService: Send + Sync {
    /// `true` when nothing solid lies between the two points.
    fn line_of_sight(&self, from: &Vec3, to: &Vec3) -> bool;

    /// All solid spans crossed by the segment. Order is not significant.
    fn intersections(&self, from: &Vec3, to: &Vec3) -> Vec<Intersection>;

    /// Buildings whose footprint lies within `radius` (horizontal) of `center`.
    fn buildings_near(&self, center: &Vec3, radius: f64) -> Vec<&Building>;
}

/// Line-of-sight test. Fails closed on any intersection; no service means clear.
pub fn has_line_of_sight(obstacles: Option<&dyn ObstacleService>, tx: &Vec3, rx: &Vec3) -> bool {
    match obstacles {
        Some(service) => service.line_of_sight(tx, rx),
        None => true,
    }
}

/// Wall thickness of an intersected building: configured value if positive,
/// otherwise 10% of the smaller footprint side clamped to 0.2..=1.0 m.
pub fn wall_thickness(material: &BuildingMaterial, bounds: &Vec3) -> f64 {
    if material.wall_thickness_m > 0.0 {
        return material.wall_thickness_m;
    }
    let smaller_side = bounds.x.abs().min(bounds.z.abs());
    let estimate = 0.1 * smaller_side;
    if estimate.is_nan() {
        return MIN_ESTIMATED_WALL_M;
    }
    estimate.clamp(MIN_ESTIMATED_WALL_M, MAX_ESTIMATED_WALL_M)
}

/// Loss charged for crossing one building, clamped to `[0, MAX_BUILDING_LOSS]`.
pub fn building_loss(material: &BuildingMaterial, bounds: &Vec3) -> f64 {
    let raw = wall_thickness(material, bounds) * material.penetration_loss_db_per_m * PENETRATION_REALISM_FACTOR;
    if raw.is_nan() {
        return 0.0;
    }
    raw.clamp(0.0, MAX_BUILDING_LOSS)
}

/// Accumulate building-penetration loss along `tx → rx` in dB.
///
/// Intersections are stable-sorted by distance from the transmitter. Solids
/// without a material are skipped and not counted. Once more than
/// [`MAX_BUILDINGS_PENETRATED`] material buildings have been seen the
/// accumulation stops. The total is clamped to `[0, MAX_TOTAL_LOSS]`.
pub fn penetration_loss(obstacles: Option<&dyn ObstacleService>, tx: &Vec3, rx: &Vec3) -> f64 {
    let Some(service) = obstacles else {
        return 0.0;
    };
    let mut hits = service.intersections(tx, rx);
    if hits.is_empty() {
        return 0.0;
    }
    hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    accumulate_penetration(&hits)
}

/// Penetration accumulation over already ordered intersections.
pub fn accumulate_penetration(ordered: &[Intersection]) -> f64 {
    let mut counted = 0usize;
    let mut total = 0.0;
    for hit in ordered {
        let Some(material) = hit.material.as_deref() else {
            continue;
        };
        counted += 1;
        if counted > MAX_BUILDINGS_PENETRATED {
            trace!("penetration capped after {} buildings", MAX_BUILDINGS_PENETRATED);
            break;
        }
        total += building_loss(material, &hit.bounds);
    }
    total.clamp(0.0, MAX_TOTAL_LOSS)
}
