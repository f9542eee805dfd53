//! Geometry calculations for line-of-sight and building intersection.
//!
//! Contains helper functions for:
//! - Point-in-footprint tests against axis-aligned building boxes
//! - Segment/box clipping (slab method) with degenerate segment handling
//! - Wall enumeration for reflection and scattering candidates
//! - `BuildingLayer`, the reference `ObstacleService` over a list of boxes

use std::sync::Arc;

use super::materials::BuildingMaterial;
use super::obstacles::{Intersection, ObstacleService};
use super::types::Vec3;

/// Layer bit every building belongs to unless the scene says otherwise.
pub const DEFAULT_OBSTACLE_LAYER: u32 = 1;

/// Axis-aligned solid building.
#[derive(Debug, Clone)]
pub struct Building {
    pub id: u32,
    /// Minimum corner (ground level is normally `min.y`).
    pub min: Vec3,
    /// Maximum corner (`max.y` is the rooftop height).
    pub max: Vec3,
    pub material: Option<Arc<BuildingMaterial>>,
    /// Descriptive only, the propagation math never reads it.
    pub floors: u32,
    /// Obstacle layer bitmask, matched against the layer filter of the service.
    pub layer: u32,
}

/// Vertical wall of a building, used as a reflection or scattering surface.
#[derive(Debug, Clone, Copy)]
pub struct Wall {
    /// Axis the wall is perpendicular to: 0 = X, 2 = Z.
    pub axis: usize,
    /// Coordinate of the wall plane along `axis`.
    pub plane: f64,
    /// Outward unit normal.
    pub normal: Vec3,
    pub min: Vec3,
    pub max: Vec3,
}

impl Building {
    pub fn new(id: u32, min: Vec3, max: Vec3, material: Option<Arc<BuildingMaterial>>) -> Self {
        Self {
            id,
            min: Vec3::new(min.x.min(max.x), min.y.min(max.y), min.z.min(max.z)),
            max: Vec3::new(min.x.max(max.x), min.y.max(max.y), min.z.max(max.z)),
            material,
            floors: 1,
            layer: DEFAULT_OBSTACLE_LAYER,
        }
    }

    /// Extent of the box along each axis.
    pub fn size(&self) -> Vec3 {
        self.max.sub(&self.min)
    }

    pub fn center(&self) -> Vec3 {
        self.min.midpoint(&self.max)
    }

    pub fn height(&self) -> f64 {
        self.max.y
    }

    /// Ground footprint area in square meters.
    pub fn footprint_area(&self) -> f64 {
        let s = self.size();
        s.x * s.z
    }

    /// Inclusive point-in-footprint test on the ground plane.
    pub fn footprint_contains(&self, x: f64, z: f64) -> bool {
        x >= self.min.x && x <= self.max.x && z >= self.min.z && z <= self.max.z
    }

    /// Inclusive point-in-box test.
    pub fn contains(&self, p: &Vec3) -> bool {
        self.footprint_contains(p.x, p.z) && p.y >= self.min.y && p.y <= self.max.y
    }

    /// Horizontal distance from a point to the footprint (0 when inside).
    pub fn footprint_distance(&self, p: &Vec3) -> f64 {
        let dx = (self.min.x - p.x).max(0.0).max(p.x - self.max.x);
        let dz = (self.min.z - p.z).max(0.0).max(p.z - self.max.z);
        (dx * dx + dz * dz).sqrt()
    }

    /// Clip the segment `p1 → p2` against the box.
    ///
    /// Returns the entry/exit parameters `(t0, t1)` in `[0, 1]` when the segment
    /// touches the box. A degenerate segment (p1 == p2) is treated as a
    /// point-inside test.
    pub fn clip_segment(&self, p1: &Vec3, p2: &Vec3) -> Option<(f64, f64)> {
        let d = p2.sub(p1);
        let origin = [p1.x, p1.y, p1.z];
        let dir = [d.x, d.y, d.z];
        let lo = [self.min.x, self.min.y, self.min.z];
        let hi = [self.max.x, self.max.y, self.max.z];

        let mut t0 = 0.0_f64;
        let mut t1 = 1.0_f64;
        for axis in 0..3 {
            if dir[axis].abs() < 1e-12 {
                if origin[axis] < lo[axis] || origin[axis] > hi[axis] {
                    return None;
                }
                continue;
            }
            let mut ta = (lo[axis] - origin[axis]) / dir[axis];
            let mut tb = (hi[axis] - origin[axis]) / dir[axis];
            if ta > tb {
                std::mem::swap(&mut ta, &mut tb);
            }
            t0 = t0.max(ta);
            t1 = t1.min(tb);
            if t0 > t1 {
                return None;
            }
        }
        Some((t0, t1))
    }

    /// The four vertical walls with outward normals.
    pub fn walls(&self) -> [Wall; 4] {
        let (min, max) = (self.min, self.max);
        [
            Wall { axis: 0, plane: min.x, normal: Vec3::new(-1.0, 0.0, 0.0), min, max },
            Wall { axis: 0, plane: max.x, normal: Vec3::new(1.0, 0.0, 0.0), min, max },
            Wall { axis: 2, plane: min.z, normal: Vec3::new(0.0, 0.0, -1.0), min, max },
            Wall { axis: 2, plane: max.z, normal: Vec3::new(0.0, 0.0, 1.0), min, max },
        ]
    }

    /// Vertical corner edges as ground-plane points (x, z).
    pub fn corners(&self) -> [(f64, f64); 4] {
        [(self.min.x, self.min.z), (self.max.x, self.min.z), (self.max.x, self.max.z), (self.min.x, self.max.z)]
    }
}

impl Wall {
    fn coord(p: &Vec3, axis: usize) -> f64 {
        if axis == 0 { p.x } else { p.z }
    }

    /// Signed distance of a point in front of the wall (positive = outside).
    pub fn signed_distance(&self, p: &Vec3) -> f64 {
        (Self::coord(p, self.axis) - self.plane) * if Self::coord(&self.normal, self.axis) > 0.0 { 1.0 } else { -1.0 }
    }

    /// Mirror a point across the wall plane (image method).
    pub fn mirror(&self, p: &Vec3) -> Vec3 {
        let mut m = *p;
        if self.axis == 0 {
            m.x = 2.0 * self.plane - p.x;
        } else {
            m.z = 2.0 * self.plane - p.z;
        }
        m
    }

    /// True when a point on the wall plane lies within the wall rectangle.
    pub fn contains_on_plane(&self, p: &Vec3) -> bool {
        let within_y = p.y >= self.min.y && p.y <= self.max.y;
        if self.axis == 0 { within_y && p.z >= self.min.z && p.z <= self.max.z } else { within_y && p.x >= self.min.x && p.x <= self.max.x }
    }

    /// Intersection of segment `a → b` with the (infinite) wall plane.
    pub fn plane_hit(&self, a: &Vec3, b: &Vec3) -> Option<Vec3> {
        let ca = Self::coord(a, self.axis);
        let cb = Self::coord(b, self.axis);
        let denom = cb - ca;
        if denom.abs() < 1e-12 {
            return None;
        }
        let t = (self.plane - ca) / denom;
        if !(0.0..=1.0).contains(&t) {
            return None;
        }
        Some(a.lerp(b, t))
    }

    /// Center of the wall surface.
    pub fn center(&self) -> Vec3 {
        let mut c = self.min.midpoint(&self.max);
        if self.axis == 0 {
            c.x = self.plane;
        } else {
            c.z = self.plane;
        }
        c
    }
}

/// Reference obstacle service over a static list of buildings.
///
/// Queries are read-only, so one layer can be shared between worker threads.
#[derive(Debug, Clone, Default)]
pub struct BuildingLayer {
    buildings: Vec<Building>,
    layer_mask: u32,
}

impl BuildingLayer {
    pub fn new(buildings: Vec<Building>) -> Self {
        Self { buildings, layer_mask: u32::MAX }
    }

    /// Restrict queries to buildings whose layer bits intersect `mask`.
    pub fn with_layer_mask(mut self, mask: u32) -> Self {
        self.layer_mask = mask;
        self
    }

    pub fn buildings(&self) -> &[Building] {
        &self.buildings
    }

    fn active(&self) -> impl Iterator<Item = &Building> {
        self.buildings.iter().filter(move |b| b.layer & self.layer_mask != 0)
    }
}

impl ObstacleService for BuildingLayer {
    fn line_of_sight(&self, from: &Vec3, to: &Vec3) -> bool {
        !self.active().any(|b| b.clip_segment(from, to).is_some())
    }

    fn intersections(&self, from: &Vec3, to: &Vec3) -> Vec<Intersection> {
        let length = from.distance(to);
        self.active()
            .filter_map(|b| {
                let (t0, t1) = b.clip_segment(from, to)?;
                Some(Intersection {
                    building_id: b.id,
                    distance: t0 * length,
                    entry: from.lerp(to, t0),
                    exit: from.lerp(to, t1),
                    material: b.material.clone(),
                    bounds: b.size(),
                })
            })
            .collect()
    }

    fn buildings_near(&self, center: &Vec3, radius: f64) -> Vec<&Building> {
        self.active().filter(|b| b.footprint_distance(center) <= radius).collect()
    }
}
