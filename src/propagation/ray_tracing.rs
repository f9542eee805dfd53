//! Deterministic ray-based propagation.
//!
//! Candidate paths for one transmitter/receiver pair:
//! - direct (line of sight, or through buildings with penetration loss)
//! - specular reflection off building walls (image method, Fresnel + roughness)
//! - knife-edge diffraction over the dominant rooftop or around building corners
//! - diffuse scattering from wall centers
//!
//! The candidates are combined with the best-single-path rule: the path with the
//! lowest total loss is the link's loss. Every intermediate value is guarded so
//! the outcome is finite or `+inf`, never NaN.

use num_complex::Complex64;
use serde::Deserialize;
use std::f64::consts::PI;

use crate::common::units::{VACUUM_PERMITTIVITY, mhz_to_ghz, mhz_to_hz, wavelength_m, wavenumber};

use super::geometry::{Building, Wall};
use super::materials::{BuildingMaterial, MaterialType, conductivity, reflection_coefficient};
use super::obstacles::{ObstacleService, has_line_of_sight, penetration_loss};
use super::signal_calculations::free_space_path_loss;
use super::types::Vec3;

/// Reflection/scattering points are pulled this far off the wall before the
/// leg visibility checks so the wall itself does not block them.
const SURFACE_OFFSET_M: f64 = 1e-3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum Polarization {
    /// TE: E-field parallel to the surface.
    Perpendicular,
    /// TM: E-field in the plane of incidence.
    Parallel,
    /// Power average of the two.
    #[default]
    Unpolarized,
}

/// How reflection magnitudes are obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum ReflectionMode {
    /// Complex-permittivity Fresnel coefficient with roughness correction.
    #[default]
    Fresnel,
    /// Per-material band table only.
    Empirical,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct RayTracingParameters {
    pub polarization: Polarization,
    pub reflection_mode: ReflectionMode,
    /// Extra search radius around the link when collecting candidate buildings (m).
    pub search_margin_m: f64,
    /// Maximum number of buildings examined per link, nearest to the midpoint first.
    pub max_candidate_buildings: usize,
    pub reflections: bool,
    pub diffraction: bool,
    pub scattering: bool,
}

impl Default for RayTracingParameters {
    fn default() -> Self {
        Self {
            polarization: Polarization::Unpolarized,
            reflection_mode: ReflectionMode::Fresnel,
            search_margin_m: 50.0,
            max_candidate_buildings: 16,
            reflections: true,
            diffraction: true,
            scattering: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PathKind {
    LineOfSight,
    Penetration,
    Reflection,
    Diffraction,
    Scattering,
}

/// Per-path loss breakdown kept for diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct RayTracingBreakdown {
    pub line_of_sight: bool,
    /// Free-space loss of the straight path (dB).
    pub direct_loss_db: f64,
    /// Penetration loss of the straight path (0 when clear).
    pub penetration_loss_db: f64,
    pub best_reflection_db: Option<f64>,
    pub best_diffraction_db: Option<f64>,
    pub best_scattering_db: Option<f64>,
    pub dominant: PathKind,
    pub total_loss_db: f64,
}

/// Complex relative permittivity `ε̃ = ε_r − j·σ(f)/(ω·ε₀)`.
pub fn complex_permittivity(material: &BuildingMaterial, frequency_mhz: f64) -> Complex64 {
    let omega = 2.0 * PI * mhz_to_hz(frequency_mhz);
    if !(omega > 0.0) || !omega.is_finite() {
        return Complex64::new(material.relative_permittivity, 0.0);
    }
    let imaginary = conductivity(material, frequency_mhz) / (omega * VACUUM_PERMITTIVITY);
    Complex64::new(material.relative_permittivity, -imaginary)
}

/// Fresnel reflection magnitude for a wave hitting a surface of permittivity
/// `eps` at `cos_incidence` (cosine of the angle from the surface normal).
///
/// Returns a value in `[0, 1]`; degenerate inputs give 0.
pub fn fresnel_reflection(eps: Complex64, cos_incidence: f64, polarization: Polarization) -> f64 {
    if cos_incidence.is_nan() {
        return 0.0;
    }
    let cos_t = cos_incidence.clamp(-1.0, 1.0).abs();
    let sin2 = 1.0 - cos_t * cos_t;
    let root = (eps - sin2).sqrt();
    let cos_c = Complex64::new(cos_t, 0.0);

    let perpendicular = ((cos_c - root) / (cos_c + root)).norm();
    let parallel = ((eps * cos_c - root) / (eps * cos_c + root)).norm();
    let magnitude = match polarization {
        Polarization::Perpendicular => perpendicular,
        Polarization::Parallel => parallel,
        Polarization::Unpolarized => ((perpendicular * perpendicular + parallel * parallel) / 2.0).sqrt(),
    };
    if magnitude.is_finite() { magnitude.clamp(0.0, 1.0) } else { 0.0 }
}

/// Rayleigh roughness correction `ρ_s = exp(−8g²)`, `g = π·σ_h·sinψ/λ`.
///
/// `sin_grazing` is the sine of the grazing angle (angle between ray and
/// surface). Result is in `(0, 1]`.
pub fn roughness_factor(roughness_m: f64, sin_grazing: f64, wavelength: f64) -> f64 {
    let g = PI * roughness_m.abs() * sin_grazing.clamp(-1.0, 1.0) / wavelength;
    let rho = (-8.0 * g * g).exp();
    if rho.is_nan() {
        return 1.0;
    }
    rho.clamp(f64::MIN_POSITIVE, 1.0)
}

/// Fresnel-Kirchhoff diffraction parameter `v = h·√(2(d₁+d₂)/(λ·d₁·d₂))`.
///
/// `None` when the edge does not obstruct the path (`h ≤ 0`) or the geometry
/// is degenerate.
pub fn diffraction_parameter(h: f64, d1: f64, d2: f64, wavelength: f64) -> Option<f64> {
    if !(h > 0.0) {
        return None;
    }
    let d1 = d1.max(f64::EPSILON);
    let d2 = d2.max(f64::EPSILON);
    let v = h * (2.0 * (d1 + d2) / (wavelength * d1 * d2)).sqrt();
    v.is_finite().then_some(v)
}

/// ITU knife-edge approximation `L(v) = 6.9 + 20·log₁₀(√((v−0.1)²+1) + v − 0.1)`,
/// floored at 0 dB.
pub fn knife_edge_loss(v: f64) -> f64 {
    if v.is_nan() {
        return 0.0;
    }
    let a = v - 0.1;
    let arg = (a * a + 1.0).sqrt() + a;
    if !(arg > 0.0) {
        return 0.0;
    }
    (6.9 + 20.0 * arg.log10()).max(0.0)
}

/// Knife-edge loss for an edge `h` meters above the direct line; 0 if `h ≤ 0`.
pub fn knife_edge_diffraction_loss(h: f64, d1: f64, d2: f64, wavelength: f64) -> f64 {
    diffraction_parameter(h, d1, d2, wavelength).map(knife_edge_loss).unwrap_or(0.0)
}

/// Diffuse scattering coefficient `S = (1 − exp(−2(k₀σ_h|cosθ|)²))·factor`, in `[0, 1]`.
pub fn scattering_coefficient(k0: f64, roughness_m: f64, cos_theta: f64, roughness_factor: f64) -> f64 {
    let x = k0 * roughness_m * cos_theta.clamp(-1.0, 1.0).abs();
    let s = (1.0 - (-2.0 * x * x).exp()) * roughness_factor;
    if s.is_nan() { 0.0 } else { s.clamp(0.0, 1.0) }
}

/// Scattering loss `−20·log₁₀(√(cosθᵢ·cosθₛ)·S)` in dB. `None` when the
/// argument is not positive (no scattered path).
pub fn scattering_loss(cos_incident: f64, cos_scattered: f64, coefficient: f64) -> Option<f64> {
    let product = cos_incident.clamp(-1.0, 1.0) * cos_scattered.clamp(-1.0, 1.0);
    if !(product > 0.0) {
        return None;
    }
    let arg = product.sqrt() * coefficient;
    if !(arg > 0.0) || !arg.is_finite() {
        return None;
    }
    Some(-20.0 * arg.log10())
}

/// Amplitude reduction of the linear loss, as a dB penalty (`−20·log₁₀(Γ)`).
fn coefficient_penalty_db(coefficient: f64) -> Option<f64> {
    (coefficient > 0.0 && coefficient.is_finite()).then(|| -20.0 * coefficient.log10())
}

fn keep_best(slot: &mut Option<f64>, value: f64) {
    if value.is_finite() && slot.is_none_or(|best| value < best) {
        *slot = Some(value);
    }
}

/// Ray tracer for one obstacle environment and parameter set.
pub struct RayTracer<'a> {
    obstacles: Option<&'a dyn ObstacleService>,
    params: &'a RayTracingParameters,
}

impl<'a> RayTracer<'a> {
    pub fn new(obstacles: Option<&'a dyn ObstacleService>, params: &'a RayTracingParameters) -> Self {
        Self { obstacles, params }
    }

    /// Trace all candidate paths between `tx` and `rx` and select the dominant one.
    pub fn trace(&self, tx: &Vec3, rx: &Vec3, frequency_mhz: f64) -> RayTracingBreakdown {
        let distance = tx.distance(rx);
        let direct_loss_db = free_space_path_loss(distance, frequency_mhz);
        let line_of_sight = has_line_of_sight(self.obstacles, tx, rx);
        let penetration_loss_db = if line_of_sight { 0.0 } else { penetration_loss(self.obstacles, tx, rx) };

        let mut breakdown = RayTracingBreakdown {
            line_of_sight,
            direct_loss_db,
            penetration_loss_db,
            best_reflection_db: None,
            best_diffraction_db: None,
            best_scattering_db: None,
            dominant: if line_of_sight { PathKind::LineOfSight } else { PathKind::Penetration },
            total_loss_db: direct_loss_db + penetration_loss_db,
        };

        let Some(service) = self.obstacles else {
            return breakdown;
        };
        if !direct_loss_db.is_finite() {
            return breakdown;
        }

        let wavelength = wavelength_m(frequency_mhz);
        let candidates = self.candidate_buildings(service, tx, rx, distance);

        if self.params.reflections || self.params.scattering {
            for building in &candidates {
                for wall in building.walls() {
                    if wall.signed_distance(tx) <= 0.0 || wall.signed_distance(rx) <= 0.0 {
                        continue;
                    }
                    if self.params.reflections {
                        if let Some(loss) = self.reflection_loss(service, building, &wall, tx, rx, frequency_mhz, wavelength) {
                            keep_best(&mut breakdown.best_reflection_db, loss);
                        }
                    }
                    if self.params.scattering {
                        if let Some(loss) = self.scattering_path_loss(service, building, &wall, tx, rx, frequency_mhz) {
                            keep_best(&mut breakdown.best_scattering_db, loss);
                        }
                    }
                }
            }
        }

        if self.params.diffraction && !line_of_sight {
            if let Some(loss) = self.diffraction_loss(&candidates, tx, rx, wavelength) {
                keep_best(&mut breakdown.best_diffraction_db, direct_loss_db + loss);
            }
        }

        for (kind, loss) in [
            (PathKind::Reflection, breakdown.best_reflection_db),
            (PathKind::Diffraction, breakdown.best_diffraction_db),
            (PathKind::Scattering, breakdown.best_scattering_db),
        ] {
            if let Some(loss) = loss {
                if loss < breakdown.total_loss_db {
                    breakdown.total_loss_db = loss;
                    breakdown.dominant = kind;
                }
            }
        }
        breakdown
    }

    fn candidate_buildings<'s>(&self, service: &'s dyn ObstacleService, tx: &Vec3, rx: &Vec3, distance: f64) -> Vec<&'s Building> {
        let center = tx.midpoint(rx);
        let mut nearby = service.buildings_near(&center, distance / 2.0 + self.params.search_margin_m);
        nearby.sort_by(|a, b| a.footprint_distance(&center).total_cmp(&b.footprint_distance(&center)));
        nearby.truncate(self.params.max_candidate_buildings);
        nearby
    }

    /// Reflection magnitude off `building` at the given incidence cosine.
    fn reflection_magnitude(&self, building: &Building, cos_incidence: f64, frequency_mhz: f64, wavelength: f64) -> f64 {
        match (&building.material, self.params.reflection_mode) {
            (Some(material), ReflectionMode::Fresnel) => {
                let eps = complex_permittivity(material, frequency_mhz);
                let gamma = fresnel_reflection(eps, cos_incidence, self.params.polarization);
                // sin of the grazing angle equals cos of the incidence angle
                gamma * roughness_factor(material.surface_roughness_m, cos_incidence, wavelength)
            }
            (Some(material), ReflectionMode::Empirical) => reflection_coefficient(material.material_type, mhz_to_ghz(frequency_mhz)),
            (None, _) => reflection_coefficient(MaterialType::Unknown, mhz_to_ghz(frequency_mhz)),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn reflection_loss(
        &self,
        service: &dyn ObstacleService,
        building: &Building,
        wall: &Wall,
        tx: &Vec3,
        rx: &Vec3,
        frequency_mhz: f64,
        wavelength: f64,
    ) -> Option<f64> {
        let image = wall.mirror(tx);
        let hit = wall.plane_hit(&image, rx)?;
        if !wall.contains_on_plane(&hit) {
            return None;
        }
        let bounce = hit.add(&wall.normal.scale(SURFACE_OFFSET_M));
        if !service.line_of_sight(tx, &bounce) || !service.line_of_sight(&bounce, rx) {
            return None;
        }

        let incoming = hit.sub(tx).normalized()?;
        let cos_incidence = incoming.dot(&wall.normal).abs().clamp(0.0, 1.0);
        let magnitude = self.reflection_magnitude(building, cos_incidence, frequency_mhz, wavelength);
        let penalty = coefficient_penalty_db(magnitude)?;
        let path_length = tx.distance(&hit) + hit.distance(rx);
        let loss = free_space_path_loss(path_length, frequency_mhz) + penalty;
        loss.is_finite().then_some(loss)
    }

    fn scattering_path_loss(&self, service: &dyn ObstacleService, building: &Building, wall: &Wall, tx: &Vec3, rx: &Vec3, frequency_mhz: f64) -> Option<f64> {
        let material = building.material.as_deref()?;
        let center = wall.center();
        let point = center.add(&wall.normal.scale(SURFACE_OFFSET_M));
        if !service.line_of_sight(tx, &point) || !service.line_of_sight(&point, rx) {
            return None;
        }
        let incoming = center.sub(tx).normalized()?;
        let outgoing = rx.sub(&center).normalized()?;
        let cos_i = incoming.dot(&wall.normal).abs();
        let cos_s = outgoing.dot(&wall.normal).abs();
        let coefficient = scattering_coefficient(wavenumber(frequency_mhz), material.surface_roughness_m, cos_i, material.scatter_albedo);
        let loss = scattering_loss(cos_i, cos_s, coefficient)?;
        let path_length = tx.distance(&center) + center.distance(rx);
        let total = free_space_path_loss(path_length, frequency_mhz) + loss;
        total.is_finite().then_some(total)
    }

    /// Extra loss of the best diffracted path relative to free space.
    ///
    /// Rooftop: the dominant (largest) knife edge among all blocking buildings.
    /// Corners: only when a single building blocks the path, around either side.
    fn diffraction_loss(&self, candidates: &[&Building], tx: &Vec3, rx: &Vec3, wavelength: f64) -> Option<f64> {
        let blocking: Vec<(&Building, f64, f64)> = candidates
            .iter()
            .filter_map(|b| b.clip_segment(tx, rx).map(|(t0, t1)| (*b, t0, t1)))
            .collect();
        if blocking.is_empty() {
            return None;
        }

        let mut rooftop: Option<f64> = None;
        for (building, t0, t1) in &blocking {
            let crossing = tx.lerp(rx, (t0 + t1) / 2.0);
            let h = building.height() - crossing.y;
            let loss = knife_edge_diffraction_loss(h, tx.distance(&crossing), crossing.distance(rx), wavelength);
            rooftop = Some(rooftop.map_or(loss, |worst| worst.max(loss)));
        }

        let mut best = rooftop;
        if blocking.len() == 1 {
            if let Some(loss) = corner_diffraction_loss(blocking[0].0, tx, rx, wavelength) {
                keep_best(&mut best, loss);
            }
        }
        best
    }
}

/// Knife-edge loss around the vertical corners of a single blocking building,
/// taking the easier side. Works in the ground plane.
fn corner_diffraction_loss(building: &Building, tx: &Vec3, rx: &Vec3, wavelength: f64) -> Option<f64> {
    let (dx, dz) = (rx.x - tx.x, rx.z - tx.z);
    let length = (dx * dx + dz * dz).sqrt();
    if length < f64::EPSILON {
        return None;
    }
    // Unit direction and left-hand normal of the path in the ground plane
    let (ux, uz) = (dx / length, dz / length);
    let (nx, nz) = (-uz, ux);

    let mut side_clearance = [f64::NEG_INFINITY; 2];
    let mut side_corner = [(0.0, 0.0); 2];
    for (cx, cz) in building.corners() {
        let rel_x = cx - tx.x;
        let rel_z = cz - tx.z;
        let along = rel_x * ux + rel_z * uz;
        if along <= 0.0 || along >= length {
            continue;
        }
        let offset = rel_x * nx + rel_z * nz;
        let side = if offset >= 0.0 { 0 } else { 1 };
        if offset.abs() > side_clearance[side] {
            side_clearance[side] = offset.abs();
            side_corner[side] = (cx, cz);
        }
    }

    let mut best: Option<f64> = None;
    for side in 0..2 {
        // The far side of the building has to be cleared to go around this side.
        let h = side_clearance[side];
        if !h.is_finite() {
            continue;
        }
        let corner = Vec3::new(side_corner[side].0, tx.y.min(rx.y), side_corner[side].1);
        let loss = knife_edge_diffraction_loss(h, tx.horizontal_distance(&corner), corner.horizontal_distance(rx), wavelength);
        keep_best(&mut best, loss);
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::propagation::geometry::BuildingLayer;
    use crate::propagation::materials::material_for;
    use std::sync::Arc;

    fn v(x: f64, y: f64, z: f64) -> Vec3 {
        Vec3::new(x, y, z)
    }

    fn concrete() -> Option<Arc<BuildingMaterial>> {
        Some(Arc::new(material_for(MaterialType::Concrete)))
    }

    #[test]
    fn complex_permittivity_has_negative_imaginary_part() {
        let eps = complex_permittivity(&material_for(MaterialType::Concrete), 3500.0);
        assert_eq!(eps.re, 5.31);
        assert!(eps.im < 0.0);
        let dc = complex_permittivity(&material_for(MaterialType::Concrete), 0.0);
        assert_eq!(dc.im, 0.0);
    }

    #[test]
    fn fresnel_magnitude_is_bounded() {
        for m in [MaterialType::Concrete, MaterialType::Brick, MaterialType::Metal, MaterialType::Glass, MaterialType::Wood] {
            let eps = complex_permittivity(&material_for(m), 3500.0);
            for i in 0..=20 {
                let cos = -1.0 + i as f64 * 0.1;
                for pol in [Polarization::Perpendicular, Polarization::Parallel, Polarization::Unpolarized] {
                    let r = fresnel_reflection(eps, cos, pol);
                    assert!((0.0..=1.0).contains(&r), "{m:?} {cos} {pol:?} -> {r}");
                }
            }
        }
        assert_eq!(fresnel_reflection(Complex64::new(5.0, 0.0), f64::NAN, Polarization::Unpolarized), 0.0);
        // Out-of-range cosine is clamped rather than producing NaN
        assert!(fresnel_reflection(Complex64::new(5.0, -0.1), 3.0, Polarization::Parallel).is_finite());
    }

    #[test]
    fn metal_reflects_almost_everything() {
        let eps = complex_permittivity(&material_for(MaterialType::Metal), 3500.0);
        assert!(fresnel_reflection(eps, 0.7, Polarization::Unpolarized) > 0.99);
    }

    #[test]
    fn grazing_incidence_reflects_fully() {
        let eps = Complex64::new(5.31, -0.3);
        let grazing = fresnel_reflection(eps, 0.0, Polarization::Perpendicular);
        assert!((grazing - 1.0).abs() < 1e-9);
        let normal = fresnel_reflection(eps, 1.0, Polarization::Perpendicular);
        assert!(normal < grazing);
    }

    #[test]
    fn roughness_factor_range() {
        let lambda = wavelength_m(3500.0);
        assert_eq!(roughness_factor(0.0, 0.5, lambda), 1.0);
        let rough = roughness_factor(0.05, 1.0, lambda);
        assert!(rough > 0.0 && rough < 1.0);
        assert!(roughness_factor(10.0, 1.0, lambda) > 0.0);
        assert_eq!(roughness_factor(f64::NAN, 1.0, lambda), 1.0);
        assert!(roughness_factor(0.01, 1.0, lambda) > roughness_factor(0.02, 1.0, lambda));
    }

    #[test]
    fn knife_edge_behaviour() {
        let lambda = wavelength_m(900.0);
        assert_eq!(knife_edge_diffraction_loss(0.0, 100.0, 100.0, lambda), 0.0);
        assert_eq!(knife_edge_diffraction_loss(-5.0, 100.0, 100.0, lambda), 0.0);
        // v = 0 gives ~6 dB
        assert!((knife_edge_loss(0.0) - 6.03).abs() < 0.05);
        assert_eq!(knife_edge_loss(-3.0), 0.0);
        let low = knife_edge_diffraction_loss(2.0, 100.0, 100.0, lambda);
        let high = knife_edge_diffraction_loss(10.0, 100.0, 100.0, lambda);
        assert!(low > 0.0 && high > low);
    }

    #[test]
    fn scattering_terms_are_guarded() {
        let k0 = wavenumber(3500.0);
        for i in 0..=10 {
            let cos = i as f64 / 10.0;
            let s = scattering_coefficient(k0, 0.01, cos, 0.4);
            assert!((0.0..=1.0).contains(&s));
        }
        assert_eq!(scattering_coefficient(k0, 0.0, 1.0, 0.4), 0.0);
        assert!(scattering_loss(0.5, 0.5, 0.0).is_none());
        assert!(scattering_loss(0.0, 0.5, 0.3).is_none());
        assert!(scattering_loss(-0.5, 0.5, 0.3).is_none());
        let loss = scattering_loss(0.5, 0.5, 0.3).unwrap();
        assert!(loss > 0.0);
    }

    #[test]
    fn clear_path_is_free_space() {
        let params = RayTracingParameters::default();
        let tracer = RayTracer::new(None, &params);
        let b = tracer.trace(&v(0.0, 30.0, 0.0), &v(1000.0, 30.0, 0.0), 3500.0);
        assert!(b.line_of_sight);
        assert_eq!(b.dominant, PathKind::LineOfSight);
        assert!((b.total_loss_db - 103.33).abs() < 0.1);
        assert_eq!(b.penetration_loss_db, 0.0);
    }

    #[test]
    fn reflection_never_beats_clear_direct_path() {
        let layer = BuildingLayer::new(vec![Building::new(0, v(0.0, 0.0, 20.0), v(200.0, 40.0, 40.0), concrete())]);
        let params = RayTracingParameters::default();
        let tracer = RayTracer::new(Some(&layer), &params);
        let b = tracer.trace(&v(0.0, 10.0, 0.0), &v(200.0, 1.5, 0.0), 3500.0);
        assert!(b.line_of_sight);
        assert!(b.best_reflection_db.is_some());
        assert!(b.best_reflection_db.unwrap() > b.direct_loss_db);
        assert_eq!(b.dominant, PathKind::LineOfSight);
    }

    #[test]
    fn blocked_path_prefers_cheapest_alternative() {
        // A tall metal wall between tx and rx, with a reflecting concrete facade to the side
        let mut metal = material_for(MaterialType::Metal);
        metal.wall_thickness_m = 2.0;
        let buildings = vec![
            Building::new(0, v(95.0, 0.0, -10.0), v(105.0, 60.0, 10.0), Some(Arc::new(metal))),
            Building::new(1, v(0.0, 0.0, 40.0), v(200.0, 40.0, 60.0), concrete()),
        ];
        let layer = BuildingLayer::new(buildings);
        let params = RayTracingParameters::default();
        let tracer = RayTracer::new(Some(&layer), &params);
        let b = tracer.trace(&v(0.0, 10.0, 0.0), &v(200.0, 1.5, 0.0), 3500.0);
        assert!(!b.line_of_sight);
        assert!(b.penetration_loss_db > 0.0);
        assert!(b.best_reflection_db.is_some());
        assert!(b.best_diffraction_db.is_some());
        assert!(b.total_loss_db < b.direct_loss_db + b.penetration_loss_db);
        assert_ne!(b.dominant, PathKind::LineOfSight);
        assert!(b.total_loss_db.is_finite());
    }

    #[test]
    fn disabled_mechanisms_fall_back_to_penetration() {
        let layer = BuildingLayer::new(vec![Building::new(0, v(95.0, 0.0, -10.0), v(105.0, 60.0, 10.0), concrete())]);
        let params = RayTracingParameters {
            reflections: false,
            diffraction: false,
            scattering: false,
            ..RayTracingParameters::default()
        };
        let tracer = RayTracer::new(Some(&layer), &params);
        let b = tracer.trace(&v(0.0, 10.0, 0.0), &v(200.0, 1.5, 0.0), 3500.0);
        assert_eq!(b.dominant, PathKind::Penetration);
        assert!((b.total_loss_db - (b.direct_loss_db + b.penetration_loss_db)).abs() < 1e-9);
    }

    #[test]
    fn corner_diffraction_prefers_the_narrow_side() {
        let building = Building::new(0, v(90.0, 0.0, -5.0), v(110.0, 50.0, 40.0), concrete());
        let lambda = wavelength_m(3500.0);
        let loss = corner_diffraction_loss(&building, &v(0.0, 1.5, 0.0), &v(200.0, 1.5, 0.0), lambda).unwrap();
        let around_short_side = knife_edge_diffraction_loss(5.0, 90.0, 110.0, lambda);
        assert!(loss <= around_short_side + 0.5);
    }
}
