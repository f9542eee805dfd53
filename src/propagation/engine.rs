//! Propagation engine: one entry point per transmitter/receiver pair.
//!
//! Dispatches on the transmitter's `PropagationModel` and returns a
//! `LinkMeasurement` carrying the path loss, the received signal and the loss
//! breakdown. The engine holds no mutable state, so pairs can be evaluated
//! concurrently against a shared instance.

use rand::Rng;
use serde::Deserialize;
use std::sync::Arc;

use super::environment::{Environment, classify_link, environment_factor};
use super::obstacles::{ObstacleService, has_line_of_sight, penetration_loss};
use super::ray_tracing::{RayTracer, RayTracingBreakdown, RayTracingParameters};
use super::signal_calculations::{
    PathLossParameters, cost231_path_loss, free_space_path_loss, hata_path_loss, log_distance_path_loss, received_signal_dbm, sample_shadowing,
};
use super::types::{PropagationModel, Receiver, ReceiverId, Transmitter, TransmitterId, Vec3};

/// Engine-wide propagation parameters.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct PropagationSettings {
    pub path_loss: PathLossParameters,
    pub ray_tracing: RayTracingParameters,
    /// Add building penetration loss to the free-space and log-distance models
    /// when their straight path crosses buildings. The empirical macro-cell
    /// models already account for clutter and never get it.
    pub penetration_for_statistical_models: bool,
}

/// Components of a link's path loss, for diagnostics and export.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PathLossBreakdown {
    /// Model loss before penetration and shadowing (dB).
    pub base_loss_db: f64,
    pub penetration_loss_db: f64,
    pub shadowing_db: f64,
    /// Set for the empirical models only.
    pub environment: Option<Environment>,
    /// Set for the ray-tracing model only.
    pub ray_tracing: Option<RayTracingBreakdown>,
}

/// Result of evaluating one transmitter/receiver pair.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkMeasurement {
    pub transmitter_id: TransmitterId,
    pub receiver_id: ReceiverId,
    pub model: PropagationModel,
    pub distance_m: f64,
    pub line_of_sight: bool,
    /// Total path loss in dB; `+inf` when there is no link.
    pub path_loss_db: f64,
    /// Received signal in dBm; `-inf` when there is no link.
    pub signal_dbm: f64,
    pub breakdown: PathLossBreakdown,
}

impl LinkMeasurement {
    pub fn is_usable(&self) -> bool {
        self.signal_dbm.is_finite()
    }
}

pub struct PropagationEngine {
    obstacles: Option<Arc<dyn ObstacleService>>,
    settings: PropagationSettings,
}

impl PropagationEngine {
    pub fn new(obstacles: Option<Arc<dyn ObstacleService>>, settings: PropagationSettings) -> Self {
        Self { obstacles, settings }
    }

    pub fn obstacles(&self) -> Option<&dyn ObstacleService> {
        self.obstacles.as_deref()
    }

    pub fn settings(&self) -> &PropagationSettings {
        &self.settings
    }

    /// Path loss (dB) of `tx → position` under the transmitter's model.
    ///
    /// `rng` is only consulted by the shadowed log-distance variant.
    pub fn path_loss<R: Rng + ?Sized>(&self, tx: &Transmitter, position: &Vec3, rng: &mut R) -> (f64, PathLossBreakdown) {
        let obstacles = self.obstacles();
        let distance = tx.position.distance(position);
        let frequency = tx.frequency_mhz;
        let mut breakdown = PathLossBreakdown::default();

        let statistical_penetration = |breakdown: &mut PathLossBreakdown| {
            if self.settings.penetration_for_statistical_models {
                breakdown.penetration_loss_db = penetration_loss(obstacles, &tx.position, position);
            }
        };

        match tx.model {
            PropagationModel::FreeSpace => {
                breakdown.base_loss_db = free_space_path_loss(distance, frequency);
                statistical_penetration(&mut breakdown);
            }
            PropagationModel::LogDistance => {
                breakdown.base_loss_db = log_distance_path_loss(distance, frequency, &self.settings.path_loss);
                statistical_penetration(&mut breakdown);
            }
            PropagationModel::LogDistanceShadowed => {
                let params = &self.settings.path_loss;
                breakdown.base_loss_db = log_distance_path_loss(distance, frequency, params);
                breakdown.shadowing_db = sample_shadowing(rng, params.shadowing_sigma, params.shadowing_bound);
                statistical_penetration(&mut breakdown);
            }
            PropagationModel::Hata | PropagationModel::Cost231 => {
                let environment = classify_link(obstacles, &tx.position, position);
                let base = if tx.model == PropagationModel::Hata {
                    hata_path_loss(distance, frequency, tx.position.y, position.y)
                } else {
                    cost231_path_loss(distance, frequency, tx.position.y, position.y)
                };
                breakdown.base_loss_db = base * environment_factor(environment, frequency);
                breakdown.environment = Some(environment);
            }
            PropagationModel::RayTracing => {
                let traced = RayTracer::new(obstacles, &self.settings.ray_tracing).trace(&tx.position, position, frequency);
                // The traced total already includes penetration when the direct path wins.
                breakdown.base_loss_db = traced.total_loss_db;
                breakdown.ray_tracing = Some(traced);
            }
        }

        let total = breakdown.base_loss_db + breakdown.penetration_loss_db + breakdown.shadowing_db;
        let total = if total.is_nan() { f64::INFINITY } else { total };
        (total, breakdown)
    }

    /// Evaluate one pair: path loss, received signal and LOS flag.
    pub fn evaluate_link<R: Rng + ?Sized>(&self, tx: &Transmitter, rx: &Receiver, rng: &mut R) -> LinkMeasurement {
        let (path_loss_db, breakdown) = self.path_loss(tx, &rx.position, rng);
        let line_of_sight = match &breakdown.ray_tracing {
            Some(traced) => traced.line_of_sight,
            None => has_line_of_sight(self.obstacles(), &tx.position, &rx.position),
        };
        let signal_dbm = received_signal_dbm(tx.eirp_dbm(), path_loss_db);
        LinkMeasurement {
            transmitter_id: tx.id,
            receiver_id: rx.id,
            model: tx.model,
            distance_m: tx.position.distance(&rx.position),
            line_of_sight,
            path_loss_db: if signal_dbm.is_finite() { path_loss_db } else { f64::INFINITY },
            signal_dbm,
            breakdown,
        }
    }
}
