//! RF propagation core.
//!
//! Computes path loss and received signal for transmitter/receiver pairs in an
//! environment of box-shaped buildings with material properties.
//!
//! ## Module Organization
//!
//! - `types`: Entity snapshots (positions, transmitters, receivers, model selector)
//! - `materials`: Material table, reflection bands and conductivity law
//! - `geometry`: Building solids and the in-memory obstacle layer
//! - `obstacles`: Obstacle service contract, LOS and penetration accumulation
//! - `signal_calculations`: Closed-form path loss models and shadowing
//! - `environment`: Urban/free-space classification for the empirical models
//! - `ray_tracing`: Reflection, scattering and diffraction path search
//! - `engine`: Per-pair dispatch over the model variants

pub mod engine;
pub mod environment;
pub mod geometry;
pub mod materials;
pub mod obstacles;
pub mod ray_tracing;
pub mod signal_calculations;
pub mod types;

pub use engine::{LinkMeasurement, PathLossBreakdown, PropagationEngine, PropagationSettings};
pub use geometry::{Building, BuildingLayer};
pub use obstacles::{Intersection, ObstacleService};
pub use types::{PropagationModel, Receiver, ReceiverId, Technology, Transmitter, TransmitterId, Vec3};
