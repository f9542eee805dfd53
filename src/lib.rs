//! RF coverage and handover simulator.
//!
//! - `propagation`: materials, obstacle accumulation, path loss models and
//!   the ray tracer, combined by `PropagationEngine`
//! - `connection`: strategy-driven receiver association with hysteresis
//! - `simulation`: the tick loop and scripted event replay
//! - `export`: measurement records, CSV output and per-model evaluation

pub mod common;
pub mod connection;
pub mod export;
pub mod propagation;
pub mod simulation;
pub mod time_driver;
