//! Shared building blocks: units, scene loading and runner configuration.

pub mod config;
pub mod scene;
pub mod units;
