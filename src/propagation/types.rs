//! Type definitions for the propagation engine.
//!
//! Contains the entity snapshots the engine computes over:
//! - 3-D positions (Y is up, X/Z span the ground plane)
//! - Transmitters and receivers with their radio parameters
//! - Propagation model and technology selectors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier of a transmitter.
pub type TransmitterId = u32;
/// Stable identifier of a receiver.
pub type ReceiverId = u32;

/// 3-D position or vector in meters. `y` is the height axis.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 { x: 0.0, y: 0.0, z: 0.0 };

    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn add(&self, o: &Vec3) -> Vec3 {
        Vec3::new(self.x + o.x, self.y + o.y, self.z + o.z)
    }

    pub fn sub(&self, o: &Vec3) -> Vec3 {
        Vec3::new(self.x - o.x, self.y - o.y, self.z - o.z)
    }

    pub fn scale(&self, k: f64) -> Vec3 {
        Vec3::new(self.x * k, self.y * k, self.z * k)
    }

    pub fn dot(&self, o: &Vec3) -> f64 {
        self.x * o.x + self.y * o.y + self.z * o.z
    }

    pub fn length(&self) -> f64 {
        self.dot(self).sqrt()
    }

    pub fn distance(&self, o: &Vec3) -> f64 {
        self.sub(o).length()
    }

    /// Distance projected on the ground plane (ignores height).
    pub fn horizontal_distance(&self, o: &Vec3) -> f64 {
        let dx = self.x - o.x;
        let dz = self.z - o.z;
        (dx * dx + dz * dz).sqrt()
    }

    /// Unit vector, or `None` for a zero-length (or non-finite) vector.
    pub fn normalized(&self) -> Option<Vec3> {
        let len = self.length();
        if len > f64::EPSILON && len.is_finite() { Some(self.scale(1.0 / len)) } else { None }
    }

    pub fn lerp(&self, o: &Vec3, t: f64) -> Vec3 {
        self.add(&o.sub(self).scale(t))
    }

    pub fn midpoint(&self, o: &Vec3) -> Vec3 {
        self.lerp(o, 0.5)
    }
}

/// Propagation model variants selectable per transmitter.
///
/// Serialized names match the labels used in exported measurement tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PropagationModel {
    #[serde(rename = "FreeSpace")]
    FreeSpace,
    #[serde(rename = "LogD")]
    LogDistance,
    /// Log-distance with a log-normal shadowing sample drawn once per link.
    #[serde(rename = "LogDShadow")]
    LogDistanceShadowed,
    #[serde(rename = "Hata")]
    Hata,
    #[serde(rename = "COST231")]
    Cost231,
    #[default]
    #[serde(rename = "RayTracing")]
    RayTracing,
}

impl PropagationModel {
    pub fn label(&self) -> &'static str {
        match self {
            PropagationModel::FreeSpace => "FreeSpace",
            PropagationModel::LogDistance => "LogD",
            PropagationModel::LogDistanceShadowed => "LogDShadow",
            PropagationModel::Hata => "Hata",
            PropagationModel::Cost231 => "COST231",
            PropagationModel::RayTracing => "RayTracing",
        }
    }
}

impl fmt::Display for PropagationModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Radio access technology presets. Only the carrier frequency is derived from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Technology {
    Lte,
    FiveGSub6,
    FiveGMmWave,
}

impl Technology {
    pub fn carrier_frequency_mhz(&self) -> f64 {
        match self {
            Technology::Lte => 700.0,
            Technology::FiveGSub6 => 3500.0,
            Technology::FiveGMmWave => 28_000.0,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Technology::Lte => "LTE",
            Technology::FiveGSub6 => "FiveGSub6",
            Technology::FiveGMmWave => "FiveGMmWave",
        }
    }
}

/// Fixed transmitter (base station / access point).
#[derive(Debug, Clone, PartialEq)]
pub struct Transmitter {
    pub id: TransmitterId,
    pub position: Vec3,
    /// Transmit power at the antenna port in dBm.
    pub tx_power_dbm: f64,
    /// Antenna gain in dBi.
    pub antenna_gain_dbi: f64,
    pub frequency_mhz: f64,
    pub model: PropagationModel,
    pub technology: Option<Technology>,
}

impl Transmitter {
    /// Effective isotropic radiated power (dBm).
    pub fn eirp_dbm(&self) -> f64 {
        self.tx_power_dbm + self.antenna_gain_dbi
    }
}

/// Mobile-capable receiver.
///
/// The signal/SINR/serving fields are outputs of the connection manager; the
/// serving transmitter is an id lookup, never a reference into the transmitter list.
#[derive(Debug, Clone, PartialEq)]
pub struct Receiver {
    pub id: ReceiverId,
    pub position: Vec3,
    /// Receiver sensitivity in dBm.
    pub sensitivity_dbm: f64,
    pub connected_transmitter: Option<TransmitterId>,
    /// Last computed signal strength in dBm; `-inf` means no usable signal.
    pub signal_dbm: f64,
    /// Last computed SINR in dB; `-inf` while unconnected.
    pub sinr_db: f64,
}

impl Receiver {
    pub fn new(id: ReceiverId, position: Vec3, sensitivity_dbm: f64) -> Self {
        Self {
            id,
            position,
            sensitivity_dbm,
            connected_transmitter: None,
            signal_dbm: f64::NEG_INFINITY,
            sinr_db: f64::NEG_INFINITY,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected_transmitter.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vector_helpers() {
        let a = Vec3::new(0.0, 0.0, 0.0);
        let b = Vec3::new(3.0, 12.0, 4.0);
        assert!((a.horizontal_distance(&b) - 5.0).abs() < 1e-12);
        assert!((a.distance(&b) - 13.0).abs() < 1e-12);
        assert_eq!(a.midpoint(&b), Vec3::new(1.5, 6.0, 2.0));
        assert!(Vec3::ZERO.normalized().is_none());
    }

    #[test]
    fn model_labels_match_serde_names() {
        for model in [
            PropagationModel::FreeSpace,
            PropagationModel::LogDistance,
            PropagationModel::LogDistanceShadowed,
            PropagationModel::Hata,
            PropagationModel::Cost231,
            PropagationModel::RayTracing,
        ] {
            let json = serde_json::to_string(&model).unwrap();
            assert_eq!(json, format!("\"{}\"", model.label()));
        }
    }
}
