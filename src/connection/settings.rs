//! Decision thresholds and quality tiers.

use serde::Deserialize;
use std::fmt;

/// Thresholds and margins read by every connection strategy.
///
/// Passed explicitly into each decision call; strategies never mutate it.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ConnectionSettings {
    /// Global minimum usable signal (dBm).
    pub min_signal_dbm: f64,
    /// Extra headroom required above the usable threshold (dB).
    pub connection_margin_db: f64,
    /// Hysteresis granted to the current server (dB).
    pub handover_margin_db: f64,
    /// Minimum SINR accepted by the quality-first strategy (dB).
    pub min_sinr_db: f64,
    /// Signal at or above which a link is rated excellent (dBm).
    pub excellent_signal_dbm: f64,
    /// Signal at or above which a link is rated good (dBm).
    pub good_signal_dbm: f64,
    /// Receiver noise floor used in SINR estimates (dBm).
    pub noise_floor_dbm: f64,
    /// How far the emergency strategy lowers the usable threshold (dB).
    pub emergency_threshold_relief_db: f64,
    /// Hysteresis multiplier of the emergency strategy.
    pub emergency_hysteresis_multiplier: f64,
    /// Score penalty per receiver already served, for load balancing (dB).
    pub load_penalty_db: f64,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            min_signal_dbm: -110.0,
            connection_margin_db: 0.0,
            handover_margin_db: 3.0,
            min_sinr_db: 0.0,
            excellent_signal_dbm: -70.0,
            good_signal_dbm: -85.0,
            noise_floor_dbm: -100.0,
            emergency_threshold_relief_db: 10.0,
            emergency_hysteresis_multiplier: 2.0,
            load_penalty_db: 1.0,
        }
    }
}

impl ConnectionSettings {
    /// Lowest raw signal (dBm) a receiver with the given sensitivity accepts.
    pub fn usable_threshold_dbm(&self, sensitivity_dbm: f64) -> f64 {
        let floor = if sensitivity_dbm.is_nan() { self.min_signal_dbm } else { self.min_signal_dbm.max(sensitivity_dbm) };
        floor + self.connection_margin_db
    }

    /// Rate a received signal. `None` for the no-signal sentinel.
    pub fn quality(&self, signal_dbm: f64) -> Option<LinkQuality> {
        if !signal_dbm.is_finite() {
            None
        } else if signal_dbm >= self.excellent_signal_dbm {
            Some(LinkQuality::Excellent)
        } else if signal_dbm >= self.good_signal_dbm {
            Some(LinkQuality::Good)
        } else {
            Some(LinkQuality::Fair)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkQuality {
    Excellent,
    Good,
    Fair,
}

impl fmt::Display for LinkQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkQuality::Excellent => write!(f, "excellent"),
            LinkQuality::Good => write!(f, "good"),
            LinkQuality::Fair => write!(f, "fair"),
        }
    }
}
