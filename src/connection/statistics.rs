//! Aggregate figures republished after every decision pass.

use std::fmt;

use super::settings::{ConnectionSettings, LinkQuality};
use crate::propagation::types::Receiver;

/// Connected receivers per quality tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QualityHistogram {
    pub excellent: usize,
    pub good: usize,
    pub fair: usize,
    /// Connected, but without a finite signal (geometric association).
    pub unrated: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectionStatistics {
    pub transmitter_count: usize,
    pub receiver_count: usize,
    pub connected_count: usize,
    /// 0..=100; 0 when there are no receivers.
    pub connected_percentage: f64,
    /// Over connected receivers with a finite signal; `None` when there are none.
    pub mean_signal_dbm: Option<f64>,
    pub min_signal_dbm: Option<f64>,
    pub max_signal_dbm: Option<f64>,
    pub quality: QualityHistogram,
}

impl ConnectionStatistics {
    pub fn compute(receivers: &[Receiver], transmitter_count: usize, settings: &ConnectionSettings) -> Self {
        let mut stats = ConnectionStatistics {
            transmitter_count,
            receiver_count: receivers.len(),
            ..Default::default()
        };

        let mut sum = 0.0;
        let mut finite = 0usize;
        for rx in receivers.iter().filter(|rx| rx.is_connected()) {
            stats.connected_count += 1;
            match settings.quality(rx.signal_dbm) {
                Some(LinkQuality::Excellent) => stats.quality.excellent += 1,
                Some(LinkQuality::Good) => stats.quality.good += 1,
                Some(LinkQuality::Fair) => stats.quality.fair += 1,
                None => stats.quality.unrated += 1,
            }
            if !rx.signal_dbm.is_finite() {
                continue;
            }
            finite += 1;
            sum += rx.signal_dbm;
            stats.min_signal_dbm = Some(stats.min_signal_dbm.map_or(rx.signal_dbm, |m| m.min(rx.signal_dbm)));
            stats.max_signal_dbm = Some(stats.max_signal_dbm.map_or(rx.signal_dbm, |m| m.max(rx.signal_dbm)));
        }

        if finite > 0 {
            stats.mean_signal_dbm = Some(sum / finite as f64);
        }
        if stats.receiver_count > 0 {
            stats.connected_percentage = 100.0 * stats.connected_count as f64 / stats.receiver_count as f64;
        }
        stats
    }
}

impl fmt::Display for ConnectionStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} receivers connected ({:.1}%) across {} transmitters",
            self.connected_count, self.receiver_count, self.connected_percentage, self.transmitter_count
        )?;
        if let (Some(mean), Some(min), Some(max)) = (self.mean_signal_dbm, self.min_signal_dbm, self.max_signal_dbm) {
            write!(f, ", signal mean {:.1} dBm (min {:.1}, max {:.1})", mean, min, max)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::propagation::types::Vec3;

    fn rx(id: u32, server: Option<u32>, signal: f64) -> Receiver {
        let mut r = Receiver::new(id, Vec3::ZERO, -110.0);
        r.connected_transmitter = server;
        r.signal_dbm = signal;
        r
    }

    #[test]
    fn aggregates_connected_receivers_only() {
        let receivers = vec![rx(1, Some(1), -60.0), rx(2, Some(2), -90.0), rx(3, None, f64::NEG_INFINITY), rx(4, Some(1), f64::NEG_INFINITY)];
        let stats = ConnectionStatistics::compute(&receivers, 2, &ConnectionSettings::default());
        assert_eq!(stats.connected_count, 3);
        assert_eq!(stats.receiver_count, 4);
        assert!((stats.connected_percentage - 75.0).abs() < 1e-12);
        assert_eq!(stats.mean_signal_dbm, Some(-75.0));
        assert_eq!(stats.min_signal_dbm, Some(-90.0));
        assert_eq!(stats.max_signal_dbm, Some(-60.0));
        assert_eq!(
            stats.quality,
            QualityHistogram {
                excellent: 1,
                good: 0,
                fair: 1,
                unrated: 1
            }
        );
    }

    #[test]
    fn empty_scene_has_no_nan() {
        let stats = ConnectionStatistics::compute(&[], 0, &ConnectionSettings::default());
        assert_eq!(stats.connected_percentage, 0.0);
        assert_eq!(stats.mean_signal_dbm, None);
        assert!(stats.to_string().starts_with("0/0"));
    }
}
