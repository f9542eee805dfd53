//! Flat per-pair measurement rows taken from the connection manager.

use chrono::{DateTime, Utc};

use crate::connection::ConnectionManager;
use crate::propagation::types::{PropagationModel, ReceiverId, Technology, TransmitterId};

#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementRecord {
    pub recorded_at: DateTime<Utc>,
    pub scenario: String,
    pub tick: u32,
    pub model: PropagationModel,
    pub technology: Option<Technology>,
    pub transmitter_id: TransmitterId,
    pub receiver_id: ReceiverId,
    pub frequency_mhz: f64,
    pub tx_power_dbm: f64,
    pub distance_m: f64,
    pub line_of_sight: bool,
    pub path_loss_db: f64,
    pub signal_dbm: f64,
    pub sensitivity_dbm: f64,
    /// Serving transmitter of the receiver at the time of recording.
    pub connected_transmitter: Option<TransmitterId>,
    /// Only set on the row of the serving pair.
    pub sinr_db: Option<f64>,
}

/// Accumulates measurement rows over a run.
#[derive(Debug, Default)]
pub struct MeasurementRecorder {
    scenario: String,
    records: Vec<MeasurementRecord>,
}

impl MeasurementRecorder {
    pub fn new(scenario: impl Into<String>) -> Self {
        Self {
            scenario: scenario.into(),
            records: Vec::new(),
        }
    }

    pub fn scenario(&self) -> &str {
        &self.scenario
    }

    /// Snapshot every cached link of `manager`. Returns the number of rows added.
    pub fn record(&mut self, tick: u32, manager: &ConnectionManager) -> usize {
        let recorded_at = Utc::now();
        let before = self.records.len();
        for link in manager.links() {
            let (Some(tx), Some(rx)) = (manager.transmitter(link.transmitter_id), manager.receiver(link.receiver_id)) else {
                continue;
            };
            let serving = rx.connected_transmitter == Some(tx.id);
            self.records.push(MeasurementRecord {
                recorded_at,
                scenario: self.scenario.clone(),
                tick,
                model: link.model,
                technology: tx.technology,
                transmitter_id: tx.id,
                receiver_id: rx.id,
                frequency_mhz: tx.frequency_mhz,
                tx_power_dbm: tx.tx_power_dbm,
                distance_m: link.distance_m,
                line_of_sight: link.line_of_sight,
                path_loss_db: link.path_loss_db,
                signal_dbm: link.signal_dbm,
                sensitivity_dbm: rx.sensitivity_dbm,
                connected_transmitter: rx.connected_transmitter,
                sinr_db: serving.then_some(rx.sinr_db),
            });
        }
        self.records.len() - before
    }

    pub fn records(&self) -> &[MeasurementRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
