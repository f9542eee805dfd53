//! Connection manager: link cache, decision passes and association state.
//!
//! A pass has two phases:
//! 1) Refresh: every (transmitter, receiver) pair missing from the link cache
//!    is evaluated by the propagation engine, in parallel on the rayon pool.
//!    All results are collected before anything else happens.
//! 2) Decide: receivers are visited sequentially in id order; the active
//!    strategy picks a server for each and the manager applies the outcome,
//!    explicitly releasing the receiver from every other transmitter.
//!
//! Moving an entity only drops that entity's cached pairs and runs an
//! immediate pass, so unaffected links are never recomputed.

use log::{debug, info, trace};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rayon::prelude::*;
use std::collections::HashMap;

use super::associations::Associations;
use super::settings::{ConnectionSettings, LinkQuality};
use super::statistics::ConnectionStatistics;
use super::strategies::{Candidate, ConnectionStrategy, DecisionContext, StrategyKind};
use crate::common::units::dbm_to_mw;
use crate::propagation::engine::{LinkMeasurement, PropagationEngine};
use crate::propagation::types::{Receiver, ReceiverId, Transmitter, TransmitterId, Vec3};

/// Outbound per-receiver state for display and export collaborators.
#[derive(Debug, Clone, PartialEq)]
pub struct ReceiverSnapshot {
    pub receiver_id: ReceiverId,
    pub connected_transmitter: Option<TransmitterId>,
    pub signal_dbm: f64,
    pub sinr_db: f64,
    pub quality: Option<LinkQuality>,
}

/// What changed during one decision pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PassReport {
    pub statistics: ConnectionStatistics,
    /// Links evaluated by the propagation engine during this pass.
    pub recomputed_links: usize,
    /// Receivers that moved from one server to another.
    pub handovers: usize,
    /// Receivers that went from unconnected to connected.
    pub attached: usize,
    /// Receivers that lost their server.
    pub detached: usize,
}

pub struct ConnectionManager {
    engine: PropagationEngine,
    settings: ConnectionSettings,
    strategy: Box<dyn ConnectionStrategy>,
    /// Ordered by id.
    transmitters: Vec<Transmitter>,
    /// Ordered by id.
    receivers: Vec<Receiver>,
    links: HashMap<(TransmitterId, ReceiverId), LinkMeasurement>,
    associations: Associations,
    statistics: ConnectionStatistics,
    shadowing_seed: u64,
    /// Bumped on every invalidation so recomputed pairs draw fresh shadowing.
    generation: u64,
}

/// Derive a per-pair RNG seed, independent of evaluation order.
fn pair_seed(seed: u64, tx: TransmitterId, rx: ReceiverId, generation: u64) -> u64 {
    // splitmix64 finalizer
    let mut z = seed ^ ((tx as u64) << 32 | rx as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15) ^ generation.rotate_left(29);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

fn sinr_db(signal_mw: f64, interference_mw: f64) -> f64 {
    if !(signal_mw > 0.0) {
        return f64::NEG_INFINITY;
    }
    if !(interference_mw > 0.0) {
        return f64::INFINITY;
    }
    10.0 * (signal_mw / interference_mw).log10()
}

impl ConnectionManager {
    pub fn new(engine: PropagationEngine, settings: ConnectionSettings, strategy: StrategyKind) -> Self {
        Self {
            engine,
            settings,
            strategy: strategy.build(),
            transmitters: Vec::new(),
            receivers: Vec::new(),
            links: HashMap::new(),
            associations: Associations::new(),
            statistics: ConnectionStatistics::default(),
            shadowing_seed: 0,
            generation: 0,
        }
    }

    /// Seed for the shadowing samples of the stochastic model variant.
    pub fn with_shadowing_seed(mut self, seed: u64) -> Self {
        self.shadowing_seed = seed;
        self.links.clear();
        self
    }

    pub fn engine(&self) -> &PropagationEngine {
        &self.engine
    }

    pub fn settings(&self) -> &ConnectionSettings {
        &self.settings
    }

    pub fn strategy(&self) -> StrategyKind {
        self.strategy.kind()
    }

    pub fn transmitters(&self) -> &[Transmitter] {
        &self.transmitters
    }

    pub fn receivers(&self) -> &[Receiver] {
        &self.receivers
    }

    pub fn transmitter(&self, id: TransmitterId) -> Option<&Transmitter> {
        self.transmitters.iter().find(|t| t.id == id)
    }

    pub fn receiver(&self, id: ReceiverId) -> Option<&Receiver> {
        self.receivers.iter().find(|r| r.id == id)
    }

    pub fn associations(&self) -> &Associations {
        &self.associations
    }

    /// Statistics of the last completed pass.
    pub fn statistics(&self) -> &ConnectionStatistics {
        &self.statistics
    }

    pub fn link(&self, transmitter: TransmitterId, receiver: ReceiverId) -> Option<&LinkMeasurement> {
        self.links.get(&(transmitter, receiver))
    }

    /// Cached link measurements ordered by (transmitter, receiver).
    pub fn links(&self) -> Vec<&LinkMeasurement> {
        let mut links: Vec<&LinkMeasurement> = self.links.values().collect();
        links.sort_by_key(|l| (l.transmitter_id, l.receiver_id));
        links
    }

    pub fn snapshots(&self) -> Vec<ReceiverSnapshot> {
        self.receivers
            .iter()
            .map(|rx| ReceiverSnapshot {
                receiver_id: rx.id,
                connected_transmitter: rx.connected_transmitter,
                signal_dbm: rx.signal_dbm,
                sinr_db: rx.sinr_db,
                quality: if rx.is_connected() { self.settings.quality(rx.signal_dbm) } else { None },
            })
            .collect()
    }

    /// Register a transmitter. Returns `false` if the id is already taken.
    pub fn add_transmitter(&mut self, transmitter: Transmitter) -> bool {
        match self.transmitters.binary_search_by_key(&transmitter.id, |t| t.id) {
            Ok(_) => false,
            Err(index) => {
                self.transmitters.insert(index, transmitter);
                true
            }
        }
    }

    /// Register a receiver. Its association fields are reset.
    pub fn add_receiver(&mut self, mut receiver: Receiver) -> bool {
        match self.receivers.binary_search_by_key(&receiver.id, |r| r.id) {
            Ok(_) => false,
            Err(index) => {
                receiver.connected_transmitter = None;
                receiver.signal_dbm = f64::NEG_INFINITY;
                receiver.sinr_db = f64::NEG_INFINITY;
                self.receivers.insert(index, receiver);
                true
            }
        }
    }

    /// Remove a transmitter and reassign the receivers it was serving.
    pub fn remove_transmitter(&mut self, id: TransmitterId) -> Option<PassReport> {
        let index = self.transmitters.iter().position(|t| t.id == id)?;
        self.transmitters.remove(index);
        self.links.retain(|(tx, _), _| *tx != id);
        for orphan in self.associations.remove_transmitter(id) {
            if let Some(rx) = self.receivers.iter_mut().find(|r| r.id == orphan) {
                rx.connected_transmitter = None;
                rx.signal_dbm = f64::NEG_INFINITY;
                rx.sinr_db = f64::NEG_INFINITY;
            }
        }
        info!("Transmitter {} removed", id);
        Some(self.update_connections())
    }

    pub fn remove_receiver(&mut self, id: ReceiverId) -> Option<Receiver> {
        let index = self.receivers.iter().position(|r| r.id == id)?;
        self.links.retain(|(_, rx), _| *rx != id);
        self.associations.remove_receiver(id);
        let removed = self.receivers.remove(index);
        self.statistics = ConnectionStatistics::compute(&self.receivers, self.transmitters.len(), &self.settings);
        Some(removed)
    }

    /// Drop cached pairs of one transmitter.
    pub fn invalidate_transmitter(&mut self, id: TransmitterId) {
        self.generation = self.generation.wrapping_add(1);
        self.links.retain(|(tx, _), _| *tx != id);
    }

    /// Drop cached pairs of one receiver.
    pub fn invalidate_receiver(&mut self, id: ReceiverId) {
        self.generation = self.generation.wrapping_add(1);
        self.links.retain(|(_, rx), _| *rx != id);
    }

    pub fn invalidate_all(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        self.links.clear();
    }

    /// Move a transmitter and re-evaluate right away.
    ///
    /// Returns `None` for an unknown id.
    pub fn move_transmitter(&mut self, id: TransmitterId, position: Vec3) -> Option<PassReport> {
        let tx = self.transmitters.iter_mut().find(|t| t.id == id)?;
        tx.position = position;
        self.invalidate_transmitter(id);
        Some(self.update_connections())
    }

    /// Move a receiver and re-evaluate right away.
    pub fn move_receiver(&mut self, id: ReceiverId, position: Vec3) -> Option<PassReport> {
        let rx = self.receivers.iter_mut().find(|r| r.id == id)?;
        rx.position = position;
        self.invalidate_receiver(id);
        Some(self.update_connections())
    }

    /// Switch the decision policy; the new one is applied immediately.
    pub fn set_strategy(&mut self, kind: StrategyKind) -> PassReport {
        if kind != self.strategy.kind() {
            info!("Connection strategy changed: {} -> {}", self.strategy.kind(), kind);
            self.strategy = kind.build();
        }
        self.update_connections()
    }

    /// Replace thresholds and margins; the new values are applied immediately.
    pub fn set_settings(&mut self, settings: ConnectionSettings) -> PassReport {
        self.settings = settings;
        self.update_connections()
    }

    /// Full pass: refresh stale links, then decide every receiver.
    pub fn update_connections(&mut self) -> PassReport {
        let recomputed_links = self.refresh_links();
        let mut report = self.decide();
        report.recomputed_links = recomputed_links;
        report
    }

    fn refresh_links(&mut self) -> usize {
        let engine = &self.engine;
        let transmitters = &self.transmitters;
        let receivers = &self.receivers;
        let cached = &self.links;
        let missing: Vec<(usize, usize)> = transmitters
            .iter()
            .enumerate()
            .flat_map(|(ti, tx)| receivers.iter().enumerate().filter(move |(_, rx)| !cached.contains_key(&(tx.id, rx.id))).map(move |(ri, _)| (ti, ri)))
            .collect();
        if missing.is_empty() {
            return 0;
        }

        let seed = self.shadowing_seed;
        let generation = self.generation;
        let computed: Vec<LinkMeasurement> = missing
            .par_iter()
            .map(|&(ti, ri)| {
                let tx = &transmitters[ti];
                let rx = &receivers[ri];
                let mut rng = StdRng::seed_from_u64(pair_seed(seed, tx.id, rx.id, generation));
                engine.evaluate_link(tx, rx, &mut rng)
            })
            .collect();

        let count = computed.len();
        for link in computed {
            trace!(
                "link tx {} -> rx {}: {:.1} dB loss, {:.1} dBm ({})",
                link.transmitter_id, link.receiver_id, link.path_loss_db, link.signal_dbm, link.model
            );
            self.links.insert((link.transmitter_id, link.receiver_id), link);
        }
        debug!("Evaluated {} links", count);
        count
    }

    /// Per-transmitter candidates for one receiver, with SINR against all other
    /// transmitters plus the noise floor.
    fn candidates(&self, rx: &Receiver) -> Vec<Candidate> {
        let noise_mw = match dbm_to_mw(self.settings.noise_floor_dbm) {
            mw if mw.is_finite() => mw,
            _ => 0.0,
        };
        let signals: Vec<(TransmitterId, f64, f64)> = self
            .transmitters
            .iter()
            .map(|tx| {
                let link = self.links.get(&(tx.id, rx.id));
                let signal = link.map_or(f64::NEG_INFINITY, |l| if l.signal_dbm.is_nan() { f64::NEG_INFINITY } else { l.signal_dbm });
                let distance = link.map_or_else(|| tx.position.distance(&rx.position), |l| l.distance_m);
                (tx.id, signal, distance)
            })
            .collect();
        let total_mw: f64 = signals.iter().map(|(_, s, _)| dbm_to_mw(*s)).sum();

        signals
            .into_iter()
            .map(|(transmitter_id, signal_dbm, distance_m)| {
                let own = dbm_to_mw(signal_dbm);
                let interference = (total_mw - own).max(0.0) + noise_mw;
                Candidate {
                    transmitter_id,
                    signal_dbm,
                    sinr_db: sinr_db(own, interference),
                    distance_m,
                }
            })
            .collect()
    }

    fn decide(&mut self) -> PassReport {
        let transmitter_ids: Vec<TransmitterId> = self.transmitters.iter().map(|t| t.id).collect();
        let mut loads: HashMap<TransmitterId, usize> = HashMap::new();
        let mut report = PassReport::default();

        for index in 0..self.receivers.len() {
            let candidates = self.candidates(&self.receivers[index]);
            let decision = {
                let ctx = DecisionContext {
                    receiver: &self.receivers[index],
                    candidates: &candidates,
                    loads: &loads,
                };
                self.strategy.choose(&ctx, &self.settings)
            };

            let rx = &mut self.receivers[index];
            let previous = rx.connected_transmitter;
            if let Some(server) = decision.transmitter_id {
                self.associations.connect(rx.id, server);
                *loads.entry(server).or_insert(0) += 1;
            }
            let released = self.associations.release_all_except(rx.id, decision.transmitter_id, transmitter_ids.iter().copied());
            if released > 0 {
                trace!("receiver {} released by {} transmitter(s)", rx.id, released);
            }

            match (previous, decision.transmitter_id) {
                (Some(from), Some(to)) if from != to => {
                    report.handovers += 1;
                    debug!("Receiver {} handed over: transmitter {} -> {}", rx.id, from, to);
                }
                (None, Some(to)) => {
                    report.attached += 1;
                    debug!("Receiver {} connected to transmitter {}", rx.id, to);
                }
                (Some(from), None) => {
                    report.detached += 1;
                    debug!("Receiver {} lost transmitter {}", rx.id, from);
                }
                _ => {}
            }

            rx.connected_transmitter = decision.transmitter_id;
            rx.signal_dbm = if decision.signal_dbm.is_nan() { f64::NEG_INFINITY } else { decision.signal_dbm };
            rx.sinr_db = if decision.sinr_db.is_nan() { f64::NEG_INFINITY } else { decision.sinr_db };
        }

        self.statistics = ConnectionStatistics::compute(&self.receivers, self.transmitters.len(), &self.settings);
        report.statistics = self.statistics.clone();
        report
    }
}
