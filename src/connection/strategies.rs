//! Interchangeable association policies.
//!
//! Every strategy answers the same question for one receiver: given the
//! per-transmitter candidates computed this pass, which transmitter should
//! serve it? The manager applies the answer and handles bookkeeping.
//!
//! Shared rules:
//! - Only candidates with a finite signal at or above the usable threshold
//!   qualify. `NearestTransmitter` also accepts candidates with no link data.
//! - The current server's score gets the hysteresis bonus; a competitor must
//!   beat the boosted score strictly, so ties keep the current server.
//! - Remaining ties go to the lowest transmitter id.

use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;

use super::settings::ConnectionSettings;
use crate::propagation::types::{Receiver, TransmitterId};

/// One transmitter as seen from one receiver in the current pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub transmitter_id: TransmitterId,
    /// Received signal (dBm), `-inf` when there is no link.
    pub signal_dbm: f64,
    pub sinr_db: f64,
    pub distance_m: f64,
}

/// Inputs of a single receiver decision.
pub struct DecisionContext<'a> {
    pub receiver: &'a Receiver,
    /// One entry per transmitter, ordered by transmitter id.
    pub candidates: &'a [Candidate],
    /// Receivers already assigned per transmitter earlier in this pass.
    pub loads: &'a HashMap<TransmitterId, usize>,
}

impl DecisionContext<'_> {
    pub fn current(&self) -> Option<TransmitterId> {
        self.receiver.connected_transmitter
    }

    pub fn load(&self, transmitter: TransmitterId) -> usize {
        self.loads.get(&transmitter).copied().unwrap_or(0)
    }
}

/// Outcome of a decision for one receiver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decision {
    pub transmitter_id: Option<TransmitterId>,
    pub signal_dbm: f64,
    pub sinr_db: f64,
}

impl Decision {
    pub fn unconnected() -> Self {
        Self {
            transmitter_id: None,
            signal_dbm: f64::NEG_INFINITY,
            sinr_db: f64::NEG_INFINITY,
        }
    }

    fn serve(candidate: &Candidate) -> Self {
        Self {
            transmitter_id: Some(candidate.transmitter_id),
            signal_dbm: candidate.signal_dbm,
            sinr_db: candidate.sinr_db,
        }
    }
}

/// Decision policy shared by all strategy variants.
pub trait ConnectionStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    fn choose(&self, ctx: &DecisionContext<'_>, settings: &ConnectionSettings) -> Decision;
}

/// Pick the best-scoring qualifying candidate.
///
/// `threshold_dbm` of `None` disables the signal threshold.
fn select_best<'c>(
    ctx: &DecisionContext<'c>,
    threshold_dbm: Option<f64>,
    hysteresis: f64,
    eligible: impl Fn(&Candidate) -> bool,
    score: impl Fn(&Candidate) -> f64,
) -> Option<&'c Candidate> {
    let current = ctx.current();
    let mut best: Option<(&'c Candidate, f64)> = None;
    for candidate in ctx.candidates {
        if let Some(threshold) = threshold_dbm {
            if !candidate.signal_dbm.is_finite() || candidate.signal_dbm < threshold {
                continue;
            }
        }
        if !eligible(candidate) {
            continue;
        }
        let is_current = current == Some(candidate.transmitter_id);
        let mut effective = score(candidate);
        if effective.is_nan() {
            continue;
        }
        if is_current {
            effective += hysteresis;
        }
        let better = match best {
            None => true,
            Some((_, best_score)) => effective > best_score || (effective == best_score && is_current),
        };
        if better {
            best = Some((candidate, effective));
        }
    }
    best.map(|(candidate, _)| candidate)
}

/// Highest effective signal above threshold; no interference modeling.
pub struct StrongestSignal;

impl ConnectionStrategy for StrongestSignal {
    fn kind(&self) -> StrategyKind {
        StrategyKind::StrongestSignal
    }

    fn choose(&self, ctx: &DecisionContext<'_>, settings: &ConnectionSettings) -> Decision {
        let threshold = settings.usable_threshold_dbm(ctx.receiver.sensitivity_dbm);
        select_best(ctx, Some(threshold), settings.handover_margin_db, |_| true, |c| c.signal_dbm).map_or_else(Decision::unconnected, Decision::serve)
    }
}

/// Ranks usable candidates by SINR, so strong but heavily interfered servers lose.
pub struct BestServerWithInterference;

impl ConnectionStrategy for BestServerWithInterference {
    fn kind(&self) -> StrategyKind {
        StrategyKind::BestServerWithInterference
    }

    fn choose(&self, ctx: &DecisionContext<'_>, settings: &ConnectionSettings) -> Decision {
        let threshold = settings.usable_threshold_dbm(ctx.receiver.sensitivity_dbm);
        select_best(ctx, Some(threshold), settings.handover_margin_db, |_| true, |c| c.sinr_db).map_or_else(Decision::unconnected, Decision::serve)
    }
}

/// Signal minus a penalty per receiver the transmitter already serves this pass.
pub struct LoadBalanced;

impl ConnectionStrategy for LoadBalanced {
    fn kind(&self) -> StrategyKind {
        StrategyKind::LoadBalanced
    }

    fn choose(&self, ctx: &DecisionContext<'_>, settings: &ConnectionSettings) -> Decision {
        let threshold = settings.usable_threshold_dbm(ctx.receiver.sensitivity_dbm);
        let penalty = settings.load_penalty_db;
        select_best(ctx, Some(threshold), settings.handover_margin_db, |_| true, |c| c.signal_dbm - penalty * ctx.load(c.transmitter_id) as f64)
            .map_or_else(Decision::unconnected, Decision::serve)
    }
}

/// Only candidates above the minimum SINR qualify; strongest of those wins.
pub struct QualityFirst;

impl ConnectionStrategy for QualityFirst {
    fn kind(&self) -> StrategyKind {
        StrategyKind::QualityFirst
    }

    fn choose(&self, ctx: &DecisionContext<'_>, settings: &ConnectionSettings) -> Decision {
        let threshold = settings.usable_threshold_dbm(ctx.receiver.sensitivity_dbm);
        select_best(ctx, Some(threshold), settings.handover_margin_db, |c| c.sinr_db > settings.min_sinr_db, |c| c.signal_dbm)
            .map_or_else(Decision::unconnected, Decision::serve)
    }
}

/// Looser threshold and stickier hysteresis to keep receivers covered.
///
/// Accepted links report a nominal SINR of 0 dB.
pub struct EmergencyCoverage;

impl ConnectionStrategy for EmergencyCoverage {
    fn kind(&self) -> StrategyKind {
        StrategyKind::EmergencyCoverage
    }

    fn choose(&self, ctx: &DecisionContext<'_>, settings: &ConnectionSettings) -> Decision {
        let threshold = settings.usable_threshold_dbm(ctx.receiver.sensitivity_dbm) - settings.emergency_threshold_relief_db;
        let hysteresis = settings.handover_margin_db * settings.emergency_hysteresis_multiplier;
        match select_best(ctx, Some(threshold), hysteresis, |_| true, |c| c.signal_dbm) {
            Some(candidate) => Decision {
                sinr_db: 0.0,
                ..Decision::serve(candidate)
            },
            None => Decision::unconnected(),
        }
    }
}

/// Geometric fallback: closest transmitter wins.
///
/// Candidates without link data (`-inf` signal) rank by distance alone. A
/// computed link below the usable threshold still disqualifies its transmitter.
pub struct NearestTransmitter;

impl ConnectionStrategy for NearestTransmitter {
    fn kind(&self) -> StrategyKind {
        StrategyKind::NearestTransmitter
    }

    fn choose(&self, ctx: &DecisionContext<'_>, settings: &ConnectionSettings) -> Decision {
        let threshold = settings.usable_threshold_dbm(ctx.receiver.sensitivity_dbm);
        let eligible = |c: &Candidate| c.distance_m.is_finite() && (!c.signal_dbm.is_finite() || c.signal_dbm >= threshold);
        select_best(ctx, None, 0.0, eligible, |c| -c.distance_m).map_or_else(Decision::unconnected, Decision::serve)
    }
}

/// Strategy selector used by configuration and runtime switching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
pub enum StrategyKind {
    #[default]
    StrongestSignal,
    BestServerWithInterference,
    LoadBalanced,
    QualityFirst,
    EmergencyCoverage,
    NearestTransmitter,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 6] = [
        StrategyKind::StrongestSignal,
        StrategyKind::BestServerWithInterference,
        StrategyKind::LoadBalanced,
        StrategyKind::QualityFirst,
        StrategyKind::EmergencyCoverage,
        StrategyKind::NearestTransmitter,
    ];

    pub fn build(self) -> Box<dyn ConnectionStrategy> {
        match self {
            StrategyKind::StrongestSignal => Box::new(StrongestSignal),
            StrategyKind::BestServerWithInterference => Box::new(BestServerWithInterference),
            StrategyKind::LoadBalanced => Box::new(LoadBalanced),
            StrategyKind::QualityFirst => Box::new(QualityFirst),
            StrategyKind::EmergencyCoverage => Box::new(EmergencyCoverage),
            StrategyKind::NearestTransmitter => Box::new(NearestTransmitter),
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::propagation::types::Vec3;

    fn candidate(id: TransmitterId, signal_dbm: f64, sinr_db: f64, distance_m: f64) -> Candidate {
        Candidate {
            transmitter_id: id,
            signal_dbm,
            sinr_db,
            distance_m,
        }
    }

    fn receiver(connected: Option<TransmitterId>) -> Receiver {
        let mut rx = Receiver::new(100, Vec3::ZERO, -120.0);
        rx.connected_transmitter = connected;
        rx
    }

    fn decide(kind: StrategyKind, rx: &Receiver, candidates: &[Candidate], settings: &ConnectionSettings) -> Decision {
        let loads = HashMap::new();
        let ctx = DecisionContext { receiver: rx, candidates, loads: &loads };
        kind.build().choose(&ctx, settings)
    }

    #[test]
    fn hysteresis_keeps_current_server_on_margin_tie() {
        let settings = ConnectionSettings::default();
        let candidates = [candidate(1, -80.0, 3.0, 500.0), candidate(2, -83.0, 0.0, 400.0)];
        let d = decide(StrategyKind::StrongestSignal, &receiver(Some(2)), &candidates, &settings);
        assert_eq!(d.transmitter_id, Some(2));
        assert_eq!(d.signal_dbm, -83.0);

        // Beyond the margin the competitor wins
        let candidates = [candidate(1, -79.9, 3.0, 500.0), candidate(2, -83.0, 0.0, 400.0)];
        let d = decide(StrategyKind::StrongestSignal, &receiver(Some(2)), &candidates, &settings);
        assert_eq!(d.transmitter_id, Some(1));

        // Without a current server the stronger one wins outright
        let d = decide(StrategyKind::StrongestSignal, &receiver(None), &candidates, &settings);
        assert_eq!(d.transmitter_id, Some(1));
    }

    #[test]
    fn emergency_relaxes_threshold() {
        let settings = ConnectionSettings::default();
        let candidates = [candidate(1, -118.0, -5.0, 900.0)];
        let strongest = decide(StrategyKind::StrongestSignal, &receiver(None), &candidates, &settings);
        assert_eq!(strongest, Decision::unconnected());

        let emergency = decide(StrategyKind::EmergencyCoverage, &receiver(None), &candidates, &settings);
        assert_eq!(emergency.transmitter_id, Some(1));
        assert_eq!(emergency.sinr_db, 0.0);
        assert_eq!(emergency.signal_dbm, -118.0);
    }

    #[test]
    fn emergency_doubles_hysteresis() {
        let settings = ConnectionSettings::default();
        let candidates = [candidate(1, -90.0, 0.0, 0.0), candidate(2, -95.0, 0.0, 0.0)];
        let strongest = decide(StrategyKind::StrongestSignal, &receiver(Some(2)), &candidates, &settings);
        assert_eq!(strongest.transmitter_id, Some(1));
        let emergency = decide(StrategyKind::EmergencyCoverage, &receiver(Some(2)), &candidates, &settings);
        assert_eq!(emergency.transmitter_id, Some(2));
    }

    #[test]
    fn interference_aware_ranks_by_sinr() {
        let settings = ConnectionSettings::default();
        let candidates = [candidate(1, -70.0, -2.0, 100.0), candidate(2, -75.0, 8.0, 100.0)];
        assert_eq!(decide(StrategyKind::StrongestSignal, &receiver(None), &candidates, &settings).transmitter_id, Some(1));
        assert_eq!(decide(StrategyKind::BestServerWithInterference, &receiver(None), &candidates, &settings).transmitter_id, Some(2));
    }

    #[test]
    fn quality_first_requires_min_sinr() {
        let settings = ConnectionSettings {
            min_sinr_db: 5.0,
            ..ConnectionSettings::default()
        };
        let candidates = [candidate(1, -70.0, 2.0, 100.0), candidate(2, -90.0, 6.0, 100.0)];
        assert_eq!(decide(StrategyKind::QualityFirst, &receiver(None), &candidates, &settings).transmitter_id, Some(2));
        let poor = [candidate(1, -70.0, 2.0, 100.0)];
        assert_eq!(decide(StrategyKind::QualityFirst, &receiver(None), &poor, &settings), Decision::unconnected());
        // The minimum itself is not enough
        let borderline = [candidate(1, -70.0, 5.0, 100.0)];
        assert_eq!(decide(StrategyKind::QualityFirst, &receiver(None), &borderline, &settings), Decision::unconnected());
    }

    #[test]
    fn load_balanced_spreads_receivers() {
        let settings = ConnectionSettings::default();
        let candidates = [candidate(1, -80.0, 0.0, 100.0), candidate(2, -81.5, 0.0, 100.0)];
        let mut loads = HashMap::new();
        loads.insert(1, 2);
        let rx = receiver(None);
        let ctx = DecisionContext {
            receiver: &rx,
            candidates: &candidates,
            loads: &loads,
        };
        assert_eq!(LoadBalanced.choose(&ctx, &settings).transmitter_id, Some(2));
    }

    #[test]
    fn nearest_ranks_by_distance() {
        let settings = ConnectionSettings::default();
        let candidates = [candidate(1, -60.0, 10.0, 900.0), candidate(2, f64::NEG_INFINITY, f64::NEG_INFINITY, 50.0)];
        let d = decide(StrategyKind::NearestTransmitter, &receiver(None), &candidates, &settings);
        assert_eq!(d.transmitter_id, Some(2));
        assert_eq!(d.signal_dbm, f64::NEG_INFINITY);
    }

    #[test]
    fn nearest_skips_links_below_threshold() {
        let settings = ConnectionSettings::default();
        let weak = [candidate(1, -137.3, -20.0, 50.0)];
        let d = decide(StrategyKind::NearestTransmitter, &receiver(None), &weak, &settings);
        assert_eq!(d, Decision::unconnected());

        // The closest usable link wins over a closer one that is too weak
        let candidates = [candidate(1, -137.3, -20.0, 50.0), candidate(2, -95.0, 3.0, 800.0)];
        let d = decide(StrategyKind::NearestTransmitter, &receiver(Some(1)), &candidates, &settings);
        assert_eq!(d.transmitter_id, Some(2));
    }

    #[test]
    fn no_candidates_means_unconnected() {
        let settings = ConnectionSettings::default();
        for kind in StrategyKind::ALL {
            let d = decide(kind, &receiver(Some(3)), &[], &settings);
            assert_eq!(d, Decision::unconnected(), "{kind}");
            assert_eq!(kind.build().kind(), kind);
        }
    }

    #[test]
    fn ties_go_to_lowest_id() {
        let settings = ConnectionSettings::default();
        let candidates = [candidate(4, -90.0, 0.0, 10.0), candidate(9, -90.0, 0.0, 10.0)];
        assert_eq!(decide(StrategyKind::StrongestSignal, &receiver(None), &candidates, &settings).transmitter_id, Some(4));
    }
}
