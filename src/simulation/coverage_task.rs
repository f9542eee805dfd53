use chrono::{DateTime, Utc};
use embassy_futures::select::{Either, select};
use embassy_time::{Instant, Timer};
use log::{debug, info, warn};

use super::types::{EngineCommand, EngineCommandReceiver};
use crate::common::config::RunnerConfig;
use crate::connection::{ConnectionManager, ConnectionStatistics, PassReport};
use crate::export::MeasurementRecorder;

/// Outcome of a coverage run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Periodic decision passes that ran.
    pub ticks: u32,
    /// Commands applied between ticks.
    pub commands: usize,
    pub handovers: usize,
    /// True when the run ended on a `Shutdown` command.
    pub shutdown: bool,
    pub final_statistics: ConnectionStatistics,
}

fn apply_command(manager: &mut ConnectionManager, command: EngineCommand) -> Option<PassReport> {
    match command {
        EngineCommand::MoveTransmitter(id, position) => {
            let report = manager.move_transmitter(id, position);
            if report.is_none() {
                warn!("Move requested for unknown transmitter {}", id);
            }
            report
        }
        EngineCommand::MoveReceiver(id, position) => {
            let report = manager.move_receiver(id, position);
            if report.is_none() {
                warn!("Move requested for unknown receiver {}", id);
            }
            report
        }
        EngineCommand::SetStrategy(kind) => Some(manager.set_strategy(kind)),
        EngineCommand::Shutdown => None,
    }
}

/// Single writer of the connection state.
///
/// Each loop iteration waits for either a queued command or the next tick
/// deadline. Commands are applied as they arrive and trigger their own pass;
/// ticks run a full pass. Commands win when both are ready, so a pass and an
/// out-of-band recompute never interleave. The first tick fires immediately.
///
/// Measurements go to `recorder` on every tick when
/// `config.export.record_every_tick` is set, and always for the final state.
pub async fn coverage_task(
    manager: &mut ConnectionManager,
    commands: EngineCommandReceiver<'_>,
    config: &RunnerConfig,
    recorder: &mut MeasurementRecorder,
) -> RunSummary {
    let started_at = Utc::now();
    let period = config.tick_period();
    let mut next_tick = Instant::now();
    let mut ticks = 0u32;
    let mut applied = 0usize;
    let mut handovers = 0usize;
    let mut shutdown = false;
    let mut last_recorded: Option<u32> = None;

    info!(
        "Coverage run started: {} transmitters, {} receivers, strategy {}, {} ticks every {} ms",
        manager.transmitters().len(),
        manager.receivers().len(),
        manager.strategy(),
        config.ticks,
        period.as_millis()
    );

    loop {
        match select(commands.receive(), Timer::at(next_tick)).await {
            Either::First(EngineCommand::Shutdown) => {
                info!("Shutdown requested after {} ticks", ticks);
                shutdown = true;
                break;
            }
            Either::First(command) => {
                debug!("Applying {:?}", command);
                if let Some(report) = apply_command(manager, command) {
                    applied += 1;
                    handovers += report.handovers;
                    debug!("Out-of-band pass: {} links recomputed, {}", report.recomputed_links, report.statistics);
                }
            }
            Either::Second(()) => {
                ticks += 1;
                let report = manager.update_connections();
                handovers += report.handovers;
                info!("Tick {}: {}", ticks, report.statistics);
                if report.handovers + report.attached + report.detached > 0 {
                    debug!(
                        "Tick {}: {} handovers, {} attached, {} detached",
                        ticks, report.handovers, report.attached, report.detached
                    );
                }

                let last = ticks >= config.ticks;
                if config.export.record_every_tick || last {
                    recorder.record(ticks, manager);
                    last_recorded = Some(ticks);
                }
                if last {
                    break;
                }

                next_tick += period;
                // Skip missed deadlines instead of bursting to catch up.
                let now = Instant::now();
                if next_tick < now {
                    next_tick = now;
                }
            }
        }
    }

    if last_recorded != Some(ticks) {
        recorder.record(ticks, manager);
    }

    RunSummary {
        started_at,
        finished_at: Utc::now(),
        ticks,
        commands: applied,
        handovers,
        shutdown,
        final_statistics: manager.statistics().clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{ConnectionSettings, StrategyKind};
    use crate::propagation::engine::{PropagationEngine, PropagationSettings};
    use crate::propagation::types::{PropagationModel, Receiver, Transmitter, Vec3};
    use crate::simulation::types::EngineCommandChannel;
    use embassy_futures::block_on;

    fn manager() -> ConnectionManager {
        let mut m = ConnectionManager::new(PropagationEngine::new(None, PropagationSettings::default()), ConnectionSettings::default(), StrategyKind::StrongestSignal);
        for (id, x) in [(1, 0.0), (2, 2000.0)] {
            m.add_transmitter(Transmitter {
                id,
                position: Vec3::new(x, 30.0, 0.0),
                tx_power_dbm: 43.0,
                antenna_gain_dbi: 0.0,
                frequency_mhz: 700.0,
                model: PropagationModel::FreeSpace,
                technology: None,
            });
        }
        m.add_receiver(Receiver::new(10, Vec3::new(100.0, 1.5, 0.0), -110.0));
        m.add_receiver(Receiver::new(11, Vec3::new(1900.0, 1.5, 0.0), -110.0));
        m
    }

    fn fast_config(ticks: u32) -> RunnerConfig {
        RunnerConfig {
            update_frequency_hz: 200.0,
            ticks,
            ..RunnerConfig::default()
        }
    }

    #[test]
    fn runs_the_configured_number_of_ticks() {
        let mut m = manager();
        let channel = EngineCommandChannel::new();
        let mut recorder = MeasurementRecorder::new("ticks");
        let summary = block_on(coverage_task(&mut m, channel.receiver(), &fast_config(3), &mut recorder));
        assert_eq!(summary.ticks, 3);
        assert!(!summary.shutdown);
        assert_eq!(summary.final_statistics.connected_count, 2);
        // Only the final state is recorded by default.
        assert_eq!(recorder.len(), 4);
        assert!(recorder.records().iter().all(|r| r.tick == 3));
    }

    #[test]
    fn records_every_tick_when_asked() {
        let mut m = manager();
        let channel = EngineCommandChannel::new();
        let mut recorder = MeasurementRecorder::new("every");
        let mut config = fast_config(2);
        config.export.record_every_tick = true;
        block_on(coverage_task(&mut m, channel.receiver(), &config, &mut recorder));
        assert_eq!(recorder.len(), 8);
    }

    #[test]
    fn queued_commands_apply_before_the_first_tick() {
        let mut m = manager();
        let channel = EngineCommandChannel::new();
        channel.try_send(EngineCommand::SetStrategy(StrategyKind::NearestTransmitter)).unwrap();
        channel.try_send(EngineCommand::MoveReceiver(11, Vec3::new(50.0, 1.5, 0.0))).unwrap();
        channel.try_send(EngineCommand::MoveReceiver(99, Vec3::ZERO)).unwrap();
        let mut recorder = MeasurementRecorder::new("cmds");
        let summary = block_on(coverage_task(&mut m, channel.receiver(), &fast_config(1), &mut recorder));
        assert_eq!(summary.commands, 2);
        assert_eq!(summary.handovers, 1);
        assert_eq!(m.strategy(), StrategyKind::NearestTransmitter);
        assert_eq!(m.receiver(11).unwrap().connected_transmitter, Some(1));
    }

    #[test]
    fn shutdown_records_the_current_state() {
        let mut m = manager();
        let channel = EngineCommandChannel::new();
        channel.try_send(EngineCommand::MoveReceiver(10, Vec3::new(200.0, 1.5, 0.0))).unwrap();
        channel.try_send(EngineCommand::Shutdown).unwrap();
        let mut recorder = MeasurementRecorder::new("stop");
        let summary = block_on(coverage_task(&mut m, channel.receiver(), &fast_config(100), &mut recorder));
        assert!(summary.shutdown);
        assert_eq!(summary.ticks, 0);
        assert_eq!(recorder.len(), 4);
        assert!(recorder.records().iter().all(|r| r.tick == 0));
    }
}
