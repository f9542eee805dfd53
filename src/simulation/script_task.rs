use core::convert::Infallible;
use embassy_time::{Duration, Instant, Timer};
use log::{debug, info};

use super::types::{EngineCommand, EngineCommandSender};
use crate::common::scene::ScriptEvent;

/// Replays timed scene events into the command channel.
///
/// Events are sent in time order, each at `start + at_s`. Events scheduled
/// after `run_length` are dropped up front. Once the script is exhausted the
/// task idles forever, so racing it against the coverage task with `select`
/// always ends on the coverage side.
pub async fn script_task(mut events: Vec<ScriptEvent>, commands: EngineCommandSender<'_>, start: Instant, run_length: Duration) -> Infallible {
    events.sort_by(|a, b| a.at_s.total_cmp(&b.at_s));
    let total = events.len();
    events.retain(|e| Duration::from_micros((e.at_s.max(0.0) * 1_000_000.0) as u64) <= run_length);
    if events.len() < total {
        info!("{} scripted events fall after the end of the run and are ignored", total - events.len());
    }

    for event in events {
        let offset = Duration::from_micros((event.at_s.max(0.0) * 1_000_000.0) as u64);
        Timer::at(start + offset).await;
        debug!("Script event at {:.3}s: {:?}", event.at_s, event.action);
        commands.send(EngineCommand::from(event.action)).await;
    }

    core::future::pending::<Infallible>().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::config::RunnerConfig;
    use crate::common::scene::ScriptAction;
    use crate::connection::{ConnectionManager, ConnectionSettings, StrategyKind};
    use crate::export::MeasurementRecorder;
    use crate::propagation::engine::{PropagationEngine, PropagationSettings};
    use crate::propagation::types::{PropagationModel, Receiver, Transmitter, Vec3};
    use crate::simulation::coverage_task::coverage_task;
    use crate::simulation::types::EngineCommandChannel;
    use embassy_futures::block_on;
    use embassy_futures::select::{Either, select};

    #[test]
    fn scripted_events_reach_the_coverage_task() {
        let mut m = ConnectionManager::new(PropagationEngine::new(None, PropagationSettings::default()), ConnectionSettings::default(), StrategyKind::StrongestSignal);
        m.add_transmitter(Transmitter {
            id: 1,
            position: Vec3::new(0.0, 30.0, 0.0),
            tx_power_dbm: 43.0,
            antenna_gain_dbi: 0.0,
            frequency_mhz: 3500.0,
            model: PropagationModel::FreeSpace,
            technology: None,
        });
        m.add_receiver(Receiver::new(1, Vec3::new(100.0, 1.5, 0.0), -110.0));

        let config = RunnerConfig {
            update_frequency_hz: 100.0,
            ticks: 5,
            ..RunnerConfig::default()
        };
        let events = vec![
            ScriptEvent {
                at_s: 500.0,
                action: ScriptAction::SetStrategy { strategy: StrategyKind::LoadBalanced },
            },
            ScriptEvent {
                at_s: 0.01,
                action: ScriptAction::MoveReceiver { id: 1, position: Vec3::new(300.0, 1.5, 0.0) },
            },
            ScriptEvent {
                at_s: 0.0,
                action: ScriptAction::SetStrategy { strategy: StrategyKind::EmergencyCoverage },
            },
        ];

        let channel = EngineCommandChannel::new();
        let mut recorder = MeasurementRecorder::new("script");
        let start = Instant::now();
        let summary = block_on(async {
            match select(
                coverage_task(&mut m, channel.receiver(), &config, &mut recorder),
                script_task(events, channel.sender(), start, config.run_length()),
            )
            .await
            {
                Either::First(summary) => summary,
                Either::Second(never) => match never {},
            }
        });

        assert_eq!(summary.ticks, 5);
        assert_eq!(summary.commands, 2);
        assert_eq!(m.strategy(), StrategyKind::EmergencyCoverage);
        assert_eq!(m.receiver(1).unwrap().position, Vec3::new(300.0, 1.5, 0.0));
    }
}
