//! Commands and channels shared by the simulation tasks.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;

use crate::common::scene::ScriptAction;
use crate::connection::StrategyKind;
use crate::propagation::types::{ReceiverId, TransmitterId, Vec3};

/// Out-of-band requests applied by the coverage task between ticks.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCommand {
    MoveTransmitter(TransmitterId, Vec3),
    MoveReceiver(ReceiverId, Vec3),
    SetStrategy(StrategyKind),
    /// Stop the run after recording the current state.
    Shutdown,
}

impl From<ScriptAction> for EngineCommand {
    fn from(action: ScriptAction) -> Self {
        match action {
            ScriptAction::MoveTransmitter { id, position } => EngineCommand::MoveTransmitter(id, position),
            ScriptAction::MoveReceiver { id, position } => EngineCommand::MoveReceiver(id, position),
            ScriptAction::SetStrategy { strategy } => EngineCommand::SetStrategy(strategy),
        }
    }
}

/// Depth of the command channel. Small so a runaway producer blocks instead
/// of buffering without bound.
pub const ENGINE_COMMAND_CHANNEL_SIZE: usize = 32;
pub type EngineCommandChannel = embassy_sync::channel::Channel<CriticalSectionRawMutex, EngineCommand, ENGINE_COMMAND_CHANNEL_SIZE>;
pub type EngineCommandReceiver<'a> = embassy_sync::channel::Receiver<'a, CriticalSectionRawMutex, EngineCommand, ENGINE_COMMAND_CHANNEL_SIZE>;
pub type EngineCommandSender<'a> = embassy_sync::channel::Sender<'a, CriticalSectionRawMutex, EngineCommand, ENGINE_COMMAND_CHANNEL_SIZE>;
