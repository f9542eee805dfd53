//! Headless run loop.
//!
//! Two cooperative tasks share one command channel:
//! - `coverage_task` owns the `ConnectionManager`, runs a decision pass at the
//!   configured update frequency and applies queued commands between ticks.
//! - `script_task` replays the scene's timed events (moves, strategy
//!   switches) into the channel.
//!
//! Both are plain futures driven by `embassy_futures::block_on`; time comes
//! from the crate's scaled embassy-time driver.

pub mod coverage_task;
pub mod script_task;
pub mod types;

pub use coverage_task::{RunSummary, coverage_task};
pub use script_task::script_task;
pub use types::{EngineCommand, EngineCommandChannel, EngineCommandReceiver, EngineCommandSender};
