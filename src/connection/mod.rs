//! Connection decision engine.
//!
//! Turns per-link signal quality into a stable receiver → transmitter
//! assignment. Strategies are interchangeable policies over the same inputs;
//! the manager owns the association state and republishes statistics after
//! each pass.

pub mod associations;
pub mod manager;
pub mod settings;
pub mod statistics;
pub mod strategies;

pub use associations::Associations;
pub use manager::{ConnectionManager, PassReport, ReceiverSnapshot};
pub use settings::{ConnectionSettings, LinkQuality};
pub use statistics::{ConnectionStatistics, QualityHistogram};
pub use strategies::{Candidate, ConnectionStrategy, Decision, DecisionContext, StrategyKind};
