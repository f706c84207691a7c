//! Domain types for portsim.

pub mod bar;
pub mod equity;
pub mod ids;
pub mod portfolio;
pub mod position;
pub mod signal;
pub mod trade;

pub use bar::{Bar, SignalFlag};
pub use equity::EquityPoint;
pub use ids::{ConfigHash, DatasetHash, RunId};
pub use portfolio::PortfolioState;
pub use position::Position;
pub use signal::{is_valid_atr, Direction, Signal, SkipReason, SkippedSignal};
pub use trade::{ExitReason, Trade};
