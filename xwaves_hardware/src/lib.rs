//! Device backends for the delay-scan engine.
//!
//! Real instrument protocol framing lives outside this workspace; what ships
//! here is the simulated stage/lock-in pair, the hardware error type, the
//! instrument range tables, and the optical unit conversions.
pub mod error;
pub mod ranges;
pub mod sim;
pub mod units;
pub mod util;

pub use error::HwError;
pub use sim::{simulated_pair, SimSignal, SimStageCfg, SimulatedLockIn, SimulatedStage};
