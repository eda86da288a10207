//! Converter drivers and output line ownership

pub mod dac;
pub mod line;
pub mod sim;

pub use dac::{ConversionState, Converter, DacDriver};
pub use line::{LineClaim, LineId, OutputLines};
pub use sim::{SimulatedDac, SimulatedOutput};
