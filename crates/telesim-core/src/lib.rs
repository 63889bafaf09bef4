//! Telesim Core - device model for the telemetry fleet simulator
//!
//! This crate holds the synchronous, I/O-free part of a simulated device:
//! - `DeviceConfig`: immutable description of one device (identity, range, cadence)
//! - `DeviceState`: the last accepted reading, owned by exactly one device
//! - `RandomSource`: injectable randomness (entropy-backed or scripted)
//! - `ReadingGenerator`: produces raw readings, including sensor glitches
//! - `OutlierFilter`: rejects out-of-range readings and picks the value to transmit

pub mod error;
pub mod filter;
pub mod generator;
pub mod random;
pub mod types;

pub use error::{CoreError, Result};
pub use filter::{round2, FilterOutcome, OutlierFilter};
pub use generator::ReadingGenerator;
pub use random::{RandomSource, ScriptedRandom, StdRandom};
pub use types::*;
