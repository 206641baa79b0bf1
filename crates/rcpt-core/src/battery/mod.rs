//! Battery fuel gauge sampling and low-battery shutdown.
//!
//! A [`BatteryController`] reads a [`FuelGauge`] on a fixed period, maps
//! voltage to a charge percentage, and drives a [`BatteryMonitor`] through
//! Sampling, LowWarning, ShutdownPending and Shutdown. Threshold crossings
//! are debounced over consecutive readings.

mod charge;
mod controller;
mod gauge;
mod log;
mod shutdown;
mod state;

pub use charge::ChargeModel;
pub use controller::{BatteryController, TickReport};
pub use gauge::{DiscoveringFuelGauge, FuelGauge, GaugeSample, HwmonFuelGauge};
pub use log::{JsonLinesLog, ReadingLog, ReadingRecord};
pub use shutdown::{CommandShutdown, ShutdownCommand};
pub use state::{Action, BatteryMonitor, BatteryState, Thresholds};
