#![allow(clippy::module_inception)]
/// Load driver for simulated print shop consumers.
pub mod action;
pub mod config;
pub mod simulator;

pub use action::{Action, ActionWeights};
pub use config::{SimulatorConfig, ThinkTime};
pub use simulator::{ActionResult, Simulator, StopHandle};
