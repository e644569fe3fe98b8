/// printload library - exposes the workflow stages and load driver for testing and reuse.
pub mod config;
pub mod error;
pub mod http;
pub mod models;
pub mod output;
pub mod simulator;
pub mod workflow;
