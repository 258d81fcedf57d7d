//! Binary support library for the automation engine service: configuration
//! loading, health-probe wiring, and startup composition. Kept separate
//! from `main.rs` so both the binary and this crate's own tests exercise
//! the same code path without spinning up a real process.

pub mod config;
pub mod health;
pub mod startup;

pub use config::{ConfigError, ServiceConfig};
pub use startup::{build_app_state, spawn_cleanup_sweep, StartupError};
