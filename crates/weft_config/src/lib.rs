//! Parsing and validation of `weft.toml` simulation settings.
//!
//! A `weft.toml` file controls the delta-cycle guard, the optional run-time
//! limit, and waveform tracing. Every section is optional; an empty file
//! yields [`SimulationConfig::default`].

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod types;

pub use error::ConfigError;
pub use loader::{load_config, load_config_from_str, CONFIG_FILE_NAME};
pub use types::*;
