//! Configuration file loading and validation.

use crate::error::ConfigError;
use crate::types::SimulationConfig;
use std::path::Path;

/// File name looked up by [`load_config`].
pub const CONFIG_FILE_NAME: &str = "weft.toml";

/// Loads and validates `<dir>/weft.toml`.
pub fn load_config(dir: &Path) -> Result<SimulationConfig, ConfigError> {
    let content = std::fs::read_to_string(dir.join(CONFIG_FILE_NAME))?;
    load_config_from_str(&content)
}

/// Parses and validates configuration text.
pub fn load_config_from_str(content: &str) -> Result<SimulationConfig, ConfigError> {
    let config: SimulationConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

fn validate_config(config: &SimulationConfig) -> Result<(), ConfigError> {
    if config.simulation.max_deltas_per_step == 0 {
        return Err(ConfigError::ValidationError(
            "simulation.max_deltas_per_step must be positive".to_string(),
        ));
    }
    if config.trace.enabled && config.trace.path.is_none() {
        return Err(ConfigError::MissingField("trace.path".to_string()));
    }
    Ok(())
}
