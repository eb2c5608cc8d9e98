use std::path::Path;

use choreo_core::ChoreoConfig;

pub mod audit;
pub mod config;
pub mod patterns;
pub mod simulate;

/// Load the config from `path` when given, else from the default location.
pub fn load_config(path: Option<&Path>) -> Result<ChoreoConfig, Box<dyn std::error::Error>> {
    let config = match path {
        Some(path) => ChoreoConfig::load_from(path)?,
        None => ChoreoConfig::load()?,
    };
    Ok(config)
}
