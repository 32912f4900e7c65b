//! conbridge configuration system.
//!
//! TOML-based configuration for pseudo-console sessions: initial geometry,
//! console mode, polling intervals, process teardown and logging. All
//! sections use defaults so partial configs work out of the box.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use conbridge_config::{load_config, config_to_json};
//!
//! let config = load_config().expect("failed to load config");
//! let json = config_to_json(&config);
//! println!("{json}");
//! ```

pub mod overrides;
pub mod schema;
pub mod toml_loader;
pub mod validation;

// Re-export core types for convenience
pub use overrides::{apply_env_overrides, initial_size, ENV_COLS, ENV_ROWS};
pub use schema::{BridgeConfig, CONFIG_SCHEMA_VERSION};

use conbridge_common::ConfigError;
use std::path::Path;

/// Load config from the platform default path.
///
/// Loads `config.toml` from the OS config directory, creates a default
/// if none exists, applies environment overrides and validates the result.
pub fn load_config() -> Result<BridgeConfig, ConfigError> {
    let mut config = toml_loader::load_default()?;
    apply_env_overrides(&mut config);
    validation::validate(&config)?;
    Ok(config)
}

/// Load config from an explicit path, then apply environment overrides.
pub fn load_config_from(path: &Path) -> Result<BridgeConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.to_path_buf()));
    }
    let mut config = toml_loader::load_from_path(path)?;
    apply_env_overrides(&mut config);
    validation::validate(&config)?;
    Ok(config)
}

/// Serialize a config to a pretty-printed JSON string.
pub fn config_to_json(config: &BridgeConfig) -> String {
    serde_json::to_string_pretty(config)
        .unwrap_or_else(|e| format!("{{\"error\": \"failed to serialize config: {e}\"}}"))
}
