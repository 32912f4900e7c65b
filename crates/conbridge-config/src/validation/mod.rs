//! Configuration validation.
//!
//! Checks every numeric range and collects all problems into a single
//! `ConfigError` so the user sees everything wrong at once.

mod helpers;


use crate::schema::BridgeConfig;
use conbridge_common::ConfigError;

use helpers::validate_range;

/// Run all validations on a config, collecting all errors.
pub fn validate(config: &BridgeConfig) -> Result<(), ConfigError> {
    let mut errors: Vec<String> = Vec::new();

    validate_terminal(&mut errors, config);
    validate_polling(&mut errors, config);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(errors.join("; ")))
    }
}

fn validate_terminal(errors: &mut Vec<String>, config: &BridgeConfig) {
    validate_range(errors, "terminal.cols", u32::from(config.terminal.cols), 1, 1000);
    validate_range(errors, "terminal.rows", u32::from(config.terminal.rows), 1, 1000);
}

fn validate_polling(errors: &mut Vec<String>, config: &BridgeConfig) {
    validate_range(
        errors,
        "polling.read_interval_ms",
        config.polling.read_interval_ms,
        1,
        1000,
    );
    validate_range(
        errors,
        "polling.exit_interval_ms",
        config.polling.exit_interval_ms,
        10,
        60_000,
    );
}
