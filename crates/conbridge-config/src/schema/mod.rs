//! Configuration schema types for conbridge.
//!
//! All structs use `serde(default)` so partial configs work correctly.
//! Missing fields are filled with the defaults the bridge has always used.

mod polling;
mod process;
mod system;
mod terminal;

pub use polling::*;
pub use process::*;
pub use system::*;
pub use terminal::*;

use serde::{Deserialize, Serialize};

/// Current config schema version.
pub const CONFIG_SCHEMA_VERSION: u32 = 1;

/// Root configuration for conbridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct BridgeConfig {
    pub terminal: TerminalConfig,
    pub polling: PollingConfig,
    pub process: ProcessConfig,
    pub logging: LoggingConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_gives_defaults() {
        let config: BridgeConfig = toml::from_str("").unwrap();
        assert_eq!(config.terminal.cols, 80);
        assert_eq!(config.terminal.rows, 25);
        assert!(!config.terminal.console_mode);
        assert_eq!(config.polling.read_interval_ms, 20);
        assert_eq!(config.polling.exit_interval_ms, 1000);
        assert!(config.process.kill_on_destroy);
        assert_eq!(config.logging.level, LogLevel::Info);
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let config: BridgeConfig = toml::from_str(
            r#"
[terminal]
cols = 132
"#,
        )
        .unwrap();
        assert_eq!(config.terminal.cols, 132);
        assert_eq!(config.terminal.rows, 25);
        assert_eq!(config.polling.read_interval_ms, 20);
    }
}
