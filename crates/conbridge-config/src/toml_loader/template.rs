//! Default TOML config template with inline documentation comments.

use crate::schema::CONFIG_SCHEMA_VERSION;

/// Generate the default TOML config content with comments.
pub(crate) fn default_config_toml() -> String {
    let body = r##"# Only override what you want to change -- missing fields use defaults.

[terminal]
# cols = 80              # 1-1000, overridden by WIN_PTY_COLS
# rows = 25              # 1-1000, overridden by WIN_PTY_ROWS
# console_mode = false   # plain-text agent output, empty stderr stream

[polling]
# read_interval_ms = 20     # 1-1000, sleep between data availability probes
# exit_interval_ms = 1000   # 10-60000, sleep between exit-status checks

[process]
# kill_on_destroy = true    # terminate the child before releasing the session

[logging]
# level = "INFO"         # DEBUG, INFO, WARNING, ERROR
"##;
    format!("# conbridge configuration\n# Schema version {CONFIG_SCHEMA_VERSION}\n{body}")
}
