//! Turning parsed arguments and config into a spawn request.

use conbridge_config::BridgeConfig;
use conbridge_pty::PtyCommand;

use crate::cli::Args;

/// Fold command-line overrides into the loaded config.
pub fn apply_args(config: &mut BridgeConfig, args: &Args) {
    if let Some(cols) = args.cols {
        config.terminal.cols = cols;
    }
    if let Some(rows) = args.rows {
        config.terminal.rows = rows;
    }
    if args.console_mode {
        config.terminal.console_mode = true;
    }
}

/// Host environment with `overrides` applied. Replaced keys keep their
/// position; new keys are appended in the order given.
pub fn merge_env(
    host: impl IntoIterator<Item = (String, String)>,
    overrides: &[(String, String)],
) -> Vec<(String, String)> {
    let mut vars: Vec<(String, String)> = host.into_iter().collect();
    for (key, value) in overrides {
        match vars.iter_mut().find(|(k, _)| k == key) {
            Some(slot) => slot.1 = value.clone(),
            None => vars.push((key.clone(), value.clone())),
        }
    }
    vars
}

pub fn build(args: &Args, config: &BridgeConfig) -> PtyCommand {
    let mut command = PtyCommand::new(args.command.iter().cloned())
        .console_mode(config.terminal.console_mode);

    // Only pin the size when asked; otherwise the session resolves it from
    // config plus WIN_PTY_COLS / WIN_PTY_ROWS.
    if args.cols.is_some() || args.rows.is_some() {
        command = command.size(config.terminal.cols, config.terminal.rows);
    }
    if let Some(dir) = &args.cwd {
        command = command.cwd(dir);
    }
    if !args.env.is_empty() {
        command = command.envs(merge_env(std::env::vars(), &args.env));
    }
    command
}
