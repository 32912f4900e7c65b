use std::path::PathBuf;

use clap::Parser;

/// conbridge: run a command inside a pseudo-console and bridge its I/O to
/// this terminal's stdin and stdout.
#[derive(Parser, Debug)]
#[command(name = "conbridge", version, about)]
pub struct Args {
    /// Config file path override.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Log level override (debug, info, warn, error). `RUST_LOG` wins.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Working directory for the command.
    #[arg(short = 'd', long)]
    pub cwd: Option<PathBuf>,

    /// Set an environment variable for the command (repeatable).
    #[arg(short = 'e', long = "env", value_name = "KEY=VALUE", value_parser = parse_env_pair)]
    pub env: Vec<(String, String)>,

    /// Ask the agent for plain text output; enables the empty error stream.
    #[arg(long)]
    pub console_mode: bool,

    /// Initial width in columns.
    #[arg(long)]
    pub cols: Option<u16>,

    /// Initial height in rows.
    #[arg(long)]
    pub rows: Option<u16>,

    /// Print the effective configuration as JSON and exit.
    #[arg(long)]
    pub print_config: bool,

    /// Command and arguments, after `--`.
    #[arg(last = true, required_unless_present = "print_config")]
    pub command: Vec<String>,
}

fn parse_env_pair(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got {raw:?}")),
    }
}

pub fn parse() -> Args {
    Args::parse()
}
