mod cli;
mod command;
mod pump;

use std::process::ExitCode;
use std::time::Duration;

use conbridge_common::{ConbridgeError, ConfigError};
use conbridge_config::BridgeConfig;
use conbridge_pty::{BridgeError, BridgeOptions, ProcessBridge};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// How long the child's last output may take to reach our stdout.
const OUTPUT_GRACE: Duration = Duration::from_millis(500);

/// Exit status after Ctrl-C, as shells report SIGINT.
const INTERRUPTED: u8 = 130;

/// An explicit `--config` must load; the default location falls back to
/// built-in defaults, reported once logging is up.
fn load_config(args: &cli::Args) -> conbridge_common::Result<(BridgeConfig, Option<ConfigError>)> {
    if let Some(path) = &args.config {
        return Ok((conbridge_config::load_config_from(path)?, None));
    }
    Ok(match conbridge_config::load_config() {
        Ok(config) => (config, None),
        Err(e) => {
            let mut config = BridgeConfig::default();
            conbridge_config::apply_env_overrides(&mut config);
            (config, Some(e))
        }
    })
}

fn init_logging(directive: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(directive))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(bridge: &ProcessBridge) -> conbridge_common::Result<ExitCode> {
    let output = pump::spawn_output(bridge.stdout())?;
    pump::spawn_input(bridge.stdin())?;

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt.cancel();
        }
    });

    match bridge.wait_for(&cancel).await {
        Ok(code) => {
            if !pump::drain(output, OUTPUT_GRACE).await {
                tracing::debug!("output still open after child exit");
            }
            tracing::info!(code, "child exited");
            Ok(ExitCode::from((code & 0xff) as u8))
        }
        Err(BridgeError::Cancelled) => {
            tracing::info!("interrupted");
            Ok(ExitCode::from(INTERRUPTED))
        }
        Err(e) => Err(ConbridgeError::Pty(e.to_string())),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = cli::parse();

    let (mut config, load_error) = match load_config(&args) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("conbridge: {e}");
            return ExitCode::FAILURE;
        }
    };
    command::apply_args(&mut config, &args);

    let directive = args
        .log_level
        .clone()
        .unwrap_or_else(|| config.logging.level.as_directive().to_string());
    init_logging(&directive);

    if let Some(e) = load_error {
        tracing::warn!("Config load failed, using defaults: {e}");
    }

    if args.print_config {
        println!("{}", conbridge_config::config_to_json(&config));
        return ExitCode::SUCCESS;
    }

    let command = command::build(&args, &config);
    let options = BridgeOptions::from_config(&config);
    let bridge = match ProcessBridge::spawn(&command, &options) {
        Ok(bridge) => bridge,
        Err(e) => {
            tracing::error!("{e}");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(pid = ?bridge.pid(), "child started");

    let status = run(&bridge).await;
    if let Err(e) = bridge.destroy() {
        tracing::warn!("teardown failed: {e}");
    }
    status.unwrap_or_else(|e| {
        tracing::error!("{e}");
        ExitCode::FAILURE
    })
}
