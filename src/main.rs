use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use clap::error::ErrorKind;
use log::{LevelFilter, error, info};

use ble_dispatch_lib::commands::{DeviceCommand, execute};
use ble_dispatch_lib::config::AppConfig;
use ble_dispatch_lib::core::Dispatcher;
use ble_dispatch_lib::logging;

#[derive(Debug, Parser)]
#[command(name = "ble-dispatch", version, about = "Dispatch commands to BLE peripherals")]
struct Cli {
    /// JSON configuration file
    #[arg(long, env = "BLE_DISPATCH_CONFIG")]
    config: Option<PathBuf>,

    /// Use the simulation backend even if an adapter is present
    #[arg(long)]
    simulate: bool,

    #[command(subcommand)]
    command: DeviceCommand,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::from(1),
            };
        }
    };

    logging::init_logging(LevelFilter::Warn);

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(1)
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let mut config = match &cli.config {
        Some(path) => AppConfig::load_config(path)?,
        None => AppConfig::default(),
    };
    if cli.simulate {
        config.dispatcher.force_simulation = true;
    }

    let dispatcher = Dispatcher::new(config)?;
    info!("Running {:?} on the {} backend", cli.command, dispatcher.backend());

    match execute(&dispatcher, cli.command) {
        Ok(output) => {
            println!("{}", output);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) if e.is_malformed_input() => {
            eprintln!("error: {}", e);
            Ok(ExitCode::from(1))
        }
        Err(e) => {
            error!("{}", e);
            println!("{}", serde_json::json!({ "success": false, "error": e.to_string() }));
            Ok(ExitCode::SUCCESS)
        }
    }
}
