//! Command-line commands
//! This module defines the commands exposed by the `ble-dispatch` binary and turns
//! each one into a dispatcher call with a JSON answer.

use std::time::Duration;

use clap::{Subcommand, ValueEnum};
use log::warn;
use serde_json::{Value, json};

use crate::core::Dispatcher;
use crate::error::DispatchError;
use crate::utils::encode_hex;

/// How a write is routed
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum WriteMode {
    /// Fast-path queue, write without response
    Fast,
    /// Ordered queue, write with response
    Safe,
}

#[derive(Debug, Clone, Subcommand)]
pub enum DeviceCommand {
    /// Scan for devices
    Scan {
        /// Scan duration in milliseconds
        duration_ms: Option<u64>,
    },
    /// Connect to a device
    Connect { address: String },
    /// Disconnect from a device
    Disconnect { address: String },
    /// Write a hex payload to a characteristic
    Write {
        address: String,
        service_uuid: String,
        char_uuid: String,
        hex_payload: String,
        #[arg(value_enum)]
        mode: Option<WriteMode>,
    },
    /// Read a characteristic
    Read {
        address: String,
        service_uuid: String,
        char_uuid: String,
    },
    /// Get RSSI
    Rssi { address: String },
    /// Set MTU
    Mtu {
        address: String,
        #[arg(allow_negative_numbers = true)]
        size: i64,
    },
}

/// Runs one command and builds its JSON answer.
///
/// Malformed input comes back as `Err`; an operation that ran and failed is reported
/// inside the JSON body instead.
pub fn execute(dispatcher: &Dispatcher, command: DeviceCommand) -> Result<Value, DispatchError> {
    match command {
        DeviceCommand::Scan { duration_ms } => {
            let duration_ms = duration_ms.unwrap_or(dispatcher.config().default_scan_ms);
            if let Err(e) = dispatcher.scan(Duration::from_millis(duration_ms)) {
                warn!("Scan failed: {}", e);
            }
            let results = dispatcher.get_scan_results(dispatcher.config().max_scan_results);
            Ok(json!({ "results": results }))
        }
        DeviceCommand::Connect { address } => {
            let pending = dispatcher.connect(&address)?;
            Ok(success(pending.wait()))
        }
        DeviceCommand::Disconnect { address } => {
            let pending = dispatcher.disconnect(&address)?;
            Ok(success(pending.wait()))
        }
        DeviceCommand::Write {
            address,
            service_uuid,
            char_uuid,
            hex_payload,
            mode,
        } => {
            let fast = mode == Some(WriteMode::Fast);
            let pending =
                dispatcher.write_hex(&address, &service_uuid, &char_uuid, &hex_payload, fast)?;
            Ok(success(pending.wait()))
        }
        DeviceCommand::Read {
            address,
            service_uuid,
            char_uuid,
        } => {
            let pending = dispatcher.read(&address, &service_uuid, &char_uuid)?;
            Ok(match pending.wait() {
                Ok(value) => json!({
                    "success": true,
                    "value": value.map(|bytes| encode_hex(&bytes)),
                }),
                Err(e) => {
                    warn!("Read failed: {}", e);
                    json!({ "success": false, "value": null })
                }
            })
        }
        DeviceCommand::Rssi { address } => match dispatcher.query_rssi(&address) {
            Ok(rssi) => Ok(json!({ "rssi": rssi })),
            Err(e) if e.is_malformed_input() => Err(e),
            Err(e) => Ok(json!({ "rssi": null, "error": e.to_string() })),
        },
        DeviceCommand::Mtu { address, size } => match dispatcher.set_mtu(&address, size) {
            Ok(ok) => Ok(json!({ "success": ok })),
            Err(e) if e.is_malformed_input() => Err(e),
            Err(e) => {
                warn!("MTU request failed: {}", e);
                Ok(json!({ "success": false }))
            }
        },
    }
}

fn success(result: Result<Option<Vec<u8>>, DispatchError>) -> Value {
    if let Err(e) = &result {
        warn!("Command failed: {}", e);
    }
    json!({ "success": result.is_ok() })
}
