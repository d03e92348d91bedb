//! Constants used throughout the Bluetooth layer
//! This module contains the constant values shared by the transports and the dispatcher,
//! such as UUID bases, timeouts, and protocol limits.

use uuid::Uuid;

/// The Bluetooth Base UUID. Short 16/32-bit identifiers are placed in the top 32 bits.
pub const BLUETOOTH_BASE_UUID: Uuid = Uuid::from_u128(0x00000000_0000_1000_8000_00805f9b34fb);

/// Name reported for advertisements that carry no local name
pub const UNKNOWN_DEVICE_NAME: &str = "[BLE Device]";

/// Maximum length of a device name in bytes (a 256 byte C buffer minus the terminator)
pub const MAX_DEVICE_NAME_LEN: usize = 255;

/// RSSI value meaning "not available" (HCI convention)
pub const RSSI_UNAVAILABLE: i16 = 127;

/// Smallest ATT MTU allowed by the Core specification
pub const MIN_ATT_MTU: u16 = 23;

/// Largest ATT MTU allowed by the Core specification
pub const MAX_ATT_MTU: u16 = 517;

/// Maximum number of connection retries
pub const MAX_CONNECT_RETRIES: u32 = 5;

/// Delay between connection retries in milliseconds
pub const CONNECT_RETRY_DELAY_MS: u64 = 1000;

/// Timeout for Bluetooth operations in milliseconds
pub const BLUETOOTH_OPERATION_TIMEOUT_MS: u64 = 10_000;

/// Time allowed for the adapter to show up at startup
pub const ADAPTER_PROBE_TIMEOUT_MS: u64 = 3000;

/// Scan duration in milliseconds
pub const DEFAULT_SCAN_DURATION_MS: u64 = 5000;

/// Default number of entries returned from the discovery cache
pub const DEFAULT_MAX_SCAN_RESULTS: usize = 100;

/// Simulated connect handshake duration in milliseconds
pub const SIMULATED_CONNECT_DELAY_MS: u64 = 200;

/// RSSI sentinel reported by the simulation backend
pub const SIMULATED_RSSI: i16 = -55;
