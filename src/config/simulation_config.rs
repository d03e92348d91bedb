use serde::{Deserialize, Serialize};

use crate::core::bluetooth::constants::{SIMULATED_CONNECT_DELAY_MS, SIMULATED_RSSI};

/// A device the simulation backend reports on every scan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatedDevice {
    pub address: String,
    pub name: String,
    pub rssi: i16,
}

impl SimulatedDevice {
    pub fn new(address: &str, name: &str, rssi: i16) -> Self {
        Self {
            address: address.to_string(),
            name: name.to_string(),
            rssi,
        }
    }
}

/// Settings for the simulation backend
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Synthetic scan time. The simulated scan completes early, it never waits the full duration.
    pub scan_latency_ms: u64,

    /// Synthetic connect handshake time.
    pub connect_delay_ms: u64,

    /// Synthetic time per write.
    pub write_delay_ms: u64,

    /// Value returned from RSSI queries.
    pub rssi: i16,

    /// Fixture returned from every scan.
    pub devices: Vec<SimulatedDevice>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            scan_latency_ms: 0,
            connect_delay_ms: SIMULATED_CONNECT_DELAY_MS,
            write_delay_ms: 0,
            rssi: SIMULATED_RSSI,
            devices: vec![
                SimulatedDevice::new("AA:BB:CC:DD:EE:FF", "MockDevice_1", -60),
                SimulatedDevice::new("11:22:33:44:55:66", "MockDevice_2", -75),
            ],
        }
    }
}
