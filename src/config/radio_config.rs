use serde::{Deserialize, Serialize};

use crate::core::bluetooth::constants::{
    ADAPTER_PROBE_TIMEOUT_MS, BLUETOOTH_OPERATION_TIMEOUT_MS, CONNECT_RETRY_DELAY_MS,
    MAX_CONNECT_RETRIES,
};

/// Settings for the real radio backend
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RadioConfig {
    /// How long to wait for an adapter at startup before falling back to simulation.
    pub probe_timeout_ms: u64,

    /// Upper bound for any single adapter operation (connect, read, write...).
    pub operation_timeout_ms: u64,

    /// Connection attempts made inside one connect handshake.
    pub max_connect_retries: u32,

    /// Pause between two connection attempts.
    pub connect_retry_delay_ms: u64,

    /// Advertisements weaker than this are ignored while scanning.
    pub min_rssi: Option<i16>,
}

impl Default for RadioConfig {
    fn default() -> Self {
        RadioConfig {
            probe_timeout_ms: ADAPTER_PROBE_TIMEOUT_MS,
            operation_timeout_ms: BLUETOOTH_OPERATION_TIMEOUT_MS,
            max_connect_retries: MAX_CONNECT_RETRIES,
            connect_retry_delay_ms: CONNECT_RETRY_DELAY_MS,
            min_rssi: None,
        }
    }
}
