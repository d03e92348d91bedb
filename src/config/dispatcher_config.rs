use serde::{Deserialize, Serialize};

use crate::core::bluetooth::constants::{DEFAULT_MAX_SCAN_RESULTS, DEFAULT_SCAN_DURATION_MS};

/// Settings for the dispatcher facade and its worker threads
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Scan duration used when the caller does not give one, in milliseconds.
    pub default_scan_ms: u64,

    /// Upper bound on the number of cached devices handed back to a caller.
    pub max_scan_results: usize,

    /// Skip adapter detection and always run on the simulation backend.
    pub force_simulation: bool,

    /// Worker threads of the internal async runtime that drives the transport.
    /// These only service I/O and timers; queue consumers have their own threads.
    pub runtime_threads: usize,

    /// How many undelivered notifications a slow subscriber may lag behind.
    pub notification_capacity: usize,

    /// Time given to background transport tasks when the dispatcher shuts down.
    pub shutdown_grace_ms: u64,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        DispatcherConfig {
            default_scan_ms: DEFAULT_SCAN_DURATION_MS,
            max_scan_results: DEFAULT_MAX_SCAN_RESULTS,
            force_simulation: false,
            runtime_threads: 2,
            notification_capacity: 64,
            shutdown_grace_ms: 2000,
        }
    }
}
