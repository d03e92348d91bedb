//! Bluetooth functionality for the dispatcher
//! This module holds the transport contract and its two backends: the bluest radio
//! backend and the deterministic simulation backend.

pub mod constants;
mod simulation;
mod transport;
mod types;

#[cfg(feature = "radio")]
mod connection;
#[cfg(feature = "radio")]
mod manager;
#[cfg(feature = "radio")]
mod notification;
#[cfg(feature = "radio")]
mod scanner;

use std::sync::Arc;

use log::{info, warn};
use tokio::runtime::Handle;

use crate::config::AppConfig;

// Re-export types that should be publicly accessible
#[cfg(feature = "radio")]
pub use manager::BluetoothManager;
#[cfg(feature = "radio")]
pub use scanner::extract_mac_address;
pub use simulation::SimulatedTransport;
pub use transport::{Transport, TransportError};
pub use types::{Backend, DeviceRecord, Notification, NotificationSink};

/// Picks the backend once, at startup.
///
/// A missing adapter is not an error: the simulation backend takes over silently.
pub fn select_transport(config: &AppConfig, runtime: &Handle) -> Arc<dyn Transport> {
    if config.dispatcher.force_simulation {
        info!("Simulation forced by configuration.");
        return Arc::new(SimulatedTransport::new(config.simulation.clone()));
    }

    #[cfg(feature = "radio")]
    match runtime.block_on(BluetoothManager::new(&config.radio)) {
        Ok(manager) => return Arc::new(manager),
        Err(e) => warn!("{}. Running in simulation mode.", e),
    }

    #[cfg(not(feature = "radio"))]
    {
        let _ = runtime;
        warn!("Built without radio support. Running in simulation mode.");
    }

    Arc::new(SimulatedTransport::new(config.simulation.clone()))
}
