//! Transport abstraction
//! The dispatcher only ever talks to a radio through this trait. The concrete backend
//! (real adapter or simulation) is picked once at startup and never swapped.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::core::bluetooth::types::{Backend, DeviceRecord, NotificationSink};

/// Errors raised while executing an operation against a backend
#[derive(Error, Debug)]
pub enum TransportError {
    /// No usable Bluetooth adapter
    #[error("No Bluetooth adapter found")]
    AdapterUnavailable,

    /// The address could not be resolved to a device
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    /// The device does not expose the requested service
    #[error("Service not found: {0}")]
    ServiceNotFound(Uuid),

    /// The service does not expose the requested characteristic
    #[error("Characteristic not found: {0}")]
    CharacteristicNotFound(Uuid),

    /// A command reached the transport without the identifiers it needs
    #[error("Command is missing its service or characteristic")]
    MissingAttribute,

    /// The operation did not finish in time
    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout {
        operation: &'static str,
        timeout_ms: u64,
    },

    /// The operation ran but did not succeed
    #[error("Operation failed: {0}")]
    OperationFailed(String),

    #[cfg(feature = "radio")]
    #[error("Bluetooth error: {0}")]
    Bluetooth(#[from] bluest::Error),
}

/// Operations the dispatcher needs from a radio backend.
///
/// Implementations may block for a long time (connect handshakes, scans), so callers
/// must never hold the discovery cache lock across any of these calls.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Which backend this is
    fn backend(&self) -> Backend;

    /// Listens for advertisements for `duration` and returns what was seen
    async fn scan(&self, duration: Duration) -> Result<Vec<DeviceRecord>, TransportError>;

    async fn connect(&self, address: &str) -> Result<(), TransportError>;

    async fn disconnect(&self, address: &str) -> Result<(), TransportError>;

    /// Writes `payload` to a characteristic. `fast` selects write-without-response.
    async fn write(
        &self,
        address: &str,
        service: Uuid,
        characteristic: Uuid,
        payload: &[u8],
        fast: bool,
    ) -> Result<(), TransportError>;

    async fn read(
        &self,
        address: &str,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<Vec<u8>, TransportError>;

    /// Starts forwarding notifications from a characteristic into `sink`
    async fn subscribe(
        &self,
        address: &str,
        service: Uuid,
        characteristic: Uuid,
        sink: NotificationSink,
    ) -> Result<(), TransportError>;

    async fn unsubscribe(
        &self,
        address: &str,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<(), TransportError>;

    async fn rssi(&self, address: &str) -> Result<i16, TransportError>;

    async fn set_mtu(&self, address: &str, mtu: u16) -> Result<bool, TransportError>;
}
