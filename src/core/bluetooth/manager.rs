//! Bluetooth manager
//! The radio backend: drives a real adapter through bluest and implements the
//! transport contract the dispatcher workers execute against.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bluest::{Adapter, Device, Uuid};
use log::{debug, info};

use crate::config::radio_config::RadioConfig;
use crate::core::bluetooth::connection::ConnectionManager;
use crate::core::bluetooth::notification::NotificationHandler;
use crate::core::bluetooth::scanner::{BluetoothScanner, DeviceRegistry};
use crate::core::bluetooth::transport::{Transport, TransportError};
use crate::core::bluetooth::types::{Backend, DeviceRecord, NotificationSink};

/// Manages Bluetooth operations on the host adapter
pub struct BluetoothManager {
    /// Connection manager
    connection_manager: ConnectionManager,
    /// Bluetooth scanner, also owns the address to device registry
    scanner: BluetoothScanner,
    /// Notification handler
    notification_handler: NotificationHandler,
    operation_timeout: Duration,
}

impl BluetoothManager {
    /// Probes for an adapter and creates a new BluetoothManager.
    /// Fails with `AdapterUnavailable` when none shows up within the probe timeout.
    pub async fn new(config: &RadioConfig) -> Result<Self, TransportError> {
        let probe_timeout = Duration::from_millis(config.probe_timeout_ms);
        let adapter = tokio::time::timeout(probe_timeout, async {
            let adapter = Adapter::default()
                .await
                .ok_or(TransportError::AdapterUnavailable)?;
            adapter.wait_available().await?;
            Ok::<_, TransportError>(adapter)
        })
        .await
        .map_err(|_| TransportError::AdapterUnavailable)??;
        info!("Bluetooth adapter is available.");

        let devices: DeviceRegistry = Arc::new(Mutex::new(HashMap::new()));
        let connection_manager = ConnectionManager::new(
            adapter.clone(),
            config.max_connect_retries,
            config.connect_retry_delay_ms,
        );
        let scanner = BluetoothScanner::new(adapter, devices, config.min_rssi);

        Ok(Self {
            connection_manager,
            scanner,
            notification_handler: NotificationHandler::new(),
            operation_timeout: Duration::from_millis(config.operation_timeout_ms),
        })
    }

    /// Runs `future` under the operation timeout
    async fn bounded<T>(
        &self,
        operation: &'static str,
        future: impl Future<Output = Result<T, TransportError>> + Send,
    ) -> Result<T, TransportError> {
        tokio::time::timeout(self.operation_timeout, future)
            .await
            .map_err(|_| TransportError::Timeout {
                operation,
                timeout_ms: self.operation_timeout.as_millis() as u64,
            })?
    }

    async fn device(&self, address: &str) -> Result<Device, TransportError> {
        self.scanner.find(address, self.operation_timeout).await
    }
}

impl Drop for BluetoothManager {
    fn drop(&mut self) {
        self.notification_handler.stop_all();
    }
}

#[async_trait]
impl Transport for BluetoothManager {
    fn backend(&self) -> Backend {
        Backend::Radio
    }

    async fn scan(&self, duration: Duration) -> Result<Vec<DeviceRecord>, TransportError> {
        self.scanner.scan(duration).await
    }

    async fn connect(&self, address: &str) -> Result<(), TransportError> {
        self.bounded("connect", async {
            let device = self.device(address).await?;
            if device.is_connected().await {
                info!("Device {} already connected.", address);
                return Ok(());
            }
            self.connection_manager.connect_with_retry(&device).await
        })
        .await
    }

    async fn disconnect(&self, address: &str) -> Result<(), TransportError> {
        self.notification_handler.stop_device(address);
        self.bounded("disconnect", async {
            let device = self.device(address).await?;
            self.connection_manager.disconnect(address, &device).await
        })
        .await
    }

    async fn write(
        &self,
        address: &str,
        service: Uuid,
        characteristic: Uuid,
        payload: &[u8],
        fast: bool,
    ) -> Result<(), TransportError> {
        self.bounded("write", async {
            let device = self.device(address).await?;
            let write_char = self
                .connection_manager
                .characteristic(address, &device, service, characteristic)
                .await?;
            debug!(
                "Writing {} byte(s) to {} on {} (fast: {})",
                payload.len(),
                characteristic,
                address,
                fast
            );
            if fast {
                write_char.write_without_response(payload).await?;
            } else {
                write_char.write(payload).await?;
            }
            Ok(())
        })
        .await
    }

    async fn read(
        &self,
        address: &str,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<Vec<u8>, TransportError> {
        self.bounded("read", async {
            let device = self.device(address).await?;
            let read_char = self
                .connection_manager
                .characteristic(address, &device, service, characteristic)
                .await?;
            Ok(read_char.read().await?)
        })
        .await
    }

    async fn subscribe(
        &self,
        address: &str,
        service: Uuid,
        characteristic: Uuid,
        sink: NotificationSink,
    ) -> Result<(), TransportError> {
        self.bounded("subscribe", async {
            let device = self.device(address).await?;
            let notify_char = self
                .connection_manager
                .characteristic(address, &device, service, characteristic)
                .await?;
            self.notification_handler
                .setup_notifications(address, service, notify_char, sink);
            Ok(())
        })
        .await
    }

    async fn unsubscribe(
        &self,
        address: &str,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<(), TransportError> {
        if !self
            .notification_handler
            .stop_notifications(address, service, characteristic)
        {
            info!("No notification stream on {} for {}", characteristic, address);
        }
        Ok(())
    }

    async fn rssi(&self, address: &str) -> Result<i16, TransportError> {
        self.bounded("rssi", async {
            let device = self.device(address).await?;
            Ok(device.rssi().await?)
        })
        .await
    }

    async fn set_mtu(&self, address: &str, mtu: u16) -> Result<bool, TransportError> {
        self.bounded("set_mtu", async {
            let device = self.device(address).await?;
            // The host stack negotiates the ATT MTU on connection; there is nothing to request.
            let connected = device.is_connected().await;
            info!(
                "MTU {} requested for {} (connected: {}), negotiated by the host stack",
                mtu, address, connected
            );
            Ok(connected)
        })
        .await
    }
}
