//! Bluetooth connection handling
//! This module handles connecting to and disconnecting from peripherals, and
//! locating the GATT characteristics that reads and writes target.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use bluest::{Adapter, Characteristic, Device, Uuid};
use log::{info, warn};

use crate::core::bluetooth::transport::TransportError;

type CharacteristicKey = (String, Uuid, Uuid);

/// Connection manager for the radio backend
#[derive(Clone)]
pub struct ConnectionManager {
    adapter: Adapter,
    max_retries: u32,
    retry_delay: u64,
    characteristics: Arc<Mutex<HashMap<CharacteristicKey, Characteristic>>>,
}

impl ConnectionManager {
    pub fn new(adapter: Adapter, max_retries: u32, retry_delay: u64) -> Self {
        Self {
            adapter,
            max_retries: max_retries.max(1),
            retry_delay,
            characteristics: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Connect to the device with retry mechanism
    pub async fn connect_with_retry(&self, device: &Device) -> Result<(), TransportError> {
        let mut retry_count = 0;
        let mut last_error = None;

        while retry_count < self.max_retries {
            match self.try_connect(device).await {
                Ok(()) => {
                    info!("Successfully connected to device {}", device.id());
                    return Ok(());
                }
                Err(e) => {
                    warn!("Connection attempt {} failed: {}", retry_count + 1, e);
                    last_error = Some(e);

                    if retry_count < self.max_retries - 1 {
                        info!("Retrying connection in {} ms...", self.retry_delay);
                        tokio::time::sleep(Duration::from_millis(self.retry_delay)).await;
                    }
                }
            }
            retry_count += 1;
        }

        Err(last_error.unwrap_or_else(|| {
            TransportError::OperationFailed(format!(
                "Failed to connect after {} attempts",
                self.max_retries
            ))
        }))
    }

    /// Try to connect to the device once
    async fn try_connect(&self, device: &Device) -> Result<(), TransportError> {
        let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        info!("Device details - ID: {}, Name: {:?}", device.id(), name);

        if !device.is_connected().await {
            info!("Initiating connection to {}...", device.id());
            self.adapter.connect_device(device).await?;
        }

        info!("Connection successful, discovering services...");
        let services = device.services().await?;
        info!("Discovered {} service(s) on {}", services.len(), device.id());
        Ok(())
    }

    /// Disconnect from the device, dropping its cached characteristic handles
    pub async fn disconnect(&self, address: &str, device: &Device) -> Result<(), TransportError> {
        self.characteristics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(addr, _, _), _| addr != address);

        if device.is_connected().await {
            info!("Disconnecting from device {}", device.id());
            self.adapter.disconnect_device(device).await?;
            info!("Successfully disconnected");
        } else {
            info!("Device {} not connected", device.id());
        }
        Ok(())
    }

    /// Finds a characteristic on the device, caching the handle for later commands
    pub async fn characteristic(
        &self,
        address: &str,
        device: &Device,
        service_uuid: Uuid,
        char_uuid: Uuid,
    ) -> Result<Characteristic, TransportError> {
        let key = (address.to_string(), service_uuid, char_uuid);
        let cached = self
            .characteristics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .cloned();
        if let Some(characteristic) = cached {
            return Ok(characteristic);
        }

        let services = device.services().await?;
        let service = match services.iter().find(|s| s.uuid() == service_uuid) {
            Some(service) => service.clone(),
            None => {
                for service in &services {
                    info!("Available service: {}", service.uuid());
                }
                return Err(TransportError::ServiceNotFound(service_uuid));
            }
        };

        let characteristic = service
            .characteristics()
            .await?
            .into_iter()
            .find(|c| c.uuid() == char_uuid)
            .ok_or(TransportError::CharacteristicNotFound(char_uuid))?;
        info!("Found characteristic {} in service {}", char_uuid, service_uuid);

        self.characteristics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, characteristic.clone());
        Ok(characteristic)
    }
}
