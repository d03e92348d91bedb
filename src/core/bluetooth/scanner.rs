use std::collections::HashMap;
use std::sync::{Arc, LazyLock, Mutex, PoisonError};
use std::time::Duration;

use bluest::{Adapter, Device};
use futures_util::StreamExt;
use log::{debug, info};
use regex::Regex;

use crate::core::bluetooth::constants::{RSSI_UNAVAILABLE, UNKNOWN_DEVICE_NAME};
use crate::core::bluetooth::transport::TransportError;
use crate::core::bluetooth::types::DeviceRecord;

static MAC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([0-9A-Fa-f]{2}[:_-]){5}([0-9A-Fa-f]{2})").expect("MAC pattern is valid")
});

/// Registry of device handles seen by the radio, keyed by address
pub type DeviceRegistry = Arc<Mutex<HashMap<String, Device>>>;

pub struct BluetoothScanner {
    adapter: Adapter,
    devices: DeviceRegistry,
    min_rssi_threshold: Option<i16>,
}

impl BluetoothScanner {
    pub fn new(adapter: Adapter, devices: DeviceRegistry, min_rssi_threshold: Option<i16>) -> Self {
        Self {
            adapter,
            devices,
            min_rssi_threshold,
        }
    }

    /// Listens for advertisements until `duration` elapses or the stream ends
    pub async fn scan(&self, duration: Duration) -> Result<Vec<DeviceRecord>, TransportError> {
        info!("Starting bluetooth scan for {:?}", duration);
        let mut scan_stream = self.adapter.scan(&[]).await?;
        let deadline = tokio::time::sleep(duration);
        tokio::pin!(deadline);

        // Latest sighting per address; repeated advertisements overwrite.
        let mut seen: HashMap<String, DeviceRecord> = HashMap::new();

        loop {
            tokio::select! {
                result = scan_stream.next() => {
                    match result {
                        Some(discovered_device) => {
                            let device = discovered_device.device;
                            let rssi = discovered_device.rssi;
                            debug!("Found device - Device: {:?}, RSSI: {:?}", device, rssi);

                            if let (Some(threshold), Some(signal_strength)) = (self.min_rssi_threshold, rssi) {
                                if signal_strength < threshold {
                                    continue;
                                }
                            }

                            let name = discovered_device
                                .adv_data
                                .local_name
                                .or_else(|| device.name().ok())
                                .filter(|name| !name.is_empty())
                                .unwrap_or_else(|| UNKNOWN_DEVICE_NAME.to_string());
                            let address = Self::address_of(&device);
                            let record = DeviceRecord::new(
                                address.clone(),
                                name,
                                rssi.unwrap_or(RSSI_UNAVAILABLE),
                            );

                            self.remember(&address, device);
                            seen.insert(record.address.clone(), record);
                        }
                        None => {
                            info!("Bluetooth scan stream has ended.");
                            break;
                        }
                    }
                }
                _ = &mut deadline => {
                    break;
                }
            }
        }

        info!("Scan complete, {} device(s) observed", seen.len());
        Ok(seen.into_values().collect())
    }

    /// Resolves an address to a device handle: registry first, then devices the host
    /// is already connected to, then an on-demand scan bounded by `timeout`.
    pub async fn find(&self, address: &str, timeout: Duration) -> Result<Device, TransportError> {
        if let Some(device) = self.lookup(address) {
            return Ok(device);
        }

        for device in self.adapter.connected_devices().await? {
            if Self::address_of(&device).eq_ignore_ascii_case(address) {
                self.remember(address, device.clone());
                return Ok(device);
            }
        }

        debug!("Registry miss for {}, starting on-demand scan", address);
        let mut scan_stream = self.adapter.scan(&[]).await?;
        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                result = scan_stream.next() => {
                    match result {
                        Some(discovered_device) => {
                            let device = discovered_device.device;
                            if Self::address_of(&device).eq_ignore_ascii_case(address) {
                                self.remember(address, device.clone());
                                return Ok(device);
                            }
                        }
                        None => break,
                    }
                }
                _ = &mut deadline => break,
            }
        }

        Err(TransportError::DeviceNotFound(address.to_string()))
    }

    fn lookup(&self, address: &str) -> Option<Device> {
        self.devices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&address.to_ascii_uppercase())
            .cloned()
    }

    fn remember(&self, address: &str, device: Device) {
        self.devices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(address.to_ascii_uppercase(), device);
    }

    fn address_of(device: &Device) -> String {
        let id = device.id().to_string();
        extract_mac_address(&id).unwrap_or(id)
    }
}

/// Pulls a MAC address out of a platform device id, normalized to `XX:XX:XX:XX:XX:XX`
pub fn extract_mac_address(device_id_str: &str) -> Option<String> {
    MAC_RE
        .find_iter(device_id_str)
        .last()
        .map(|m| m.as_str().replace(['-', '_'], ":").to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_mac_address() {
        assert_eq!(
            extract_mac_address("aa:bb:cc:dd:ee:ff").as_deref(),
            Some("AA:BB:CC:DD:EE:FF")
        );
        assert_eq!(
            extract_mac_address("/org/bluez/hci0/dev_11_22_33_44_55_66").as_deref(),
            Some("11:22:33:44:55:66")
        );
        assert_eq!(
            extract_mac_address("BluetoothLE#BluetoothLE00:1a:7d:da:71:13-c4-5a-3b-2e-1f-0d").as_deref(),
            Some("C4:5A:3B:2E:1F:0D")
        );
        assert_eq!(extract_mac_address("5E7C1A2B-0000-4000-8000-00000000ABCD"), None);
    }
}
