//! Simulation backend
//! Used when no adapter is present. Every answer is fabricated from the configuration,
//! so runs are reproducible.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info};
use tokio::time::sleep;
use uuid::Uuid;

use crate::config::simulation_config::SimulationConfig;
use crate::core::bluetooth::transport::{Transport, TransportError};
use crate::core::bluetooth::types::{Backend, DeviceRecord, Notification, NotificationSink};

type AttributeKey = (String, Uuid, Uuid);

pub struct SimulatedTransport {
    config: SimulationConfig,
    /// Last value written to each characteristic, echoed back by reads
    attributes: Mutex<HashMap<AttributeKey, Vec<u8>>>,
    subscriptions: Mutex<HashSet<AttributeKey>>,
}

impl SimulatedTransport {
    pub fn new(config: SimulationConfig) -> Self {
        info!(
            "Simulation backend active with {} fixture device(s)",
            config.devices.len()
        );
        Self {
            config,
            attributes: Mutex::new(HashMap::new()),
            subscriptions: Mutex::new(HashSet::new()),
        }
    }

    fn stored_value(&self, key: &AttributeKey) -> Vec<u8> {
        self.attributes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of characteristics with notifications currently enabled
    pub fn subscription_count(&self) -> usize {
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

async fn synthetic_delay(ms: u64) {
    if ms > 0 {
        sleep(Duration::from_millis(ms)).await;
    }
}

#[async_trait]
impl Transport for SimulatedTransport {
    fn backend(&self) -> Backend {
        Backend::Simulation
    }

    async fn scan(&self, duration: Duration) -> Result<Vec<DeviceRecord>, TransportError> {
        let latency = Duration::from_millis(self.config.scan_latency_ms).min(duration);
        sleep(latency).await;

        let devices: Vec<DeviceRecord> = self
            .config
            .devices
            .iter()
            .map(|d| DeviceRecord::new(d.address.clone(), d.name.clone(), d.rssi))
            .collect();
        debug!("Simulated scan produced {} device(s)", devices.len());
        Ok(devices)
    }

    async fn connect(&self, address: &str) -> Result<(), TransportError> {
        synthetic_delay(self.config.connect_delay_ms).await;
        info!("[simulation] Connected to {}", address);
        Ok(())
    }

    async fn disconnect(&self, address: &str) -> Result<(), TransportError> {
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(addr, _, _)| addr != address);
        info!("[simulation] Disconnected from {}", address);
        Ok(())
    }

    async fn write(
        &self,
        address: &str,
        service: Uuid,
        characteristic: Uuid,
        payload: &[u8],
        fast: bool,
    ) -> Result<(), TransportError> {
        synthetic_delay(self.config.write_delay_ms).await;
        self.attributes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                (address.to_string(), service, characteristic),
                payload.to_vec(),
            );
        debug!(
            "[simulation] Wrote {} byte(s) to {} on {} (fast: {})",
            payload.len(),
            characteristic,
            address,
            fast
        );
        Ok(())
    }

    async fn read(
        &self,
        address: &str,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<Vec<u8>, TransportError> {
        Ok(self.stored_value(&(address.to_string(), service, characteristic)))
    }

    async fn subscribe(
        &self,
        address: &str,
        service: Uuid,
        characteristic: Uuid,
        sink: NotificationSink,
    ) -> Result<(), TransportError> {
        let key = (address.to_string(), service, characteristic);
        let value = self.stored_value(&key);
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key);

        // No receivers is fine, nobody is listening yet.
        let _ = sink.send(Notification {
            address: address.to_string(),
            characteristic,
            value,
        });
        Ok(())
    }

    async fn unsubscribe(
        &self,
        address: &str,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<(), TransportError> {
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&(address.to_string(), service, characteristic));
        Ok(())
    }

    async fn rssi(&self, _address: &str) -> Result<i16, TransportError> {
        Ok(self.config.rssi)
    }

    async fn set_mtu(&self, address: &str, mtu: u16) -> Result<bool, TransportError> {
        debug!("[simulation] MTU for {} set to {}", address, mtu);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::simulation_config::SimulatedDevice;

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
    }

    fn fast_config() -> SimulationConfig {
        SimulationConfig {
            connect_delay_ms: 0,
            ..SimulationConfig::default()
        }
    }

    #[test]
    fn test_scan_is_deterministic() {
        let rt = runtime();
        let transport = SimulatedTransport::new(fast_config());

        let first = rt.block_on(transport.scan(Duration::from_millis(1000))).unwrap();
        let second = rt.block_on(transport.scan(Duration::from_millis(1000))).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].rssi, -60);
        assert_eq!(first[1].rssi, -75);
    }

    #[test]
    fn test_scan_uses_configured_fixture() {
        let rt = runtime();
        let config = SimulationConfig {
            devices: vec![SimulatedDevice::new("01:02:03:04:05:06", "Custom", -30)],
            ..fast_config()
        };
        let transport = SimulatedTransport::new(config);

        let devices = rt.block_on(transport.scan(Duration::from_millis(10))).unwrap();
        assert_eq!(devices, vec![DeviceRecord::new("01:02:03:04:05:06", "Custom", -30)]);
    }

    #[test]
    fn test_read_echoes_last_write() {
        let rt = runtime();
        let transport = SimulatedTransport::new(fast_config());
        let service = Uuid::from_u128(1);
        let characteristic = Uuid::from_u128(2);

        rt.block_on(async {
            assert!(transport.read("AA:BB:CC:DD:EE:FF", service, characteristic).await.unwrap().is_empty());
            transport
                .write("AA:BB:CC:DD:EE:FF", service, characteristic, &[1, 2], false)
                .await
                .unwrap();
            transport
                .write("AA:BB:CC:DD:EE:FF", service, characteristic, &[3, 4], true)
                .await
                .unwrap();
            let value = transport.read("AA:BB:CC:DD:EE:FF", service, characteristic).await.unwrap();
            assert_eq!(value, vec![3, 4]);
        });
    }

    #[test]
    fn test_subscribe_emits_current_value() {
        let rt = runtime();
        let transport = SimulatedTransport::new(fast_config());
        let (sink, mut rx) = tokio::sync::broadcast::channel(4);
        let service = Uuid::from_u128(1);
        let characteristic = Uuid::from_u128(2);

        rt.block_on(async {
            transport
                .write("AA:BB:CC:DD:EE:FF", service, characteristic, &[9], false)
                .await
                .unwrap();
            transport
                .subscribe("AA:BB:CC:DD:EE:FF", service, characteristic, sink)
                .await
                .unwrap();
            let notification = rx.recv().await.unwrap();
            assert_eq!(notification.value, vec![9]);
            assert_eq!(notification.characteristic, characteristic);
        });
        assert_eq!(transport.subscription_count(), 1);

        rt.block_on(transport.disconnect("AA:BB:CC:DD:EE:FF")).unwrap();
        assert_eq!(transport.subscription_count(), 0);
    }

    #[test]
    fn test_rssi_and_mtu() {
        let rt = runtime();
        let transport = SimulatedTransport::new(fast_config());
        assert_eq!(rt.block_on(transport.rssi("AA:BB:CC:DD:EE:FF")).unwrap(), -55);
        assert!(rt.block_on(transport.set_mtu("AA:BB:CC:DD:EE:FF", 247)).unwrap());
        assert_eq!(transport.backend(), Backend::Simulation);
    }
}
