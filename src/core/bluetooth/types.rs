//! Defines shared data structures for the Bluetooth module.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::bluetooth::constants::MAX_DEVICE_NAME_LEN;

/// Represents a discovered Bluetooth device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    /// The address of the device, `XX:XX:XX:XX:XX:XX` in upper case
    pub address: String,
    /// The advertised name of the device, at most 255 bytes
    pub name: String,
    /// The signal strength (RSSI) of the device in dBm
    pub rssi: i16,
}

impl DeviceRecord {
    /// Creates a new DeviceRecord, normalizing the address and bounding the name
    pub fn new(address: impl Into<String>, name: impl Into<String>, rssi: i16) -> Self {
        let mut name = name.into();
        truncate_name(&mut name);
        Self {
            address: address.into().to_ascii_uppercase(),
            name,
            rssi,
        }
    }
}

fn truncate_name(name: &mut String) {
    if name.len() <= MAX_DEVICE_NAME_LEN {
        return;
    }
    let mut end = MAX_DEVICE_NAME_LEN;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    name.truncate(end);
}

/// Which implementation sits behind the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// A physical adapter driven through bluest
    Radio,
    /// Deterministic fabricated results
    Simulation,
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Backend::Radio => write!(f, "radio"),
            Backend::Simulation => write!(f, "simulation"),
        }
    }
}

/// A value pushed by a peripheral on a subscribed characteristic
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub address: String,
    pub characteristic: Uuid,
    pub value: Vec<u8>,
}

/// Channel on which transports publish notifications
pub type NotificationSink = tokio::sync::broadcast::Sender<Notification>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_normalizes_address() {
        let record = DeviceRecord::new("aa:bb:cc:dd:ee:ff", "Sensor", -42);
        assert_eq!(record.address, "AA:BB:CC:DD:EE:FF");
        assert_eq!(record.name, "Sensor");
        assert_eq!(record.rssi, -42);
    }

    #[test]
    fn test_long_name_is_truncated_on_char_boundary() {
        // 'é' is two bytes, so 200 of them straddle the 255 byte limit
        let name = "é".repeat(200);
        let record = DeviceRecord::new("AA:BB:CC:DD:EE:FF", name, -60);
        assert!(record.name.len() <= MAX_DEVICE_NAME_LEN);
        assert_eq!(record.name.len(), 254);
        assert!(record.name.chars().all(|c| c == 'é'));
    }

    #[test]
    fn test_notification_serializes_to_json() {
        let notification = Notification {
            address: "AA:BB:CC:DD:EE:FF".to_string(),
            characteristic: Uuid::from_u128(0x00002a37_0000_1000_8000_00805f9b34fb),
            value: vec![1, 2],
        };
        let json = serde_json::to_value(&notification).unwrap();
        assert_eq!(json["address"], "AA:BB:CC:DD:EE:FF");
        assert_eq!(json["characteristic"], "00002a37-0000-1000-8000-00805f9b34fb");
        assert_eq!(json["value"], serde_json::json!([1, 2]));
    }
}
