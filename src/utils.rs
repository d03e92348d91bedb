use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use anyhow::Result;
use log::{error, info};
use regex::Regex;
use uuid::Uuid;

use crate::core::bluetooth::constants::BLUETOOTH_BASE_UUID;
use crate::error::DispatchError;

static ADDRESS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9A-Fa-f]{2}:){5}[0-9A-Fa-f]{2}$").expect("address pattern is valid")
});

/// Ensures that a directory exists, creating it if it does not.
/// This function is idempotent.
pub fn ensure_directory_exists<P: AsRef<Path>>(path: P) -> Result<()> {
    let path = path.as_ref();
    if !path.exists() {
        if let Err(e) = fs::create_dir_all(path) {
            error!("Failed to create directory at {:?}: {}", path, e);
            return Err(e.into());
        }
        info!("Created directory at: {:?}", path);
    }
    Ok(())
}

/// Validates an `XX:XX:XX:XX:XX:XX` address and returns it in upper case.
pub fn parse_address(address: &str) -> Result<String, DispatchError> {
    let address = address.trim();
    if !ADDRESS_RE.is_match(address) {
        return Err(DispatchError::InvalidAddress(address.to_string()));
    }
    Ok(address.to_ascii_uppercase())
}

/// Parses a service or characteristic identifier.
///
/// Accepts the 16-bit (`180D`) and 32-bit short forms, which expand onto the
/// Bluetooth Base UUID, and any full UUID.
pub fn parse_uuid(id: &str) -> Result<Uuid, DispatchError> {
    let trimmed = id.trim();
    let short = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    if (short.len() == 4 || short.len() == 8) && short.chars().all(|c| c.is_ascii_hexdigit()) {
        let value = u32::from_str_radix(short, 16)
            .map_err(|_| DispatchError::InvalidUuid(id.to_string()))?;
        return Ok(Uuid::from_u128(
            BLUETOOTH_BASE_UUID.as_u128() | ((value as u128) << 96),
        ));
    }

    Uuid::parse_str(trimmed).map_err(|_| DispatchError::InvalidUuid(id.to_string()))
}

/// Decodes a hex string, two characters per byte. Either case is accepted.
pub fn decode_hex(input: &str) -> Result<Vec<u8>, DispatchError> {
    hex::decode(input).map_err(|e| DispatchError::InvalidHex(format!("{} in {:?}", e, input)))
}

/// Encodes bytes as hex. Upper case is the canonical form, so decoding and
/// re-encoding reproduces any input up to letter case.
pub fn encode_hex(bytes: &[u8]) -> String {
    hex::encode_upper(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_address() {
        assert_eq!(parse_address("aa:bb:cc:dd:ee:ff").unwrap(), "AA:BB:CC:DD:EE:FF");
        assert!(parse_address("AA:BB:CC:DD:EE").is_err());
        assert!(parse_address("AA-BB-CC-DD-EE-FF").is_err());
        assert!(parse_address("GG:BB:CC:DD:EE:FF").is_err());
        assert!(parse_address("").is_err());
    }

    #[test]
    fn test_parse_short_uuid() {
        let heart_rate = parse_uuid("180D").unwrap();
        assert_eq!(
            heart_rate,
            Uuid::from_u128(0x0000180d_0000_1000_8000_00805f9b34fb)
        );
        assert_eq!(parse_uuid("0x2a37").unwrap(), parse_uuid("2A37").unwrap());
        assert_eq!(
            parse_uuid("12345678").unwrap(),
            Uuid::from_u128(0x12345678_0000_1000_8000_00805f9b34fb)
        );
    }

    #[test]
    fn test_parse_full_uuid() {
        let full = "c8c51726-81bc-483b-a052-f7a14ea3d281";
        assert_eq!(parse_uuid(full).unwrap().to_string(), full);
        assert!(parse_uuid("180").is_err());
        assert!(parse_uuid("not-a-uuid").is_err());
    }

    #[test]
    fn test_hex_round_trip_ignores_case() {
        let every_byte: Vec<u8> = (0..=255).collect();
        let upper = encode_hex(&every_byte);
        assert_eq!(upper.len(), 512);
        assert_eq!(decode_hex(&upper).unwrap(), every_byte);

        // Mixed-case spellings decode to the same bytes and re-encode in canonical case
        let lower = upper.to_ascii_lowercase();
        let mixed: String = upper
            .chars()
            .enumerate()
            .map(|(i, c)| if i % 3 == 0 { c.to_ascii_lowercase() } else { c })
            .collect();
        for input in [upper.as_str(), lower.as_str(), mixed.as_str(), "", "0a1b2c", "DeAdBeEf"] {
            let encoded = encode_hex(&decode_hex(input).unwrap());
            assert!(encoded.eq_ignore_ascii_case(input), "{} vs {}", encoded, input);
            assert_eq!(encoded, input.to_ascii_uppercase());
        }
    }

    #[test]
    fn test_hex_rejects_odd_length() {
        for input in ["0", "010", "ABCDE", "0102030"] {
            let err = decode_hex(input).unwrap_err();
            assert!(err.is_malformed_input());
            assert!(matches!(err, DispatchError::InvalidHex(_)));
        }
    }

    #[test]
    fn test_hex_rejects_bad_digits() {
        assert!(decode_hex("0G").is_err());
        assert!(decode_hex("+1").is_err());
        assert!(decode_hex("é").is_err());
    }
}
