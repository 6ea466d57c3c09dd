//! Sensor hardware address type

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::AddressError;

/// 6-byte hardware address of a sensor
///
/// The canonical text form is 12 uppercase hex digits with no separators,
/// e.g. `AABBCCDDEEFF`. Parsing accepts `:`, `-` and `.` separators in any
/// letter case, so every comparison happens on the normalized value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceAddress([u8; 6]);

impl DeviceAddress {
    /// Creates an address from raw bytes in wire order
    pub const fn from_bytes(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    /// Raw bytes in wire order
    pub const fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{:02X}", byte)?;
        }
        Ok(())
    }
}

impl FromStr for DeviceAddress {
    type Err = AddressError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let mut digits = Vec::with_capacity(12);
        for c in input.trim().chars() {
            if matches!(c, ':' | '-' | '.') {
                continue;
            }
            if !c.is_ascii_hexdigit() {
                return Err(AddressError::InvalidCharacter {
                    input: input.to_string(),
                    character: c,
                });
            }
            digits.push(c);
        }

        if digits.len() != 12 {
            return Err(AddressError::WrongLength {
                input: input.to_string(),
                digits: digits.len(),
            });
        }

        let mut bytes = [0u8; 6];
        for (byte, pair) in bytes.iter_mut().zip(digits.chunks(2)) {
            let hi = pair[0].to_digit(16).unwrap_or(0) as u8;
            let lo = pair[1].to_digit(16).unwrap_or(0) as u8;
            *byte = (hi << 4) | lo;
        }

        Ok(Self(bytes))
    }
}

impl From<[u8; 6]> for DeviceAddress {
    fn from(bytes: [u8; 6]) -> Self {
        Self::from_bytes(bytes)
    }
}

impl Serialize for DeviceAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DeviceAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("AABBCCDDEEFF")]
    #[case("aabbccddeeff")]
    #[case("AA:BB:CC:DD:EE:FF")]
    #[case("aa-bb-cc-dd-ee-ff")]
    #[case("aabb.ccdd.eeff")]
    #[case("  Aa:bB:cc:DD:ee:Ff ")]
    fn test_parse_normalizes(#[case] input: &str) {
        let address: DeviceAddress = input.parse().unwrap();
        assert_eq!(address.to_string(), "AABBCCDDEEFF");
        assert_eq!(address.octets(), [0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);
    }

    #[rstest]
    #[case("", 0)]
    #[case("AABBCCDDEE", 10)]
    #[case("AA:BB:CC:DD:EE:FF:00", 14)]
    fn test_parse_wrong_length(#[case] input: &str, #[case] digits: usize) {
        let err = input.parse::<DeviceAddress>().unwrap_err();
        assert_eq!(
            err,
            AddressError::WrongLength {
                input: input.to_string(),
                digits,
            }
        );
    }

    #[test]
    fn test_parse_invalid_character() {
        let err = "AABBCCDDEEFG".parse::<DeviceAddress>().unwrap_err();
        assert!(matches!(err, AddressError::InvalidCharacter { character: 'G', .. }));
    }

    #[test]
    fn test_equality_after_normalization() {
        let a: DeviceAddress = "aa:bb:cc:dd:ee:ff".parse().unwrap();
        let b = DeviceAddress::from_bytes([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_display_pads_single_digit_bytes() {
        let address = DeviceAddress::from_bytes([0x00, 0x01, 0x0A, 0x10, 0xF0, 0x0F]);
        assert_eq!(address.to_string(), "00010A10F00F");
    }

    #[test]
    fn test_serde_uses_canonical_string() {
        let address: DeviceAddress = "aa:bb:cc:dd:ee:ff".parse().unwrap();
        let json = serde_json::to_string(&address).unwrap();
        assert_eq!(json, "\"AABBCCDDEEFF\"");

        let back: DeviceAddress = serde_json::from_str("\"aa-bb-cc-dd-ee-ff\"").unwrap();
        assert_eq!(back, address);

        assert!(serde_json::from_str::<DeviceAddress>("\"nope\"").is_err());
    }
}
