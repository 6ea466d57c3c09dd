//! 352Air M25 wire protocol
//!
//! This crate implements the binary framing spoken by 352Air M25 PM2.5
//! sensors over UDP multicast. A host sends a fixed 13-byte query to the
//! multicast group and every sensor on the segment answers with a 33-byte
//! report carrying its hardware address and the current PM2.5 density.
//!
//! # Quick Start
//!
//! ```
//! use air352_protocol::{decode, encode_query, DeviceAddress, RESPONSE_LEN};
//!
//! let query = encode_query();
//! assert_eq!(query.len(), 13);
//!
//! let mut packet = [0u8; RESPONSE_LEN];
//! packet[0] = 0xA1;
//! packet[2..8].copy_from_slice(&[0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);
//! packet[19..21].copy_from_slice(&35u16.to_be_bytes());
//!
//! let reading = decode(&packet, "192.168.1.40:11530".parse().unwrap()).unwrap();
//! assert_eq!(reading.pm25, 35);
//! assert_eq!(reading.source_address, "aa:bb:cc:dd:ee:ff".parse::<DeviceAddress>().unwrap());
//! ```
//!
//! The protocol has no checksum, no length prefix and no version field, so
//! decoding reduces to an exact-length check and a magic-byte check. Anything
//! else on the group is reported as a [`DecodeError`] and is expected to be
//! discarded by the caller.

mod address;
mod codec;
mod error;
mod quality;
mod reading;

pub use address::DeviceAddress;
pub use codec::{
    decode, encode_query, DEFAULT_MULTICAST_GROUP, DEFAULT_PORT, MAGIC, PM25_OFFSET,
    QUERY_COMMAND, QUERY_LEN, RESPONSE_LEN, SOURCE_ADDRESS_OFFSET,
};
pub use error::{AddressError, DecodeError, Result};
pub use quality::AirQuality;
pub use reading::SensorReading;

/// Manufacturer string reported for devices speaking this protocol
pub const MANUFACTURER: &str = "352Air";

/// Model string reported for devices speaking this protocol
pub const MODEL: &str = "M25";
