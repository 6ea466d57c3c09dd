//! Encoder for the query command and decoder for sensor reports

use std::net::{Ipv4Addr, SocketAddr};

use crate::address::DeviceAddress;
use crate::error::{DecodeError, Result};
use crate::reading::SensorReading;

/// Multicast group the sensors listen on
pub const DEFAULT_MULTICAST_GROUP: Ipv4Addr = Ipv4Addr::new(233, 255, 255, 255);

/// UDP port the sensors listen and answer on
pub const DEFAULT_PORT: u16 = 11530;

/// Leading byte of every frame in this protocol
pub const MAGIC: u8 = 0xA1;

/// Length of the outbound query command
pub const QUERY_LEN: usize = 13;

/// Exact length of a sensor report
pub const RESPONSE_LEN: usize = 33;

/// Offset of the 6-byte hardware address in a report
pub const SOURCE_ADDRESS_OFFSET: usize = 2;

/// Offset of the big-endian PM2.5 value in a report
pub const PM25_OFFSET: usize = 19;

/// Query command that asks every sensor on the group to report
pub const QUERY_COMMAND: [u8; QUERY_LEN] = [
    MAGIC, 0x12, 0x34, 0x56, 0x78, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x7B,
];

/// Returns the fixed query command
pub fn encode_query() -> &'static [u8] {
    &QUERY_COMMAND
}

/// Decode a datagram into a [`SensorReading`]
///
/// Only the magic byte, the hardware address and the PM2.5 field are read.
/// The remaining bytes carry readings this crate does not interpret.
pub fn decode(buffer: &[u8], sender: SocketAddr) -> Result<SensorReading> {
    let frame: &[u8; RESPONSE_LEN] = buffer
        .try_into()
        .map_err(|_| DecodeError::BadLength {
            actual: buffer.len(),
        })?;

    if frame[0] != MAGIC {
        return Err(DecodeError::BadMagic { found: frame[0] });
    }

    let mut address = [0u8; 6];
    address.copy_from_slice(&frame[SOURCE_ADDRESS_OFFSET..SOURCE_ADDRESS_OFFSET + 6]);
    let pm25 = u16::from_be_bytes([frame[PM25_OFFSET], frame[PM25_OFFSET + 1]]);

    Ok(SensorReading {
        pm25,
        source_address: DeviceAddress::from_bytes(address),
        source_socket_address: sender,
    })
}
