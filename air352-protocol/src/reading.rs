//! Decoded sensor report

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

use crate::address::DeviceAddress;
use crate::quality::AirQuality;

/// A single PM2.5 report decoded from a sensor response
///
/// [`crate::decode`] is the only constructor on the receive path. The fields
/// stay public so readings can be built for display and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SensorReading {
    /// PM2.5 density as reported by the device (µg/m³)
    pub pm25: u16,
    /// Hardware address embedded in the report
    pub source_address: DeviceAddress,
    /// UDP endpoint the report was received from
    pub source_socket_address: SocketAddr,
}

impl SensorReading {
    /// Air quality level for this reading's PM2.5 density
    pub fn air_quality(&self) -> AirQuality {
        AirQuality::from_pm25(self.pm25)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reading_air_quality() {
        let reading = SensorReading {
            pm25: 36,
            source_address: DeviceAddress::from_bytes([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]),
            source_socket_address: "192.168.1.40:11530".parse().unwrap(),
        };

        assert_eq!(reading.air_quality(), AirQuality::Fair);
    }
}
