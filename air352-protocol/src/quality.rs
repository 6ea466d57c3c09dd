//! Air quality level derived from PM2.5 density

use serde::{Deserialize, Serialize};
use std::fmt;

/// Qualitative air quality for a PM2.5 density in µg/m³
///
/// Ranges, inclusive: 0..=11 excellent, 12..=35 good, 36..=55 fair,
/// 56..=150 inferior, above 150 poor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AirQuality {
    Excellent,
    Good,
    Fair,
    Inferior,
    Poor,
}

impl AirQuality {
    pub fn from_pm25(pm25: u16) -> Self {
        match pm25 {
            0..=11 => AirQuality::Excellent,
            12..=35 => AirQuality::Good,
            36..=55 => AirQuality::Fair,
            56..=150 => AirQuality::Inferior,
            _ => AirQuality::Poor,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AirQuality::Excellent => "excellent",
            AirQuality::Good => "good",
            AirQuality::Fair => "fair",
            AirQuality::Inferior => "inferior",
            AirQuality::Poor => "poor",
        }
    }
}

impl fmt::Display for AirQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
