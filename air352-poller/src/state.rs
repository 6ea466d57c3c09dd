//! Poll state and refresh outcomes

use serde::Serialize;
use std::time::Duration;

use air352_protocol::{AirQuality, DeviceAddress, SensorReading};

use crate::error::RefreshFailed;

/// Result of exactly one refresh cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum RefreshOutcome {
    /// A matching report arrived before the deadline
    Success(SensorReading),
    /// The cycle ended without a matching report
    Failed(RefreshFailed),
}

impl RefreshOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RefreshOutcome::Success(_))
    }

    /// The reading, if the cycle succeeded
    pub fn reading(&self) -> Option<&SensorReading> {
        match self {
            RefreshOutcome::Success(reading) => Some(reading),
            RefreshOutcome::Failed(_) => None,
        }
    }

    /// The failure reason, if the cycle failed
    pub fn failure(&self) -> Option<&RefreshFailed> {
        match self {
            RefreshOutcome::Success(_) => None,
            RefreshOutcome::Failed(reason) => Some(reason),
        }
    }
}

/// How many consecutive failures mark a target unavailable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AvailabilityPolicy {
    failures_before_unavailable: u32,
}

impl AvailabilityPolicy {
    /// Any single failure marks the target unavailable
    pub const fn immediate() -> Self {
        Self {
            failures_before_unavailable: 1,
        }
    }

    /// Mark unavailable after `failures` consecutive failures (minimum 1)
    pub fn after(failures: u32) -> Self {
        Self {
            failures_before_unavailable: failures.max(1),
        }
    }

    pub fn failures_before_unavailable(&self) -> u32 {
        self.failures_before_unavailable
    }
}

impl Default for AvailabilityPolicy {
    fn default() -> Self {
        Self::immediate()
    }
}

/// Last known value and availability of one polled sensor
///
/// Only a completed cycle changes this. A failure keeps `last_reading` and
/// may clear `available`; a success replaces `last_reading` and sets it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PollState {
    /// Sensor this state belongs to
    pub target_address: DeviceAddress,
    /// Most recent successful reading
    pub last_reading: Option<SensorReading>,
    /// Whether the sensor is currently considered reachable
    pub available: bool,
    /// Response timeout applied to each cycle
    pub timeout: Duration,
    /// Failed cycles since the last success
    pub consecutive_failures: u32,
    /// Completed cycles since registration
    pub refresh_count: u64,
    /// Reason the most recent cycle failed, cleared on success
    pub last_failure: Option<RefreshFailed>,
}

impl PollState {
    pub fn new(target_address: DeviceAddress, timeout: Duration) -> Self {
        Self {
            target_address,
            last_reading: None,
            available: false,
            timeout,
            consecutive_failures: 0,
            refresh_count: 0,
            last_failure: None,
        }
    }

    /// Most recent PM2.5 value, if any cycle has succeeded
    pub fn pm25(&self) -> Option<u16> {
        self.last_reading.map(|reading| reading.pm25)
    }

    /// Air quality of the most recent reading
    pub fn air_quality(&self) -> Option<AirQuality> {
        self.last_reading.map(|reading| reading.air_quality())
    }

    /// Fold a completed cycle into the state
    pub(crate) fn apply(&mut self, outcome: &RefreshOutcome, policy: AvailabilityPolicy) {
        self.refresh_count += 1;

        match outcome {
            RefreshOutcome::Success(reading) => {
                self.last_reading = Some(*reading);
                self.available = true;
                self.consecutive_failures = 0;
                self.last_failure = None;
            }
            RefreshOutcome::Failed(reason) => {
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                self.last_failure = Some(reason.clone());
                if self.consecutive_failures >= policy.failures_before_unavailable() {
                    self.available = false;
                }
            }
        }
    }
}
