//! Rendering of readings and poll updates for the terminal

use air352_poller::{PollState, PollUpdate, RefreshOutcome};
use air352_protocol::{DeviceAddress, SensorReading, MANUFACTURER, MODEL};
use anyhow::{Context, Result};

/// Device label shown before every line
pub fn device_label(address: DeviceAddress) -> String {
    format!("{} {} {}", MANUFACTURER, MODEL, address)
}

pub fn format_reading(reading: &SensorReading) -> String {
    format!(
        "{}: PM2.5 {} ug/m3, {} (from {})",
        device_label(reading.source_address),
        reading.pm25,
        reading.air_quality(),
        reading.source_socket_address
    )
}

/// One line for a refresh outcome and the state it left behind
pub fn format_outcome(
    address: DeviceAddress,
    outcome: &RefreshOutcome,
    state: &PollState,
) -> String {
    match outcome {
        RefreshOutcome::Success(reading) => format_reading(reading),
        RefreshOutcome::Failed(reason) => {
            let last = state
                .last_reading
                .map(|reading| {
                    format!("last PM2.5 {} ug/m3, {}", reading.pm25, reading.air_quality())
                })
                .unwrap_or_else(|| "no reading yet".to_string());
            let availability = if state.available {
                "available"
            } else {
                "unavailable"
            };
            format!(
                "{}: {} ({}, {})",
                device_label(address),
                reason,
                availability,
                last
            )
        }
    }
}

pub fn format_update(update: &PollUpdate) -> String {
    format_outcome(update.address, &update.outcome, &update.state)
}

pub fn outcome_json(
    address: DeviceAddress,
    outcome: &RefreshOutcome,
    state: &PollState,
) -> Result<String> {
    let value = serde_json::json!({
        "manufacturer": MANUFACTURER,
        "model": MODEL,
        "address": address,
        "air_quality": state.air_quality(),
        "outcome": outcome,
        "state": state,
    });
    serde_json::to_string(&value).context("Failed to serialize refresh outcome")
}

pub fn update_json(update: &PollUpdate) -> Result<String> {
    let value = serde_json::json!({
        "manufacturer": MANUFACTURER,
        "model": MODEL,
        "handle": update.handle,
        "address": update.address,
        "air_quality": update.state.air_quality(),
        "outcome": update.outcome,
        "state": update.state,
    });
    serde_json::to_string(&value).context("Failed to serialize poll update")
}
