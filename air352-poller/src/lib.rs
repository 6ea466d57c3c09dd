//! # 352Air Poller
//!
//! Keeps a "last known value + availability" view of 352Air M25 PM2.5
//! sensors on top of their best-effort UDP multicast protocol.
//!
//! ## Overview
//!
//! Each refresh cycle opens a fresh endpoint on the sensor port, joins the
//! multicast group, sends the query, and waits a bounded time for a report
//! from the target sensor. The cycle always yields exactly one
//! [`RefreshOutcome`] and always closes its endpoint.
//!
//! - **One coordinator per sensor**: [`PollingCoordinator`] owns the
//!   [`PollState`] of a single target and runs at most one cycle at a time.
//!   Concurrent refresh requests for the same target are coalesced.
//! - **Port ownership**: cycles for different sensors that share a receive
//!   port take turns through a process-wide [`PortLeases`] table.
//! - **Last good value persists**: a failed cycle keeps the previous
//!   reading and marks the sensor unavailable once the configured number of
//!   consecutive failures is reached.
//! - **Facade**: [`SensorPoller`] registers targets, refreshes them on
//!   demand or on a schedule, and broadcasts a [`PollUpdate`] per cycle.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use air352_poller::{PollerConfig, RefreshOutcome, SensorPoller};
//!
//! # async fn run() -> air352_poller::Result<()> {
//! let poller = SensorPoller::new(PollerConfig::default())?;
//! let handle = poller.register("AABBCCDDEEFF".parse()?)?;
//!
//! match poller.refresh_now(handle).await? {
//!     RefreshOutcome::Success(reading) => println!("PM2.5: {}", reading.pm25),
//!     RefreshOutcome::Failed(reason) => println!("No reading: {}", reason),
//! }
//!
//! poller.start_polling(handle)?;
//! let mut updates = poller.subscribe();
//! while let Ok(update) = updates.recv().await {
//!     println!("{}: available={}", update.address, update.state.available);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod coordinator;
mod cycle;
pub mod error;
pub mod lease;
pub mod logging;
pub mod poller;
mod scheduler;
pub mod state;
pub mod transport;

pub use config::{PollerConfig, MAX_LINGER, MAX_RESPONSE_TIMEOUT};
pub use coordinator::PollingCoordinator;
pub use error::{PollerError, RefreshFailed, Result};
pub use lease::{PortLease, PortLeases};
pub use poller::{PollUpdate, SensorPoller, TargetHandle};
pub use state::{AvailabilityPolicy, PollState, RefreshOutcome};
pub use transport::{DatagramEndpoint, EndpointConfig, MulticastTransport, Transport};

// Re-export commonly used types from the protocol crate
pub use air352_protocol::{DecodeError, DeviceAddress, SensorReading};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        DeviceAddress, PollState, PollUpdate, PollerConfig, PollerError, RefreshFailed,
        RefreshOutcome, Result, SensorPoller, SensorReading, TargetHandle,
    };
}
