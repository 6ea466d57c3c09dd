//! Error types for the air352-poller crate.

use serde::Serialize;

use air352_protocol::AddressError;

use crate::poller::TargetHandle;

/// Why a refresh cycle did not produce a reading.
///
/// Every cycle resolves to exactly one outcome, so these are values handed
/// back to the caller rather than faults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
pub enum RefreshFailed {
    /// No datagram of any kind matched before the deadline
    #[error("Timed out waiting for a sensor response")]
    Timeout,

    /// Opening, sending on, or receiving from the endpoint failed
    #[error("Transport error: {0}")]
    TransportError(String),

    /// The cycle was cancelled by deregistration or shutdown
    #[error("Refresh cancelled")]
    Cancelled,

    /// Only other devices answered before the deadline
    #[error("Deadline expired after ignoring {ignored} response(s) from other devices")]
    AddressMismatch {
        /// Number of valid reports from non-target devices
        ignored: u32,
    },
}

/// Errors from misuse of the SensorPoller facade.
#[derive(Debug, thiserror::Error)]
pub enum PollerError {
    /// The handle is not (or no longer) registered
    #[error("Unknown target: {0}")]
    UnknownTarget(TargetHandle),

    /// The device address could not be parsed
    #[error("Invalid device address: {0}")]
    InvalidAddress(#[from] AddressError),

    /// Invalid configuration or registration limits exceeded
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The poller has been shut down
    #[error("Poller has been shut down")]
    ShutDown,
}

/// Convenience type alias for Results using PollerError.
pub type Result<T> = std::result::Result<T, PollerError>;
