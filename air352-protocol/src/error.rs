//! Error types for the wire codec.

/// Reasons a datagram is not a sensor report.
///
/// These are expected on a shared multicast group and are not protocol
/// violations worth surfacing to an end user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The datagram is not exactly 33 bytes long
    #[error("Bad packet length: expected 33 bytes, got {actual}")]
    BadLength {
        /// Length of the rejected datagram
        actual: usize,
    },

    /// The first byte is not the protocol magic
    #[error("Bad magic byte: expected 0xA1, got {found:#04X}")]
    BadMagic {
        /// First byte of the rejected datagram
        found: u8,
    },
}

/// Errors from parsing a user-supplied device address.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    /// Wrong number of hex digits after separators were stripped
    #[error("Invalid device address '{input}': expected 12 hex digits, got {digits}")]
    WrongLength {
        /// Original input
        input: String,
        /// Number of non-separator characters found
        digits: usize,
    },

    /// A character that is neither a hex digit nor a separator
    #[error("Invalid device address '{input}': '{character}' is not a hex digit")]
    InvalidCharacter {
        /// Original input
        input: String,
        /// Offending character
        character: char,
    },
}

/// Convenience Result type alias for decode operations.
pub type Result<T> = std::result::Result<T, DecodeError>;
