//! Configuration types for the air352-poller crate
//!
//! This module defines the settings that control how refresh cycles talk to
//! the multicast group and how their outcomes are folded into poll state.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

use air352_protocol::{DEFAULT_MULTICAST_GROUP, DEFAULT_PORT};

use crate::error::{PollerError, Result};
use crate::transport::EndpointConfig;

/// Longest accepted response timeout
pub const MAX_RESPONSE_TIMEOUT: Duration = Duration::from_secs(3600);

/// Longest accepted linger window
pub const MAX_LINGER: Duration = Duration::from_secs(60);

/// Configuration for the SensorPoller
///
/// Every coordinator created by a poller receives a copy of these values;
/// nothing is read from process-wide state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollerConfig {
    /// Multicast group the query is sent to and responses arrive on
    /// Default: 233.255.255.255
    pub multicast_group: Ipv4Addr,

    /// UDP port the sensors listen on; also the local receive port
    /// Default: 11530
    pub port: u16,

    /// Local address the receive endpoint binds to
    /// Default: 0.0.0.0
    pub bind_address: Ipv4Addr,

    /// Interface used to join the multicast group
    /// Default: 0.0.0.0 (let the OS choose)
    pub interface: Ipv4Addr,

    /// How long to wait for a matching response after the query is sent
    /// Default: 15 seconds
    pub response_timeout: Duration,

    /// Grace window after the response timeout for a reply already in flight
    /// Default: 500 milliseconds
    pub linger: Duration,

    /// Poll interval used when a caller has no interval of its own
    /// Default: 60 seconds
    pub default_poll_interval: Duration,

    /// Consecutive failed cycles before a target is reported unavailable
    /// Default: 1
    pub failures_before_unavailable: u32,

    /// Capacity of the update broadcast channel
    /// Default: 64
    pub update_buffer_size: usize,

    /// Maximum number of registered targets
    /// Default: 32
    pub max_targets: usize,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            multicast_group: DEFAULT_MULTICAST_GROUP,
            port: DEFAULT_PORT,
            bind_address: Ipv4Addr::UNSPECIFIED,
            interface: Ipv4Addr::UNSPECIFIED,
            response_timeout: Duration::from_secs(15),
            linger: Duration::from_millis(500),
            default_poll_interval: Duration::from_secs(60),
            failures_before_unavailable: 1,
            update_buffer_size: 64,
            max_targets: 32,
        }
    }
}

impl PollerConfig {
    /// Create a new PollerConfig with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a PollerConfig that tolerates a few missed replies before
    /// reporting a sensor unavailable
    pub fn tolerant() -> Self {
        Self {
            failures_before_unavailable: 3,
            ..Default::default()
        }
    }

    /// Create a PollerConfig for interactive use with short timeouts
    pub fn responsive() -> Self {
        Self {
            response_timeout: Duration::from_secs(3),
            linger: Duration::from_millis(200),
            default_poll_interval: Duration::from_secs(10),
            ..Default::default()
        }
    }

    /// Validate the configuration and return any issues
    pub fn validate(&self) -> Result<()> {
        if !self.multicast_group.is_multicast() {
            return Err(PollerError::Configuration(format!(
                "{} is not a multicast group address",
                self.multicast_group
            )));
        }

        if self.port == 0 {
            return Err(PollerError::Configuration(
                "Port must not be 0".to_string(),
            ));
        }

        if self.response_timeout == Duration::ZERO {
            return Err(PollerError::Configuration(
                "Response timeout must be greater than 0".to_string(),
            ));
        }

        if self.response_timeout > MAX_RESPONSE_TIMEOUT {
            return Err(PollerError::Configuration(format!(
                "Response timeout must not exceed {:?}",
                MAX_RESPONSE_TIMEOUT
            )));
        }

        if self.linger > MAX_LINGER {
            return Err(PollerError::Configuration(format!(
                "Linger must not exceed {:?}",
                MAX_LINGER
            )));
        }

        if self.default_poll_interval == Duration::ZERO {
            return Err(PollerError::Configuration(
                "Poll interval must be greater than 0".to_string(),
            ));
        }

        if self.failures_before_unavailable == 0 {
            return Err(PollerError::Configuration(
                "Failures before unavailable must be at least 1".to_string(),
            ));
        }

        if self.update_buffer_size == 0 {
            return Err(PollerError::Configuration(
                "Update buffer size must be greater than 0".to_string(),
            ));
        }

        if self.max_targets == 0 {
            return Err(PollerError::Configuration(
                "Max targets must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Endpoint settings handed to the transport for each cycle
    pub fn endpoint(&self) -> EndpointConfig {
        EndpointConfig {
            bind: SocketAddrV4::new(self.bind_address, self.port),
            group: self.multicast_group,
            interface: self.interface,
            destination: SocketAddr::V4(SocketAddrV4::new(self.multicast_group, self.port)),
        }
    }

    /// Builder pattern methods for fluent configuration

    pub fn with_group(mut self, group: Ipv4Addr, port: u16) -> Self {
        self.multicast_group = group;
        self.port = port;
        self
    }

    pub fn with_interface(mut self, interface: Ipv4Addr) -> Self {
        self.interface = interface;
        self
    }

    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    pub fn with_linger(mut self, linger: Duration) -> Self {
        self.linger = linger;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.default_poll_interval = interval;
        self
    }

    pub fn with_failures_before_unavailable(mut self, failures: u32) -> Self {
        self.failures_before_unavailable = failures;
        self
    }

    pub fn with_max_targets(mut self, max: usize) -> Self {
        self.max_targets = max;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_default_config() {
        let config = PollerConfig::default();
        assert_eq!(config.multicast_group, Ipv4Addr::new(233, 255, 255, 255));
        assert_eq!(config.port, 11530);
        assert_eq!(config.response_timeout, Duration::from_secs(15));
        assert_eq!(config.linger, Duration::from_millis(500));
        assert_eq!(config.failures_before_unavailable, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_endpoint_from_config() {
        let endpoint = PollerConfig::default().endpoint();
        assert_eq!(endpoint.bind, "0.0.0.0:11530".parse::<SocketAddrV4>().unwrap());
        assert_eq!(endpoint.destination, "233.255.255.255:11530".parse::<SocketAddr>().unwrap());
        assert_eq!(endpoint.group, Ipv4Addr::new(233, 255, 255, 255));
    }

    #[rstest]
    #[case(PollerConfig { multicast_group: Ipv4Addr::new(192, 168, 1, 1), ..Default::default() })]
    #[case(PollerConfig { port: 0, ..Default::default() })]
    #[case(PollerConfig { response_timeout: Duration::ZERO, ..Default::default() })]
    #[case(PollerConfig { response_timeout: Duration::from_secs(u64::MAX), ..Default::default() })]
    #[case(PollerConfig { response_timeout: Duration::from_secs(3601), ..Default::default() })]
    #[case(PollerConfig { linger: Duration::MAX, ..Default::default() })]
    #[case(PollerConfig { default_poll_interval: Duration::ZERO, ..Default::default() })]
    #[case(PollerConfig { failures_before_unavailable: 0, ..Default::default() })]
    #[case(PollerConfig { update_buffer_size: 0, ..Default::default() })]
    #[case(PollerConfig { max_targets: 0, ..Default::default() })]
    fn test_config_validation(#[case] config: PollerConfig) {
        assert!(matches!(config.validate(), Err(PollerError::Configuration(_))));
    }

    #[test]
    fn test_zero_linger_is_valid() {
        let config = PollerConfig::new().with_linger(Duration::ZERO);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_longest_timings_are_valid() {
        let config = PollerConfig::new()
            .with_response_timeout(MAX_RESPONSE_TIMEOUT)
            .with_linger(MAX_LINGER);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_presets() {
        let tolerant = PollerConfig::tolerant();
        assert_eq!(tolerant.failures_before_unavailable, 3);
        assert!(tolerant.validate().is_ok());

        let responsive = PollerConfig::responsive();
        assert_eq!(responsive.response_timeout, Duration::from_secs(3));
        assert!(responsive.validate().is_ok());
    }

    #[test]
    fn test_builder_pattern() {
        let config = PollerConfig::new()
            .with_group(Ipv4Addr::new(239, 1, 2, 3), 40000)
            .with_interface(Ipv4Addr::new(192, 168, 1, 10))
            .with_response_timeout(Duration::from_secs(5))
            .with_poll_interval(Duration::from_secs(30))
            .with_failures_before_unavailable(2)
            .with_max_targets(4);

        assert_eq!(config.endpoint().destination, "239.1.2.3:40000".parse::<SocketAddr>().unwrap());
        assert_eq!(config.interface, Ipv4Addr::new(192, 168, 1, 10));
        assert_eq!(config.response_timeout, Duration::from_secs(5));
        assert_eq!(config.default_poll_interval, Duration::from_secs(30));
        assert_eq!(config.failures_before_unavailable, 2);
        assert_eq!(config.max_targets, 4);
        assert!(config.validate().is_ok());
    }
}
