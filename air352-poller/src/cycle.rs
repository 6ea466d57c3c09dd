//! One bounded request/response exchange
//!
//! A cycle opens an endpoint, sends the query, and reads datagrams until a
//! report from the target arrives or the deadline passes. Each datagram is
//! only classified here; the caller decides what the resulting outcome does
//! to poll state.

use std::net::SocketAddr;
use std::time::Duration;
use tokio::time::Instant;

use air352_protocol::{decode, encode_query, DecodeError, DeviceAddress, SensorReading};

use crate::error::RefreshFailed;
use crate::state::RefreshOutcome;
use crate::transport::{DatagramEndpoint, EndpointConfig, Transport};

const RECV_BUFFER_LEN: usize = 2048;

/// Stand-in deadline for budgets too large to represent as an `Instant`
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// Timing and addressing for a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CycleSettings {
    pub endpoint: EndpointConfig,
    pub response_timeout: Duration,
    pub linger: Duration,
}

/// What one inbound datagram means for the current cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Candidate {
    /// Not a sensor report
    Noise(DecodeError),
    /// A valid report from a sensor we are not polling
    OtherDevice(SensorReading),
    /// The report this cycle is waiting for
    Match(SensorReading),
}

pub(crate) fn deadline_after(start: Instant, budget: Duration) -> Instant {
    start
        .checked_add(budget)
        .or_else(|| start.checked_add(FAR_FUTURE))
        .unwrap_or(start)
}

pub(crate) fn classify(buffer: &[u8], sender: SocketAddr, target: DeviceAddress) -> Candidate {
    match decode(buffer, sender) {
        Err(reason) => Candidate::Noise(reason),
        Ok(reading) if reading.source_address == target => Candidate::Match(reading),
        Ok(reading) => Candidate::OtherDevice(reading),
    }
}

/// Run one cycle to completion
///
/// The whole cycle, open included, finishes within `response_timeout +
/// linger` of its start.
///
/// The endpoint is owned by this function, so it is closed on every return
/// path and also when the returned future is dropped mid-flight.
pub(crate) async fn run(
    transport: &dyn Transport,
    settings: &CycleSettings,
    target: DeviceAddress,
) -> RefreshOutcome {
    let started = Instant::now();
    let deadline = deadline_after(
        started,
        settings.response_timeout.saturating_add(settings.linger),
    );

    let opened = tokio::time::timeout_at(
        deadline_after(started, settings.response_timeout),
        transport.open(&settings.endpoint),
    )
    .await;
    let mut endpoint = match opened {
        Ok(Ok(endpoint)) => endpoint,
        Ok(Err(e)) => {
            tracing::error!(
                "Failed to open endpoint on {} for {}: {}",
                settings.endpoint.bind,
                target,
                e
            );
            return RefreshOutcome::Failed(RefreshFailed::TransportError(format!(
                "Failed to open endpoint on {}: {}",
                settings.endpoint.bind, e
            )));
        }
        Err(_) => {
            tracing::error!("Timed out opening endpoint on {}", settings.endpoint.bind);
            return RefreshOutcome::Failed(RefreshFailed::TransportError(format!(
                "Timed out opening endpoint on {}",
                settings.endpoint.bind
            )));
        }
    };

    if let Err(e) = endpoint
        .send_to(encode_query(), settings.endpoint.destination)
        .await
    {
        return RefreshOutcome::Failed(RefreshFailed::TransportError(format!(
            "Failed to send query to {}: {}",
            settings.endpoint.destination, e
        )));
    }

    let outcome = await_report(endpoint.as_mut(), target, deadline).await;
    drop(endpoint);
    outcome
}

async fn await_report(
    endpoint: &mut dyn DatagramEndpoint,
    target: DeviceAddress,
    deadline: Instant,
) -> RefreshOutcome {
    let mut buffer = [0u8; RECV_BUFFER_LEN];
    let mut ignored = 0u32;

    loop {
        let received = tokio::time::timeout_at(deadline, endpoint.recv_from(&mut buffer)).await;
        let (len, sender) = match received {
            Err(_) => break,
            Ok(Err(e)) => {
                return RefreshOutcome::Failed(RefreshFailed::TransportError(format!(
                    "Failed to receive: {}",
                    e
                )));
            }
            Ok(Ok(received)) => received,
        };

        match classify(&buffer[..len], sender, target) {
            Candidate::Match(reading) => {
                tracing::debug!("Report from {} at {}: pm25={}", target, sender, reading.pm25);
                return RefreshOutcome::Success(reading);
            }
            Candidate::OtherDevice(reading) => {
                ignored = ignored.saturating_add(1);
                tracing::debug!(
                    "Ignoring report from {} at {} while polling {}",
                    reading.source_address,
                    sender,
                    target
                );
            }
            Candidate::Noise(reason) => {
                tracing::trace!("Discarding datagram from {}: {}", sender, reason);
            }
        }
    }

    if ignored > 0 {
        RefreshOutcome::Failed(RefreshFailed::AddressMismatch { ignored })
    } else {
        RefreshOutcome::Failed(RefreshFailed::Timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use air352_protocol::{MAGIC, PM25_OFFSET, RESPONSE_LEN};

    fn sender() -> SocketAddr {
        "192.168.1.40:11530".parse().unwrap()
    }

    fn report(address: [u8; 6], pm25: u16) -> Vec<u8> {
        let mut frame = vec![0u8; RESPONSE_LEN];
        frame[0] = MAGIC;
        frame[2..8].copy_from_slice(&address);
        frame[PM25_OFFSET..PM25_OFFSET + 2].copy_from_slice(&pm25.to_be_bytes());
        frame
    }

    /// Endpoint that answers once and then stays silent
    struct Answering(Option<Vec<u8>>);

    #[async_trait::async_trait]
    impl DatagramEndpoint for Answering {
        async fn send_to(&mut self, payload: &[u8], _target: SocketAddr) -> std::io::Result<usize> {
            Ok(payload.len())
        }

        async fn recv_from(&mut self, buf: &mut [u8]) -> std::io::Result<(usize, SocketAddr)> {
            match self.0.take() {
                Some(frame) => {
                    buf[..frame.len()].copy_from_slice(&frame);
                    Ok((frame.len(), sender()))
                }
                None => std::future::pending().await,
            }
        }
    }

    struct AnsweringTransport(Vec<u8>);

    #[async_trait::async_trait]
    impl Transport for AnsweringTransport {
        async fn open(
            &self,
            _config: &EndpointConfig,
        ) -> std::io::Result<Box<dyn DatagramEndpoint>> {
            Ok(Box::new(Answering(Some(self.0.clone()))))
        }
    }

    #[test]
    fn test_deadline_after_saturates() {
        let now = Instant::now();

        assert_eq!(deadline_after(now, Duration::from_secs(2)), now + Duration::from_secs(2));
        assert!(deadline_after(now, Duration::MAX) > now + Duration::from_secs(86400));
    }

    #[tokio::test]
    async fn test_cycle_with_unbounded_budget_completes() {
        let target: DeviceAddress = "AABBCCDDEEFF".parse().unwrap();
        let transport = AnsweringTransport(report([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF], 35));
        let settings = CycleSettings {
            endpoint: crate::config::PollerConfig::default().endpoint(),
            response_timeout: Duration::MAX,
            linger: Duration::MAX,
        };

        let outcome = run(&transport, &settings, target).await;
        assert_eq!(outcome.reading().map(|r| r.pm25), Some(35));
    }

    #[test]
    fn test_classify_match() {
        let target: DeviceAddress = "AABBCCDDEEFF".parse().unwrap();
        let frame = report([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF], 35);

        match classify(&frame, sender(), target) {
            Candidate::Match(reading) => assert_eq!(reading.pm25, 35),
            other => panic!("Expected Match, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_other_device() {
        let target: DeviceAddress = "AABBCCDDEEFF".parse().unwrap();
        let frame = report([0x11, 0x22, 0x33, 0x44, 0x55, 0x66], 80);

        assert!(matches!(
            classify(&frame, sender(), target),
            Candidate::OtherDevice(reading) if reading.source_address.to_string() == "112233445566"
        ));
    }

    #[test]
    fn test_classify_noise() {
        let target: DeviceAddress = "AABBCCDDEEFF".parse().unwrap();

        assert_eq!(
            classify(encode_query(), sender(), target),
            Candidate::Noise(DecodeError::BadLength { actual: 13 })
        );

        let mut frame = report([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF], 35);
        frame[0] = 0x00;
        assert_eq!(
            classify(&frame, sender(), target),
            Candidate::Noise(DecodeError::BadMagic { found: 0x00 })
        );
    }
}
