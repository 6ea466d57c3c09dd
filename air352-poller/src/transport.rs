//! UDP multicast transport
//!
//! A refresh cycle opens one endpoint, sends the query, reads datagrams and
//! drops the endpoint. The traits here are the seam between the cycle logic
//! and the socket so that cycles can be driven by scripted endpoints in
//! tests.

use async_trait::async_trait;
use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use tokio::net::UdpSocket;

/// Where a cycle's endpoint binds and where its query goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointConfig {
    /// Local receive address
    pub bind: SocketAddrV4,
    /// Multicast group to join
    pub group: Ipv4Addr,
    /// Interface to join the group on
    pub interface: Ipv4Addr,
    /// Destination of the query command
    pub destination: SocketAddr,
}

/// Opens datagram endpoints for refresh cycles
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Open an endpoint bound and joined according to `config`
    ///
    /// The endpoint must release every OS resource (socket, group
    /// membership) when dropped.
    async fn open(&self, config: &EndpointConfig) -> io::Result<Box<dyn DatagramEndpoint>>;
}

/// An open, receive-capable datagram endpoint owned by one cycle
#[async_trait]
pub trait DatagramEndpoint: Send {
    /// Send a datagram to `target`
    async fn send_to(&mut self, payload: &[u8], target: SocketAddr) -> io::Result<usize>;

    /// Wait for the next datagram
    async fn recv_from(&mut self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)>;
}

/// Transport backed by a tokio UDP socket joined to the multicast group
///
/// The socket is bound without `SO_REUSEADDR`, so the receive port is held
/// exclusively for the life of a cycle. If another process (a home
/// automation hub, for example) already listens on the port, `open` fails
/// with `AddrInUse` and the cycle resolves to `TransportError`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MulticastTransport;

impl MulticastTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transport for MulticastTransport {
    async fn open(&self, config: &EndpointConfig) -> io::Result<Box<dyn DatagramEndpoint>> {
        let socket = UdpSocket::bind(SocketAddr::V4(config.bind)).await?;
        socket.join_multicast_v4(config.group, config.interface)?;
        socket.set_multicast_loop_v4(true)?;

        tracing::debug!(
            "Opened endpoint on {} joined to {}",
            config.bind,
            config.group
        );

        Ok(Box::new(MulticastEndpoint {
            socket,
            group: config.group,
            interface: config.interface,
        }))
    }
}

struct MulticastEndpoint {
    socket: UdpSocket,
    group: Ipv4Addr,
    interface: Ipv4Addr,
}

#[async_trait]
impl DatagramEndpoint for MulticastEndpoint {
    async fn send_to(&mut self, payload: &[u8], target: SocketAddr) -> io::Result<usize> {
        self.socket.send_to(payload, target).await
    }

    async fn recv_from(&mut self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        self.socket.recv_from(buf).await
    }
}

impl Drop for MulticastEndpoint {
    fn drop(&mut self) {
        // Membership must not outlive the cycle that joined it
        if let Err(e) = self.socket.leave_multicast_v4(self.group, self.interface) {
            tracing::debug!("Failed to leave multicast group {}: {}", self.group, e);
        }
        tracing::debug!("Closed endpoint for group {}", self.group);
    }
}
