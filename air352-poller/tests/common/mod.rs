//! Scripted transport for driving refresh cycles without a network.
//!
//! Each call to `open` takes the next queued script (or silence if none is
//! queued). Counters are shared through `Arc`s so tests can observe how many
//! endpoints were opened, how many are open right now and what was sent.

#![allow(dead_code)]

use air352_poller::{DatagramEndpoint, EndpointConfig, PollerConfig, Transport};
use air352_protocol::{DeviceAddress, MAGIC, PM25_OFFSET, RESPONSE_LEN};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One datagram delivered to the endpoint after `delay`
#[derive(Debug, Clone)]
pub struct Scripted {
    pub delay: Duration,
    pub from: SocketAddr,
    pub bytes: Vec<u8>,
}

impl Scripted {
    pub fn after_ms(delay: u64, bytes: Vec<u8>) -> Self {
        Self {
            delay: Duration::from_millis(delay),
            from: sensor_socket(),
            bytes,
        }
    }
}

#[derive(Clone, Default)]
pub struct MockTransport {
    scripts: Arc<Mutex<VecDeque<Vec<Scripted>>>>,
    fail_opens: Arc<AtomicU32>,
    opens: Arc<AtomicU32>,
    active: Arc<AtomicU32>,
    max_active: Arc<AtomicU32>,
    closed: Arc<AtomicU32>,
    sent: Arc<Mutex<Vec<(Vec<u8>, SocketAddr)>>>,
    binds: Arc<Mutex<Vec<EndpointConfig>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the datagrams the next opened endpoint will receive
    pub fn push_script(&self, script: Vec<Scripted>) -> &Self {
        self.scripts.lock().unwrap().push_back(script);
        self
    }

    /// Make the next `count` opens fail with AddrInUse
    pub fn fail_next_opens(&self, count: u32) {
        self.fail_opens.store(count, Ordering::SeqCst);
    }

    pub fn opens(&self) -> u32 {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn active(&self) -> u32 {
        self.active.load(Ordering::SeqCst)
    }

    pub fn max_active(&self) -> u32 {
        self.max_active.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> u32 {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<(Vec<u8>, SocketAddr)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn binds(&self) -> Vec<EndpointConfig> {
        self.binds.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn open(&self, config: &EndpointConfig) -> io::Result<Box<dyn DatagramEndpoint>> {
        let should_fail = self
            .fail_opens
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(io::Error::new(io::ErrorKind::AddrInUse, "port already bound"));
        }

        self.opens.fetch_add(1, Ordering::SeqCst);
        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now_active, Ordering::SeqCst);
        self.binds.lock().unwrap().push(*config);

        let script = self.scripts.lock().unwrap().pop_front().unwrap_or_default();
        Ok(Box::new(MockEndpoint {
            script: script.into(),
            transport: self.clone(),
        }))
    }
}

struct MockEndpoint {
    script: VecDeque<Scripted>,
    transport: MockTransport,
}

#[async_trait]
impl DatagramEndpoint for MockEndpoint {
    async fn send_to(&mut self, payload: &[u8], target: SocketAddr) -> io::Result<usize> {
        self.transport
            .sent
            .lock()
            .unwrap()
            .push((payload.to_vec(), target));
        Ok(payload.len())
    }

    async fn recv_from(&mut self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        let Some(next) = self.script.pop_front() else {
            return std::future::pending().await;
        };

        tokio::time::sleep(next.delay).await;
        let len = next.bytes.len().min(buf.len());
        buf[..len].copy_from_slice(&next.bytes[..len]);
        Ok((len, next.from))
    }
}

impl Drop for MockEndpoint {
    fn drop(&mut self) {
        self.transport.active.fetch_sub(1, Ordering::SeqCst);
        self.transport.closed.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn sensor_socket() -> SocketAddr {
    "192.168.1.40:11530".parse().unwrap()
}

pub fn address(text: &str) -> DeviceAddress {
    text.parse().unwrap()
}

/// A well-formed 33-byte report with filler in the reserved bytes
pub fn report(address: &str, pm25: u16) -> Vec<u8> {
    let mut frame = vec![0x5A; RESPONSE_LEN];
    frame[0] = MAGIC;
    frame[2..8].copy_from_slice(&self::address(address).octets());
    frame[PM25_OFFSET..PM25_OFFSET + 2].copy_from_slice(&pm25.to_be_bytes());
    frame
}

/// Short timings so paused-clock tests stay readable
pub fn test_config() -> PollerConfig {
    PollerConfig::default()
        .with_response_timeout(Duration::from_secs(2))
        .with_linger(Duration::from_millis(100))
}
