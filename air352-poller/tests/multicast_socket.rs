//! Refresh cycle over real sockets
//!
//! Needs a host with a multicast route for 233.255.255.255, so it is ignored
//! by default. Run with `cargo test -- --ignored`.

mod common;

use air352_poller::{PollerConfig, SensorPoller};
use common::{address, report};
use std::net::Ipv4Addr;
use std::time::Duration;
use tokio::net::UdpSocket;

const TARGET: &str = "AABBCCDDEEFF";
const TEST_PORT: u16 = 11539;

#[tokio::test]
#[ignore = "requires multicast loopback"]
async fn test_refresh_over_multicast_loopback() {
    let group = Ipv4Addr::new(233, 255, 255, 255);
    let config = PollerConfig::default()
        .with_group(group, TEST_PORT)
        .with_response_timeout(Duration::from_secs(3))
        .with_linger(Duration::from_millis(100));
    let poller = SensorPoller::new(config).unwrap();
    let handle = poller.register(address(TARGET)).unwrap();

    let responder = tokio::spawn(async move {
        let socket = UdpSocket::bind("0.0.0.0:0").await.unwrap();
        socket.set_multicast_loop_v4(true).unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;
        socket
            .send_to(&report(TARGET, 42), (group, TEST_PORT))
            .await
            .unwrap();
    });

    let outcome = poller.refresh_now(handle).await.unwrap();
    responder.await.unwrap();

    assert_eq!(outcome.reading().map(|r| r.pm25), Some(42));
    let state = poller.current_state(handle).unwrap();
    assert!(state.available);
    assert_eq!(state.pm25(), Some(42));
}
