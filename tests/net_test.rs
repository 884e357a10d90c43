//! End-to-end engine tests over real loopback multicast.
//!
//! Two `MchatEngine`s, each bound to `INADDR_ANY` and joined to the same
//! multicast groups, exchange datagrams on the host's loopback interface.
//! Requires multicast routing on `lo`, which is the default on Linux CI
//! runners and local dev boxes alike.

use std::time::Duration;

use mchat::{MchatConfig, MchatEngine};
use tokio::time::sleep;

async fn spawn_engine(nickname: &str) -> MchatEngine {
    let cfg = MchatConfig { nickname: Some(nickname.to_string()), ..Default::default() };
    MchatEngine::init(cfg).await.expect("engine init")
}

#[tokio::test(flavor = "multi_thread")]
async fn two_engines_exchange_text_on_default_channel() {
    let alice = spawn_engine("alice").await;
    let bob = spawn_engine("bob").await;

    alice.connect(None).await.expect("alice connect");
    bob.connect(None).await.expect("bob connect");

    // Let PING announcements land so the peer table is populated too.
    sleep(Duration::from_millis(500)).await;

    alice.send_message(b"hello from alice").await.expect("send");

    let mut received = None;
    for _ in 0..50 {
        if let Ok(Some(msg)) = bob.recv_message().await {
            received = Some(msg);
            break;
        }
        sleep(Duration::from_millis(100)).await;
    }

    let msg = received.expect("bob should receive alice's text message");
    assert_eq!(msg.nickname, "alice");
    assert_eq!(msg.body, b"hello from alice");

    assert!(bob.peers_available().await, "bob should have seen alice in the peer table");
    assert!(alice.peers_available().await, "alice should have seen bob in the peer table");

    alice.destroy().await;
    bob.destroy().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn cdsc_beacon_populates_discovered_channels() {
    let alice = spawn_engine("alice-cdsc").await;
    let bob = spawn_engine("bob-cdsc").await;

    alice
        .add_channel("#dev", Some(std::net::Ipv4Addr::new(230, 0, 0, 9)), Some(9100))
        .await
        .expect("add channel");
    alice.connect(Some("#dev")).await.expect("alice connect to #dev");

    // Common-Send's cdsc_timer only fires once connected to a non-default
    // channel, on a 10s cadence; give it enough headroom to land.
    sleep(Duration::from_secs(11)).await;

    let discovered = bob.get_discovered_channels().await;
    assert!(discovered.iter().any(|c| c.name == "#dev"), "bob should have discovered #dev via CDSC");

    alice.destroy().await;
    bob.destroy().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn stealth_mode_suppresses_beacons() {
    let alice = spawn_engine("alice-stealth").await;
    let bob = spawn_engine("bob-stealth").await;

    alice.set_stealth_mode(true);
    alice.connect(None).await.expect("alice connect");

    sleep(Duration::from_millis(500)).await;
    assert!(!bob.peers_available().await, "stealth engine should not have announced itself");

    alice.destroy().await;
    bob.destroy().await;
}

#[tokio::test]
async fn send_message_rejects_when_not_connected() {
    let alice = spawn_engine("solo").await;
    let err = alice.send_message(b"hi").await.unwrap_err();
    assert!(matches!(err, mchat::MchatError::NotConnected));
    alice.destroy().await;
}

#[tokio::test]
async fn send_message_rejects_empty_and_oversized_bodies() {
    let alice = spawn_engine("solo2").await;
    alice.connect(None).await.expect("connect");

    let empty_err = alice.send_message(b"").await.unwrap_err();
    assert!(matches!(empty_err, mchat::MchatError::EmptyMessage));

    let huge = vec![0u8; 1 << 16];
    let huge_err = alice.send_message(&huge).await.unwrap_err();
    assert!(matches!(huge_err, mchat::MchatError::MessageTooLarge { .. }));

    alice.destroy().await;
}
