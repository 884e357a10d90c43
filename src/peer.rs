//! Peer table: a mapping from source IPv4 address to last-seen peer
//! descriptor, per SPEC_FULL §4.5.
//!
//! Grounded on `net/peer.rs`'s `Peer`/`PeerInfo` + `From<&Peer>` snapshot
//! pattern and `net/connection.rs`'s `tokio::sync::Mutex`-guarded collection
//! with an expiry sweep, stripped down to what MChat actually needs (no
//! handshake state, no inventory, no rate limiting — just identity and
//! presence).

use std::net::Ipv4Addr;

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::debug;

use crate::proto::ParsedRecord;
use crate::proto::HeaderKind;
use crate::time::now_micros;

/// Keepalive interval (§6.1). Peer entries expire after 5× this.
pub const KEEPALIVE_INTERVAL_SECS: u64 = 3;
pub const PEER_EXPIRY_MICROS: u64 = 5 * KEEPALIVE_INTERVAL_SECS * 1_000_000;

#[derive(Debug, Clone)]
pub struct Peer {
    pub nickname: String,
    pub channel: String,
    pub last_seen: u64,
    pub source_address: Ipv4Addr,
}

/// Owned snapshot for external inspection — the `snapshot()` deep copy
/// SPEC_FULL §4.5 calls for.
#[derive(Debug, Clone, Serialize)]
pub struct PeerInfo {
    pub nickname: String,
    pub channel: String,
    pub last_seen: u64,
    pub source_address: Ipv4Addr,
}

impl From<&Peer> for PeerInfo {
    fn from(p: &Peer) -> Self {
        Self {
            nickname: p.nickname.clone(),
            channel: p.channel.clone(),
            last_seen: p.last_seen,
            source_address: p.source_address,
        }
    }
}

#[derive(Default)]
pub struct PeerTable {
    peers: Mutex<Vec<Peer>>,
}

impl PeerTable {
    pub fn new() -> Self {
        Self { peers: Mutex::new(Vec::new()) }
    }

    /// Insert-or-refresh from a validated record carrying `Nickname` and
    /// `Channel` headers (TEXT or PING). The `Channel` value is advisory —
    /// a PING on the common channel may report `<Not Connected>` for its
    /// sender (SPEC_FULL §9).
    pub async fn update(&self, record: &ParsedRecord<'_>, source_address: Ipv4Addr) {
        let nickname = record.headers.get_str(HeaderKind::Nickname).unwrap_or("").to_string();
        let channel = record.headers.get_str(HeaderKind::Channel).unwrap_or("").to_string();
        let now = now_micros();

        let mut peers = self.peers.lock().await;
        match peers.iter_mut().find(|p| p.source_address == source_address) {
            Some(existing) => {
                existing.nickname = nickname;
                existing.channel = channel;
                existing.last_seen = now;
            }
            None => {
                debug!(%source_address, "peer table: new peer");
                peers.push(Peer { nickname, channel, last_seen: now, source_address });
            }
        }
    }

    pub async fn query(&self, source_address: Ipv4Addr) -> Option<Peer> {
        self.peers.lock().await.iter().find(|p| p.source_address == source_address).cloned()
    }

    /// Remove entries not seen in over `PEER_EXPIRY_MICROS`. Swap-remove is
    /// fine here — callers never rely on table order.
    pub async fn expire(&self) {
        let now = now_micros();
        let mut peers = self.peers.lock().await;
        let mut i = 0;
        while i < peers.len() {
            if now.saturating_sub(peers[i].last_seen) > PEER_EXPIRY_MICROS {
                debug!(addr = %peers[i].source_address, "peer table: expiring peer");
                peers.swap_remove(i);
            } else {
                i += 1;
            }
        }
    }

    pub async fn snapshot(&self) -> Vec<PeerInfo> {
        self.peers.lock().await.iter().map(PeerInfo::from).collect()
    }

    pub async fn len(&self) -> usize {
        self.peers.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::parse;

    fn ping(nick: &str, chan: &str) -> Vec<u8> {
        format!("PING MCHAT/1.0\r\nNickname: {nick}\r\nChannel: {chan}\r\n\r\n").into_bytes()
    }

    #[tokio::test]
    async fn update_then_query_round_trips() {
        let table = PeerTable::new();
        let addr = Ipv4Addr::new(10, 0, 0, 5);
        let bytes = ping("sean", "#mchat");
        let rec = parse(&bytes);
        table.update(&rec, addr).await;

        let peer = table.query(addr).await.expect("peer present");
        assert_eq!(peer.nickname, "sean");
        assert_eq!(peer.channel, "#mchat");
    }

    #[tokio::test]
    async fn repeated_update_is_idempotent_in_count() {
        let table = PeerTable::new();
        let addr = Ipv4Addr::new(10, 0, 0, 5);
        for _ in 0..5 {
            let bytes = ping("sean", "#mchat");
            let rec = parse(&bytes);
            table.update(&rec, addr).await;
        }
        assert_eq!(table.len().await, 1);
    }

    #[tokio::test]
    async fn update_overwrites_last_observed_fields() {
        let table = PeerTable::new();
        let addr = Ipv4Addr::new(10, 0, 0, 5);
        let first = parse(&ping("sean", "#mchat"));
        table.update(&first, addr).await;
        let second = parse(&ping("sean2", "#dev"));
        table.update(&second, addr).await;

        let peer = table.query(addr).await.unwrap();
        assert_eq!(peer.nickname, "sean2");
        assert_eq!(peer.channel, "#dev");
    }

    #[tokio::test]
    async fn expire_removes_stale_entries() {
        let table = PeerTable::new();
        let addr = Ipv4Addr::new(10, 0, 0, 5);
        table.peers.lock().await.push(Peer {
            nickname: "old".into(),
            channel: "#mchat".into(),
            last_seen: 0,
            source_address: addr,
        });
        table.expire().await;
        assert_eq!(table.len().await, 0);
    }
}
