//! Channel registry: the *added* and *discovered* collections of §4.6,
//! guarded by one `channels_mutex` the way the original source guards both
//! arrays (plus `current_channel`/`is_connected`) under a single
//! `channels_mutex` — so this crate folds connection state into the same
//! `tokio::sync::Mutex` rather than splitting it across two locks.
//!
//! Grounded on `examples/original_source/libmchat-master/src/mchatv1_utils.c`
//! (`mchat_channel_hash_params`, `mchat_channel_update`, `mchat_channel_expire`)
//! and `mchatv1_channel.c` (`add_channel`/`del_channel` semantics), including
//! the CDSC-insert-bug fix called for in SPEC_FULL §9.1: the discovered entry
//! is actually pushed into the collection on a miss.

use std::net::Ipv4Addr;

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::debug;

use crate::proto::{HeaderKind, ParsedRecord};
use crate::time::now_micros;

pub const DEFAULT_CHANNEL_NAME: &str = "#mchat";
pub const DEFAULT_CHANNEL_ADDRESS: Ipv4Addr = Ipv4Addr::new(230, 0, 0, 1);
pub const DEFAULT_CHANNEL_PORT: u16 = 9009;

pub const COMMON_CHANNEL_ADDRESS: Ipv4Addr = Ipv4Addr::new(230, 0, 0, 0);
pub const COMMON_CHANNEL_PORT: u16 = 9009;

/// CDSC interval (§6.1). Discovered channels expire after 5× this.
pub const CDSC_INTERVAL_SECS: u64 = 10;
pub const CDSC_EXPIRY_MICROS: u64 = 5 * CDSC_INTERVAL_SECS * 1_000_000;

const FNV_OFFSET: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// 32-bit FNV-1a over `name ‖ address-string ‖ little-endian port bytes`.
pub fn channel_id(name: &str, address: Ipv4Addr, port: u16) -> u32 {
    let mut hash = FNV_OFFSET;
    for &b in name.as_bytes() {
        hash = hash.wrapping_mul(FNV_PRIME) ^ (b as u32);
    }
    for &b in address.to_string().as_bytes() {
        hash = hash.wrapping_mul(FNV_PRIME) ^ (b as u32);
    }
    for &b in port.to_le_bytes().iter() {
        hash = hash.wrapping_mul(FNV_PRIME) ^ (b as u32);
    }
    hash
}

#[derive(Debug, Clone)]
pub struct Channel {
    pub name: String,
    pub address: Ipv4Addr,
    pub port: u16,
    pub id: u32,
    /// Only meaningful for *discovered* entries.
    pub last_seen: u64,
}

impl Channel {
    pub fn new(name: impl Into<String>, address: Ipv4Addr, port: u16) -> Self {
        let name = name.into();
        let id = channel_id(&name, address, port);
        Self { name, address, port, id, last_seen: now_micros() }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChannelInfo {
    pub name: String,
    pub address: Ipv4Addr,
    pub port: u16,
    pub id: u32,
    pub last_seen: u64,
}

impl From<&Channel> for ChannelInfo {
    fn from(c: &Channel) -> Self {
        Self { name: c.name.clone(), address: c.address, port: c.port, id: c.id, last_seen: c.last_seen }
    }
}

struct Registry {
    added: Vec<Channel>,
    discovered: Vec<Channel>,
    /// Non-`None` iff connected (§3 invariant); always refers to an entry in
    /// `added`. Folded into the same mutex as the rest of the channel state,
    /// matching the original source's single `channels_mutex`.
    current: Option<Channel>,
}

pub struct ChannelRegistry {
    inner: Mutex<Registry>,
}

impl ChannelRegistry {
    /// §3/§4.7: the *added* set always contains `#mchat` at index 0.
    pub fn new() -> Self {
        let default = Channel::new(DEFAULT_CHANNEL_NAME, DEFAULT_CHANNEL_ADDRESS, DEFAULT_CHANNEL_PORT);
        Self {
            inner: Mutex::new(Registry { added: vec![default], discovered: Vec::new(), current: None }),
        }
    }

    pub async fn default_channel(&self) -> Channel {
        self.inner.lock().await.added[0].clone()
    }

    /// `Some(channel)` iff connected.
    pub async fn current(&self) -> Option<Channel> {
        self.inner.lock().await.current.clone()
    }

    pub async fn is_connected(&self) -> bool {
        self.inner.lock().await.current.is_some()
    }

    /// True iff connected to a channel other than `added[0]` (`#mchat`) —
    /// the condition Common-Send checks before emitting CDSC (§4.10).
    pub async fn is_connected_to_non_default(&self) -> bool {
        let reg = self.inner.lock().await;
        match &reg.current {
            Some(c) => reg.added.first().map(|d| d.id != c.id).unwrap_or(true),
            None => false,
        }
    }

    /// §4.7 `connect`, lookup half: find `name` in *added* (defaulting to
    /// `#mchat`) without marking it current yet. The caller marks it current
    /// via `set_current` only once the text-plane sockets/workers it needs
    /// are actually up, so a bind failure can't leave `is_connected()==true`
    /// with no workers running (§3 invariant).
    pub async fn resolve_added(&self, name: Option<&str>) -> Result<Channel, crate::MchatError> {
        let name = name.unwrap_or(DEFAULT_CHANNEL_NAME);
        let reg = self.inner.lock().await;
        reg.added
            .iter()
            .find(|c| c.name == name)
            .cloned()
            .ok_or_else(|| crate::MchatError::ChannelNotFound(name.to_string()))
    }

    /// §4.7 `connect`, commit half: mark `channel` as the current channel.
    pub async fn set_current(&self, channel: Channel) {
        self.inner.lock().await.current = Some(channel);
    }

    /// §4.7 `disconnect`: clear `current` atomically with the connected flag
    /// (both live in the same `Option`, so this is inherently atomic).
    pub async fn disconnect(&self) {
        self.inner.lock().await.current = None;
    }

    pub async fn find_added(&self, name: &str) -> Option<Channel> {
        self.inner.lock().await.added.iter().find(|c| c.name == name).cloned()
    }

    /// §6.2: `addr==None && port==None` adopts a discovered entry by name;
    /// otherwise defines a brand-new added entry.
    pub async fn add_channel(
        &self,
        name: &str,
        address: Option<Ipv4Addr>,
        port: Option<u16>,
    ) -> Result<(), crate::MchatError> {
        let mut reg = self.inner.lock().await;
        let channel = match (address, port) {
            (None, None) => {
                let discovered = reg
                    .discovered
                    .iter()
                    .find(|c| c.name == name)
                    .cloned()
                    .ok_or_else(|| crate::MchatError::ChannelNotFound(name.to_string()))?;
                discovered
            }
            (addr, p) => {
                let address = addr.unwrap_or(DEFAULT_CHANNEL_ADDRESS);
                let port = p.unwrap_or(DEFAULT_CHANNEL_PORT);
                Channel::new(name, address, port)
            }
        };
        debug!(name = %channel.name, address = %channel.address, port = channel.port, "channel registry: added channel");
        reg.added.push(channel);
        Ok(())
    }

    /// §4.6/§6.2: `#mchat` is non-removable; the currently connected channel
    /// is non-removable.
    pub async fn del_channel(&self, name: &str) -> Result<(), crate::MchatError> {
        if name.eq_ignore_ascii_case(DEFAULT_CHANNEL_NAME) {
            return Err(crate::MchatError::ChannelIsDefault);
        }
        let mut reg = self.inner.lock().await;
        let index = reg
            .added
            .iter()
            .position(|c| c.name == name)
            .ok_or_else(|| crate::MchatError::ChannelNotFound(name.to_string()))?;
        if reg.current.as_ref().map(|c| c.name == name).unwrap_or(false) {
            return Err(crate::MchatError::ChannelInUse);
        }
        reg.added.remove(index);
        Ok(())
    }

    pub async fn added(&self) -> Vec<ChannelInfo> {
        self.inner.lock().await.added.iter().map(ChannelInfo::from).collect()
    }

    pub async fn discovered(&self) -> Vec<ChannelInfo> {
        self.inner.lock().await.discovered.iter().map(ChannelInfo::from).collect()
    }

    pub async fn added_count(&self) -> usize {
        self.inner.lock().await.added.len()
    }

    /// CDSC reception (§4.6): refresh `last_seen` on an id match, else insert.
    pub async fn update_discovered(&self, record: &ParsedRecord<'_>) {
        let Some(name) = record.headers.get_str(HeaderKind::Channel) else { return };
        let Some(address) = record
            .headers
            .get_str(HeaderKind::Address)
            .and_then(|s| s.parse::<Ipv4Addr>().ok())
        else {
            return;
        };
        let Some(port) =
            record.headers.get_str(HeaderKind::Port).and_then(|s| s.parse::<u16>().ok())
        else {
            return;
        };

        let id = channel_id(name, address, port);
        let mut reg = self.inner.lock().await;
        match reg.discovered.iter_mut().find(|c| c.id == id) {
            Some(existing) => existing.last_seen = now_micros(),
            None => {
                debug!(%name, %address, port, "channel registry: discovered new channel");
                reg.discovered.push(Channel {
                    name: name.to_string(),
                    address,
                    port,
                    id,
                    last_seen: now_micros(),
                });
            }
        }
    }

    /// §4.6: discovered entries older than `CDSC_EXPIRY_MICROS` are dropped.
    /// Added entries never expire.
    pub async fn expire(&self) {
        let now = now_micros();
        let mut reg = self.inner.lock().await;
        let mut i = 0;
        while i < reg.discovered.len() {
            if now.saturating_sub(reg.discovered[i].last_seen) > CDSC_EXPIRY_MICROS {
                debug!(name = %reg.discovered[i].name, "channel registry: expiring discovered channel");
                reg.discovered.swap_remove(i);
            } else {
                i += 1;
            }
        }
    }
}

impl Default for ChannelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::parse;

    fn cdsc(name: &str, addr: &str, port: u16) -> Vec<u8> {
        format!("CDSC MCHAT/1.0\r\nChannel: {name}\r\nAddress: {addr}\r\nPort: {port}\r\n\r\n")
            .into_bytes()
    }

    #[tokio::test]
    async fn default_channel_is_mchat_at_index_zero() {
        let reg = ChannelRegistry::new();
        let added = reg.added().await;
        assert_eq!(added.len(), 1);
        assert_eq!(added[0].name, DEFAULT_CHANNEL_NAME);
    }

    #[tokio::test]
    async fn mchat_cannot_be_removed() {
        let reg = ChannelRegistry::new();
        let err = reg.del_channel(DEFAULT_CHANNEL_NAME).await.unwrap_err();
        assert!(matches!(err, crate::MchatError::ChannelIsDefault));
    }

    #[tokio::test]
    async fn current_channel_cannot_be_removed() {
        let reg = ChannelRegistry::new();
        reg.add_channel("#dev", Some(Ipv4Addr::new(230, 0, 0, 2)), Some(9010)).await.unwrap();
        let channel = reg.resolve_added(Some("#dev")).await.unwrap();
        reg.set_current(channel).await;
        let err = reg.del_channel("#dev").await.unwrap_err();
        assert!(matches!(err, crate::MchatError::ChannelInUse));
    }

    #[tokio::test]
    async fn cdsc_inserts_then_refreshes_without_duplicating() {
        let reg = ChannelRegistry::new();
        let bytes = cdsc("#dev", "230.0.0.2", 9010);
        let rec = parse(&bytes);
        reg.update_discovered(&rec).await;
        reg.update_discovered(&rec).await;

        let discovered = reg.discovered().await;
        assert_eq!(discovered.len(), 1);
        assert_eq!(discovered[0].name, "#dev");
        assert_eq!(discovered[0].id, channel_id("#dev", Ipv4Addr::new(230, 0, 0, 2), 9010));
    }

    #[tokio::test]
    async fn expire_removes_stale_discovered_entries() {
        let reg = ChannelRegistry::new();
        {
            let mut guard = reg.inner.lock().await;
            guard.discovered.push(Channel {
                name: "#dev".into(),
                address: Ipv4Addr::new(230, 0, 0, 2),
                port: 9010,
                id: 1,
                last_seen: 0,
            });
        }
        reg.expire().await;
        assert!(reg.discovered().await.is_empty());
    }

    #[test]
    fn channel_id_is_deterministic() {
        let a = channel_id("#dev", Ipv4Addr::new(230, 0, 0, 2), 9010);
        let b = channel_id("#dev", Ipv4Addr::new(230, 0, 0, 2), 9010);
        assert_eq!(a, b);
    }
}
