//! `MchatEngine`: the handle that owns the nickname, stealth flag, both
//! tables, and the worker set, per SPEC_FULL §4.7/§6.2.
//!
//! Grounded on `src/main.rs`'s `Node` construction pattern (config struct →
//! async `new()` → state held behind `Arc`s) combined with
//! `examples/original_source/libmchat-master/src/mchatv1.c` for the exact
//! lifecycle and argument semantics, including `set_nickname`'s
//! length-vs-actual-length rejection quirk, preserved per SPEC_FULL §9.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::atomic::Ordering;
use std::sync::Arc;

use rand::Rng;
use tokio::sync::Mutex;
use tracing::info;

use crate::channel::{ChannelInfo, COMMON_CHANNEL_ADDRESS, COMMON_CHANNEL_PORT};
use crate::config::MchatConfig;
use crate::message::Message;
use crate::peer::PeerInfo;
use crate::socket;
use crate::worker::{common_recv, common_send, text_recv, text_send};
use crate::worker::{EngineShared, InboundSlot, OutboundSlot, PendingText, WorkerHandle};
use crate::MchatError;

const MAX_MESSAGE_SIZE: usize = 1 << 15;
const MAX_NICKNAME_SIZE: usize = 64;

fn random_nickname() -> String {
    let suffix: u32 = rand::thread_rng().gen();
    let full = format!("NoNick{suffix}");
    if full.len() > 15 {
        full[..15].to_string()
    } else {
        full
    }
}

fn common_dest() -> SocketAddr {
    SocketAddr::V4(SocketAddrV4::new(COMMON_CHANNEL_ADDRESS, COMMON_CHANNEL_PORT))
}

pub struct MchatEngine {
    shared: Arc<EngineShared>,
    inbound: Arc<InboundSlot>,
    outbound: Arc<OutboundSlot>,
    common_send: Mutex<Option<WorkerHandle>>,
    common_recv: Mutex<Option<WorkerHandle>>,
    text_send: Mutex<Option<WorkerHandle>>,
    text_recv: Mutex<Option<WorkerHandle>>,
}

impl MchatEngine {
    /// §4.7 step 1: binds the common-channel sockets and spawns Common-Send
    /// and Common-Recv. Returns once both are up.
    pub async fn init(cfg: MchatConfig) -> Result<Self, MchatError> {
        let nickname = cfg.nickname.unwrap_or_else(random_nickname);
        let shared = Arc::new(EngineShared::with_intervals(
            nickname,
            cfg.stealth_at_startup,
            std::time::Duration::from_secs(cfg.keepalive_interval_secs),
            std::time::Duration::from_secs(cfg.cdsc_interval_secs),
        ));

        let send_socket = socket::bind_sender()?;
        let recv_socket = socket::bind_receiver(COMMON_CHANNEL_ADDRESS, COMMON_CHANNEL_PORT)?;

        let common_send_handle = common_send::spawn(send_socket, common_dest(), shared.clone());
        let sibling_flag = common_send_handle.run_flag();
        let common_recv_handle = common_recv::spawn(recv_socket, shared.clone(), sibling_flag);

        info!("engine initialized, common-plane workers running");

        Ok(Self {
            shared,
            inbound: Arc::new(InboundSlot::new()),
            outbound: Arc::new(OutboundSlot::new()),
            common_send: Mutex::new(Some(common_send_handle)),
            common_recv: Mutex::new(Some(common_recv_handle)),
            text_send: Mutex::new(None),
            text_recv: Mutex::new(None),
        })
    }

    /// §4.7 step 4: tears down text workers (if connected), then common
    /// workers. Consumes the engine.
    pub async fn destroy(self) {
        if self.is_connected().await {
            let _ = self.disconnect().await;
        }
        if let Some(handle) = self.common_send.lock().await.take() {
            handle.shutdown().await;
        }
        if let Some(handle) = self.common_recv.lock().await.take() {
            handle.shutdown().await;
        }
        info!("engine destroyed");
    }

    /// §4.7 step 2: looks up `name` in the *added* set (absent ⇒ `#mchat`),
    /// opens text-plane sockets, and spawns Text-Send/Text-Recv. Reconnects
    /// cleanly if already connected to another channel. `current_channel` is
    /// only set once the sockets are bound and the workers are running, so a
    /// bind failure can't leave `is_connected()==true` with no text workers
    /// (§3 invariant).
    pub async fn connect(&self, name: Option<&str>) -> Result<(), MchatError> {
        if self.is_connected().await {
            self.disconnect().await?;
        }

        let channel = self.shared.channels.resolve_added(name).await?;

        let send_socket = socket::bind_sender()?;
        let recv_socket = socket::bind_receiver(channel.address, channel.port)?;
        let dest = SocketAddr::V4(SocketAddrV4::new(channel.address, channel.port));

        let text_send_handle = text_send::spawn(
            send_socket,
            dest,
            channel.clone(),
            self.shared.clone(),
            self.outbound.clone(),
        );
        let text_recv_handle = text_recv::spawn(recv_socket, self.shared.clone(), self.inbound.clone());

        *self.text_send.lock().await = Some(text_send_handle);
        *self.text_recv.lock().await = Some(text_recv_handle);
        self.shared.channels.set_current(channel.clone()).await;

        info!(channel = %channel.name, "connected");
        Ok(())
    }

    /// §4.7 step 3: cancels and joins the text workers, then clears
    /// `current_channel` atomically with the connected flag.
    pub async fn disconnect(&self) -> Result<(), MchatError> {
        if !self.is_connected().await {
            return Err(MchatError::NotConnected);
        }
        if let Some(handle) = self.text_send.lock().await.take() {
            handle.shutdown().await;
        }
        if let Some(handle) = self.text_recv.lock().await.take() {
            handle.shutdown().await;
        }
        self.shared.channels.disconnect().await;
        info!("disconnected");
        Ok(())
    }

    pub async fn is_connected(&self) -> bool {
        self.shared.channels.is_connected().await
    }

    /// §4.7 `send_message`: bounds-checks the body, then hands it to
    /// Text-Send through the outbound slot (blocking only if a prior
    /// message hasn't yet drained).
    pub async fn send_message(&self, body: &[u8]) -> Result<(), MchatError> {
        if !self.is_connected().await {
            return Err(MchatError::NotConnected);
        }
        if body.is_empty() {
            return Err(MchatError::EmptyMessage);
        }
        if body.len() > MAX_MESSAGE_SIZE {
            return Err(MchatError::MessageTooLarge { len: body.len() });
        }
        let running = self.text_send.lock().await.as_ref().map(WorkerHandle::is_running).unwrap_or(false);
        if !running {
            return Err(MchatError::WorkerNotRunning);
        }

        let nickname = self.shared.nickname.lock().await.clone();
        self.outbound.put(PendingText { body: body.to_vec(), nickname }).await;
        Ok(())
    }

    /// §4.7 `recv_message`: non-blocking; `Ok(None)` means the slot was
    /// empty, not that nothing will ever arrive.
    pub async fn recv_message(&self) -> Result<Option<Message>, MchatError> {
        if !self.is_connected().await {
            return Err(MchatError::NotConnected);
        }
        let running = self.text_recv.lock().await.as_ref().map(WorkerHandle::is_running).unwrap_or(false);
        if !running {
            return Err(MchatError::WorkerNotRunning);
        }
        Ok(self.inbound.try_take().await)
    }

    /// Mirrors `mchatv1_set_nickname`'s odd two-argument contract: `len`
    /// must not exceed 64 nor exceed `nickname`'s own byte length. Preserved
    /// verbatim per SPEC_FULL §9 rather than smoothed into a single-argument
    /// setter.
    pub async fn set_nickname(&self, nickname: &str, len: usize) -> Result<(), MchatError> {
        if len > MAX_NICKNAME_SIZE || len > nickname.len() {
            return Err(MchatError::NicknameTooLong { requested: len, actual: nickname.len() });
        }
        let truncated = String::from_utf8_lossy(&nickname.as_bytes()[..len]).into_owned();
        *self.shared.nickname.lock().await = truncated;
        Ok(())
    }

    pub async fn get_nickname(&self) -> String {
        self.shared.nickname.lock().await.clone()
    }

    /// §4.7 `set_stealth`: suppresses PING/CDSC on both planes; TEXT sends
    /// are unaffected.
    pub fn set_stealth_mode(&self, enabled: bool) {
        self.shared.stealth.store(enabled, Ordering::Release);
        info!(stealth = enabled, "stealth mode toggled");
    }

    pub fn get_stealth_mode(&self) -> bool {
        self.shared.is_stealth()
    }

    /// §6.2 `add_channel`: `addr==None && port==None` adopts a discovered
    /// entry by name; otherwise defines a brand-new added entry.
    pub async fn add_channel(
        &self,
        name: &str,
        address: Option<Ipv4Addr>,
        port: Option<u16>,
    ) -> Result<(), MchatError> {
        self.shared.channels.add_channel(name, address, port).await
    }

    pub async fn del_channel(&self, name: &str) -> Result<(), MchatError> {
        self.shared.channels.del_channel(name).await
    }

    pub async fn get_channel(&self) -> Option<ChannelInfo> {
        self.shared.channels.current().await.as_ref().map(ChannelInfo::from)
    }

    pub async fn get_channel_count(&self) -> usize {
        self.shared.channels.added_count().await
    }

    /// §6.2.1 enumeration surface.
    pub async fn get_added_channels(&self) -> Vec<ChannelInfo> {
        self.shared.channels.added().await
    }

    pub async fn get_discovered_channels(&self) -> Vec<ChannelInfo> {
        self.shared.channels.discovered().await
    }

    pub async fn peers_available(&self) -> bool {
        self.shared.peers.len().await > 0
    }

    pub async fn get_peerlist(&self) -> Vec<PeerInfo> {
        self.shared.peers.snapshot().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_nickname_is_bounded_and_prefixed() {
        for _ in 0..20 {
            let nick = random_nickname();
            assert!(nick.len() <= 15);
            assert!(nick.starts_with("NoNick"));
        }
    }
}
