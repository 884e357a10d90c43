//! The four long-lived workers (§2/§4.8-§4.11) and the shared state they're
//! built around.
//!
//! Grounded on `examples/original_source/libmchat-master/src/mchatv1_threads.c`
//! for control flow, re-expressed as `tokio::task`s per SPEC_FULL §2.1/§9.1:
//! no back-pointer from worker to engine (the original's cyclic
//! `mchat_thread.mchat` pointer) — each worker closure simply captures the
//! `Arc`-shared pieces of state it needs. Cancellation is an `AtomicBool` run
//! flag plus a `tokio::sync::Notify` to wake blocked waiters, replacing the
//! original's `GCancellable`.

pub mod common_recv;
pub mod common_send;
pub mod slot;
pub mod text_recv;
pub mod text_send;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;

use crate::channel::{ChannelRegistry, CDSC_INTERVAL_SECS};
use crate::message::Message;
use crate::peer::{PeerTable, KEEPALIVE_INTERVAL_SECS};
use crate::proto::error::ThreadError;

/// State every worker closure captures — the "immutable snapshot" SPEC_FULL
/// §9.1 calls for instead of a back-pointer to the engine. Carries the
/// configured timer intervals (SPEC_FULL §1.1's `MchatConfig`) so the
/// workers honor overrides rather than the bare protocol defaults.
pub struct EngineShared {
    pub nickname: Mutex<String>,
    pub stealth: AtomicBool,
    pub peers: Arc<PeerTable>,
    pub channels: Arc<ChannelRegistry>,
    pub keepalive_interval: Duration,
    pub cdsc_interval: Duration,
}

impl EngineShared {
    pub fn new(nickname: String, stealth: bool) -> Self {
        Self::with_intervals(
            nickname,
            stealth,
            Duration::from_secs(KEEPALIVE_INTERVAL_SECS),
            Duration::from_secs(CDSC_INTERVAL_SECS),
        )
    }

    pub fn with_intervals(
        nickname: String,
        stealth: bool,
        keepalive_interval: Duration,
        cdsc_interval: Duration,
    ) -> Self {
        Self {
            nickname: Mutex::new(nickname),
            stealth: AtomicBool::new(stealth),
            peers: Arc::new(PeerTable::new()),
            channels: Arc::new(ChannelRegistry::new()),
            keepalive_interval,
            cdsc_interval,
        }
    }

    pub fn is_stealth(&self) -> bool {
        self.stealth.load(Ordering::Acquire)
    }
}

/// Handle to a spawned worker task: its run flag, shutdown notifier, and
/// `JoinHandle`. Mirrors the original's `mchat_thread` minus the socket/addr
/// fields (those live inside the task's own stack, not the handle — Rust's
/// ownership model has no need for the handle to hold what only the task
/// itself touches).
pub struct WorkerHandle {
    run_flag: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
    join: JoinHandle<ThreadError>,
}

impl WorkerHandle {
    pub fn new(run_flag: Arc<AtomicBool>, shutdown: Arc<Notify>, join: JoinHandle<ThreadError>) -> Self {
        Self { run_flag, shutdown, join }
    }

    pub fn is_running(&self) -> bool {
        self.run_flag.load(Ordering::Acquire) && !self.join.is_finished()
    }

    /// Exposes the run flag so a sibling worker can watch it (Common-Recv
    /// watches Common-Send's, per §4.11).
    pub fn run_flag(&self) -> Arc<AtomicBool> {
        self.run_flag.clone()
    }

    /// §5 cancellation sequence: clear `run_flag`, broadcast the shutdown
    /// notifier (wakes condvar-equivalent waiters), then join.
    pub async fn shutdown(self) {
        self.run_flag.store(false, Ordering::Release);
        self.shutdown.notify_waiters();
        let _ = self.join.await;
    }
}

/// Shared run-flag/shutdown-notify pair handed to a spawned task alongside
/// its own `WorkerHandle` twin.
pub fn new_cancellation() -> (Arc<AtomicBool>, Arc<Notify>) {
    (Arc::new(AtomicBool::new(true)), Arc::new(Notify::new()))
}

/// The inbound single-slot rendezvous used by Text-Recv/`recv_message`.
pub type InboundSlot = slot::MessageSlot<Message>;

/// The outbound single-slot rendezvous used by `send_message`/Text-Send.
pub struct PendingText {
    pub body: Vec<u8>,
    pub nickname: String,
}
pub type OutboundSlot = slot::MessageSlot<PendingText>;
