//! Common-Send worker, per SPEC_FULL §4.10.
//!
//! Grounded on `mchatv1_threads.c`'s `mchatv1_thread_comm_send`: three
//! announce PINGs on start, then a 100ms-tick loop with two independent
//! elapsed-time timers (PING every 3s, CDSC every 10s while connected to a
//! non-default channel). Both timers and emissions are suppressed under
//! stealth. Channel-field reads for serialization go through the same
//! `channels_mutex`-guarded registry the original locks around
//! `mchatv1_format`.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::net::UdpSocket;
use tokio::sync::Notify;
use tracing::{debug, error, info};

use super::{EngineShared, WorkerHandle};
use crate::proto::error::ThreadError;
use crate::proto::{serialize, ConnectedChannel, MessageKind, SerializeContext};

const TICK: Duration = Duration::from_millis(100);

pub fn spawn(socket: UdpSocket, dest: SocketAddr, shared: Arc<EngineShared>) -> WorkerHandle {
    let (run_flag, shutdown) = super::new_cancellation();
    let task_run_flag = run_flag.clone();
    let task_shutdown = shutdown.clone();

    let join = tokio::spawn(async move { run(socket, dest, shared, task_run_flag, task_shutdown).await });

    WorkerHandle::new(run_flag, shutdown, join)
}

async fn run(
    socket: UdpSocket,
    dest: SocketAddr,
    shared: Arc<EngineShared>,
    run_flag: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
) -> ThreadError {
    info!("common-send worker starting");

    if !shared.is_stealth() {
        for _ in 0..3 {
            if let Err(e) = send_ping(&socket, dest, &shared).await {
                error!(error = %e, "common-send: announce ping failed");
                return ThreadError::SocketError;
            }
        }
    }

    let mut ping_elapsed = Instant::now();
    let mut cdsc_elapsed = Instant::now();

    loop {
        if !run_flag.load(Ordering::Acquire) {
            break;
        }

        let shutdown_wait = shutdown.notified();
        tokio::select! {
            _ = tokio::time::sleep(TICK) => {}
            _ = shutdown_wait => {
                if !run_flag.load(Ordering::Acquire) {
                    break;
                }
                continue;
            }
        }

        if shared.is_stealth() {
            continue;
        }

        if ping_elapsed.elapsed() >= shared.keepalive_interval {
            ping_elapsed = Instant::now();
            if let Err(e) = send_ping(&socket, dest, &shared).await {
                error!(error = %e, "common-send: ping failed");
                return ThreadError::SocketError;
            }
        }

        let eligible_for_cdsc = shared.channels.is_connected_to_non_default().await;
        if eligible_for_cdsc && cdsc_elapsed.elapsed() >= shared.cdsc_interval {
            cdsc_elapsed = Instant::now();
            match send_cdsc(&socket, dest, &shared).await {
                Ok(true) => debug!("common-send: emitted cdsc"),
                Ok(false) => {}
                Err(e) => {
                    error!(error = %e, "common-send: cdsc failed");
                    return ThreadError::SocketError;
                }
            }
        }
    }

    debug!("common-send worker exiting cleanly");
    ThreadError::NoError
}

async fn send_ping(socket: &UdpSocket, dest: SocketAddr, shared: &EngineShared) -> std::io::Result<()> {
    let nickname = shared.nickname.lock().await.clone();
    let current = shared.channels.current().await;
    let ctx = SerializeContext {
        nickname: &nickname,
        channel: current
            .as_ref()
            .map(|c| ConnectedChannel { name: &c.name, address: c.address, port: c.port }),
        body: None,
    };
    let bytes = serialize(MessageKind::Ping, &ctx);
    socket.send_to(&bytes, dest).await.map(|_| ())
}

/// Returns `Ok(false)` when there is no current channel to describe (the
/// caller already checked `is_connected_to_non_default`, so this is only a
/// defensive fallback against a disconnect racing the timer).
async fn send_cdsc(socket: &UdpSocket, dest: SocketAddr, shared: &EngineShared) -> std::io::Result<bool> {
    let Some(channel) = shared.channels.current().await else { return Ok(false) };
    let nickname = shared.nickname.lock().await.clone();
    let ctx = SerializeContext {
        nickname: &nickname,
        channel: Some(ConnectedChannel { name: &channel.name, address: channel.address, port: channel.port }),
        body: None,
    };
    let bytes = serialize(MessageKind::Cdsc, &ctx);
    socket.send_to(&bytes, dest).await.map(|_| true)
}
