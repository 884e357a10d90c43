//! Text-Send worker, per SPEC_FULL §4.8.
//!
//! Grounded on `mchatv1_threads.c`'s `mchatv1_thread_text_send`: three
//! announce PINGs on start (unless stealth), then a loop that waits on the
//! outbound slot with a keepalive timeout — an armed slot takes priority
//! over the timer, exactly as the original checks `buffer_flag` before
//! falling through to the PING branch.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::sync::Notify;
use tracing::{debug, error, info};

use super::{EngineShared, OutboundSlot, WorkerHandle};
use crate::channel::Channel;
use crate::proto::error::ThreadError;
use crate::proto::{serialize, ConnectedChannel, MessageKind, SerializeContext};

pub fn spawn(
    socket: UdpSocket,
    dest: SocketAddr,
    channel: Channel,
    shared: Arc<EngineShared>,
    outbound: Arc<OutboundSlot>,
) -> WorkerHandle {
    let (run_flag, shutdown) = super::new_cancellation();
    let task_run_flag = run_flag.clone();
    let task_shutdown = shutdown.clone();

    let join = tokio::spawn(async move {
        run(socket, dest, channel, shared, outbound, task_run_flag, task_shutdown).await
    });

    WorkerHandle::new(run_flag, shutdown, join)
}

async fn run(
    socket: UdpSocket,
    dest: SocketAddr,
    channel: Channel,
    shared: Arc<EngineShared>,
    outbound: Arc<OutboundSlot>,
    run_flag: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
) -> ThreadError {
    info!(channel = %channel.name, "text-send worker starting");

    if !shared.is_stealth() {
        for _ in 0..3 {
            if let Err(e) = send_ping(&socket, dest, &channel, &shared).await {
                error!(error = %e, "text-send: announce ping failed");
                return ThreadError::SocketError;
            }
        }
    }

    loop {
        if !run_flag.load(Ordering::Acquire) {
            break;
        }

        let shutdown_wait = shutdown.notified();
        let slot_wait = outbound.take_or_timeout(shared.keepalive_interval);

        let pending = tokio::select! {
            pending = slot_wait => pending,
            _ = shutdown_wait => {
                if !run_flag.load(Ordering::Acquire) {
                    break;
                }
                continue;
            }
        };

        if !run_flag.load(Ordering::Acquire) {
            break;
        }

        match pending {
            Some(pending) => {
                let ctx = SerializeContext {
                    nickname: &pending.nickname,
                    channel: Some(ConnectedChannel {
                        name: &channel.name,
                        address: channel.address,
                        port: channel.port,
                    }),
                    body: Some(&pending.body),
                };
                let bytes = serialize(MessageKind::Text, &ctx);
                if let Err(e) = socket.send_to(&bytes, dest).await {
                    error!(error = %e, "text-send: text send failed");
                    return ThreadError::SocketError;
                }
            }
            None if !shared.is_stealth() => {
                if let Err(e) = send_ping(&socket, dest, &channel, &shared).await {
                    error!(error = %e, "text-send: keepalive ping failed");
                    return ThreadError::SocketError;
                }
            }
            None => {}
        }
    }

    debug!("text-send worker exiting cleanly");
    ThreadError::NoError
}

async fn send_ping(
    socket: &UdpSocket,
    dest: SocketAddr,
    channel: &Channel,
    shared: &EngineShared,
) -> std::io::Result<()> {
    let nickname = shared.nickname.lock().await.clone();
    let ctx = SerializeContext {
        nickname: &nickname,
        channel: Some(ConnectedChannel { name: &channel.name, address: channel.address, port: channel.port }),
        body: None,
    };
    let bytes = serialize(MessageKind::Ping, &ctx);
    socket.send_to(&bytes, dest).await.map(|_| ())
}
