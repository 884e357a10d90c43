//! Text-Recv worker, per SPEC_FULL §4.9.
//!
//! Grounded on `mchatv1_threads.c`'s `mchatv1_thread_text_recv`: a blocking
//! receive loop; `TEXT` arms the inbound slot (waiting if it's already full,
//! so the consumer sees every TEXT exactly once) and then updates the peer
//! table; `PING` only updates the peer table. Cancellation races the receive
//! future against the shutdown notifier since `tokio::net::UdpSocket` has no
//! native cancellation handle to pass in (the original's `GCancellable`).

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::net::UdpSocket;
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

use super::{EngineShared, InboundSlot, WorkerHandle};
use crate::message::Message;
use crate::proto::error::ThreadError;
use crate::proto::{parse, MessageKind};

const RECV_BUF_SIZE: usize = 1 << 16;

pub fn spawn(
    socket: UdpSocket,
    shared: Arc<EngineShared>,
    inbound: Arc<InboundSlot>,
) -> WorkerHandle {
    let (run_flag, shutdown) = super::new_cancellation();
    let task_run_flag = run_flag.clone();
    let task_shutdown = shutdown.clone();

    let join =
        tokio::spawn(async move { run(socket, shared, inbound, task_run_flag, task_shutdown).await });

    WorkerHandle::new(run_flag, shutdown, join)
}

async fn run(
    socket: UdpSocket,
    shared: Arc<EngineShared>,
    inbound: Arc<InboundSlot>,
    run_flag: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
) -> ThreadError {
    info!("text-recv worker starting");
    let mut buf = vec![0u8; RECV_BUF_SIZE];

    loop {
        if !run_flag.load(Ordering::Acquire) {
            break;
        }

        let shutdown_wait = shutdown.notified();
        let recv = socket.recv_from(&mut buf);

        let (len, from) = tokio::select! {
            result = recv => match result {
                Ok(pair) => pair,
                Err(e) => {
                    error!(error = %e, "text-recv: receive failed");
                    return ThreadError::SocketError;
                }
            },
            _ = shutdown_wait => {
                if !run_flag.load(Ordering::Acquire) {
                    break;
                }
                continue;
            }
        };

        let source_address = match from {
            SocketAddr::V4(v4) => *v4.ip(),
            SocketAddr::V6(_) => continue,
        };

        let record = parse(&buf[..len]);
        if !record.is_valid() {
            warn!(%source_address, kind = %record.kind, "text-recv: dropping invalid datagram");
            continue;
        }

        match record.kind {
            MessageKind::Text => {
                let message = Message::from_record(&record, source_address);
                debug!(%source_address, nickname = %message.nickname, "text-recv: text received");
                inbound.put(message).await;
                shared.peers.update(&record, source_address).await;
            }
            MessageKind::Ping => {
                shared.peers.update(&record, source_address).await;
            }
            _ => {}
        }
    }

    debug!("text-recv worker exiting cleanly");
    ThreadError::NoError
}
