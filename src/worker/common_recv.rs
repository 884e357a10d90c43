//! Common-Recv worker, per SPEC_FULL §4.11.
//!
//! Grounded on `mchatv1_threads.c`'s `mchatv1_thread_comm_recv`: a
//! non-blocking receive on a 100ms tick, dispatching `PING` into the peer
//! table and `CDSC` into the discovered-channel set, with `peers.expire()`
//! and `channels.expire()` swept every tick. The original exits
//! `SOCKET_ERROR` once its sibling Common-Send thread has already died and
//! there's nothing left to receive; here that's watching Common-Send's run
//! flag directly rather than polling a shared exit code.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

use super::{EngineShared, WorkerHandle};
use crate::proto::error::ThreadError;
use crate::proto::{parse, MessageKind};

const TICK: Duration = Duration::from_millis(100);
const RECV_BUF_SIZE: usize = 1 << 16;

pub fn spawn(
    socket: UdpSocket,
    shared: Arc<EngineShared>,
    sibling_run_flag: Arc<AtomicBool>,
) -> WorkerHandle {
    let (run_flag, shutdown) = super::new_cancellation();
    let task_run_flag = run_flag.clone();
    let task_shutdown = shutdown.clone();

    let join = tokio::spawn(async move {
        run(socket, shared, sibling_run_flag, task_run_flag, task_shutdown).await
    });

    WorkerHandle::new(run_flag, shutdown, join)
}

async fn run(
    socket: UdpSocket,
    shared: Arc<EngineShared>,
    sibling_run_flag: Arc<AtomicBool>,
    run_flag: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
) -> ThreadError {
    info!("common-recv worker starting");
    let mut buf = vec![0u8; RECV_BUF_SIZE];

    loop {
        if !run_flag.load(Ordering::Acquire) {
            break;
        }

        let shutdown_wait = shutdown.notified();
        let tick = tokio::time::sleep(TICK);

        tokio::select! {
            _ = tick => {}
            _ = shutdown_wait => {
                if !run_flag.load(Ordering::Acquire) {
                    break;
                }
                continue;
            }
        }

        loop {
            match socket.try_recv_from(&mut buf) {
                Ok((len, from)) => {
                    let source_address = match from {
                        SocketAddr::V4(v4) => *v4.ip(),
                        SocketAddr::V6(_) => continue,
                    };
                    dispatch(&shared, &buf[..len], source_address).await;
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    error!(error = %e, "common-recv: receive failed");
                    return ThreadError::SocketError;
                }
            }
        }

        if !sibling_run_flag.load(Ordering::Acquire) {
            warn!("common-recv: common-send has exited, following it down");
            return ThreadError::SocketError;
        }

        shared.peers.expire().await;
        shared.channels.expire().await;
    }

    debug!("common-recv worker exiting cleanly");
    ThreadError::NoError
}

async fn dispatch(shared: &EngineShared, datagram: &[u8], source_address: std::net::Ipv4Addr) {
    let record = parse(datagram);
    if !record.is_valid() {
        warn!(%source_address, kind = %record.kind, "common-recv: dropping invalid datagram");
        return;
    }

    match record.kind {
        MessageKind::Ping => {
            shared.peers.update(&record, source_address).await;
        }
        MessageKind::Cdsc => {
            shared.channels.update_discovered(&record).await;
        }
        _ => {}
    }
}
