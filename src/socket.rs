//! Multicast UDP socket setup, per SPEC_FULL §6.1/§2.1.
//!
//! `SO_REUSEADDR` must be set before bind, which neither `std::net::UdpSocket`
//! nor `tokio::net::UdpSocket` exposes directly — so a `socket2::Socket` does
//! the pre-bind setup and group join, then hands its fd to
//! `tokio::net::UdpSocket::from_std`. Grounded on the `socket2::Socket`
//! construction sequence in
//! `examples/other_examples/462f22d9_Haruko-Haruhara-GSPB-shredtop__crates-shred-ingest-src-receiver.rs.rs`
//! (`Socket::new`, `set_reuse_address`, `join_multicast_v4`), adapted to
//! MChat's simpler needs (no `SO_BUSY_POLL`/`recvmmsg` hot-path tuning — that
//! example's concern, not this protocol's).

use std::net::{Ipv4Addr, SocketAddr};

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tracing::error;

/// Bind a sender socket. `IP_MULTICAST_LOOP` is disabled so a node never
/// receives its own transmissions back. The original source binds the send
/// socket to `INADDR_ANY` and only ever uses the group address as the
/// `sendto` destination, so callers hold the destination separately and pass
/// it to `send_to` on each send.
pub fn bind_sender() -> std::io::Result<UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    socket.set_multicast_loop_v4(false)?;
    socket.bind(&SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)).into())?;
    socket.set_nonblocking(true)?;
    let std_socket: std::net::UdpSocket = socket.into();
    UdpSocket::from_std(std_socket)
}

/// Bind a receiver socket on `INADDR_ANY:port`, joined to `group`, with
/// `SO_REUSEADDR` so multiple local processes can share the port.
pub fn bind_receiver(group: Ipv4Addr, port: u16) -> std::io::Result<UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    socket.set_multicast_loop_v4(false)?;
    socket.bind(&SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)).into())?;
    socket.join_multicast_v4(&group, &Ipv4Addr::UNSPECIFIED).map_err(|e| {
        error!(%group, port, error = %e, "failed to join multicast group");
        e
    })?;
    socket.set_nonblocking(true)?;
    let std_socket: std::net::UdpSocket = socket.into();
    UdpSocket::from_std(std_socket)
}
