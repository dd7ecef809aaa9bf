//! Multicast socket construction.
//!
//! Options such as `SO_REUSEADDR` must be set before `bind`, which rules out
//! `tokio::net::UdpSocket::bind`.  The sockets are therefore built with
//! socket2, switched to non-blocking mode, and handed back as
//! `std::net::UdpSocket` for the caller to register with the runtime.
//!
//! Every failure is reported as [`DiscoveryError::SocketSetup`] carrying the
//! address that was being configured.

use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};

use socket2::{Domain, Protocol, Socket, Type};
use tracing::debug;

use crate::error::DiscoveryError;

fn setup_error(addr: SocketAddrV4) -> impl Fn(io::Error) -> DiscoveryError {
    move |source| DiscoveryError::SocketSetup {
        addr: SocketAddr::V4(addr),
        source,
    }
}

fn new_udp_socket() -> io::Result<Socket> {
    Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
}

/// Opens the announcer's send-only socket.
///
/// The socket is bound to an ephemeral port on `interface`, sends through
/// `interface`, uses `ttl` as the multicast TTL, and has multicast loopback
/// disabled so the host does not hear its own announcements.
pub fn open_sender(interface: Ipv4Addr, ttl: u32) -> Result<UdpSocket, DiscoveryError> {
    let local = SocketAddrV4::new(interface, 0);
    let err = setup_error(local);

    let socket = new_udp_socket().map_err(&err)?;
    socket.set_multicast_ttl_v4(ttl).map_err(&err)?;
    socket.set_multicast_loop_v4(false).map_err(&err)?;
    if !interface.is_unspecified() {
        socket.set_multicast_if_v4(&interface).map_err(&err)?;
    }
    socket.bind(&SocketAddr::V4(local).into()).map_err(&err)?;
    socket.set_nonblocking(true).map_err(&err)?;

    let socket = UdpSocket::from(socket);
    debug!(local = ?socket.local_addr().ok(), ttl, "announce socket ready");
    Ok(socket)
}

/// Opens the listener's receive-only socket.
///
/// The socket allows address reuse so several processes on one host can
/// listen to the same group, binds `interface:group.port()`, and joins
/// `group` on `interface`.
pub fn open_receiver(interface: Ipv4Addr, group: SocketAddrV4) -> Result<UdpSocket, DiscoveryError> {
    let local = SocketAddrV4::new(interface, group.port());
    let err = setup_error(local);

    let socket = new_udp_socket().map_err(&err)?;
    socket.set_reuse_address(true).map_err(&err)?;
    #[cfg(all(unix, not(any(target_os = "solaris", target_os = "illumos"))))]
    socket.set_reuse_port(true).map_err(&err)?;
    socket.set_multicast_loop_v4(false).map_err(&err)?;
    socket.bind(&SocketAddr::V4(local).into()).map_err(&err)?;
    socket
        .join_multicast_v4(group.ip(), &interface)
        .map_err(setup_error(group))?;
    socket.set_nonblocking(true).map_err(&err)?;

    let socket = UdpSocket::from(socket);
    debug!(local = ?socket.local_addr().ok(), %group, "listen socket joined group");
    Ok(socket)
}
