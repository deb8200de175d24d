use std::{
    io,
    net::{Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs, UdpSocket},
    time::Duration,
};

use once_cell::sync::OnceCell;
use tracing::debug;

use super::MetricSink;

/// A sink that sends payloads as UDP datagrams.
///
/// The socket is created on the first send and reused for the lifetime of the sink. It is bound to an ephemeral local
/// port, connected to the remote address, and has the configured write timeout applied so that a send can never block
/// for longer than that.
#[derive(Debug)]
pub struct UdpMetricSink {
    remote_addrs: Vec<SocketAddr>,
    write_timeout: Duration,
    socket: OnceCell<UdpSocket>,
}

impl UdpMetricSink {
    /// Creates a new `UdpMetricSink` that sends to the given address.
    ///
    /// The address is resolved immediately, but no socket is created until the first payload is sent.
    ///
    /// # Errors
    ///
    /// If the address cannot be resolved, or the write timeout is zero, an error is returned.
    pub fn new<A: ToSocketAddrs>(addr: A, write_timeout: Duration) -> io::Result<Self> {
        if write_timeout.is_zero() {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "write timeout must be non-zero"));
        }

        let remote_addrs: Vec<SocketAddr> = addr.to_socket_addrs()?.collect();
        if remote_addrs.is_empty() {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "address resolved to no socket addresses"));
        }

        Ok(Self::from_resolved(remote_addrs, write_timeout))
    }

    pub(crate) fn from_resolved(remote_addrs: Vec<SocketAddr>, write_timeout: Duration) -> Self {
        UdpMetricSink { remote_addrs, write_timeout, socket: OnceCell::new() }
    }

    fn socket(&self) -> io::Result<&UdpSocket> {
        self.socket.get_or_try_init(|| {
            let socket = connect_first(&self.remote_addrs, |addr| connect(addr, self.write_timeout))?;
            debug!(remote_addr = ?socket.peer_addr().ok(), "Created UDP socket for statsd payloads.");
            Ok(socket)
        })
    }
}

// Binds in the same address family as the remote, otherwise `connect` will fail.
fn connect(remote_addr: SocketAddr, write_timeout: Duration) -> io::Result<UdpSocket> {
    let local_addr: SocketAddr = match remote_addr {
        SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
        SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
    };

    let socket = UdpSocket::bind(local_addr)?;
    socket.connect(remote_addr)?;
    socket.set_write_timeout(Some(write_timeout))?;
    Ok(socket)
}

/// Tries each resolved address in order, returning the first one that connects.
///
/// If no address connects, the last error is returned.
fn connect_first<T, F>(remote_addrs: &[SocketAddr], mut try_connect: F) -> io::Result<T>
where
    F: FnMut(SocketAddr) -> io::Result<T>,
{
    let mut last_error = None;
    for &addr in remote_addrs {
        match try_connect(addr) {
            Ok(connected) => return Ok(connected),
            Err(e) => {
                debug!(remote_addr = %addr, error = %e, "Failed to connect UDP socket, trying next address.");
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "no remote addresses to connect to")))
}

impl MetricSink for UdpMetricSink {
    fn emit(&self, payload: &[u8]) -> io::Result<usize> {
        self.socket()?.send(payload)
    }
}
