//! A bound, listening endpoint: carries its protocol tag, a reference to
//! its backend table, an optional fallback address, and the sniffer
//! function for its protocol.

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::PathBuf;

use crate::addr::Address;
use crate::event;
use crate::os::{Evented, Interests, OsQueue, PollOption};
use crate::sniff::{self, Sniffer};
use crate::stream::Stream;
use crate::sys::{TcpListener, UnixListener};

/// Which sniffer a listener uses to find the hostname in the first bytes of
/// a connection.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Protocol {
    /// TLS ClientHello SNI.
    Tls,
    /// HTTP/1.x `Host` header.
    Http,
}

impl Protocol {
    pub fn sniffer(self) -> Sniffer {
        match self {
            Protocol::Tls => sniff::tls::parse,
            Protocol::Http => sniff::http::parse,
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Protocol::Tls => "tls",
            Protocol::Http => "http",
        })
    }
}

/// A bound listening socket, TCP or UNIX.
#[derive(Debug)]
pub enum ListenSocket {
    Tcp(TcpListener),
    Unix(UnixListener),
}

impl ListenSocket {
    fn bind_tcp(addr: SocketAddr) -> io::Result<ListenSocket> {
        TcpListener::bind(addr).map(ListenSocket::Tcp)
    }

    fn bind_unix(path: &PathBuf) -> io::Result<ListenSocket> {
        // A stale socket file from a previous run would otherwise make
        // `bind` fail with `EADDRINUSE`.
        let _ = std::fs::remove_file(path);
        UnixListener::bind(path).map(ListenSocket::Unix)
    }

    /// The address actually bound, for TCP listeners bound to an ephemeral
    /// port (`:0`) this is the port the kernel assigned.
    fn local_addr(&self) -> io::Result<SocketAddr> {
        match self {
            ListenSocket::Tcp(l) => l.local_addr(),
            ListenSocket::Unix(_) => Err(io::Error::new(io::ErrorKind::Other, "UNIX listeners have no socket address")),
        }
    }

    /// Accept one pending connection, if any.
    pub fn accept(&self) -> io::Result<(Stream, Option<Address>)> {
        match self {
            ListenSocket::Tcp(l) => {
                let (stream, addr) = l.accept()?;
                Ok((Stream::Tcp(stream), Some(Address::Inet(addr))))
            }
            ListenSocket::Unix(l) => {
                let (stream, ()) = l.accept()?;
                Ok((Stream::Unix(stream), None))
            }
        }
    }
}

impl AsRawFd for ListenSocket {
    fn as_raw_fd(&self) -> RawFd {
        match self {
            ListenSocket::Tcp(l) => l.as_raw_fd(),
            ListenSocket::Unix(l) => l.as_raw_fd(),
        }
    }
}

impl Evented for ListenSocket {
    fn register(&mut self, os_queue: &mut OsQueue, id: event::Id, interests: Interests, opt: PollOption) -> io::Result<()> {
        match self {
            ListenSocket::Tcp(l) => l.register(os_queue, id, interests, opt),
            ListenSocket::Unix(l) => l.register(os_queue, id, interests, opt),
        }
    }

    fn reregister(&mut self, os_queue: &mut OsQueue, id: event::Id, interests: Interests, opt: PollOption) -> io::Result<()> {
        match self {
            ListenSocket::Tcp(l) => l.reregister(os_queue, id, interests, opt),
            ListenSocket::Unix(l) => l.reregister(os_queue, id, interests, opt),
        }
    }

    fn deregister(&mut self, os_queue: &mut OsQueue) -> io::Result<()> {
        match self {
            ListenSocket::Tcp(l) => l.deregister(os_queue),
            ListenSocket::Unix(l) => l.deregister(os_queue),
        }
    }
}

/// A bound, listening endpoint.
#[derive(Debug)]
pub struct Listener {
    socket: ListenSocket,
    display_addr: String,
    port: u16,
    protocol: Protocol,
    table: Option<usize>,
    fallback: Option<Address>,
}

impl Listener {
    /// Bind a TCP listener. If `addr`'s port is `0`, the actually assigned
    /// ephemeral port is read back from the bound socket so `port()` and
    /// `display_addr()` reflect reality rather than the request.
    pub fn bind_tcp(addr: SocketAddr, protocol: Protocol, table: Option<usize>, fallback: Option<Address>) -> io::Result<Listener> {
        let socket = ListenSocket::bind_tcp(addr)?;
        let bound_addr = socket.local_addr().unwrap_or(addr);
        Ok(Listener {
            socket,
            display_addr: bound_addr.to_string(),
            port: bound_addr.port(),
            protocol,
            table,
            fallback,
        })
    }

    /// Bind a UNIX domain listener. UNIX listeners have no notion of
    /// "port", so backend rows with `port == 0` simply stay `0`.
    pub fn bind_unix(path: PathBuf, protocol: Protocol, table: Option<usize>, fallback: Option<Address>) -> io::Result<Listener> {
        let display_addr = format!("unix:{}", path.display());
        let socket = ListenSocket::bind_unix(&path)?;
        Ok(Listener { socket, display_addr, port: 0, protocol, table, fallback })
    }

    pub fn socket(&self) -> &ListenSocket {
        &self.socket
    }

    pub fn socket_mut(&mut self) -> &mut ListenSocket {
        &mut self.socket
    }

    pub fn display_addr(&self) -> &str {
        &self.display_addr
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    pub fn sniffer(&self) -> Sniffer {
        self.protocol.sniffer()
    }

    pub fn table_id(&self) -> Option<usize> {
        self.table
    }

    pub fn fallback(&self) -> Option<&Address> {
        self.fallback.as_ref()
    }
}
