//! A small tagged union over the two non-blocking stream socket types the
//! proxy ever dials or accepts: TCP and UNIX domain. Lets [`Connection`] and
//! [`Listener`] stay agnostic to which one they're holding.
//!
//! [`Connection`]: crate::connection::Connection
//! [`Listener`]: crate::listener::Listener

use std::io::{self, Read, Write};
use std::os::unix::io::{AsRawFd, RawFd};

use crate::addr::Address;
use crate::event;
use crate::os::{Evented, Interests, OsQueue, PollOption};
use crate::sys::{TcpStream, UnixStream};

/// A non-blocking stream socket, either TCP or UNIX domain.
#[derive(Debug)]
pub enum Stream {
    Tcp(TcpStream),
    Unix(UnixStream),
}

impl Stream {
    /// Open a non-blocking socket of the matching family and start
    /// connecting to `address`. `EINPROGRESS` is not an error (see
    /// `TcpStream::connect`/`UnixStream::connect`); completion is observed
    /// later via a write-readiness event and [`Stream::take_error`].
    pub fn connect(address: &Address) -> io::Result<Stream> {
        match address {
            Address::Inet(addr) => TcpStream::connect(*addr).map(Stream::Tcp),
            Address::Unix(path) => UnixStream::connect(path).map(Stream::Unix),
            Address::Unresolved(host) => Err(io::Error::new(
                io::ErrorKind::Other,
                format!("cannot connect to unresolved address `{}`: DNS lookups not supported", host),
            )),
        }
    }

    /// Inspect bytes without consuming them (`MSG_PEEK`).
    pub fn peek(&self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Stream::Tcp(s) => s.peek(buf),
            Stream::Unix(s) => s.peek(buf),
        }
    }

    /// Fetch and clear the socket's pending error, used right after a
    /// connect's first writable event to find out whether it actually
    /// succeeded.
    pub fn take_error(&self) -> io::Result<Option<io::Error>> {
        match self {
            Stream::Tcp(s) => s.take_error(),
            Stream::Unix(s) => s.take_error(),
        }
    }
}

impl Read for Stream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Stream::Tcp(s) => s.read(buf),
            Stream::Unix(s) => s.read(buf),
        }
    }
}

impl Write for Stream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Stream::Tcp(s) => s.write(buf),
            Stream::Unix(s) => s.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Stream::Tcp(s) => s.flush(),
            Stream::Unix(s) => s.flush(),
        }
    }
}

impl AsRawFd for Stream {
    fn as_raw_fd(&self) -> RawFd {
        match self {
            Stream::Tcp(s) => s.as_raw_fd(),
            Stream::Unix(s) => s.as_raw_fd(),
        }
    }
}

impl Evented for Stream {
    fn register(&mut self, os_queue: &mut OsQueue, id: event::Id, interests: Interests, opt: PollOption) -> io::Result<()> {
        match self {
            Stream::Tcp(s) => s.register(os_queue, id, interests, opt),
            Stream::Unix(s) => s.register(os_queue, id, interests, opt),
        }
    }

    fn reregister(&mut self, os_queue: &mut OsQueue, id: event::Id, interests: Interests, opt: PollOption) -> io::Result<()> {
        match self {
            Stream::Tcp(s) => s.reregister(os_queue, id, interests, opt),
            Stream::Unix(s) => s.reregister(os_queue, id, interests, opt),
        }
    }

    fn deregister(&mut self, os_queue: &mut OsQueue) -> io::Result<()> {
        match self {
            Stream::Tcp(s) => s.deregister(os_queue),
            Stream::Unix(s) => s.deregister(os_queue),
        }
    }
}

/// Whether an I/O error is a transient, "try again later" condition rather
/// than a real failure.
pub fn would_block(err: &io::Error) -> bool {
    matches!(err.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted)
}
