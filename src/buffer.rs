//! The fixed-capacity ring buffer every [`HalfSocket`] uses to stage bytes
//! between a non-blocking `recv` and a later non-blocking `send`.
//!
//! [`HalfSocket`]: crate::connection::HalfSocket

use std::cmp::min;
use std::io;
use std::os::unix::io::AsRawFd;

/// Capacity of a single buffer, matching the reference implementation this
/// is grounded on.
pub const CAPACITY: usize = 4096;

/// A fixed-capacity ring buffer.
///
/// `recv`/`send` move bytes to/from a raw file descriptor using `readv`/
/// `writev` so that a wrapped buffer never needs an internal copy to
/// present a contiguous slice to the kernel.
pub struct Buffer {
    data: Box<[u8; CAPACITY]>,
    start: usize,
    len: usize,
}

impl Buffer {
    /// Create a new, empty buffer.
    pub fn new() -> Buffer {
        Buffer {
            data: Box::new([0; CAPACITY]),
            start: 0,
            len: 0,
        }
    }

    /// Number of bytes currently held.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the buffer holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Total capacity.
    pub fn capacity(&self) -> usize {
        CAPACITY
    }

    /// Free space: `capacity() - len()`.
    pub fn room(&self) -> usize {
        CAPACITY - self.len
    }

    /// Discard all buffered bytes.
    pub fn clear(&mut self) {
        self.start = 0;
        self.len = 0;
    }

    /// Copy up to `dst.len()` bytes into `dst` without consuming them.
    /// Returns the number of bytes copied, which may be less than
    /// `dst.len()` if fewer are buffered.
    pub fn peek(&self, dst: &mut [u8]) -> usize {
        let n = min(dst.len(), self.len);
        let first = min(n, CAPACITY - self.start);
        dst[..first].copy_from_slice(&self.data[self.start..self.start + first]);
        if n > first {
            dst[first..n].copy_from_slice(&self.data[..n - first]);
        }
        n
    }

    /// Drop `n` bytes from the head of the buffer (or all of it, if fewer
    /// than `n` bytes are held).
    pub fn consume(&mut self, n: usize) {
        let n = min(n, self.len);
        self.start = (self.start + n) % CAPACITY;
        self.len -= n;
    }

    /// Read from `fd` directly into the free space at the tail of the ring,
    /// appending whatever was read. Never blocks. Must not be called when
    /// `room() == 0`.
    ///
    /// Returns `Ok(0)` on peer EOF, `Ok(n)` for `n` bytes appended, or an
    /// error (including `WouldBlock`) otherwise.
    pub fn recv<Fd: AsRawFd>(&mut self, fd: &Fd) -> io::Result<usize> {
        debug_assert!(self.room() > 0, "recv called on a full buffer");

        let write_at = (self.start + self.len) % CAPACITY;
        let first_len = min(self.room(), CAPACITY - write_at);
        let second_len = self.room() - first_len;

        let mut iov = [
            libc::iovec {
                iov_base: unsafe { self.data.as_mut_ptr().add(write_at) } as *mut _,
                iov_len: first_len,
            },
            libc::iovec {
                iov_base: self.data.as_mut_ptr() as *mut _,
                iov_len: second_len,
            },
        ];
        let iov_count = if second_len > 0 { 2 } else { 1 };

        let n = unsafe { libc::readv(fd.as_raw_fd(), iov.as_mut_ptr(), iov_count) };
        if n < 0 {
            return Err(io::Error::last_os_error());
        }
        self.len += n as usize;
        Ok(n as usize)
    }

    /// Write the buffered bytes to `fd`, consuming exactly the number of
    /// bytes transmitted. Never blocks. A return of `Ok(0)` can happen
    /// under a temporary condition; it does not mean the peer is gone.
    pub fn send<Fd: AsRawFd>(&mut self, fd: &Fd) -> io::Result<usize> {
        if self.len == 0 {
            return Ok(0);
        }

        let first_len = min(self.len, CAPACITY - self.start);
        let second_len = self.len - first_len;

        let iov = [
            libc::iovec {
                iov_base: unsafe { self.data.as_ptr().add(self.start) } as *mut _,
                iov_len: first_len,
            },
            libc::iovec {
                iov_base: self.data.as_ptr() as *mut _,
                iov_len: second_len,
            },
        ];
        let iov_count = if second_len > 0 { 2 } else { 1 };

        let n = unsafe { libc::writev(fd.as_raw_fd(), iov.as_ptr(), iov_count) };
        if n < 0 {
            return Err(io::Error::last_os_error());
        }
        self.consume(n as usize);
        Ok(n as usize)
    }
}

impl Default for Buffer {
    fn default() -> Buffer {
        Buffer::new()
    }
}

impl std::fmt::Debug for Buffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buffer")
            .field("len", &self.len)
            .field("capacity", &CAPACITY)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::io::{FromRawFd, IntoRawFd};
    use std::os::unix::net::UnixStream;

    #[test]
    fn peek_and_consume() {
        let mut buf = Buffer::new();
        let (mut a, b) = UnixStream::pair().unwrap();
        a.set_nonblocking(true).unwrap();
        use std::io::Write;
        a.write_all(b"hello world").unwrap();

        let b = unsafe { UnixStream::from_raw_fd(b.into_raw_fd()) };
        b.set_nonblocking(true).unwrap();
        let n = buf.recv(&b).unwrap();
        assert_eq!(n, 11);
        assert_eq!(buf.len(), 11);

        let mut out = [0u8; 5];
        let peeked = buf.peek(&mut out);
        assert_eq!(peeked, 5);
        assert_eq!(&out, b"hello");
        // peek must not consume.
        assert_eq!(buf.len(), 11);

        buf.consume(6);
        assert_eq!(buf.len(), 5);
        let mut rest = [0u8; 5];
        assert_eq!(buf.peek(&mut rest), 5);
        assert_eq!(&rest, b"world");
    }

    #[test]
    fn room_and_capacity_invariant() {
        let buf = Buffer::new();
        assert_eq!(buf.room() + buf.len(), buf.capacity());
    }

    #[test]
    fn wraps_around() {
        let mut buf = Buffer::new();
        // Force `start` near the end so a subsequent recv wraps.
        buf.start = CAPACITY - 3;
        buf.len = 0;

        let (mut a, b) = UnixStream::pair().unwrap();
        use std::io::Write;
        a.write_all(b"0123456789").unwrap();
        let b = unsafe { UnixStream::from_raw_fd(b.into_raw_fd()) };
        b.set_nonblocking(true).unwrap();

        let n = buf.recv(&b).unwrap();
        assert_eq!(n, 10);
        assert_eq!(buf.len(), 10);

        let mut out = [0u8; 10];
        assert_eq!(buf.peek(&mut out), 10);
        assert_eq!(&out, b"0123456789");
    }

    #[test]
    fn send_consumes_exactly_what_was_written() {
        let mut buf = Buffer::new();
        let (a, mut b) = UnixStream::pair().unwrap();
        a.set_nonblocking(true).unwrap();
        let a = unsafe { UnixStream::from_raw_fd(a.into_raw_fd()) };

        let mut out = [0u8; 5];
        buf.data[..5].copy_from_slice(b"abcde");
        buf.len = 5;

        let n = buf.send(&a).unwrap();
        assert_eq!(n, 5);
        assert_eq!(buf.len(), 0);

        use std::io::Read;
        let read = b.read(&mut out).unwrap();
        assert_eq!(&out[..read], b"abcde");
    }
}
