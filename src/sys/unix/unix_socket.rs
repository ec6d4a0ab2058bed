use std::io::{self, Read, Write};
use std::mem::{self, MaybeUninit};
use std::os::unix::io::{AsRawFd, FromRawFd, IntoRawFd, RawFd};
use std::os::unix::net;
use std::path::Path;

use crate::event;
use crate::os::{Evented, Interests, PollOption, OsQueue};
use crate::sys::unix::eventedfd::EventedFd;

/// A non-blocking Unix domain stream socket, the Unix-socket counterpart to
/// [`TcpStream`].
///
/// [`TcpStream`]: crate::sys::unix::TcpStream
#[derive(Debug)]
pub struct UnixStream {
    stream: net::UnixStream,
}

impl UnixStream {
    pub fn connect<P: AsRef<Path>>(path: P) -> io::Result<UnixStream> {
        let socket_fd = unsafe { libc::socket(libc::AF_UNIX, libc::SOCK_STREAM | libc::SOCK_CLOEXEC, 0) };
        if socket_fd == -1 {
            return Err(io::Error::last_os_error());
        }

        if unsafe { libc::fcntl(socket_fd, libc::F_SETFL, libc::O_NONBLOCK) } == -1 {
            return Err(io::Error::last_os_error());
        }

        let (addr, addr_len) = raw_sockaddr_un(path.as_ref())?;
        if unsafe { libc::connect(socket_fd, &addr as *const _ as *const libc::sockaddr, addr_len) } == -1 {
            let err = io::Error::last_os_error();
            if err.raw_os_error() != Some(libc::EINPROGRESS) {
                return Err(err);
            }
        }

        let stream = unsafe { net::UnixStream::from_raw_fd(socket_fd) };
        Ok(UnixStream { stream })
    }

    pub fn peek(&self, buf: &mut [u8]) -> io::Result<usize> {
        // `std::os::unix::net::UnixStream` has no `peek`, fall back to the
        // `MSG_PEEK` flag directly.
        let n = unsafe {
            libc::recv(self.stream.as_raw_fd(), buf.as_mut_ptr() as *mut libc::c_void,
                buf.len(), libc::MSG_PEEK)
        };
        if n == -1 {
            Err(io::Error::last_os_error())
        } else {
            Ok(n as usize)
        }
    }

    pub fn shutdown(&self, how: std::net::Shutdown) -> io::Result<()> {
        self.stream.shutdown(how)
    }

    pub fn take_error(&self) -> io::Result<Option<io::Error>> {
        self.stream.take_error()
    }
}

impl Read for UnixStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf)
    }
}

impl Write for UnixStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stream.flush()
    }
}

impl Evented for UnixStream {
    fn register(&mut self, os_queue: &mut OsQueue, id: event::Id, interests: Interests, opt: PollOption) -> io::Result<()> {
        EventedFd(&self.as_raw_fd()).register(os_queue, id, interests, opt)
    }

    fn reregister(&mut self, os_queue: &mut OsQueue, id: event::Id, interests: Interests, opt: PollOption) -> io::Result<()> {
        EventedFd(&self.as_raw_fd()).reregister(os_queue, id, interests, opt)
    }

    fn deregister(&mut self, os_queue: &mut OsQueue) -> io::Result<()> {
        EventedFd(&self.as_raw_fd()).deregister(os_queue)
    }
}

impl FromRawFd for UnixStream {
    unsafe fn from_raw_fd(fd: RawFd) -> UnixStream {
        UnixStream { stream: net::UnixStream::from_raw_fd(fd) }
    }
}

impl IntoRawFd for UnixStream {
    fn into_raw_fd(self) -> RawFd {
        self.stream.into_raw_fd()
    }
}

impl AsRawFd for UnixStream {
    fn as_raw_fd(&self) -> RawFd {
        self.stream.as_raw_fd()
    }
}

/// A non-blocking Unix domain stream listener, the Unix-socket counterpart to
/// [`TcpListener`].
///
/// [`TcpListener`]: crate::sys::unix::TcpListener
#[derive(Debug)]
pub struct UnixListener {
    listener: net::UnixListener,
}

impl UnixListener {
    pub fn bind<P: AsRef<Path>>(path: P) -> io::Result<UnixListener> {
        let socket_fd = unsafe { libc::socket(libc::AF_UNIX, libc::SOCK_STREAM | libc::SOCK_CLOEXEC, 0) };
        if socket_fd == -1 {
            return Err(io::Error::last_os_error());
        }

        if unsafe { libc::fcntl(socket_fd, libc::F_SETFL, libc::O_NONBLOCK) } == -1 {
            return Err(io::Error::last_os_error());
        }

        let (addr, addr_len) = raw_sockaddr_un(path.as_ref())?;
        if unsafe { libc::bind(socket_fd, &addr as *const _ as *const libc::sockaddr, addr_len) } == -1 {
            return Err(io::Error::last_os_error());
        }

        if unsafe { libc::listen(socket_fd, 128) } == -1 {
            return Err(io::Error::last_os_error());
        }

        let listener = unsafe { net::UnixListener::from_raw_fd(socket_fd) };
        Ok(UnixListener { listener })
    }

    pub fn accept(&self) -> io::Result<(UnixStream, ())> {
        let (stream, _address) = self.listener.accept()?;
        stream.set_nonblocking(true)?;
        Ok((UnixStream { stream }, ()))
    }

    pub fn take_error(&self) -> io::Result<Option<io::Error>> {
        self.listener.take_error()
    }
}

impl Evented for UnixListener {
    fn register(&mut self, os_queue: &mut OsQueue, id: event::Id, interests: Interests, opt: PollOption) -> io::Result<()> {
        EventedFd(&self.as_raw_fd()).register(os_queue, id, interests, opt)
    }

    fn reregister(&mut self, os_queue: &mut OsQueue, id: event::Id, interests: Interests, opt: PollOption) -> io::Result<()> {
        EventedFd(&self.as_raw_fd()).reregister(os_queue, id, interests, opt)
    }

    fn deregister(&mut self, os_queue: &mut OsQueue) -> io::Result<()> {
        EventedFd(&self.as_raw_fd()).deregister(os_queue)
    }
}

impl FromRawFd for UnixListener {
    unsafe fn from_raw_fd(fd: RawFd) -> UnixListener {
        UnixListener { listener: net::UnixListener::from_raw_fd(fd) }
    }
}

impl IntoRawFd for UnixListener {
    fn into_raw_fd(self) -> RawFd {
        self.listener.into_raw_fd()
    }
}

impl AsRawFd for UnixListener {
    fn as_raw_fd(&self) -> RawFd {
        self.listener.as_raw_fd()
    }
}

/// Build a `sockaddr_un` for `path`, erroring out if the path is too long to
/// fit (matching the kernel's own `ENAMETOOLONG` behaviour ahead of time).
fn raw_sockaddr_un(path: &Path) -> io::Result<(libc::sockaddr_un, libc::socklen_t)> {
    let bytes = path.to_str()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path is not valid UTF-8"))?
        .as_bytes();
    if bytes.len() >= mem::size_of::<libc::sockaddr_un>() - mem::size_of::<libc::sa_family_t>() {
        return Err(io::Error::from_raw_os_error(libc::ENAMETOOLONG));
    }

    let mut addr: MaybeUninit<libc::sockaddr_un> = MaybeUninit::zeroed();
    let addr_ptr = addr.as_mut_ptr();
    unsafe {
        (*addr_ptr).sun_family = libc::AF_UNIX as libc::sa_family_t;
        let sun_path = (*addr_ptr).sun_path.as_mut_ptr() as *mut u8;
        ptr_copy(bytes, sun_path);
    }
    let addr = unsafe { addr.assume_init() };

    let base = mem::size_of::<libc::sockaddr_un>() - addr.sun_path.len();
    let len = (base + bytes.len() + 1) as libc::socklen_t;
    Ok((addr, len))
}

unsafe fn ptr_copy(bytes: &[u8], dst: *mut u8) {
    std::ptr::copy_nonoverlapping(bytes.as_ptr(), dst, bytes.len());
}
