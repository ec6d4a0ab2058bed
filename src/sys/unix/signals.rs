use std::{io, ptr};
use std::mem::MaybeUninit;

use crate::os::signals::SignalSet;

#[cfg(target_os = "linux")]
mod signalfd {
    use std::fs::File;
    use std::io::{self, Read};
    use std::mem::MaybeUninit;
    use std::os::unix::io::FromRawFd;
    use std::{mem, slice};

    use super::{block_signals, create_sigset};
    use crate::event;
    use crate::os::signals::{Signal, SignalSet};
    use crate::os::{Interests, PollOption};
    use crate::sys::Selector;

    /// Signaler backed by `signalfd`.
    #[derive(Debug)]
    pub struct Signals {
        fd: File,
    }

    impl Signals {
        pub fn new(selector: &Selector, signals: SignalSet, id: event::Id) -> io::Result<Signals> {
            // Create a mask for all signals we want to handle.
            let set = create_sigset(signals)?;

            // Create a new signal file descriptor.
            let fd = unsafe { libc::signalfd(-1, &set, libc::SFD_CLOEXEC | libc::SFD_NONBLOCK) };
            if fd == -1 {
                return Err(io::Error::last_os_error());
            }

            // Register the signalfd, only then block the signals and return our
            // struct.
            selector.register(fd, id, Interests::READABLE, PollOption::Level)
                .and_then(|()| block_signals(&set))
                .map(|()| Signals { fd: unsafe { File::from_raw_fd(fd) } })
        }

        pub fn receive(&mut self) -> io::Result<Option<Signal>> {
            let mut info: MaybeUninit<libc::signalfd_siginfo> = MaybeUninit::uninit();
            let info_ref: &mut [u8] = unsafe {
                slice::from_raw_parts_mut(info.as_mut_ptr() as *mut u8, mem::size_of::<libc::signalfd_siginfo>())
            };
            let n = loop {
                match self.fd.read(info_ref) {
                    Ok(n) => break n,
                    Err(ref err) if err.kind() == io::ErrorKind::WouldBlock => return Ok(None),
                    Err(ref err) if err.kind() == io::ErrorKind::Interrupted => continue,
                    Err(err) => return Err(err),
                }
            };
            assert_eq!(n, mem::size_of::<libc::signalfd_siginfo>());
            let info = unsafe { info.assume_init() };
            Ok(Signal::from_raw(info.ssi_signo as libc::c_int))
        }
    }
}

#[cfg(target_os = "linux")]
pub use self::signalfd::Signals;

#[cfg(any(target_os = "freebsd", target_os = "macos",
          target_os = "netbsd", target_os = "openbsd"))]
mod kqueue {
    use std::os::unix::io::AsRawFd;
    use std::{io, mem, ptr};
    use std::mem::MaybeUninit;

    use super::{block_signals, create_sigset};
    use crate::event;
    use crate::os::signals::{Signal, SignalSet};
    use crate::os::{Interests, PollOption};
    use crate::sys::Selector;

    /// Signaler backed by kqueue (`EVFILT_SIGNAL`).
    #[derive(Debug)]
    pub struct Signals {
        kq: Selector,
    }

    impl Signals {
        pub fn new(selector: &Selector, signals: SignalSet, id: event::Id) -> io::Result<Signals> {
            let set = create_sigset(signals)?;
            let kq = Selector::new()?;
            for signal in signals {
                kq.register_signal(id, signal.into_raw())?;
            }
            selector.register(kq.as_raw_fd(), id, Interests::READABLE, PollOption::Level)
                .and_then(|()| block_signals(&set))
                .map(|()| Signals { kq })
        }

        pub fn receive(&mut self) -> io::Result<Option<Signal>> {
            let mut kevent: MaybeUninit<libc::kevent> = MaybeUninit::uninit();
            let timeout = libc::timespec { tv_sec: 0, tv_nsec: 0 };

            let n_events = unsafe {
                libc::kevent(self.kq.as_raw_fd(), ptr::null(), 0,
                    kevent.as_mut_ptr(), 1, &timeout)
            };
            match n_events {
                -1 => Err(io::Error::last_os_error()),
                0 => Ok(None), // No signals.
                n => {
                    assert_eq!(n, 1);
                    let kevent = unsafe { kevent.assume_init() };
                    assert_eq!(kevent.filter, libc::EVFILT_SIGNAL);
                    Ok(Signal::from_raw(kevent.ident as libc::c_int))
                },
            }
        }
    }
}

#[cfg(any(target_os = "freebsd", target_os = "macos",
          target_os = "netbsd", target_os = "openbsd"))]
pub use self::kqueue::Signals;

/// Create a `libc::sigset_t` from `SignalSet`.
fn create_sigset(signals: SignalSet) -> io::Result<libc::sigset_t> {
    let mut set: MaybeUninit<libc::sigset_t> = MaybeUninit::uninit();
    if unsafe { libc::sigemptyset(set.as_mut_ptr()) } == -1 {
        return Err(io::Error::last_os_error());
    }
    let mut set = unsafe { set.assume_init() };
    for signal in signals {
        if unsafe { libc::sigaddset(&mut set, signal.into_raw()) } == -1 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(set)
}

/// Block all signals in `set`.
fn block_signals(set: &libc::sigset_t) -> io::Result<()> {
    if unsafe { libc::sigprocmask(libc::SIG_BLOCK, set, ptr::null_mut()) } == -1 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}
