use std::io;

use crate::event;
use crate::os::{Interests, PollOption, OsQueue};

/// A value that may be registered with `OsQueue`.
///
/// Values that implement `Evented` can be registered with [`OsQueue`]. The
/// methods on the trait cannot be called directly, instead the equivalent
/// methods must be called on an [`OsQueue`] instance.
///
/// See [`OsQueue`] for more details.
///
/// [`OsQueue`]: crate::os::OsQueue
///
/// # Implementing `Evented`
///
/// Implementations of `Evented` are always backed by **system** handles,
/// which are backed by sockets or other system handles. The `Evented`
/// handles will be monitored by the system selector. In this case, an
/// implementation of `Evented` delegates to a lower level handle. Examples
/// of this are [`TcpStream`]s, or the *unix only* [`EventedFd`].
///
/// [`TcpStream`]: crate::net::TcpStream
/// [`EventedFd`]: crate::sys::unix::EventedFd
///
/// # Dropping `Evented` types
///
/// All `Evented` types, unless otherwise specified, need to be deregistered
/// before being dropped for them to not leak resources. This goes against the
/// normal drop behaviour of types in Rust which cleanup after themselves, e.g.
/// a `File` will close itself. However since deregistering needs mutable access
/// to `OsQueue` this cannot be done while being dropped.
pub trait Evented {
    /// Register `self` with the given `OsQueue` instance.
    ///
    /// This function should not be called directly, use [`OsQueue::register`]
    /// instead.
    fn register(&mut self, selector: &mut OsQueue, id: event::Id, interests: Interests, opt: PollOption) -> io::Result<()>;

    /// Reregister `self` with the given `OsQueue` instance.
    ///
    /// This function should not be called directly, use [`OsQueue::reregister`]
    /// instead.
    fn reregister(&mut self, selector: &mut OsQueue, id: event::Id, interests: Interests, opt: PollOption) -> io::Result<()>;

    /// Deregister `self` from the given `OsQueue` instance.
    ///
    /// This function should not be called directly, use [`OsQueue::deregister`]
    /// instead.
    fn deregister(&mut self, selector: &mut OsQueue) -> io::Result<()>;
}
