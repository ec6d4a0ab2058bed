use std::io;
use std::os::unix::io::RawFd;

use crate::event;
use crate::os::{Evented, Interests, PollOption, OsQueue};

/// Adapter for a `RawFd` providing an [`Evented`] implementation.
///
/// `EventedFd` enables registering any type with a file descriptor with
/// [`OsQueue`].
///
/// Note that `EventedFd` takes a reference to a `RawFd`. This is because
/// `EventedFd` **does not** take ownership of the file descriptor.
/// Specifically, it will not manage any lifecycle related operations, such as
/// closing the file descriptor on drop. It is expected that the `EventedFd`
/// is constructed right before a call to [`OsQueue::register`].
///
/// [`Evented`]: crate::os::Evented
/// [`OsQueue`]: crate::os::OsQueue
/// [`OsQueue::register`]: crate::os::OsQueue::register
///
/// # Deregistering
///
/// The file descriptor doesn't need to be deregistered **iff** the file
/// descriptor is unique (i.e. it is not duplicated via `dup(2)`) and will be
/// deregistered when it is `close`d.
#[derive(Debug)]
pub struct EventedFd<'a>(pub &'a RawFd);

impl<'a> Evented for EventedFd<'a> {
    fn register(&mut self, poller: &mut OsQueue, id: event::Id, interests: Interests, opt: PollOption) -> io::Result<()> {
        poller.selector().register(*self.0, id, interests, opt)
    }

    fn reregister(&mut self, poller: &mut OsQueue, id: event::Id, interests: Interests, opt: PollOption) -> io::Result<()> {
        poller.selector().reregister(*self.0, id, interests, opt)
    }

    fn deregister(&mut self, poller: &mut OsQueue) -> io::Result<()> {
        poller.selector().deregister(*self.0)
    }
}
