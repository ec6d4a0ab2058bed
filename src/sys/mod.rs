#[cfg(unix)]
mod unix;

#[cfg(unix)]
pub use self::unix::*;

/// Maximum number of events pulled from the OS selector in a single call to
/// `Selector::select`. Further events are picked up on the next call.
pub(crate) const EVENTS_CAP: usize = 1024;
