//! An intrusive slab arena of live [`Connection`]s, threaded through a
//! doubly-linked list ordered most-recently-active first. Index-based
//! rather than pointer-based, so the borrow checker doesn't have to take
//! our word for aliasing.

use std::fmt;

use crate::connection::Connection;

#[derive(Debug)]
enum Slot {
    Occupied(Connection),
    /// Free slots form their own singly-linked free list through this
    /// field, reusing the storage that would otherwise go unused.
    Vacant(Option<usize>),
}

/// A registry of connections, addressable by slot index, kept in
/// most-recently-active-first order for the admin dump.
pub struct Registry {
    slots: Vec<Slot>,
    free_head: Option<usize>,
    lru_head: Option<usize>,
    lru_tail: Option<usize>,
    len: usize,
}

impl Registry {
    pub fn new() -> Registry {
        Registry { slots: Vec::new(), free_head: None, lru_head: None, lru_tail: None, len: 0 }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The index `insert` will hand back if called right now. Lets a
    /// caller assign a connection its registry-derived `event::Id`s before
    /// the connection object exists.
    pub fn next_index(&self) -> usize {
        match self.free_head {
            Some(index) => index,
            None => self.slots.len(),
        }
    }

    /// Insert `conn`, returning the slot index it was stored at. The new
    /// entry becomes the most-recently-active.
    pub fn insert(&mut self, mut conn: Connection) -> usize {
        let index = match self.free_head.take() {
            Some(index) => {
                match &self.slots[index] {
                    Slot::Vacant(next) => self.free_head = *next,
                    Slot::Occupied(_) => unreachable!("free list pointed at an occupied slot"),
                }
                conn.prev = None;
                conn.next = None;
                self.slots[index] = Slot::Occupied(conn);
                index
            }
            None => {
                conn.prev = None;
                conn.next = None;
                self.slots.push(Slot::Occupied(conn));
                self.slots.len() - 1
            }
        };

        self.len += 1;
        self.push_front(index);
        index
    }

    pub fn get(&self, index: usize) -> Option<&Connection> {
        match self.slots.get(index) {
            Some(Slot::Occupied(conn)) => Some(conn),
            _ => None,
        }
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Connection> {
        match self.slots.get_mut(index) {
            Some(Slot::Occupied(conn)) => Some(conn),
            _ => None,
        }
    }

    /// Remove and return the connection at `index`.
    pub fn remove(&mut self, index: usize) -> Option<Connection> {
        if !matches!(self.slots.get(index), Some(Slot::Occupied(_))) {
            return None;
        }

        self.unlink(index);
        let prev = std::mem::replace(&mut self.slots[index], Slot::Vacant(self.free_head));
        self.free_head = Some(index);
        self.len -= 1;

        match prev {
            Slot::Occupied(conn) => Some(conn),
            Slot::Vacant(_) => unreachable!(),
        }
    }

    /// Move `index` to the front of the LRU list: it was just active.
    pub fn touch(&mut self, index: usize) {
        if self.lru_head == Some(index) {
            return;
        }
        self.unlink(index);
        self.push_front(index);
    }

    fn push_front(&mut self, index: usize) {
        let old_head = self.lru_head;
        if let Slot::Occupied(conn) = &mut self.slots[index] {
            conn.prev = None;
            conn.next = old_head;
        }
        if let Some(old_head) = old_head {
            if let Slot::Occupied(conn) = &mut self.slots[old_head] {
                conn.prev = Some(index);
            }
        }
        self.lru_head = Some(index);
        if self.lru_tail.is_none() {
            self.lru_tail = Some(index);
        }
    }

    fn unlink(&mut self, index: usize) {
        let (prev, next) = match &self.slots[index] {
            Slot::Occupied(conn) => (conn.prev, conn.next),
            Slot::Vacant(_) => return,
        };

        match prev {
            Some(prev) => {
                if let Slot::Occupied(conn) = &mut self.slots[prev] {
                    conn.next = next;
                }
            }
            None => self.lru_head = next,
        }
        match next {
            Some(next) => {
                if let Slot::Occupied(conn) = &mut self.slots[next] {
                    conn.prev = prev;
                }
            }
            None => self.lru_tail = prev,
        }
    }

    /// Iterate all live connections, most-recently-active first.
    pub fn iter_lru(&self) -> impl Iterator<Item = (usize, &Connection)> {
        std::iter::successors(self.lru_head, move |&index| match &self.slots[index] {
            Slot::Occupied(conn) => conn.next,
            Slot::Vacant(_) => None,
        })
        .map(move |index| match &self.slots[index] {
            Slot::Occupied(conn) => (index, conn),
            Slot::Vacant(_) => unreachable!("LRU chain pointed at a vacant slot"),
        })
    }
}

impl Default for Registry {
    fn default() -> Registry {
        Registry::new()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry").field("len", &self.len).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::io::{FromRawFd, IntoRawFd};
    use std::os::unix::net::UnixStream;

    fn dummy_connection() -> Connection {
        let (a, _b) = UnixStream::pair().unwrap();
        a.set_nonblocking(true).unwrap();
        let sys_stream = unsafe { crate::sys::UnixStream::from_raw_fd(a.into_raw_fd()) };
        let stream = crate::stream::Stream::Unix(sys_stream);
        Connection::accepted(stream, None, 0, crate::event::Id(1), crate::event::Id(2))
    }

    #[test]
    fn insert_and_get() {
        let mut reg = Registry::new();
        let idx = reg.insert(dummy_connection());
        assert_eq!(reg.len(), 1);
        assert!(reg.get(idx).is_some());
    }

    #[test]
    fn remove_frees_slot_for_reuse() {
        let mut reg = Registry::new();
        let idx = reg.insert(dummy_connection());
        reg.remove(idx).unwrap();
        assert_eq!(reg.len(), 0);
        let idx2 = reg.insert(dummy_connection());
        assert_eq!(idx, idx2);
    }

    #[test]
    fn lru_order_is_most_recent_first() {
        let mut reg = Registry::new();
        let a = reg.insert(dummy_connection());
        let b = reg.insert(dummy_connection());
        let c = reg.insert(dummy_connection());

        let order: Vec<usize> = reg.iter_lru().map(|(i, _)| i).collect();
        assert_eq!(order, vec![c, b, a]);

        reg.touch(a);
        let order: Vec<usize> = reg.iter_lru().map(|(i, _)| i).collect();
        assert_eq!(order, vec![a, c, b]);
    }

    #[test]
    fn remove_middle_preserves_remaining_order() {
        let mut reg = Registry::new();
        let a = reg.insert(dummy_connection());
        let b = reg.insert(dummy_connection());
        let c = reg.insert(dummy_connection());
        reg.remove(b);
        let order: Vec<usize> = reg.iter_lru().map(|(i, _)| i).collect();
        assert_eq!(order, vec![c, a]);
    }
}
