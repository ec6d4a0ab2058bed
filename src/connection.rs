//! The per-connection state machine: the centrepiece of the proxy. A
//! `Connection` owns two [`HalfSocket`]s -- `client` and `server` -- and
//! progresses through [`State`] as hostname sniffing, backend lookup,
//! upstream connect, and the duplex byte relay complete.

use std::fmt;
use std::io;

use log::{trace, warn};

use crate::addr::Address;
use crate::backend::BackendTable;
use crate::buffer::{self, Buffer};
use crate::event;
use crate::event::Ready;
use crate::listener::Listener;
use crate::os::{Evented, Interests, OsQueue, PollOption};
use crate::sniff::ParseResult;
use crate::stream::{would_block, Stream};

/// Which half of the connection an I/O event was raised for.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Side {
    Client,
    Server,
}

/// The connection's state. Strictly monotonic except for the two
/// half-closed branches, which both collapse to `Closed`.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum State {
    /// Accepted, waiting for enough client bytes to sniff a hostname.
    Accepted,
    /// Hostname extracted (or deliberately absent, with a fallback).
    Parsed,
    /// Backend address chosen.
    Resolved,
    /// Both sides open, relaying.
    Connected,
    /// Server side closed; draining buffered server-to-client bytes.
    ServerClosed,
    /// Client side closed; draining buffered client-to-server bytes.
    ClientClosed,
    /// Terminal: both sides closed, to be freed next turn.
    Closed,
}

/// One side of a relayed connection: its socket, the buffer fed by reading
/// that socket, the interests last armed with the event loop, and the peer
/// address it talks to.
pub struct HalfSocket {
    stream: Option<Stream>,
    buffer: Buffer,
    addr: Option<Address>,
    id: event::Id,
    armed: Option<Interests>,
    /// Set while a non-blocking `connect()` is outstanding: the next
    /// writable event means "check `take_error`", not "try to send".
    connecting: bool,
}

impl HalfSocket {
    fn new(stream: Stream, addr: Option<Address>, id: event::Id) -> HalfSocket {
        HalfSocket { stream: Some(stream), buffer: Buffer::new(), addr, id, armed: None, connecting: false }
    }

    fn empty(id: event::Id) -> HalfSocket {
        HalfSocket { stream: None, buffer: Buffer::new(), addr: None, id, armed: None, connecting: false }
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    pub fn buffer_len(&self) -> usize {
        self.buffer.len()
    }

    pub fn buffer_capacity(&self) -> usize {
        self.buffer.capacity()
    }

    pub fn addr(&self) -> Option<&Address> {
        self.addr.as_ref()
    }
}

impl fmt::Debug for HalfSocket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HalfSocket")
            .field("open", &self.is_open())
            .field("buffer", &self.buffer)
            .field("addr", &self.addr)
            .finish()
    }
}

/// The per-connection state machine.
#[derive(Debug)]
pub struct Connection {
    state: State,
    pub client: HalfSocket,
    pub server: HalfSocket,
    hostname: Option<String>,
    listener_id: usize,
    /// Links for the registry's intrusive LRU list; `None` when not (yet)
    /// inserted.
    pub(crate) prev: Option<usize>,
    pub(crate) next: Option<usize>,
}

impl Connection {
    /// Build a freshly accepted connection, wired to the client socket and
    /// waiting in `Accepted` for enough bytes to sniff. `client_id`/
    /// `server_id` are the stable `event::Id`s this connection's slot owns
    /// for the lifetime of the slot -- see the `proxy` module's id-space
    /// layout.
    pub fn accepted(
        client_stream: Stream,
        client_addr: Option<Address>,
        listener_id: usize,
        client_id: event::Id,
        server_id: event::Id,
    ) -> Connection {
        Connection {
            state: State::Accepted,
            client: HalfSocket::new(client_stream, client_addr, client_id),
            server: HalfSocket::empty(server_id),
            hostname: None,
            listener_id,
            prev: None,
            next: None,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn hostname(&self) -> Option<&str> {
        self.hostname.as_deref()
    }

    pub fn listener_id(&self) -> usize {
        self.listener_id
    }

    /// Register the client socket with the event loop. Called once, right
    /// after `accepted`.
    pub fn register_client(&mut self, os_queue: &mut OsQueue) -> io::Result<()> {
        let stream = self.client.stream.as_mut().expect("register_client without a client stream");
        let interests = Interests::READABLE;
        stream.register(os_queue, self.client.id, interests, PollOption::Level)?;
        self.client.armed = Some(interests);
        Ok(())
    }

    /// Register the freshly connected server socket, forcing write
    /// interest so the first event reports whether `connect()` succeeded.
    fn register_server(&mut self, os_queue: &mut OsQueue) -> io::Result<()> {
        let stream = self.server.stream.as_mut().expect("register_server without a server stream");
        let interests = Interests::WRITABLE;
        stream.register(os_queue, self.server.id, interests, PollOption::Level)?;
        self.server.armed = Some(interests);
        Ok(())
    }

    /// Close the client side. Bytes destined *for* the client (buffered in
    /// `server`) are no longer deliverable and are discarded; bytes
    /// destined *from* the client (buffered in `client`) are preserved so
    /// they can still reach the server during drain.
    fn close_client(&mut self, os_queue: &mut OsQueue) {
        assert!(self.client.stream.is_some(), "double close of client socket");
        if let Some(mut stream) = self.client.stream.take() {
            let _ = os_queue.deregister(&mut stream);
        }
        self.client.armed = None;
        self.server.buffer.clear();
        self.state = match self.state {
            State::ServerClosed | State::Accepted | State::Parsed | State::Resolved => State::Closed,
            State::Connected => State::ClientClosed,
            other => panic!("close_client: invalid state {:?}", other),
        };
    }

    /// Close the server side. Mirror of [`Connection::close_client`].
    fn close_server(&mut self, os_queue: &mut OsQueue) {
        assert!(self.server.stream.is_some(), "double close of server socket");
        if let Some(mut stream) = self.server.stream.take() {
            let _ = os_queue.deregister(&mut stream);
        }
        self.server.armed = None;
        self.client.buffer.clear();
        self.state = match self.state {
            State::ClientClosed => State::Closed,
            State::Connected => State::ServerClosed,
            other => panic!("close_server: invalid state {:?}", other),
        };
    }

    /// Used when a backend `connect()` fails hard before a server `Stream`
    /// ever existed: jump straight to `ServerClosed` without going through
    /// [`Connection::close_server`], which asserts a stream is present.
    fn fail_connect(&mut self) {
        debug_assert!(self.server.stream.is_none());
        self.client.buffer.clear();
        self.state = State::ServerClosed;
    }

    fn close_side(&mut self, os_queue: &mut OsQueue, side: Side) {
        match side {
            Side::Client if self.client.stream.is_some() => self.close_client(os_queue),
            Side::Server if self.server.stream.is_some() => self.close_server(os_queue),
            _ => {}
        }
    }

    /// Close both sides unconditionally, skipping the normal state
    /// transition table. Used only for shutdown, where connections are
    /// dropped mid-stream rather than drained.
    pub fn force_close(&mut self, os_queue: &mut OsQueue) {
        if let Some(mut stream) = self.client.stream.take() {
            let _ = os_queue.deregister(&mut stream);
        }
        if let Some(mut stream) = self.server.stream.take() {
            let _ = os_queue.deregister(&mut stream);
        }
        self.client.armed = None;
        self.server.armed = None;
        self.state = State::Closed;
    }
}

/// Advance `conn` in response to a readiness event on `side`. Returns
/// `true` if the connection reached `Closed` and should be removed from the
/// registry and freed.
pub fn handle_event(
    conn: &mut Connection,
    os_queue: &mut OsQueue,
    listener: &Listener,
    tables: &[BackendTable],
    readiness: Ready,
    side: Side,
) -> bool {
    step_receive(conn, os_queue, side, readiness);
    step_transmit(conn, os_queue, side, readiness);

    if side == Side::Client {
        step_progress(conn, os_queue, listener, tables);
    }

    step_drain(conn, os_queue);

    if conn.state == State::Closed {
        return true;
    }

    reactivate_watchers(conn, os_queue);
    false
}

/// (a) Receive: fill `side`'s own buffer from its own socket.
fn step_receive(conn: &mut Connection, os_queue: &mut OsQueue, side: Side, readiness: Ready) {
    if !readiness.is_readable() {
        return;
    }

    let half = match side {
        Side::Client => &mut conn.client,
        Side::Server => &mut conn.server,
    };
    let stream = match &half.stream {
        Some(s) => s,
        None => return,
    };
    if half.buffer.room() == 0 {
        return;
    }

    match half.buffer.recv(stream) {
        Ok(0) => conn.close_side(os_queue, side),
        Ok(n) => trace!("{:?}: received {} bytes", side, n),
        Err(err) if would_block(&err) => {}
        Err(err) => {
            warn!("{:?}: error receiving: {}", side, err);
            conn.close_side(os_queue, side);
        }
    }
}

/// (b) Transmit: drain the *other* side's buffer out through `side`'s
/// socket (the client's buffer carries client->server bytes, sent out over
/// the server socket, and vice versa).
fn step_transmit(conn: &mut Connection, os_queue: &mut OsQueue, side: Side, readiness: Ready) {
    if !readiness.is_writable() {
        return;
    }

    // A write-ready event on a still-connecting server socket means
    // "connect() has a result", not "go ahead and send".
    if side == Side::Server && conn.server.connecting {
        let stream = match &conn.server.stream {
            Some(s) => s,
            None => return,
        };
        match stream.take_error() {
            Ok(None) => conn.server.connecting = false,
            Ok(Some(err)) => {
                warn!("error connecting to backend: {}", err);
                conn.fail_connect();
                return;
            }
            Err(err) => {
                warn!("error checking backend connection: {}", err);
                conn.fail_connect();
                return;
            }
        }
    }

    let (out_stream_present, out_buffer_empty) = match side {
        Side::Client => (conn.client.stream.is_some(), conn.server.buffer.is_empty()),
        Side::Server => (conn.server.stream.is_some(), conn.client.buffer.is_empty()),
    };
    if !out_stream_present || out_buffer_empty {
        return;
    }

    let result = match side {
        Side::Client => {
            let stream = conn.client.stream.as_ref().unwrap();
            conn.server.buffer.send(stream)
        }
        Side::Server => {
            let stream = conn.server.stream.as_ref().unwrap();
            conn.client.buffer.send(stream)
        }
    };

    match result {
        Ok(n) => trace!("{:?}: sent {} bytes", side, n),
        Err(err) if would_block(&err) => {}
        Err(err) => {
            warn!("{:?}: error sending: {}", side, err);
            conn.close_side(os_queue, side);
        }
    }
}

/// (c) State progression, only invoked when the source was the client.
fn step_progress(conn: &mut Connection, os_queue: &mut OsQueue, listener: &Listener, tables: &[BackendTable]) {
    if conn.state == State::Accepted {
        let mut prefix = [0u8; buffer::CAPACITY];
        let n = conn.client.buffer.peek(&mut prefix);
        match (listener.sniffer())(&prefix[..n]) {
            ParseResult::Incomplete => {}
            ParseResult::Hostname(host) => {
                conn.hostname = Some(host);
                conn.state = State::Parsed;
            }
            ParseResult::NoHostname | ParseResult::Malformed => match listener.fallback() {
                Some(fallback) => {
                    conn.server.addr = Some(fallback.clone());
                    conn.state = State::Resolved;
                }
                None => conn.close_client(os_queue),
            },
        }
    }

    if conn.state == State::Parsed {
        let backend = listener
            .table_id()
            .and_then(|id| tables.get(id))
            .and_then(|table| table.lookup(conn.hostname()));

        let resolved = match backend {
            Some(backend) => Some(backend.resolve(listener.port())),
            None => listener.fallback().cloned(),
        };

        match resolved {
            Some(addr) if addr.is_resolved() => {
                conn.server.addr = Some(addr);
                conn.state = State::Resolved;
            }
            Some(addr) => {
                warn!(
                    "backend address `{}` for host `{}` is unresolved: DNS lookups not supported",
                    addr,
                    conn.hostname().unwrap_or("<none>"),
                );
                conn.close_client(os_queue);
            }
            None => conn.close_client(os_queue),
        }
    }

    if conn.state == State::Resolved {
        let addr = conn.server.addr.clone().expect("Resolved state without a server address");
        match Stream::connect(&addr) {
            Ok(stream) => {
                conn.server.stream = Some(stream);
                conn.server.connecting = true;
                conn.state = State::Connected;
                if let Err(err) = conn.register_server(os_queue) {
                    warn!("error registering backend connection: {}", err);
                    conn.fail_connect();
                }
            }
            Err(err) => {
                warn!("error connecting to backend {}: {}", addr, err);
                conn.fail_connect();
            }
        }
    }
}

/// (d) Half-close drain: once the buffer feeding the still-open side has
/// drained, close that side too.
fn step_drain(conn: &mut Connection, os_queue: &mut OsQueue) {
    if conn.state == State::ServerClosed && conn.server.buffer.is_empty() {
        conn.close_client(os_queue);
    }
    if conn.state == State::ClientClosed && conn.client.buffer.is_empty() {
        conn.close_server(os_queue);
    }
}

/// (f) Watcher reactivation: compute each still-open side's desired
/// interest and reregister only when it actually changed.
fn reactivate_watchers(conn: &mut Connection, os_queue: &mut OsQueue) {
    let server_has_output = !conn.client.buffer.is_empty();
    let client_has_output = !conn.server.buffer.is_empty();
    reactivate_one(&mut conn.client, client_has_output, os_queue, Side::Client);
    reactivate_one(&mut conn.server, server_has_output, os_queue, Side::Server);
}

fn reactivate_one(half: &mut HalfSocket, outbound_pending: bool, os_queue: &mut OsQueue, side: Side) {
    let stream = match &mut half.stream {
        Some(s) => s,
        None => return,
    };

    let wanted = if half.connecting {
        Some(Interests::WRITABLE)
    } else {
        let inbound_room = half.buffer.room() > 0;
        match (inbound_room, outbound_pending) {
            (false, false) => None,
            (true, false) => Some(Interests::READABLE),
            (false, true) => Some(Interests::WRITABLE),
            (true, true) => Some(Interests::READABLE | Interests::WRITABLE),
        }
    };

    if wanted == half.armed {
        return;
    }

    match (wanted, half.armed) {
        (Some(interests), None) => {
            if let Err(err) = stream.register(os_queue, half.id, interests, PollOption::Level) {
                warn!("{:?}: error registering: {}", side, err);
            }
            half.armed = Some(interests);
        }
        (Some(interests), Some(_)) => {
            if let Err(err) = stream.reregister(os_queue, half.id, interests, PollOption::Level) {
                warn!("{:?}: error reregistering: {}", side, err);
            }
            half.armed = Some(interests);
        }
        (None, Some(_)) => {
            // Nothing to wait for on this side right now. Polling is
            // level-triggered, so an armed-but-satisfied interest (e.g.
            // READABLE while room() == 0) would refire on every turn;
            // deregister until a future turn's diff re-arms it.
            if let Err(err) = stream.deregister(os_queue) {
                warn!("{:?}: error deregistering: {}", side, err);
            }
            half.armed = None;
        }
        (None, None) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener as StdTcpListener;
    use std::os::unix::io::{FromRawFd, IntoRawFd};
    use std::os::unix::net::UnixStream as StdUnixStream;
    use std::time::Duration;

    use crate::addr::Host;
    use crate::backend::Backend;
    use crate::listener::Protocol;

    #[test]
    fn side_equality() {
        assert_eq!(Side::Client, Side::Client);
        assert_ne!(Side::Client, Side::Server);
    }

    #[test]
    fn state_transitions_are_distinct() {
        assert_ne!(State::Accepted, State::Closed);
    }

    /// A connected `UnixStream` pair: one end wrapped as the crate's own
    /// non-blocking `Stream` (what a `HalfSocket` holds), the other left as
    /// a plain blocking `std` socket a test can drive directly.
    fn unix_pair() -> (Stream, StdUnixStream) {
        let (a, b) = StdUnixStream::pair().unwrap();
        a.set_nonblocking(true).unwrap();
        b.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
        let wrapped = unsafe { crate::sys::UnixStream::from_raw_fd(a.into_raw_fd()) };
        (Stream::Unix(wrapped), b)
    }

    fn http_listener(table_id: Option<usize>, fallback: Option<Address>) -> Listener {
        Listener::bind_tcp("127.0.0.1:0".parse().unwrap(), Protocol::Http, table_id, fallback).unwrap()
    }

    /// Register an already-built `HalfSocket`'s stream with `os_queue`,
    /// bypassing `Connection::register_client`/`register_server` so tests
    /// can wire up a `server` side that was never dialed through
    /// `step_progress`'s `RESOLVED` handling.
    fn register_side(half: &mut HalfSocket, os_queue: &mut OsQueue, interests: Interests) {
        let stream = half.stream.as_mut().expect("register_side on a half without a stream");
        stream.register(os_queue, half.id, interests, PollOption::Level).unwrap();
        half.armed = Some(interests);
    }

    #[test]
    fn accepted_chains_to_connected_in_one_client_event() {
        let backend = StdTcpListener::bind("127.0.0.1:0").unwrap();
        let backend_port = backend.local_addr().unwrap().port();

        let tables = vec![BackendTable {
            name: "t".to_string(),
            entries: vec![Backend { pattern: "*".to_string(), host: Host::Ip("127.0.0.1".parse().unwrap()), port: backend_port }],
        }];
        let listener = http_listener(Some(0), None);

        let (stream, peer) = unix_pair();
        let mut conn = Connection::accepted(stream, None, 0, event::Id(1), event::Id(2));
        let mut os_queue = OsQueue::new().unwrap();
        conn.register_client(&mut os_queue).unwrap();

        (&peer).write_all(b"GET / HTTP/1.1\r\nHost: a.example\r\n\r\n").unwrap();

        let closed = handle_event(&mut conn, &mut os_queue, &listener, &tables, Ready::READABLE, Side::Client);

        assert!(!closed);
        assert_eq!(conn.state(), State::Connected);
        assert_eq!(conn.hostname(), Some("a.example"));
        assert_eq!(conn.server.addr(), Some(&Address::Inet(format!("127.0.0.1:{}", backend_port).parse().unwrap())));
    }

    #[test]
    fn malformed_request_with_fallback_resolves_to_fallback() {
        let backend = StdTcpListener::bind("127.0.0.1:0").unwrap();
        let backend_addr = backend.local_addr().unwrap();
        let listener = http_listener(None, Some(Address::Inet(backend_addr)));
        let tables: Vec<BackendTable> = Vec::new();

        let (stream, peer) = unix_pair();
        let mut conn = Connection::accepted(stream, None, 0, event::Id(1), event::Id(2));
        let mut os_queue = OsQueue::new().unwrap();
        conn.register_client(&mut os_queue).unwrap();

        (&peer).write_all(b"this is not an http request\r\n\r\n").unwrap();
        let closed = handle_event(&mut conn, &mut os_queue, &listener, &tables, Ready::READABLE, Side::Client);

        assert!(!closed);
        assert_eq!(conn.state(), State::Connected);
        assert_eq!(conn.hostname(), None);
        assert_eq!(conn.server.addr(), Some(&Address::Inet(backend_addr)));
    }

    #[test]
    fn no_hostname_without_fallback_closes_client_before_any_backend_contact() {
        let listener = http_listener(None, None);
        let tables: Vec<BackendTable> = Vec::new();

        let (stream, peer) = unix_pair();
        let mut conn = Connection::accepted(stream, None, 0, event::Id(1), event::Id(2));
        let mut os_queue = OsQueue::new().unwrap();
        conn.register_client(&mut os_queue).unwrap();

        (&peer).write_all(b"GET / HTTP/1.0\r\n\r\n").unwrap();
        let closed = handle_event(&mut conn, &mut os_queue, &listener, &tables, Ready::READABLE, Side::Client);

        assert!(closed);
        assert_eq!(conn.state(), State::Closed);
        assert!(conn.server.addr().is_none());
        assert!(!conn.server.is_open());
    }

    #[test]
    #[should_panic(expected = "double close of client socket")]
    fn closing_client_twice_is_a_programming_error() {
        let (stream, _peer) = unix_pair();
        let mut conn = Connection::accepted(stream, None, 0, event::Id(1), event::Id(2));
        let mut os_queue = OsQueue::new().unwrap();
        conn.close_client(&mut os_queue);
        conn.close_client(&mut os_queue);
    }

    #[test]
    fn receive_is_skipped_once_buffer_room_is_exhausted() {
        let (stream, peer) = unix_pair();
        let mut conn = Connection::accepted(stream, None, 0, event::Id(1), event::Id(2));
        let mut os_queue = OsQueue::new().unwrap();
        conn.register_client(&mut os_queue).unwrap();

        (&peer).write_all(&vec![b'x'; buffer::CAPACITY]).unwrap();
        step_receive(&mut conn, &mut os_queue, Side::Client, Ready::READABLE);
        assert_eq!(conn.client.buffer_len(), conn.client.buffer_capacity());

        (&peer).write_all(b"more").unwrap();
        step_receive(&mut conn, &mut os_queue, Side::Client, Ready::READABLE);
        assert_eq!(conn.client.buffer_len(), conn.client.buffer_capacity(), "recv must not be attempted when room() == 0");
    }

    #[test]
    fn relay_roundtrips_bytes_both_directions() {
        let (client_stream, client_peer) = unix_pair();
        let (server_stream, server_peer) = unix_pair();

        let mut conn = Connection::accepted(client_stream, None, 0, event::Id(1), event::Id(2));
        let mut os_queue = OsQueue::new().unwrap();
        register_side(&mut conn.client, &mut os_queue, Interests::READABLE);
        conn.server = HalfSocket::new(server_stream, Some(Address::Inet("127.0.0.1:1".parse().unwrap())), event::Id(3));
        register_side(&mut conn.server, &mut os_queue, Interests::WRITABLE);
        conn.state = State::Connected;

        let listener = http_listener(None, None);
        let tables: Vec<BackendTable> = Vec::new();

        // client -> server: received into `client`'s buffer, sent out over
        // the `server` socket.
        (&client_peer).write_all(b"ping").unwrap();
        assert!(!handle_event(&mut conn, &mut os_queue, &listener, &tables, Ready::READABLE, Side::Client));
        assert!(!handle_event(&mut conn, &mut os_queue, &listener, &tables, Ready::WRITABLE, Side::Server));
        let mut buf = [0u8; 4];
        (&server_peer).read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"ping");

        // server -> client: received into `server`'s buffer, sent out over
        // the `client` socket.
        (&server_peer).write_all(b"pong!").unwrap();
        assert!(!handle_event(&mut conn, &mut os_queue, &listener, &tables, Ready::READABLE, Side::Server));
        assert!(!handle_event(&mut conn, &mut os_queue, &listener, &tables, Ready::WRITABLE, Side::Client));
        let mut buf2 = [0u8; 5];
        (&client_peer).read_exact(&mut buf2).unwrap();
        assert_eq!(&buf2, b"pong!");

        assert_eq!(conn.client.buffer_len(), 0);
        assert_eq!(conn.server.buffer_len(), 0);
    }

    #[test]
    fn server_eof_discards_unsent_bytes_but_flushes_buffered_ones_before_closing_client() {
        let (client_stream, client_peer) = unix_pair();
        let (server_stream, server_peer) = unix_pair();

        let mut conn = Connection::accepted(client_stream, None, 0, event::Id(1), event::Id(2));
        let mut os_queue = OsQueue::new().unwrap();
        register_side(&mut conn.client, &mut os_queue, Interests::READABLE);
        conn.server = HalfSocket::new(server_stream, Some(Address::Inet("127.0.0.1:1".parse().unwrap())), event::Id(3));
        register_side(&mut conn.server, &mut os_queue, Interests::READABLE);
        conn.state = State::Connected;

        let listener = http_listener(None, None);
        let tables: Vec<BackendTable> = Vec::new();

        // Bytes the client sent that never made it to the (about to close)
        // server: these must be discarded, not replayed.
        (&client_peer).write_all(b"unsent").unwrap();
        assert!(!handle_event(&mut conn, &mut os_queue, &listener, &tables, Ready::READABLE, Side::Client));
        assert_eq!(conn.client.buffer_len(), 6);

        // Bytes the server sent before going away: these must still reach
        // the client.
        (&server_peer).write_all(b"final-bytes").unwrap();
        assert!(!handle_event(&mut conn, &mut os_queue, &listener, &tables, Ready::READABLE, Side::Server));
        assert_eq!(conn.state(), State::Connected);

        drop(server_peer);
        assert!(!handle_event(&mut conn, &mut os_queue, &listener, &tables, Ready::READABLE, Side::Server));
        assert_eq!(conn.state(), State::ServerClosed);
        assert_eq!(conn.client.buffer_len(), 0, "client->server bytes are discarded once the server is gone");
        assert_eq!(conn.server.buffer_len(), "final-bytes".len());

        let closed = handle_event(&mut conn, &mut os_queue, &listener, &tables, Ready::WRITABLE, Side::Client);
        assert!(closed);
        assert_eq!(conn.state(), State::Closed);

        let mut buf = [0u8; 11];
        (&client_peer).read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"final-bytes");
    }
}
