//! Wires every other module into a running event loop: binds listeners,
//! builds backend tables from a [`Config`], and drives `OsQueue::poll` until
//! a shutdown signal arrives.
//!
//! # `event::Id` layout
//!
//! - `0 .. listeners.len()`: one id per listener's accept watcher.
//! - `listeners.len()`: the signal notifier.
//! - `listeners.len() + 1 ..`: connections, two ids apiece -- `base +
//!   2*slot` for the client side, `base + 2*slot + 1` for the server side,
//!   where `slot` is the connection's registry index.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use log::{debug, info, trace, warn};

use crate::addr::{Address, Host};
use crate::backend::{Backend, BackendTable};
use crate::config::{self, Config};
use crate::connection::{self, Connection, Side};
use crate::error::Error;
use crate::event::{self, Event};
use crate::listener::Listener;
use crate::os::{Evented, OsQueue, Signal, SignalSet, Signals};
use crate::registry::Registry;
use crate::stream::would_block;
use crate::{admin, sys};

/// The running proxy: every listener, backend table, and live connection,
/// plus the event loop's own bookkeeping.
#[derive(Debug)]
pub struct Proxy {
    os_queue: OsQueue,
    listeners: Vec<Listener>,
    tables: Vec<BackendTable>,
    registry: Registry,
    signals: Signals,
    signal_id: event::Id,
    conn_id_base: usize,
    config_path: Option<PathBuf>,
    events: Vec<Event>,
}

impl Proxy {
    /// Bind every listener named in `config`, build its backend tables, and
    /// set up the event loop. `config_path` is kept for `SIGHUP` reloads;
    /// `None` means reload is a no-op (there is nothing to re-read).
    pub fn new(config: Config, config_path: Option<PathBuf>) -> Result<Proxy, Error> {
        let mut os_queue = OsQueue::new().map_err(Error::EventQueue)?;

        let tables: Vec<BackendTable> = config.tables.into_iter().map(build_table).collect();
        let table_index_by_name = |name: &str| tables.iter().position(|t| t.name == name);

        let mut listeners = Vec::with_capacity(config.listeners.len());
        for listener_config in &config.listeners {
            let table_id = listener_config.table_name.as_deref().and_then(table_index_by_name);
            let fallback = listener_config.fallback.as_ref().map(|(host, port)| match host {
                Host::Unix(path) => Address::Unix(path.clone()),
                Host::Ip(ip) => {
                    let port = port.unwrap_or(listener_config.port.unwrap_or(0));
                    Address::Inet(std::net::SocketAddr::new(*ip, port))
                }
                Host::Unresolved(host) => Address::Unresolved(host.clone()),
            });

            let mut listener = bind_listener(listener_config, table_id, fallback)?;
            let id = event::Id(listeners.len());
            listener
                .socket_mut()
                .register(&mut os_queue, id, crate::os::Interests::READABLE, crate::os::PollOption::Level)
                .map_err(|source| Error::Bind { addr: listener_config.address.clone(), source })?;
            info!("listening on {} ({})", listener.display_addr(), listener.protocol());
            listeners.push(listener);
        }

        let signal_id = event::Id(listeners.len());
        let signals = Signals::new(&mut os_queue, SignalSet::all(), signal_id).map_err(Error::EventQueue)?;

        if let Some(user) = &config.user {
            drop_privileges(user)?;
        }

        Ok(Proxy {
            os_queue,
            listeners,
            tables,
            registry: Registry::new(),
            signals,
            signal_id,
            conn_id_base: signal_id.0 + 1,
            config_path,
            events: Vec::with_capacity(sys::EVENTS_CAP),
        })
    }

    /// Run the event loop until a shutdown signal arrives. Returns once
    /// `SIGINT`/`SIGTERM`/`SIGQUIT` has been handled and every connection
    /// freed.
    pub fn run(&mut self) -> Result<(), Error> {
        loop {
            self.os_queue.poll(&mut self.events, Some(Duration::from_secs(1))).map_err(Error::EventQueue)?;

            let events = std::mem::take(&mut self.events);
            for event in &events {
                if event.id() == self.signal_id {
                    if !self.handle_signals() {
                        self.events = events;
                        return Ok(());
                    }
                    continue;
                }

                if event.id().0 < self.listeners.len() {
                    self.accept_connections(event.id().0);
                    continue;
                }

                self.handle_connection_event(*event);
            }
            self.events = events;
        }
    }

    /// Drain every pending signal. Returns `false` once a shutdown signal
    /// has been handled.
    fn handle_signals(&mut self) -> bool {
        loop {
            match self.signals.receive() {
                Ok(Some(Signal::Interrupt)) | Ok(Some(Signal::Terminate)) | Ok(Some(Signal::Quit)) => {
                    info!("shutting down");
                    self.free_connections();
                    return false;
                }
                Ok(Some(Signal::Dump)) => match admin::dump(&self.registry) {
                    Ok(path) => info!("connection dump written to {}", path.display()),
                    Err(err) => warn!("error writing connection dump: {}", err),
                },
                Ok(Some(Signal::Reload)) => self.reload_config(),
                Ok(None) => break,
                Err(err) => {
                    warn!("error receiving signal: {}", err);
                    break;
                }
            }
        }
        true
    }

    fn reload_config(&mut self) {
        let path = match &self.config_path {
            Some(path) => path.clone(),
            None => {
                debug!("reload requested but no configuration file path is known, ignoring");
                return;
            }
        };

        match config::load(&path) {
            Ok(config) => {
                // Listeners are not added, removed, or rebound on reload --
                // only a reloaded table's entries are swapped in, matched by
                // name against the tables already running. A listener's
                // `table_id` is a fixed index into `self.tables`, so neither
                // the set of tables nor their order may change here.
                for table_config in config.tables {
                    match self.tables.iter_mut().find(|t| t.name == table_config.name) {
                        Some(table) => {
                            *table = build_table(table_config);
                            info!("reloaded backend table `{}`", table.name);
                        }
                        None => warn!(
                            "ignoring table `{}` introduced by reload: adding tables requires a restart",
                            table_config.name
                        ),
                    }
                }
            }
            Err(errors) => {
                for error in errors {
                    warn!("config reload: {}", error);
                }
                warn!("configuration reload failed, keeping the running configuration");
            }
        }
    }

    fn accept_connections(&mut self, listener_index: usize) {
        loop {
            let result = self.listeners[listener_index].socket().accept();
            let (stream, addr) = match result {
                Ok(pair) => pair,
                Err(err) if would_block(&err) => return,
                Err(err) => {
                    warn!("error accepting connection: {}", err);
                    return;
                }
            };

            let base = self.conn_id_base;
            let index = self.registry.next_index();
            let client_id = event::Id(base + index * 2);
            let server_id = event::Id(base + index * 2 + 1);

            let mut conn = Connection::accepted(stream, addr, listener_index, client_id, server_id);
            if let Err(err) = conn.register_client(&mut self.os_queue) {
                warn!("error registering accepted connection: {}", err);
                continue;
            }

            let inserted = self.registry.insert(conn);
            debug_assert_eq!(inserted, index, "connection landed in an unexpected registry slot");
            trace!("accepted connection on listener {}", listener_index);
        }
    }

    fn handle_connection_event(&mut self, event: Event) {
        let (index, side) = decode_conn_id(event.id().0, self.conn_id_base);

        let listener_id = match self.registry.get(index) {
            Some(conn) => conn.listener_id(),
            None => return,
        };
        let listener = &self.listeners[listener_id];

        let conn = match self.registry.get_mut(index) {
            Some(conn) => conn,
            None => return,
        };

        let closed = connection::handle_event(conn, &mut self.os_queue, listener, &self.tables, event.readiness(), side);

        if closed {
            self.registry.remove(index);
        } else {
            self.registry.touch(index);
        }
    }

    /// Close both sides of every live connection without waiting to drain,
    /// for use on shutdown.
    fn free_connections(&mut self) {
        let indices: Vec<usize> = self.registry.iter_lru().map(|(i, _)| i).collect();
        for index in indices {
            if let Some(mut conn) = self.registry.remove(index) {
                conn.force_close(&mut self.os_queue);
            }
        }
    }
}

fn decode_conn_id(id: usize, base: usize) -> (usize, Side) {
    let offset = id - base;
    let index = offset / 2;
    let side = if offset % 2 == 0 { Side::Client } else { Side::Server };
    (index, side)
}

fn build_table(table_config: config::TableConfig) -> BackendTable {
    let mut table = BackendTable::new(table_config.name);
    table.entries = table_config
        .entries
        .into_iter()
        .map(|(pattern, host, port)| Backend { pattern, host, port })
        .collect();
    table
}

fn bind_listener(
    listener_config: &config::ListenerConfig,
    table_id: Option<usize>,
    fallback: Option<Address>,
) -> Result<Listener, Error> {
    if let Some(path) = listener_config.address.strip_prefix("unix:") {
        return Listener::bind_unix(PathBuf::from(path), listener_config.protocol, table_id, fallback)
            .map_err(|source| Error::Bind { addr: listener_config.address.clone(), source });
    }

    let addr_str = match listener_config.port {
        Some(port) => format!("{}:{}", listener_config.address, port),
        None => listener_config.address.clone(),
    };
    let addr = addr_str.parse().map_err(|_| Error::Bind {
        addr: addr_str.clone(),
        source: io::Error::new(io::ErrorKind::InvalidInput, "not a valid socket address"),
    })?;
    Listener::bind_tcp(addr, listener_config.protocol, table_id, fallback)
        .map_err(|source| Error::Bind { addr: addr_str, source })
}

fn drop_privileges(username: &str) -> Result<(), Error> {
    use std::ffi::CString;

    let c_username = CString::new(username).map_err(|_| Error::UnknownUser(username.to_string()))?;

    let passwd = unsafe { libc::getpwnam(c_username.as_ptr()) };
    if passwd.is_null() {
        return Err(Error::UnknownUser(username.to_string()));
    }
    let (uid, gid) = unsafe { ((*passwd).pw_uid, (*passwd).pw_gid) };

    let ok = unsafe { libc::setgid(gid) == 0 && libc::setuid(uid) == 0 };
    if !ok {
        return Err(Error::DropPrivileges { user: username.to_string(), source: io::Error::last_os_error() });
    }

    info!("dropped privileges to user `{}`", username);
    Ok(())
}
