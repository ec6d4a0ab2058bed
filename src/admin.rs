//! The admin/signal surface: `SIGUSR1` dumps a table of live connections to
//! a uniquely named temporary file.

use std::env;
use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::process;

use log::info;

use crate::connection::{Connection, State};
use crate::registry::Registry;

/// Render `registry`'s connections, newest-active first, to a fresh file
/// under the system temp directory and return its path.
///
/// Columns: `STATE CLIENT_ADDR CLIENT_BUF_LEN/CAP SERVER_ADDR
/// SERVER_BUF_LEN/CAP`, `-` standing in for an absent field.
pub fn dump(registry: &Registry) -> io::Result<PathBuf> {
    let mut body = String::new();
    for (_, conn) in registry.iter_lru() {
        writeln!(body, "{}", format_row(conn)).expect("formatting into a String cannot fail");
    }

    let path = unique_dump_path();
    fs::write(&path, body)?;
    info!("wrote connection dump to {}", path.display());
    Ok(path)
}

fn format_row(conn: &Connection) -> String {
    let client_addr = conn.client.addr().map(ToString::to_string).unwrap_or_else(|| "-".to_string());
    let server_addr = conn.server.addr().map(ToString::to_string).unwrap_or_else(|| "-".to_string());
    format!(
        "{:<14} {:<22} {:>5}/{:<5} {:<22} {:>5}/{:<5}",
        state_label(conn.state()),
        client_addr,
        conn.client.buffer_len(),
        conn.client.buffer_capacity(),
        server_addr,
        conn.server.buffer_len(),
        conn.server.buffer_capacity(),
    )
}

fn state_label(state: State) -> &'static str {
    match state {
        State::Accepted => "ACCEPTED",
        State::Parsed => "PARSED",
        State::Resolved => "RESOLVED",
        State::Connected => "CONNECTED",
        State::ServerClosed => "SERVER_CLOSED",
        State::ClientClosed => "CLIENT_CLOSED",
        State::Closed => "CLOSED",
    }
}

fn unique_dump_path() -> PathBuf {
    env::temp_dir().join(format!("wayfare-dump-{}-{}.txt", process::id(), dump_sequence()))
}

fn dump_sequence() -> u64 {
    use std::sync::atomic::{AtomicU64, Ordering};
    static SEQ: AtomicU64 = AtomicU64::new(0);
    SEQ.fetch_add(1, Ordering::Relaxed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event;
    use crate::stream::Stream;
    use std::os::unix::io::{FromRawFd, IntoRawFd};
    use std::os::unix::net::UnixStream as StdUnixStream;

    fn dummy_stream() -> Stream {
        let (a, _b) = StdUnixStream::pair().unwrap();
        a.set_nonblocking(true).unwrap();
        Stream::Unix(unsafe { crate::sys::UnixStream::from_raw_fd(a.into_raw_fd()) })
    }

    #[test]
    fn dump_contains_one_line_per_connection() {
        let mut registry = Registry::new();
        registry.insert(Connection::accepted(dummy_stream(), None, 0, event::Id(1), event::Id(2)));
        registry.insert(Connection::accepted(dummy_stream(), None, 0, event::Id(3), event::Id(4)));

        let path = dump(&registry).unwrap();
        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
        assert!(contents.contains("ACCEPTED"));
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn absent_server_address_renders_as_dash() {
        let mut registry = Registry::new();
        registry.insert(Connection::accepted(dummy_stream(), None, 0, event::Id(1), event::Id(2)));
        let path = dump(&registry).unwrap();
        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.contains('-'));
        let _ = fs::remove_file(&path);
    }
}
