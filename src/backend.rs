//! The backend table: an ordered list of `(hostname-pattern, address,
//! port)` rows, looked up first-match-wins.

use crate::addr::{Address, Host};

/// A single backend row.
#[derive(Debug, Clone)]
pub struct Backend {
    pub pattern: String,
    pub host: Host,
    /// `0` means "reuse the listener's own port".
    pub port: u16,
}

impl Backend {
    /// Resolve this row into a connect-ready [`Address`], folding in
    /// `listener_port` when this row's own port is `0`.
    pub fn resolve(&self, listener_port: u16) -> Address {
        match &self.host {
            Host::Unix(path) => Address::Unix(path.clone()),
            Host::Ip(ip) => {
                let port = if self.port == 0 { listener_port } else { self.port };
                Address::Inet(std::net::SocketAddr::new(*ip, port))
            }
            Host::Unresolved(host) => Address::Unresolved(host.clone()),
        }
    }
}

/// An ordered, named table of backend rows.
#[derive(Debug, Clone, Default)]
pub struct BackendTable {
    pub name: String,
    pub entries: Vec<Backend>,
}

impl BackendTable {
    pub fn new(name: String) -> BackendTable {
        BackendTable { name, entries: Vec::new() }
    }

    /// Return the first row whose pattern matches `hostname`, if any.
    /// `hostname` of `None` (sniffer returned `NoHostname`/`Malformed`)
    /// never matches any row -- the caller falls back to the listener's
    /// fallback address in that case.
    pub fn lookup(&self, hostname: Option<&str>) -> Option<&Backend> {
        let hostname = hostname?;
        self.entries.iter().find(|backend| glob_match(&backend.pattern, hostname))
    }
}

/// Match `text` against a glob `pattern` where `*` means "zero or more
/// characters", case-insensitively. This is a convention of the matcher,
/// not a dependency the core relies on -- any matcher honoring
/// first-match-wins table order would do.
fn glob_match(pattern: &str, text: &str) -> bool {
    fn step(p: &[u8], t: &[u8]) -> bool {
        match (p.first(), t.first()) {
            (None, None) => true,
            (Some(b'*'), _) => step(&p[1..], t) || (!t.is_empty() && step(p, &t[1..])),
            (Some(pc), Some(tc)) if pc.eq_ignore_ascii_case(tc) => step(&p[1..], &t[1..]),
            _ => false,
        }
    }
    step(pattern.as_bytes(), text.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::IpAddr;

    fn backend(pattern: &str, port: u16) -> Backend {
        Backend {
            pattern: pattern.to_string(),
            host: Host::Ip("127.0.0.1".parse::<IpAddr>().unwrap()),
            port,
        }
    }

    #[test]
    fn exact_match() {
        let table = BackendTable { name: "t".into(), entries: vec![backend("example.com", 9001)] };
        assert_eq!(table.lookup(Some("example.com")).unwrap().port, 9001);
        assert!(table.lookup(Some("other.com")).is_none());
    }

    #[test]
    fn first_match_wins_not_best_match() {
        let table = BackendTable {
            name: "t".into(),
            entries: vec![backend("*.example.com", 1), backend("a.example.com", 2)],
        };
        assert_eq!(table.lookup(Some("a.example.com")).unwrap().port, 1);
    }

    #[test]
    fn wildcard_matches_subdomain() {
        let table = BackendTable { name: "t".into(), entries: vec![backend("*.example.com", 1)] };
        assert!(table.lookup(Some("foo.example.com")).is_some());
        assert!(table.lookup(Some("example.com")).is_none());
    }

    #[test]
    fn no_hostname_never_matches() {
        let table = BackendTable { name: "t".into(), entries: vec![backend("*", 1)] };
        assert!(table.lookup(None).is_none());
    }

    #[test]
    fn port_zero_reuses_listener_port() {
        let b = backend("example.com", 0);
        assert_eq!(b.resolve(443), Address::Inet("127.0.0.1:443".parse().unwrap()));
    }

    #[test]
    fn nonzero_port_overrides_listener_port() {
        let b = backend("example.com", 9001);
        assert_eq!(b.resolve(443), Address::Inet("127.0.0.1:9001".parse().unwrap()));
    }
}
