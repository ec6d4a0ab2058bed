//! Tagged address values used throughout the proxy.
//!
//! A single [`Address`] covers every form the configuration grammar in the
//! `config` module accepts: a UNIX socket path, a resolved IPv4/IPv6
//! socket address, or a bare hostname that has not been (and, per the
//! core's non-goals, never will be) resolved via DNS.

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

/// A connect-time address: either fully resolved, or a hostname the core
/// refuses to dial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Address {
    /// A UNIX domain socket path.
    Unix(PathBuf),
    /// A resolved IPv4 or IPv6 socket address (host and port).
    Inet(SocketAddr),
    /// A hostname that was never resolved to a numeric address. Connecting
    /// to one of these is always an error: the core does not do DNS.
    Unresolved(String),
}

impl Address {
    /// Whether this address is ready to `connect()` to.
    pub fn is_resolved(&self) -> bool {
        !matches!(self, Address::Unresolved(_))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Unix(path) => write!(f, "unix:{}", path.display()),
            Address::Inet(addr) => write!(f, "{}", addr),
            Address::Unresolved(host) => write!(f, "{} (unresolved)", host),
        }
    }
}

/// A host as it appears in a backend row: an IP, a UNIX path, or a bare
/// hostname, but crucially *without* a port -- a backend's port may be
/// overridden by the listener's own port (see [`crate::backend::Backend`]),
/// so it can't be folded into a [`SocketAddr`] until the listener is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Host {
    Unix(PathBuf),
    Ip(IpAddr),
    Unresolved(String),
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Host::Unix(path) => write!(f, "unix:{}", path.display()),
            Host::Ip(ip) => write!(f, "{}", ip),
            Host::Unresolved(host) => write!(f, "{}", host),
        }
    }
}

/// Parse an address token from the configuration grammar (`unix:/path`,
/// dotted IPv4, bracketed or bare IPv6, or a bare hostname).
pub fn parse_host(token: &str) -> Host {
    if let Some(path) = token.strip_prefix("unix:") {
        return Host::Unix(PathBuf::from(path));
    }

    let bracketed = token.strip_prefix('[').and_then(|rest| rest.strip_suffix(']'));
    let candidate = bracketed.unwrap_or(token);
    if let Ok(ip) = candidate.parse::<IpAddr>() {
        return Host::Ip(ip);
    }

    Host::Unresolved(token.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_unix_path() {
        assert_eq!(parse_host("unix:/tmp/backend.sock"), Host::Unix(PathBuf::from("/tmp/backend.sock")));
    }

    #[test]
    fn parses_ipv4() {
        assert_eq!(parse_host("127.0.0.1"), Host::Ip("127.0.0.1".parse().unwrap()));
    }

    #[test]
    fn parses_bracketed_ipv6() {
        assert_eq!(parse_host("[::1]"), Host::Ip("::1".parse().unwrap()));
    }

    #[test]
    fn parses_bare_ipv6() {
        assert_eq!(parse_host("::1"), Host::Ip("::1".parse().unwrap()));
    }

    #[test]
    fn bare_hostname_is_unresolved() {
        assert_eq!(parse_host("example.com"), Host::Unresolved("example.com".to_string()));
    }

    #[test]
    fn address_is_resolved() {
        assert!(Address::Inet("127.0.0.1:80".parse().unwrap()).is_resolved());
        assert!(Address::Unix(PathBuf::from("/tmp/s")).is_resolved());
        assert!(!Address::Unresolved("example.com".to_string()).is_resolved());
    }
}
