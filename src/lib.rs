//! `wayfare`: a single-threaded, non-blocking layer-4 reverse proxy.
//!
//! A connection is accepted, its first bytes are sniffed for a TLS SNI
//! hostname or an HTTP `Host` header (without terminating either protocol),
//! a backend is looked up by hostname, and bytes are spliced bidirectionally
//! between the client and that backend until either side closes.
//!
//! The proxy never runs more than one OS thread: everything is driven by a
//! single readiness event loop (`epoll` on Linux, `kqueue` on the BSDs and
//! macOS), the same design `os`/`sys` inherit from the reactor this crate is
//! built on.
//!
//! # Module map
//!
//! - [`buffer`]: the fixed-capacity ring buffer every connection relays
//!   bytes through.
//! - [`addr`]: tagged address and host values shared by configuration,
//!   backends, and connections.
//! - [`event`], [`os`], [`sys`]: the readiness event loop primitives.
//! - [`sniff`]: the TLS SNI and HTTP `Host` hostname sniffers.
//! - [`listener`]: bound listening endpoints.
//! - [`backend`]: the hostname-to-backend lookup table.
//! - [`stream`]: the TCP/UNIX socket tagged union connections dial and hold.
//! - [`connection`]: the per-connection state machine -- the centrepiece.
//! - [`registry`]: the slab arena and recency list of live connections.
//! - [`config`]: the configuration file loader.
//! - [`admin`]: the `SIGUSR1` connection dump.
//! - [`proxy`]: wires everything above into a running event loop.
//! - [`error`]: the crate-wide startup error type.

#![warn(
    bare_trait_objects,
    missing_debug_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unused_extern_crates,
    unused_import_braces,
    unused_qualifications
)]

mod sys;

pub mod addr;
pub mod admin;
pub mod backend;
pub mod buffer;
pub mod config;
pub mod connection;
pub mod error;
pub mod event;
pub mod listener;
pub mod os;
pub mod proxy;
pub mod registry;
pub mod sniff;
pub mod stream;
