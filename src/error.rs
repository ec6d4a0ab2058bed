//! The crate-wide error type for startup-fatal failures. Nothing in the
//! running event loop returns this -- peer-driven conditions are logged and
//! handled in place, never propagated as an `Error`.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// A fatal failure during startup: loading configuration, binding a
/// listener, or dropping privileges. `main` formats these with `Display`
/// and exits with a non-zero status; nothing past `run` is expected to
/// produce one.
#[derive(Debug, Error)]
pub enum Error {
    #[error("error reading configuration file `{path}`: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid configuration in `{path}`:\n{}", format_config_errors(.errors))]
    ConfigParse { path: PathBuf, errors: Vec<crate::config::ConfigError> },

    #[error("error binding listener on `{addr}`: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("error creating the OS event queue: {0}")]
    EventQueue(#[source] io::Error),

    #[error("unknown user `{0}`")]
    UnknownUser(String),

    #[error("error dropping privileges to user `{user}`: {source}")]
    DropPrivileges {
        user: String,
        #[source]
        source: io::Error,
    },

    #[error("error parsing command line arguments: {0}")]
    Args(#[from] pico_args::Error),
}

fn format_config_errors(errors: &[crate::config::ConfigError]) -> String {
    errors.iter().map(|err| format!("  {}", err)).collect::<Vec<_>>().join("\n")
}
