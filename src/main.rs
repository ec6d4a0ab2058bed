//! Command line entry point: parses arguments, initializes logging, loads
//! the configuration file, and runs the proxy until a shutdown signal.

use std::path::PathBuf;
use std::process::ExitCode;

use log::error;

use wayfare::config;
use wayfare::error::Error;
use wayfare::proxy::Proxy;

const DEFAULT_CONFIG_PATH: &str = "/etc/wayfare.conf";

const HELP: &str = "\
wayfare: a single-threaded, non-blocking layer-4 reverse proxy

USAGE:
    wayfare [OPTIONS]

OPTIONS:
    -c, --config PATH    Path to the configuration file (default: /etc/wayfare.conf)
    -h, --help           Print this help message and exit
";

fn main() -> ExitCode {
    std_logger::init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{}", err);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Error> {
    let config_path = parse_args()?;

    let config = config::load(&config_path).map_err(|errors| Error::ConfigParse { path: config_path.clone(), errors })?;

    let mut proxy = Proxy::new(config, Some(config_path))?;
    proxy.run()
}

/// Parse `-c`/`--config` and `-h`/`--help`. Returns the effective config
/// path, printing the help text and exiting 0 if `--help` was given.
fn parse_args() -> Result<PathBuf, pico_args::Error> {
    let mut args = pico_args::Arguments::from_env();

    if args.contains(["-h", "--help"]) {
        print!("{}", HELP);
        std::process::exit(0);
    }

    let config_path: Option<PathBuf> = args.opt_value_from_str(["-c", "--config"])?;
    Ok(config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH)))
}
