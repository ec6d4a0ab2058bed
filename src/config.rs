//! The stanza-grammar configuration file loader.
//!
//! ```text
//! username NAME
//! listener ADDR [PORT] {
//!     protocol tls|http
//!     table NAME
//!     fallback ADDR [PORT]
//! }
//! table [NAME] {
//!     HOSTNAME_PATTERN ADDR [PORT]
//!     ...
//! }
//! ```
//!
//! Lines are whitespace-split into a keyword and its positional
//! arguments; `{`/`}` delimit a stanza body. Comments start with `#` and
//! run to the end of the line. Parse errors are collected with their line
//! number rather than aborting on the first one, so a single `config
//! reload` attempt reports everything wrong with the file at once.

use std::fmt;
use std::fs;
use std::path::Path;

use crate::addr::{parse_host, Host};
use crate::listener::Protocol;

/// One misparsed line, tagged with its 1-based line number.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub line: usize,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

/// A parsed, line-validated `listener { ... }` stanza.
#[derive(Debug, Clone)]
pub struct ListenerConfig {
    pub address: String,
    pub port: Option<u16>,
    pub protocol: Protocol,
    pub table_name: Option<String>,
    pub fallback: Option<(Host, Option<u16>)>,
}

/// A parsed, line-validated `table { ... }` stanza.
#[derive(Debug, Clone)]
pub struct TableConfig {
    pub name: String,
    pub entries: Vec<(String, Host, u16)>,
}

/// The fully parsed configuration file.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub user: Option<String>,
    pub listeners: Vec<ListenerConfig>,
    pub tables: Vec<TableConfig>,
}

/// Load and parse `path`. On any parse error, all errors found are
/// returned together (not just the first), each tagged with its line
/// number; no partial `Config` is returned on failure.
pub fn load(path: &Path) -> Result<Config, Vec<ConfigError>> {
    let text = fs::read_to_string(path).map_err(|err| {
        vec![ConfigError { line: 0, message: format!("error reading file: {}", err) }]
    })?;
    parse(&text)
}

fn parse(text: &str) -> Result<Config, Vec<ConfigError>> {
    let mut lines = text.lines().enumerate().map(|(i, line)| (i + 1, strip_comment(line).trim()));
    let mut config = Config::default();
    let mut errors = Vec::new();

    while let Some((lineno, line)) = lines.next() {
        if line.is_empty() {
            continue;
        }
        let mut words = line.split_whitespace();
        let keyword = words.next().unwrap();
        let rest: Vec<&str> = words.collect();

        match keyword {
            "username" => match rest.as_slice() {
                [name] => config.user = Some((*name).to_string()),
                _ => errors.push(err(lineno, "`username` takes exactly one argument")),
            },
            "listener" => match parse_listener_stanza(&rest, &mut lines, lineno, &mut errors) {
                Some(listener) => config.listeners.push(listener),
                None => {}
            },
            "table" => match parse_table_stanza(&rest, &mut lines, lineno, &mut errors) {
                Some(table) => config.tables.push(table),
                None => {}
            },
            other => errors.push(err(lineno, &format!("unrecognized keyword `{}`", other))),
        }
    }

    if errors.is_empty() {
        Ok(config)
    } else {
        Err(errors)
    }
}

fn parse_listener_stanza<'a, I>(
    head: &[&str],
    lines: &mut I,
    start_line: usize,
    errors: &mut Vec<ConfigError>,
) -> Option<ListenerConfig>
where
    I: Iterator<Item = (usize, &'a str)>,
{
    let (address, port, head_ok) = match head {
        [addr] => (addr.to_string(), None, true),
        [addr, port] => match port.parse::<u16>() {
            Ok(port) => (addr.to_string(), Some(port), true),
            Err(_) => {
                errors.push(err(start_line, &format!("invalid port `{}`", port)));
                (addr.to_string(), None, false)
            }
        },
        [] => {
            errors.push(err(start_line, "`listener` requires an address"));
            (String::new(), None, false)
        }
        _ => {
            errors.push(err(start_line, "`listener` takes at most an address and a port"));
            (head[0].to_string(), None, false)
        }
    };

    if !expect_open_brace(lines, start_line, errors) {
        return None;
    }

    let mut protocol = None;
    let mut table_name = None;
    let mut fallback = None;

    loop {
        let (lineno, line) = match lines.next() {
            Some(entry) => entry,
            None => {
                errors.push(err(start_line, "unterminated `listener` stanza"));
                return None;
            }
        };
        if line.is_empty() {
            continue;
        }
        if line == "}" {
            break;
        }

        let mut words = line.split_whitespace();
        let keyword = words.next().unwrap();
        let rest: Vec<&str> = words.collect();

        match keyword {
            "protocol" => match rest.as_slice() {
                ["tls"] => protocol = Some(Protocol::Tls),
                ["http"] => protocol = Some(Protocol::Http),
                _ => errors.push(err(lineno, "`protocol` must be `tls` or `http`")),
            },
            "table" => match rest.as_slice() {
                [name] => table_name = Some((*name).to_string()),
                _ => errors.push(err(lineno, "`table` takes exactly one argument")),
            },
            "fallback" => match rest.as_slice() {
                [addr] => fallback = Some((parse_host(addr), None)),
                [addr, port] => match port.parse::<u16>() {
                    Ok(port) => fallback = Some((parse_host(addr), Some(port))),
                    Err(_) => errors.push(err(lineno, &format!("invalid port `{}`", port))),
                },
                _ => errors.push(err(lineno, "`fallback` takes an address and an optional port")),
            },
            other => errors.push(err(lineno, &format!("unrecognized keyword `{}` in listener stanza", other))),
        }
    }

    let protocol = match protocol {
        Some(protocol) => protocol,
        None => {
            errors.push(err(start_line, "listener stanza is missing a `protocol` line"));
            return None;
        }
    };

    if !head_ok {
        return None;
    }

    Some(ListenerConfig { address, port, protocol, table_name, fallback })
}

fn parse_table_stanza<'a, I>(
    head: &[&str],
    lines: &mut I,
    start_line: usize,
    errors: &mut Vec<ConfigError>,
) -> Option<TableConfig>
where
    I: Iterator<Item = (usize, &'a str)>,
{
    let name = match head {
        [] => "default".to_string(),
        [name] => (*name).to_string(),
        _ => {
            errors.push(err(start_line, "`table` takes at most one name argument"));
            return None;
        }
    };

    if !expect_open_brace(lines, start_line, errors) {
        return None;
    }

    let mut entries = Vec::new();
    let mut ok = true;

    loop {
        let (lineno, line) = match lines.next() {
            Some(entry) => entry,
            None => {
                errors.push(err(start_line, "unterminated `table` stanza"));
                return None;
            }
        };
        if line.is_empty() {
            continue;
        }
        if line == "}" {
            break;
        }

        let words: Vec<&str> = line.split_whitespace().collect();
        match words.as_slice() {
            [pattern, addr] => entries.push(((*pattern).to_string(), parse_host(addr), 0)),
            [pattern, addr, port] => match port.parse::<u16>() {
                Ok(port) => entries.push(((*pattern).to_string(), parse_host(addr), port)),
                Err(_) => {
                    errors.push(err(lineno, &format!("invalid port `{}`", port)));
                    ok = false;
                }
            },
            [] => {}
            _ => {
                errors.push(err(lineno, "table entry takes a hostname pattern, an address, and an optional port"));
                ok = false;
            }
        }
    }

    if ok {
        Some(TableConfig { name, entries })
    } else {
        None
    }
}

fn expect_open_brace<'a, I>(lines: &mut I, start_line: usize, errors: &mut Vec<ConfigError>) -> bool
where
    I: Iterator<Item = (usize, &'a str)>,
{
    for (lineno, line) in lines.by_ref() {
        if line.is_empty() {
            continue;
        }
        if line == "{" {
            return true;
        }
        errors.push(err(lineno, "expected `{` to open the stanza"));
        return false;
    }
    errors.push(err(start_line, "expected `{` to open the stanza, found end of file"));
    false
}

fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(i) => &line[..i],
        None => line,
    }
}

fn err(line: usize, message: &str) -> ConfigError {
    ConfigError { line, message: message.to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_listener_and_table() {
        let text = "\
listener 127.0.0.1:4443 {
    protocol tls
    table backends
}
table backends {
    example.com 127.0.0.1 9001
}
";
        let config = parse(text).unwrap();
        assert_eq!(config.listeners.len(), 1);
        assert_eq!(config.listeners[0].address, "127.0.0.1:4443");
        assert_eq!(config.listeners[0].protocol, Protocol::Tls);
        assert_eq!(config.listeners[0].table_name.as_deref(), Some("backends"));
        assert_eq!(config.tables.len(), 1);
        assert_eq!(config.tables[0].name, "backends");
        assert_eq!(config.tables[0].entries.len(), 1);
    }

    #[test]
    fn anonymous_table_defaults_to_default_name() {
        let text = "table {\n  * 127.0.0.1 80\n}\n";
        let config = parse(text).unwrap();
        assert_eq!(config.tables[0].name, "default");
    }

    #[test]
    fn username_is_recorded() {
        let text = "username proxy\n";
        let config = parse(text).unwrap();
        assert_eq!(config.user.as_deref(), Some("proxy"));
    }

    #[test]
    fn missing_protocol_is_an_error() {
        let text = "listener 127.0.0.1:80 {\n}\n";
        let errors = parse(text).unwrap_err();
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn too_many_listener_arguments_reports_line_number() {
        let text = "listener 127.0.0.1 80 extra {\n  protocol http\n}\n";
        let errors = parse(text).unwrap_err();
        assert_eq!(errors[0].line, 1);
    }

    #[test]
    fn too_many_table_entry_arguments_is_an_error() {
        let text = "table t {\n  a.example 127.0.0.1 80 extra\n}\n";
        let errors = parse(text).unwrap_err();
        assert_eq!(errors[0].line, 2);
    }

    #[test]
    fn comments_and_blank_lines_are_ignored() {
        let text = "# a comment\n\nusername proxy # trailing comment\n";
        let config = parse(text).unwrap();
        assert_eq!(config.user.as_deref(), Some("proxy"));
    }

    #[test]
    fn unrecognized_keyword_is_an_error() {
        let text = "bogus line\n";
        let errors = parse(text).unwrap_err();
        assert_eq!(errors.len(), 1);
    }
}
